//! Speaking sentence units
//!
//! [`SpeechDispatcher::speak`] synthesizes one unit and plays it to the end,
//! holding the output device for the whole clip. Dispatch either runs that
//! inline on the caller's thread or hands units to a single worker over a
//! bounded FIFO queue, so units are always heard in order and never overlap.

use crate::audio::playback::{AudioPlayer, PlaybackOutcome};
use crate::llm::chunker::SpeakableUnit;
use crate::speech::tts::{SpeechSynthesizer, TTSConfig};
use crate::utils::cancel::StopSignal;
use crate::{Result, TridentError};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// How units reach the speaker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Speak on the streaming thread; token consumption waits for playback
    #[default]
    Inline,
    /// Speak on a worker thread fed by a bounded queue
    Queued { capacity: usize },
}

/// Result of speaking one unit
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechReport {
    pub unit: SpeakableUnit,
    pub result: Result<PlaybackOutcome>,
}

enum SpeechJob {
    Speak {
        unit: SpeakableUnit,
        stop: StopSignal,
        report: Sender<SpeechReport>,
    },
    Barrier(Sender<()>),
}

struct SpeechCore {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    voices: TTSConfig,
    device: Mutex<()>,
}

impl SpeechCore {
    fn speak(&self, unit: &SpeakableUnit, stop: &StopSignal) -> Result<PlaybackOutcome> {
        let voice = self.voices.voice_for(unit.language)?;
        let audio = self.synthesizer.synthesize(&unit.text, voice)?;
        if stop.is_stopped() {
            return Ok(PlaybackOutcome::Stopped);
        }

        let _device = self.device.lock();
        debug!(
            "Playing {:.2}s as {} ({})",
            audio.duration_seconds(),
            voice.voice,
            unit.language
        );
        self.player.play(&audio, stop)
    }
}

struct SpeechQueue {
    jobs: Option<Sender<SpeechJob>>,
    worker: Option<JoinHandle<()>>,
}

/// Speaks units with the voice of their language
pub struct SpeechDispatcher {
    core: Arc<SpeechCore>,
    queue: Option<SpeechQueue>,
}

impl SpeechDispatcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        voices: TTSConfig,
        mode: DispatchMode,
    ) -> Result<Self> {
        let core = Arc::new(SpeechCore {
            synthesizer,
            player,
            voices,
            device: Mutex::new(()),
        });

        let queue = match mode {
            DispatchMode::Inline => None,
            DispatchMode::Queued { capacity } => {
                let (tx, rx) = bounded(capacity.max(1));
                let worker_core = Arc::clone(&core);
                let worker = std::thread::Builder::new()
                    .name("speech-worker".to_string())
                    .spawn(move || run_worker(worker_core, rx))
                    .map_err(|e| {
                        TridentError::ChannelError(format!("Failed to spawn speech worker: {}", e))
                    })?;
                info!("Speech worker started (queue capacity {})", capacity.max(1));
                Some(SpeechQueue {
                    jobs: Some(tx),
                    worker: Some(worker),
                })
            }
        };

        Ok(Self { core, queue })
    }

    pub fn mode(&self) -> DispatchMode {
        match &self.queue {
            None => DispatchMode::Inline,
            Some(queue) => DispatchMode::Queued {
                capacity: queue
                    .jobs
                    .as_ref()
                    .and_then(|tx| tx.capacity())
                    .unwrap_or(1),
            },
        }
    }

    /// Synthesize and play one unit, blocking until playback ends.
    ///
    /// Fails with `UnsupportedLanguageError` when no voice is configured for
    /// the unit's language, `SynthesisError` or `PlaybackError` otherwise.
    pub fn speak(&self, unit: &SpeakableUnit, stop: &StopSignal) -> Result<PlaybackOutcome> {
        self.core.speak(unit, stop)
    }

    /// Hand a unit to the speaker in this dispatcher's mode.
    ///
    /// Inline: speaks now and sends the report before returning. Queued:
    /// waits for queue space and returns; the worker sends the report.
    /// Returns `false` when `stop` fired before the unit was accepted.
    pub fn dispatch(
        &self,
        unit: SpeakableUnit,
        stop: &StopSignal,
        report: &Sender<SpeechReport>,
    ) -> bool {
        if stop.is_stopped() {
            return false;
        }

        let jobs = match self.queue.as_ref().and_then(|q| q.jobs.as_ref()) {
            None => {
                let result = self.core.speak(&unit, stop);
                let _ = report.send(SpeechReport { unit, result });
                return true;
            }
            Some(jobs) => jobs,
        };

        let job = SpeechJob::Speak {
            unit,
            stop: stop.clone(),
            report: report.clone(),
        };
        select! {
            send(jobs, job) -> sent => sent.is_ok(),
            recv(stop.receiver()) -> _ => false,
        }
    }

    /// Wait until every unit queued so far has been spoken or skipped.
    /// Returns early if `stop` fires. A no-op in inline mode.
    pub fn wait_idle(&self, stop: &StopSignal) {
        let jobs = match self.queue.as_ref().and_then(|q| q.jobs.as_ref()) {
            Some(jobs) => jobs,
            None => return,
        };

        let (done_tx, done_rx) = bounded(1);
        let queued = select! {
            send(jobs, SpeechJob::Barrier(done_tx)) -> sent => sent.is_ok(),
            recv(stop.receiver()) -> _ => false,
        };
        if !queued {
            return;
        }
        select! {
            recv(done_rx) -> _ => {},
            recv(stop.receiver()) -> _ => {},
        }
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            queue.jobs.take();
            if let Some(worker) = queue.worker.take() {
                if worker.join().is_err() {
                    warn!("Speech worker panicked");
                }
            }
        }
    }
}

fn run_worker(core: Arc<SpeechCore>, jobs: Receiver<SpeechJob>) {
    for job in jobs {
        match job {
            SpeechJob::Speak { unit, stop, report } => {
                let result = if stop.is_stopped() {
                    Ok(PlaybackOutcome::Stopped)
                } else {
                    core.speak(&unit, &stop)
                };
                let _ = report.send(SpeechReport { unit, result });
            }
            SpeechJob::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Speech worker shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::types::AudioData;
    use crate::speech::language::Language;
    use crate::speech::tts::VoiceProfile;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    struct EchoSynth;

    impl SpeechSynthesizer for EchoSynth {
        fn synthesize(&self, text: &str, _voice: &VoiceProfile) -> Result<AudioData> {
            if text.contains("FAIL") {
                return Err(TridentError::SynthesisError(text.to_string()));
            }
            Ok(AudioData::mono(vec![0.0; text.len()], 16000))
        }
    }

    #[derive(Default)]
    struct LogPlayer {
        played: Mutex<Vec<usize>>,
        active: Mutex<usize>,
        overlapped: Mutex<bool>,
    }

    impl AudioPlayer for LogPlayer {
        fn play(&self, audio: &AudioData, stop: &StopSignal) -> Result<PlaybackOutcome> {
            {
                let mut active = self.active.lock();
                *active += 1;
                if *active > 1 {
                    *self.overlapped.lock() = true;
                }
            }
            let stopped = stop.wait_timeout(Duration::from_millis(5));
            *self.active.lock() -= 1;
            if stopped {
                return Ok(PlaybackOutcome::Stopped);
            }
            self.played.lock().push(audio.samples.len());
            Ok(PlaybackOutcome::Finished)
        }
    }

    fn dispatcher(mode: DispatchMode) -> (SpeechDispatcher, Arc<LogPlayer>) {
        let player = Arc::new(LogPlayer::default());
        let dispatcher =
            SpeechDispatcher::new(Arc::new(EchoSynth), player.clone(), TTSConfig::default(), mode)
                .unwrap();
        (dispatcher, player)
    }

    #[test]
    fn test_speak_blocks_until_played() {
        let (dispatcher, player) = dispatcher(DispatchMode::Inline);
        let outcome = dispatcher
            .speak(&SpeakableUnit::new("Hello."), &StopSignal::new())
            .unwrap();

        assert_eq!(outcome, PlaybackOutcome::Finished);
        assert_eq!(*player.played.lock(), vec![6]);
    }

    #[test]
    fn test_missing_voice_drops_unit() {
        let player = Arc::new(LogPlayer::default());
        let dispatcher = SpeechDispatcher::new(
            Arc::new(EchoSynth),
            player.clone(),
            TTSConfig::default().without_voice(Language::Ua),
            DispatchMode::Inline,
        )
        .unwrap();

        let result = dispatcher.speak(&SpeakableUnit::new("Привіт."), &StopSignal::new());
        assert!(matches!(result, Err(TridentError::UnsupportedLanguageError(_))));
        assert!(player.played.lock().is_empty());
    }

    #[test]
    fn test_inline_dispatch_reports_failures() {
        let (dispatcher, player) = dispatcher(DispatchMode::Inline);
        let (tx, rx) = unbounded();
        let stop = StopSignal::new();

        assert!(dispatcher.dispatch(SpeakableUnit::new("FAIL now."), &stop, &tx));
        assert!(dispatcher.dispatch(SpeakableUnit::new("Fine."), &stop, &tx));

        let reports: Vec<_> = rx.try_iter().collect();
        assert!(matches!(reports[0].result, Err(TridentError::SynthesisError(_))));
        assert_eq!(reports[1].result, Ok(PlaybackOutcome::Finished));
        assert_eq!(player.played.lock().len(), 1);
    }

    #[test]
    fn test_queued_preserves_order_without_overlap() {
        let (dispatcher, player) = dispatcher(DispatchMode::Queued { capacity: 2 });
        let (tx, rx) = unbounded();
        let stop = StopSignal::new();

        let texts = ["a.", "bb.", "ccc.", "dddd.", "eeeee."];
        for text in texts {
            assert!(dispatcher.dispatch(SpeakableUnit::new(text), &stop, &tx));
        }
        dispatcher.wait_idle(&stop);

        let order: Vec<String> = rx.try_iter().map(|r| r.unit.text).collect();
        assert_eq!(order, texts.to_vec());
        assert_eq!(*player.played.lock(), vec![2, 3, 4, 5, 6]);
        assert!(!*player.overlapped.lock());
    }

    #[test]
    fn test_stop_refuses_new_units() {
        let (dispatcher, player) = dispatcher(DispatchMode::Queued { capacity: 1 });
        let (tx, _rx) = unbounded();
        let stop = StopSignal::new();
        stop.trigger();

        assert!(!dispatcher.dispatch(SpeakableUnit::new("Late."), &stop, &tx));
        dispatcher.wait_idle(&stop);
        assert!(player.played.lock().is_empty());
    }

    #[test]
    fn test_mode_reporting() {
        assert_eq!(dispatcher(DispatchMode::Inline).0.mode(), DispatchMode::Inline);
        assert_eq!(
            dispatcher(DispatchMode::Queued { capacity: 3 }).0.mode(),
            DispatchMode::Queued { capacity: 3 }
        );
    }
}
