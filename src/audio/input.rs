use super::preprocessor::rms_energy;
use super::CaptureConfig;
use crate::messages::types::AudioData;
use crate::utils::cancel::StopSignal;
use crate::{Result, TridentError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Speech kept from just before the energy threshold was crossed
const PRE_ROLL_SECS: f32 = 0.3;

/// Records one utterance at a time from the default input device
pub struct MicrophoneRecorder {
    config: CaptureConfig,
}

impl MicrophoneRecorder {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| TridentError::AudioDeviceError("No input device available".into()))?;
        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(Self { config })
    }

    /// Wait for speech and record until the speaker pauses.
    ///
    /// Returns `Ok(None)` when nobody spoke within the listen timeout or
    /// `stop` fired first. The returned audio is mono at the device rate.
    pub fn listen(&self, stop: &StopSignal) -> Result<Option<AudioData>> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| TridentError::AudioDeviceError("No input device available".into()))?;
        let config: cpal::StreamConfig = device
            .default_input_config()
            .map_err(|e| TridentError::AudioDeviceError(format!("Failed to get input config: {}", e)))?
            .into();

        let rate = config.sample_rate.0;
        let channels = config.channels as usize;
        let (audio_tx, audio_rx) = bounded::<Vec<f32>>(256);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };
                    if let Err(e) = audio_tx.try_send(mono) {
                        debug!("Dropping input block: {}", e);
                    }
                },
                |err| error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| TridentError::AudioDeviceError(format!("Failed to build input stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| TridentError::AudioDeviceError(format!("Failed to start input stream: {}", e)))?;

        let mut detector = UtteranceDetector::new(&self.config, rate);
        let started = Instant::now();
        let listen_timeout = Duration::from_secs_f32(self.config.listen_timeout_secs);

        loop {
            if stop.is_stopped() {
                return Ok(None);
            }
            match audio_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(block) => {
                    if detector.push(&block) {
                        let samples = detector.finish();
                        debug!("Captured {:.2}s of speech", samples.len() as f32 / rate as f32);
                        return Ok(Some(AudioData::mono(samples, rate)));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TridentError::AudioDeviceError("Input stream closed".into()));
                }
            }
            if !detector.in_speech() && started.elapsed() >= listen_timeout {
                debug!("No speech within {:?}", listen_timeout);
                return Ok(None);
            }
        }
    }
}

/// Energy-based start/end detection over streamed mono blocks
struct UtteranceDetector {
    rate: f32,
    threshold: f32,
    pause: f32,
    max_secs: f32,
    pre_roll: VecDeque<f32>,
    speech: Vec<f32>,
    in_speech: bool,
    silence: f32,
}

impl UtteranceDetector {
    fn new(config: &CaptureConfig, rate: u32) -> Self {
        Self {
            rate: rate as f32,
            threshold: config.energy_threshold,
            pause: config.pause_threshold_secs,
            max_secs: config.max_phrase_secs,
            pre_roll: VecDeque::new(),
            speech: Vec::new(),
            in_speech: false,
            silence: 0.0,
        }
    }

    fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed a block; returns `true` once the utterance is complete
    fn push(&mut self, block: &[f32]) -> bool {
        let loud = rms_energy(block) >= self.threshold;

        if !self.in_speech {
            self.pre_roll.extend(block.iter().copied());
            let keep = (PRE_ROLL_SECS * self.rate) as usize;
            while self.pre_roll.len() > keep {
                self.pre_roll.pop_front();
            }
            if loud {
                self.in_speech = true;
                self.speech.extend(self.pre_roll.drain(..));
            }
            return false;
        }

        self.speech.extend_from_slice(block);
        if loud {
            self.silence = 0.0;
        } else {
            self.silence += block.len() as f32 / self.rate;
        }

        self.silence >= self.pause || self.speech.len() as f32 / self.rate >= self.max_secs
    }

    fn finish(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech)
    }
}
