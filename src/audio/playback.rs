//! Audio playback collaborator
//!
//! [`AudioPlayer::play`] blocks until the clip has been heard or the turn's
//! [`StopSignal`] fires, whichever comes first.

use crate::messages::types::AudioData;
use crate::utils::cancel::StopSignal;
use crate::Result;

/// How a playback call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The whole clip was played
    Finished,
    /// Playback was cut short by the stop signal
    Stopped,
}

/// Exclusive user of the audio-output device for one clip at a time
pub trait AudioPlayer: Send + Sync {
    fn play(&self, audio: &AudioData, stop: &StopSignal) -> Result<PlaybackOutcome>;
}

#[cfg(feature = "audio-io")]
pub use device::CpalPlayer;

#[cfg(feature = "audio-io")]
mod device {
    use super::{AudioPlayer, PlaybackOutcome};
    use crate::audio::buffer::AudioRingBuffer;
    use crate::audio::resampler::resample_audio;
    use crate::audio::wav::downmix;
    use crate::messages::types::AudioData;
    use crate::utils::cancel::StopSignal;
    use crate::{Result, TridentError};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{debug, error, info};

    const POLL: Duration = Duration::from_millis(10);

    /// Plays clips on the default output device
    ///
    /// The device is opened per clip, so the player holds no stream between
    /// calls and can be shared across threads.
    #[derive(Debug, Default)]
    pub struct CpalPlayer;

    impl CpalPlayer {
        pub fn new() -> Result<Self> {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| TridentError::AudioDeviceError("No output device available".into()))?;
            info!(
                "Using output device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );
            Ok(Self)
        }
    }

    impl AudioPlayer for CpalPlayer {
        fn play(&self, audio: &AudioData, stop: &StopSignal) -> Result<PlaybackOutcome> {
            if audio.is_empty() {
                return Ok(PlaybackOutcome::Finished);
            }

            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| TridentError::PlaybackError("No output device available".into()))?;
            let config: cpal::StreamConfig = device
                .default_output_config()
                .map_err(|e| TridentError::PlaybackError(format!("Failed to get output config: {}", e)))?
                .into();

            let rate = config.sample_rate.0;
            let channels = config.channels as usize;
            let mono = downmix(&audio.samples, audio.channels);
            let samples = resample_audio(&mono, audio.sample_rate, rate, 1)?;

            let buffer = AudioRingBuffer::new(rate as usize);
            let drained = Arc::new(AtomicBool::new(false));
            let callback_buffer = buffer.clone();
            let callback_drained = Arc::clone(&drained);
            let mut frame = Vec::new();

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let frames = data.len() / channels;
                        frame.resize(frames, 0.0);
                        let read = callback_buffer.read_into(&mut frame);
                        for (i, out) in data.chunks_mut(channels).enumerate() {
                            out.fill(if i < read { frame[i] } else { 0.0 });
                        }
                        if read == 0 {
                            callback_drained.store(true, Ordering::Release);
                        }
                    },
                    |err| error!("Audio output stream error: {}", err),
                    None,
                )
                .map_err(|e| TridentError::PlaybackError(format!("Failed to build output stream: {}", e)))?;

            stream
                .play()
                .map_err(|e| TridentError::PlaybackError(format!("Failed to start output stream: {}", e)))?;

            let mut fed = 0;
            loop {
                if fed < samples.len() {
                    fed += buffer.write_available(&samples[fed..]);
                    drained.store(false, Ordering::Release);
                } else if buffer.is_empty() && drained.load(Ordering::Acquire) {
                    debug!("Played {} samples at {} Hz", samples.len(), rate);
                    return Ok(PlaybackOutcome::Finished);
                }

                if stop.wait_timeout(POLL) {
                    buffer.clear();
                    debug!("Playback stopped after {} of {} samples", fed, samples.len());
                    return Ok(PlaybackOutcome::Stopped);
                }
            }
        }
    }
}
