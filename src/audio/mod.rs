pub mod buffer;
#[cfg(feature = "audio-io")]
pub mod input;
pub mod playback;
pub mod preprocessor;
pub mod resampler;
pub mod wav;

pub use buffer::AudioRingBuffer;
#[cfg(feature = "audio-io")]
pub use input::MicrophoneRecorder;
#[cfg(feature = "audio-io")]
pub use playback::CpalPlayer;
pub use playback::{AudioPlayer, PlaybackOutcome};
pub use preprocessor::{prepare_for_transcription, SPEECH_SAMPLE_RATE};
pub use resampler::{resample_audio, AudioResampler};
pub use wav::{read_wav, write_wav};

use serde::{Deserialize, Serialize};

/// Microphone capture settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// RMS level (0.0..1.0) above which a block counts as speech
    pub energy_threshold: f32,

    /// Silence that ends an utterance
    pub pause_threshold_secs: f32,

    /// How long to wait for speech to start
    pub listen_timeout_secs: f32,

    /// Hard limit on one utterance
    pub max_phrase_secs: f32,

    /// Rate handed to transcribers
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.015,
            pause_threshold_secs: 0.8,
            listen_timeout_secs: 5.0,
            max_phrase_secs: 30.0,
            sample_rate: SPEECH_SAMPLE_RATE,
        }
    }
}

impl CaptureConfig {
    pub fn with_energy_threshold(mut self, threshold: f32) -> Self {
        self.energy_threshold = threshold;
        self
    }

    pub fn with_pause_threshold(mut self, secs: f32) -> Self {
        self.pause_threshold_secs = secs;
        self
    }

    pub fn with_listen_timeout(mut self, secs: f32) -> Self {
        self.listen_timeout_secs = secs;
        self
    }
}
