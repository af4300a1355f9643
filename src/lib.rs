//! Trident - a bilingual (Ukrainian/English) voice conversation loop
//!
//! Captures speech or text, turns it into a tagged user turn, streams the
//! language model's reply and speaks it sentence by sentence while the
//! written transcript accumulates in the conversation history.

pub mod audio;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TridentError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("Model backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguageError(String),

    #[error("History error: {0}")]
    HistoryError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for TridentError {
    fn from(e: std::io::Error) -> Self {
        TridentError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for TridentError {
    fn from(e: serde_json::Error) -> Self {
        TridentError::IOError(format!("JSON error: {}", e))
    }
}

impl From<toml::de::Error> for TridentError {
    fn from(e: toml::de::Error) -> Self {
        TridentError::ConfigError(e.to_string())
    }
}

impl TridentError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors may require user intervention
            TridentError::AudioDeviceError(_) => false,
            // Model errors require restarting
            TridentError::ModelLoadError(_) => false,
            // These are typically transient errors
            TridentError::TranscriptionError(_) => true,
            TridentError::BackendUnavailable(_) => true,
            TridentError::BackendTimeout(_) => true,
            TridentError::SynthesisError(_) => true,
            TridentError::PlaybackError(_) => true,
            TridentError::UnsupportedLanguageError(_) => true,
            TridentError::HistoryError(_) => false,
            TridentError::IOError(_) => false,
            TridentError::AudioProcessingError(_) => true,
            TridentError::ConfigError(_) => false,
            TridentError::ChannelError(_) => false,
        }
    }

    /// Whether this error ends the assistant turn it occurred in.
    ///
    /// Speech-output failures only cost the affected sentence; model-stream
    /// failures end the turn but never the session.
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            TridentError::BackendUnavailable(_)
                | TridentError::BackendTimeout(_)
                | TridentError::HistoryError(_)
                | TridentError::ChannelError(_)
        )
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            TridentError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            TridentError::ModelLoadError(_) => {
                "Failed to load a model. Please verify model files are present.".to_string()
            }
            TridentError::TranscriptionError(_) => {
                "Could you repeat please? It's not recognized.\t\tПовторіть будь ласка, не розчула."
                    .to_string()
            }
            TridentError::BackendUnavailable(_) => {
                "The language model is unavailable. Please try again.".to_string()
            }
            TridentError::BackendTimeout(_) => {
                "The language model took too long to answer. Please try again.".to_string()
            }
            TridentError::SynthesisError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            TridentError::PlaybackError(_) => {
                "Audio playback failed. Response will be shown as text.".to_string()
            }
            TridentError::UnsupportedLanguageError(_) => {
                "No voice is available for this language.".to_string()
            }
            TridentError::HistoryError(_) => "Conversation history error.".to_string(),
            TridentError::IOError(_) => "File system error occurred.".to_string(),
            TridentError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            TridentError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            TridentError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TridentError>;
