//! Speech in and out
//!
//! This module provides:
//! - Text language classification for reply units
//! - Speech-to-text and audio language identification (Whisper)
//! - Routing of captured audio to the matching transcriber
//! - Text-to-speech (VITS) and the dispatcher that speaks reply units

pub mod dispatcher;
pub mod language;
pub mod router;
pub mod stt;
pub mod tts;

pub use dispatcher::{DispatchMode, SpeechDispatcher, SpeechReport};
pub use language::{classify, Language};
pub use router::{language_for_label, CaptureMode, CaptureRouter};
pub use stt::{LanguageIdentifier, Transcriber, Transcription, WhisperConfig};
pub use tts::{normalize_text_for_tts, SpeechSynthesizer, TTSConfig, VoiceProfile, VITS_SAMPLE_RATE};
