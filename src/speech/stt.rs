use crate::messages::types::AudioData;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of transcribing one utterance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transcription {
    Text(String),
    /// The engine heard nothing it could turn into words
    Unrecognized,
}

/// Speech-to-text for one fixed language
pub trait Transcriber: Send + Sync {
    /// `audio` is mono 16 kHz
    fn transcribe(&self, audio: &AudioData) -> Result<Transcription>;
}

/// Spoken-language identification from audio
pub trait LanguageIdentifier: Send + Sync {
    /// Returns a label shaped `"<code>: <Name>"`, e.g. `"uk: Ukrainian"`
    fn identify(&self, audio: &AudioData) -> Result<String>;
}

/// Configuration for the Whisper speech-to-text engines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Multilingual model used for English and for language identification
    pub model_path: PathBuf,

    /// Optional Ukrainian fine-tune; falls back to `model_path`
    pub ua_model_path: Option<PathBuf>,

    /// Number of threads to use for transcription
    pub n_threads: i32,

    /// Print timestamps for each segment
    pub print_timestamps: bool,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            ua_model_path: None,
            n_threads: 4,
            print_timestamps: false,
        }
    }
}

impl WhisperConfig {
    pub fn with_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_ua_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.ua_model_path = Some(path.into());
        self
    }

    pub fn with_threads(mut self, n_threads: i32) -> Self {
        self.n_threads = n_threads;
        self
    }

    pub fn ua_model(&self) -> &PathBuf {
        self.ua_model_path.as_ref().unwrap_or(&self.model_path)
    }
}

/// Turn raw engine output into a [`Transcription`].
///
/// Whisper marks non-speech with bracketed tags such as `[BLANK_AUDIO]` or
/// `(music)`; those are dropped, and nothing left means unrecognized.
pub fn clean_transcript(raw: &str) -> Transcription {
    let mut text = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => text.push(c),
            _ => {}
        }
    }

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().any(|c| c.is_alphanumeric()) {
        Transcription::Text(text)
    } else {
        Transcription::Unrecognized
    }
}

/// Build an identification label from a language code and its name
pub fn format_label(code: &str, name: &str) -> String {
    let mut chars = name.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{}: {}", code, name)
}

#[cfg(feature = "whisper")]
pub use engine::{load_context, WhisperLanguageIdentifier, WhisperTranscriber};

#[cfg(feature = "whisper")]
mod engine {
    use super::{clean_transcript, format_label, LanguageIdentifier, Transcriber, Transcription};
    use crate::messages::types::AudioData;
    use crate::{Result, TridentError};
    use std::path::Path;
    use std::sync::Arc;
    use tracing::{debug, info};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Load a Whisper model so several engines can share it
    pub fn load_context(model_path: &Path) -> Result<Arc<WhisperContext>> {
        info!("Loading Whisper model from: {:?}", model_path);

        if !model_path.exists() {
            return Err(TridentError::ModelLoadError(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TridentError::ModelLoadError("Invalid model path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| TridentError::ModelLoadError(format!("Failed to load Whisper model: {:?}", e)))?;

        info!("Whisper model loaded successfully");
        Ok(Arc::new(ctx))
    }

    /// Whisper transcription forced to one language
    pub struct WhisperTranscriber {
        context: Arc<WhisperContext>,
        language: &'static str,
        n_threads: i32,
        print_timestamps: bool,
    }

    impl WhisperTranscriber {
        /// `language` is a Whisper code: "en" or "uk"
        pub fn new(context: Arc<WhisperContext>, language: &'static str, n_threads: i32) -> Self {
            Self {
                context,
                language,
                n_threads,
                print_timestamps: false,
            }
        }

        pub fn with_timestamps(mut self, enabled: bool) -> Self {
            self.print_timestamps = enabled;
            self
        }
    }

    impl Transcriber for WhisperTranscriber {
        fn transcribe(&self, audio: &AudioData) -> Result<Transcription> {
            if audio.is_empty() {
                return Err(TridentError::TranscriptionError(
                    "Empty audio segment".to_string(),
                ));
            }

            debug!(
                "Transcribing {:.2}s as {}",
                audio.duration_seconds(),
                self.language
            );

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_n_threads(self.n_threads);
            params.set_translate(false);
            params.set_language(Some(self.language));
            params.set_print_timestamps(self.print_timestamps);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);

            let mut state = self.context.create_state().map_err(|e| {
                TridentError::TranscriptionError(format!("Failed to create state: {:?}", e))
            })?;

            state.full(params, &audio.samples).map_err(|e| {
                TridentError::TranscriptionError(format!("Transcription failed: {:?}", e))
            })?;

            let num_segments = state.full_n_segments().map_err(|e| {
                TridentError::TranscriptionError(format!("Failed to get segments: {:?}", e))
            })?;

            let mut text = String::new();
            for i in 0..num_segments {
                let segment = state.full_get_segment_text(i).map_err(|e| {
                    TridentError::TranscriptionError(format!("Failed to get segment text: {:?}", e))
                })?;
                text.push_str(&segment);
            }

            debug!("Transcription result: '{}'", text.trim());
            Ok(clean_transcript(&text))
        }
    }

    /// Spoken-language identification from Whisper's language head
    pub struct WhisperLanguageIdentifier {
        context: Arc<WhisperContext>,
        n_threads: usize,
    }

    impl WhisperLanguageIdentifier {
        pub fn new(context: Arc<WhisperContext>, n_threads: i32) -> Self {
            Self {
                context,
                n_threads: n_threads.max(1) as usize,
            }
        }
    }

    impl LanguageIdentifier for WhisperLanguageIdentifier {
        fn identify(&self, audio: &AudioData) -> Result<String> {
            if audio.is_empty() {
                return Err(TridentError::TranscriptionError(
                    "Empty audio segment".to_string(),
                ));
            }

            let mut state = self.context.create_state().map_err(|e| {
                TridentError::TranscriptionError(format!("Failed to create state: {:?}", e))
            })?;
            state.pcm_to_mel(&audio.samples, self.n_threads).map_err(|e| {
                TridentError::TranscriptionError(format!("Failed to compute mel: {:?}", e))
            })?;
            let (lang_id, _probs) = state.lang_detect(0, self.n_threads).map_err(|e| {
                TridentError::TranscriptionError(format!("Language detection failed: {:?}", e))
            })?;

            let code = whisper_rs::get_lang_str(lang_id).ok_or_else(|| {
                TridentError::TranscriptionError(format!("Unknown language id {}", lang_id))
            })?;
            let name = whisper_rs::get_lang_str_full(lang_id).unwrap_or(code);

            let label = format_label(code, name);
            debug!("Identified language: {}", label);
            Ok(label)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_kept() {
        assert_eq!(
            clean_transcript("  Hello there.  "),
            Transcription::Text("Hello there.".to_string())
        );
    }

    #[test]
    fn test_blank_markers_are_unrecognized() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO]"), Transcription::Unrecognized);
        assert_eq!(clean_transcript("(music) ..."), Transcription::Unrecognized);
        assert_eq!(clean_transcript(""), Transcription::Unrecognized);
    }

    #[test]
    fn test_markers_inside_speech_are_dropped() {
        assert_eq!(
            clean_transcript("[_BEG_] Добрий день [SOUND]"),
            Transcription::Text("Добрий день".to_string())
        );
    }

    #[test]
    fn test_label_format() {
        assert_eq!(format_label("uk", "ukrainian"), "uk: Ukrainian");
        assert_eq!(format_label("en", "English"), "en: English");
    }

    #[test]
    fn test_ua_model_falls_back() {
        let config = WhisperConfig::default();
        assert_eq!(config.ua_model(), &config.model_path);

        let config = config.with_ua_model("models/ggml-uk.bin");
        assert_eq!(config.ua_model(), &PathBuf::from("models/ggml-uk.bin"));
    }
}
