//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components. Every field has
//! a default, so a TOML file only needs the values it changes:
//!
//! ```toml
//! history_path = "data/HISTORY.json"
//! dispatch = { queued = { capacity = 4 } }
//!
//! [llm]
//! model_id = "llama3.1"
//! context_budget = 4096
//!
//! [tts.ua]
//! language = "ua"
//! voice = "uk_UA-polina"
//! model_path = "models/uk_UA-polina.onnx"
//! tokens_path = "models/tokens.txt"
//! ```

use crate::audio::CaptureConfig;
use crate::llm::config::LLMConfig;
use crate::speech::dispatcher::DispatchMode;
use crate::speech::router::CaptureMode;
use crate::speech::stt::WhisperConfig;
use crate::speech::tts::TTSConfig;
use crate::{Result, TridentError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration for the complete integration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// LLM configuration
    pub llm: LLMConfig,

    /// STT (Whisper) configuration
    pub stt: WhisperConfig,

    /// TTS configuration
    pub tts: TTSConfig,

    /// Microphone capture settings
    pub capture: CaptureConfig,

    /// Default language choice for captured speech
    pub capture_mode: CaptureMode,

    /// Whether reply units are spoken inline or through a queue
    pub dispatch: DispatchMode,

    /// Where the conversation is loaded from and saved to
    pub history_path: Option<PathBuf>,

    /// Extra instructions appended to the system prompt
    pub system_prompt: Option<String>,

    /// Whether to enable audio input (transcription)
    pub enable_audio_input: bool,

    /// Whether to enable audio output (speech)
    pub enable_audio_output: bool,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            stt: WhisperConfig::default(),
            tts: TTSConfig::default(),
            capture: CaptureConfig::default(),
            capture_mode: CaptureMode::default(),
            dispatch: DispatchMode::default(),
            history_path: None,
            system_prompt: None,
            enable_audio_input: cfg!(feature = "whisper"),
            enable_audio_output: cfg!(all(feature = "sherpa", feature = "audio-io")),
        }
    }
}

impl IntegrationConfig {
    /// `<config dir>/trident/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trident").join("config.toml"))
    }

    /// Read a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TridentError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise the default file if it exists,
    /// otherwise the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Set the LLM configuration
    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_tts(mut self, tts: TTSConfig) -> Self {
        self.tts = tts;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    /// Disable audio input (text-only mode)
    pub fn without_audio_input(mut self) -> Self {
        self.enable_audio_input = false;
        self
    }

    /// Disable audio output (text-only mode)
    pub fn without_audio_output(mut self) -> Self {
        self.enable_audio_output = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(TridentError::ConfigError(format!(
                "Temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            )));
        }

        if let DispatchMode::Queued { capacity: 0 } = self.dispatch {
            return Err(TridentError::ConfigError(
                "Speech queue capacity must be at least 1".to_string(),
            ));
        }

        // Check STT models exist
        if self.enable_audio_input {
            for path in [&self.stt.model_path, self.stt.ua_model()] {
                if !path.exists() {
                    return Err(TridentError::ConfigError(format!(
                        "Whisper model not found: {:?}",
                        path
                    )));
                }
            }
        }

        // Check TTS models exist
        if self.enable_audio_output {
            if self.tts.en.is_none() && self.tts.ua.is_none() {
                return Err(TridentError::ConfigError(
                    "Audio output is enabled but no voice is configured".to_string(),
                ));
            }
            for voice in self.tts.en.iter().chain(self.tts.ua.iter()) {
                if voice.model_path.is_empty() {
                    return Err(TridentError::ConfigError(format!(
                        "TTS model path is required for {}",
                        voice.voice
                    )));
                }
                for path in [&voice.model_path, &voice.tokens_path] {
                    if !Path::new(path).exists() {
                        return Err(TridentError::ConfigError(format!(
                            "TTS file not found for {}: {}",
                            voice.voice, path
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = IntegrationConfig::default();
        assert_eq!(config.dispatch, DispatchMode::Inline);
        assert_eq!(config.capture_mode, CaptureMode::Auto);
        assert!(config.history_path.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = IntegrationConfig::default()
            .without_audio_input()
            .without_audio_output()
            .with_history_path("data/HISTORY.json");

        assert!(!config.enable_audio_input);
        assert!(!config.enable_audio_output);
        assert_eq!(config.history_path, Some(PathBuf::from("data/HISTORY.json")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
enable_audio_input = false
enable_audio_output = false
dispatch = {{ queued = {{ capacity = 4 }} }}

[llm]
model_id = "qwen2.5"
context_budget = 2048
"#
        )
        .unwrap();

        let config = IntegrationConfig::load(file.path()).unwrap();
        assert_eq!(config.llm.model_id, "qwen2.5");
        assert_eq!(config.llm.context_budget, Some(2048));
        assert_eq!(config.llm.base_url, LLMConfig::default().base_url);
        assert_eq!(config.dispatch, DispatchMode::Queued { capacity: 4 });
    }

    #[test]
    fn test_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dispatch = 12").unwrap();
        let result = IntegrationConfig::load(file.path());
        assert!(matches!(result, Err(TridentError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_missing_models() {
        let mut config = IntegrationConfig::default().without_audio_output();
        config.enable_audio_input = true;
        config.stt.model_path = PathBuf::from("/nonexistent/ggml.bin");
        assert!(matches!(config.validate(), Err(TridentError::ConfigError(_))));

        let mut config = IntegrationConfig::default().without_audio_input();
        config.enable_audio_output = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_queue() {
        let config = IntegrationConfig::default()
            .without_audio_input()
            .without_audio_output()
            .with_dispatch(DispatchMode::Queued { capacity: 0 });
        assert!(config.validate().is_err());
    }
}
