//! Model backend configuration

use serde::{Deserialize, Serialize};

/// Which model backend serves replies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A local Ollama server, streamed over HTTP
    #[default]
    Ollama,
    /// An in-process model loaded with mistral.rs
    Mistral,
}

/// Quantization type for in-process model weights
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizationType {
    /// No quantization (full precision)
    None,
    /// 4-bit quantization (Q4K)
    #[default]
    Q4K,
    /// 8-bit quantization (Q8_0)
    Q8_0,
    /// 4-bit quantization (Q4_0)
    Q4_0,
}

/// Configuration for the model backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Backend serving the model
    pub backend: BackendKind,

    /// Model name (Ollama tag, HuggingFace model ID or local path)
    pub model_id: String,

    /// Ollama server address
    pub base_url: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0+ = creative)
    pub temperature: f32,

    /// Quantization for in-process models
    pub quantization: QuantizationType,

    /// Token budget for the history sent with each request; `None` sends
    /// the whole log
    pub context_budget: Option<usize>,

    /// Upper bound on one whole streamed reply; `None` waits indefinitely
    pub request_timeout_secs: Option<u64>,

    /// Fragments buffered between the backend and the orchestrator
    pub stream_capacity: usize,

    /// Enable logging of inference details
    pub enable_logging: bool,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            model_id: "llama3.1".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            quantization: QuantizationType::Q4K,
            context_budget: None,
            request_timeout_secs: None,
            stream_capacity: 100,
            enable_logging: false,
        }
    }
}

impl LLMConfig {
    /// Create a new configuration for the specified model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_quantization(mut self, quantization: QuantizationType) -> Self {
        self.quantization = quantization;
        self
    }

    /// Limit the history sent per request to roughly `tokens` tokens
    pub fn with_context_budget(mut self, tokens: usize) -> Self {
        self.context_budget = Some(tokens);
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Enable inference logging
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LLMConfig::default();
        assert_eq!(config.backend, BackendKind::Ollama);
        assert_eq!(config.model_id, "llama3.1");
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.context_budget, None);
        assert_eq!(config.request_timeout_secs, None);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LLMConfig::new("qwen2.5")
            .with_backend(BackendKind::Mistral)
            .with_temperature(0.2)
            .with_context_budget(2048)
            .with_request_timeout(120)
            .with_logging(true);

        assert_eq!(config.model_id, "qwen2.5");
        assert_eq!(config.backend, BackendKind::Mistral);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.context_budget, Some(2048));
        assert_eq!(config.request_timeout_secs, Some(120));
        assert!(config.enable_logging);
    }

    #[test]
    fn test_partial_toml() {
        let config: LLMConfig = toml::from_str("model_id = \"mistral\"\nbackend = \"mistral\"").unwrap();
        assert_eq!(config.model_id, "mistral");
        assert_eq!(config.backend, BackendKind::Mistral);
        assert_eq!(config.base_url, "http://localhost:11434");
    }
}
