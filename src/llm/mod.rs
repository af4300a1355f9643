//! Language model integration
//!
//! This module provides the reply side of the conversation: the backend
//! trait the orchestrator streams tokens from, the sentence chunker that
//! turns those tokens into speakable units, and the bundled backends.
//!
//! # Architecture
//!
//! - **backend**: `ModelBackend` trait and the channel-backed `TokenStream`
//! - **chunker**: Terminator-based splitting of streamed text
//! - **config**: Backend selection and inference parameters
//! - **prompts**: The bilingual system prompt
//! - **ollama**: HTTP chat-streaming backend (feature `ollama`)
//! - **inference**: In-process mistral.rs backend (feature `mistral`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use trident::llm::{LLMConfig, ModelBackend, OllamaBackend, SentenceChunker};
//!
//! let backend = OllamaBackend::new(LLMConfig::default())?;
//! let mut chunker = SentenceChunker::new();
//! for fragment in backend.send(&history.snapshot())? {
//!     for unit in chunker.feed(&fragment?) {
//!         println!("[{}] {}", unit.language, unit.text);
//!     }
//! }
//! ```

pub mod backend;
pub mod chunker;
pub mod config;
#[cfg(feature = "mistral")]
pub mod inference;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod prompts;

// Re-export commonly used types
pub use backend::{render_content, wire_messages, ModelBackend, TokenSink, TokenStream};
pub use chunker::{SentenceChunker, SpeakableUnit, TERMINATORS};
pub use config::{BackendKind, LLMConfig, QuantizationType};
#[cfg(feature = "mistral")]
pub use inference::MistralBackend;
#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;
pub use prompts::{build_system_prompt, SYSTEM_PROMPT};
