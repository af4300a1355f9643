//! End-to-end integration module
//!
//! This module provides the orchestration layer that connects all components
//! of the voice loop: Voice -> STT -> history -> LLM stream -> TTS -> Playback

mod config;
mod orchestrator;
mod session;

pub use config::IntegrationConfig;
pub use orchestrator::{ConversationEvent, ResponseStreamOrchestrator, StreamState, TurnReport};
pub use session::{build_session, Session};
