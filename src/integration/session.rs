//! One conversation: history, reply orchestration and capture routing
//!
//! The session is the boundary the binary talks to. Typed text and captured
//! audio both end up as tagged user turns in the same history the
//! orchestrator streams replies into.

use crate::integration::config::IntegrationConfig;
use crate::integration::orchestrator::{
    ConversationEvent, ResponseStreamOrchestrator, StreamState, TurnReport,
};
use crate::llm::backend::ModelBackend;
use crate::llm::config::BackendKind;
use crate::llm::prompts::build_system_prompt;
use crate::messages::history::ConversationHistory;
use crate::messages::storage::HistoryStore;
use crate::messages::types::{AudioData, UserPrompt};
use crate::speech::dispatcher::SpeechDispatcher;
use crate::speech::router::{CaptureMode, CaptureRouter};
use crate::{Result, TridentError};
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Session {
    orchestrator: ResponseStreamOrchestrator,
    router: Option<CaptureRouter>,
    store: Option<HistoryStore>,
    events: Option<Sender<ConversationEvent>>,
}

impl Session {
    pub fn new(orchestrator: ResponseStreamOrchestrator) -> Self {
        Self {
            orchestrator,
            router: None,
            store: None,
            events: None,
        }
    }

    pub fn with_router(mut self, router: CaptureRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Save the history here on [`save`](Self::save)
    pub fn with_store(mut self, store: HistoryStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Receive transcription failures; pass the same sender to the
    /// orchestrator for reply events
    pub fn with_events(mut self, events: Sender<ConversationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        self.orchestrator.history()
    }

    pub fn state(&self) -> StreamState {
        self.orchestrator.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.orchestrator.is_streaming()
    }

    pub fn can_transcribe(&self) -> bool {
        self.router.is_some()
    }

    /// Cancel the reply being streamed
    pub fn stop(&self) -> bool {
        self.orchestrator.stop()
    }

    /// Typed input, tagged by its script
    pub fn submit_text(&self, text: &str) -> Result<TurnReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TridentError::HistoryError("Empty prompt".to_string()));
        }
        self.submit_prompt(UserPrompt::typed(text))
    }

    pub fn submit_prompt(&self, prompt: UserPrompt) -> Result<TurnReport> {
        self.orchestrator.respond(prompt)
    }

    /// Transcribe captured speech and answer it.
    ///
    /// When nothing is recognized the history is left untouched and the
    /// `TranscriptionError` is returned.
    pub fn submit_audio(&self, audio: &AudioData, mode: CaptureMode) -> Result<TurnReport> {
        let router = self.router.as_ref().ok_or_else(|| {
            TridentError::ConfigError("Audio input is disabled".to_string())
        })?;

        let prompt = match router.route(audio, mode) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!("Transcription failed: {}", error);
                if let Some(events) = &self.events {
                    let _ = events.send(ConversationEvent::TranscriptionFailed {
                        error: error.clone(),
                    });
                }
                return Err(error);
            }
        };
        self.submit_prompt(prompt)
    }

    /// Drop every turn except the system prompt, stopping any reply first
    pub fn reset(&self) {
        self.orchestrator.reset();
        info!("Conversation reset");
    }

    /// Write the history to the configured store, if any
    pub fn save(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(self.orchestrator.history()),
            None => Ok(()),
        }
    }
}

/// Wire a session from configuration.
///
/// Adapters come from the enabled cargo features; asking for one that was
/// not compiled in is a `ConfigError`.
pub fn build_session(
    config: &IntegrationConfig,
    events: Option<Sender<ConversationEvent>>,
) -> Result<Session> {
    let system_prompt = build_system_prompt(config.system_prompt.as_deref());

    let store = config.history_path.as_ref().map(HistoryStore::new);
    let history = match &store {
        Some(store) => store.load(&system_prompt)?,
        None => ConversationHistory::new(system_prompt),
    };

    let mut orchestrator = ResponseStreamOrchestrator::new(build_backend(config)?, history)
        .with_context_budget(config.llm.context_budget);
    if config.enable_audio_output {
        orchestrator = orchestrator.with_dispatcher(Arc::new(build_dispatcher(config)?));
    }
    if let Some(events) = &events {
        orchestrator = orchestrator.with_events(events.clone());
    }

    let mut session = Session::new(orchestrator);
    if config.enable_audio_input {
        session = session.with_router(build_router(config)?);
    }
    if let Some(store) = store {
        session = session.with_store(store);
    }
    if let Some(events) = events {
        session = session.with_events(events);
    }

    info!(
        "Session ready: backend {:?}, speech {}, transcription {}",
        config.llm.backend,
        if config.enable_audio_output { "on" } else { "off" },
        if config.enable_audio_input { "on" } else { "off" }
    );
    Ok(session)
}

fn build_backend(config: &IntegrationConfig) -> Result<Arc<dyn ModelBackend>> {
    match config.llm.backend {
        BackendKind::Ollama => ollama_backend(config),
        BackendKind::Mistral => mistral_backend(config),
    }
}

#[cfg(feature = "ollama")]
fn ollama_backend(config: &IntegrationConfig) -> Result<Arc<dyn ModelBackend>> {
    Ok(Arc::new(crate::llm::ollama::OllamaBackend::new(config.llm.clone())?))
}

#[cfg(not(feature = "ollama"))]
fn ollama_backend(_config: &IntegrationConfig) -> Result<Arc<dyn ModelBackend>> {
    Err(missing_feature("ollama"))
}

#[cfg(feature = "mistral")]
fn mistral_backend(config: &IntegrationConfig) -> Result<Arc<dyn ModelBackend>> {
    Ok(Arc::new(crate::llm::inference::MistralBackend::new(config.llm.clone())?))
}

#[cfg(not(feature = "mistral"))]
fn mistral_backend(_config: &IntegrationConfig) -> Result<Arc<dyn ModelBackend>> {
    Err(missing_feature("mistral"))
}

#[cfg(all(feature = "sherpa", feature = "audio-io"))]
fn build_dispatcher(config: &IntegrationConfig) -> Result<SpeechDispatcher> {
    use crate::audio::playback::CpalPlayer;
    use crate::speech::tts::VitsSynthesizer;

    SpeechDispatcher::new(
        Arc::new(VitsSynthesizer::new(&config.tts)?),
        Arc::new(CpalPlayer::new()?),
        config.tts.clone(),
        config.dispatch,
    )
}

#[cfg(not(all(feature = "sherpa", feature = "audio-io")))]
fn build_dispatcher(_config: &IntegrationConfig) -> Result<SpeechDispatcher> {
    Err(missing_feature("sherpa and audio-io"))
}

#[cfg(feature = "whisper")]
fn build_router(config: &IntegrationConfig) -> Result<CaptureRouter> {
    use crate::speech::stt::{load_context, WhisperLanguageIdentifier, WhisperTranscriber};

    let stt = &config.stt;
    let context = load_context(&stt.model_path)?;
    let ua_context = if stt.ua_model() == &stt.model_path {
        Arc::clone(&context)
    } else {
        load_context(stt.ua_model())?
    };

    Ok(CaptureRouter::new(
        Arc::new(
            WhisperTranscriber::new(Arc::clone(&context), "en", stt.n_threads)
                .with_timestamps(stt.print_timestamps),
        ),
        Arc::new(
            WhisperTranscriber::new(ua_context, "uk", stt.n_threads)
                .with_timestamps(stt.print_timestamps),
        ),
        Arc::new(WhisperLanguageIdentifier::new(context, stt.n_threads)),
    ))
}

#[cfg(not(feature = "whisper"))]
fn build_router(_config: &IntegrationConfig) -> Result<CaptureRouter> {
    Err(missing_feature("whisper"))
}

#[allow(dead_code)]
fn missing_feature(feature: &str) -> TridentError {
    TridentError::ConfigError(format!(
        "This build has no {} support; rebuild with the feature enabled or turn it off in the config",
        feature
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::TokenStream;
    use crate::messages::types::{Role, Turn};
    use crate::speech::language::Language;
    use crate::speech::stt::{LanguageIdentifier, Transcriber, Transcription};
    use crossbeam_channel::unbounded;

    struct Echo;

    impl ModelBackend for Echo {
        fn send(&self, history: &[Turn]) -> Result<TokenStream> {
            let last = history.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(TokenStream::from_fragments(vec!["You said: ".to_string(), last]))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct Fixed(Transcription);

    impl Transcriber for Fixed {
        fn transcribe(&self, _audio: &AudioData) -> Result<Transcription> {
            Ok(self.0.clone())
        }
    }

    struct Label;

    impl LanguageIdentifier for Label {
        fn identify(&self, _audio: &AudioData) -> Result<String> {
            Ok("en: English".to_string())
        }
    }

    fn session(en: Transcription) -> Session {
        let orchestrator =
            ResponseStreamOrchestrator::new(Arc::new(Echo), ConversationHistory::new("system"));
        Session::new(orchestrator).with_router(CaptureRouter::new(
            Arc::new(Fixed(en)),
            Arc::new(Fixed(Transcription::Unrecognized)),
            Arc::new(Label),
        ))
    }

    fn audio() -> AudioData {
        AudioData::mono(vec![0.1; 160], 16000)
    }

    #[test]
    fn test_typed_text_is_tagged() {
        let session = session(Transcription::Unrecognized);
        let report = session.submit_text("Привіт, як справи?").unwrap();

        assert_eq!(report.full_text, "You said: Привіт, як справи?");
        let turns = session.history().snapshot();
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].tag, Some(Language::Ua));
        assert_eq!(turns[2].role, Role::Assistant);
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let session = session(Transcription::Unrecognized);
        assert!(session.submit_text("   ").is_err());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_unrecognized_audio_leaves_history() {
        let (tx, rx) = unbounded();
        let session = session(Transcription::Unrecognized).with_events(tx);

        let result = session.submit_audio(&audio(), CaptureMode::En);
        assert!(matches!(result, Err(TridentError::TranscriptionError(_))));
        assert_eq!(session.history().len(), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(ConversationEvent::TranscriptionFailed { .. })
        ));
    }

    #[test]
    fn test_recognized_audio_is_answered() {
        let session = session(Transcription::Text("What time is it?".into()));
        let report = session.submit_audio(&audio(), CaptureMode::Auto).unwrap();
        assert_eq!(report.full_text, "You said: What time is it?");
        assert_eq!(session.history().snapshot()[1].tag, Some(Language::En));
    }

    #[test]
    fn test_audio_without_router() {
        let orchestrator =
            ResponseStreamOrchestrator::new(Arc::new(Echo), ConversationHistory::new("system"));
        let session = Session::new(orchestrator);
        assert!(!session.can_transcribe());
        assert!(matches!(
            session.submit_audio(&audio(), CaptureMode::En),
            Err(TridentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_save_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("HISTORY.json");
        let orchestrator =
            ResponseStreamOrchestrator::new(Arc::new(Echo), ConversationHistory::new("system"));
        let session = Session::new(orchestrator).with_store(HistoryStore::new(&path));

        session.submit_text("hello").unwrap();
        session.save().unwrap();
        let restored = HistoryStore::new(&path).load("system").unwrap();
        assert_eq!(restored.len(), 3);

        session.reset();
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_build_text_only_session() {
        let config = IntegrationConfig::default()
            .without_audio_input()
            .without_audio_output();
        let result = build_session(&config, None);
        if cfg!(feature = "ollama") {
            let session = result.unwrap();
            assert!(!session.can_transcribe());
            assert_eq!(session.state(), StreamState::Idle);
        } else {
            assert!(matches!(result, Err(TridentError::ConfigError(_))));
        }
    }
}
