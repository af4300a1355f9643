//! Orchestrator for one streamed assistant reply
//!
//! Connects the reply path: history -> model stream -> chunker -> speech.
//!
//! Each turn moves `Idle -> Streaming -> {Completed, Cancelled, Failed}`.
//! While streaming, every fragment is appended to the in-progress assistant
//! turn and fed to the chunker; each finished sentence is handed to the
//! speech dispatcher. The written transcript always holds every fragment
//! received, while a trailing fragment without a terminator is never spoken.

use crate::llm::backend::{ModelBackend, TokenStream};
use crate::llm::chunker::{SentenceChunker, SpeakableUnit};
use crate::messages::history::ConversationHistory;
use crate::messages::types::{Turn, UserPrompt};
use crate::speech::dispatcher::{SpeechDispatcher, SpeechReport};
use crate::utils::cancel::StopSignal;
use crate::utils::perf::Stopwatch;
use crate::{Result, TridentError};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of the reply stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Failed
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Cancelled => "cancelled",
            StreamState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of one assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub turn_id: Uuid,
    pub state: StreamState,
    /// Every fragment received, in order
    pub full_text: String,
    pub units_dispatched: usize,
    pub speech_failures: usize,
    /// Trailing text that never reached a terminator
    pub unspoken: Option<String>,
    pub first_token_ms: Option<u64>,
    pub total_ms: u64,
    pub error: Option<TridentError>,
}

/// Events for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// A user turn was added to the history
    UserTurn { turn_id: Uuid, prompt: UserPrompt },

    StateChanged { turn_id: Uuid, state: StreamState },

    /// Fragment of the assistant reply
    Token { turn_id: Uuid, text: String },

    /// A unit was handed to the speech dispatcher
    Speaking { turn_id: Uuid, unit: SpeakableUnit },

    /// A unit was skipped after a synthesis or playback failure
    SpeechFailed {
        turn_id: Uuid,
        unit: SpeakableUnit,
        error: TridentError,
    },

    TurnFinished(TurnReport),

    /// Captured speech produced no prompt
    TranscriptionFailed { error: TridentError },
}

/// Transient per-turn stream state
#[derive(Debug, Default)]
struct StreamCursor {
    chunker: SentenceChunker,
    full_text: String,
    units_dispatched: usize,
    speech_failures: usize,
}

enum Outcome {
    Completed,
    Cancelled,
    Failed(TridentError),
}

/// Drives one assistant reply at a time
pub struct ResponseStreamOrchestrator {
    backend: Arc<dyn ModelBackend>,
    history: ConversationHistory,
    dispatcher: Option<Arc<SpeechDispatcher>>,
    events: Option<Sender<ConversationEvent>>,
    context_budget: Option<usize>,
    state: Mutex<StreamState>,
    current_stop: Mutex<StopSignal>,
    turn_lock: Mutex<()>,
}

impl ResponseStreamOrchestrator {
    /// Create an orchestrator that writes replies into `history`.
    /// Without a dispatcher replies are text only.
    pub fn new(backend: Arc<dyn ModelBackend>, history: ConversationHistory) -> Self {
        Self {
            backend,
            history,
            dispatcher: None,
            events: None,
            context_budget: None,
            state: Mutex::new(StreamState::Idle),
            current_stop: Mutex::new(StopSignal::new()),
            turn_lock: Mutex::new(()),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<SpeechDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_events(mut self, events: Sender<ConversationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Send at most this many estimated tokens of history per request
    pub fn with_context_budget(mut self, budget: Option<usize>) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == StreamState::Streaming
    }

    /// Cancel the streaming turn, if any. Returns `true` if this call
    /// stopped it.
    pub fn stop(&self) -> bool {
        if !self.is_streaming() {
            return false;
        }
        let triggered = self.current_stop.lock().trigger();
        if triggered {
            info!("Stop requested");
        }
        triggered
    }

    /// Drop every turn except the system prompt. A streaming turn is
    /// stopped and allowed to finish first.
    pub fn reset(&self) {
        self.stop();
        let _turn = self.turn_lock.lock();
        self.history.reset();
    }

    /// Append the user's prompt and stream the assistant's reply.
    ///
    /// A cancelled turn is a successful `TurnReport`; a failed model stream
    /// returns the backend's error after the partial reply is kept.
    pub fn respond(&self, prompt: UserPrompt) -> Result<TurnReport> {
        let _turn = self.turn_lock.lock();
        let turn_id = Uuid::new_v4();

        self.history.append(Turn::user(prompt.clone()))?;
        debug!("User turn {}: {}", turn_id, prompt);
        self.emit(ConversationEvent::UserTurn { turn_id, prompt });

        self.run_turn(turn_id)
    }

    /// Stream a reply to the history as it stands
    pub fn stream_reply(&self) -> Result<TurnReport> {
        let _turn = self.turn_lock.lock();
        self.run_turn(Uuid::new_v4())
    }

    fn run_turn(&self, turn_id: Uuid) -> Result<TurnReport> {
        let mut watch = Stopwatch::start();
        let stop = StopSignal::new();
        *self.current_stop.lock() = stop.clone();

        let request = match self.context_budget {
            Some(budget) => self.history.snapshot_within(budget),
            None => self.history.snapshot(),
        };

        if self.state().is_terminal() {
            self.set_state(turn_id, StreamState::Idle);
        }
        self.history.begin_assistant_turn()?;
        self.set_state(turn_id, StreamState::Streaming);
        info!(
            "Turn {} streaming from {} ({} turns)",
            turn_id,
            self.backend.name(),
            request.len()
        );

        let mut cursor = StreamCursor::default();
        let (report_tx, report_rx) = unbounded();

        let outcome = match self.backend.send(&request) {
            Ok(stream) => self.pump(turn_id, stream, &stop, &mut cursor, &mut watch, &report_tx, &report_rx),
            Err(e) => Outcome::Failed(e),
        };

        let outcome = match outcome {
            Outcome::Completed => {
                if let Some(dispatcher) = &self.dispatcher {
                    dispatcher.wait_idle(&stop);
                }
                if stop.is_stopped() {
                    Outcome::Cancelled
                } else {
                    Outcome::Completed
                }
            }
            other => other,
        };
        if stop.is_stopped() {
            self.history.sync();
        }
        self.history.finish_assistant_turn();
        self.drain_reports(turn_id, &report_rx, &mut cursor);

        let unspoken = cursor.chunker.finish();
        if let Some(rest) = &unspoken {
            debug!("Unspoken remainder: {:?}", rest);
        }

        let (state, error) = match outcome {
            Outcome::Completed => (StreamState::Completed, None),
            Outcome::Cancelled => (StreamState::Cancelled, None),
            Outcome::Failed(e) => (StreamState::Failed, Some(e)),
        };

        let report = TurnReport {
            turn_id,
            state,
            full_text: cursor.full_text,
            units_dispatched: cursor.units_dispatched,
            speech_failures: cursor.speech_failures,
            unspoken,
            first_token_ms: watch.first_ms(),
            total_ms: watch.elapsed_ms(),
            error: error.clone(),
        };

        self.set_state(turn_id, state);
        match &error {
            Some(e) => error!("Turn {} failed: {}", turn_id, e),
            None => info!(
                "Turn {} {}: {} chars, {} units, first token {:?} ms, total {} ms",
                turn_id,
                state,
                report.full_text.chars().count(),
                report.units_dispatched,
                report.first_token_ms,
                report.total_ms
            ),
        }
        self.emit(ConversationEvent::TurnFinished(report.clone()));

        match error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn pump(
        &self,
        turn_id: Uuid,
        stream: TokenStream,
        stop: &StopSignal,
        cursor: &mut StreamCursor,
        watch: &mut Stopwatch,
        report_tx: &Sender<SpeechReport>,
        report_rx: &Receiver<SpeechReport>,
    ) -> Outcome {
        loop {
            let item = select! {
                recv(stream.receiver()) -> item => item,
                recv(stop.receiver()) -> _ => return Outcome::Cancelled,
            };

            let fragment = match item {
                Ok(Ok(fragment)) => fragment,
                Ok(Err(e)) if e.is_turn_fatal() => return Outcome::Failed(e),
                Ok(Err(e)) => {
                    warn!("Turn {} skipping stream error: {}", turn_id, e);
                    continue;
                }
                Err(_) => return Outcome::Completed,
            };
            if fragment.is_empty() {
                continue;
            }

            match self.history.append_to_current_if_live(&fragment, stop) {
                Ok(true) => {}
                Ok(false) => return Outcome::Cancelled,
                Err(e) => return Outcome::Failed(e),
            }
            watch.mark_first();
            cursor.full_text.push_str(&fragment);
            self.emit(ConversationEvent::Token {
                turn_id,
                text: fragment.clone(),
            });

            for unit in cursor.chunker.feed(&fragment) {
                if !self.speak(turn_id, unit, stop, cursor, report_tx) {
                    return Outcome::Cancelled;
                }
                self.drain_reports(turn_id, report_rx, cursor);
            }
        }
    }

    /// Returns `false` if the stop signal refused the unit
    fn speak(
        &self,
        turn_id: Uuid,
        unit: SpeakableUnit,
        stop: &StopSignal,
        cursor: &mut StreamCursor,
        report_tx: &Sender<SpeechReport>,
    ) -> bool {
        if !unit.is_speakable() {
            debug!("Nothing to say in {:?}", unit.text);
            return true;
        }
        let dispatcher = match &self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => return true,
        };
        if stop.is_stopped() {
            return false;
        }

        debug!("Speaking [{}] {:?}", unit.language, unit.text);
        self.emit(ConversationEvent::Speaking {
            turn_id,
            unit: unit.clone(),
        });
        if !dispatcher.dispatch(unit, stop, report_tx) {
            return false;
        }
        cursor.units_dispatched += 1;
        true
    }

    fn drain_reports(
        &self,
        turn_id: Uuid,
        report_rx: &Receiver<SpeechReport>,
        cursor: &mut StreamCursor,
    ) {
        for report in report_rx.try_iter() {
            if let Err(error) = report.result {
                warn!("Skipping unit {:?}: {}", report.unit.text, error);
                cursor.speech_failures += 1;
                self.emit(ConversationEvent::SpeechFailed {
                    turn_id,
                    unit: report.unit,
                    error,
                });
            }
        }
    }

    fn set_state(&self, turn_id: Uuid, state: StreamState) {
        *self.state.lock() = state;
        self.emit(ConversationEvent::StateChanged { turn_id, state });
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::language::Language;

    struct Scripted(Mutex<Vec<Vec<Result<String>>>>);

    impl Scripted {
        fn new(replies: Vec<Vec<Result<String>>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(replies)))
        }
    }

    impl ModelBackend for Scripted {
        fn send(&self, _history: &[Turn]) -> Result<TokenStream> {
            let mut replies = self.0.lock();
            if replies.is_empty() {
                return Err(TridentError::BackendUnavailable("no reply scripted".into()));
            }
            Ok(TokenStream::from_items(replies.remove(0)))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn ok(fragments: &[&str]) -> Vec<Result<String>> {
        fragments.iter().map(|f| Ok(f.to_string())).collect()
    }

    #[test]
    fn test_text_only_turn() {
        let history = ConversationHistory::new("system");
        let orchestrator =
            ResponseStreamOrchestrator::new(Scripted::new(vec![ok(&["Hi", "!", " Bye", "."])]), history.clone());

        let report = orchestrator
            .respond(UserPrompt::new(Language::En, "hello"))
            .unwrap();

        assert_eq!(report.state, StreamState::Completed);
        assert_eq!(report.full_text, "Hi! Bye.");
        assert_eq!(report.units_dispatched, 0);
        assert_eq!(report.unspoken, None);
        assert_eq!(history.last().unwrap().content, "Hi! Bye.");
        assert_eq!(orchestrator.state(), StreamState::Completed);
    }

    #[test]
    fn test_residual_is_reported_not_lost() {
        let history = ConversationHistory::new("system");
        let orchestrator = ResponseStreamOrchestrator::new(
            Scripted::new(vec![ok(&["Done.", " and then"])]),
            history.clone(),
        );

        let report = orchestrator.respond(UserPrompt::typed("go")).unwrap();
        assert_eq!(report.full_text, "Done. and then");
        assert_eq!(report.unspoken.as_deref(), Some(" and then"));
        assert_eq!(history.last().unwrap().content, "Done. and then");
    }

    #[test]
    fn test_failed_stream_keeps_partial_reply() {
        let history = ConversationHistory::new("system");
        let orchestrator = ResponseStreamOrchestrator::new(
            Scripted::new(vec![vec![
                Ok("Part".to_string()),
                Err(TridentError::BackendTimeout("stalled".into())),
            ]]),
            history.clone(),
        );

        let result = orchestrator.respond(UserPrompt::typed("go"));
        assert!(matches!(result, Err(TridentError::BackendTimeout(_))));
        assert_eq!(orchestrator.state(), StreamState::Failed);
        assert_eq!(history.last().unwrap().content, "Part");
        assert!(!history.in_progress());
    }

    #[test]
    fn test_local_stream_error_is_skipped() {
        let history = ConversationHistory::new("system");
        let orchestrator = ResponseStreamOrchestrator::new(
            Scripted::new(vec![vec![
                Ok("Still".to_string()),
                Err(TridentError::AudioProcessingError("bad frame".into())),
                Ok(" here.".to_string()),
            ]]),
            history.clone(),
        );

        let report = orchestrator.respond(UserPrompt::typed("go")).unwrap();
        assert_eq!(report.state, StreamState::Completed);
        assert_eq!(report.error, None);
        assert_eq!(history.last().unwrap().content, "Still here.");
    }

    #[test]
    fn test_events_follow_lifecycle() {
        let (tx, rx) = unbounded();
        let orchestrator = ResponseStreamOrchestrator::new(
            Scripted::new(vec![ok(&["Ok."]), ok(&["Again."])]),
            ConversationHistory::new("system"),
        )
        .with_events(tx);

        orchestrator.respond(UserPrompt::typed("one")).unwrap();
        orchestrator.respond(UserPrompt::typed("two")).unwrap();

        let states: Vec<StreamState> = rx
            .try_iter()
            .filter_map(|event| match event {
                ConversationEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                StreamState::Streaming,
                StreamState::Completed,
                StreamState::Idle,
                StreamState::Streaming,
                StreamState::Completed,
            ]
        );
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let orchestrator =
            ResponseStreamOrchestrator::new(Scripted::new(Vec::new()), ConversationHistory::new("s"));
        assert!(!orchestrator.stop());
        assert_eq!(orchestrator.state(), StreamState::Idle);
    }
}
