//! Model-stream collaborator interface
//!
//! A backend turns the conversation log into a lazy stream of text
//! fragments. Fragments travel over a crossbeam channel from whatever
//! thread or runtime produces them; a disconnected channel is the end of
//! the stream and an `Err` item is a failure of the stream.

use crate::messages::types::{Role, Turn};
use crate::{Result, TridentError};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

/// Producer of streamed replies
pub trait ModelBackend: Send + Sync {
    /// Start a reply to `history`. The returned stream is finite and cannot
    /// be restarted.
    fn send(&self, history: &[Turn]) -> Result<TokenStream>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Receiving end of a streamed reply
#[derive(Debug)]
pub struct TokenStream {
    rx: Receiver<Result<String>>,
}

/// Sending end of a streamed reply, held by the backend's producer
#[derive(Debug, Clone)]
pub struct TokenSink {
    tx: Sender<Result<String>>,
}

impl TokenStream {
    /// Create a connected sink/stream pair buffering up to `capacity` fragments
    pub fn channel(capacity: usize) -> (TokenSink, TokenStream) {
        let (tx, rx) = bounded(capacity.max(1));
        (TokenSink { tx }, TokenStream { rx })
    }

    /// A stream that yields the given fragments and ends
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Result<String>> = fragments.into_iter().map(|f| Ok(f.into())).collect();
        Self::from_items(items)
    }

    /// A stream that yields the given items, errors included, and ends
    pub fn from_items(items: Vec<Result<String>>) -> Self {
        let (sink, stream) = Self::channel(items.len());
        for item in items {
            let _ = sink.tx.send(item);
        }
        stream
    }

    /// Channel for use in `select!`. A disconnect means end of stream.
    pub fn receiver(&self) -> &Receiver<Result<String>> {
        &self.rx
    }
}

impl Iterator for TokenStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl TokenSink {
    /// Forward a fragment. Returns `false` once the stream has been dropped.
    pub fn send(&self, fragment: impl Into<String>) -> bool {
        self.tx.send(Ok(fragment.into())).is_ok()
    }

    /// Report a failure of the stream
    pub fn fail(&self, error: TridentError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// One chat message as model backends expect it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

/// Text of a turn as sent to the model.
///
/// The system prompt asks the model to answer in the language named by an
/// inline `ua:`/`en:` marker, so tagged user turns get that prefix here.
pub fn render_content(turn: &Turn) -> String {
    match (turn.role, turn.tag) {
        (Role::User, Some(tag)) => format!("{}: {}", tag.code(), turn.content),
        _ => turn.content.clone(),
    }
}

pub fn wire_messages(history: &[Turn]) -> Vec<WireMessage> {
    history
        .iter()
        .map(|turn| WireMessage {
            role: turn.role.as_str(),
            content: render_content(turn),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::types::UserPrompt;
    use crate::speech::language::Language;

    #[test]
    fn test_stream_yields_then_ends() {
        let stream = TokenStream::from_fragments(["Hi", "!"]);
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["Hi", "!"]);
    }

    #[test]
    fn test_stream_carries_errors() {
        let mut stream = TokenStream::from_items(vec![
            Ok("Par".to_string()),
            Err(TridentError::BackendTimeout("stalled".into())),
        ]);
        assert_eq!(stream.next(), Some(Ok("Par".to_string())));
        assert!(matches!(
            stream.next(),
            Some(Err(TridentError::BackendTimeout(_)))
        ));
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_sink_notices_dropped_stream() {
        let (sink, stream) = TokenStream::channel(4);
        assert!(sink.send("one"));
        drop(stream);
        assert!(!sink.send("two"));
    }

    #[test]
    fn test_tagged_user_turn_rendering() {
        let history = vec![
            Turn::system("sys"),
            Turn::user(UserPrompt::new(Language::Ua, "Привіт")),
            Turn::assistant("Привіт!"),
            Turn::user(UserPrompt::new(Language::En, "Thanks")),
        ];
        let wire = wire_messages(&history);

        assert_eq!(wire[0].content, "sys");
        assert_eq!(wire[1].content, "ua: Привіт");
        assert_eq!(wire[2].role, "assistant");
        assert_eq!(wire[2].content, "Привіт!");
        assert_eq!(wire[3].content, "en: Thanks");
        // The log itself keeps the marker out of the content
        assert_eq!(history[1].content, "Привіт");
    }
}
