//! Sentence chunking of a streamed model reply
//!
//! Tokens are buffered until the text reaches a sentence terminator, then
//! handed out as [`SpeakableUnit`]s that can be synthesized while the rest
//! of the reply is still being generated.
//!
//! A boundary is found in two ways:
//! - the buffered text ends with a terminator (checked after every fragment),
//! - a terminator inside the buffer is followed by whitespace, or a blank
//!   line ends a paragraph, so one fragment can yield several units.

use crate::speech::language::{classify, Language};

/// Sentence-final markers. Longer markers are listed even when a shorter one
/// also matches, so the set reads as the full list of recognised endings.
pub const TERMINATORS: &[&str] = &[
    ".\"", "?\"", "!\"", ".»", "?»", "!»", "**:", "\n\n", ".", "!", "?", ":", ")", "…",
];

/// A terminator-bounded fragment of assistant text ready for speech
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeakableUnit {
    /// Exact reply text of this unit, including surrounding whitespace
    pub text: String,

    /// Voice language, decided from the text itself
    pub language: Language,
}

impl SpeakableUnit {
    /// Create a unit, classifying its language from the text
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let language = classify(&text);
        Self { text, language }
    }

    /// Whether the unit holds anything a voice could pronounce
    pub fn is_speakable(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }
}

/// Check if text ends with one of the [`TERMINATORS`]
pub fn ends_with_terminator(text: &str) -> bool {
    TERMINATORS.iter().any(|t| text.ends_with(t))
}

/// Streaming sentence splitter
///
/// Holds the text received since the last emitted unit. Concatenating every
/// emitted unit followed by [`finish`](Self::finish) reproduces the input.
#[derive(Clone, Debug, Default)]
pub struct SentenceChunker {
    pending: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment and take every unit it completes, in order
    pub fn feed(&mut self, fragment: &str) -> Vec<SpeakableUnit> {
        let mut units = Vec::new();
        if fragment.is_empty() {
            return units;
        }

        // Only the tail of the old buffer can form a boundary with new text
        let mut from = self.pending.len().saturating_sub(longest_terminator());
        while !self.pending.is_char_boundary(from) {
            from -= 1;
        }

        self.pending.push_str(fragment);
        while let Some(end) = find_boundary(&self.pending, from) {
            let rest = self.pending.split_off(end);
            let text = std::mem::replace(&mut self.pending, rest);
            units.push(SpeakableUnit::new(text));
            from = 0;
        }
        units
    }

    /// Text received since the last emitted unit
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// End of stream: take the unterminated remainder, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

fn longest_terminator() -> usize {
    TERMINATORS.iter().map(|t| t.len()).max().unwrap_or(0)
}

/// Byte offset just past the first boundary in `text`, looking at
/// characters that start at or after `from`
fn find_boundary(text: &str, from: usize) -> Option<usize> {
    for (i, c) in text[from..].char_indices() {
        let end = from + i + c.len_utf8();
        let head = &text[..end];
        let boundary = match text[end..].chars().next() {
            None => ends_with_terminator(head),
            Some(next) => {
                head.ends_with("\n\n") || (next.is_whitespace() && ends_with_terminator(head))
            }
        };
        if boundary {
            return Some(end);
        }
    }
    None
}
