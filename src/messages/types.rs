use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::speech::language::Language;

/// Language marker attached to every user-originated prompt
pub type PromptTag = Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mono waveform exchanged with capture, transcription and playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One message of the conversation log.
///
/// Serialized as a `{role, content}` record; `tag` is written only for
/// tagged user turns and the timestamp is not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<PromptTag>,
    #[serde(skip, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tag: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(prompt: UserPrompt) -> Self {
        Self {
            tag: Some(prompt.tag),
            ..Self::new(Role::User, prompt.text)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Same role, content and tag, ignoring when the turn was created
    pub fn same_message(&self, other: &Turn) -> bool {
        self.role == other.role && self.content == other.content && self.tag == other.tag
    }
}

/// User text together with the language it should be answered in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrompt {
    pub tag: PromptTag,
    pub text: String,
}

impl UserPrompt {
    pub fn new(tag: PromptTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }

    /// Tag typed text by its script (see [`Language::for_typed_text`])
    pub fn typed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            tag: Language::for_typed_text(&text),
            text,
        }
    }
}

impl fmt::Display for UserPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_record_shape() {
        let turn = Turn::user(UserPrompt::new(Language::Ua, "Привіт"));
        let json = serde_json::to_value(&turn).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "Привіт");
        assert_eq!(json["tag"], "ua");
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_untagged_record_parses() {
        let turn: Turn =
            serde_json::from_str(r#"{"role": "assistant", "content": "Hi!"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.tag, None);

        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("tag").is_none());
    }

    #[test]
    fn test_prompt_tag_stays_out_of_content() {
        let turn = Turn::user(UserPrompt::typed("What time is it?"));
        assert_eq!(turn.content, "What time is it?");
        assert_eq!(turn.tag, Some(Language::En));
    }

    #[test]
    fn test_audio_duration() {
        let audio = AudioData::mono(vec![0.0; 8000], 16000);
        assert!((audio.duration_seconds() - 0.5).abs() < f32::EPSILON);
        assert!(!audio.is_empty());
        assert_eq!(AudioData::mono(Vec::new(), 0).duration_seconds(), 0.0);
    }

    #[test]
    fn test_prompt_display_uses_marker() {
        let prompt = UserPrompt::new(Language::Ua, "Як справи?");
        assert_eq!(prompt.to_string(), "ua: Як справи?");
    }
}
