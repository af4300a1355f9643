//! Lightweight text language classification
//!
//! Runs once per speakable unit on the live reply stream, so it is a plain
//! script check: any Cyrillic character means Ukrainian, anything else is
//! English. Audio-based identification lives in [`crate::speech::stt`].

use crate::{Result, TridentError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two conversation languages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    En,
    /// Ukrainian
    Ua,
}

impl Language {
    /// Short code used as the inline prompt marker ("en" / "ua")
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ua => "ua",
        }
    }

    /// Parse a language code. "uk" is accepted as an alias for Ukrainian.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ua" | "uk" => Ok(Language::Ua),
            other => Err(TridentError::UnsupportedLanguageError(other.to_string())),
        }
    }

    /// Tag for text the user typed.
    ///
    /// Typed prompts follow a different rule than the reply stream: any Latin
    /// letter makes the prompt English, so mixed input such as
    /// "Краще напишу/I'll write instead" is tagged EN.
    pub fn for_typed_text(text: &str) -> Self {
        if text.chars().any(|c| c.is_ascii_alphabetic()) {
            Language::En
        } else {
            Language::Ua
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Check whether a character falls in the Cyrillic block (U+0400..=U+04FF)
pub fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// Decide the speech language of a text fragment
pub fn classify(text: &str) -> Language {
    if text.chars().any(is_cyrillic) {
        Language::Ua
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_english() {
        assert_eq!(classify("Hello world."), Language::En);
    }

    #[test]
    fn test_classify_ukrainian() {
        assert_eq!(classify("Привіт світ!"), Language::Ua);
    }

    #[test]
    fn test_classify_empty_is_english() {
        assert_eq!(classify(""), Language::En);
    }

    #[test]
    fn test_single_cyrillic_char_wins() {
        assert_eq!(classify("The letter ї is Ukrainian."), Language::Ua);
        assert_eq!(classify("123 ... !?"), Language::En);
    }

    #[test]
    fn test_block_edges() {
        assert!(is_cyrillic('\u{0400}'));
        assert!(is_cyrillic('\u{04FF}'));
        assert!(!is_cyrillic('\u{0500}'));
        assert!(!is_cyrillic('z'));
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Language::from_code("EN").unwrap(), Language::En);
        assert_eq!(Language::from_code("ua").unwrap(), Language::Ua);
        assert_eq!(Language::from_code("uk").unwrap(), Language::Ua);
        assert!(matches!(
            Language::from_code("de"),
            Err(TridentError::UnsupportedLanguageError(_))
        ));
    }

    #[test]
    fn test_typed_text_tagging() {
        assert_eq!(Language::for_typed_text("Як справи?"), Language::Ua);
        assert_eq!(Language::for_typed_text("How are you?"), Language::En);
        assert_eq!(
            Language::for_typed_text("Краще напишу/I'll write instead"),
            Language::En
        );
    }
}
