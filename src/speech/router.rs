//! Routing captured audio to the right transcriber
//!
//! The user either picks the language up front or lets the audio language
//! identifier decide. Either way the result is a [`UserPrompt`] tagged with
//! the language the reply should use.

use crate::audio::preprocessor::{prepare_for_transcription, SPEECH_SAMPLE_RATE};
use crate::messages::types::{AudioData, UserPrompt};
use crate::speech::language::Language;
use crate::speech::stt::{LanguageIdentifier, Transcriber, Transcription};
use crate::{Result, TridentError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identification codes treated as Ukrainian.
///
/// Polish, Russian and Belarusian speech is routed to the Ukrainian
/// transcriber as well; the identifier confuses them on short utterances.
const UA_LABEL_CODES: [&str; 4] = ["uk", "pl", "ru", "be"];

/// How the capture language is chosen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Ua,
    En,
    #[default]
    Auto,
}

impl FromStr for CaptureMode {
    type Err = TridentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ua" | "uk" => Ok(CaptureMode::Ua),
            "en" => Ok(CaptureMode::En),
            "auto" => Ok(CaptureMode::Auto),
            other => Err(TridentError::ConfigError(format!(
                "Unknown capture mode '{}', expected ua, en or auto",
                other
            ))),
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureMode::Ua => "ua",
            CaptureMode::En => "en",
            CaptureMode::Auto => "auto",
        })
    }
}

/// Map an identification label such as `"ru: Russian"` to a reply language
pub fn language_for_label(label: &str) -> Language {
    let code = label
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if UA_LABEL_CODES.contains(&code.as_str()) {
        Language::Ua
    } else {
        Language::En
    }
}

/// Picks a transcriber per utterance and tags the result
pub struct CaptureRouter {
    en: Arc<dyn Transcriber>,
    ua: Arc<dyn Transcriber>,
    identifier: Arc<dyn LanguageIdentifier>,
}

impl CaptureRouter {
    pub fn new(
        en: Arc<dyn Transcriber>,
        ua: Arc<dyn Transcriber>,
        identifier: Arc<dyn LanguageIdentifier>,
    ) -> Self {
        Self { en, ua, identifier }
    }

    /// Transcribe `audio` and tag it with its language.
    ///
    /// Fails with `TranscriptionError` when the audio is empty, the engine
    /// fails or nothing was recognized; no prompt is produced in that case.
    pub fn route(&self, audio: &AudioData, mode: CaptureMode) -> Result<UserPrompt> {
        if audio.is_empty() {
            return Err(TridentError::TranscriptionError("No audio captured".to_string()));
        }
        let audio = prepare_for_transcription(audio, SPEECH_SAMPLE_RATE)?;

        let language = match mode {
            CaptureMode::Ua => Language::Ua,
            CaptureMode::En => Language::En,
            CaptureMode::Auto => {
                let label = self.identifier.identify(&audio)?;
                let language = language_for_label(&label);
                info!("Identified '{}', transcribing as {}", label, language);
                language
            }
        };

        let transcriber = match language {
            Language::En => &self.en,
            Language::Ua => &self.ua,
        };

        match transcriber.transcribe(&audio)? {
            Transcription::Text(text) if !text.trim().is_empty() => {
                debug!("Recognized ({}): {}", language, text);
                Ok(UserPrompt::new(language, text.trim()))
            }
            _ => {
                warn!("Nothing recognized on the {} path", language);
                Err(TridentError::TranscriptionError(format!(
                    "unrecognized {} speech",
                    language
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedTranscriber {
        reply: Transcription,
        calls: Mutex<Vec<AudioData>>,
    }

    impl FixedTranscriber {
        fn new(reply: Transcription) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, audio: &AudioData) -> Result<Transcription> {
            self.calls.lock().push(audio.clone());
            Ok(self.reply.clone())
        }
    }

    struct FixedLabel(&'static str);

    impl LanguageIdentifier for FixedLabel {
        fn identify(&self, _audio: &AudioData) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn speech() -> AudioData {
        AudioData::mono(vec![0.1; 1600], 16000)
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(language_for_label("uk: Ukrainian"), Language::Ua);
        assert_eq!(language_for_label("pl: Polish"), Language::Ua);
        assert_eq!(language_for_label("be: Belarusian"), Language::Ua);
        assert_eq!(language_for_label("en: English"), Language::En);
        assert_eq!(language_for_label("de: German"), Language::En);
        assert_eq!(language_for_label(""), Language::En);
    }

    #[test]
    fn test_auto_routes_russian_to_ua() {
        let en = FixedTranscriber::new(Transcription::Text("hello".into()));
        let ua = FixedTranscriber::new(Transcription::Text("привіт".into()));
        let router = CaptureRouter::new(en.clone(), ua.clone(), Arc::new(FixedLabel("ru: Russian")));

        let prompt = router.route(&speech(), CaptureMode::Auto).unwrap();
        assert_eq!(prompt, UserPrompt::new(Language::Ua, "привіт"));
        assert_eq!(ua.calls.lock().len(), 1);
        assert!(en.calls.lock().is_empty());
    }

    #[test]
    fn test_explicit_mode_skips_identification() {
        let en = FixedTranscriber::new(Transcription::Text(" What time is it? ".into()));
        let ua = FixedTranscriber::new(Transcription::Unrecognized);
        let router = CaptureRouter::new(en, ua.clone(), Arc::new(FixedLabel("uk: Ukrainian")));

        let prompt = router.route(&speech(), CaptureMode::En).unwrap();
        assert_eq!(prompt.tag, Language::En);
        assert_eq!(prompt.text, "What time is it?");
        assert!(ua.calls.lock().is_empty());
    }

    #[test]
    fn test_unrecognized_en_fails() {
        let en = FixedTranscriber::new(Transcription::Unrecognized);
        let ua = FixedTranscriber::new(Transcription::Text("так".into()));
        let router = CaptureRouter::new(en, ua, Arc::new(FixedLabel("en: English")));

        let result = router.route(&speech(), CaptureMode::Auto);
        assert!(matches!(result, Err(TridentError::TranscriptionError(_))));
    }

    #[test]
    fn test_blank_text_fails() {
        let en = FixedTranscriber::new(Transcription::Text("   ".into()));
        let ua = FixedTranscriber::new(Transcription::Unrecognized);
        let router = CaptureRouter::new(en, ua, Arc::new(FixedLabel("en: English")));

        assert!(router.route(&speech(), CaptureMode::En).is_err());
        assert!(router.route(&speech(), CaptureMode::Ua).is_err());
    }

    #[test]
    fn test_audio_is_prepared() {
        let en = FixedTranscriber::new(Transcription::Text("hi".into()));
        let ua = FixedTranscriber::new(Transcription::Unrecognized);
        let router = CaptureRouter::new(en.clone(), ua, Arc::new(FixedLabel("en: English")));

        let stereo = AudioData::new(vec![0.2; 9600], 48000, 2);
        router.route(&stereo, CaptureMode::En).unwrap();

        let seen = &en.calls.lock()[0];
        assert_eq!(seen.channels, 1);
        assert_eq!(seen.sample_rate, SPEECH_SAMPLE_RATE);
    }

    #[test]
    fn test_empty_audio_fails() {
        let en = FixedTranscriber::new(Transcription::Text("hi".into()));
        let ua = FixedTranscriber::new(Transcription::Text("так".into()));
        let router = CaptureRouter::new(en.clone(), ua, Arc::new(FixedLabel("en: English")));

        let result = router.route(&AudioData::mono(Vec::new(), 16000), CaptureMode::En);
        assert!(matches!(result, Err(TridentError::TranscriptionError(_))));
        assert!(en.calls.lock().is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("UA".parse::<CaptureMode>().unwrap(), CaptureMode::Ua);
        assert_eq!("auto".parse::<CaptureMode>().unwrap(), CaptureMode::Auto);
        assert!("de".parse::<CaptureMode>().is_err());
    }
}
