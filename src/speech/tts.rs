//! Text-to-speech collaborator and voice selection
//!
//! Each conversation language has one [`VoiceProfile`]. Synthesizers turn a
//! normalised sentence into a mono waveform with the profile's voice; the
//! VITS implementation (feature `sherpa`) keeps one loaded model per
//! language.

use crate::messages::types::AudioData;
use crate::speech::language::Language;
use crate::{Result, TridentError};
use serde::{Deserialize, Serialize};

/// Default sample rate for VITS TTS output (22050 Hz typical for Piper models)
pub const VITS_SAMPLE_RATE: u32 = 22050;

/// Renders text as audio
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<AudioData>;
}

/// Voice used for one language
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceProfile {
    /// Language this voice speaks
    pub language: Language,

    /// Human-readable voice name, shown in logs
    pub voice: String,

    /// Path to the ONNX model file
    pub model_path: String,

    /// Path to the tokens file
    pub tokens_path: String,

    /// Path to the lexicon file (optional for some models)
    pub lexicon_path: Option<String>,

    /// Path to the espeak-ng data directory (optional)
    pub data_dir: Option<String>,

    /// Speaking rate; 1.3 is 30% faster than the model's natural pace
    pub speed: f32,

    /// Speaker ID for multi-speaker models
    pub speaker_id: i32,

    /// Noise scale for variation
    pub noise_scale: f32,

    /// Noise scale width
    pub noise_scale_w: f32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self::for_language(Language::En)
    }
}

impl VoiceProfile {
    /// Default voice for a language, model paths left empty
    pub fn for_language(language: Language) -> Self {
        let voice = match language {
            Language::En => "en_GB-sonia",
            Language::Ua => "uk_UA-polina",
        };
        Self {
            language,
            voice: voice.to_string(),
            model_path: String::new(),
            tokens_path: String::new(),
            lexicon_path: None,
            data_dir: None,
            speed: 1.3,
            speaker_id: 0,
            noise_scale: 0.667,
            noise_scale_w: 0.8,
        }
    }

    pub fn with_model(mut self, model_path: impl Into<String>, tokens_path: impl Into<String>) -> Self {
        self.model_path = model_path.into();
        self.tokens_path = tokens_path.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_speaker(mut self, speaker_id: i32) -> Self {
        self.speaker_id = speaker_id;
        self
    }
}

/// Configuration for speech output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TTSConfig {
    /// English voice; `None` leaves English sentences unspoken
    pub en: Option<VoiceProfile>,

    /// Ukrainian voice; `None` leaves Ukrainian sentences unspoken
    pub ua: Option<VoiceProfile>,

    /// Rate of the synthesized audio (resampled if the model differs)
    pub output_sample_rate: u32,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            en: Some(VoiceProfile::for_language(Language::En)),
            ua: Some(VoiceProfile::for_language(Language::Ua)),
            output_sample_rate: VITS_SAMPLE_RATE,
        }
    }
}

impl TTSConfig {
    pub fn with_voice(mut self, profile: VoiceProfile) -> Self {
        match profile.language {
            Language::En => self.en = Some(profile),
            Language::Ua => self.ua = Some(profile),
        }
        self
    }

    pub fn without_voice(mut self, language: Language) -> Self {
        match language {
            Language::En => self.en = None,
            Language::Ua => self.ua = None,
        }
        self
    }

    /// Voice profile for a language
    pub fn voice_for(&self, language: Language) -> Result<&VoiceProfile> {
        let profile = match language {
            Language::En => self.en.as_ref(),
            Language::Ua => self.ua.as_ref(),
        };
        profile.ok_or_else(|| {
            TridentError::UnsupportedLanguageError(format!("no voice configured for {}", language))
        })
    }
}

/// Prepare text for synthesis.
///
/// Markdown emphasis, headings and code ticks are removed for both
/// languages; symbols are spelled out in the voice's language; English text
/// additionally gets abbreviations, ordinals and clock times expanded.
pub fn normalize_text_for_tts(text: &str, language: Language) -> String {
    // Ukrainian apostrophes come in several code points; voices know only '
    let mut result: String = strip_markdown(text)
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{02BC}' => '\'',
            other => other,
        })
        .collect();

    let symbols: &[(&str, &str)] = match language {
        Language::En => &[
            ("&", " and "),
            ("%", " percent"),
            ("@", " at "),
            ("$", " dollars "),
            ("€", " euros "),
            ("£", " pounds "),
            ("+", " plus "),
            ("=", " equals "),
        ],
        Language::Ua => &[
            ("&", " і "),
            ("%", " відсотків"),
            ("@", " собака "),
            ("$", " доларів "),
            ("€", " євро "),
            ("₴", " гривень "),
            ("+", " плюс "),
            ("=", " дорівнює "),
        ],
    };
    for (symbol, spoken) in symbols {
        result = result.replace(symbol, spoken);
    }

    if language == Language::En {
        result = expand_abbreviations(&result);
        result = expand_ordinals(&result);
        result = expand_time_format(&result);
    }

    result
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"«»…()".contains(*c)
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn strip_markdown(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start().trim_start_matches('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .replace("**", "")
        .replace("__", "")
        .chars()
        .filter(|c| !matches!(c, '*' | '`' | '#'))
        .collect()
}

/// Whole-word abbreviation expansion, so "begin." never becomes "beginches"
fn expand_abbreviations(text: &str) -> String {
    const ABBREVIATIONS: &[(&str, &str)] = &[
        ("Mr.", "Mister"),
        ("Mrs.", "Misses"),
        ("Ms.", "Miss"),
        ("Dr.", "Doctor"),
        ("Prof.", "Professor"),
        ("Jr.", "Junior"),
        ("Sr.", "Senior"),
        ("vs.", "versus"),
        ("etc.", "etcetera"),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
        ("approx.", "approximately"),
        ("hrs.", "hours"),
        ("mins.", "minutes"),
        ("km.", "kilometers"),
        ("kg.", "kilograms"),
    ];

    text.split(' ')
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(abbrev, _)| *abbrev == word)
                .map(|(_, expansion)| *expansion)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expand ordinal numbers (1st, 2nd, 3rd, ...) up to 31st
fn expand_ordinals(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let trimmed = word.trim_end_matches(|c: char| !c.is_alphanumeric());
            let tail = &word[trimmed.len()..];
            match ordinal_word(trimmed) {
                Some(spoken) => format!("{}{}", spoken, tail),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn ordinal_word(token: &str) -> Option<String> {
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &token[digits.len()..];
    if !matches!(suffix, "st" | "nd" | "rd" | "th") {
        return None;
    }
    let n: u32 = digits.parse().ok()?;

    const ORDINALS: [&str; 20] = [
        "zeroth", "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth",
        "ninth", "tenth", "eleventh", "twelfth", "thirteenth", "fourteenth", "fifteenth",
        "sixteenth", "seventeenth", "eighteenth", "nineteenth",
    ];
    match n {
        0..=19 => Some(ORDINALS[n as usize].to_string()),
        20 => Some("twentieth".to_string()),
        21..=29 => Some(format!("twenty-{}", ORDINALS[(n - 20) as usize])),
        30 => Some("thirtieth".to_string()),
        31 => Some("thirty-first".to_string()),
        _ => None,
    }
}

/// Expand clock times ("3:30" -> "three thirty", "7:00" -> "seven o'clock")
fn expand_time_format(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            result.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let hours: String = chars[start..i].iter().collect();

        let minutes_end = i + 3;
        let is_time = hours.len() <= 2
            && minutes_end <= chars.len()
            && chars[i] == ':'
            && chars[i + 1].is_ascii_digit()
            && chars[i + 2].is_ascii_digit()
            && chars.get(minutes_end).map_or(true, |c| !c.is_ascii_digit());

        if is_time {
            let minutes: String = chars[i + 1..minutes_end].iter().collect();
            let hour_words = number_to_words(&hours);
            if minutes == "00" {
                result.push_str(&format!("{} o'clock", hour_words));
            } else if minutes.starts_with('0') {
                result.push_str(&format!("{} oh {}", hour_words, number_to_words(&minutes)));
            } else {
                result.push_str(&format!("{} {}", hour_words, number_to_words(&minutes)));
            }
            i = minutes_end;
        } else {
            result.push_str(&hours);
        }
    }

    result
}

/// Convert a number string below one thousand to words
fn number_to_words(num_str: &str) -> String {
    let num: u32 = match num_str.parse() {
        Ok(n) => n,
        Err(_) => return num_str.to_string(),
    };

    const ONES: [&str; 20] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];

    match num {
        0..=19 => ONES[num as usize].to_string(),
        20..=99 => {
            let (t, o) = ((num / 10) as usize, (num % 10) as usize);
            if o == 0 {
                TENS[t].to_string()
            } else {
                format!("{}-{}", TENS[t], ONES[o])
            }
        }
        100..=999 => {
            let (h, rem) = ((num / 100) as usize, num % 100);
            if rem == 0 {
                format!("{} hundred", ONES[h])
            } else {
                format!("{} hundred {}", ONES[h], number_to_words(&rem.to_string()))
            }
        }
        _ => num_str.to_string(),
    }
}

#[cfg(feature = "sherpa")]
pub use vits::VitsSynthesizer;

#[cfg(feature = "sherpa")]
mod vits {
    use super::{normalize_text_for_tts, SpeechSynthesizer, TTSConfig, VoiceProfile};
    use crate::audio::resampler::resample_audio;
    use crate::messages::types::AudioData;
    use crate::speech::language::Language;
    use crate::{Result, TridentError};
    use parking_lot::Mutex;
    use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
    use std::path::Path;
    use tracing::{debug, info};

    /// VITS synthesis with one loaded model per language
    pub struct VitsSynthesizer {
        en: Option<Mutex<VitsTts>>,
        ua: Option<Mutex<VitsTts>>,
        output_sample_rate: u32,
    }

    impl VitsSynthesizer {
        pub fn new(config: &TTSConfig) -> Result<Self> {
            Ok(Self {
                en: config.en.as_ref().map(load_model).transpose()?,
                ua: config.ua.as_ref().map(load_model).transpose()?,
                output_sample_rate: config.output_sample_rate,
            })
        }

        fn engine(&self, language: Language) -> Result<&Mutex<VitsTts>> {
            let engine = match language {
                Language::En => self.en.as_ref(),
                Language::Ua => self.ua.as_ref(),
            };
            engine.ok_or_else(|| {
                TridentError::UnsupportedLanguageError(format!("no VITS model loaded for {}", language))
            })
        }
    }

    fn load_model(profile: &VoiceProfile) -> Result<Mutex<VitsTts>> {
        if profile.model_path.is_empty() || profile.tokens_path.is_empty() {
            return Err(TridentError::ConfigError(format!(
                "Voice {} needs model_path and tokens_path",
                profile.voice
            )));
        }
        for path in [&profile.model_path, &profile.tokens_path] {
            if !Path::new(path).exists() {
                return Err(TridentError::ModelLoadError(format!("Not found: {}", path)));
            }
        }

        info!("Loading VITS voice {} from {}", profile.voice, profile.model_path);
        let config = VitsTtsConfig {
            model: profile.model_path.clone(),
            tokens: profile.tokens_path.clone(),
            lexicon: profile.lexicon_path.clone().unwrap_or_default(),
            data_dir: profile.data_dir.clone().unwrap_or_default(),
            noise_scale: profile.noise_scale,
            noise_scale_w: profile.noise_scale_w,
            ..Default::default()
        };
        Ok(Mutex::new(VitsTts::new(config)))
    }

    impl SpeechSynthesizer for VitsSynthesizer {
        fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<AudioData> {
            let normalized = normalize_text_for_tts(text, voice.language);
            if normalized.is_empty() {
                return Ok(AudioData::mono(Vec::new(), self.output_sample_rate));
            }

            debug!("Synthesizing ({}): {}", voice.voice, normalized);
            let audio = self
                .engine(voice.language)?
                .lock()
                .create(&normalized, voice.speaker_id, voice.speed)
                .map_err(|e| TridentError::SynthesisError(format!("Synthesis failed: {}", e)))?;

            let model_rate = audio.sample_rate as u32;
            let samples = resample_audio(&audio.samples, model_rate, self.output_sample_rate, 1)?;
            Ok(AudioData::mono(samples, self.output_sample_rate))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voices() {
        let config = TTSConfig::default();
        assert_eq!(config.voice_for(Language::En).unwrap().voice, "en_GB-sonia");
        assert_eq!(config.voice_for(Language::Ua).unwrap().language, Language::Ua);
        assert_eq!(config.voice_for(Language::Ua).unwrap().speed, 1.3);
    }

    #[test]
    fn test_missing_voice_is_unsupported() {
        let config = TTSConfig::default().without_voice(Language::Ua);
        assert!(matches!(
            config.voice_for(Language::Ua),
            Err(TridentError::UnsupportedLanguageError(_))
        ));
        assert!(config.voice_for(Language::En).is_ok());
    }

    #[test]
    fn test_with_voice_replaces_by_language() {
        let config = TTSConfig::default().with_voice(
            VoiceProfile::for_language(Language::Ua)
                .with_model("uk.onnx", "tokens.txt")
                .with_speed(1.0),
        );
        let ua = config.voice_for(Language::Ua).unwrap();
        assert_eq!(ua.model_path, "uk.onnx");
        assert_eq!(ua.speed, 1.0);
    }

    #[test]
    fn test_markdown_is_stripped() {
        let text = "## Summary\n**Bold** and `code` *here*.";
        assert_eq!(
            normalize_text_for_tts(text, Language::En),
            "Summary Bold and code here."
        );
    }

    #[test]
    fn test_emphasis_label_is_spoken_plainly() {
        assert_eq!(normalize_text_for_tts(" **Крок один**:", Language::Ua), "Крок один:");
    }

    #[test]
    fn test_normalize_abbreviations() {
        assert_eq!(
            normalize_text_for_tts("Dr. Smith vs. Mr. Jones", Language::En),
            "Doctor Smith versus Mister Jones"
        );
        // Word endings are never mistaken for abbreviations
        assert_eq!(normalize_text_for_tts("Let us begin.", Language::En), "Let us begin.");
    }

    #[test]
    fn test_normalize_symbols_per_language() {
        assert_eq!(normalize_text_for_tts("A & B", Language::En), "A and B");
        assert_eq!(normalize_text_for_tts("50%", Language::En), "50 percent");
        assert_eq!(normalize_text_for_tts("А & Б", Language::Ua), "А і Б");
        assert_eq!(normalize_text_for_tts("2 + 2", Language::Ua), "2 плюс 2");
    }

    #[test]
    fn test_normalize_ordinals_and_times() {
        assert_eq!(
            normalize_text_for_tts("The 1st and 22nd.", Language::En),
            "The first and twenty-second."
        );
        assert_eq!(
            normalize_text_for_tts("Meet at 3:30 or 7:00.", Language::En),
            "Meet at three thirty or seven o'clock."
        );
        assert_eq!(normalize_text_for_tts("At 9:05", Language::En), "At nine oh five");
    }

    #[test]
    fn test_ukrainian_apostrophe_survives() {
        assert_eq!(normalize_text_for_tts("П\u{2019}ять м\u{02BC}ячів.", Language::Ua), "П'ять м'ячів.");
        assert_eq!(normalize_text_for_tts("П'ять.", Language::Ua), "П'ять.");
    }

    #[test]
    fn test_ukrainian_text_keeps_digits() {
        assert_eq!(normalize_text_for_tts("О 3:30.", Language::Ua), "О 3:30.");
    }

    #[test]
    fn test_number_to_words() {
        assert_eq!(number_to_words("0"), "zero");
        assert_eq!(number_to_words("15"), "fifteen");
        assert_eq!(number_to_words("42"), "forty-two");
        assert_eq!(number_to_words("100"), "one hundred");
        assert_eq!(number_to_words("123"), "one hundred twenty-three");
    }
}
