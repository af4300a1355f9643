//! Preparing captured audio for transcription
//!
//! Transcribers and the language identifier all take mono audio at the
//! speech rate (16 kHz); anything else is down-mixed and resampled here.

use crate::audio::resampler::resample_audio;
use crate::audio::wav::downmix;
use crate::messages::types::AudioData;
use crate::Result;
use tracing::debug;

/// Sample rate expected by speech models
pub const SPEECH_SAMPLE_RATE: u32 = 16000;

/// Down-mix to mono, remove DC offset and resample to `target_rate`
pub fn prepare_for_transcription(audio: &AudioData, target_rate: u32) -> Result<AudioData> {
    if audio.channels == 1 && audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }

    debug!(
        "Preparing audio: {} samples, {} Hz, {} channels",
        audio.samples.len(),
        audio.sample_rate,
        audio.channels
    );

    let mono = remove_dc_offset(&downmix(&audio.samples, audio.channels));
    let samples = resample_audio(&mono, audio.sample_rate, target_rate, 1)?;
    Ok(AudioData::mono(samples, target_rate))
}

/// Scale to a peak amplitude of 0.95
pub fn normalize_audio(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    if peak == 0.0 || peak.is_nan() {
        return samples.to_vec();
    }
    let gain = 0.95 / peak;
    samples.iter().map(|&s| s * gain).collect()
}

pub fn remove_dc_offset(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean: f32 = samples.iter().sum::<f32>() / samples.len() as f32;
    samples.iter().map(|&s| s - mean).collect()
}

/// Root-mean-square level of a block, used for speech energy detection
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
