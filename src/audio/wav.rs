use crate::messages::types::AudioData;
use crate::{Result, TridentError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::{debug, info};

fn wav_error(context: &str, e: hound::Error) -> TridentError {
    match e {
        hound::Error::IoError(io) => TridentError::IOError(format!("{}: {}", context, io)),
        other => TridentError::AudioProcessingError(format!("{}: {}", context, other)),
    }
}

/// Write audio as 16-bit PCM
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| wav_error("Failed to create WAV writer", e))?;
    for &sample in &audio.samples {
        let sample = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample)
            .map_err(|e| wav_error("Failed to write sample", e))?;
    }
    writer
        .finalize()
        .map_err(|e| wav_error("Failed to finalize WAV file", e))?;

    info!("Wrote {} samples to {:?}", audio.samples.len(), path.as_ref());
    Ok(())
}

/// Read a WAV file into interleaved `f32` samples
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let mut reader =
        WavReader::open(path.as_ref()).map_err(|e| wav_error("Failed to open WAV file", e))?;
    let spec = reader.spec();

    debug!(
        "Reading WAV file: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect(),
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
        (SampleFormat::Int, bits) => {
            return Err(TridentError::AudioProcessingError(format!(
                "Unsupported bit depth: {}",
                bits
            )))
        }
    }
    .map_err(|e| wav_error("Failed to read sample", e))?;

    Ok(AudioData::new(samples, spec.sample_rate, spec.channels))
}

/// Average interleaved channels into one
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Duplicate a mono signal across `channels` interleaved channels
pub fn upmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
        .collect()
}
