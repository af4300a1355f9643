use crate::{Result, TridentError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames per channel handed to rubato in one call
const CHUNK_FRAMES: usize = 1024;

/// Sinc resampler converting interleaved audio between sample rates
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    ratio: f64,
    channels: usize,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(TridentError::AudioProcessingError(
                "Sample rates must be greater than 0".into(),
            ));
        }
        if channels == 0 {
            return Err(TridentError::AudioProcessingError(
                "Number of channels must be greater than 0".into(),
            ));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler =
            SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, channels as usize).map_err(
                |e| TridentError::AudioProcessingError(format!("Failed to create resampler: {}", e)),
            )?;

        debug!(
            "Created resampler: {} Hz -> {} Hz, {} channels",
            input_rate, output_rate, channels
        );

        Ok(Self {
            resampler,
            ratio,
            channels: channels as usize,
        })
    }

    /// Resample interleaved samples. The last partial chunk is zero-padded
    /// and its output trimmed to the proportional length.
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let chunk = self.resampler.input_frames_max();
        let total_frames = input.len() / self.channels;
        let mut output =
            Vec::with_capacity((total_frames as f64 * self.ratio * 1.1) as usize * self.channels);

        for start in (0..total_frames).step_by(chunk) {
            let frames = (total_frames - start).min(chunk);

            let mut planar = vec![vec![0.0f32; chunk]; self.channels];
            for frame in 0..frames {
                let base = (start + frame) * self.channels;
                for (ch, lane) in planar.iter_mut().enumerate() {
                    lane[frame] = input[base + ch];
                }
            }

            let processed = self.resampler.process(&planar, None).map_err(|e| {
                TridentError::AudioProcessingError(format!("Resampling failed: {}", e))
            })?;

            let produced = processed[0].len();
            let keep = if frames < chunk {
                ((frames as f64) * self.ratio).ceil() as usize
            } else {
                produced
            };
            for frame in 0..keep.min(produced) {
                for lane in &processed {
                    output.push(lane[frame]);
                }
            }
        }

        debug!(
            "Resampled {} frames -> {} frames",
            total_frames,
            output.len() / self.channels
        );
        Ok(output)
    }
}

/// Resample in one step; a no-op when the rates already match
pub fn resample_audio(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
    channels: u16,
) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }
    AudioResampler::new(input_rate, output_rate, channels)?.resample(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters() {
        assert!(AudioResampler::new(0, 16000, 1).is_err());
        assert!(AudioResampler::new(16000, 0, 1).is_err());
        assert!(AudioResampler::new(16000, 48000, 0).is_err());
    }

    #[test]
    fn test_downsample_to_speech_rate() {
        let input: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample_audio(&input, 48000, 16000, 1).unwrap();

        let expected = 16000usize;
        assert!(output.len().abs_diff(expected) < 400, "{}", output.len());
    }

    #[test]
    fn test_upsample_stereo_keeps_interleaving() {
        let input = vec![0.0f32; 2 * 2048];
        let output = resample_audio(&input, 22050, 44100, 2).unwrap();
        assert_eq!(output.len() % 2, 0);
        assert!(output.len() > input.len());
    }

    #[test]
    fn test_same_rate_is_copy() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_audio(&input, 16000, 16000, 1).unwrap(), input);
    }

    #[test]
    fn test_empty_input() {
        let mut resampler = AudioResampler::new(16000, 48000, 1).unwrap();
        assert!(resampler.resample(&[]).unwrap().is_empty());
    }
}
