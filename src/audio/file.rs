use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use tracing::info;

/// A WAV file decoded to interleaved 16-bit samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (SampleFormat::Int, bits) if bits <= 32 => reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| scale_int(s, bits)))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(float_to_i16))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (format, bits) => {
                anyhow::bail!("Unsupported WAV sample format: {:?} {}-bit", format, bits)
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono s16le PCM bytes at `target_rate`, ready for streaming.
    ///
    /// Channels are averaged, then band-limited resampled if the rate differs.
    pub fn to_pcm16_mono(&self, target_rate: u32) -> Result<Vec<u8>> {
        if self.channels == 0 || self.sample_rate == 0 {
            anyhow::bail!(
                "Invalid audio format: {}Hz {}ch",
                self.sample_rate,
                self.channels
            );
        }

        let mono = downmix(&self.samples, self.channels as usize);
        let resampled = if self.sample_rate == target_rate {
            mono
        } else {
            info!("Resampling {}Hz -> {}Hz", self.sample_rate, target_rate);
            resample(&mono, self.sample_rate, target_rate)?
        };

        Ok(resampled.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

/// Rescale an integer sample of `bits` width to 16 bits
fn scale_int(sample: i32, bits: u16) -> i16 {
    if bits > 16 {
        (sample >> (bits - 16)) as i16
    } else {
        (sample << (16 - bits)) as i16
    }
}

fn float_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Average interleaved channels into one
fn downmix(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels == 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Input frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Creates a sinc resampler whose anti-aliasing filter sits just below the
/// lower of the two Nyquist frequencies.
fn create_resampler(from_rate: u32, to_rate: u32) -> Result<SincFixedIn<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        1.0,
        params,
        RESAMPLE_CHUNK,
        1, // mono
    )
    .context("Failed to create resampler")?;
    Ok(resampler)
}

fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Result<Vec<i16>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler = create_resampler(from_rate, to_rate)?;
    let input: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();

    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut chunks = input.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let out = resampler
            .process(&[chunk], None)
            .context("Resampling failed")?;
        output.extend_from_slice(&out[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest][..]), None)
            .context("Resampling failed")?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter tail
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .context("Resampling failed")?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    Ok(output
        .iter()
        .skip(delay)
        .take(expected)
        .map(|&s| float_to_i16(s))
        .collect())
}
