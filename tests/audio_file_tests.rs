// Integration tests for WAV input used by the streaming CLI
//
// These tests write small WAV files with hound and verify that AudioFile turns
// them into the 16 kHz mono s16le stream the renderer expects.

use anyhow::Result;
use avatar_stream::audio::AudioFile;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_wav(dir: &TempDir, name: &str, spec: WavSpec, frames: usize) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let mut writer = WavWriter::create(&path, spec)?;

    for i in 0..frames {
        for channel in 0..spec.channels {
            match spec.sample_format {
                SampleFormat::Int => writer.write_sample((i as i16).wrapping_mul(3).wrapping_add(channel as i16))?,
                SampleFormat::Float => writer.write_sample(0.5f32)?,
            }
        }
    }
    writer.finalize()?;

    Ok(path)
}

fn spec(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: match sample_format {
            SampleFormat::Int => 16,
            SampleFormat::Float => 32,
        },
        sample_format,
    }
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "speech.wav", spec(16000, 1, SampleFormat::Int), 16000)?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 16000);
    assert!((audio.duration_seconds - 1.0).abs() < 1e-6);
    assert!(audio.path.contains("speech.wav"));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_mono_16k_passes_through_unchanged() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "mono.wav", spec(16000, 1, SampleFormat::Int), 1600)?;

    let audio = AudioFile::open(&path)?;
    let pcm = audio.to_pcm16_mono(16000)?;

    assert_eq!(pcm.len(), 3200);
    let expected: Vec<u8> = audio.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(pcm, expected);

    Ok(())
}

#[test]
fn test_stereo_48k_is_downmixed_and_resampled() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "stereo.wav", spec(48000, 2, SampleFormat::Int), 4800)?;

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.channels, 2);

    let pcm = audio.to_pcm16_mono(16000)?;

    // 100ms of 16 kHz mono
    assert_eq!(pcm.len(), 3200);

    Ok(())
}

#[test]
fn test_float_wav_is_converted() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(&dir, "float.wav", spec(16000, 1, SampleFormat::Float), 160)?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.samples.len(), 160);
    assert!(audio.samples.iter().all(|&s| s == 16383));

    Ok(())
}
