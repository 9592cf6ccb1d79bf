//! # Audio Input Module
//!
//! Loads a recording from a WAV file for batch analysis. Multi-channel
//! audio is mixed down to mono, and integer samples are scaled to the
//! `[-1.0, 1.0]` float range the pitch detector works on.

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader};
use log::debug;
use std::path::Path;

/// A mono recording held in memory.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Reads a WAV file and mixes it down to one channel.
///
/// The file is closed before this function returns, on success or failure.
///
/// # Arguments
/// * `path` - WAV file to read
///
/// # Returns
/// * `Ok(audio)` - Mono samples with the file's sample rate
/// * `Err(e)` - The file is missing, unreadable or has no channels
pub fn load_mono(path: &Path) -> Result<MonoAudio> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file {}", path.display()))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{} has no audio channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / full_scale))
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read integer samples")?
        }
    };

    let samples: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    debug!(
        "Loaded {}: {} Hz, {} channel(s), {} frames",
        path.display(),
        spec.sample_rate,
        channels,
        samples.len()
    );

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn stereo_int_files_are_mixed_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = load_mono(&path).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.samples.len(), 4);
        assert!(audio.samples.iter().all(|&s| (s - 0.25).abs() < 1e-6));
        assert!((audio.duration_secs() - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_mono(Path::new("/nonexistent/recording.wav")).unwrap_err();
        assert!(err.to_string().contains("recording.wav"));
    }
}
