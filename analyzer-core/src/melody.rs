//! # Melody Extraction Module
//!
//! Built-in predominant-melody extractor for monophonic recordings. The
//! recording is cut into overlapping frames and each frame gets one YIN
//! estimate, optionally refined against the frame's spectrum.

use crate::audio;
use crate::features::PitchSample;
use crate::fft::SpectrumAnalyzer;
use crate::params::ParamSet;
use crate::pitch::{detect_pitch_yin, refine_from_spectrum};
use crate::stages::{ExtractorOutput, PitchExtractor};
use anyhow::{Result, ensure};
use log::debug;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// Frame-wise YIN extractor reading WAV files.
///
/// Uses the `pitch_extractor` parameters. Frames without a clear pitch, and
/// frames whose pitch falls outside `[min_frequency, max_frequency]`, are
/// reported as 0 Hz.
#[derive(Debug, Clone, Copy, Default)]
pub struct YinExtractor;

impl YinExtractor {
    /// Pitch track of an in-memory mono signal.
    pub fn track(
        &self,
        samples: &[f32],
        sample_rate: u32,
        params: &ParamSet,
    ) -> Result<Vec<PitchSample>> {
        let frame_size = params.count("frame_size")?;
        let hop_size = params.count("hop_size")?;
        let min_frequency = params.float("min_frequency")?;
        let max_frequency = params.float("max_frequency")?;
        let amplitude_threshold = params.float("amplitude_threshold")? as f32;
        let refine = params.flag("refine_with_spectrum")?;

        ensure!(frame_size >= 8, "frame_size must be at least 8 samples");
        ensure!(hop_size > 0, "hop_size must be positive");
        ensure!(sample_rate > 0, "sample rate must be positive");

        let spectrum = refine.then(|| SpectrumAnalyzer::new(frame_size));
        let frame_count = if samples.len() < frame_size {
            0
        } else {
            (samples.len() - frame_size) / hop_size + 1
        };

        let mut voiced = 0usize;
        let track: Vec<PitchSample> = (0..frame_count)
            .map(|i| {
                let start = i * hop_size;
                let frame = &samples[start..start + frame_size];
                let time = start as f64 / sample_rate as f64;

                let mut freq = detect_pitch_yin(frame, sample_rate, amplitude_threshold);
                if let (Some(rough), Some(analyzer)) = (freq, &spectrum) {
                    freq = refine_from_spectrum(&analyzer.magnitudes(frame), rough, sample_rate);
                }

                let freq = freq
                    .map(f64::from)
                    .filter(|f| (min_frequency..=max_frequency).contains(f))
                    .unwrap_or(0.0);
                if freq > 0.0 {
                    voiced += 1;
                }
                PitchSample::new(time, freq)
            })
            .collect();

        debug!("Extracted {} frames, {} voiced", track.len(), voiced);
        Ok(track)
    }

    fn settings(params: &ParamSet, sample_rate: u32) -> BTreeMap<String, Value> {
        const RECORDED: [&str; 4] = ["frame_size", "hop_size", "min_frequency", "max_frequency"];
        let mut settings: BTreeMap<String, Value> = RECORDED
            .into_iter()
            .filter_map(|key| {
                let value = serde_json::to_value(params.get(key)?).ok()?;
                Some((key.to_string(), value))
            })
            .collect();
        settings.insert("sample_rate".to_string(), json!(sample_rate));
        settings.insert("method".to_string(), json!("yin"));
        settings
    }
}

impl PitchExtractor for YinExtractor {
    fn run(&self, filepath: &Path, params: &ParamSet) -> Result<ExtractorOutput> {
        let audio = audio::load_mono(filepath)?;
        debug!(
            "Tracking {:.2} s of audio from {}",
            audio.duration_secs(),
            filepath.display()
        );
        let pitch = self.track(&audio.samples, audio.sample_rate, params)?;
        Ok(ExtractorOutput {
            settings: Self::settings(params, audio.sample_rate),
            pitch,
        })
    }
}
