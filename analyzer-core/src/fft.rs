//! # Fast Fourier Transform (FFT) Module
//!
//! Magnitude spectra of single analysis frames, used to refine the YIN
//! estimates of the pitch extractor.
//!
//! ## Features
//! - FFT of any frame length via RustFFT, with the plan cached per analyzer
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Computes magnitude spectra of frames with a fixed length.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    frame_size: usize,
}

impl SpectrumAnalyzer {
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(frame_size),
            frame_size,
        }
    }

    /// Magnitudes of the positive-frequency half of the spectrum of `frame`.
    ///
    /// The frame goes through DC offset removal and a Hann window first.
    /// Shorter frames are zero-padded, longer ones truncated.
    ///
    /// # Returns
    /// * `Vec<f32>` - `frame_size / 2` magnitudes, bin `k` at
    ///   `k * sample_rate / frame_size` Hz
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        let mut processed = frame[..frame.len().min(self.frame_size)].to_vec();
        remove_dc_offset(&mut processed);
        apply_hann_window(&mut processed);
        processed.resize(self.frame_size, 0.0);

        let mut buffer: Vec<Complex<f32>> = processed
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        self.fft.process(&mut buffer);

        buffer
            .iter()
            .take(self.frame_size / 2)
            .map(|c| c.norm())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let frame_size = 1024;
        let sample_rate = 8192.0;
        // Exactly bin 32.
        let freq = 256.0;
        let frame: Vec<f32> = (0..frame_size)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mags = SpectrumAnalyzer::new(frame_size).magnitudes(&frame);
        assert_eq!(mags.len(), frame_size / 2);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(32));
    }
}
