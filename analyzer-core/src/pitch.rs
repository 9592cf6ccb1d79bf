//! # Pitch Detection Module
//!
//! Frame-level fundamental frequency estimation for monophonic melody.
//!
//! ## Features
//! - YIN pitch detection with octave error prevention
//! - Noise rejection and clarity checking
//! - Parabolic interpolation for sub-sample accuracy
//! - Spectrum refinement for improved precision

/// Normalized difference a dip must stay under to count as a clear period.
const CLARITY_THRESHOLD: f32 = 0.1;

/// YIN pitch detection on one frame.
///
/// Enhancements over plain YIN:
/// - Amplitude gating to skip silence
/// - The first dip close to the global minimum is taken, which avoids
///   octave errors
/// - Dips that are not clear enough are rejected as noise
///
/// # Arguments
/// * `signal` - One analysis frame
/// * `sample_rate` - Sample rate in Hz
/// * `amplitude_threshold` - Minimum RMS for pitch detection
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No pitch detected (silence, noise, or invalid signal)
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, amplitude_threshold: f32) -> Option<f32> {
    let frame_size = signal.len();
    let half = frame_size / 2;
    if half < 3 {
        return None;
    }
    let mut yin_buffer = vec![0.0; half];

    let rms = (signal.iter().map(|&s| s * s).sum::<f32>() / frame_size as f32).sqrt();
    if rms < amplitude_threshold {
        return None;
    }

    // Difference function
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // Cumulative mean normalized difference
    let mut running_sum = 0.0;
    yin_buffer[0] = 1.0;
    for tau in 1..half {
        running_sum += yin_buffer[tau];
        if running_sum != 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    let min_val = yin_buffer
        .iter()
        .skip(1)
        .cloned()
        .fold(f32::INFINITY, f32::min);
    let threshold = min_val + 0.05;

    let mut period = (2..half)
        .find(|&tau| yin_buffer[tau] < threshold && yin_buffer[tau] < yin_buffer[tau - 1])?;
    // Walk down to the bottom of the dip.
    while period + 1 < half && yin_buffer[period + 1] < yin_buffer[period] {
        period += 1;
    }

    if yin_buffer[period] > CLARITY_THRESHOLD || period + 1 >= half {
        return None;
    }

    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];

    let period_float = if (y1 - 2.0 * y2 + y3) != 0.0 {
        let peak_shift = (y1 - y3) / (2.0 * (y1 - 2.0 * y2 + y3));
        period as f32 + peak_shift
    } else {
        period as f32
    };

    let frequency = sample_rate as f32 / period_float;
    if frequency.is_finite() && frequency > 20.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Refines a frequency estimate using a pre-computed magnitude spectrum.
///
/// Searches two bins either side of the estimate for the spectral peak and
/// interpolates it in the log domain.
///
/// # Arguments
/// * `spectrum_magnitudes` - Positive-frequency magnitudes of one frame
/// * `rough_freq` - Initial frequency estimate in Hz
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// * `Some(refined_freq)` - Refined estimate, or the rough one when the
///   spectrum gives nothing better
/// * `None` - The rough estimate is not a frequency
pub fn refine_from_spectrum(
    spectrum_magnitudes: &[f32],
    rough_freq: f32,
    sample_rate: u32,
) -> Option<f32> {
    if rough_freq <= 0.0 || !rough_freq.is_finite() {
        return None;
    }
    if spectrum_magnitudes.len() < 3 {
        return Some(rough_freq);
    }
    let buffer_size = spectrum_magnitudes.len() * 2;
    let last_bin = spectrum_magnitudes.len() - 1;
    let target_bin = (rough_freq * buffer_size as f32) / sample_rate as f32;
    let search_radius = 2.0;
    let start_bin = (target_bin - search_radius).max(0.0) as usize;
    let end_bin = (target_bin + search_radius).min(last_bin as f32) as usize;
    if start_bin >= end_bin {
        return Some(rough_freq);
    }

    let Some(peak_bin) = spectrum_magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(offset, _)| start_bin + offset)
    else {
        return Some(rough_freq);
    };

    if peak_bin == 0 || peak_bin >= last_bin {
        return Some(rough_freq);
    }

    let y1 = spectrum_magnitudes[peak_bin - 1].ln();
    let y2 = spectrum_magnitudes[peak_bin].ln();
    let y3 = spectrum_magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return Some(rough_freq);
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return Some(rough_freq);
    }

    let peak_shift = (y3 - y1) / (2.0 * denominator);
    let interpolated_bin = peak_bin as f32 + peak_shift;
    let final_freq = (interpolated_bin * sample_rate as f32) / buffer_size as f32;

    if final_freq.is_finite() && final_freq > 0.0 {
        Some(final_freq)
    } else {
        Some(rough_freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn yin_finds_a_pure_tone() {
        let frame = sine(220.0, 44100, 2048);
        let freq = detect_pitch_yin(&frame, 44100, 0.01).unwrap();
        assert!((freq - 220.0).abs() < 1.0, "detected {freq}");
    }

    #[test]
    fn silence_has_no_pitch() {
        assert_eq!(detect_pitch_yin(&vec![0.0; 2048], 44100, 0.01), None);
        assert_eq!(detect_pitch_yin(&[0.5; 4], 44100, 0.01), None);
    }

    #[test]
    fn refinement_keeps_estimates_it_cannot_improve() {
        assert_eq!(refine_from_spectrum(&[1.0, 1.0], 440.0, 44100), Some(440.0));
        assert_eq!(refine_from_spectrum(&[1.0; 16], 0.0, 44100), None);
    }
}
