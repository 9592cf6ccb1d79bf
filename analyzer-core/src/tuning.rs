//! # Tuning Module
//!
//! Conversions between the Hz and cent scales. Cents are a logarithmic unit
//! of pitch measurement where:
//! - 100 cents = 1 semitone (12-TET)
//! - 1200 cents = 1 octave
//! - Positive values are above the reference, negative values below

/// Cents in one octave.
pub const OCTAVE_CENTS: f64 = 1200.0;

/// Calculates the interval from `ref_freq` to `freq` in cents.
///
/// # Arguments
/// * `freq` - Measured frequency in Hz
/// * `ref_freq` - Reference frequency in Hz (typically the tonic)
pub fn hz_to_cent(freq: f64, ref_freq: f64) -> f64 {
    OCTAVE_CENTS * (freq / ref_freq).log2()
}

/// Inverse of [`hz_to_cent`].
pub fn cent_to_hz(cents: f64, ref_freq: f64) -> f64 {
    ref_freq * 2.0_f64.powf(cents / OCTAVE_CENTS)
}

/// A frequency that carries pitch: finite and strictly positive.
pub fn is_voiced(freq: f64) -> bool {
    freq.is_finite() && freq > 0.0
}

/// Median of the given values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octave_is_1200_cents() {
        assert!((hz_to_cent(440.0, 220.0) - 1200.0).abs() < 1e-9);
        assert!((hz_to_cent(110.0, 220.0) + 1200.0).abs() < 1e-9);
        assert!((cent_to_hz(700.0, 220.0) - 220.0 * 2f64.powf(7.0 / 12.0)).abs() < 1e-9);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
