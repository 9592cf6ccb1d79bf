//! # Note Overlay Module
//!
//! Lays out the two-panel feature chart:
//! - Panel 1: the pitch track over time, inaudible frames left blank
//! - Panel 2: the pitch distribution on the same frequency axis, with the
//!   stable notes the distribution actually supports drawn on top
//!
//! A note is supported when the density at its stable pitch exceeds a tenth
//! of the highest density found at any stable pitch. The layout is plain
//! data; drawing it is up to the front end.

use crate::distribution::PitchDistribution;
use crate::error::{AnalysisError, Result};
use crate::features::{FeatureBundle, StableNote};
use log::debug;
use std::collections::BTreeMap;

/// Frames below this frequency are not drawn.
pub const INAUDIBLE_HZ: f64 = 20.0;
/// Fraction of the highest note occurrence a note must exceed to be shown.
pub const OCCURRENCE_THRESHOLD: f64 = 0.1;
/// Panel 2 extends this far past the highest density, leaving room for labels.
pub const X_HEADROOM: f64 = 1.2;
/// Gap between a note marker and its label, relative to the highest density.
pub const LABEL_OFFSET: f64 = 0.03;

/// A stable note located on the distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteOccurrence {
    pub symbol: String,
    pub theoretical_hz: f64,
    pub stable_hz: f64,
    /// Deviation from theory in cents.
    pub performed_interval: f64,
    pub is_tonic: bool,
    /// Density of the distribution bin nearest to the stable pitch.
    pub rel_occur: f64,
}

/// Finds the density at the stable pitch of every note.
///
/// Distances are measured on the distribution's own bin axis. The nearest
/// bin wins; on a tie the lower bin is used.
pub fn note_occurrences(
    pd: &PitchDistribution,
    notes: &BTreeMap<String, StableNote>,
) -> Vec<NoteOccurrence> {
    let ref_freq = pd.params().ref_freq;

    notes
        .iter()
        .map(|(symbol, note)| {
            let stable_hz = note.stable_pitch.to_hz(ref_freq);
            let position = pd.bin_position(stable_hz);
            let nearest = pd
                .bins()
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(best, best_dist), (i, &bin)| {
                    let dist = (bin - position).abs();
                    if dist < best_dist { (i, dist) } else { (best, best_dist) }
                })
                .0;

            NoteOccurrence {
                symbol: symbol.clone(),
                theoretical_hz: note.theoretical_pitch.to_hz(ref_freq),
                stable_hz,
                performed_interval: note.performed_interval.value,
                is_tonic: note.is_tonic(),
                rel_occur: pd.vals()[nearest],
            }
        })
        .collect()
}

/// Keeps the notes whose occurrence exceeds the threshold.
pub fn significant_notes(occurrences: Vec<NoteOccurrence>) -> Vec<NoteOccurrence> {
    let max_rel_occur = occurrences
        .iter()
        .map(|note| note.rel_occur)
        .fold(0.0, f64::max);
    occurrences
        .into_iter()
        .filter(|note| note.rel_occur > OCCURRENCE_THRESHOLD * max_rel_occur)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Tonic,
    Degree,
}

impl MarkerKind {
    pub fn size(self) -> f32 {
        match self {
            MarkerKind::Tonic => 10.0,
            MarkerKind::Degree => 6.0,
        }
    }
}

/// Dashed line from zero density to `x_end` at a theoretical pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub hz: f64,
    pub x_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMarker {
    pub x: f64,
    pub hz: f64,
    pub kind: MarkerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteLabel {
    pub x: f64,
    pub hz: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchPanel {
    /// `(time, frequency)` points; `None` where nothing is drawn.
    pub track: Vec<(f64, Option<f64>)>,
    pub x_limits: (f64, f64),
    pub y_limits: (f64, f64),
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub y_ticks: Vec<f64>,
    pub grid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotePanel {
    /// `(density, frequency)` points of the distribution.
    pub curve: Vec<(f64, f64)>,
    pub reference_lines: Vec<ReferenceLine>,
    pub markers: Vec<NoteMarker>,
    pub labels: Vec<NoteLabel>,
    pub x_limits: (f64, f64),
    pub y_limits: (f64, f64),
    pub y_ticks: Vec<f64>,
    pub frame_visible: bool,
}

/// Both panels, side by side with relative widths `width_ratios`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub pitch_panel: PitchPanel,
    pub note_panel: NotePanel,
    pub width_ratios: [u16; 2],
    pub notes: Vec<NoteOccurrence>,
}

/// Lays out the feature chart of `bundle`.
///
/// # Errors
/// `Render` when the track has fewer than two samples, the distribution or
/// stable-note set is empty, or no note clears the occurrence threshold.
/// `Decode` when a plain field of the bundle is malformed.
pub fn render(bundle: &FeatureBundle) -> Result<Chart> {
    let samples = bundle
        .pitch
        .samples()
        .map_err(|e| AnalysisError::Decode(format!("pitch: {e}")))?;
    if samples.len() < 2 {
        return Err(AnalysisError::Render(format!(
            "need at least 2 pitch samples, got {}",
            samples.len()
        )));
    }
    let pd = bundle
        .pitch_distribution
        .to_decoded()
        .map_err(|e| AnalysisError::Decode(format!("pitch_distribution: {e}")))?;
    if bundle.stable_notes.is_empty() {
        return Err(AnalysisError::Render("no stable notes".to_string()));
    }

    let notes = significant_notes(note_occurrences(&pd, &bundle.stable_notes));
    if notes.is_empty() {
        return Err(AnalysisError::Render(
            "no stable note clears the occurrence threshold".to_string(),
        ));
    }

    let hz_bins = pd.hz_bins();
    let y_limits = (hz_bins[0], hz_bins[hz_bins.len() - 1]);
    let mut y_ticks: Vec<f64> = notes.iter().map(|note| note.stable_hz).collect();
    y_ticks.sort_by(f64::total_cmp);

    let first = samples[0].time;
    let last = samples[samples.len() - 1].time;
    let pitch_panel = PitchPanel {
        track: samples
            .iter()
            .map(|s| (s.time, (s.frequency >= INAUDIBLE_HZ).then_some(s.frequency)))
            .collect(),
        x_limits: (first, last),
        y_limits,
        x_label: "Time (sec)",
        y_label: "Frequency (Hz)",
        y_ticks: y_ticks.clone(),
        grid: true,
    };

    let max_val = pd.max_val();
    let note_panel = NotePanel {
        curve: pd.vals().iter().copied().zip(hz_bins.iter().copied()).collect(),
        reference_lines: notes
            .iter()
            .map(|note| ReferenceLine {
                hz: note.theoretical_hz,
                x_end: note.rel_occur,
            })
            .collect(),
        markers: notes
            .iter()
            .map(|note| NoteMarker {
                x: note.rel_occur,
                hz: note.stable_hz,
                kind: if note.is_tonic {
                    MarkerKind::Tonic
                } else {
                    MarkerKind::Degree
                },
            })
            .collect(),
        labels: notes
            .iter()
            .map(|note| NoteLabel {
                x: note.rel_occur + LABEL_OFFSET * max_val,
                hz: note.stable_hz,
                text: format!(
                    "{}, {} cents",
                    note.symbol,
                    note.performed_interval.round() as i64
                ),
            })
            .collect(),
        x_limits: (0.0, X_HEADROOM * max_val),
        y_limits,
        y_ticks,
        frame_visible: false,
    };

    debug!(
        "Rendered {} of {} stable notes for {}",
        notes.len(),
        bundle.stable_notes.len(),
        bundle.pitch.source
    );

    Ok(Chart {
        pitch_panel,
        note_panel,
        width_ratios: [6, 1],
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{DistributionKind, DistributionParams};
    use crate::features::{Quantity, Unit};

    fn hz_distribution(bins: Vec<f64>, vals: Vec<f64>) -> PitchDistribution {
        let params = DistributionParams {
            smooth_factor: 0.0,
            step_size: 100.0,
            ref_freq: 100.0,
            unit: Unit::Hz,
            kind: DistributionKind::Pitch,
        };
        PitchDistribution::new(bins, vals, params).unwrap()
    }

    fn note(theoretical: f64, stable: f64, interval: f64) -> StableNote {
        StableNote {
            theoretical_pitch: Quantity::hz(theoretical),
            stable_pitch: Quantity::hz(stable),
            performed_interval: Quantity::cents(interval),
        }
    }

    #[test]
    fn occurrence_is_density_at_nearest_bin() {
        let pd = hz_distribution(vec![0.0, 100.0, 200.0, 300.0], vec![1.0, 5.0, 2.0, 1.0]);
        let notes = BTreeMap::from([("B".to_string(), note(100.0, 110.0, 12.0))]);

        let found = note_occurrences(&pd, &notes);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rel_occur, 5.0);
        assert_eq!(found[0].stable_hz, 110.0);
    }

    #[test]
    fn ties_go_to_the_lower_bin() {
        let pd = hz_distribution(vec![0.0, 100.0, 200.0, 300.0], vec![1.0, 5.0, 2.0, 1.0]);
        let notes = BTreeMap::from([("X".to_string(), note(150.0, 150.0, 0.0))]);
        assert_eq!(note_occurrences(&pd, &notes)[0].rel_occur, 5.0);
    }

    #[test]
    fn nearest_bin_is_measured_in_cents_on_a_cent_axis() {
        let params = DistributionParams {
            smooth_factor: 0.0,
            step_size: 100.0,
            ref_freq: 100.0,
            unit: Unit::Cent,
            kind: DistributionKind::Pitch,
        };
        let pd = PitchDistribution::new(vec![0.0, 100.0], vec![1.0, 5.0], params).unwrap();

        // Just above the cent midpoint, but below the Hz midpoint of the bins.
        let above = crate::tuning::cent_to_hz(50.5, 100.0);
        let below = crate::tuning::cent_to_hz(49.5, 100.0);
        let notes = BTreeMap::from([
            ("above".to_string(), note(above, above, 0.0)),
            ("below".to_string(), note(below, below, 0.0)),
        ]);

        let found = note_occurrences(&pd, &notes);
        assert_eq!(found[0].symbol, "above");
        assert_eq!(found[0].rel_occur, 5.0);
        assert_eq!(found[1].symbol, "below");
        assert_eq!(found[1].rel_occur, 1.0);
    }

    #[test]
    fn notes_below_a_tenth_of_the_peak_are_dropped() {
        let occurrence = |symbol: &str, rel_occur: f64| NoteOccurrence {
            symbol: symbol.to_string(),
            theoretical_hz: 100.0,
            stable_hz: 100.0,
            performed_interval: 0.0,
            is_tonic: false,
            rel_occur,
        };

        let kept = significant_notes(vec![
            occurrence("peak", 5.0),
            occurrence("weak", 0.4),
            occurrence("enough", 0.6),
        ]);
        let symbols: Vec<&str> = kept.iter().map(|n| n.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["peak", "enough"]);
    }

    #[test]
    fn no_supported_notes_means_nothing_is_shown() {
        let pd = hz_distribution(vec![0.0, 100.0], vec![0.0, 0.0]);
        let notes = BTreeMap::from([("A".to_string(), note(100.0, 100.0, 0.0))]);
        assert!(significant_notes(note_occurrences(&pd, &notes)).is_empty());
    }
}
