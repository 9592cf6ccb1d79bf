//! # Pitch Distribution Module
//!
//! Histograms of how long a recording dwells at each pitch, on a cent axis
//! relative to a reference frequency (normally the tonic). The full
//! distribution (PD) can be folded into a single octave to give the
//! pitch-class distribution (PCD).
//!
//! ## Interchange form
//! ```json
//! {
//!     "bins": [-22.5, -15.0, ...],
//!     "vals": [0.01, 0.04, ...],
//!     "params": {
//!         "smooth_factor": 7.5,
//!         "step_size": 7.5,
//!         "ref_freq": 220.0,
//!         "unit": "cent",
//!         "kind": "pitch"
//!     }
//! }
//! ```

use crate::features::Unit;
use crate::stages::DistributionBuilder;
use crate::tuning::{self, OCTAVE_CENTS};
use anyhow::ensure;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of kernel standard deviations evaluated on each side of a sample.
const KERNEL_SPAN: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    /// Full pitch distribution.
    #[serde(rename = "pitch")]
    Pitch,
    /// Octave-folded pitch-class distribution.
    #[serde(rename = "pitch_class")]
    PitchClass,
}

/// How a distribution was built and what its bins are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Standard deviation of the smoothing kernel in cents; 0 for none.
    pub smooth_factor: f64,
    /// Spacing between bin centers.
    pub step_size: f64,
    /// Frequency in Hz that the cent axis is relative to.
    pub ref_freq: f64,
    pub unit: Unit,
    pub kind: DistributionKind,
}

#[derive(Debug, Error)]
#[error("invalid pitch distribution: {0}")]
pub struct InvalidDistribution(String);

/// Plain form accepted on deserialization, checked before use.
#[derive(Deserialize)]
struct RawDistribution {
    bins: Vec<f64>,
    vals: Vec<f64>,
    params: DistributionParams,
}

impl TryFrom<RawDistribution> for PitchDistribution {
    type Error = InvalidDistribution;

    fn try_from(raw: RawDistribution) -> Result<Self, Self::Error> {
        PitchDistribution::new(raw.bins, raw.vals, raw.params)
    }
}

/// Bin centers with their aligned densities.
///
/// Invariants: as many values as bins, at least one bin, bins finite and
/// strictly increasing, values finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistribution")]
pub struct PitchDistribution {
    bins: Vec<f64>,
    vals: Vec<f64>,
    params: DistributionParams,
}

impl PitchDistribution {
    pub fn new(
        bins: Vec<f64>,
        vals: Vec<f64>,
        params: DistributionParams,
    ) -> Result<Self, InvalidDistribution> {
        let invalid = |reason: String| Err(InvalidDistribution(reason));

        if bins.len() != vals.len() {
            return invalid(format!("{} bins but {} values", bins.len(), vals.len()));
        }
        if bins.is_empty() {
            return invalid("no bins".to_string());
        }
        if bins.iter().any(|b| !b.is_finite()) {
            return invalid("bins must be finite".to_string());
        }
        if let Some(pair) = bins.windows(2).find(|pair| pair[0] >= pair[1]) {
            return invalid(format!(
                "bins must be strictly increasing ({} then {})",
                pair[0], pair[1]
            ));
        }
        if vals.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid("values must be finite and non-negative".to_string());
        }
        if !(params.step_size > 0.0 && params.step_size.is_finite()) {
            return invalid(format!("step size {} is not positive", params.step_size));
        }
        if !(params.smooth_factor >= 0.0 && params.smooth_factor.is_finite()) {
            return invalid(format!("smooth factor {} is negative", params.smooth_factor));
        }
        if !tuning::is_voiced(params.ref_freq) {
            return invalid(format!("reference frequency {} is not positive", params.ref_freq));
        }

        Ok(Self { bins, vals, params })
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    pub fn is_pitch_class(&self) -> bool {
        self.params.kind == DistributionKind::PitchClass
    }

    /// Highest density in the distribution.
    pub fn max_val(&self) -> f64 {
        self.vals.iter().copied().fold(0.0, f64::max)
    }

    /// Bin centers in Hz.
    pub fn hz_bins(&self) -> Vec<f64> {
        match self.params.unit {
            Unit::Hz => self.bins.clone(),
            Unit::Cent => self
                .bins
                .iter()
                .map(|&c| tuning::cent_to_hz(c, self.params.ref_freq))
                .collect(),
        }
    }

    /// Position of `hz` on the axis the bins are measured on.
    pub fn bin_position(&self, hz: f64) -> f64 {
        match self.params.unit {
            Unit::Hz => hz,
            Unit::Cent => tuning::hz_to_cent(hz, self.params.ref_freq),
        }
    }

    fn cent_bins(&self) -> Vec<f64> {
        match self.params.unit {
            Unit::Cent => self.bins.clone(),
            Unit::Hz => self
                .bins
                .iter()
                .map(|&f| tuning::hz_to_cent(f, self.params.ref_freq))
                .collect(),
        }
    }

    /// Folds the distribution into one octave above the reference.
    ///
    /// Bins that land on the same pitch class are summed and the result is
    /// normalized to unit mass. Folding a pitch-class distribution returns
    /// it unchanged.
    pub fn to_pcd(&self) -> PitchDistribution {
        if self.is_pitch_class() {
            return self.clone();
        }

        let step = self.params.step_size;
        let class_count = ((OCTAVE_CENTS / step).round() as usize).max(1);
        let mut vals = vec![0.0; class_count];

        for (cents, val) in self.cent_bins().into_iter().zip(&self.vals) {
            let folded = cents.rem_euclid(OCTAVE_CENTS);
            let index = (folded / step).round() as usize % class_count;
            vals[index] += val;
        }
        normalize(&mut vals);

        PitchDistribution {
            bins: (0..class_count).map(|i| i as f64 * step).collect(),
            vals,
            params: DistributionParams {
                unit: Unit::Cent,
                kind: DistributionKind::PitchClass,
                ..self.params
            },
        }
    }
}

fn normalize(vals: &mut [f64]) {
    let total: f64 = vals.iter().sum();
    if total > 0.0 {
        vals.iter_mut().for_each(|v| *v /= total);
    }
}

/// Gaussian kernel-density pitch distributions on a cent axis.
///
/// Each voiced frequency contributes a kernel with a standard deviation of
/// `smooth_factor` cents, sampled every `step_size` cents. With a smooth
/// factor of 0 every frequency is counted into its nearest bin instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelDensity;

impl DistributionBuilder for KernelDensity {
    fn from_hz_pitch(
        &self,
        freqs: &[f64],
        ref_freq: f64,
        smooth_factor: f64,
        step_size: f64,
    ) -> anyhow::Result<PitchDistribution> {
        ensure!(tuning::is_voiced(ref_freq), "reference frequency must be positive");
        ensure!(step_size > 0.0, "step size must be positive");
        ensure!(smooth_factor >= 0.0, "smooth factor must not be negative");

        let cents: Vec<f64> = freqs
            .iter()
            .copied()
            .filter(|&f| tuning::is_voiced(f))
            .map(|f| tuning::hz_to_cent(f, ref_freq))
            .collect();
        ensure!(!cents.is_empty(), "no voiced pitch values to build a distribution from");

        let (min, max) = cents
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));

        // Bin indices are counted in steps from 0 cents.
        let span = KERNEL_SPAN * smooth_factor / step_size;
        let first = (min / step_size).floor() - span.ceil();
        let last = (max / step_size).ceil() + span.ceil();
        let bin_count = (last - first) as usize + 1;

        let bins: Vec<f64> = (0..bin_count)
            .map(|i| (first + i as f64) * step_size)
            .collect();
        let mut vals = vec![0.0; bin_count];

        for &c in &cents {
            let center = c / step_size - first;
            if smooth_factor == 0.0 {
                let index = (center.round() as usize).min(bin_count - 1);
                vals[index] += 1.0;
                continue;
            }
            let from = (center - span).floor().max(0.0) as usize;
            let to = ((center + span).ceil() as usize).min(bin_count - 1);
            for (bin, val) in bins[from..=to].iter().zip(&mut vals[from..=to]) {
                let z = (bin - c) / smooth_factor;
                *val += (-0.5 * z * z).exp();
            }
        }
        normalize(&mut vals);

        debug!(
            "Built pitch distribution: {} voiced samples, {} bins from {:.1} to {:.1} cents",
            cents.len(),
            bin_count,
            bins[0],
            bins[bin_count - 1]
        );

        let params = DistributionParams {
            smooth_factor,
            step_size,
            ref_freq,
            unit: Unit::Cent,
            kind: DistributionKind::Pitch,
        };
        Ok(PitchDistribution::new(bins, vals, params)?)
    }
}
