//! # Stage Adapters
//!
//! Typed call contracts for the services the analyzer delegates to. Each
//! stage receives only what it needs and hands back a fresh artifact; none
//! of them know which file is being analyzed, so provenance is stamped by
//! the analyzer afterwards.
//!
//! Adapters fail with `anyhow::Error`. The analyzer passes those failures
//! on to its caller untouched.

use crate::distribution::{KernelDensity, PitchDistribution};
use crate::features::{PitchSample, StableNote};
use crate::melody::YinExtractor;
use crate::params::ParamSet;
use crate::pitch_filter::ChunkPitchFilter;
use crate::tonic::LastNoteTonic;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// What a pitch extractor reports for one recording.
#[derive(Debug, Clone, Default)]
pub struct ExtractorOutput {
    /// The settings the extractor actually ran with.
    pub settings: BTreeMap<String, Value>,
    pub pitch: Vec<PitchSample>,
}

/// One tonic hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct TonicCandidate {
    /// Frequency in Hz.
    pub value: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl TonicCandidate {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            metadata: BTreeMap::new(),
        }
    }
}

/// A transposition as named by an ahenk identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AhenkDescriptor {
    pub name: String,
    pub descriptor: BTreeMap<String, Value>,
}

/// Predominant-melody extraction from an audio file.
pub trait PitchExtractor {
    fn run(&self, filepath: &Path, params: &ParamSet) -> Result<ExtractorOutput>;
}

/// Outlier removal on a pitch track. Must return a track of the same shape.
pub trait PitchFilter {
    fn run(&self, pitch: &[PitchSample], params: &ParamSet) -> Result<Vec<PitchSample>>;
}

/// Tonic detection. Candidates are ordered best first.
pub trait TonicIdentifier {
    fn identify(&self, pitch: &[PitchSample], params: &ParamSet) -> Result<Vec<TonicCandidate>>;
}

/// Looks up the transposition a tonic implies for a makam.
pub trait AhenkIdentifier {
    fn identify(&self, tonic_hz: f64, makam: &str) -> Result<AhenkDescriptor>;
}

/// Measures the performed scale degrees of a makam from a distribution.
pub trait NoteModeler {
    fn calculate_notes(
        &self,
        distribution: &PitchDistribution,
        tonic_hz: f64,
        makam: &str,
        params: &ParamSet,
    ) -> Result<BTreeMap<String, StableNote>>;
}

/// Builds a pitch distribution from raw frequencies.
pub trait DistributionBuilder {
    /// # Arguments
    /// * `freqs` - Frequencies in Hz; unvoiced values are skipped
    /// * `ref_freq` - Frequency the cent axis is relative to
    /// * `smooth_factor` - Kernel width in cents
    /// * `step_size` - Bin spacing in cents
    fn from_hz_pitch(
        &self,
        freqs: &[f64],
        ref_freq: f64,
        smooth_factor: f64,
        step_size: f64,
    ) -> Result<PitchDistribution>;
}

/// The full set of services one analyzer runs with.
pub struct Stages {
    pub extractor: Box<dyn PitchExtractor>,
    pub filter: Box<dyn PitchFilter>,
    pub tonic: Box<dyn TonicIdentifier>,
    pub ahenk: Box<dyn AhenkIdentifier>,
    pub note_modeler: Box<dyn NoteModeler>,
    pub distribution: Box<dyn DistributionBuilder>,
}

impl Stages {
    /// Wires the given services together with the kernel-density builder.
    pub fn new(
        extractor: impl PitchExtractor + 'static,
        filter: impl PitchFilter + 'static,
        tonic: impl TonicIdentifier + 'static,
        ahenk: impl AhenkIdentifier + 'static,
        note_modeler: impl NoteModeler + 'static,
    ) -> Self {
        Self {
            extractor: Box::new(extractor),
            filter: Box::new(filter),
            tonic: Box::new(tonic),
            ahenk: Box::new(ahenk),
            note_modeler: Box::new(note_modeler),
            distribution: Box::new(KernelDensity),
        }
    }

    /// Built-in extraction, filtering and tonic detection, with the
    /// makam-specific services supplied by the caller.
    pub fn builtin(
        ahenk: impl AhenkIdentifier + 'static,
        note_modeler: impl NoteModeler + 'static,
    ) -> Self {
        Self::new(
            YinExtractor,
            ChunkPitchFilter,
            LastNoteTonic,
            ahenk,
            note_modeler,
        )
    }

    pub fn with_distribution(mut self, builder: impl DistributionBuilder + 'static) -> Self {
        self.distribution = Box::new(builder);
        self
    }
}
