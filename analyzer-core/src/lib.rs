// analyzer-core/src/lib.rs

//! The core of the makam recording analyzer.
//! This crate runs the analysis pipeline (pitch extraction, filtering,
//! tonic identification, pitch distributions, stable notes), stores the
//! resulting features and lays out the note-overlay chart. It is completely
//! headless and contains no GUI code.

pub mod analyzer;
pub mod audio;
pub mod codec;
pub mod distribution;
pub mod error;
pub mod features;
pub mod fft;
pub mod melody;
pub mod overlay;
pub mod params;
pub mod pitch;
pub mod pitch_filter;
pub mod stages;
pub mod tonic;
pub mod tuning;

pub use analyzer::AudioAnalyzer;
pub use distribution::{DistributionKind, DistributionParams, KernelDensity, PitchDistribution};
pub use error::{AnalysisError, Result};
pub use features::{
    AhenkResult, FeatureBundle, Field, PitchSample, PitchTrack, Quantity, StableNote,
    TonicEstimate, Unit,
};
pub use overlay::{Chart, render};
pub use params::{AnalyzerParams, ParamGroup, ParamSet, ParamValue};
pub use stages::Stages;
