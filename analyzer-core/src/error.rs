//! # Error Module
//!
//! A single error type for everything the analyzer core can report.
//! Stage adapters fail with `anyhow::Error`; those failures are wrapped
//! transparently so callers see the adapter's own message.

use crate::params::ParamGroup;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A parameter key that the target group does not declare.
    #[error("unknown {group} parameter `{key}`; possible parameters are: {}", valid.join(", "))]
    UnknownParameter {
        group: ParamGroup,
        key: String,
        valid: Vec<String>,
    },

    /// A declared parameter given a value of the wrong kind.
    #[error("{group} parameter `{key}` expects a {expected} value")]
    ParameterType {
        group: ParamGroup,
        key: String,
        expected: &'static str,
    },

    /// Malformed parameter configuration document.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested operation has no implementation available.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Interchange text that cannot be turned back into features.
    #[error("cannot decode features: {0}")]
    Decode(String),

    /// Not enough data to build a note-overlay chart.
    #[error("cannot render features: {0}")]
    Render(String),

    /// A stage returned an artifact that breaks the data-model invariants.
    #[error("{stage} returned an invalid result: {reason}")]
    StageContract { stage: &'static str, reason: String },

    #[error("cannot encode features: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised inside a stage adapter, passed through untouched.
    #[error(transparent)]
    Stage(#[from] anyhow::Error),
}

impl AnalysisError {
    /// True for every variant of the configuration error class.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AnalysisError::UnknownParameter { .. }
                | AnalysisError::ParameterType { .. }
                | AnalysisError::InvalidConfig(_)
        )
    }

    pub(crate) fn contract(stage: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::StageContract {
            stage,
            reason: reason.into(),
        }
    }
}
