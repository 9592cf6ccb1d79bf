//! # Parameter Store
//!
//! Every pipeline stage declares its tunable parameters up front. The
//! declared schema doubles as the default configuration, and overrides are
//! checked against it key by key before anything is changed.
//!
//! Parameters can also be read from a TOML document with one table per
//! group:
//!
//! ```toml
//! [pitch_distribution]
//! smooth_factor = 10.0
//! step_size = 5.0
//! ```

use crate::error::{AnalysisError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The independently validated parameter groups, one per configurable stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamGroup {
    PitchExtractor,
    PitchFilter,
    TonicIdentifier,
    PitchDistribution,
    NoteModeler,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 5] = [
        ParamGroup::PitchExtractor,
        ParamGroup::PitchFilter,
        ParamGroup::TonicIdentifier,
        ParamGroup::PitchDistribution,
        ParamGroup::NoteModeler,
    ];

    /// Name used in configuration files and error messages.
    pub fn name(self) -> &'static str {
        match self {
            ParamGroup::PitchExtractor => "pitch_extractor",
            ParamGroup::PitchFilter => "pitch_filter",
            ParamGroup::TonicIdentifier => "tonic_identifier",
            ParamGroup::PitchDistribution => "pitch_distribution",
            ParamGroup::NoteModeler => "note_modeler",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.name() == name)
    }

    /// The declared schema of this group: allowed keys with their defaults.
    pub fn schema(self) -> &'static ParamSet {
        match self {
            ParamGroup::PitchExtractor => &PITCH_EXTRACTOR_SCHEMA,
            ParamGroup::PitchFilter => &PITCH_FILTER_SCHEMA,
            ParamGroup::TonicIdentifier => &TONIC_IDENTIFIER_SCHEMA,
            ParamGroup::PitchDistribution => &PITCH_DISTRIBUTION_SCHEMA,
            ParamGroup::NoteModeler => &NOTE_MODELER_SCHEMA,
        }
    }
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
        }
    }

    /// Converts `given` to this value's kind, widening integers to floats.
    fn coerce(&self, given: ParamValue) -> Option<ParamValue> {
        match (self, given) {
            (ParamValue::Float(_), ParamValue::Int(i)) => Some(ParamValue::Float(i as f64)),
            (declared, given)
                if std::mem::discriminant(declared) == std::mem::discriminant(&given) =>
            {
                Some(given)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ParamValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// The parameters of one stage, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    fn declare(entries: &[(&str, ParamValue)]) -> Self {
        ParamSet(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Reads a numeric parameter, failing with a message naming the key.
    pub fn float(&self, key: &str) -> anyhow::Result<f64> {
        self.get(key)
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| anyhow::anyhow!("missing numeric parameter `{key}`"))
    }

    /// Reads a non-negative integer parameter as a count or size.
    pub fn count(&self, key: &str) -> anyhow::Result<usize> {
        self.get(key)
            .and_then(ParamValue::as_i64)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| anyhow::anyhow!("missing non-negative integer parameter `{key}`"))
    }

    pub fn flag(&self, key: &str) -> anyhow::Result<bool> {
        self.get(key)
            .and_then(ParamValue::as_bool)
            .ok_or_else(|| anyhow::anyhow!("missing boolean parameter `{key}`"))
    }
}

static PITCH_EXTRACTOR_SCHEMA: Lazy<ParamSet> = Lazy::new(|| {
    ParamSet::declare(&[
        ("frame_size", ParamValue::Int(2048)),
        ("hop_size", ParamValue::Int(128)),
        ("min_frequency", ParamValue::Float(55.0)),
        ("max_frequency", ParamValue::Float(1760.0)),
        ("amplitude_threshold", ParamValue::Float(0.01)),
        ("refine_with_spectrum", ParamValue::Bool(true)),
    ])
});

static PITCH_FILTER_SCHEMA: Lazy<ParamSet> = Lazy::new(|| {
    ParamSet::declare(&[
        ("min_frequency", ParamValue::Float(64.0)),
        ("max_frequency", ParamValue::Float(1024.0)),
        ("min_chunk_size", ParamValue::Int(40)),
        ("max_jump_cents", ParamValue::Float(60.0)),
    ])
});

static TONIC_IDENTIFIER_SCHEMA: Lazy<ParamSet> = Lazy::new(|| {
    ParamSet::declare(&[
        ("min_chunk_size", ParamValue::Int(20)),
        ("max_jump_cents", ParamValue::Float(25.0)),
    ])
});

static PITCH_DISTRIBUTION_SCHEMA: Lazy<ParamSet> = Lazy::new(|| {
    ParamSet::declare(&[
        ("smooth_factor", ParamValue::Float(7.5)),
        ("step_size", ParamValue::Float(7.5)),
    ])
});

static NOTE_MODELER_SCHEMA: Lazy<ParamSet> = Lazy::new(|| {
    ParamSet::declare(&[
        ("pitch_threshold", ParamValue::Float(50.0)),
        ("min_peak_ratio", ParamValue::Float(0.1)),
    ])
});

/// Current configuration of all five stages.
///
/// Owned by one analyzer instance; analyses that must run with different
/// settings use separate instances.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerParams {
    pitch_extractor: ParamSet,
    pitch_filter: ParamSet,
    tonic_identifier: ParamSet,
    pitch_distribution: ParamSet,
    note_modeler: ParamSet,
}

impl Default for AnalyzerParams {
    fn default() -> Self {
        Self {
            pitch_extractor: ParamGroup::PitchExtractor.schema().clone(),
            pitch_filter: ParamGroup::PitchFilter.schema().clone(),
            tonic_identifier: ParamGroup::TonicIdentifier.schema().clone(),
            pitch_distribution: ParamGroup::PitchDistribution.schema().clone(),
            note_modeler: ParamGroup::NoteModeler.schema().clone(),
        }
    }
}

impl AnalyzerParams {
    pub fn group(&self, group: ParamGroup) -> &ParamSet {
        match group {
            ParamGroup::PitchExtractor => &self.pitch_extractor,
            ParamGroup::PitchFilter => &self.pitch_filter,
            ParamGroup::TonicIdentifier => &self.tonic_identifier,
            ParamGroup::PitchDistribution => &self.pitch_distribution,
            ParamGroup::NoteModeler => &self.note_modeler,
        }
    }

    fn group_mut(&mut self, group: ParamGroup) -> &mut ParamSet {
        match group {
            ParamGroup::PitchExtractor => &mut self.pitch_extractor,
            ParamGroup::PitchFilter => &mut self.pitch_filter,
            ParamGroup::TonicIdentifier => &mut self.tonic_identifier,
            ParamGroup::PitchDistribution => &mut self.pitch_distribution,
            ParamGroup::NoteModeler => &mut self.note_modeler,
        }
    }

    pub fn get(&self, group: ParamGroup, key: &str) -> Option<&ParamValue> {
        self.group(group).get(key)
    }

    /// Applies `overrides` to one group.
    ///
    /// All keys and value kinds are checked first; if any override is
    /// rejected the group is left exactly as it was.
    ///
    /// # Errors
    /// * `UnknownParameter` - a key the group does not declare; the error
    ///   lists every valid key
    /// * `ParameterType` - a value of the wrong kind for its key
    pub fn set_params<I, K>(&mut self, group: ParamGroup, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let schema = group.schema();
        let mut validated = Vec::new();

        for (key, value) in overrides {
            let key = key.into();
            let Some(declared) = schema.get(&key) else {
                return Err(AnalysisError::UnknownParameter {
                    group,
                    key,
                    valid: schema.keys().map(str::to_string).collect(),
                });
            };
            let Some(value) = declared.coerce(value) else {
                return Err(AnalysisError::ParameterType {
                    group,
                    key,
                    expected: declared.kind(),
                });
            };
            validated.push((key, value));
        }

        let params = self.group_mut(group);
        for (key, value) in validated {
            params.0.insert(key, value);
        }
        Ok(())
    }

    /// Builds a configuration from defaults plus the tables of a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| AnalysisError::InvalidConfig(e.to_string()))?;

        let mut params = Self::default();
        for (name, value) in table {
            let group = ParamGroup::from_name(&name).ok_or_else(|| {
                AnalysisError::InvalidConfig(format!("unknown parameter group `{name}`"))
            })?;
            let toml::Value::Table(entries) = value else {
                return Err(AnalysisError::InvalidConfig(format!(
                    "`{name}` must be a table of parameters"
                )));
            };

            let overrides = entries
                .into_iter()
                .map(|(key, value)| {
                    value
                        .try_into::<ParamValue>()
                        .map(|value| (key.clone(), value))
                        .map_err(|e| {
                            AnalysisError::InvalidConfig(format!("{name}.{key}: {e}"))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            params.set_params(group, overrides)?;
        }
        Ok(params)
    }

    /// Reads a TOML parameter file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_defaults_are_declared() {
        let params = AnalyzerParams::default();
        let group = params.group(ParamGroup::PitchDistribution);
        assert_eq!(group.float("smooth_factor").unwrap(), 7.5);
        assert_eq!(group.float("step_size").unwrap(), 7.5);
        assert_eq!(group.keys().count(), 2);
    }

    #[test]
    fn set_params_reads_back_new_values() {
        let mut params = AnalyzerParams::default();
        params
            .set_params(
                ParamGroup::PitchDistribution,
                [("smooth_factor", ParamValue::from(10.0)), ("step_size", 5.0.into())],
            )
            .unwrap();

        assert_eq!(
            params.get(ParamGroup::PitchDistribution, "smooth_factor"),
            Some(&ParamValue::Float(10.0))
        );
        assert_eq!(
            params.get(ParamGroup::PitchDistribution, "step_size"),
            Some(&ParamValue::Float(5.0))
        );
    }

    #[test]
    fn unknown_key_lists_all_valid_keys_and_changes_nothing() {
        let mut params = AnalyzerParams::default();
        let before = params.clone();

        let err = params
            .set_params(
                ParamGroup::PitchDistribution,
                [("smooth_factor", ParamValue::from(1.0)), ("bin_width", 3.0.into())],
            )
            .unwrap_err();

        assert!(err.is_configuration());
        match err {
            AnalysisError::UnknownParameter { group, key, valid } => {
                assert_eq!(group, ParamGroup::PitchDistribution);
                assert_eq!(key, "bin_width");
                assert_eq!(valid, vec!["smooth_factor", "step_size"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(params, before);
    }

    #[test]
    fn error_message_names_every_valid_key() {
        let mut params = AnalyzerParams::default();
        let err = params
            .set_params(ParamGroup::TonicIdentifier, [("nope", ParamValue::from(1i64))])
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("min_chunk_size"));
        assert!(message.contains("max_jump_cents"));
    }

    #[test]
    fn integers_widen_to_float_but_text_is_rejected() {
        let mut params = AnalyzerParams::default();
        params
            .set_params(ParamGroup::PitchFilter, [("max_frequency", ParamValue::Int(900))])
            .unwrap();
        assert_eq!(
            params.get(ParamGroup::PitchFilter, "max_frequency"),
            Some(&ParamValue::Float(900.0))
        );

        let before = params.clone();
        let err = params
            .set_params(ParamGroup::PitchFilter, [("min_chunk_size", ParamValue::from("ten"))])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ParameterType { expected: "integer", .. }));
        assert_eq!(params, before);
    }

    #[test]
    fn groups_are_validated_independently() {
        let mut params = AnalyzerParams::default();
        // `hop_size` belongs to the extractor, not the filter.
        assert!(params
            .set_params(ParamGroup::PitchFilter, [("hop_size", ParamValue::Int(64))])
            .is_err());
        params
            .set_params(ParamGroup::PitchExtractor, [("hop_size", ParamValue::Int(64))])
            .unwrap();
        assert_eq!(params.group(ParamGroup::PitchExtractor).count("hop_size").unwrap(), 64);
    }

    #[test]
    fn toml_document_overrides_defaults() {
        let params = AnalyzerParams::from_toml_str(
            r#"
            [pitch_distribution]
            smooth_factor = 15
            step_size = 2.5

            [pitch_extractor]
            refine_with_spectrum = false
            "#,
        )
        .unwrap();

        let pd = params.group(ParamGroup::PitchDistribution);
        assert_eq!(pd.float("smooth_factor").unwrap(), 15.0);
        assert_eq!(pd.float("step_size").unwrap(), 2.5);
        assert!(!params.group(ParamGroup::PitchExtractor).flag("refine_with_spectrum").unwrap());
    }

    #[test]
    fn toml_document_rejects_unknown_groups_and_keys() {
        let err = AnalyzerParams::from_toml_str("[makam_recognizer]\nk = 1").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));

        let err = AnalyzerParams::from_toml_str("[note_modeler]\nthreshold = 1.0").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownParameter { .. }));
    }

    #[test]
    fn parameter_files_are_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzer.toml");
        std::fs::write(&path, "[pitch_filter]\nmin_chunk_size = 25\n").unwrap();

        let params = AnalyzerParams::load(&path).unwrap();
        let filter = params.group(ParamGroup::PitchFilter);
        assert_eq!(filter.count("min_chunk_size").unwrap(), 25);
        assert_eq!(filter.float("max_jump_cents").unwrap(), 60.0);

        let missing = AnalyzerParams::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, AnalysisError::Io(_)));
    }
}
