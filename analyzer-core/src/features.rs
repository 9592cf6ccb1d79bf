//! # Feature Model
//!
//! The artifacts produced by one analysis run and the bundle that collects
//! them. Fields that have a richer in-memory form than their interchange
//! form are wrapped in [`Field`], which records which of the two forms is
//! currently held.

use crate::distribution::PitchDistribution;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// One point of a pitch track. Stored as a `[time, frequency]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct PitchSample {
    /// Seconds from the start of the recording.
    pub time: f64,
    /// Frequency in Hz; 0 marks an unvoiced frame.
    pub frequency: f64,
}

impl PitchSample {
    pub fn new(time: f64, frequency: f64) -> Self {
        Self { time, frequency }
    }
}

impl From<(f64, f64)> for PitchSample {
    fn from((time, frequency): (f64, f64)) -> Self {
        Self { time, frequency }
    }
}

impl From<PitchSample> for (f64, f64) {
    fn from(sample: PitchSample) -> Self {
        (sample.time, sample.frequency)
    }
}

/// A value that is either held in its rich in-memory form or in its plain
/// interchange form.
///
/// Encoding a field that is already plain, or decoding one that is already
/// rich, is a no-op.
#[derive(Debug, Clone)]
pub enum Field<T> {
    Decoded(T),
    Encoded(Value),
}

impl<T> Field<T> {
    pub fn is_encoded(&self) -> bool {
        matches!(self, Field::Encoded(_))
    }

    pub fn as_decoded(&self) -> Option<&T> {
        match self {
            Field::Decoded(inner) => Some(inner),
            Field::Encoded(_) => None,
        }
    }
}

impl<T: Serialize> Field<T> {
    /// The plain form of this field, whichever form it currently holds.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Field::Decoded(inner) => serde_json::to_value(inner),
            Field::Encoded(value) => Ok(value.clone()),
        }
    }

    /// Switches the field to its plain form.
    pub fn encode(&mut self) -> serde_json::Result<()> {
        if let Field::Decoded(inner) = self {
            let value = serde_json::to_value(&*inner)?;
            *self = Field::Encoded(value);
        }
        Ok(())
    }
}

impl<T: DeserializeOwned + Clone> Field<T> {
    /// Switches the field to its rich form, validating the plain data.
    pub fn decode(&mut self) -> serde_json::Result<()> {
        if let Field::Encoded(value) = self {
            let inner = T::deserialize(&*value)?;
            *self = Field::Decoded(inner);
        }
        Ok(())
    }

    /// Borrows the rich form, building it from the plain form if needed.
    pub fn to_decoded(&self) -> serde_json::Result<Cow<'_, T>> {
        match self {
            Field::Decoded(inner) => Ok(Cow::Borrowed(inner)),
            Field::Encoded(value) => T::deserialize(value).map(Cow::Owned),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Decoded(inner) => inner.serialize(serializer),
            Field::Encoded(value) => value.serialize(serializer),
        }
    }
}

/// Deserialized fields always start out plain.
impl<'de, T> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Field::Encoded)
    }
}

/// Fields compare by content: a rich value equals its own plain form.
impl<T: PartialEq + Serialize> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Decoded(a), Field::Decoded(b)) => a == b,
            _ => matches!(
                (self.to_value(), other.to_value()),
                (Ok(a), Ok(b)) if a == b
            ),
        }
    }
}

/// A pitch track with the settings it was extracted with.
///
/// Interchange form: the settings keys side by side with `source` and
/// `pitch`, the latter a list of `[time, frequency]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchTrack {
    pub source: String,
    pub pitch: Field<Vec<PitchSample>>,
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl PitchTrack {
    /// Collapses extractor settings and samples into one record.
    pub fn new(
        source: impl Into<String>,
        mut settings: BTreeMap<String, Value>,
        samples: Vec<PitchSample>,
    ) -> Self {
        // These names are owned by the track itself.
        settings.remove("source");
        settings.remove("pitch");
        Self {
            source: source.into(),
            pitch: Field::Decoded(samples),
            settings,
        }
    }

    pub fn samples(&self) -> serde_json::Result<Cow<'_, Vec<PitchSample>>> {
        self.pitch.to_decoded()
    }
}

/// The reference pitch of the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TonicEstimate {
    /// Frequency in Hz, always positive.
    pub value: f64,
    pub source: String,
    /// Whatever else the identifier reported (confidence, time interval...).
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

/// The transposition the recording is performed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AhenkResult {
    pub name: String,
    pub source: String,
    #[serde(flatten)]
    pub descriptor: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "Hz")]
    Hz,
    #[serde(rename = "cent")]
    Cent,
}

/// A number with its unit, stored as `{"value": .., "unit": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn hz(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Hz,
        }
    }

    pub fn cents(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Cent,
        }
    }

    /// The value in Hz, reading cents relative to `ref_freq`.
    pub fn to_hz(&self, ref_freq: f64) -> f64 {
        match self.unit {
            Unit::Hz => self.value,
            Unit::Cent => crate::tuning::cent_to_hz(self.value, ref_freq),
        }
    }
}

/// A scale degree as predicted by theory and as actually performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableNote {
    pub theoretical_pitch: Quantity,
    pub stable_pitch: Quantity,
    /// Deviation of the stable pitch from the theoretical one; 0 for the tonic.
    pub performed_interval: Quantity,
}

impl StableNote {
    pub fn is_tonic(&self) -> bool {
        self.performed_interval.value == 0.0
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    pub pitch: PitchTrack,
    pub tonic: TonicEstimate,
    pub ahenk: AhenkResult,
    pub makam: String,
    pub pitch_distribution: Field<PitchDistribution>,
    pub pitch_class_distribution: Field<PitchDistribution>,
    pub stable_notes: BTreeMap<String, StableNote>,
}

impl FeatureBundle {
    /// A copy of the bundle with every field in its plain form.
    ///
    /// The bundle itself is left untouched; fields that are already plain
    /// are copied as they are.
    pub fn encoded(&self) -> Result<FeatureBundle> {
        let mut plain = self.clone();
        plain.pitch.pitch.encode()?;
        plain.pitch_distribution.encode()?;
        plain.pitch_class_distribution.encode()?;
        Ok(plain)
    }

    pub fn is_plain(&self) -> bool {
        self.pitch.pitch.is_encoded()
            && self.pitch_distribution.is_encoded()
            && self.pitch_class_distribution.is_encoded()
    }
}
