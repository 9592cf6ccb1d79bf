//! # Feature Codec
//!
//! Converts a [`FeatureBundle`] to and from its JSON interchange tree:
//!
//! ```json
//! {
//!     "pitch": {"source": "...", "pitch": [[0.0, 220.0], ...], ...settings},
//!     "tonic": {"value": 220.0, "source": "...", ...},
//!     "ahenk": {"name": "...", "source": "...", ...},
//!     "makam": "...",
//!     "pitch_distribution": {"bins": [...], "vals": [...], "params": {...}},
//!     "pitch_class_distribution": {"bins": [...], "vals": [...], "params": {...}},
//!     "stable_notes": {"<symbol>": {"theoretical_pitch": {...}, ...}}
//! }
//! ```
//!
//! Encoding never touches the caller's bundle and is idempotent. Decoding
//! rebuilds the two distributions and leaves the pitch samples plain.

use crate::error::{AnalysisError, Result};
use crate::features::{FeatureBundle, Field};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const INDENT: &[u8] = b"    ";

/// The interchange tree of `bundle`.
pub fn encode(bundle: &FeatureBundle) -> Result<Value> {
    Ok(serde_json::to_value(bundle.encoded()?)?)
}

/// The interchange tree of `bundle` as pretty-printed JSON text.
pub fn encode_to_string(bundle: &FeatureBundle) -> Result<String> {
    let mut buf = Vec::new();
    write_pretty(&mut buf, &bundle.encoded()?)?;
    String::from_utf8(buf)
        .map_err(|e| AnalysisError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Writes the interchange tree of `bundle` to `path`.
pub fn save(bundle: &FeatureBundle, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let plain = bundle.encoded()?;

    let mut writer = BufWriter::new(File::create(path)?);
    write_pretty(&mut writer, &plain)?;
    writer.flush()?;

    debug!("Saved features of {} to {}", plain.pitch.source, path.display());
    Ok(())
}

fn write_pretty<W: Write>(writer: W, plain: &FeatureBundle) -> Result<()> {
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    plain.serialize(&mut ser)?;
    Ok(())
}

/// Decodes features from either a path to a stored interchange file or the
/// interchange text itself.
pub fn decode(input: &str) -> Result<FeatureBundle> {
    let path = Path::new(input);
    if path.is_file() {
        decode_file(path)
    } else {
        decode_str(input)
    }
}

pub fn decode_file(path: impl AsRef<Path>) -> Result<FeatureBundle> {
    let text = std::fs::read_to_string(path)?;
    decode_str(&text)
}

pub fn decode_str(text: &str) -> Result<FeatureBundle> {
    let tree: Value =
        serde_json::from_str(text).map_err(|e| AnalysisError::Decode(e.to_string()))?;
    decode_tree(tree)
}

/// Rebuilds a bundle from an interchange tree, reconstructing and
/// validating both distributions.
pub fn decode_tree(tree: Value) -> Result<FeatureBundle> {
    let mut bundle = plain_bundle(tree)?;
    decode_field("pitch_distribution", &mut bundle.pitch_distribution)?;
    decode_field("pitch_class_distribution", &mut bundle.pitch_class_distribution)?;
    Ok(bundle)
}

/// Reads the bundle structure only; every wrapped field stays plain.
pub fn plain_bundle(tree: Value) -> Result<FeatureBundle> {
    if !tree.is_object() {
        return Err(AnalysisError::Decode(
            "expected a mapping at the top level".to_string(),
        ));
    }
    serde_json::from_value(tree).map_err(|e| AnalysisError::Decode(e.to_string()))
}

fn decode_field<T>(name: &str, field: &mut Field<T>) -> Result<()>
where
    T: serde::de::DeserializeOwned + Clone,
{
    field
        .decode()
        .map_err(|e| AnalysisError::Decode(format!("{name}: {e}")))
}
