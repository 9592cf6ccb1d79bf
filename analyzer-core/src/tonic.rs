//! # Tonic Module
//!
//! Built-in tonic identifier. Makam performances conventionally end on the
//! tonic, so the median pitch of the last sustained note is taken as the
//! tonic frequency.

use crate::features::PitchSample;
use crate::params::ParamSet;
use crate::pitch_filter::voiced_chunks;
use crate::stages::{TonicCandidate, TonicIdentifier};
use crate::tuning;
use anyhow::Result;
use log::debug;
use serde_json::json;

/// Last-note tonic identifier over the `tonic_identifier` parameters.
///
/// A note is a voiced chunk of at least `min_chunk_size` frames with no
/// step larger than `max_jump_cents`. Returns no candidates when the track
/// holds no such note.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastNoteTonic;

impl TonicIdentifier for LastNoteTonic {
    fn identify(&self, pitch: &[PitchSample], params: &ParamSet) -> Result<Vec<TonicCandidate>> {
        let min_chunk_size = params.count("min_chunk_size")?.max(1);
        let max_jump_cents = params.float("max_jump_cents")?;

        let Some(last_note) = voiced_chunks(pitch, max_jump_cents)
            .into_iter()
            .rev()
            .find(|chunk| chunk.len() >= min_chunk_size)
        else {
            debug!("No sustained note found for tonic identification");
            return Ok(Vec::new());
        };

        let note = &pitch[last_note];
        let freqs: Vec<f64> = note.iter().map(|s| s.frequency).collect();
        let Some(value) = tuning::median(&freqs) else {
            return Ok(Vec::new());
        };

        let mut candidate = TonicCandidate::new(value);
        candidate.metadata.insert("method".to_string(), json!("last_note"));
        candidate.metadata.insert(
            "time_interval".to_string(),
            json!([note[0].time, note[note.len() - 1].time]),
        );
        debug!("Tonic candidate {value:.2} Hz from {} frames", note.len());
        Ok(vec![candidate])
    }
}
