//! # Pitch Filter Module
//!
//! Removes octave errors and short spurious blips from a pitch track. The
//! track is cut into chunks of continuous voiced frames; a chunk ends at an
//! unvoiced frame or at a jump larger than `max_jump_cents`. Chunks that are
//! too short to be a sung or played note are silenced.

use crate::features::PitchSample;
use crate::params::ParamSet;
use crate::stages::PitchFilter;
use crate::tuning;
use anyhow::Result;
use log::debug;
use std::ops::Range;

/// Index ranges of continuous voiced frames.
///
/// # Arguments
/// * `samples` - Pitch track
/// * `max_jump_cents` - Largest step between neighbouring frames that
///   stays within one chunk
pub fn voiced_chunks(samples: &[PitchSample], max_jump_cents: f64) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;

    for (i, sample) in samples.iter().enumerate() {
        if !tuning::is_voiced(sample.frequency) {
            if let Some(s) = start.take() {
                chunks.push(s..i);
            }
            continue;
        }
        match start {
            None => start = Some(i),
            Some(s) => {
                let jump = tuning::hz_to_cent(sample.frequency, samples[i - 1].frequency).abs();
                if jump > max_jump_cents {
                    chunks.push(s..i);
                    start = Some(i);
                }
            }
        }
    }
    if let Some(s) = start {
        chunks.push(s..samples.len());
    }
    chunks
}

/// Range and continuity filter over the `pitch_filter` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkPitchFilter;

impl PitchFilter for ChunkPitchFilter {
    fn run(&self, pitch: &[PitchSample], params: &ParamSet) -> Result<Vec<PitchSample>> {
        let min_frequency = params.float("min_frequency")?;
        let max_frequency = params.float("max_frequency")?;
        let min_chunk_size = params.count("min_chunk_size")?;
        let max_jump_cents = params.float("max_jump_cents")?;

        let mut filtered: Vec<PitchSample> = pitch
            .iter()
            .map(|s| {
                let in_range = (min_frequency..=max_frequency).contains(&s.frequency);
                PitchSample::new(s.time, if in_range { s.frequency } else { 0.0 })
            })
            .collect();

        let mut dropped = 0usize;
        for chunk in voiced_chunks(&filtered, max_jump_cents) {
            if chunk.len() < min_chunk_size {
                dropped += 1;
                for sample in &mut filtered[chunk] {
                    sample.frequency = 0.0;
                }
            }
        }

        debug!("Pitch filter silenced {dropped} short chunks");
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AnalyzerParams, ParamGroup};

    fn track(freqs: &[f64]) -> Vec<PitchSample> {
        freqs
            .iter()
            .enumerate()
            .map(|(i, &f)| PitchSample::new(i as f64 * 0.01, f))
            .collect()
    }

    #[test]
    fn chunks_split_at_silence_and_jumps() {
        let samples = track(&[0.0, 220.0, 221.0, 0.0, 220.0, 440.0, 441.0]);
        let chunks = voiced_chunks(&samples, 50.0);
        assert_eq!(chunks, vec![1..3, 4..5, 5..7]);
    }

    #[test]
    fn short_chunks_and_out_of_range_frames_are_silenced() {
        let mut params = AnalyzerParams::default();
        params
            .set_params(
                ParamGroup::PitchFilter,
                [("min_chunk_size", crate::params::ParamValue::Int(3))],
            )
            .unwrap();
        let params = params.group(ParamGroup::PitchFilter);

        let input = track(&[220.0, 220.0, 220.0, 440.0, 440.0, 30.0, 220.0, 2000.0]);
        let filtered = ChunkPitchFilter.run(&input, params).unwrap();

        let freqs: Vec<f64> = filtered.iter().map(|s| s.frequency).collect();
        assert_eq!(freqs, vec![220.0, 220.0, 220.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        // Times are untouched and the input is left as it was.
        assert!(filtered.iter().zip(&input).all(|(a, b)| a.time == b.time));
        assert_eq!(input[3].frequency, 440.0);
    }
}
