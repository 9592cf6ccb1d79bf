//! # Analyzer Module
//!
//! Runs the analysis pipeline for one recording:
//!
//! ```text
//! audio file → pitch track → filtered track → tonic → PD (+ PCD)
//!            → ahenk → stable notes → FeatureBundle
//! ```
//!
//! Every stage gets a fresh artifact built from the previous one, and every
//! artifact that records provenance carries the same source identifier,
//! taken once from the input path.

use crate::distribution::PitchDistribution;
use crate::error::{AnalysisError, Result};
use crate::features::{
    AhenkResult, FeatureBundle, Field, PitchSample, PitchTrack, StableNote, TonicEstimate,
};
use crate::params::{AnalyzerParams, ParamGroup, ParamValue};
use crate::stages::Stages;
use log::{Level, log};
use std::collections::BTreeMap;
use std::path::Path;

/// Orchestrates the stage services with its own parameter configuration.
///
/// Analyses that need different settings at the same time should use
/// separate analyzers; parameters are never shared between instances.
pub struct AudioAnalyzer {
    stages: Stages,
    params: AnalyzerParams,
    verbose: bool,
}

impl AudioAnalyzer {
    pub fn new(stages: Stages) -> Self {
        Self::with_params(stages, AnalyzerParams::default())
    }

    pub fn with_params(stages: Stages, params: AnalyzerParams) -> Self {
        Self {
            stages,
            params,
            verbose: false,
        }
    }

    /// Announce each stage at `Info` level instead of `Debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn params(&self) -> &AnalyzerParams {
        &self.params
    }

    /// Overrides parameters of one stage. See [`AnalyzerParams::set_params`].
    pub fn set_params<I, K>(&mut self, group: ParamGroup, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.params.set_params(group, overrides)
    }

    pub fn set_pitch_extractor_params<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.set_params(ParamGroup::PitchExtractor, overrides)
    }

    pub fn set_pitch_filter_params<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.set_params(ParamGroup::PitchFilter, overrides)
    }

    pub fn set_tonic_identifier_params<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.set_params(ParamGroup::TonicIdentifier, overrides)
    }

    pub fn set_pitch_distribution_params<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.set_params(ParamGroup::PitchDistribution, overrides)
    }

    pub fn set_note_modeler_params<I, K>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.set_params(ParamGroup::NoteModeler, overrides)
    }

    fn announce(&self, message: std::fmt::Arguments<'_>) {
        let level = if self.verbose { Level::Info } else { Level::Debug };
        log!(level, "{message}");
    }

    /// Runs the whole pipeline on one recording.
    ///
    /// # Arguments
    /// * `filepath` - Audio file to analyze; its path is the source identifier
    /// * `makam` - Makam of the recording. Required, since makam recognition
    ///   is not available
    ///
    /// # Errors
    /// * `UnsupportedOperation` - no makam was given
    /// * `StageContract` - a stage returned data that breaks an invariant
    /// * `Stage` - any failure inside a stage service, unchanged
    pub fn analyze(
        &self,
        filepath: impl AsRef<Path>,
        makam: Option<&str>,
    ) -> Result<FeatureBundle> {
        let filepath = filepath.as_ref();
        let source = filepath.to_string_lossy().into_owned();

        let raw = self.extract_pitch(filepath, &source)?;
        let filtered = self.filter_pitch(&raw)?;
        let tonic = self.identify_tonic(&filtered, &source)?;

        let pd = self.compute_pitch_distribution(&filtered, &tonic)?;
        let pcd = self.compute_pitch_class_distribution(&pd);

        let makam = makam.ok_or_else(|| {
            AnalysisError::UnsupportedOperation(
                "mode recognition not available; the makam must be given".to_string(),
            )
        })?;

        let ahenk = self.identify_ahenk(&tonic, makam, &source)?;
        let stable_notes = self.get_stable_notes(&pd, &tonic, makam)?;

        Ok(FeatureBundle {
            pitch: filtered,
            tonic,
            ahenk,
            makam: makam.to_string(),
            pitch_distribution: Field::Decoded(pd),
            pitch_class_distribution: Field::Decoded(pcd),
            stable_notes,
        })
    }

    /// Extracts the predominant melody of `filepath` as a pitch track
    /// tagged with `source`.
    pub fn extract_pitch(&self, filepath: &Path, source: &str) -> Result<PitchTrack> {
        self.announce(format_args!("- Extracting predominant melody of {source}"));
        let output = self
            .stages
            .extractor
            .run(filepath, self.params.group(ParamGroup::PitchExtractor))?;
        check_track("pitch extractor", &output.pitch)?;
        Ok(PitchTrack::new(source, output.settings, output.pitch))
    }

    /// Filters a copy of `track`; the given track is not modified.
    pub fn filter_pitch(&self, track: &PitchTrack) -> Result<PitchTrack> {
        self.announce(format_args!("- Filtering predominant melody of {}", track.source));
        let samples = track_samples(track)?;
        let filtered = self
            .stages
            .filter
            .run(&samples, self.params.group(ParamGroup::PitchFilter))?;
        check_track("pitch filter", &filtered)?;
        check_same_times("pitch filter", &samples, &filtered)?;
        Ok(PitchTrack {
            source: track.source.clone(),
            pitch: Field::Decoded(filtered),
            settings: track.settings.clone(),
        })
    }

    /// Identifies the tonic of `track`, keeping the best candidate.
    pub fn identify_tonic(&self, track: &PitchTrack, source: &str) -> Result<TonicEstimate> {
        self.announce(format_args!("- Identifying tonic of {source}"));
        let samples = track_samples(track)?;
        let candidates = self
            .stages
            .tonic
            .identify(&samples, self.params.group(ParamGroup::TonicIdentifier))?;

        let Some(best) = candidates.into_iter().next() else {
            return Err(AnalysisError::contract(
                "tonic identifier",
                "no tonic candidates",
            ));
        };
        if !crate::tuning::is_voiced(best.value) {
            return Err(AnalysisError::contract(
                "tonic identifier",
                format!("tonic frequency {} is not positive", best.value),
            ));
        }

        let mut metadata = best.metadata;
        metadata.remove("value");
        metadata.remove("source");
        Ok(TonicEstimate {
            value: best.value,
            source: source.to_string(),
            metadata,
        })
    }

    /// Builds the pitch distribution of `track` relative to the tonic with
    /// the current distribution settings.
    pub fn compute_pitch_distribution(
        &self,
        track: &PitchTrack,
        tonic: &TonicEstimate,
    ) -> Result<PitchDistribution> {
        self.announce(format_args!("- Computing pitch distribution of {}", track.source));
        let params = self.params.group(ParamGroup::PitchDistribution);
        let smooth_factor = params.float("smooth_factor")?;
        let step_size = params.float("step_size")?;

        let freqs: Vec<f64> = track_samples(track)?
            .iter()
            .map(|sample| sample.frequency)
            .collect();
        let pd = self
            .stages
            .distribution
            .from_hz_pitch(&freqs, tonic.value, smooth_factor, step_size)?;
        Ok(pd)
    }

    /// Folds `pd` into one octave. No raw pitch is involved.
    pub fn compute_pitch_class_distribution(&self, pd: &PitchDistribution) -> PitchDistribution {
        self.announce(format_args!("- Computing pitch class distribution"));
        pd.to_pcd()
    }

    pub fn identify_ahenk(
        &self,
        tonic: &TonicEstimate,
        makam: &str,
        source: &str,
    ) -> Result<AhenkResult> {
        self.announce(format_args!("- Identifying ahenk of {source}"));
        let found = self.stages.ahenk.identify(tonic.value, makam)?;

        let mut descriptor = found.descriptor;
        descriptor.remove("name");
        descriptor.remove("source");
        Ok(AhenkResult {
            name: found.name,
            source: source.to_string(),
            descriptor,
        })
    }

    /// Measures the stable notes of `makam` in the pitch distribution.
    pub fn get_stable_notes(
        &self,
        pd: &PitchDistribution,
        tonic: &TonicEstimate,
        makam: &str,
    ) -> Result<BTreeMap<String, StableNote>> {
        self.announce(format_args!("- Obtaining the stable notes of {}", tonic.source));
        let notes = self.stages.note_modeler.calculate_notes(
            pd,
            tonic.value,
            makam,
            self.params.group(ParamGroup::NoteModeler),
        )?;
        Ok(notes)
    }
}

fn track_samples(track: &PitchTrack) -> Result<Vec<PitchSample>> {
    track
        .samples()
        .map(|samples| samples.into_owned())
        .map_err(|e| AnalysisError::Decode(format!("pitch: {e}")))
}

/// Times strictly increasing, frequencies finite and non-negative.
fn check_track(stage: &'static str, samples: &[PitchSample]) -> Result<()> {
    if let Some(pair) = samples.windows(2).find(|pair| pair[0].time >= pair[1].time) {
        return Err(AnalysisError::contract(
            stage,
            format!(
                "sample times must increase ({} then {})",
                pair[0].time, pair[1].time
            ),
        ));
    }
    if let Some(bad) = samples
        .iter()
        .find(|s| !s.time.is_finite() || !s.frequency.is_finite() || s.frequency < 0.0)
    {
        return Err(AnalysisError::contract(
            stage,
            format!("invalid sample ({}, {})", bad.time, bad.frequency),
        ));
    }
    Ok(())
}

/// The output track keeps every input frame at the same time.
fn check_same_times(
    stage: &'static str,
    input: &[PitchSample],
    output: &[PitchSample],
) -> Result<()> {
    if input.len() != output.len() {
        return Err(AnalysisError::contract(
            stage,
            format!("returned {} samples for {}", output.len(), input.len()),
        ));
    }
    if let Some((i, _)) = input
        .iter()
        .zip(output)
        .enumerate()
        .find(|(_, (a, b))| a.time != b.time)
    {
        return Err(AnalysisError::contract(
            stage,
            format!(
                "sample {i} moved from {} to {}",
                input[i].time, output[i].time
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_check_rejects_repeated_times_and_negative_pitch() {
        let ok = [PitchSample::new(0.0, 0.0), PitchSample::new(0.1, 220.0)];
        assert!(check_track("test", &ok).is_ok());

        let repeated = [PitchSample::new(0.1, 220.0), PitchSample::new(0.1, 220.0)];
        assert!(matches!(
            check_track("test", &repeated),
            Err(AnalysisError::StageContract { stage: "test", .. })
        ));

        let negative = [PitchSample::new(0.0, -5.0)];
        assert!(check_track("test", &negative).is_err());

        let nan = [PitchSample::new(0.0, f64::NAN)];
        assert!(check_track("test", &nan).is_err());
    }

    #[test]
    fn filtered_tracks_keep_every_frame() {
        let input = [PitchSample::new(0.0, 220.0), PitchSample::new(0.1, 221.0)];
        let zeroed = [PitchSample::new(0.0, 0.0), PitchSample::new(0.1, 221.0)];
        assert!(check_same_times("test", &input, &zeroed).is_ok());

        assert!(check_same_times("test", &input, &input[..1]).is_err());

        let shifted = [PitchSample::new(0.0, 220.0), PitchSample::new(0.2, 221.0)];
        assert!(matches!(
            check_same_times("test", &input, &shifted),
            Err(AnalysisError::StageContract { stage: "test", .. })
        ));
    }
}
