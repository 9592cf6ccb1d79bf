use analyzer_core::codec;
use analyzer_core::overlay::MarkerKind;
use analyzer_core::stages::{
    AhenkDescriptor, AhenkIdentifier, DistributionBuilder, ExtractorOutput, NoteModeler,
    PitchExtractor, PitchFilter, TonicCandidate, TonicIdentifier,
};
use analyzer_core::{
    AnalysisError, AudioAnalyzer, DistributionKind, DistributionParams, FeatureBundle, Field,
    ParamSet, ParamValue, PitchDistribution, PitchSample, Quantity, StableNote, Stages, Unit,
    render,
};
use anyhow::{Result, anyhow};
use hound::{SampleFormat, WavSpec, WavWriter};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

const SOURCE: &str = "recordings/hicaz_taksim.wav";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 100 frames at 220 Hz, 10 ms apart.
struct SteadyTone;

impl PitchExtractor for SteadyTone {
    fn run(&self, _filepath: &Path, _params: &ParamSet) -> Result<ExtractorOutput> {
        let settings = BTreeMap::from([
            ("hop_size".to_string(), json!(128)),
            ("source".to_string(), json!("extractor-internal")),
        ]);
        let pitch = (0..100)
            .map(|i| PitchSample::new(i as f64 * 0.01, 220.0))
            .collect();
        Ok(ExtractorOutput { settings, pitch })
    }
}

struct BrokenExtractor;

impl PitchExtractor for BrokenExtractor {
    fn run(&self, _filepath: &Path, _params: &ParamSet) -> Result<ExtractorOutput> {
        Err(anyhow!("decoder exploded"))
    }
}

/// Silences every other frame.
struct Decimate;

impl PitchFilter for Decimate {
    fn run(&self, pitch: &[PitchSample], _params: &ParamSet) -> Result<Vec<PitchSample>> {
        Ok(pitch
            .iter()
            .enumerate()
            .map(|(i, s)| PitchSample::new(s.time, if i % 2 == 0 { s.frequency } else { 0.0 }))
            .collect())
    }
}

/// Drops all but the first three frames.
struct Truncate;

impl PitchFilter for Truncate {
    fn run(&self, pitch: &[PitchSample], _params: &ParamSet) -> Result<Vec<PitchSample>> {
        Ok(pitch[..3].to_vec())
    }
}

struct KeepAll;

impl PitchFilter for KeepAll {
    fn run(&self, pitch: &[PitchSample], _params: &ParamSet) -> Result<Vec<PitchSample>> {
        Ok(pitch.to_vec())
    }
}

struct FixedTonic(f64);

impl TonicIdentifier for FixedTonic {
    fn identify(&self, _pitch: &[PitchSample], _params: &ParamSet) -> Result<Vec<TonicCandidate>> {
        let mut best = TonicCandidate::new(self.0);
        best.metadata.insert("confidence".to_string(), json!(0.9));
        best.metadata.insert("source".to_string(), json!("identifier-internal"));
        Ok(vec![best, TonicCandidate::new(self.0 * 2.0)])
    }
}

struct NoTonic;

impl TonicIdentifier for NoTonic {
    fn identify(&self, _pitch: &[PitchSample], _params: &ParamSet) -> Result<Vec<TonicCandidate>> {
        Ok(Vec::new())
    }
}

struct Bolahenk;

impl AhenkIdentifier for Bolahenk {
    fn identify(&self, tonic_hz: f64, makam: &str) -> Result<AhenkDescriptor> {
        Ok(AhenkDescriptor {
            name: "bolahenk".to_string(),
            descriptor: BTreeMap::from([
                ("makam".to_string(), json!(makam)),
                ("tonic".to_string(), json!(tonic_hz)),
                ("source".to_string(), json!("ahenk-internal")),
            ]),
        })
    }
}

/// Tonic plus two degrees the tone never reaches.
struct HicazNotes;

impl NoteModeler for HicazNotes {
    fn calculate_notes(
        &self,
        _distribution: &PitchDistribution,
        tonic_hz: f64,
        makam: &str,
        _params: &ParamSet,
    ) -> Result<BTreeMap<String, StableNote>> {
        if makam != "hicaz" {
            return Err(anyhow!("unknown makam {makam}"));
        }
        let note = |theoretical: f64, stable: f64, interval: f64| StableNote {
            theoretical_pitch: Quantity::hz(theoretical),
            stable_pitch: Quantity::hz(stable),
            performed_interval: Quantity::cents(interval),
        };
        Ok(BTreeMap::from([
            ("A4".to_string(), note(tonic_hz, tonic_hz, 0.0)),
            ("Bb4".to_string(), note(234.0, 233.1, -6.7)),
            ("C#5".to_string(), note(277.2, 278.0, 5.0)),
        ]))
    }
}

/// All mass in the bin at the reference, empty bins a semitone apart around it.
struct TonicPeak;

impl DistributionBuilder for TonicPeak {
    fn from_hz_pitch(
        &self,
        _freqs: &[f64],
        ref_freq: f64,
        smooth_factor: f64,
        _step_size: f64,
    ) -> Result<PitchDistribution> {
        let bins = (-6..=6).map(|k| k as f64 * 100.0).collect();
        let vals = (-6..=6).map(|k| if k == 0 { 1.0 } else { 0.0 }).collect();
        let params = DistributionParams {
            smooth_factor,
            step_size: 100.0,
            ref_freq,
            unit: Unit::Cent,
            kind: DistributionKind::Pitch,
        };
        Ok(PitchDistribution::new(bins, vals, params)?)
    }
}

fn analyzer() -> AudioAnalyzer {
    let stages = Stages::new(SteadyTone, KeepAll, FixedTonic(220.0), Bolahenk, HicazNotes)
        .with_distribution(TonicPeak);
    AudioAnalyzer::new(stages).verbose(true)
}

fn analyzed_bundle() -> FeatureBundle {
    analyzer().analyze(SOURCE, Some("hicaz")).unwrap()
}

#[test]
fn analysis_without_makam_is_unsupported() {
    init_logging();
    let err = analyzer().analyze(SOURCE, None).unwrap_err();
    assert!(matches!(err, AnalysisError::UnsupportedOperation(_)));
    assert!(err.to_string().contains("mode recognition not available"));
}

#[test]
fn every_artifact_carries_the_input_path() {
    init_logging();
    let bundle = analyzed_bundle();

    assert_eq!(bundle.pitch.source, SOURCE);
    assert_eq!(bundle.tonic.source, SOURCE);
    assert_eq!(bundle.ahenk.source, SOURCE);
    assert_eq!(bundle.makam, "hicaz");

    // Stage-internal provenance never leaks through.
    assert!(!bundle.pitch.settings.contains_key("source"));
    assert!(!bundle.tonic.metadata.contains_key("source"));
    assert!(!bundle.ahenk.descriptor.contains_key("source"));

    assert_eq!(bundle.pitch.settings["hop_size"], json!(128));
    assert_eq!(bundle.tonic.metadata["confidence"], json!(0.9));
    assert_eq!(bundle.ahenk.descriptor["tonic"], json!(220.0));
}

#[test]
fn best_tonic_candidate_is_used() {
    let bundle = analyzed_bundle();
    assert_eq!(bundle.tonic.value, 220.0);
    let pd = bundle.pitch_distribution.as_decoded().unwrap();
    assert_eq!(pd.params().ref_freq, 220.0);
}

#[test]
fn filtering_leaves_the_extracted_track_unchanged() {
    let stages = Stages::new(SteadyTone, Decimate, FixedTonic(220.0), Bolahenk, HicazNotes);
    let analyzer = AudioAnalyzer::new(stages);

    let raw = analyzer.extract_pitch(Path::new(SOURCE), SOURCE).unwrap();
    let filtered = analyzer.filter_pitch(&raw).unwrap();

    let raw_samples = raw.samples().unwrap();
    let filtered_samples = filtered.samples().unwrap();
    assert!(raw_samples.iter().all(|s| s.frequency == 220.0));
    assert_eq!(filtered_samples[1].frequency, 0.0);
    assert_eq!(filtered.source, raw.source);
    assert_eq!(filtered.settings, raw.settings);
}

#[test]
fn filters_must_keep_every_frame() {
    let stages = Stages::new(SteadyTone, Truncate, FixedTonic(220.0), Bolahenk, HicazNotes);
    let err = AudioAnalyzer::new(stages).analyze(SOURCE, Some("hicaz")).unwrap_err();
    assert!(matches!(err, AnalysisError::StageContract { stage: "pitch filter", .. }));
    assert!(err.to_string().contains("3 samples for 100"));
}

#[test]
fn distribution_settings_reach_the_builder() {
    let mut analyzer = analyzer();
    analyzer
        .set_pitch_distribution_params([("smooth_factor", ParamValue::Float(0.0))])
        .unwrap();

    let bundle = analyzer.analyze(SOURCE, Some("hicaz")).unwrap();
    let pd = bundle.pitch_distribution.as_decoded().unwrap();
    assert_eq!(pd.params().smooth_factor, 0.0);

    let pcd = bundle.pitch_class_distribution.as_decoded().unwrap();
    assert!(pcd.is_pitch_class());
    assert_eq!(pcd, &pd.to_pcd());
}

#[test]
fn rejected_parameters_leave_the_analyzer_configured_as_before() {
    let mut analyzer = analyzer();
    let before = analyzer.params().clone();
    let err = analyzer
        .set_note_modeler_params([
            ("pitch_threshold", ParamValue::Float(30.0)),
            ("octave", 1i64.into()),
        ])
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(analyzer.params(), &before);
}

#[test]
fn stage_failures_reach_the_caller_unchanged() {
    let stages = Stages::new(BrokenExtractor, KeepAll, FixedTonic(220.0), Bolahenk, HicazNotes);
    let err = AudioAnalyzer::new(stages).analyze(SOURCE, Some("hicaz")).unwrap_err();
    assert!(matches!(err, AnalysisError::Stage(_)));
    assert_eq!(err.to_string(), "decoder exploded");

    let err = analyzer().analyze(SOURCE, Some("rast")).unwrap_err();
    assert_eq!(err.to_string(), "unknown makam rast");
}

#[test]
fn missing_tonic_is_a_contract_violation() {
    let stages = Stages::new(SteadyTone, KeepAll, NoTonic, Bolahenk, HicazNotes);
    let err = AudioAnalyzer::new(stages).analyze(SOURCE, Some("hicaz")).unwrap_err();
    assert!(matches!(err, AnalysisError::StageContract { stage: "tonic identifier", .. }));
}

#[test]
fn only_the_tonic_is_shown_for_a_steady_tone() {
    init_logging();
    let chart = render(&analyzed_bundle()).unwrap();

    assert_eq!(chart.notes.len(), 1);
    assert_eq!(chart.notes[0].symbol, "A4");
    assert_eq!(chart.notes[0].rel_occur, 1.0);
    assert_eq!(chart.note_panel.markers.len(), 1);
    assert_eq!(chart.note_panel.markers[0].kind, MarkerKind::Tonic);
    assert_eq!(chart.note_panel.labels[0].text, "A4, 0 cents");

    assert_eq!(chart.pitch_panel.y_ticks, vec![220.0]);
    assert_eq!(chart.note_panel.y_ticks, chart.pitch_panel.y_ticks);
    assert_eq!(chart.note_panel.x_limits, (0.0, 1.2));
    assert!(!chart.note_panel.frame_visible);
    assert_eq!(chart.width_ratios, [6, 1]);

    assert_eq!(chart.pitch_panel.track.len(), 100);
    assert_eq!(chart.pitch_panel.x_limits.0, 0.0);
    assert!(chart.pitch_panel.track.iter().all(|(_, f)| *f == Some(220.0)));
}

#[test]
fn inaudible_frames_are_blank_in_the_pitch_panel() {
    let mut bundle = analyzed_bundle();
    bundle.pitch.pitch =
        Field::Encoded(json!([[0.0, 220.0], [0.01, 0.0], [0.02, 12.0], [0.03, 220.0]]));

    let chart = render(&bundle).unwrap();
    let drawn: Vec<Option<f64>> = chart.pitch_panel.track.iter().map(|(_, f)| *f).collect();
    assert_eq!(drawn, vec![Some(220.0), None, None, Some(220.0)]);

    // The stored track is not touched.
    assert_eq!(bundle.pitch.samples().unwrap()[1].frequency, 0.0);
}

#[test]
fn charts_need_two_samples_and_a_supported_note() {
    let mut short = analyzed_bundle();
    short.pitch.pitch = Field::Decoded(vec![PitchSample::new(0.0, 220.0)]);
    assert!(matches!(render(&short), Err(AnalysisError::Render(_))));

    let mut no_notes = analyzed_bundle();
    no_notes.stable_notes.clear();
    assert!(matches!(render(&no_notes), Err(AnalysisError::Render(_))));

    // Both degrees sit on empty bins of the distribution.
    let mut unsupported = analyzed_bundle();
    unsupported.stable_notes.remove("A4");
    match render(&unsupported) {
        Err(AnalysisError::Render(message)) => assert!(message.contains("threshold")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn decoding_an_encoded_bundle_gives_it_back() {
    let bundle = analyzed_bundle();
    let tree = codec::encode(&bundle).unwrap();

    // The caller's bundle keeps its rich fields.
    assert!(!bundle.pitch_distribution.is_encoded());
    assert!(!bundle.pitch.pitch.is_encoded());

    let decoded = codec::decode_tree(tree.clone()).unwrap();
    assert_eq!(decoded, bundle);
    assert!(decoded.pitch.pitch.is_encoded());
    assert!(!decoded.pitch_class_distribution.is_encoded());

    assert_eq!(tree["pitch"]["pitch"][1], json!([0.01, 220.0]));
    assert_eq!(tree["pitch_distribution"]["params"]["unit"], json!("cent"));
}

#[test]
fn encoding_twice_gives_the_same_tree() {
    let bundle = analyzed_bundle();
    let once = bundle.encoded().unwrap();
    assert!(once.is_plain());
    assert_eq!(codec::encode(&once).unwrap(), codec::encode(&bundle).unwrap());
}

#[test]
fn saved_features_decode_from_path_or_text() {
    let bundle = analyzed_bundle();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.json");

    codec::save(&bundle, &path).unwrap();
    let from_path = codec::decode(path.to_str().unwrap()).unwrap();
    assert_eq!(from_path, bundle);

    let text = codec::encode_to_string(&bundle).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    assert_eq!(codec::decode(&text).unwrap(), bundle);
}

fn write_tone(path: &Path, freq: f32, seconds: u32) {
    let sample_rate = 22050;
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..sample_rate * seconds {
        let t = i as f32 / sample_rate as f32;
        let s = 0.5 * (2.0 * std::f32::consts::PI * freq * t).sin();
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn built_in_stages_analyze_a_recording() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, 220.0, 2);

    let analyzer = AudioAnalyzer::new(Stages::builtin(Bolahenk, HicazNotes));
    let bundle = analyzer.analyze(&path, Some("hicaz")).unwrap();

    assert!((bundle.tonic.value - 220.0).abs() < 2.0, "tonic {}", bundle.tonic.value);
    assert_eq!(bundle.tonic.metadata["method"], json!("last_note"));
    assert_eq!(bundle.pitch.settings["method"], json!("yin"));
    assert_eq!(bundle.pitch.source, path.to_string_lossy());
    assert_eq!(bundle.ahenk.name, "bolahenk");

    let pd = bundle.pitch_distribution.as_decoded().unwrap();
    assert_eq!(pd.params().unit, Unit::Cent);
    assert_eq!(pd.params().ref_freq, bundle.tonic.value);

    let chart = render(&bundle).unwrap();
    let shown: Vec<&str> = chart.notes.iter().map(|n| n.symbol.as_str()).collect();
    assert_eq!(shown, vec!["A4"]);
    assert_eq!(chart.note_panel.markers[0].kind, MarkerKind::Tonic);
}
