// End-to-end generation jobs through the public API

use std::sync::Arc;

use motifforge_lib::audio::ingest_wav;
use motifforge_lib::catalog::{Catalog, ContourPredictor, RuleTable, SelectionTier};
use motifforge_lib::controls::Metrics;
use motifforge_lib::mastering::measure_integrated_lufs;
use motifforge_lib::midi::{
    read_performance, verify_smf, write_smf, Instrument, MidiExportOptions, Performance, PerformanceNote,
};
use motifforge_lib::momentum::MomentumLabel;
use motifforge_lib::pipeline::{read_trace_file, Stage};
use motifforge_lib::{run_pipeline, GenerationRequest, PipelineConfig, PipelineContext};
use tempfile::TempDir;

const CATALOG_JSON: &str = r#"{
    "motifs": [
        { "id": "rise_a", "label": "uplift", "notes": [
            { "pitch": 60, "velocity": 100, "start": 0.0, "end": 0.25 },
            { "pitch": 64, "velocity": 100, "start": 0.25, "end": 0.5 },
            { "pitch": 67, "velocity": 105, "start": 0.5, "end": 0.75 } ] },
        { "id": "rise_b", "label": "uplift", "notes": [
            { "pitch": 62, "velocity": 96, "start": 0.0, "duration": 0.5 },
            { "pitch": 69, "velocity": 110, "start": 0.5, "duration": 0.5 } ] },
        { "id": 7, "label": "calm", "notes": [
            { "pitch": 55, "velocity": 50, "start": 0.0, "end": 1.0 } ] },
        { "id": "loose_1", "notes": [
            { "pitch": 72, "velocity": 70, "start": 0.0, "end": 0.5 },
            { "pitch": 71, "velocity": 70, "start": 0.5, "end": 1.0 } ] }
    ],
    "categories": { "uplift": "rising lines" }
}"#;

const RULES_JSON: &str = r#"{ "rules": [
    { "when": { "ctr": ">=0.6", "mode": ">0" }, "choose_label": "uplift" },
    { "when": { "ctr": "<0.3" }, "choose_label": "calm" },
    { "when": {}, "choose_label": "uplift" }
] }"#;

/// `bars` bars of 4/4 at 120 BPM: a rising line plus a backbeat
fn base_midi(bars: usize) -> Vec<u8> {
    let mut performance = Performance::empty(120.0);
    let mut lead = Instrument::new("Lead", 81, 0);
    for i in 0..bars * 4 {
        let start = i as f64 * 0.5;
        lead.notes.push(PerformanceNote::new(48 + (i % 32) as u8, 110, start, start + 0.45));
    }
    let mut drums = Instrument::new("Drums", 0, 9);
    for i in 0..bars * 2 {
        let start = 0.5 + i as f64 * 1.0;
        drums.notes.push(PerformanceNote::new(38, 100, start, start + 0.1));
    }
    performance.instruments.push(lead);
    performance.instruments.push(drums);

    write_smf(&performance, &MidiExportOptions::default()).unwrap()
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.transform.arrangement_duration_sec = 6.0;
    config.render.tail_sec = 0.5;
    config
}

fn context(config: &PipelineConfig) -> PipelineContext<'_> {
    PipelineContext::new(
        Arc::new(Catalog::from_json_str(CATALOG_JSON).unwrap()),
        Arc::new(RuleTable::from_json_str(RULES_JSON).unwrap()),
        config,
    )
}

fn request(tenant_id: &str, base_midi: Option<Vec<u8>>) -> GenerationRequest {
    GenerationRequest {
        tenant_id: tenant_id.to_string(),
        metrics: Metrics::new(0.75, 0.6, 0.4, 0.2),
        base_midi,
        motif_count: Some(2),
    }
}

#[test]
fn test_full_job_with_base_midi() {
    let config = test_config();
    let result = run_pipeline(&request("tenant-a", Some(base_midi(8))), &context(&config)).unwrap();

    // 8 bars in windows of 4
    assert_eq!(result.dedup_total, 2);
    assert!(result.dedup_unique >= 1);
    assert_eq!(result.momentum.len(), result.dedup_unique);

    // ctr 0.75 => 160 BPM; rising line at high velocity reads positive
    assert_eq!(result.controls.bpm(), 160);
    assert!(result.momentum.iter().all(|r| r.label == MomentumLabel::Positive));
    assert_eq!(result.selection.target_label, "uplift");
    assert_eq!(result.selection.tier, SelectionTier::Labeled);
    assert_eq!(result.selection.motifs.len(), 2);

    let summary = verify_smf(&result.midi_bytes).unwrap();
    assert_eq!(summary.format, 1);
    // conductor, lead, drums, two motif voices
    assert_eq!(summary.track_count, 5);
    // CC74 and CC91 on every instrument
    assert_eq!(summary.controller_count, 8);

    let reparsed = read_performance(&result.midi_bytes).unwrap();
    assert!((reparsed.initial_bpm() - 160.0).abs() < 0.01);

    let audio = ingest_wav(&result.wav_bytes).unwrap();
    assert!(audio.peak() <= 10f32.powf(-1.0 / 20.0) + 1e-3);
    let lufs = measure_integrated_lufs(&audio).unwrap();
    assert!((lufs - config.mastering.target_lufs).abs() < 0.5, "lufs {}", lufs);

    let stages: Vec<Stage> = result.trace.iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::BarExtraction,
            Stage::SectionTokenization,
            Stage::MomentumClassification,
            Stage::ControlMapping,
            Stage::MotifSelection,
            Stage::MidiTransform,
            Stage::Render,
            Stage::Mastering,
        ]
    );
    assert!(result.trace.iter().all(|e| e.job_id == result.job_id));
}

#[test]
fn test_job_without_base_midi_skips_analysis() {
    let config = test_config();
    let result = run_pipeline(&request("tenant-a", None), &context(&config)).unwrap();

    assert!(result.momentum.is_empty());
    assert_eq!(result.dedup_total, 0);
    assert_eq!(result.trace[0].stage, Stage::ControlMapping);

    // Motif voices only: conductor plus two voices
    let summary = verify_smf(&result.midi_bytes).unwrap();
    assert_eq!(summary.track_count, 3);
    assert!(summary.note_on_count > 0);
}

#[test]
fn test_same_request_same_musical_output() {
    let config = test_config();
    let ctx = context(&config);
    let first = run_pipeline(&request("tenant-a", Some(base_midi(4))), &ctx).unwrap();
    let second = run_pipeline(&request("tenant-a", Some(base_midi(4))), &ctx).unwrap();

    assert_ne!(first.job_id, second.job_id);
    assert_eq!(first.selection.ids(), second.selection.ids());
    assert_eq!(first.midi_bytes, second.midi_bytes);
    assert_eq!(first.wav_bytes, second.wav_bytes);
}

#[test]
fn test_empty_catalog_uses_placeholders() {
    let config = test_config();
    let ctx = PipelineContext::new(
        Arc::new(Catalog::default()),
        Arc::new(RuleTable::from_json_str(RULES_JSON).unwrap()),
        &config,
    );
    let result = run_pipeline(&request("tenant-b", None), &ctx).unwrap();

    assert_eq!(result.selection.tier, SelectionTier::Placeholder);
    assert_eq!(result.selection.motifs.len(), 2);
    assert!(verify_smf(&result.midi_bytes).is_ok());
}

#[test]
fn test_predictor_is_optional_capability() {
    let config = test_config();
    let predictor = ContourPredictor::default();
    let ctx = context(&config).with_predictor(&predictor);

    let mut req = request("tenant-c", None);
    req.motif_count = Some(3);
    let result = run_pipeline(&req, &ctx).unwrap();
    assert_eq!(result.selection.motifs.len(), 3);
}

#[test]
fn test_garbage_midi_is_midi_load_error() {
    let config = test_config();
    let err = run_pipeline(&request("tenant-x", Some(b"MThd garbage".to_vec())), &context(&config)).unwrap_err();

    assert_eq!(err.kind(), "MidiLoadError");
    assert!(err.to_string().contains("tenant-x"));
}

#[test]
fn test_noteless_midi_is_no_instruments_error() {
    let silent = write_smf(&Performance::empty(120.0), &MidiExportOptions::default()).unwrap();
    let config = test_config();
    let err = run_pipeline(&request("tenant-y", Some(silent)), &context(&config)).unwrap_err();

    assert_eq!(err.kind(), "NoInstrumentsError");
}

#[test]
fn test_out_of_range_metrics_fail_validation() {
    let config = test_config();
    let mut req = request("tenant-z", None);
    req.metrics = Metrics::new(2.0, 0.5, 0.5, 0.5);

    let err = run_pipeline(&req, &context(&config)).unwrap_err();
    assert_eq!(err.kind(), "ControlValidationError");
}

#[test]
fn test_trace_appended_to_configured_file() {
    let temp_dir = TempDir::new().unwrap();
    let trace_path = temp_dir.path().join("jobs.jsonl");
    let mut config = test_config();
    config.trace_path = Some(trace_path.clone());

    let ctx = context(&config);
    let first = run_pipeline(&request("tenant-a", None), &ctx).unwrap();
    let second = run_pipeline(&request("tenant-a", None), &ctx).unwrap();

    let entries = read_trace_file(&trace_path).unwrap();
    assert_eq!(entries.len(), first.trace.len() + second.trace.len());
    assert_eq!(entries[0].job_id, first.job_id);
    assert_eq!(entries.last().unwrap().job_id, second.job_id);
}

#[test]
fn test_context_from_shared_requires_rules() {
    let config = test_config();
    let err = PipelineContext::from_shared(&config).err().unwrap();
    assert_eq!(err.kind(), "ConfigError");
}
