// Generation job
// Runs bars -> sections -> momentum -> controls -> selection -> transform -> render -> mastering

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::PipelineError;
use super::trace::{Stage, TraceBuilder, TraceEntry, TraceWriter};
use crate::audio::encode_wav;
use crate::bars::{extract_bars, load_performance};
use crate::catalog::{
    shared_catalog, shared_rules, Catalog, LabelPredictor, MotifSelection, MotifSelector, RuleTable,
    SelectionRequest,
};
use crate::config::{ConfigError, PipelineConfig};
use crate::controls::{map_controls, Controls, Metrics};
use crate::mastering::{master, MasteringReport};
use crate::midi::Performance;
use crate::momentum::{dominant_label, MomentumClassifier, MomentumLabel, MomentumRecord};
use crate::render::render_performance;
use crate::sections::{deduplicate_sections, tokenize_sections};
use crate::transform::transform_performance;

/// One generation job as submitted by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tenant_id: String,
    pub metrics: Metrics,

    /// Standard MIDI file to analyze and transform; absent means start from silence
    #[serde(default)]
    pub base_midi: Option<Vec<u8>>,

    /// Overrides the configured motif count
    #[serde(default)]
    pub motif_count: Option<usize>,
}

/// Shared read-only state a job runs against
pub struct PipelineContext<'a> {
    pub catalog: Arc<Catalog>,
    pub rules: Arc<RuleTable>,
    pub predictor: Option<&'a dyn LabelPredictor>,
    pub config: &'a PipelineConfig,
}

impl<'a> PipelineContext<'a> {
    pub fn new(catalog: Arc<Catalog>, rules: Arc<RuleTable>, config: &'a PipelineConfig) -> Self {
        PipelineContext {
            catalog,
            rules,
            predictor: None,
            config,
        }
    }

    pub fn with_predictor(mut self, predictor: &'a dyn LabelPredictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Build a context from the process-wide catalog and rule table slots
    ///
    /// The first call loads both files; later calls share the cached values.
    /// Without a catalog path the job runs against an empty catalog.
    pub fn from_shared(config: &'a PipelineConfig) -> Result<Self, PipelineError> {
        let rules_path = config
            .rules_path
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("rules_path is required".to_string()))?;
        let rules = shared_rules(rules_path)?;

        let catalog = match config.catalog_path.as_deref() {
            Some(path) => shared_catalog(path)?,
            None => Arc::new(Catalog::default()),
        };

        Ok(Self::new(catalog, rules, config))
    }
}

/// Everything a job produced
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub job_id: Uuid,
    pub controls: Controls,
    pub momentum: Vec<MomentumRecord>,
    /// Sections before deduplication
    pub dedup_total: usize,
    /// Sections after deduplication
    pub dedup_unique: usize,
    pub selection: MotifSelection,
    pub midi_bytes: Vec<u8>,
    pub wav_bytes: Vec<u8>,
    pub mastering: MasteringReport,
    pub trace: Vec<TraceEntry>,
}

/// Analysis of the base performance, stages 1-3
struct Analysis {
    performance: Option<Performance>,
    momentum: Vec<MomentumRecord>,
    total: usize,
    unique: usize,
    mode: MomentumLabel,
}

fn analyze(
    request: &GenerationRequest,
    config: &PipelineConfig,
    trace: &mut TraceBuilder,
) -> Result<Analysis, PipelineError> {
    let bytes = match &request.base_midi {
        Some(bytes) => bytes,
        None => {
            return Ok(Analysis {
                performance: None,
                momentum: Vec::new(),
                total: 0,
                unique: 0,
                mode: MomentumLabel::Neutral,
            })
        }
    };

    let performance = load_performance(&request.tenant_id, bytes)?;
    let bars = extract_bars(&request.tenant_id, &performance)?;
    trace.record(Stage::BarExtraction, format!("{} bars", bars.len()), None);

    let sections = tokenize_sections(&bars, &config.sections)?;
    let dedup = deduplicate_sections(sections);
    trace.record(
        Stage::SectionTokenization,
        format!("{} sections, {} unique", dedup.total, dedup.unique),
        Some(serde_json::json!({ "total": dedup.total, "unique": dedup.unique })),
    );

    let classifier = MomentumClassifier::with_config(config.momentum.clone());
    let momentum = classifier.classify_all(&dedup.sections)?;
    let mode = dominant_label(&momentum);
    trace.record(
        Stage::MomentumClassification,
        format!("{} records, dominant {}", momentum.len(), mode),
        None,
    );

    Ok(Analysis {
        performance: Some(performance),
        momentum,
        total: dedup.total,
        unique: dedup.unique,
        mode,
    })
}

/// Run one generation job end to end
///
/// The first fatal stage error is returned unchanged inside [`PipelineError`];
/// mastering degradation only shows up in the report and the logs.
pub fn run_pipeline(
    request: &GenerationRequest,
    context: &PipelineContext<'_>,
) -> Result<GenerationResult, PipelineError> {
    let config = context.config;
    let job_id = Uuid::new_v4();
    let mut trace = TraceBuilder::new(job_id);
    log::info!("Starting job {} for tenant {}", job_id, request.tenant_id);

    let analysis = analyze(request, config, &mut trace)?;

    let controls = map_controls(&request.metrics)?;
    trace.record(
        Stage::ControlMapping,
        format!(
            "bpm={} transpose={} velocity={} filter={} reverb={}",
            controls.bpm(),
            controls.transpose(),
            controls.velocity(),
            controls.filter(),
            controls.reverb()
        ),
        None,
    );

    let selector = MotifSelector::new(&context.catalog, &context.rules).with_predictor(context.predictor);
    let selection = selector.select(&SelectionRequest {
        tenant_id: &request.tenant_id,
        metrics: &request.metrics,
        controls: &controls,
        mode: analysis.mode,
        count: request.motif_count.unwrap_or(config.selection.motif_count),
    });
    trace.record(
        Stage::MotifSelection,
        format!("{} motifs labeled '{}'", selection.motifs.len(), selection.target_label),
        Some(serde_json::json!({
            "tier": selection.tier,
            "seed": format!("{:016x}", selection.seed),
            "ids": selection.ids(),
        })),
    );

    let transformed = transform_performance(
        analysis.performance.as_ref(),
        &controls,
        &selection.motifs,
        &config.transform,
    )?;
    trace.record(
        Stage::MidiTransform,
        format!(
            "{} bytes, {} notes, {} tracks",
            transformed.bytes.len(),
            transformed.summary.note_on_count,
            transformed.summary.track_count
        ),
        None,
    );

    let rendered = render_performance(&transformed.performance, &config.render);
    trace.record(Stage::Render, format!("{:.2}s", rendered.duration_secs()), None);

    let mastered = master(&rendered, &config.mastering);
    let wav_bytes = encode_wav(&mastered.audio, config.output_encoding)?;
    trace.record(
        Stage::Mastering,
        format!(
            "output {:?} LUFS, peak {:.2} dBFS, {} warnings",
            mastered.report.output_lufs,
            mastered.report.peak_dbfs,
            mastered.report.warnings.len()
        ),
        None,
    );

    let entries = trace.finish();
    if let Some(path) = &config.trace_path {
        TraceWriter::new(path.clone()).write_batch(&entries)?;
    }

    log::info!(
        "Finished job {}: {} MIDI bytes, {} WAV bytes",
        job_id,
        transformed.bytes.len(),
        wav_bytes.len()
    );

    Ok(GenerationResult {
        job_id,
        controls,
        momentum: analysis.momentum,
        dedup_total: analysis.total,
        dedup_unique: analysis.unique,
        selection,
        midi_bytes: transformed.bytes,
        wav_bytes,
        mastering: mastered.report,
        trace: entries,
    })
}
