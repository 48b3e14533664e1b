// Generation job tracing
// One entry per completed stage, appended to a JSONL file when configured

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Trace IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BarExtraction,
    SectionTokenization,
    MomentumClassification,
    ControlMapping,
    MotifSelection,
    MidiTransform,
    Render,
    Mastering,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BarExtraction => "bar_extraction",
            Stage::SectionTokenization => "section_tokenization",
            Stage::MomentumClassification => "momentum_classification",
            Stage::ControlMapping => "control_mapping",
            Stage::MotifSelection => "motif_selection",
            Stage::MidiTransform => "midi_transform",
            Stage::Render => "render",
            Stage::Mastering => "mastering",
        }
    }
}

/// A single trace entry in a job's execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub job_id: Uuid,

    /// When the stage finished
    pub timestamp: DateTime<Utc>,

    pub stage: Stage,

    /// Wall time spent in the stage
    pub elapsed_ms: f64,

    /// Human-readable summary of what the stage produced
    pub message: String,

    /// Optional structured data (counts, chosen label, seed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Collects trace entries for one job, timing each stage from the previous mark
#[derive(Debug)]
pub struct TraceBuilder {
    job_id: Uuid,
    last_mark: Instant,
    entries: Vec<TraceEntry>,
}

impl TraceBuilder {
    pub fn new(job_id: Uuid) -> Self {
        TraceBuilder {
            job_id,
            last_mark: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Record a finished stage
    pub fn record(&mut self, stage: Stage, message: impl Into<String>, data: Option<serde_json::Value>) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.last_mark).as_secs_f64() * 1000.0;
        self.last_mark = now;

        let entry = TraceEntry {
            job_id: self.job_id,
            timestamp: Utc::now(),
            stage,
            elapsed_ms,
            message: message.into(),
            data,
        };
        log::debug!("[{}] {}: {}", self.job_id, stage.as_str(), entry.message);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn finish(self) -> Vec<TraceEntry> {
        self.entries
    }
}

/// Append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append entries in one write; creates the file if it doesn't exist
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut buffer = String::new();
        for entry in entries {
            buffer.push_str(&entry.to_json_line()?);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
