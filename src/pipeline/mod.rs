// Pipeline execution and monitoring module
// Composes the analysis, selection, transform and mastering stages into one job

pub mod error;
pub mod job;
pub mod trace;

pub use error::PipelineError;
pub use job::{run_pipeline, GenerationRequest, GenerationResult, PipelineContext};
pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
