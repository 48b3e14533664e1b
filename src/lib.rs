// MotifForge - deterministic MIDI analysis, motif selection, transformation and mastering
// Module declarations

pub mod audio;
pub mod bars;
pub mod catalog;
pub mod config;
pub mod controls;
pub mod mastering;
pub mod midi;
pub mod momentum;
pub mod pipeline;
pub mod render;
pub mod sections;
pub mod transform;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{run_pipeline, GenerationRequest, GenerationResult, PipelineContext, PipelineError};
