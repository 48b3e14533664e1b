// Pipeline error
// Stage errors pass through unchanged; kind() names the failure for the orchestrator

use thiserror::Error;

use super::trace::TraceError;
use crate::audio::AudioError;
use crate::bars::BarError;
use crate::catalog::{CatalogError, RuleError};
use crate::config::ConfigError;
use crate::controls::ControlError;
use crate::momentum::MomentumError;
use crate::sections::SectionError;
use crate::transform::TransformError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Bars(#[from] BarError),

    #[error(transparent)]
    Sections(#[from] SectionError),

    #[error(transparent)]
    Momentum(#[from] MomentumError),

    #[error(transparent)]
    Controls(#[from] ControlError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Taxonomy name surfaced with the job failure
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Bars(BarError::MidiLoad { .. }) => "MidiLoadError",
            PipelineError::Bars(BarError::NoInstruments { .. }) => "NoInstrumentsError",
            PipelineError::Sections(SectionError::EmptyInput) => "EmptyInputError",
            PipelineError::Momentum(MomentumError::NoTokens) => "NoTokensError",
            PipelineError::Momentum(_) => "MomentumExportError",
            PipelineError::Controls(_) => "ControlValidationError",
            PipelineError::Catalog(_) => "CatalogLoadError",
            PipelineError::Rules(_) => "RuleTableError",
            PipelineError::Transform(_) => "MidiTransformError",
            PipelineError::Audio(_) => "AudioEncodeError",
            PipelineError::Trace(_) => "TraceWriteError",
            PipelineError::Config(_) => "ConfigError",
        }
    }
}
