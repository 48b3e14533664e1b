// Mastering module
// Loudness-targeted mastering chain and its DSP building blocks

pub mod chain;
pub mod dynamics;
pub mod filter;
pub mod loudness;

pub use chain::{master, MasteredAudio, MasteringConfig, MasteringReport, MasteringWarning, MultibandSettings};
pub use dynamics::{amp_to_db, db_to_amp, CompressorSettings, LimiterSettings};
pub use loudness::{integrated_loudness, measure_integrated_lufs};
