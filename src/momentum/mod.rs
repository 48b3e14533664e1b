// Momentum - Per-section positive/neutral/negative energy labels

pub mod classifier;
pub mod export;

// Re-export main types
pub use classifier::{
    classify_sections, dominant_label, pitch_slope, MomentumClassifier, MomentumComponents,
    MomentumConfig, MomentumError, MomentumLabel, MomentumRecord,
};
pub use export::{export_records_json, write_records_json};
