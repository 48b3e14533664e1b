// Catalog - Motifs, rule table and deterministic motif selection
// Catalog and rule table are process-wide and read-only once loaded

pub mod motif;
pub mod predictor;
pub mod rules;
pub mod seed;
pub mod selector;
pub mod store;

// Re-export main types
pub use motif::{placeholder_motifs, Motif, MotifMetadata};
pub use predictor::{ContourPredictor, LabelPredictor, PredictorError};
pub use rules::{load_rule_table, Comparison, Condition, MetricKey, Rule, RuleError, RuleInputs, RuleTable};
pub use seed::{selection_rng, stable_seed};
pub use selector::{MotifSelection, MotifSelector, SelectionConfig, SelectionRequest, SelectionTier};
pub use store::{
    load_catalog, reload_catalog, reload_rules, shared_catalog, shared_rules, Catalog, CatalogError,
    SharedSlot, CATALOG, RULES,
};
