// Motif selector
// Resolves a target label from the rule table and draws a deterministic motif set.
// Shortages are never errors: they walk down the fallback tiers.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::motif::{placeholder_motifs, Motif};
use super::predictor::{predict_or_none, LabelPredictor};
use super::rules::{RuleInputs, RuleTable};
use super::seed::{selection_rng, stable_seed};
use super::store::Catalog;
use crate::controls::{Controls, Metrics};
use crate::momentum::MomentumLabel;

/// Selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Motifs requested per job
    pub motif_count: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig { motif_count: 4 }
    }
}

/// Which candidate pool a selection was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    /// Motifs labeled with the target label
    Labeled,
    /// Labeled motifs plus unlabeled ones the predictor assigned the target label
    Predicted,
    /// Labeled motifs plus unlabeled ones
    Unlabeled,
    /// Every motif in the catalog
    FullCatalog,
    /// Synthesized stand-ins for an empty catalog
    Placeholder,
    /// Catalog has no labels; seeded from tenant and controls
    Untrained,
}

/// Inputs of one selection call
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub tenant_id: &'a str,
    pub metrics: &'a Metrics,
    pub controls: &'a Controls,
    /// Dominant momentum of the base performance
    pub mode: MomentumLabel,
    pub count: usize,
}

/// Ordered selection result
#[derive(Debug, Clone, Serialize)]
pub struct MotifSelection {
    pub target_label: String,
    pub tier: SelectionTier,
    pub seed: u64,
    pub motifs: Vec<Motif>,
}

impl MotifSelection {
    pub fn ids(&self) -> Vec<&str> {
        self.motifs.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Catalog sampler bound to a catalog, a rule table and an optional predictor
pub struct MotifSelector<'a> {
    catalog: &'a Catalog,
    rules: &'a RuleTable,
    predictor: Option<&'a dyn LabelPredictor>,
}

impl<'a> MotifSelector<'a> {
    pub fn new(catalog: &'a Catalog, rules: &'a RuleTable) -> Self {
        MotifSelector {
            catalog,
            rules,
            predictor: None,
        }
    }

    pub fn with_predictor(mut self, predictor: Option<&'a dyn LabelPredictor>) -> Self {
        self.predictor = predictor;
        self
    }

    /// Choose motifs for a request; identical inputs give identical ordered ids
    pub fn select(&self, request: &SelectionRequest<'_>) -> MotifSelection {
        let inputs = RuleInputs::new(*request.metrics, request.mode.mode_value());
        let target_label = self.rules.resolve(&inputs).to_string();

        let selection = if self.catalog.is_empty() {
            self.placeholder(request, target_label)
        } else if !self.catalog.is_trained() {
            self.untrained(request, target_label)
        } else {
            self.trained(request, target_label)
        };

        log::info!(
            "Selected {} motifs for tenant {} (label={}, tier={:?}, seed={:016x})",
            selection.motifs.len(),
            request.tenant_id,
            selection.target_label,
            selection.tier,
            selection.seed
        );

        selection
    }

    fn placeholder(&self, request: &SelectionRequest<'_>, target_label: String) -> MotifSelection {
        log::info!("Catalog is empty, synthesizing {} placeholder motifs", request.count);
        let seed = stable_seed(&[request.tenant_id, &target_label, &request.count.to_string()]);
        MotifSelection {
            motifs: placeholder_motifs(&target_label, request.count),
            target_label,
            tier: SelectionTier::Placeholder,
            seed,
        }
    }

    fn untrained(&self, request: &SelectionRequest<'_>, target_label: String) -> MotifSelection {
        let pool: Vec<&Motif> = self.catalog.motifs.iter().collect();
        let seed = stable_seed(&[request.tenant_id, &request.controls.seed_key()]);
        MotifSelection {
            motifs: sample_pool(pool, request.count, seed),
            target_label,
            tier: SelectionTier::Untrained,
            seed,
        }
    }

    fn trained(&self, request: &SelectionRequest<'_>, target_label: String) -> MotifSelection {
        let mut pool: Vec<&Motif> = self.catalog.with_label(&target_label).collect();
        let mut tier = SelectionTier::Labeled;

        if pool.len() < request.count {
            let unlabeled: Vec<&Motif> = self.catalog.unlabeled().collect();
            let (promoted, rest): (Vec<&Motif>, Vec<&Motif>) = match self.predictor {
                Some(predictor) => unlabeled.into_iter().partition(|motif| {
                    predict_or_none(predictor, motif).as_deref() == Some(target_label.as_str())
                }),
                None => (Vec::new(), unlabeled),
            };

            if !promoted.is_empty() {
                pool.extend(promoted);
                tier = SelectionTier::Predicted;
            }
            if pool.len() < request.count && !rest.is_empty() {
                pool.extend(rest);
                tier = SelectionTier::Unlabeled;
            }
        }

        if pool.len() < request.count {
            log::info!(
                "Only {} candidates for label '{}', falling back to the full catalog",
                pool.len(),
                target_label
            );
            pool = self.catalog.motifs.iter().collect();
            tier = SelectionTier::FullCatalog;
        }

        let seed = stable_seed(&[request.tenant_id, &target_label, &pool.len().to_string()]);
        MotifSelection {
            motifs: sample_pool(pool, request.count, seed),
            target_label,
            tier,
            seed,
        }
    }
}

/// Id ordering for sampling: numeric ids by value, ahead of textual ids in byte order
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort by id and draw up to `count` motifs without replacement
fn sample_pool(mut pool: Vec<&Motif>, count: usize, seed: u64) -> Vec<Motif> {
    pool.sort_by(|a, b| compare_ids(&a.id, &b.id));
    let amount = count.min(pool.len());
    let mut rng = selection_rng(seed);

    rand::seq::index::sample(&mut rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}
