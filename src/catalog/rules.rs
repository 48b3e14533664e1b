// Rule table
// Ordered first-match-wins rules mapping metrics to a target motif label.
// Conditions are parsed once at load time into typed comparisons.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::controls::Metrics;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to read rule table {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule table JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown metric '{0}' in rule {1}")]
    UnknownMetric(String, usize),

    #[error("Malformed condition '{condition}' for '{metric}' in rule {rule}")]
    InvalidCondition {
        rule: usize,
        metric: String,
        condition: String,
    },

    #[error("Rule {0} has an empty label")]
    EmptyLabel(usize),

    #[error("Rule table must end with a default rule (empty 'when')")]
    MissingDefault,
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterOrEqual,
    LessOrEqual,
    Greater,
    Less,
    Equal,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
            Comparison::Less => "<",
            Comparison::Equal => "==",
        }
    }
}

const EQUALITY_TOLERANCE: f64 = 1e-9;

/// Parsed `<op><threshold>` condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub op: Comparison,
    pub threshold: f64,
}

impl Condition {
    /// Parse `">=0.7"`, `"<3"`, `"==-1"` and the like; whitespace is ignored
    pub fn parse(text: &str) -> Option<Condition> {
        let text = text.trim();
        // Two-character operators first so ">=" is not read as ">"
        let (op, rest) = if let Some(rest) = text.strip_prefix(">=") {
            (Comparison::GreaterOrEqual, rest)
        } else if let Some(rest) = text.strip_prefix("<=") {
            (Comparison::LessOrEqual, rest)
        } else if let Some(rest) = text.strip_prefix("==") {
            (Comparison::Equal, rest)
        } else if let Some(rest) = text.strip_prefix('>') {
            (Comparison::Greater, rest)
        } else if let Some(rest) = text.strip_prefix('<') {
            (Comparison::Less, rest)
        } else {
            return None;
        };

        let threshold: f64 = rest.trim().parse().ok()?;
        if !threshold.is_finite() {
            return None;
        }
        Some(Condition { op, threshold })
    }

    pub fn holds(&self, value: f64) -> bool {
        match self.op {
            Comparison::GreaterOrEqual => value >= self.threshold,
            Comparison::LessOrEqual => value <= self.threshold,
            Comparison::Greater => value > self.threshold,
            Comparison::Less => value < self.threshold,
            Comparison::Equal => (value - self.threshold).abs() <= EQUALITY_TOLERANCE,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.threshold)
    }
}

/// Metric a condition reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetricKey {
    Ctr,
    Impressions,
    Clicks,
    Position,
    /// Dominant momentum label as +1 / 0 / -1
    Mode,
}

impl MetricKey {
    pub fn parse(name: &str) -> Option<MetricKey> {
        match name.trim() {
            "ctr" => Some(MetricKey::Ctr),
            "impressions" => Some(MetricKey::Impressions),
            "clicks" => Some(MetricKey::Clicks),
            "position" => Some(MetricKey::Position),
            "mode" => Some(MetricKey::Mode),
            _ => None,
        }
    }
}

/// Values rules are evaluated against
#[derive(Debug, Clone, Copy)]
pub struct RuleInputs {
    pub metrics: Metrics,
    pub mode: f64,
}

impl RuleInputs {
    pub fn new(metrics: Metrics, mode: f64) -> Self {
        RuleInputs { metrics, mode }
    }

    pub fn value(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::Ctr => self.metrics.ctr,
            MetricKey::Impressions => self.metrics.impressions,
            MetricKey::Clicks => self.metrics.clicks,
            MetricKey::Position => self.metrics.position,
            MetricKey::Mode => self.mode,
        }
    }
}

/// One rule: all conditions must hold for `label` to be chosen
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub conditions: Vec<(MetricKey, Condition)>,
    pub label: String,
}

impl Rule {
    /// An empty condition set always matches
    pub fn is_default(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        self.conditions
            .iter()
            .all(|(key, condition)| condition.holds(inputs.value(*key)))
    }
}

#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    when: BTreeMap<String, String>,
    choose_label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRuleTable {
    List(Vec<RawRule>),
    Wrapped { rules: Vec<RawRule> },
}

/// Ordered, validated rule list
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Build from parsed rules; the last rule must be a default
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        match rules.last() {
            Some(last) if last.is_default() => Ok(RuleTable { rules }),
            _ => Err(RuleError::MissingDefault),
        }
    }

    /// Parse a bare rule array or a `{"rules": [...]}` object
    pub fn from_json_str(json: &str) -> Result<Self, RuleError> {
        let raw_rules = match serde_json::from_str::<RawRuleTable>(json)? {
            RawRuleTable::List(rules) => rules,
            RawRuleTable::Wrapped { rules } => rules,
        };

        let mut rules = Vec::with_capacity(raw_rules.len());
        for (index, raw) in raw_rules.into_iter().enumerate() {
            let label = raw.choose_label.trim().to_string();
            if label.is_empty() {
                return Err(RuleError::EmptyLabel(index));
            }

            let mut conditions = Vec::with_capacity(raw.when.len());
            for (metric, text) in raw.when {
                let key = MetricKey::parse(&metric)
                    .ok_or_else(|| RuleError::UnknownMetric(metric.clone(), index))?;
                let condition = Condition::parse(&text).ok_or_else(|| RuleError::InvalidCondition {
                    rule: index,
                    metric: metric.clone(),
                    condition: text.clone(),
                })?;
                conditions.push((key, condition));
            }

            rules.push(Rule { conditions, label });
        }

        RuleTable::new(rules)
    }

    /// Label of the first matching rule
    pub fn resolve(&self, inputs: &RuleInputs) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(inputs))
            .or(self.rules.last())
            .map(|rule| rule.label.as_str())
            .unwrap_or_default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Load and validate a rule table file
pub fn load_rule_table(path: &Path) -> Result<RuleTable, RuleError> {
    let json = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = RuleTable::from_json_str(&json)?;
    log::info!("Loaded rule table {:?}: {} rules", path, table.len());
    Ok(table)
}
