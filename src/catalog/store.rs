// Catalog store
// JSON catalog loading and the process-wide read-only slots for catalog and rules

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::motif::{Motif, MotifMetadata};
use super::rules::{load_rule_table, RuleError, RuleTable};
use crate::bars::Note;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid motif '{id}': {reason}")]
    InvalidMotif { id: String, reason: String },

    #[error("Duplicate motif id '{0}'")]
    DuplicateId(String),
}

/// Motif ids appear as strings or integers in catalog files
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawNote {
    pitch: i64,
    velocity: i64,
    start: f64,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct RawMotif {
    id: RawId,
    #[serde(default)]
    notes: Vec<RawNote>,
    #[serde(default)]
    metadata: Option<MotifMetadata>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    motifs: Vec<RawMotif>,
    #[serde(default)]
    categories: Option<serde_json::Value>,
    #[serde(default)]
    training_metadata: Option<serde_json::Value>,
}

fn convert_note(id: &str, raw: RawNote) -> Result<Note, CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidMotif {
        id: id.to_string(),
        reason,
    };

    if !(0..=127).contains(&raw.pitch) {
        return Err(invalid(format!("pitch {} outside 0-127", raw.pitch)));
    }
    if !(0..=127).contains(&raw.velocity) {
        return Err(invalid(format!("velocity {} outside 0-127", raw.velocity)));
    }
    if !raw.start.is_finite() || raw.start < 0.0 {
        return Err(invalid(format!("bad note start {}", raw.start)));
    }

    let duration = match (raw.duration, raw.end) {
        (Some(d), _) => d,
        (None, Some(end)) => end - raw.start,
        (None, None) => return Err(invalid("note has neither end nor duration".to_string())),
    };
    if !duration.is_finite() || duration < 0.0 {
        return Err(invalid(format!("bad note duration {}", duration)));
    }

    Ok(Note::new(raw.pitch as u8, raw.velocity as u8, raw.start, duration))
}

/// Immutable motif catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub motifs: Vec<Motif>,
    /// Opaque grouping data carried through from the catalog file
    pub categories: Option<serde_json::Value>,
    /// Opaque training provenance carried through from the catalog file
    pub training_metadata: Option<serde_json::Value>,
}

impl Catalog {
    pub fn new(motifs: Vec<Motif>) -> Self {
        Catalog {
            motifs,
            categories: None,
            training_metadata: None,
        }
    }

    /// Parse catalog JSON, computing missing motif metadata from notes
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut seen = HashSet::with_capacity(raw.motifs.len());
        let mut motifs = Vec::with_capacity(raw.motifs.len());

        for raw_motif in raw.motifs {
            let id = raw_motif.id.into_string();
            if !seen.insert(id.clone()) {
                return Err(CatalogError::DuplicateId(id));
            }

            let notes = raw_motif
                .notes
                .into_iter()
                .map(|n| convert_note(&id, n))
                .collect::<Result<Vec<_>, _>>()?;
            let metadata = raw_motif
                .metadata
                .unwrap_or_else(|| MotifMetadata::from_notes(&notes));
            let label = raw_motif.label.filter(|l| !l.trim().is_empty());

            motifs.push(Motif {
                id,
                notes,
                metadata,
                label,
            });
        }

        Ok(Catalog {
            motifs,
            categories: raw.categories,
            training_metadata: raw.training_metadata,
        })
    }

    pub fn len(&self) -> usize {
        self.motifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }

    /// A catalog is trained once any motif carries a label
    pub fn is_trained(&self) -> bool {
        self.motifs.iter().any(Motif::is_labeled)
    }

    pub fn get(&self, id: &str) -> Option<&Motif> {
        self.motifs.iter().find(|m| m.id == id)
    }

    pub fn with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Motif> + 'a {
        self.motifs.iter().filter(move |m| m.has_label(label))
    }

    pub fn unlabeled(&self) -> impl Iterator<Item = &Motif> {
        self.motifs.iter().filter(|m| !m.is_labeled())
    }
}

/// Load a catalog file
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = Catalog::from_json_str(&json)?;

    log::info!(
        "Loaded catalog {:?}: {} motifs ({} labeled)",
        path,
        catalog.len(),
        catalog.motifs.iter().filter(|m| m.is_labeled()).count()
    );

    Ok(catalog)
}

/// Process-wide, read-only value with guarded lazy initialization
///
/// The first caller of `get_or_try_init` loads the value while concurrent
/// callers wait on the init lock and then observe the same `Arc`. `reload`
/// builds the replacement outside the read path and publishes it with a
/// single pointer swap, so readers holding the previous `Arc` keep a
/// consistent value.
pub struct SharedSlot<T> {
    value: RwLock<Option<Arc<T>>>,
    init: Mutex<()>,
}

impl<T> Default for SharedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedSlot<T> {
    pub const fn new() -> Self {
        SharedSlot {
            value: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    /// Current value, if loaded
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Return the loaded value, loading it first if this is the first call
    pub fn get_or_try_init<E, F>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(existing) = self.get() {
            return Ok(existing);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished loading while we waited
        if let Some(existing) = self.get() {
            return Ok(existing);
        }

        let loaded = Arc::new(load()?);
        self.publish(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Replace the value; on load failure the previous value stays published
    pub fn reload<E, F>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let loaded = Arc::new(load()?);
        self.publish(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn publish(&self, value: Arc<T>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

/// Process-wide motif catalog
pub static CATALOG: SharedSlot<Catalog> = SharedSlot::new();

/// Process-wide rule table
pub static RULES: SharedSlot<RuleTable> = SharedSlot::new();

/// Catalog from the shared slot, loading `path` on first use
pub fn shared_catalog(path: &Path) -> Result<Arc<Catalog>, CatalogError> {
    CATALOG.get_or_try_init(|| load_catalog(path))
}

/// Force a catalog reload from `path`
pub fn reload_catalog(path: &Path) -> Result<Arc<Catalog>, CatalogError> {
    let catalog = CATALOG.reload(|| load_catalog(path))?;
    log::info!("Catalog reloaded from {:?}", path);
    Ok(catalog)
}

/// Rule table from the shared slot, loading `path` on first use
pub fn shared_rules(path: &Path) -> Result<Arc<RuleTable>, RuleError> {
    RULES.get_or_try_init(|| load_rule_table(path))
}

/// Force a rule table reload from `path`
pub fn reload_rules(path: &Path) -> Result<Arc<RuleTable>, RuleError> {
    let rules = RULES.reload(|| load_rule_table(path))?;
    log::info!("Rule table reloaded from {:?}", path);
    Ok(rules)
}
