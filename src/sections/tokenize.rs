// Section Tokenizer - Window bars into sections and drop structural duplicates

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bars::{Bar, Fingerprint};
use super::section::Section;

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("Cannot build sections from an empty bar list")]
    EmptyInput,
}

/// Configuration for sectioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Bars per section window
    pub bars_per_section: usize,
}

impl Default for SectionConfig {
    fn default() -> Self {
        SectionConfig { bars_per_section: 4 }
    }
}

/// Result of fingerprint deduplication
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// First occurrence of each fingerprint, original order preserved
    pub sections: Vec<Section>,
    /// Sections before deduplication
    pub total: usize,
    /// Sections after deduplication
    pub unique: usize,
}

/// Group bars into fixed-size sections
///
/// An incomplete trailing window is padded with empty bars up to the window
/// size. A trailing window whose real bars hold no notes at all is dropped
/// instead, unless it would be the only section.
pub fn tokenize_sections(bars: &[Bar], config: &SectionConfig) -> Result<Vec<Section>, SectionError> {
    if bars.is_empty() {
        return Err(SectionError::EmptyInput);
    }

    let window = config.bars_per_section.max(1);
    let mut sections = Vec::with_capacity(bars.len().div_ceil(window));

    for chunk in bars.chunks(window) {
        let mut section_bars = chunk.to_vec();

        if section_bars.len() < window {
            let silent = section_bars.iter().all(Bar::is_empty);
            if silent && !sections.is_empty() {
                log::debug!(
                    "Dropping silent trailing window of {} bars",
                    section_bars.len()
                );
                break;
            }

            while section_bars.len() < window {
                let padding = match section_bars.last() {
                    Some(last) => Bar::empty_after(last),
                    None => break,
                };
                section_bars.push(padding);
            }
        }

        sections.push(Section::new(sections.len(), section_bars));
    }

    log::info!(
        "Tokenized {} bars into {} sections of {} bars",
        bars.len(),
        sections.len(),
        window
    );

    Ok(sections)
}

/// Keep the first section seen for each fingerprint, in original order
pub fn deduplicate_sections(sections: Vec<Section>) -> DedupOutcome {
    let total = sections.len();
    let mut seen: HashSet<Fingerprint> = HashSet::with_capacity(total);

    let unique_sections: Vec<Section> = sections
        .into_iter()
        .filter(|s| seen.insert(s.fingerprint.clone()))
        .collect();

    let unique = unique_sections.len();
    log::info!("Deduplicated sections: {} total, {} unique", total, unique);

    DedupOutcome {
        sections: unique_sections,
        total,
        unique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::{Note, TimeSignature};

    fn bar(index: usize, pitches: &[u8]) -> Bar {
        let start = index as f64 * 2.0;
        let notes = pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| Note::new(p, 100, i as f64 * 0.5, 0.5))
            .collect();
        Bar::new(index, TimeSignature::default(), start, start + 2.0, 120.0, notes)
    }

    #[test]
    fn test_empty_bars_rejected() {
        assert!(matches!(
            tokenize_sections(&[], &SectionConfig::default()),
            Err(SectionError::EmptyInput)
        ));
    }

    #[test]
    fn test_full_windows() {
        let bars: Vec<Bar> = (0..8).map(|i| bar(i, &[60, 62])).collect();
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].bars.len(), 4);
        assert_eq!(sections[1].bars[0].index, 4);
    }

    #[test]
    fn test_trailing_window_padded() {
        let bars: Vec<Bar> = (0..6).map(|i| bar(i, &[60])).collect();
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();

        assert_eq!(sections.len(), 2);
        let last = &sections[1];
        assert_eq!(last.bars.len(), 4);
        assert!(last.bars[2].is_empty());
        assert!(last.bars[3].is_empty());
        assert_eq!(last.bars[3].index, 7);
        assert!((last.bars[3].start_sec - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_silent_trailing_window_dropped() {
        let mut bars: Vec<Bar> = (0..4).map(|i| bar(i, &[60])).collect();
        bars.push(bar(4, &[]));
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_single_silent_window_kept() {
        let bars = vec![bar(0, &[])];
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].bars.len(), 4);
    }

    #[test]
    fn test_identical_consecutive_sections_deduplicate() {
        let bars: Vec<Bar> = (0..8).map(|i| bar(i, &[60, 64, 67])).collect();
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();
        let first_id = sections[0].id.clone();

        let outcome = deduplicate_sections(sections);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.unique, 1);
        assert_eq!(outcome.sections[0].id, first_id);
    }

    #[test]
    fn test_dedup_preserves_order() {
        let mut bars: Vec<Bar> = (0..4).map(|i| bar(i, &[60])).collect();
        bars.extend((4..8).map(|i| bar(i, &[70])));
        bars.extend((8..12).map(|i| bar(i, &[60])));
        let sections = tokenize_sections(&bars, &SectionConfig::default()).unwrap();

        let outcome = deduplicate_sections(sections);
        assert_eq!(outcome.total, 3);
        let ids: Vec<&str> = outcome.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["section_0000", "section_0001"]);
    }
}
