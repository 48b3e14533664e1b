// Motif - A short reusable musical fragment from the catalog

use serde::{Deserialize, Serialize};

use crate::bars::Note;

/// Descriptive statistics of a motif's notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifMetadata {
    pub note_count: usize,
    pub pitch_range: u8,
    pub avg_velocity: f64,
    /// Notes per second over the motif duration
    pub note_density: f64,
    /// Seconds from the motif start to the last note end
    pub duration: f64,
    pub lowest_pitch: u8,
    pub highest_pitch: u8,
}

impl MotifMetadata {
    pub fn from_notes(notes: &[Note]) -> Self {
        if notes.is_empty() {
            return MotifMetadata {
                note_count: 0,
                pitch_range: 0,
                avg_velocity: 0.0,
                note_density: 0.0,
                duration: 0.0,
                lowest_pitch: 0,
                highest_pitch: 0,
            };
        }

        let lowest_pitch = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
        let highest_pitch = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
        let avg_velocity = notes.iter().map(|n| n.velocity as f64).sum::<f64>() / notes.len() as f64;
        let duration = notes.iter().map(|n| n.end_offset_sec()).fold(0.0, f64::max);
        let note_density = if duration > 0.0 {
            notes.len() as f64 / duration
        } else {
            0.0
        };

        MotifMetadata {
            note_count: notes.len(),
            pitch_range: highest_pitch - lowest_pitch,
            avg_velocity,
            note_density,
            duration,
            lowest_pitch,
            highest_pitch,
        }
    }
}

/// A catalog motif with bar-relative notes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Motif {
    pub id: String,
    pub notes: Vec<Note>,
    pub metadata: MotifMetadata,
    /// Momentum label assigned at training time, if any
    pub label: Option<String>,
}

impl Motif {
    /// Build a motif, computing metadata from its notes
    pub fn new(id: impl Into<String>, notes: Vec<Note>, label: Option<String>) -> Self {
        let metadata = MotifMetadata::from_notes(&notes);
        Motif {
            id: id.into(),
            notes,
            metadata,
            label,
        }
    }

    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    /// Length of one repetition of the pattern in seconds
    pub fn pattern_length(&self) -> f64 {
        self.metadata.duration
    }
}

/// Deterministic stand-in motifs used when the catalog is empty
///
/// Each motif is a one-bar four-note arpeggio; the interval shape follows
/// the target label and the root steps up a whole tone per motif.
pub fn placeholder_motifs(label: &str, count: usize) -> Vec<Motif> {
    let shape: [u8; 4] = match label {
        "positive" => [0, 4, 7, 12],
        "negative" => [12, 7, 3, 0],
        _ => [0, 5, 7, 5],
    };

    (0..count)
        .map(|i| {
            let root = 60 + ((i * 2) % 12) as u8;
            let notes = shape
                .iter()
                .enumerate()
                .map(|(step, interval)| Note::new(root + interval, 80, step as f64 * 0.5, 0.45))
                .collect();
            Motif::new(format!("placeholder_{}_{:02}", label, i), notes, Some(label.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_notes() {
        let notes = vec![
            Note::new(60, 100, 0.0, 0.5),
            Note::new(67, 80, 0.5, 0.5),
            Note::new(64, 90, 1.0, 1.0),
        ];
        let meta = MotifMetadata::from_notes(&notes);

        assert_eq!(meta.note_count, 3);
        assert_eq!(meta.lowest_pitch, 60);
        assert_eq!(meta.highest_pitch, 67);
        assert_eq!(meta.pitch_range, 7);
        assert_eq!(meta.avg_velocity, 90.0);
        assert_eq!(meta.duration, 2.0);
        assert_eq!(meta.note_density, 1.5);
    }

    #[test]
    fn test_empty_metadata() {
        let meta = MotifMetadata::from_notes(&[]);
        assert_eq!(meta.note_count, 0);
        assert_eq!(meta.note_density, 0.0);
    }

    #[test]
    fn test_placeholders_sized_and_deterministic() {
        let a = placeholder_motifs("positive", 5);
        let b = placeholder_motifs("positive", 5);

        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|m| m.has_label("positive")));
        assert_eq!(a[0].notes[3].pitch, 72);
    }

    #[test]
    fn test_placeholder_shape_follows_label() {
        let rising = placeholder_motifs("positive", 1);
        let falling = placeholder_motifs("negative", 1);

        assert!(rising[0].notes[3].pitch > rising[0].notes[0].pitch);
        assert!(falling[0].notes[3].pitch < falling[0].notes[0].pitch);
    }
}
