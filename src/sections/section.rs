// Section - A fixed-size group of bars with its token stream and fingerprint

use serde::{Deserialize, Serialize};

use crate::bars::{Bar, Fingerprint};
use super::token::{tokenize_bars, Token};

/// Summary statistics of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub note_count: usize,
    /// Mean MIDI pitch (0.0 when the section is silent)
    pub avg_pitch: f64,
    /// Mean MIDI velocity (0.0 when the section is silent)
    pub avg_velocity: f64,
    /// Mean tempo over the section's bars
    pub avg_bpm: f64,
    /// Highest minus lowest pitch
    pub pitch_range: u8,
    /// Seconds from the first bar start to the last bar end
    pub duration: f64,
}

impl SectionMetadata {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let notes: Vec<_> = bars.iter().flat_map(|b| b.notes.iter()).collect();
        let note_count = notes.len();

        let (avg_pitch, avg_velocity, pitch_range) = if note_count == 0 {
            (0.0, 0.0, 0)
        } else {
            let pitch_sum: f64 = notes.iter().map(|n| n.pitch as f64).sum();
            let velocity_sum: f64 = notes.iter().map(|n| n.velocity as f64).sum();
            let lowest = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
            let highest = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
            (
                pitch_sum / note_count as f64,
                velocity_sum / note_count as f64,
                highest - lowest,
            )
        };

        let avg_bpm = if bars.is_empty() {
            0.0
        } else {
            bars.iter().map(|b| b.bpm).sum::<f64>() / bars.len() as f64
        };

        let duration = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => last.end_sec - first.start_sec,
            _ => 0.0,
        };

        SectionMetadata {
            note_count,
            avg_pitch,
            avg_velocity,
            avg_bpm,
            pitch_range,
            duration,
        }
    }
}

/// Structural fingerprint over `(kind, pitch, velocity)` triples
///
/// Token times are left out so the same figure at a different position in
/// the piece produces the same fingerprint.
pub fn section_fingerprint(tokens: &[Token]) -> Fingerprint {
    if tokens.is_empty() {
        return Fingerprint::empty();
    }

    let mut canonical = String::with_capacity(tokens.len() * 16);
    for token in tokens {
        canonical.push_str(&format!("({},{},{})", token.kind.as_str(), token.pitch, token.velocity));
    }
    Fingerprint::of(canonical.as_bytes())
}

/// A group of consecutive bars treated as one classification unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable id derived from the section's position ("section_0003")
    pub id: String,
    pub index: usize,
    pub bars: Vec<Bar>,
    pub token_sequence: Vec<Token>,
    pub fingerprint: Fingerprint,
    pub metadata: SectionMetadata,
}

impl Section {
    /// Build a section from its bars, deriving tokens, fingerprint and metadata
    pub fn new(index: usize, bars: Vec<Bar>) -> Self {
        let token_sequence = tokenize_bars(&bars);
        let fingerprint = section_fingerprint(&token_sequence);
        let metadata = SectionMetadata::from_bars(&bars);

        Section {
            id: format!("section_{:04}", index),
            index,
            bars,
            token_sequence,
            fingerprint,
            metadata,
        }
    }
}
