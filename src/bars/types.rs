// Bar types
// Notes relative to their bar, time signatures and the fingerprinted Bar itself

use serde::{Deserialize, Serialize};

use super::fingerprint::{bar_fingerprint, Fingerprint};

/// Musical time signature as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Self {
        TimeSignature {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }

    /// Bar length in seconds at a given tempo (one beat per numerator unit)
    pub fn bar_duration_sec(&self, bpm: f64) -> f64 {
        60.0 / bpm * self.numerator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::new(4, 4)
    }
}

/// A note with timing relative to the start of its bar (or motif)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch (0-127)
    pub pitch: u8,

    /// MIDI velocity (0-127)
    pub velocity: u8,

    /// Onset in seconds from the bar start
    pub start_offset_sec: f64,

    /// Duration in seconds
    pub duration_sec: f64,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start_offset_sec: f64, duration_sec: f64) -> Self {
        Note {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            start_offset_sec: start_offset_sec.max(0.0),
            duration_sec: duration_sec.max(0.0),
        }
    }

    pub fn end_offset_sec(&self) -> f64 {
        self.start_offset_sec + self.duration_sec
    }
}

/// One measure of a performance
///
/// Created by bar extraction and never modified afterwards; the fingerprint
/// is computed once from the notes at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Position in the performance (0-indexed, contiguous)
    pub index: usize,
    pub time_signature: TimeSignature,
    pub start_sec: f64,
    pub end_sec: f64,
    /// Tempo active at the bar start
    pub bpm: f64,
    pub notes: Vec<Note>,
    pub fingerprint: Fingerprint,
}

impl Bar {
    /// Create a bar, fingerprinting its notes
    pub fn new(
        index: usize,
        time_signature: TimeSignature,
        start_sec: f64,
        end_sec: f64,
        bpm: f64,
        notes: Vec<Note>,
    ) -> Self {
        let fingerprint = bar_fingerprint(&notes);
        Bar {
            index,
            time_signature,
            start_sec,
            end_sec,
            bpm,
            notes,
            fingerprint,
        }
    }

    /// A synthetic empty bar directly following `previous`, same meter and tempo
    pub fn empty_after(previous: &Bar) -> Self {
        let duration = previous.duration_sec();
        Bar::new(
            previous.index + 1,
            previous.time_signature,
            previous.end_sec,
            previous.end_sec + duration,
            previous.bpm,
            Vec::new(),
        )
    }

    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
