// Performance Model - In-memory representation of a MIDI performance
// All times are absolute seconds; the tempo map is kept for re-export

use serde::{Deserialize, Serialize};

/// Default tempo when a file carries no tempo meta event
pub const DEFAULT_BPM: f64 = 120.0;

/// General MIDI percussion channel (channel 10, 0-indexed)
pub const DRUM_CHANNEL: u8 = 9;

/// A tempo change at an absolute time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub time_sec: f64,
    pub bpm: f64,
}

/// A time signature change at an absolute time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    pub time_sec: f64,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignatureChange {
    pub fn new(time_sec: f64, numerator: u8, denominator: u8) -> Self {
        TimeSignatureChange {
            time_sec,
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }
}

/// A single note with absolute timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl PerformanceNote {
    pub fn new(pitch: u8, velocity: u8, start_sec: f64, end_sec: f64) -> Self {
        PerformanceNote {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            start_sec,
            end_sec: end_sec.max(start_sec),
        }
    }

    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// A controller change (CC) event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlChange {
    pub controller: u8,
    pub value: u8,
    pub time_sec: f64,
}

/// One voice of a performance: a channel/program pair with its notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub program: u8,
    pub channel: u8,
    pub is_drum: bool,
    pub notes: Vec<PerformanceNote>,
    pub control_changes: Vec<ControlChange>,
}

impl Instrument {
    pub fn new(name: impl Into<String>, program: u8, channel: u8) -> Self {
        Instrument {
            name: name.into(),
            program: program.min(127),
            channel: channel.min(15),
            is_drum: channel == DRUM_CHANNEL,
            notes: Vec::new(),
            control_changes: Vec::new(),
        }
    }

    /// Sort notes by onset, then pitch
    pub fn sort_notes(&mut self) {
        self.notes.sort_by(|a, b| {
            a.start_sec
                .total_cmp(&b.start_sec)
                .then(a.pitch.cmp(&b.pitch))
        });
    }

    /// Latest note end in seconds (0.0 when empty)
    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_sec).fold(0.0, f64::max)
    }
}

/// A complete performance: tempo map, meter map and instruments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Pulses per quarter note of the source file (used again on export)
    pub ppq: u16,
    pub tempo_changes: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    pub instruments: Vec<Instrument>,
}

impl Performance {
    /// An empty performance at a fixed tempo in 4/4
    pub fn empty(bpm: f64) -> Self {
        Performance {
            ppq: 480,
            tempo_changes: vec![TempoChange { time_sec: 0.0, bpm }],
            time_signatures: vec![TimeSignatureChange::new(0.0, 4, 4)],
            instruments: Vec::new(),
        }
    }

    /// Tempo active at the performance start
    pub fn initial_bpm(&self) -> f64 {
        self.bpm_at(0.0)
    }

    /// Tempo active at `time_sec` (last change at or before that time)
    pub fn bpm_at(&self, time_sec: f64) -> f64 {
        self.tempo_changes
            .iter()
            .take_while(|t| t.time_sec <= time_sec + 1e-9)
            .last()
            .or_else(|| self.tempo_changes.first())
            .map(|t| t.bpm)
            .unwrap_or(DEFAULT_BPM)
    }

    /// Latest note end across all instruments
    pub fn end_time(&self) -> f64 {
        self.instruments
            .iter()
            .map(Instrument::end_time)
            .fold(0.0, f64::max)
    }

    /// Total number of notes across all instruments
    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|i| i.notes.len()).sum()
    }

    /// Iterator over non-percussion instruments
    pub fn melodic_instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter().filter(|i| !i.is_drum)
    }

    /// Channels already claimed by instruments
    pub fn used_channels(&self) -> Vec<u8> {
        let mut channels: Vec<u8> = self.instruments.iter().map(|i| i.channel).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_performance_defaults() {
        let perf = Performance::empty(90.0);
        assert_eq!(perf.initial_bpm(), 90.0);
        assert_eq!(perf.end_time(), 0.0);
        assert_eq!(perf.time_signatures[0].numerator, 4);
        assert!(perf.instruments.is_empty());
    }

    #[test]
    fn test_bpm_at_follows_tempo_map() {
        let mut perf = Performance::empty(120.0);
        perf.tempo_changes.push(TempoChange { time_sec: 4.0, bpm: 60.0 });

        assert_eq!(perf.bpm_at(0.0), 120.0);
        assert_eq!(perf.bpm_at(3.99), 120.0);
        assert_eq!(perf.bpm_at(4.0), 60.0);
        assert_eq!(perf.bpm_at(10.0), 60.0);
    }

    #[test]
    fn test_drum_channel_marks_percussion() {
        let drums = Instrument::new("Drums", 0, DRUM_CHANNEL);
        let piano = Instrument::new("Piano", 0, 0);
        assert!(drums.is_drum);
        assert!(!piano.is_drum);
    }

    #[test]
    fn test_note_end_never_precedes_start() {
        let note = PerformanceNote::new(60, 100, 2.0, 1.0);
        assert_eq!(note.duration_sec(), 0.0);
    }
}
