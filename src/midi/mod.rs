// MIDI - Performance model, Standard MIDI File import/export and verification

pub mod performance;
pub mod reader;
pub mod tempo_map;
pub mod verify;
pub mod writer;

// Re-export main types
pub use performance::{
    ControlChange, Instrument, Performance, PerformanceNote, TempoChange, TimeSignatureChange,
    DEFAULT_BPM, DRUM_CHANNEL,
};
pub use reader::{read_performance, MidiReadError};
pub use tempo_map::TempoMap;
pub use verify::{verify_smf, SmfSummary, VerifyError};
pub use writer::{write_smf, MidiExportOptions, MidiWriteError};
