// Bars - Performance to ordered, fingerprinted bar list
// First analysis stage: everything downstream works on bars, never raw MIDI

pub mod extract;
pub mod fingerprint;
pub mod types;

// Re-export main types
pub use extract::{extract_bars, extract_bars_from_bytes, load_performance, BarError};
pub use fingerprint::{bar_fingerprint, Fingerprint, FINGERPRINT_LEN};
pub use types::{Bar, Note, TimeSignature};
