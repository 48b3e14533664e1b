// Controls - Normalized engagement metrics mapped to validated MIDI parameters

pub mod mapper;
pub mod types;

// Re-export main types
pub use mapper::map_controls;
pub use types::{ControlError, Controls, Metrics};
