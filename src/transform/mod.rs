// Transform - Controls and motifs applied to a base performance, written as verified MIDI

pub mod arrange;
pub mod rules;
pub mod transformer;

// Re-export main types
pub use arrange::{allocate_channels, motif_voice, VoiceSettings, MOTIF_PROGRAMS};
pub use rules::{rescale_tempo, shift_velocities, transpose_performance, transpose_pitch};
pub use transformer::{
    transform_performance, TransformError, TransformOptions, TransformedMidi, CC_FILTER_CUTOFF,
    CC_REVERB_SEND,
};
