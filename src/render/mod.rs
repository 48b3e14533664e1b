// Render Engine - preview synthesis of a Performance into a waveform
// Feeds the mastering chain when a job needs audio output

pub mod effects;
pub mod mixer;
pub mod synth;

pub use mixer::{midi_to_freq, render_performance, soft_limit, RenderSettings};
