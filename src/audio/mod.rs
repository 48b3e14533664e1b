// Audio module
// Waveform buffer plus WAV decode and encode

pub mod encode;
pub mod ingest;

pub use encode::{encode_wav, WavEncoding};
pub use ingest::{ingest_wav, AudioData, AudioError};
