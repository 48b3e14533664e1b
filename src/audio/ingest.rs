// Audio buffer and WAV ingestion
// Reads WAV bytes into interleaved f32 samples normalized to [-1.0, 1.0]

use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV data: {0}")]
    WavRead(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid audio data: {0}")]
    InvalidData(String),
}

/// Interleaved PCM waveform
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Samples normalized to f32, interleaved by channel
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidData("sample rate is zero".to_string()));
        }
        if channels == 0 {
            return Err(AudioError::InvalidData("channel count is zero".to_string()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidData(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(AudioData {
            samples,
            sample_rate,
            channels,
        })
    }

    /// All-zero buffer
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        AudioData {
            samples: vec![0.0; frames * channels.max(1) as usize],
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Total number of frames (samples / channels)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Get duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Split into one f64 buffer per channel
    pub fn to_planar(&self) -> Vec<Vec<f64>> {
        let channels = self.channels.max(1) as usize;
        let mut planar = vec![Vec::with_capacity(self.frame_count()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample as f64);
            }
        }
        planar
    }

    /// Interleave per-channel buffers (all the same length) back into a waveform
    pub fn from_planar(planar: &[Vec<f64>], sample_rate: u32) -> Self {
        let channels = planar.len().max(1);
        let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for channel in planar {
                samples.push(channel[i] as f32);
            }
        }
        AudioData {
            samples,
            sample_rate,
            channels: channels as u16,
        }
    }
}

/// Ingest a WAV file from raw bytes
pub fn ingest_wav(data: &[u8]) -> Result<AudioData, AudioError> {
    let mut reader = WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let bit_depth = spec.bits_per_sample;

    let samples: Vec<f32> = match (spec.sample_format, bit_depth) {
        (SampleFormat::Int, 8) => {
            // hound yields 8-bit PCM already re-centered on zero
            reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!("{:?} {}-bit audio", format, bits)));
        }
    };

    AudioData::new(samples, spec.sample_rate, spec.channels)
}
