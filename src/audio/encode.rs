// WAV encoding for rendered and mastered audio

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::ingest::{AudioData, AudioError};

/// Output sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavEncoding {
    /// 16-bit signed PCM
    #[default]
    Pcm16,
    /// 32-bit IEEE float
    Float32,
}

/// Encode a waveform as WAV bytes
///
/// Samples are clamped to [-1.0, 1.0] for PCM output.
pub fn encode_wav(audio: &AudioData, encoding: WavEncoding) -> Result<Vec<u8>, AudioError> {
    let spec = match encoding {
        WavEncoding::Pcm16 => WavSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
        WavEncoding::Float32 => WavSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        match encoding {
            WavEncoding::Pcm16 => {
                for sample in &audio.samples {
                    let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                    writer.write_sample(value)?;
                }
            }
            WavEncoding::Float32 => {
                for sample in &audio.samples {
                    writer.write_sample(*sample)?;
                }
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
