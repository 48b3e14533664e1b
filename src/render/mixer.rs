// Final Mix and Audio Rendering
// Sums per-instrument voices into one waveform ready for mastering

use serde::{Deserialize, Serialize};

use super::effects::Reverb;
use super::synth::{controller_value, render_instrument};
use crate::audio::AudioData;
use crate::mastering::filter::{Biquad, BiquadCoeffs, BUTTERWORTH_Q};
use crate::midi::Performance;
use crate::transform::{CC_FILTER_CUTOFF, CC_REVERB_SEND};

/// Lowest and highest cutoff reachable from CC74
const CUTOFF_MIN_HZ: f64 = 200.0;
const CUTOFF_MAX_HZ: f64 = 18000.0;

/// Render settings for the preview synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub channels: u16,

    /// Silence appended after the last note so releases and reverb ring out
    pub tail_sec: f64,

    /// Mix gain applied before soft limiting
    pub gain: f32,

    /// Upper bound on rendered length
    pub max_duration_sec: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            tail_sec: 1.5,
            gain: 0.3,
            max_duration_sec: 600.0,
        }
    }
}

/// Convert MIDI note number to frequency (Hz)
pub fn midi_to_freq(midi_note: u8) -> f64 {
    // A4 = 440 Hz = MIDI note 69
    440.0 * 2.0_f64.powf((midi_note as f64 - 69.0) / 12.0)
}

/// Soft limiting to prevent clipping
pub fn soft_limit(sample: f32, threshold: f32) -> f32 {
    if sample.abs() <= threshold {
        sample
    } else {
        let sign = sample.signum();
        sign * (threshold + (sample.abs() - threshold).tanh() * (1.0 - threshold))
    }
}

/// Map a CC74 value onto an exponential cutoff sweep
pub fn cutoff_for_controller(value: u8) -> f64 {
    let position = value.min(127) as f64 / 127.0;
    CUTOFF_MIN_HZ * (CUTOFF_MAX_HZ / CUTOFF_MIN_HZ).powf(position)
}

/// Render a performance to a waveform
///
/// Each instrument is synthesized, lowpassed at its CC74 cutoff and sent to a
/// shared reverb at its CC91 level. An instrument without those controllers
/// plays open and dry.
pub fn render_performance(performance: &Performance, settings: &RenderSettings) -> AudioData {
    let sample_rate = settings.sample_rate.max(1);
    let sr = sample_rate as f64;
    let duration = (performance.end_time() + settings.tail_sec.max(0.0)).min(settings.max_duration_sec);
    let frames = (duration.max(0.0) * sr).ceil() as usize;

    let mut dry = vec![0.0f64; frames];
    let mut send = vec![0.0f64; frames];

    for (index, instrument) in performance.instruments.iter().enumerate() {
        if instrument.notes.is_empty() {
            continue;
        }

        let mut voice = render_instrument(instrument, index as u64, frames, sr);

        if let Some(value) = controller_value(instrument, CC_FILTER_CUTOFF) {
            let coeffs = BiquadCoeffs::lowpass(cutoff_for_controller(value), BUTTERWORTH_Q, sr);
            Biquad::new(coeffs).process_buffer(&mut voice);
        }

        let send_level = controller_value(instrument, CC_REVERB_SEND)
            .map(|v| v as f64 / 127.0)
            .unwrap_or(0.0);

        for (i, sample) in voice.iter().enumerate() {
            dry[i] += sample;
            send[i] += sample * send_level;
        }
    }

    let wet = Reverb::new(sr).process(&send);

    let mono: Vec<f64> = dry
        .iter()
        .zip(wet.iter())
        .map(|(d, w)| soft_limit((d + w) as f32 * settings.gain, 0.9) as f64)
        .collect();

    let channels = settings.channels.max(1) as usize;
    let planar = vec![mono; channels];
    let audio = AudioData::from_planar(&planar, sample_rate);

    log::info!(
        "Rendered {} instruments, {:.2}s @ {}Hz, peak {:.3}",
        performance.instruments.len(),
        audio.duration_secs(),
        sample_rate,
        audio.peak()
    );

    audio
}
