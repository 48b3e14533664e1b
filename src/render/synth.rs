// Synthesizer voices
// Additive tones for melodic instruments, seeded noise bursts for percussion

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::f64::consts::PI;

use super::mixer::midi_to_freq;
use crate::midi::{Instrument, PerformanceNote};

const ATTACK_SEC: f64 = 0.005;
const RELEASE_SEC: f64 = 0.08;
const DRUM_DECAY_SEC: f64 = 0.12;

/// Relative amplitudes of the first three harmonics
const HARMONICS: [f64; 3] = [1.0, 0.35, 0.15];

/// First value of `controller` on this instrument, by time
pub fn controller_value(instrument: &Instrument, controller: u8) -> Option<u8> {
    instrument
        .control_changes
        .iter()
        .filter(|cc| cc.controller == controller)
        .min_by(|a, b| a.time_sec.total_cmp(&b.time_sec))
        .map(|cc| cc.value)
}

/// Linear attack, sustain, linear release after note end
fn envelope(t: f64, held: f64) -> f64 {
    if t < 0.0 {
        0.0
    } else if t < ATTACK_SEC {
        t / ATTACK_SEC
    } else if t < held {
        1.0
    } else {
        (1.0 - (t - held) / RELEASE_SEC).max(0.0)
    }
}

fn tone(note: &PerformanceNote, out: &mut [f64], sample_rate: f64) {
    let freq = midi_to_freq(note.pitch);
    let amplitude = note.velocity as f64 / 127.0;
    let held = note.duration_sec().max(ATTACK_SEC);
    let start = (note.start_sec * sample_rate).round() as usize;
    let length = ((held + RELEASE_SEC) * sample_rate).ceil() as usize;

    for (n, sample) in out.iter_mut().skip(start).take(length).enumerate() {
        let t = n as f64 / sample_rate;
        let mut value = 0.0;
        for (h, weight) in HARMONICS.iter().enumerate() {
            let partial = freq * (h + 1) as f64;
            if partial < sample_rate * 0.45 {
                value += weight * (2.0 * PI * partial * t).sin();
            }
        }
        *sample += amplitude * envelope(t, held) * value / HARMONICS.len() as f64;
    }
}

fn hit(note: &PerformanceNote, rng: &mut Pcg64, out: &mut [f64], sample_rate: f64) {
    // Higher drum keys decay faster and carry a higher body tone
    let body = midi_to_freq(note.pitch) * 0.5;
    let decay = DRUM_DECAY_SEC * (60.0 / note.pitch.max(24) as f64);
    let amplitude = note.velocity as f64 / 127.0;
    let start = (note.start_sec * sample_rate).round() as usize;
    let length = (decay * 6.0 * sample_rate).ceil() as usize;

    for (n, sample) in out.iter_mut().skip(start).take(length).enumerate() {
        let t = n as f64 / sample_rate;
        let noise: f64 = rng.gen_range(-1.0..1.0);
        let shape = (-t / decay).exp();
        *sample += amplitude * shape * (0.6 * noise + 0.4 * (2.0 * PI * body * t).sin()) * 0.5;
    }
}

/// Render one instrument into a mono buffer of `frames` samples
///
/// Percussion noise is seeded from `seed`, so the same performance always
/// renders to the same samples.
pub fn render_instrument(instrument: &Instrument, seed: u64, frames: usize, sample_rate: f64) -> Vec<f64> {
    let mut out = vec![0.0; frames];

    if instrument.is_drum {
        let mut rng = Pcg64::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
        for note in &instrument.notes {
            hit(note, &mut rng, &mut out, sample_rate);
        }
    } else {
        for note in &instrument.notes {
            tone(note, &mut out, sample_rate);
        }
    }

    out
}
