// ITU-R BS.1770 integrated loudness
// K-weighting, 400 ms blocks with 75% overlap, absolute and relative gating

use super::filter::{Biquad, BiquadCoeffs};
use crate::audio::AudioData;

const BLOCK_SECONDS: f64 = 0.4;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
const LUFS_REFERENCE_OFFSET: f64 = -0.691;

/// K-weighting stage 1: high shelf around 1.7 kHz (+4 dB)
fn pre_filter(sample_rate: f64) -> BiquadCoeffs {
    let f0 = 1681.974450955533;
    let gain_db = 3.999843853973347;
    let q = 0.7071752369554196;

    let k = (std::f64::consts::PI * f0 / sample_rate).tan();
    let vh = 10.0_f64.powf(gain_db / 20.0);
    let vb = vh.sqrt();
    let k2 = k * k;
    let a0 = 1.0 + k / q + k2;

    BiquadCoeffs {
        b0: (vh + vb * k / q + k2) / a0,
        b1: 2.0 * (k2 - vh) / a0,
        b2: (vh - vb * k / q + k2) / a0,
        a1: 2.0 * (k2 - 1.0) / a0,
        a2: (1.0 - k / q + k2) / a0,
    }
}

/// K-weighting stage 2: RLB highpass around 38 Hz
fn rlb_filter(sample_rate: f64) -> BiquadCoeffs {
    let fc = 38.13547087602444;
    let q = 0.5003270373238773;

    let k = (std::f64::consts::PI * fc / sample_rate).tan();
    let k2 = k * k;
    let a0 = 1.0 + k / q + k2;

    BiquadCoeffs {
        b0: 1.0 / a0,
        b1: -2.0 / a0,
        b2: 1.0 / a0,
        a1: 2.0 * (k2 - 1.0) / a0,
        a2: (1.0 - k / q + k2) / a0,
    }
}

fn k_weighted(channel: &[f64], sample_rate: f64) -> Vec<f64> {
    let mut pre = Biquad::new(pre_filter(sample_rate));
    let mut rlb = Biquad::new(rlb_filter(sample_rate));
    channel.iter().map(|&x| rlb.process(pre.process(x))).collect()
}

fn power_to_lufs(power: f64) -> f64 {
    LUFS_REFERENCE_OFFSET + 10.0 * power.log10()
}

fn lufs_to_power(lufs: f64) -> f64 {
    10.0_f64.powf((lufs - LUFS_REFERENCE_OFFSET) / 10.0)
}

/// Integrated loudness of planar channels (all weighted 1.0)
///
/// Returns `None` when the signal is shorter than one block or every block
/// falls below the absolute gate (silence).
pub fn integrated_loudness(channels: &[Vec<f64>], sample_rate: u32) -> Option<f64> {
    if sample_rate == 0 || channels.is_empty() {
        return None;
    }
    let sr = sample_rate as f64;
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let block = (sr * BLOCK_SECONDS).round() as usize;
    let hop = (block / 4).max(1);
    if block == 0 || frames < block {
        return None;
    }

    let weighted: Vec<Vec<f64>> = channels.iter().map(|c| k_weighted(&c[..frames], sr)).collect();

    // Block power: sum over channels of mean square
    let mut powers = Vec::with_capacity((frames - block) / hop + 1);
    let mut start = 0;
    while start + block <= frames {
        let power: f64 = weighted
            .iter()
            .map(|c| c[start..start + block].iter().map(|x| x * x).sum::<f64>() / block as f64)
            .sum();
        powers.push(power);
        start += hop;
    }

    let absolute_gate = lufs_to_power(ABSOLUTE_GATE_LUFS);
    let above_absolute: Vec<f64> = powers.into_iter().filter(|&p| p > absolute_gate).collect();
    if above_absolute.is_empty() {
        return None;
    }

    let ungated = above_absolute.iter().sum::<f64>() / above_absolute.len() as f64;
    let relative_gate = lufs_to_power(power_to_lufs(ungated) + RELATIVE_GATE_LU);
    let gated: Vec<f64> = above_absolute.into_iter().filter(|&p| p > relative_gate).collect();
    if gated.is_empty() {
        return None;
    }

    let loudness = power_to_lufs(gated.iter().sum::<f64>() / gated.len() as f64);
    loudness.is_finite().then_some(loudness)
}

/// Integrated loudness of an interleaved waveform in LUFS
pub fn measure_integrated_lufs(audio: &AudioData) -> Option<f64> {
    integrated_loudness(&audio.to_planar(), audio.sample_rate)
}
