// Dynamics processing: compressor and peak limiter
// All processors work on planar channels with stereo-linked gain

use serde::{Deserialize, Serialize};

/// Converts linear amplitude to decibels
pub fn amp_to_db(amp: f64) -> f64 {
    20.0 * amp.abs().max(1e-10).log10()
}

/// Converts decibels to linear amplitude
pub fn db_to_amp(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant
fn time_coeff(ms: f64, sample_rate: f64) -> f64 {
    (-1.0 / (ms.max(0.01) * 0.001 * sample_rate)).exp()
}

/// Compressor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub makeup_db: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        CompressorSettings {
            threshold_db: -18.0,
            ratio: 2.5,
            attack_ms: 10.0,
            release_ms: 120.0,
            makeup_db: 0.0,
        }
    }
}

impl CompressorSettings {
    pub fn new(threshold_db: f64, ratio: f64, attack_ms: f64, release_ms: f64) -> Self {
        CompressorSettings {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            makeup_db: 0.0,
        }
    }

    /// Check parameter ranges, naming the first bad one
    pub fn validate(&self) -> Result<(), String> {
        if !(-60.0..=0.0).contains(&self.threshold_db) {
            return Err(format!("threshold_db must be -60 to 0, got {}", self.threshold_db));
        }
        if !(1.0..=50.0).contains(&self.ratio) {
            return Err(format!("ratio must be 1-50, got {}", self.ratio));
        }
        if !(0.01..=100.0).contains(&self.attack_ms) {
            return Err(format!("attack_ms must be 0.01-100, got {}", self.attack_ms));
        }
        if !(1.0..=2000.0).contains(&self.release_ms) {
            return Err(format!("release_ms must be 1-2000, got {}", self.release_ms));
        }
        if !(-24.0..=24.0).contains(&self.makeup_db) {
            return Err(format!("makeup_db must be -24 to 24, got {}", self.makeup_db));
        }
        Ok(())
    }
}

/// Feed-forward compressor with an attack/release envelope follower
///
/// The detector reads the RMS across channels of each frame, so every channel
/// receives the same gain.
pub fn compress(channels: &mut [Vec<f64>], settings: &CompressorSettings, sample_rate: f64) {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    if frames == 0 {
        return;
    }

    let attack = time_coeff(settings.attack_ms, sample_rate);
    let release = time_coeff(settings.release_ms, sample_rate);
    let makeup = db_to_amp(settings.makeup_db);
    let slope = 1.0 - 1.0 / settings.ratio.max(1.0);
    let count = channels.len() as f64;

    let mut envelope = 0.0;
    for i in 0..frames {
        let level = (channels.iter().map(|c| c[i] * c[i]).sum::<f64>() / count).sqrt();

        let coeff = if level > envelope { attack } else { release };
        envelope = coeff * envelope + (1.0 - coeff) * level;

        let envelope_db = amp_to_db(envelope);
        let gain_db = if envelope_db > settings.threshold_db {
            -(envelope_db - settings.threshold_db) * slope
        } else {
            0.0
        };

        let gain = db_to_amp(gain_db) * makeup;
        for channel in channels.iter_mut() {
            channel[i] *= gain;
        }
    }
}

/// Limiter and safety compressor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Gain recovery time after a peak
    pub release_ms: f64,

    /// Safety compressor ratio
    pub safety_ratio: f64,
    pub safety_attack_ms: f64,
    pub safety_release_ms: f64,

    /// Safety compressor threshold below the ceiling
    pub safety_headroom_db: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        LimiterSettings {
            release_ms: 50.0,
            safety_ratio: 20.0,
            safety_attack_ms: 0.1,
            safety_release_ms: 30.0,
            safety_headroom_db: 0.5,
        }
    }
}

/// Gain-reduction peak limiter
///
/// Gain drops instantly to hold each frame's peak at `ceiling_db` and recovers
/// with the release time, so the output peak never exceeds the ceiling.
pub fn limit_peaks(channels: &mut [Vec<f64>], ceiling_db: f64, release_ms: f64, sample_rate: f64) {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let ceiling = db_to_amp(ceiling_db);
    let release = time_coeff(release_ms, sample_rate);

    let mut gain = 1.0f64;
    for i in 0..frames {
        let peak = channels.iter().fold(0.0f64, |p, c| p.max(c[i].abs()));
        let wanted = if peak > ceiling { ceiling / peak } else { 1.0 };

        gain = if wanted < gain {
            wanted
        } else {
            release * gain + (1.0 - release) * wanted
        };

        for channel in channels.iter_mut() {
            channel[i] *= gain;
        }
    }
}

/// Peak limiting followed by a fast heavy-ratio safety compressor just below the ceiling
pub fn limit(channels: &mut [Vec<f64>], ceiling_db: f64, settings: &LimiterSettings, sample_rate: f64) {
    limit_peaks(channels, ceiling_db, settings.release_ms, sample_rate);

    let safety = CompressorSettings {
        threshold_db: ceiling_db - settings.safety_headroom_db,
        ratio: settings.safety_ratio,
        attack_ms: settings.safety_attack_ms,
        release_ms: settings.safety_release_ms,
        makeup_db: 0.0,
    };
    compress(channels, &safety, sample_rate);
}

/// Largest absolute sample across channels
pub fn peak(channels: &[Vec<f64>]) -> f64 {
    channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f64, |p, s| p.max(s.abs()))
}

/// Multiply every sample by a gain in dB
pub fn apply_gain_db(channels: &mut [Vec<f64>], gain_db: f64) {
    let gain = db_to_amp(gain_db);
    for sample in channels.iter_mut().flat_map(|c| c.iter_mut()) {
        *sample *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(amplitude: f64, frames: usize) -> Vec<f64> {
        (0..frames)
            .map(|i| amplitude * (2.0 * PI * 440.0 * i as f64 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn test_db_conversions() {
        assert!((amp_to_db(1.0)).abs() < 1e-12);
        assert!((amp_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((db_to_amp(-6.0206) - 0.5).abs() < 1e-4);
        assert!((amp_to_db(0.0) + 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut channels = vec![sine(0.9, 44100)];
        compress(&mut channels, &CompressorSettings::new(-20.0, 4.0, 5.0, 100.0), 44100.0);
        assert!(peak(&[channels[0][22050..].to_vec()]) < 0.5);
    }

    #[test]
    fn test_compressor_leaves_quiet_signal() {
        let original = sine(0.01, 4410);
        let mut channels = vec![original.clone()];
        compress(&mut channels, &CompressorSettings::default(), 44100.0);
        assert_eq!(channels[0], original);
    }

    #[test]
    fn test_limiter_holds_ceiling() {
        let mut channels = vec![sine(1.5, 44100), sine(0.7, 44100)];
        limit(&mut channels, -1.0, &LimiterSettings::default(), 44100.0);
        assert!(peak(&channels) <= db_to_amp(-1.0) + 1e-12);
    }

    #[test]
    fn test_settings_validation() {
        assert!(CompressorSettings::default().validate().is_ok());
        assert!(CompressorSettings::new(5.0, 2.0, 10.0, 100.0).validate().is_err());
        assert!(CompressorSettings::new(-20.0, 0.5, 10.0, 100.0).validate().is_err());
    }
}
