// Mastering chain
// highpass -> compressor -> multiband -> loudness normalize -> limiter, in that fixed order.
// Degraded measurements fall back to simpler processing and are reported as warnings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dynamics::{
    amp_to_db, apply_gain_db, compress, db_to_amp, limit, peak, CompressorSettings, LimiterSettings,
};
use super::filter::{highpass_in_place, split_three_bands};
use super::loudness::integrated_loudness;
use crate::audio::AudioData;

/// Three-band compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultibandSettings {
    pub low_crossover_hz: f64,
    pub high_crossover_hz: f64,
    pub low: CompressorSettings,
    pub mid: CompressorSettings,
    pub high: CompressorSettings,
}

impl Default for MultibandSettings {
    fn default() -> Self {
        MultibandSettings {
            low_crossover_hz: 200.0,
            high_crossover_hz: 4000.0,
            low: CompressorSettings::new(-20.0, 3.0, 20.0, 200.0),
            mid: CompressorSettings::new(-18.0, 2.5, 10.0, 120.0),
            high: CompressorSettings::new(-22.0, 2.0, 5.0, 80.0),
        }
    }
}

/// Mastering targets and stage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringConfig {
    /// Integrated loudness target
    pub target_lufs: f64,

    /// Output peak ceiling
    pub ceiling_dbfs: f64,

    /// Highpass cutoff for removing sub-audible content
    pub highpass_hz: f64,

    pub compressor: CompressorSettings,
    pub multiband: MultibandSettings,
    pub limiter: LimiterSettings,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        MasteringConfig {
            target_lufs: -14.0,
            ceiling_dbfs: -1.0,
            highpass_hz: 30.0,
            compressor: CompressorSettings::default(),
            multiband: MultibandSettings::default(),
            limiter: LimiterSettings::default(),
        }
    }
}

/// Non-fatal degradation recorded while mastering
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MasteringWarning {
    #[error("Input contained {count} non-finite samples, replaced with silence")]
    NonFiniteInput { count: usize },

    #[error("Stage '{stage}' produced non-finite samples, stage bypassed")]
    StageBypassed { stage: &'static str },

    #[error("Integrated loudness unmeasurable, used peak normalization")]
    LoudnessFallback,

    #[error("Input is silent, normalization skipped")]
    SilentInput,
}

/// Measurements and warnings from one mastering pass
#[derive(Debug, Clone, Serialize)]
pub struct MasteringReport {
    pub input_lufs: Option<f64>,
    pub output_lufs: Option<f64>,
    /// Gain applied by the normalization stage
    pub applied_gain_db: f64,
    pub peak_dbfs: f64,
    pub warnings: Vec<MasteringWarning>,
}

/// Mastered waveform plus its report
#[derive(Debug, Clone)]
pub struct MasteredAudio {
    pub audio: AudioData,
    pub report: MasteringReport,
}

/// Run a stage on a copy; keep the result only if every sample is finite
fn guarded<F>(stage: &'static str, channels: &mut Vec<Vec<f64>>, warnings: &mut Vec<MasteringWarning>, process: F)
where
    F: FnOnce(&mut Vec<Vec<f64>>),
{
    let mut candidate = channels.clone();
    process(&mut candidate);

    if candidate.iter().flatten().all(|s| s.is_finite()) {
        *channels = candidate;
    } else {
        log::warn!("Mastering stage '{}' produced non-finite output, bypassing", stage);
        warnings.push(MasteringWarning::StageBypassed { stage });
    }
}

fn multiband(channels: &mut Vec<Vec<f64>>, settings: &MultibandSettings, sample_rate: f64) {
    let mut bands: [Vec<Vec<f64>>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for channel in channels.iter() {
        let [low, mid, high] = split_three_bands(
            channel,
            settings.low_crossover_hz,
            settings.high_crossover_hz,
            sample_rate,
        );
        bands[0].push(low);
        bands[1].push(mid);
        bands[2].push(high);
    }

    compress(&mut bands[0], &settings.low, sample_rate);
    compress(&mut bands[1], &settings.mid, sample_rate);
    compress(&mut bands[2], &settings.high, sample_rate);

    for (ch, channel) in channels.iter_mut().enumerate() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = bands[0][ch][i] + bands[1][ch][i] + bands[2][ch][i];
        }
    }
}

/// Normalize to the loudness target, or to the ceiling by peak when loudness is unmeasurable
///
/// Returns the gain applied in dB.
fn normalize(
    channels: &mut [Vec<f64>],
    sample_rate: u32,
    config: &MasteringConfig,
    warnings: &mut Vec<MasteringWarning>,
) -> f64 {
    if let Some(loudness) = integrated_loudness(channels, sample_rate) {
        let gain_db = config.target_lufs - loudness;
        apply_gain_db(channels, gain_db);
        return gain_db;
    }

    let current_peak = peak(channels);
    if current_peak <= 0.0 {
        warnings.push(MasteringWarning::SilentInput);
        log::warn!("{}", MasteringWarning::SilentInput);
        return 0.0;
    }

    warnings.push(MasteringWarning::LoudnessFallback);
    log::warn!("{}", MasteringWarning::LoudnessFallback);
    let gain_db = config.ceiling_dbfs - amp_to_db(current_peak);
    apply_gain_db(channels, gain_db);
    gain_db
}

/// Master a waveform
///
/// Never fails: degenerate input (silence, too short to measure, non-finite
/// samples) takes the documented fallbacks and is listed in the report.
/// The output peak never exceeds the configured ceiling.
pub fn master(input: &AudioData, config: &MasteringConfig) -> MasteredAudio {
    let sample_rate = input.sample_rate.max(1);
    let sr = sample_rate as f64;
    let mut warnings = Vec::new();

    let mut channels = input.to_planar();
    let mut non_finite = 0;
    for sample in channels.iter_mut().flatten() {
        if !sample.is_finite() {
            *sample = 0.0;
            non_finite += 1;
        }
    }
    if non_finite > 0 {
        let warning = MasteringWarning::NonFiniteInput { count: non_finite };
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    let input_lufs = integrated_loudness(&channels, sample_rate);

    guarded("highpass", &mut channels, &mut warnings, |c| {
        for channel in c.iter_mut() {
            highpass_in_place(channel, config.highpass_hz, sr);
        }
    });
    guarded("compressor", &mut channels, &mut warnings, |c| {
        compress(c, &config.compressor, sr)
    });
    guarded("multiband", &mut channels, &mut warnings, |c| {
        multiband(c, &config.multiband, sr)
    });

    let mut applied_gain_db = 0.0;
    let mut normalize_warnings = Vec::new();
    guarded("normalize", &mut channels, &mut warnings, |c| {
        applied_gain_db = normalize(c, sample_rate, config, &mut normalize_warnings);
    });
    warnings.extend(normalize_warnings);

    guarded("limiter", &mut channels, &mut warnings, |c| {
        limit(c, config.ceiling_dbfs, &config.limiter, sr)
    });

    // Final hard ceiling
    let ceiling = db_to_amp(config.ceiling_dbfs);
    for sample in channels.iter_mut().flatten() {
        *sample = sample.clamp(-ceiling, ceiling);
    }

    let output_lufs = integrated_loudness(&channels, sample_rate);
    let peak_dbfs = amp_to_db(peak(&channels));
    let audio = AudioData::from_planar(&channels, sample_rate);

    log::info!(
        "Mastered {:.2}s: input {:?} LUFS, output {:?} LUFS, gain {:.2} dB, peak {:.2} dBFS, {} warnings",
        audio.duration_secs(),
        input_lufs,
        output_lufs,
        applied_gain_db,
        peak_dbfs,
        warnings.len()
    );

    MasteredAudio {
        audio,
        report: MasteringReport {
            input_lufs,
            output_lufs,
            applied_gain_db,
            peak_dbfs,
            warnings,
        },
    }
}
