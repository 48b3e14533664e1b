// Momentum classifier
// Scores each section from tempo, dynamics and melodic trend

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sections::{Section, TokenKind};

/// Minimum NOTE_ON count for the least-squares slope; below it the endpoint slope is used
const REGRESSION_MIN_POINTS: usize = 5;

#[derive(Debug, Error)]
pub enum MomentumError {
    #[error("No sections to classify")]
    NoTokens,

    #[error("Failed to serialize momentum records: {0}")]
    Export(#[from] serde_json::Error),

    #[error("Failed to write momentum records: {0}")]
    Io(#[from] std::io::Error),
}

/// Directional energy of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentumLabel {
    Positive,
    Neutral,
    Negative,
}

impl MomentumLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumLabel::Positive => "positive",
            MomentumLabel::Neutral => "neutral",
            MomentumLabel::Negative => "negative",
        }
    }

    /// Numeric form used by rule tables (`mode` metric)
    pub fn mode_value(&self) -> f64 {
        match self {
            MomentumLabel::Positive => 1.0,
            MomentumLabel::Neutral => 0.0,
            MomentumLabel::Negative => -1.0,
        }
    }
}

impl std::fmt::Display for MomentumLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized inputs to a momentum score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumComponents {
    pub tempo_norm: f64,
    /// `avg_velocity / 100`, clamped to [0, 1] so velocities above 100 cannot push the score past 1
    pub velocity_norm: f64,
    pub pitch_slope_norm: f64,
    /// Raw slope in semitones per second
    pub pitch_slope: f64,
}

/// Classification of one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumRecord {
    pub section_id: String,
    pub label: MomentumLabel,
    /// Weighted score in [0, 1]
    pub score: f64,
    pub components: MomentumComponents,
}

/// Weights and label thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub tempo_weight: f64,
    pub velocity_weight: f64,
    pub pitch_slope_weight: f64,

    /// Scores strictly above this are positive
    pub positive_threshold: f64,

    /// Scores strictly below this are negative
    pub negative_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            tempo_weight: 0.4,
            velocity_weight: 0.4,
            pitch_slope_weight: 0.2,
            positive_threshold: 0.65,
            negative_threshold: 0.35,
        }
    }
}

/// Rule-based momentum classifier
pub struct MomentumClassifier {
    config: MomentumConfig,
}

impl Default for MomentumClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentumClassifier {
    pub fn new() -> Self {
        MomentumClassifier {
            config: MomentumConfig::default(),
        }
    }

    pub fn with_config(config: MomentumConfig) -> Self {
        MomentumClassifier { config }
    }

    /// Classify every section in order
    pub fn classify_all(&self, sections: &[Section]) -> Result<Vec<MomentumRecord>, MomentumError> {
        if sections.is_empty() {
            return Err(MomentumError::NoTokens);
        }

        let records: Vec<MomentumRecord> = sections.iter().map(|s| self.classify(s)).collect();

        let positive = records.iter().filter(|r| r.label == MomentumLabel::Positive).count();
        let negative = records.iter().filter(|r| r.label == MomentumLabel::Negative).count();
        log::info!(
            "Classified {} sections: {} positive, {} neutral, {} negative",
            records.len(),
            positive,
            records.len() - positive - negative,
            negative
        );

        Ok(records)
    }

    /// Classify a single section
    pub fn classify(&self, section: &Section) -> MomentumRecord {
        let tempo_norm = ((section.metadata.avg_bpm - 60.0) / 100.0).clamp(0.0, 1.0);
        let velocity_norm = (section.metadata.avg_velocity / 100.0).clamp(0.0, 1.0);

        let points: Vec<(f64, f64)> = section
            .token_sequence
            .iter()
            .filter(|t| t.kind == TokenKind::NoteOn)
            .map(|t| (t.time_sec, t.pitch as f64))
            .collect();
        let pitch_slope = pitch_slope(&points);
        let pitch_slope_norm = ((pitch_slope + 0.6) / 1.2).clamp(0.0, 1.0);

        let score = self.config.tempo_weight * tempo_norm
            + self.config.velocity_weight * velocity_norm
            + self.config.pitch_slope_weight * pitch_slope_norm;

        MomentumRecord {
            section_id: section.id.clone(),
            label: self.label_for(score),
            score,
            components: MomentumComponents {
                tempo_norm,
                velocity_norm,
                pitch_slope_norm,
                pitch_slope,
            },
        }
    }

    /// Boundary scores are neutral
    pub fn label_for(&self, score: f64) -> MomentumLabel {
        if score > self.config.positive_threshold {
            MomentumLabel::Positive
        } else if score < self.config.negative_threshold {
            MomentumLabel::Negative
        } else {
            MomentumLabel::Neutral
        }
    }
}

/// Classify sections with the default weights
pub fn classify_sections(sections: &[Section]) -> Result<Vec<MomentumRecord>, MomentumError> {
    MomentumClassifier::new().classify_all(sections)
}

/// Pitch trend over time-ordered `(time, pitch)` points
///
/// Endpoint slope for short sequences, least squares otherwise. Zero when
/// fewer than two distinct times exist.
pub fn pitch_slope(points: &[(f64, f64)]) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };

    let distinct_times = points.iter().any(|(t, _)| (*t - first.0).abs() > f64::EPSILON);
    if !distinct_times {
        return 0.0;
    }

    if points.len() < REGRESSION_MIN_POINTS {
        let dt = last.0 - first.0;
        if dt.abs() <= f64::EPSILON {
            return 0.0;
        }
        return (last.1 - first.1) / dt;
    }

    let n = points.len() as f64;
    let mean_t = points.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_p = points.iter().map(|(_, p)| p).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (t, p) in points {
        covariance += (t - mean_t) * (p - mean_p);
        variance += (t - mean_t) * (t - mean_t);
    }

    if variance <= f64::EPSILON {
        0.0
    } else {
        covariance / variance
    }
}

/// Most frequent label; ties and empty input resolve to neutral
pub fn dominant_label(records: &[MomentumRecord]) -> MomentumLabel {
    let count = |label: MomentumLabel| records.iter().filter(|r| r.label == label).count();
    let positive = count(MomentumLabel::Positive);
    let neutral = count(MomentumLabel::Neutral);
    let negative = count(MomentumLabel::Negative);

    if positive > neutral && positive > negative {
        MomentumLabel::Positive
    } else if negative > neutral && negative > positive {
        MomentumLabel::Negative
    } else {
        MomentumLabel::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::{Bar, Note, TimeSignature};

    fn section_with(bpm: f64, velocity: u8, pitches: &[u8]) -> Section {
        let bar_len = 60.0 / bpm * 4.0;
        let step = bar_len / pitches.len().max(1) as f64;
        let notes = pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| Note::new(p, velocity, i as f64 * step, step * 0.9))
            .collect();
        let bar = Bar::new(0, TimeSignature::default(), 0.0, bar_len, bpm, notes);
        Section::new(0, vec![bar])
    }

    #[test]
    fn test_fast_loud_rising_is_positive() {
        let section = section_with(160.0, 100, &[60, 62, 64, 65, 67, 69]);
        let record = MomentumClassifier::new().classify(&section);

        assert!(record.components.pitch_slope > 0.0);
        assert!(record.score > 0.65);
        assert_eq!(record.label, MomentumLabel::Positive);
    }

    #[test]
    fn test_slow_silent_falling_is_negative() {
        let section = section_with(60.0, 0, &[72, 69, 65, 62]);
        let record = MomentumClassifier::new().classify(&section);

        assert!(record.components.pitch_slope < 0.0);
        assert!(record.score < 0.35);
        assert_eq!(record.label, MomentumLabel::Negative);
    }

    #[test]
    fn test_slope_measured_in_seconds() {
        // 72 -> 71 over 1.25s at 160 BPM is -0.8 semitones per second
        let notes = vec![Note::new(72, 60, 0.0, 0.2), Note::new(71, 60, 1.25, 0.2)];
        let bar = Bar::new(0, TimeSignature::default(), 0.0, 1.5, 160.0, notes);
        let record = MomentumClassifier::new().classify(&Section::new(0, vec![bar]));

        assert!((record.components.pitch_slope + 0.8).abs() < 1e-9);
        assert_eq!(record.components.pitch_slope_norm, 0.0);
        assert!((record.score - 0.64).abs() < 1e-9);
        assert_eq!(record.label, MomentumLabel::Neutral);
    }

    #[test]
    fn test_velocity_norm_clamped_above_100() {
        let section = section_with(120.0, 127, &[60, 60]);
        let record = MomentumClassifier::new().classify(&section);
        assert_eq!(record.components.velocity_norm, 1.0);
        assert!(record.score <= 1.0);
    }

    #[test]
    fn test_boundary_scores_are_neutral() {
        let classifier = MomentumClassifier::new();
        assert_eq!(classifier.label_for(0.65), MomentumLabel::Neutral);
        assert_eq!(classifier.label_for(0.35), MomentumLabel::Neutral);
        assert_eq!(classifier.label_for(0.651), MomentumLabel::Positive);
        assert_eq!(classifier.label_for(0.349), MomentumLabel::Negative);
    }

    #[test]
    fn test_empty_section_list_errors() {
        assert!(matches!(classify_sections(&[]), Err(MomentumError::NoTokens)));
    }

    #[test]
    fn test_endpoint_slope_for_short_sequences() {
        // Middle point is ignored by the endpoint slope
        let slope = pitch_slope(&[(0.0, 60.0), (1.0, 80.0), (2.0, 62.0)]);
        assert!((slope - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_least_squares_slope() {
        let points: Vec<(f64, f64)> = (0..6).map(|i| (i as f64, 60.0 + 2.0 * i as f64)).collect();
        assert!((pitch_slope(&points) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_slope_zero_without_distinct_times() {
        assert_eq!(pitch_slope(&[]), 0.0);
        assert_eq!(pitch_slope(&[(1.0, 60.0)]), 0.0);
        assert_eq!(pitch_slope(&[(1.0, 60.0), (1.0, 72.0), (1.0, 48.0)]), 0.0);
    }

    #[test]
    fn test_silent_section_scores_tempo_and_flat_slope() {
        let section = section_with(120.0, 0, &[]);
        let record = MomentumClassifier::new().classify(&section);

        assert_eq!(record.components.velocity_norm, 0.0);
        assert_eq!(record.components.pitch_slope, 0.0);
        assert!((record.components.pitch_slope_norm - 0.5).abs() < 1e-9);
        assert!((record.score - (0.4 * 0.6 + 0.2 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_label_ties_go_neutral() {
        let record = |label| MomentumRecord {
            section_id: "s".to_string(),
            label,
            score: 0.5,
            components: MomentumComponents {
                tempo_norm: 0.0,
                velocity_norm: 0.0,
                pitch_slope_norm: 0.0,
                pitch_slope: 0.0,
            },
        };

        assert_eq!(dominant_label(&[]), MomentumLabel::Neutral);
        assert_eq!(
            dominant_label(&[record(MomentumLabel::Positive), record(MomentumLabel::Negative)]),
            MomentumLabel::Neutral
        );
        assert_eq!(
            dominant_label(&[
                record(MomentumLabel::Positive),
                record(MomentumLabel::Positive),
                record(MomentumLabel::Neutral)
            ]),
            MomentumLabel::Positive
        );
    }
}
