// Label predictor capability
// Optional, injected; any failure is treated as "no opinion"

use thiserror::Error;

use super::motif::Motif;
use crate::momentum::pitch_slope;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("Predictor unavailable: {0}")]
    Unavailable(String),

    #[error("Prediction failed: {0}")]
    Failed(String),
}

/// Suggests a label for an unlabeled motif
pub trait LabelPredictor: Send + Sync {
    /// `Ok(None)` means the predictor has no opinion
    fn predict(&self, motif: &Motif) -> Result<Option<String>, PredictorError>;
}

/// Ask the predictor, folding errors into "no opinion"
pub(crate) fn predict_or_none(predictor: &dyn LabelPredictor, motif: &Motif) -> Option<String> {
    match predictor.predict(motif) {
        Ok(label) => label,
        Err(e) => {
            log::debug!("Label predictor failed for motif {}: {}", motif.id, e);
            None
        }
    }
}

/// Rule-based predictor over a motif's velocity and melodic contour
///
/// Loud rising motifs are "positive", quiet falling ones "negative", and
/// everything else "neutral". Motifs without notes get no opinion.
#[derive(Debug, Clone)]
pub struct ContourPredictor {
    /// Velocity at or above which a motif counts as energetic
    pub energetic_velocity: f64,
    /// Velocity at or below which a motif counts as subdued
    pub subdued_velocity: f64,
}

impl Default for ContourPredictor {
    fn default() -> Self {
        ContourPredictor {
            energetic_velocity: 90.0,
            subdued_velocity: 60.0,
        }
    }
}

impl LabelPredictor for ContourPredictor {
    fn predict(&self, motif: &Motif) -> Result<Option<String>, PredictorError> {
        if motif.notes.is_empty() {
            return Ok(None);
        }

        let mut points: Vec<(f64, f64)> = motif
            .notes
            .iter()
            .map(|n| (n.start_offset_sec, n.pitch as f64))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let slope = pitch_slope(&points);
        let velocity = motif.metadata.avg_velocity;

        let label = if slope > 0.0 && velocity >= self.energetic_velocity {
            "positive"
        } else if slope < 0.0 && velocity <= self.subdued_velocity {
            "negative"
        } else {
            "neutral"
        };
        Ok(Some(label.to_string()))
    }
}
