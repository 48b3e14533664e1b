// Control and metric types
// Controls can only be built through validation; out-of-range values are errors, never clamped

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BPM_RANGE: RangeInclusive<i64> = 40..=200;
pub const TRANSPOSE_RANGE: RangeInclusive<i64> = -24..=24;
pub const VELOCITY_RANGE: RangeInclusive<i64> = 1..=127;
pub const FILTER_RANGE: RangeInclusive<i64> = 0..=127;
pub const REVERB_RANGE: RangeInclusive<i64> = 0..=127;

#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("Control '{field}' = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Metric '{field}' is not a finite number")]
    NonFiniteMetric { field: &'static str },
}

/// External engagement metrics, each normalized to [0, 1] upstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Click-through rate
    pub ctr: f64,
    pub impressions: f64,
    pub clicks: f64,
    /// Ranking position (0 = top)
    pub position: f64,
}

impl Metrics {
    pub fn new(ctr: f64, impressions: f64, clicks: f64, position: f64) -> Self {
        Metrics {
            ctr,
            impressions,
            clicks,
            position,
        }
    }

    /// Reject NaN and infinite values before they reach the mapper
    pub fn check_finite(&self) -> Result<(), ControlError> {
        let fields = [
            ("ctr", self.ctr),
            ("impressions", self.impressions),
            ("clicks", self.clicks),
            ("position", self.position),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((field, _)) => Err(ControlError::NonFiniteMetric { field: *field }),
            None => Ok(()),
        }
    }
}

/// Raw serialized shape; deserialization goes through `Controls::new`
#[derive(Deserialize)]
struct RawControls {
    bpm: i64,
    transpose: i64,
    velocity: i64,
    filter: i64,
    reverb: i64,
}

/// Validated MIDI control parameters for one generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Controls {
    bpm: u16,
    transpose: i8,
    velocity: u8,
    filter: u8,
    reverb: u8,
}

impl<'de> Deserialize<'de> for Controls {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawControls::deserialize(deserializer)?;
        Controls::new(raw.bpm, raw.transpose, raw.velocity, raw.filter, raw.reverb)
            .map_err(serde::de::Error::custom)
    }
}

fn check(field: &'static str, value: i64, range: &RangeInclusive<i64>) -> Result<i64, ControlError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ControlError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl Controls {
    /// Validate every field; the first out-of-range field is reported
    pub fn new(bpm: i64, transpose: i64, velocity: i64, filter: i64, reverb: i64) -> Result<Self, ControlError> {
        let bpm = check("bpm", bpm, &BPM_RANGE)?;
        let transpose = check("transpose", transpose, &TRANSPOSE_RANGE)?;
        let velocity = check("velocity", velocity, &VELOCITY_RANGE)?;
        let filter = check("filter", filter, &FILTER_RANGE)?;
        let reverb = check("reverb", reverb, &REVERB_RANGE)?;

        // Ranges above fit the narrow types
        Ok(Controls {
            bpm: bpm as u16,
            transpose: transpose as i8,
            velocity: velocity as u8,
            filter: filter as u8,
            reverb: reverb as u8,
        })
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    pub fn transpose(&self) -> i8 {
        self.transpose
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Filter cutoff sent as CC74
    pub fn filter(&self) -> u8 {
        self.filter
    }

    /// Reverb send sent as CC91
    pub fn reverb(&self) -> u8 {
        self.reverb
    }

    /// Stable textual key used for seeding
    pub fn seed_key(&self) -> String {
        format!(
            "bpm={};transpose={};velocity={};filter={};reverb={}",
            self.bpm, self.transpose, self.velocity, self.filter, self.reverb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_controls() {
        let controls = Controls::new(120, -3, 90, 64, 20).unwrap();
        assert_eq!(controls.bpm(), 120);
        assert_eq!(controls.transpose(), -3);
        assert_eq!(controls.velocity(), 90);
    }

    #[test]
    fn test_bpm_300_rejected() {
        assert_eq!(
            Controls::new(300, 0, 90, 0, 0),
            Err(ControlError::OutOfRange {
                field: "bpm",
                value: 300,
                min: 40,
                max: 200
            })
        );
    }

    #[test]
    fn test_velocity_zero_rejected() {
        let err = Controls::new(120, 0, 0, 0, 0).unwrap_err();
        assert!(matches!(err, ControlError::OutOfRange { field: "velocity", .. }));
    }

    #[test]
    fn test_bounds_inclusive() {
        assert!(Controls::new(40, -24, 1, 0, 0).is_ok());
        assert!(Controls::new(200, 24, 127, 127, 127).is_ok());
        assert!(Controls::new(120, 25, 64, 0, 0).is_err());
        assert!(Controls::new(120, 0, 64, 128, 0).is_err());
        assert!(Controls::new(120, 0, 64, 0, -1).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Controls =
            serde_json::from_str(r#"{"bpm":100,"transpose":2,"velocity":80,"filter":10,"reverb":5}"#).unwrap();
        assert_eq!(ok.filter(), 10);

        let bad = serde_json::from_str::<Controls>(
            r#"{"bpm":500,"transpose":2,"velocity":80,"filter":10,"reverb":5}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_non_finite_metric() {
        let metrics = Metrics::new(0.5, f64::NAN, 0.1, 0.2);
        assert_eq!(
            metrics.check_finite(),
            Err(ControlError::NonFiniteMetric { field: "impressions" })
        );
    }
}
