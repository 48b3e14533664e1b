// Metric to control mapping

use super::types::{ControlError, Controls, Metrics};

/// Map normalized metrics to MIDI controls
///
/// Each formula result is rounded to the nearest integer and then validated;
/// metrics outside [0, 1] surface as `ControlError::OutOfRange`.
pub fn map_controls(metrics: &Metrics) -> Result<Controls, ControlError> {
    metrics.check_finite()?;

    let bpm = 40.0 + metrics.ctr * 160.0;
    let transpose = -12.0 + (1.0 - metrics.position) * 24.0;
    let velocity = (20.0 + metrics.impressions * 107.0).max(1.0);
    let filter = metrics.clicks * 127.0;
    let reverb = ((metrics.ctr + metrics.clicks * 0.5) / 1.5) * 127.0;

    let controls = Controls::new(
        bpm.round() as i64,
        transpose.round() as i64,
        velocity.round() as i64,
        filter.round() as i64,
        reverb.round() as i64,
    )?;

    log::info!(
        "Mapped metrics to controls: bpm={} transpose={} velocity={} filter={} reverb={}",
        controls.bpm(),
        controls.transpose(),
        controls.velocity(),
        controls.filter(),
        controls.reverb()
    );

    Ok(controls)
}
