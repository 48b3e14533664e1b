// Global performance rules: tempo rescale, transposition, velocity shift

use crate::midi::Performance;

/// Transpose a pitch, clamping to the MIDI range
pub fn transpose_pitch(pitch: u8, semitones: i8) -> u8 {
    (pitch as i16 + semitones as i16).clamp(0, 127) as u8
}

/// Scale a velocity by `factor`, clamping to [1, 127]
pub fn scale_velocity(velocity: u8, factor: f64) -> u8 {
    (velocity as f64 * factor).round().clamp(1.0, 127.0) as u8
}

/// Multiplicative factor that moves `mean` onto `target`
///
/// Returns 1.0 when there is nothing to scale (no notes or a silent mean).
pub fn velocity_factor(mean: Option<f64>, target: u8) -> f64 {
    match mean {
        Some(mean) if mean > 0.0 => target as f64 / mean,
        _ => 1.0,
    }
}

/// Mean note velocity across all instruments
pub fn mean_velocity(performance: &Performance) -> Option<f64> {
    let count = performance.note_count();
    if count == 0 {
        return None;
    }
    let sum: f64 = performance
        .instruments
        .iter()
        .flat_map(|i| i.notes.iter())
        .map(|n| n.velocity as f64)
        .sum();
    Some(sum / count as f64)
}

/// Rescale the whole timeline to `target_bpm` when the relative change exceeds `threshold`
///
/// All event times are divided by `target / current` and every tempo change
/// is multiplied by it, so the musical content is unchanged in beats.
/// Returns the applied ratio, or `None` when the change was within threshold.
pub fn rescale_tempo(performance: &mut Performance, target_bpm: f64, threshold: f64) -> Option<f64> {
    let current = performance.initial_bpm();
    if current <= 0.0 || target_bpm <= 0.0 {
        return None;
    }

    let ratio = target_bpm / current;
    if (ratio - 1.0).abs() <= threshold {
        return None;
    }

    let stretch = 1.0 / ratio;
    for tempo in &mut performance.tempo_changes {
        tempo.time_sec *= stretch;
        tempo.bpm *= ratio;
    }
    for signature in &mut performance.time_signatures {
        signature.time_sec *= stretch;
    }
    for instrument in &mut performance.instruments {
        for note in &mut instrument.notes {
            note.start_sec *= stretch;
            note.end_sec *= stretch;
        }
        for cc in &mut instrument.control_changes {
            cc.time_sec *= stretch;
        }
    }

    Some(ratio)
}

/// Transpose every non-percussion note
pub fn transpose_performance(performance: &mut Performance, semitones: i8) {
    if semitones == 0 {
        return;
    }
    for instrument in performance.instruments.iter_mut().filter(|i| !i.is_drum) {
        for note in &mut instrument.notes {
            note.pitch = transpose_pitch(note.pitch, semitones);
        }
    }
}

/// Shift the mean velocity toward `target` with one factor for every note
///
/// Returns the factor applied.
pub fn shift_velocities(performance: &mut Performance, target: u8) -> f64 {
    let factor = velocity_factor(mean_velocity(performance), target);
    for instrument in &mut performance.instruments {
        for note in &mut instrument.notes {
            note.velocity = scale_velocity(note.velocity, factor);
        }
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{ControlChange, Instrument, PerformanceNote, DRUM_CHANNEL};

    fn performance() -> Performance {
        let mut perf = Performance::empty(100.0);
        let mut piano = Instrument::new("Piano", 0, 0);
        piano.notes = vec![
            PerformanceNote::new(60, 40, 0.0, 1.0),
            PerformanceNote::new(126, 80, 1.0, 2.0),
        ];
        piano.control_changes.push(ControlChange {
            controller: 7,
            value: 100,
            time_sec: 2.0,
        });
        let mut drums = Instrument::new("Drums", 0, DRUM_CHANNEL);
        drums.notes = vec![PerformanceNote::new(36, 120, 0.0, 0.1)];
        perf.instruments = vec![piano, drums];
        perf
    }

    #[test]
    fn test_small_tempo_change_ignored() {
        let mut perf = performance();
        assert_eq!(rescale_tempo(&mut perf, 104.0, 0.05), None);
        assert_eq!(perf.instruments[0].notes[1].start_sec, 1.0);
    }

    #[test]
    fn test_tempo_rescale_scales_times() {
        let mut perf = performance();
        let ratio = rescale_tempo(&mut perf, 200.0, 0.05).unwrap();

        assert_eq!(ratio, 2.0);
        assert_eq!(perf.initial_bpm(), 200.0);
        assert_eq!(perf.instruments[0].notes[1].start_sec, 0.5);
        assert_eq!(perf.instruments[0].notes[1].end_sec, 1.0);
        assert_eq!(perf.instruments[0].control_changes[0].time_sec, 1.0);
    }

    #[test]
    fn test_transpose_skips_drums_and_clamps() {
        let mut perf = performance();
        transpose_performance(&mut perf, 5);

        assert_eq!(perf.instruments[0].notes[0].pitch, 65);
        assert_eq!(perf.instruments[0].notes[1].pitch, 127);
        assert_eq!(perf.instruments[1].notes[0].pitch, 36);

        assert_eq!(transpose_pitch(3, -12), 0);
    }

    #[test]
    fn test_velocity_shift_moves_mean() {
        let mut perf = performance();
        // mean (40 + 80 + 120) / 3 = 80, target 40 => factor 0.5
        let factor = shift_velocities(&mut perf, 40);

        assert_eq!(factor, 0.5);
        assert_eq!(perf.instruments[0].notes[0].velocity, 20);
        assert_eq!(perf.instruments[0].notes[1].velocity, 40);
        assert_eq!(perf.instruments[1].notes[0].velocity, 60);
    }

    #[test]
    fn test_velocity_clamped() {
        assert_eq!(scale_velocity(120, 3.0), 127);
        assert_eq!(scale_velocity(1, 0.01), 1);
        assert_eq!(velocity_factor(None, 90), 1.0);
    }
}
