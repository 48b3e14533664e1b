// MIDI transformer
// Applies controls to a base performance, layers motif voices and writes verified MIDI bytes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Motif;
use crate::controls::Controls;
use crate::midi::{
    verify_smf, write_smf, ControlChange, MidiExportOptions, MidiWriteError, Performance, SmfSummary,
    VerifyError,
};

use super::arrange::{allocate_channels, motif_voice, VoiceSettings, MOTIF_PROGRAMS};
use super::rules::{rescale_tempo, shift_velocities, transpose_performance};

/// Filter cutoff controller
pub const CC_FILTER_CUTOFF: u8 = 74;

/// Reverb send controller
pub const CC_REVERB_SEND: u8 = 91;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to write MIDI: {0}")]
    Write(#[from] MidiWriteError),

    #[error("Transformed MIDI failed verification: {0}")]
    Verify(#[from] VerifyError),

    #[error("Transformed MIDI does not match the arrangement: expected {expected_notes} notes and {expected_controllers} controllers, found {found_notes} and {found_controllers}")]
    RoundTripMismatch {
        expected_notes: usize,
        found_notes: usize,
        expected_controllers: usize,
        found_controllers: usize,
    },
}

/// Transformer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Length motif voices are repeated to fill
    pub arrangement_duration_sec: f64,

    /// Relative tempo change below which timings are left alone
    pub tempo_change_threshold: f64,

    /// Resolution of the written file
    pub ppq: u16,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            arrangement_duration_sec: 32.0,
            tempo_change_threshold: 0.05,
            ppq: 480,
        }
    }
}

/// Output of the transformer: bytes plus the model they were written from
#[derive(Debug, Clone)]
pub struct TransformedMidi {
    pub bytes: Vec<u8>,
    pub performance: Performance,
    pub summary: SmfSummary,
}

/// Build a new performance from a base performance, controls and motifs
///
/// An absent base performance is replaced by an empty one at the target tempo.
/// The written bytes are re-read by the independent verifier and the note and
/// controller counts must match what was arranged.
pub fn transform_performance(
    base: Option<&Performance>,
    controls: &Controls,
    motifs: &[Motif],
    options: &TransformOptions,
) -> Result<TransformedMidi, TransformError> {
    let target_bpm = controls.bpm() as f64;
    let mut performance = match base {
        Some(base) => base.clone(),
        None => Performance::empty(target_bpm),
    };

    let ratio = rescale_tempo(&mut performance, target_bpm, options.tempo_change_threshold);
    transpose_performance(&mut performance, controls.transpose());
    let velocity_factor = shift_velocities(&mut performance, controls.velocity());

    let settings = VoiceSettings {
        duration_sec: options.arrangement_duration_sec,
        bpm: performance.initial_bpm(),
        transpose: controls.transpose(),
        target_velocity: controls.velocity(),
    };
    let channels = allocate_channels(&performance.used_channels(), motifs.len());
    let mut voices = 0;
    for (i, motif) in motifs.iter().enumerate() {
        let program = MOTIF_PROGRAMS[i % MOTIF_PROGRAMS.len()];
        if let Some(voice) = motif_voice(motif, channels[i], program, &settings) {
            performance.instruments.push(voice);
            voices += 1;
        }
    }

    for instrument in &mut performance.instruments {
        instrument.control_changes.push(ControlChange {
            controller: CC_FILTER_CUTOFF,
            value: controls.filter(),
            time_sec: 0.0,
        });
        instrument.control_changes.push(ControlChange {
            controller: CC_REVERB_SEND,
            value: controls.reverb(),
            time_sec: 0.0,
        });
    }

    performance.ppq = options.ppq;
    let export = MidiExportOptions {
        ppq: options.ppq,
        ..MidiExportOptions::default()
    };
    let bytes = write_smf(&performance, &export)?;
    let summary = verify_smf(&bytes)?;

    let expected_notes = performance.note_count();
    let expected_controllers: usize = performance
        .instruments
        .iter()
        .map(|i| i.control_changes.len())
        .sum();
    if summary.note_on_count != expected_notes || summary.controller_count != expected_controllers {
        return Err(TransformError::RoundTripMismatch {
            expected_notes,
            found_notes: summary.note_on_count,
            expected_controllers,
            found_controllers: summary.controller_count,
        });
    }

    log::info!(
        "Transformed performance: tempo ratio {:?}, velocity factor {:.3}, {} motif voices, {} notes, {} bytes",
        ratio,
        velocity_factor,
        voices,
        expected_notes,
        bytes.len()
    );

    Ok(TransformedMidi {
        bytes,
        performance,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::Note;
    use crate::midi::{read_performance, Instrument, PerformanceNote, DRUM_CHANNEL};

    fn controls() -> Controls {
        Controls::new(120, 3, 90, 100, 40).unwrap()
    }

    fn base() -> Performance {
        let mut perf = Performance::empty(120.0);
        let mut piano = Instrument::new("Piano", 0, 0);
        piano.notes = (0..8)
            .map(|i| PerformanceNote::new(60 + i, 70, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect();
        let mut drums = Instrument::new("Drums", 0, DRUM_CHANNEL);
        drums.notes = vec![PerformanceNote::new(36, 100, 0.0, 0.1)];
        perf.instruments = vec![piano, drums];
        perf
    }

    fn motifs() -> Vec<Motif> {
        vec![
            Motif::new("a", vec![Note::new(72, 80, 0.0, 0.5), Note::new(76, 80, 0.5, 0.5)], None),
            Motif::new("b", vec![Note::new(48, 60, 0.0, 2.0)], None),
        ]
    }

    #[test]
    fn test_output_reparses() {
        let result = transform_performance(Some(&base()), &controls(), &motifs(), &TransformOptions::default()).unwrap();

        assert_eq!(result.summary.format, 1);
        assert_eq!(result.summary.track_count, 5);

        let reread = read_performance(&result.bytes).unwrap();
        assert_eq!(reread.note_count(), result.performance.note_count());
    }

    #[test]
    fn test_controls_applied() {
        let result = transform_performance(Some(&base()), &controls(), &[], &TransformOptions::default()).unwrap();
        let piano = &result.performance.instruments[0];
        let drums = &result.performance.instruments[1];

        assert_eq!(piano.notes[0].pitch, 63);
        assert_eq!(drums.notes[0].pitch, 36);
        for instrument in &result.performance.instruments {
            assert!(instrument
                .control_changes
                .iter()
                .any(|cc| cc.controller == CC_FILTER_CUTOFF && cc.value == 100 && cc.time_sec == 0.0));
            assert!(instrument
                .control_changes
                .iter()
                .any(|cc| cc.controller == CC_REVERB_SEND && cc.value == 40));
        }
    }

    #[test]
    fn test_motif_voices_fill_arrangement() {
        let options = TransformOptions {
            arrangement_duration_sec: 8.0,
            ..TransformOptions::default()
        };
        let result = transform_performance(Some(&base()), &controls(), &motifs(), &options).unwrap();
        let voices: Vec<_> = result.performance.instruments.iter().skip(2).collect();

        assert_eq!(voices.len(), 2);
        // Piano holds channel 0, drums 9
        assert_eq!(voices[0].channel, 1);
        assert_eq!(voices[1].channel, 2);
        // Two notes per 2-second bar over 8 seconds
        assert_eq!(voices[0].notes.len(), 8);
        assert_eq!(voices[1].notes.len(), 4);
        assert_eq!(voices[0].notes[0].pitch, 75);
    }

    #[test]
    fn test_tempo_rescale_applied() {
        let fast = Controls::new(180, 0, 70, 0, 0).unwrap();
        let result = transform_performance(Some(&base()), &fast, &[], &TransformOptions::default()).unwrap();

        assert_eq!(result.performance.initial_bpm(), 180.0);
        let second = result.performance.instruments[0].notes[1];
        assert!((second.start_sec - 0.5 * 120.0 / 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_base_synthesizes_empty_performance() {
        let result = transform_performance(None, &controls(), &motifs(), &TransformOptions::default()).unwrap();

        assert_eq!(result.performance.initial_bpm(), 120.0);
        assert_eq!(result.performance.instruments.len(), 2);
        assert_eq!(result.summary.controller_count, 4);
        assert!(read_performance(&result.bytes).is_ok());
    }
}
