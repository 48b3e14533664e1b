// Motif arrangement
// Each selected motif becomes its own instrument, repeated to fill the arrangement

use crate::catalog::Motif;
use crate::midi::{Instrument, PerformanceNote, DRUM_CHANNEL};

use super::rules::{scale_velocity, transpose_pitch, velocity_factor};

/// General MIDI programs assigned to motif voices in order
pub const MOTIF_PROGRAMS: [u8; 8] = [0, 4, 11, 33, 48, 73, 81, 89];

/// Channels not yet claimed, skipping percussion
///
/// When every melodic channel is taken the melodic channels are cycled.
pub fn allocate_channels(used: &[u8], count: usize) -> Vec<u8> {
    let melodic: Vec<u8> = (0..16u8).filter(|&c| c != DRUM_CHANNEL).collect();
    let mut free: Vec<u8> = melodic.iter().copied().filter(|c| !used.contains(c)).collect();

    if free.is_empty() {
        free = melodic;
    }

    (0..count).map(|i| free[i % free.len()]).collect()
}

/// Repetition period: the motif length rounded up to whole bars
pub fn repetition_period(pattern_length: f64, bar_length: f64) -> f64 {
    if bar_length <= 0.0 {
        return pattern_length;
    }
    let bars = (pattern_length / bar_length - 1e-9).ceil().max(1.0);
    bars * bar_length
}

/// Settings shared by every motif voice of one arrangement
#[derive(Debug, Clone, Copy)]
pub struct VoiceSettings {
    pub duration_sec: f64,
    pub bpm: f64,
    pub transpose: i8,
    pub target_velocity: u8,
}

/// Instantiate a motif as a voice repeating until `duration_sec`
///
/// Returns `None` for motifs without notes. Notes starting past the
/// arrangement end are dropped and the last ones are clipped to it.
pub fn motif_voice(motif: &Motif, channel: u8, program: u8, settings: &VoiceSettings) -> Option<Instrument> {
    if motif.notes.is_empty() || settings.duration_sec <= 0.0 {
        return None;
    }

    let bar_length = 240.0 / settings.bpm.max(1.0);
    let period = repetition_period(motif.pattern_length(), bar_length);
    if period <= 0.0 {
        return None;
    }

    let mean = motif.notes.iter().map(|n| n.velocity as f64).sum::<f64>() / motif.notes.len() as f64;
    let factor = velocity_factor(Some(mean), settings.target_velocity);

    let mut voice = Instrument::new(format!("motif {}", motif.id), program, channel);
    let mut offset = 0.0;
    while offset < settings.duration_sec {
        for note in &motif.notes {
            let start = offset + note.start_offset_sec;
            if start >= settings.duration_sec {
                continue;
            }
            let end = (start + note.duration_sec).min(settings.duration_sec);
            voice.notes.push(PerformanceNote::new(
                transpose_pitch(note.pitch, settings.transpose),
                scale_velocity(note.velocity, factor),
                start,
                end,
            ));
        }
        offset += period;
    }

    voice.sort_notes();
    Some(voice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::Note;

    fn settings(duration_sec: f64) -> VoiceSettings {
        VoiceSettings {
            duration_sec,
            bpm: 120.0,
            transpose: 2,
            target_velocity: 100,
        }
    }

    #[test]
    fn test_channels_skip_percussion_and_used() {
        assert_eq!(allocate_channels(&[0, 1], 3), vec![2, 3, 4]);
        let channels = allocate_channels(&[7, 8], 3);
        assert_eq!(channels, vec![0, 1, 2]);
        assert!(!allocate_channels(&[0, 1, 2, 3, 4, 5, 6, 7, 8], 2).contains(&DRUM_CHANNEL));
    }

    #[test]
    fn test_channels_cycle_when_exhausted() {
        let all: Vec<u8> = (0..16).collect();
        let channels = allocate_channels(&all, 16);
        assert_eq!(channels.len(), 16);
        assert!(!channels.contains(&DRUM_CHANNEL));
    }

    #[test]
    fn test_period_rounds_up_to_bars() {
        assert_eq!(repetition_period(1.5, 2.0), 2.0);
        assert_eq!(repetition_period(2.0, 2.0), 2.0);
        assert_eq!(repetition_period(2.5, 2.0), 4.0);
    }

    #[test]
    fn test_voice_repeats_to_fill_duration() {
        let motif = Motif::new(
            "m",
            vec![Note::new(60, 50, 0.0, 0.5), Note::new(62, 50, 1.0, 0.5)],
            None,
        );
        // One bar at 120 BPM is 2 seconds; 8 seconds holds four repetitions
        let voice = motif_voice(&motif, 3, 48, &settings(8.0)).unwrap();

        assert_eq!(voice.channel, 3);
        assert_eq!(voice.program, 48);
        assert_eq!(voice.notes.len(), 8);
        assert_eq!(voice.notes[2].start_sec, 2.0);
        assert!(voice.notes.iter().all(|n| n.pitch == 62 || n.pitch == 64));
        assert!(voice.notes.iter().all(|n| n.velocity == 100));
    }

    #[test]
    fn test_voice_clipped_at_duration() {
        let motif = Motif::new("m", vec![Note::new(60, 80, 0.0, 1.5)], None);
        let voice = motif_voice(&motif, 0, 0, &settings(3.0)).unwrap();

        assert_eq!(voice.notes.len(), 2);
        assert_eq!(voice.notes[1].start_sec, 2.0);
        assert_eq!(voice.notes[1].end_sec, 3.0);
    }

    #[test]
    fn test_empty_motif_has_no_voice() {
        let motif = Motif::new("m", vec![], None);
        assert!(motif_voice(&motif, 0, 0, &settings(8.0)).is_none());
    }
}
