// MIDI Import - Parse Standard MIDI Files into a Performance using midly
// Resolves the tempo map first, then pairs note-on/note-off per channel and key

use std::collections::{BTreeMap, HashMap, VecDeque};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;

use super::performance::{
    ControlChange, Instrument, Performance, PerformanceNote, TimeSignatureChange,
};
use super::tempo_map::TempoMap;

#[derive(Debug, Error)]
pub enum MidiReadError {
    #[error("Failed to parse MIDI: {0}")]
    Parse(#[from] midly::Error),

    #[error("Unsupported MIDI timing: {0}")]
    UnsupportedTiming(String),
}

/// Per-(track, channel) accumulator while walking events
#[derive(Default)]
struct VoiceBuilder {
    program: Option<u8>,
    notes: Vec<PerformanceNote>,
    control_changes: Vec<ControlChange>,
    // Open notes per key, FIFO so overlapping same-key notes close in order
    open: HashMap<u8, VecDeque<(u64, u8)>>,
}

impl Performance {
    pub fn from_midi_bytes(bytes: &[u8]) -> Result<Self, MidiReadError> {
        read_performance(bytes)
    }
}

/// Parse MIDI file bytes into a performance with absolute-second timing
pub fn read_performance(bytes: &[u8]) -> Result<Performance, MidiReadError> {
    let smf = Smf::parse(bytes)?;

    let (ppq, tempo_map) = match smf.header.timing {
        Timing::Metrical(ppq) => {
            let ppq = ppq.as_int();
            if ppq == 0 {
                return Err(MidiReadError::UnsupportedTiming(
                    "zero ticks per quarter note".to_string(),
                ));
            }
            (ppq, TempoMap::from_ticks(ppq, collect_tempo_events(&smf)))
        }
        Timing::Timecode(fps, subframes) => {
            let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
            (480, TempoMap::timecode(ticks_per_second))
        }
    };

    let mut time_signatures = collect_time_signatures(&smf, &tempo_map);
    if time_signatures.is_empty() || time_signatures[0].time_sec > 0.0 {
        time_signatures.insert(0, TimeSignatureChange::new(0.0, 4, 4));
    }

    let mut voices: BTreeMap<(usize, u8), VoiceBuilder> = BTreeMap::new();
    let mut track_names: HashMap<usize, String> = HashMap::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        track_names.entry(track_idx).or_insert(name);
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    let voice = voices.entry((track_idx, channel)).or_default();
                    handle_message(voice, message, tick, &tempo_map);
                }
                _ => {}
            }
        }

        // Close notes left hanging at the end of the track
        for (_, voice) in voices.range_mut((track_idx, 0)..=(track_idx, 15)) {
            let open: Vec<(u8, (u64, u8))> = voice
                .open
                .drain()
                .flat_map(|(key, starts)| starts.into_iter().map(move |s| (key, s)))
                .collect();
            for (key, (start_tick, vel)) in open {
                voice.notes.push(PerformanceNote::new(
                    key,
                    vel,
                    tempo_map.tick_to_seconds(start_tick),
                    tempo_map.tick_to_seconds(tick),
                ));
            }
        }
    }

    let multi_channel_tracks: HashMap<usize, usize> =
        voices.keys().fold(HashMap::new(), |mut acc, (track_idx, _)| {
            *acc.entry(*track_idx).or_insert(0) += 1;
            acc
        });

    let mut instruments = Vec::new();
    for ((track_idx, channel), voice) in voices {
        if voice.notes.is_empty() {
            continue;
        }

        let base_name = track_names
            .get(&track_idx)
            .cloned()
            .unwrap_or_else(|| format!("Track {}", track_idx));
        let name = if multi_channel_tracks.get(&track_idx).copied().unwrap_or(0) > 1 {
            format!("{} (ch {})", base_name, channel + 1)
        } else {
            base_name
        };

        let mut instrument = Instrument::new(name, voice.program.unwrap_or(0), channel);
        instrument.notes = voice.notes;
        instrument.control_changes = voice.control_changes;
        instrument.sort_notes();
        instruments.push(instrument);
    }

    log::debug!(
        "Parsed MIDI: {} tracks, {} instruments, {} tempo changes",
        smf.tracks.len(),
        instruments.len(),
        tempo_map.changes().len()
    );

    Ok(Performance {
        ppq,
        tempo_changes: tempo_map.changes(),
        time_signatures,
        instruments,
    })
}

fn handle_message(voice: &mut VoiceBuilder, message: MidiMessage, tick: u64, tempo_map: &TempoMap) {
    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
            voice
                .open
                .entry(key.as_int())
                .or_default()
                .push_back((tick, vel.as_int()));
        }
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            let key = key.as_int();
            if let Some((start_tick, vel)) = voice.open.get_mut(&key).and_then(|q| q.pop_front()) {
                voice.notes.push(PerformanceNote::new(
                    key,
                    vel,
                    tempo_map.tick_to_seconds(start_tick),
                    tempo_map.tick_to_seconds(tick),
                ));
            }
        }
        MidiMessage::ProgramChange { program } => {
            voice.program.get_or_insert(program.as_int());
        }
        MidiMessage::Controller { controller, value } => {
            voice.control_changes.push(ControlChange {
                controller: controller.as_int(),
                value: value.as_int(),
                time_sec: tempo_map.tick_to_seconds(tick),
            });
        }
        _ => {}
    }
}

/// Gather tempo meta events from every track (format 1 keeps them on track 0,
/// but nothing stops a file from scattering them)
fn collect_tempo_events(smf: &Smf) -> Vec<(u64, u32)> {
    let mut tempos = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
                tempos.push((tick, us.as_int()));
            }
        }
    }
    tempos
}

fn collect_time_signatures(smf: &Smf, tempo_map: &TempoMap) -> Vec<TimeSignatureChange> {
    let mut changes: Vec<(u64, u8, u8)> = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) = event.kind {
                let denominator = 1u8.checked_shl(den_pow as u32).unwrap_or(4);
                changes.push((tick, num, denominator));
            }
        }
    }
    changes.sort_by_key(|(tick, _, _)| *tick);
    // Keep only the last signature declared at any given tick
    changes.dedup_by(|later, earlier| {
        if later.0 == earlier.0 {
            *earlier = *later;
            true
        } else {
            false
        }
    });

    changes
        .into_iter()
        .map(|(tick, num, den)| TimeSignatureChange::new(tempo_map.tick_to_seconds(tick), num, den))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, Track, TrackEvent};

    fn note_track(notes: &[(u32, u32, u8, u8)]) -> Track<'static> {
        // (start_tick, end_tick, key, vel)
        let mut events: Vec<(u32, TrackEventKind<'static>)> = Vec::new();
        for &(start, end, key, vel) in notes {
            events.push((
                start,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn { key: key.into(), vel: vel.into() },
                },
            ));
            events.push((
                end,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOff { key: key.into(), vel: 0.into() },
                },
            ));
        }
        events.sort_by_key(|(tick, _)| *tick);

        let mut track = Track::new();
        let mut last = 0;
        for (tick, kind) in events {
            track.push(TrackEvent { delta: (tick - last).into(), kind });
            last = tick;
        }
        track.push(TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });
        track
    }

    fn conductor(us_per_quarter: u32, numerator: u8) -> Track<'static> {
        vec![
            TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())) },
            TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, 2, 24, 8)),
            },
            TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) },
        ]
    }

    fn write(tracks: Vec<Track<'static>>) -> Vec<u8> {
        let smf = Smf {
            header: Header { format: Format::Parallel, timing: Timing::Metrical(480.into()) },
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_read_notes_in_seconds() {
        let bytes = write(vec![
            conductor(500_000, 4),
            note_track(&[(0, 480, 60, 100), (480, 960, 64, 90)]),
        ]);

        let perf = read_performance(&bytes).unwrap();
        assert_eq!(perf.ppq, 480);
        assert_eq!(perf.instruments.len(), 1);

        let notes = &perf.instruments[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 60);
        assert!((notes[0].end_sec - 0.5).abs() < 1e-9);
        assert!((notes[1].start_sec - 0.5).abs() < 1e-9);
        assert_eq!(notes[1].velocity, 90);
    }

    #[test]
    fn test_read_tempo_and_meter() {
        let bytes = write(vec![conductor(400_000, 3), note_track(&[(0, 480, 60, 100)])]);
        let perf = read_performance(&bytes).unwrap();

        assert!((perf.initial_bpm() - 150.0).abs() < 1e-9);
        assert_eq!(perf.time_signatures.len(), 1);
        assert_eq!(perf.time_signatures[0].numerator, 3);
        assert_eq!(perf.time_signatures[0].denominator, 4);
    }

    #[test]
    fn test_velocity_zero_note_on_closes_note() {
        let mut track = Track::new();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn { key: 62.into(), vel: 80.into() },
            },
        });
        track.push(TrackEvent {
            delta: 240.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn { key: 62.into(), vel: 0.into() },
            },
        });
        track.push(TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });

        let perf = read_performance(&write(vec![conductor(500_000, 4), track])).unwrap();
        let note = perf.instruments[0].notes[0];
        assert!((note.end_sec - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_from_midi_bytes_matches_reader() {
        let mut perf = Performance::empty(90.0);
        let mut piano = Instrument::new("Piano", 0, 0);
        piano.notes.push(PerformanceNote::new(60, 80, 0.0, 0.5));
        perf.instruments.push(piano);
        let bytes = crate::midi::write_smf(&perf, &crate::midi::MidiExportOptions::default()).unwrap();

        let parsed = Performance::from_midi_bytes(&bytes).unwrap();
        assert_eq!(parsed.note_count(), 1);
        assert!((parsed.initial_bpm() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let result = read_performance(b"definitely not a midi file");
        assert!(matches!(result, Err(MidiReadError::Parse(_))));
    }
}
