// MIDI Export - Convert performances to MIDI files using midly crate
// Produces format 1 files: a conductor track plus one track per instrument

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::performance::{Instrument, Performance, TimeSignatureChange};
use super::tempo_map::TempoMap;

#[derive(Debug, Error)]
pub enum MidiWriteError {
    #[error("Failed to write MIDI: {0}")]
    Write(String),

    #[error("Too many tracks for a MIDI file: {0}")]
    TooManyTracks(usize),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ) - typically 480 or 960
    /// Higher values = better timing resolution
    pub ppq: u16,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Include time signature metadata
    pub include_time_signature: bool,

    /// Include track names
    pub track_names: bool,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            include_tempo: true,
            include_time_signature: true,
            track_names: true,
        }
    }
}

/// Ordering of events that share a tick: setup first, releases before attacks
fn event_priority(kind: &TrackEventKind) -> u8 {
    match kind {
        TrackEventKind::Meta(_) => 0,
        TrackEventKind::Midi { message: MidiMessage::ProgramChange { .. }, .. } => 1,
        TrackEventKind::Midi { message: MidiMessage::Controller { .. }, .. } => 2,
        TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. } => 3,
        _ => 4,
    }
}

/// Export a performance to MIDI file bytes
///
/// Returns the MIDI file as a Vec<u8> that can be written to disk or handed
/// to the audio renderer.
pub fn write_smf(performance: &Performance, options: &MidiExportOptions) -> Result<Vec<u8>, MidiWriteError> {
    let track_count = performance.instruments.len() + 1;
    if track_count > u16::MAX as usize {
        return Err(MidiWriteError::TooManyTracks(track_count));
    }

    let ppq = options.ppq.clamp(24, 0x7FFF);
    let header = Header {
        format: Format::Parallel,
        timing: Timing::Metrical(ppq.into()),
    };

    let tempo_map = TempoMap::from_changes(ppq, &performance.tempo_changes);

    let mut tracks = Vec::with_capacity(track_count);
    tracks.push(create_conductor_track(performance, &tempo_map, options));

    for instrument in &performance.instruments {
        tracks.push(create_instrument_track(instrument, &tempo_map, options));
    }

    let smf = Smf { header, tracks };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiWriteError::Write(e.to_string()))?;

    Ok(bytes)
}

/// Track 0: tempo map, time signatures and a name
fn create_conductor_track<'a>(
    performance: &Performance,
    tempo_map: &TempoMap,
    options: &MidiExportOptions,
) -> Track<'a> {
    let mut events: Vec<(u64, TrackEventKind<'a>)> = Vec::new();

    if options.track_names {
        events.push((0, TrackEventKind::Meta(MetaMessage::TrackName(b"conductor"))));
    }

    if options.include_tempo {
        for (tick, us_per_quarter) in tempo_map.tick_tempos() {
            events.push((tick, tempo_event(us_per_quarter)));
        }
    }

    if options.include_time_signature {
        for signature in &performance.time_signatures {
            let tick = tempo_map.seconds_to_tick(signature.time_sec);
            events.push((tick, time_signature_event(signature)));
        }
    }

    to_track(events, 0)
}

/// One track per instrument: name, program, controllers, notes
fn create_instrument_track<'a>(
    instrument: &'a Instrument,
    tempo_map: &TempoMap,
    options: &MidiExportOptions,
) -> Track<'a> {
    let channel = instrument.channel.min(15);
    let mut events: Vec<(u64, TrackEventKind<'a>)> = Vec::new();

    if options.track_names {
        events.push((0, TrackEventKind::Meta(MetaMessage::TrackName(instrument.name.as_bytes()))));
    }

    if !instrument.is_drum {
        events.push((
            0,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::ProgramChange { program: instrument.program.min(127).into() },
            },
        ));
    }

    for cc in &instrument.control_changes {
        events.push((
            tempo_map.seconds_to_tick(cc.time_sec),
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::Controller {
                    controller: cc.controller.min(127).into(),
                    value: cc.value.min(127).into(),
                },
            },
        ));
    }

    let mut last_tick = 0;
    for note in &instrument.notes {
        let tick_on = tempo_map.seconds_to_tick(note.start_sec);
        // Zero-length notes still need a tick between on and off
        let tick_off = tempo_map.seconds_to_tick(note.end_sec).max(tick_on + 1);
        last_tick = last_tick.max(tick_off);

        events.push((
            tick_on,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: note.pitch.min(127).into(),
                    vel: note.velocity.clamp(1, 127).into(),
                },
            },
        ));
        events.push((
            tick_off,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOff {
                    key: note.pitch.min(127).into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    to_track(events, last_tick)
}

/// Sort absolute-tick events and convert them to delta times
fn to_track<'a>(mut events: Vec<(u64, TrackEventKind<'a>)>, end_tick: u64) -> Track<'a> {
    events.sort_by_key(|(tick, kind)| (*tick, event_priority(kind)));

    let mut track = Track::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: delta_ticks(tick.saturating_sub(last_tick)).into(),
            kind,
        });
        last_tick = tick;
    }

    add_end_of_track(&mut track, delta_ticks(end_tick.saturating_sub(last_tick)));
    track
}

/// Delta times are 28-bit
fn delta_ticks(delta: u64) -> u32 {
    delta.min(0x0FFF_FFFF) as u32
}

/// Tempo meta message from microseconds per quarter note (24-bit)
fn tempo_event<'a>(us_per_quarter: u32) -> TrackEventKind<'a> {
    TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.clamp(1, 0x00FF_FFFF).into()))
}

/// Time signature meta message
fn time_signature_event<'a>(signature: &TimeSignatureChange) -> TrackEventKind<'a> {
    // Denominator is stored as a power of two (2 = quarter note)
    let denominator_pow = if signature.denominator.is_power_of_two() {
        signature.denominator.trailing_zeros() as u8
    } else {
        2
    };

    // MIDI clocks per metronome click (24 for quarter note)
    let clocks_per_click = 24u8;

    // 32nd notes per quarter note (8)
    let thirty_seconds_per_quarter = 8u8;

    TrackEventKind::Meta(MetaMessage::TimeSignature(
        signature.numerator,
        denominator_pow,
        clocks_per_click,
        thirty_seconds_per_quarter,
    ))
}

/// Add end of track message
fn add_end_of_track(track: &mut Track<'_>, delta: u32) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
