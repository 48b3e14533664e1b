// Section tokens
// Canonical NOTE_ON / NOTE_OFF event stream for a group of bars

use serde::{Deserialize, Serialize};

use crate::bars::Bar;

/// Timeline offset between consecutive bar slots of a section, in seconds
pub const BAR_SLOT_OFFSET_SEC: f64 = 4.0;

/// Token event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    NoteOn,
    NoteOff,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::NoteOn => "NOTE_ON",
            TokenKind::NoteOff => "NOTE_OFF",
        }
    }
}

/// One note event in a section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub pitch: u8,
    /// Note velocity for NOTE_ON, 0 for NOTE_OFF
    pub velocity: u8,
    /// Seconds from the section start: bar slot * 4.0 plus the bar-relative onset
    pub time_sec: f64,
}

/// Build the canonical token sequence for consecutive bars
///
/// Each bar contributes a NOTE_ON and a NOTE_OFF per note, offset by its slot
/// in the section times four seconds. Tokens are ordered by time; at equal times
/// NOTE_ON precedes NOTE_OFF, then lower pitch first.
pub fn tokenize_bars(bars: &[Bar]) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (slot, bar) in bars.iter().enumerate() {
        let offset = slot as f64 * BAR_SLOT_OFFSET_SEC;

        for note in &bar.notes {
            let on = offset + note.start_offset_sec;
            let off = offset + note.end_offset_sec();

            tokens.push(Token {
                kind: TokenKind::NoteOn,
                pitch: note.pitch,
                velocity: note.velocity,
                time_sec: on,
            });
            tokens.push(Token {
                kind: TokenKind::NoteOff,
                pitch: note.pitch,
                velocity: 0,
                time_sec: off,
            });
        }
    }

    tokens.sort_by(|a, b| {
        a.time_sec
            .total_cmp(&b.time_sec)
            .then(a.kind.cmp(&b.kind))
            .then(a.pitch.cmp(&b.pitch))
    });
    tokens
}
