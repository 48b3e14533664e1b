// Fingerprints - Truncated SHA-256 content hashes for bars and sections
//
// 16 hex characters (64 bits) keep identifiers short. Collisions are
// improbable but possible, and would merge two distinct sections during
// deduplication.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::Note;

/// Hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 16;

/// Hash input used for bars and sections with no content
const EMPTY_SENTINEL: &[u8] = b"__empty__";

/// A 16-hex-character content fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash arbitrary bytes and keep the first 16 hex characters
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FINGERPRINT_LEN);
        Fingerprint(digest)
    }

    /// Fingerprint shared by every empty bar or section
    pub fn empty() -> Self {
        Fingerprint::of(EMPTY_SENTINEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Round to millisecond precision so float noise does not change the hash
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Content fingerprint of a bar
///
/// Notes are put in canonical order (onset, then pitch, velocity, duration)
/// and `(pitch, velocity, duration)` triples are hashed. Onsets only decide
/// order; they are not part of the hash.
pub fn bar_fingerprint(notes: &[Note]) -> Fingerprint {
    if notes.is_empty() {
        return Fingerprint::empty();
    }

    let mut ordered: Vec<&Note> = notes.iter().collect();
    ordered.sort_by(|a, b| {
        round3(a.start_offset_sec)
            .total_cmp(&round3(b.start_offset_sec))
            .then(a.pitch.cmp(&b.pitch))
            .then(a.velocity.cmp(&b.velocity))
            .then(round3(a.duration_sec).total_cmp(&round3(b.duration_sec)))
    });

    let mut canonical = String::with_capacity(ordered.len() * 16);
    for note in ordered {
        canonical.push_str(&format!(
            "({},{},{:.3})",
            note.pitch,
            note.velocity,
            round3(note.duration_sec)
        ));
    }

    Fingerprint::of(canonical.as_bytes())
}
