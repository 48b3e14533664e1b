// Bar Extraction - Slice a performance into fingerprinted bars
// Walks each time-signature segment bar by bar using the tempo at the segment start

use thiserror::Error;

use crate::midi::{read_performance, Performance, PerformanceNote};
use super::types::{Bar, Note, TimeSignature};

/// Tolerance for floating point bar boundaries (seconds)
const BOUNDARY_EPSILON: f64 = 1e-6;

/// Errors raised while loading or slicing a performance
///
/// Both variants carry the tenant id so the caller can attribute failures.
#[derive(Debug, Error)]
pub enum BarError {
    #[error("Failed to load MIDI for tenant {tenant_id}: {reason}")]
    MidiLoad { tenant_id: String, reason: String },

    #[error("MIDI for tenant {tenant_id} has no playable instruments")]
    NoInstruments { tenant_id: String },
}

/// Parse MIDI bytes into a performance, attributing failures to a tenant
pub fn load_performance(tenant_id: &str, bytes: &[u8]) -> Result<Performance, BarError> {
    read_performance(bytes).map_err(|e| BarError::MidiLoad {
        tenant_id: tenant_id.to_string(),
        reason: e.to_string(),
    })
}

/// Parse MIDI bytes and extract bars in one step
pub fn extract_bars_from_bytes(tenant_id: &str, bytes: &[u8]) -> Result<Vec<Bar>, BarError> {
    let performance = load_performance(tenant_id, bytes)?;
    extract_bars(tenant_id, &performance)
}

/// Extract the ordered bar list of a performance
///
/// For each time-signature segment the bar length is `60 / bpm * numerator`
/// using the tempo active at the segment start. Bars are walked until the
/// segment end (or the end of the last note); the final bar is clipped.
/// Each bar collects the non-percussion notes whose onset falls in
/// `[start, end)`, rebased to bar-relative offsets.
pub fn extract_bars(tenant_id: &str, performance: &Performance) -> Result<Vec<Bar>, BarError> {
    if performance.instruments.iter().all(|i| i.notes.is_empty()) {
        return Err(BarError::NoInstruments {
            tenant_id: tenant_id.to_string(),
        });
    }

    let track_end = performance.end_time();
    let notes = melodic_notes(performance);

    let mut signatures = performance.time_signatures.clone();
    signatures.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));
    if signatures.is_empty() || signatures[0].time_sec > BOUNDARY_EPSILON {
        signatures.insert(0, crate::midi::TimeSignatureChange::new(0.0, 4, 4));
    }

    let mut bars = Vec::new();

    for (i, signature) in signatures.iter().enumerate() {
        let segment_start = signature.time_sec.max(0.0);
        let segment_end = signatures
            .get(i + 1)
            .map(|next| next.time_sec)
            .unwrap_or(track_end)
            .min(track_end);

        if segment_end - segment_start <= BOUNDARY_EPSILON {
            continue;
        }

        let time_signature = TimeSignature::new(signature.numerator, signature.denominator);
        let bpm = performance.bpm_at(segment_start);
        let bar_duration = time_signature.bar_duration_sec(bpm);
        if !(bar_duration.is_finite() && bar_duration > 0.0) {
            continue;
        }

        let mut bar_start = segment_start;
        while bar_start < segment_end - BOUNDARY_EPSILON {
            let mut bar_end = (bar_start + bar_duration).min(segment_end);
            // Snap slivers left by float accumulation onto the segment end
            if segment_end - bar_end < BOUNDARY_EPSILON {
                bar_end = segment_end;
            }

            let bar_notes = notes_in_range(&notes, bar_start, bar_end);
            bars.push(Bar::new(bars.len(), time_signature, bar_start, bar_end, bpm, bar_notes));

            bar_start = bar_end;
        }
    }

    log::info!(
        "Extracted {} bars for tenant {} ({} time signature segments, {:.2}s)",
        bars.len(),
        tenant_id,
        signatures.len(),
        track_end
    );

    Ok(bars)
}

/// All non-percussion notes sorted by onset
fn melodic_notes(performance: &Performance) -> Vec<PerformanceNote> {
    let mut notes: Vec<PerformanceNote> = performance
        .melodic_instruments()
        .flat_map(|i| i.notes.iter().copied())
        .collect();
    notes.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec).then(a.pitch.cmp(&b.pitch)));
    notes
}

/// Notes with onset in `[start, end)`, rebased to `start`
fn notes_in_range(sorted: &[PerformanceNote], start: f64, end: f64) -> Vec<Note> {
    // Nudge onsets forward so a note written exactly on a boundary lands in the later bar
    let from = sorted.partition_point(|n| n.start_sec + BOUNDARY_EPSILON < start);
    let to = sorted.partition_point(|n| n.start_sec + BOUNDARY_EPSILON < end);

    sorted[from..to]
        .iter()
        .map(|n| Note::new(n.pitch, n.velocity, n.start_sec - start, n.duration_sec()))
        .collect()
}
