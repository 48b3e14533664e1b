// Tempo Map - Tick <-> second conversion across tempo changes
// Shared by the reader (ticks in, seconds out) and the writer (seconds in, ticks out)

use super::performance::{TempoChange, DEFAULT_BPM};

/// One constant-tempo stretch of the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    tick: u64,
    time_sec: f64,
    us_per_quarter: f64,
}

/// Piecewise-constant tempo map
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
    /// SMPTE timing: a fixed tick length that ignores tempo events
    fixed_seconds_per_tick: Option<f64>,
}

/// Convert BPM to microseconds per quarter note
pub fn bpm_to_us_per_quarter(bpm: f64) -> f64 {
    60_000_000.0 / bpm
}

/// Convert microseconds per quarter note to BPM
pub fn us_per_quarter_to_bpm(us_per_quarter: f64) -> f64 {
    60_000_000.0 / us_per_quarter
}

impl TempoMap {
    /// Build from `(tick, microseconds per quarter)` pairs as found in a file
    pub fn from_ticks(ppq: u16, mut changes: Vec<(u64, u32)>) -> Self {
        let ppq = ppq.max(1);
        changes.sort_by_key(|(tick, _)| *tick);

        let mut segments = vec![TempoSegment {
            tick: 0,
            time_sec: 0.0,
            us_per_quarter: bpm_to_us_per_quarter(DEFAULT_BPM),
        }];

        for (tick, us) in changes {
            if us == 0 {
                continue;
            }
            let time_sec = Self::advance(segments[segments.len() - 1], ppq, tick);
            let segment = TempoSegment {
                tick,
                time_sec,
                us_per_quarter: us as f64,
            };
            // A later event at the same tick replaces the earlier one
            match segments.last_mut() {
                Some(last) if last.tick == tick => *last = segment,
                _ => segments.push(segment),
            }
        }

        TempoMap {
            ppq,
            segments,
            fixed_seconds_per_tick: None,
        }
    }

    /// Build from absolute-time tempo changes (used on export)
    pub fn from_changes(ppq: u16, changes: &[TempoChange]) -> Self {
        let ppq = ppq.max(1);
        let mut sorted: Vec<TempoChange> = changes
            .iter()
            .copied()
            .filter(|c| c.bpm.is_finite() && c.bpm > 0.0)
            .collect();
        sorted.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));

        let first_bpm = sorted.first().map(|c| c.bpm).unwrap_or(DEFAULT_BPM);
        let mut segments = vec![TempoSegment {
            tick: 0,
            time_sec: 0.0,
            us_per_quarter: bpm_to_us_per_quarter(first_bpm),
        }];

        for change in sorted.iter().filter(|c| c.time_sec > 0.0) {
            let prev = segments[segments.len() - 1];
            let sec_per_tick = prev.us_per_quarter / 1_000_000.0 / ppq as f64;
            let tick = prev.tick + ((change.time_sec - prev.time_sec) / sec_per_tick).round() as u64;
            let segment = TempoSegment {
                tick,
                time_sec: change.time_sec,
                us_per_quarter: bpm_to_us_per_quarter(change.bpm),
            };
            match segments.last_mut() {
                Some(last) if last.tick == tick => *last = segment,
                _ => segments.push(segment),
            }
        }

        TempoMap {
            ppq,
            segments,
            fixed_seconds_per_tick: None,
        }
    }

    /// SMPTE timecode timing: `fps * subframes` ticks per second
    pub fn timecode(ticks_per_second: f64) -> Self {
        TempoMap {
            ppq: 1,
            segments: vec![TempoSegment {
                tick: 0,
                time_sec: 0.0,
                us_per_quarter: bpm_to_us_per_quarter(DEFAULT_BPM),
            }],
            fixed_seconds_per_tick: Some(1.0 / ticks_per_second.max(1.0)),
        }
    }

    fn advance(from: TempoSegment, ppq: u16, tick: u64) -> f64 {
        let delta = tick.saturating_sub(from.tick) as f64;
        from.time_sec + delta * from.us_per_quarter / 1_000_000.0 / ppq as f64
    }

    /// Absolute seconds of a tick position
    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        if let Some(spt) = self.fixed_seconds_per_tick {
            return tick as f64 * spt;
        }
        let segment = self
            .segments
            .iter()
            .take_while(|s| s.tick <= tick)
            .last()
            .copied()
            .unwrap_or(self.segments[0]);
        Self::advance(segment, self.ppq, tick)
    }

    /// Nearest tick for an absolute time in seconds
    pub fn seconds_to_tick(&self, time_sec: f64) -> u64 {
        let time_sec = time_sec.max(0.0);
        if let Some(spt) = self.fixed_seconds_per_tick {
            return (time_sec / spt).round() as u64;
        }
        let segment = self
            .segments
            .iter()
            .take_while(|s| s.time_sec <= time_sec + 1e-12)
            .last()
            .copied()
            .unwrap_or(self.segments[0]);
        let sec_per_tick = segment.us_per_quarter / 1_000_000.0 / self.ppq as f64;
        segment.tick + ((time_sec - segment.time_sec) / sec_per_tick).round() as u64
    }

    /// Tempo changes in absolute seconds
    pub fn changes(&self) -> Vec<TempoChange> {
        self.segments
            .iter()
            .map(|s| TempoChange {
                time_sec: s.time_sec,
                bpm: us_per_quarter_to_bpm(s.us_per_quarter),
            })
            .collect()
    }

    /// `(tick, microseconds per quarter)` pairs for the conductor track
    pub fn tick_tempos(&self) -> Vec<(u64, u32)> {
        self.segments
            .iter()
            .map(|s| (s.tick, s.us_per_quarter.round() as u32))
            .collect()
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }
}
