//! Delta computation over monotonic counters.
//!
//! Counters only make sense as differences between two reads. This module
//! turns successive reads into:
//! - a busy percentage from a `(total, busy)` tick pair ([`DeltaTracker`]),
//! - an events-per-second rate from a single counter ([`RateTracker`]).
//!
//! A regression in any counter (wraparound, reboot, hot-unplug) discards
//! the interval and restarts from the new reading.

use std::time::Instant;

// ---------------------------------------------------------------------------
// Percentage of a counter pair
// ---------------------------------------------------------------------------

/// Last observed counter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub previous_total: u64,
    pub previous_part: u64,
}

/// Feeds one `(total, part)` observation into `state`.
///
/// Returns `100 * Δpart / Δtotal`, or `None` when there is no usable
/// interval: the first observation, or any counter going backwards. A stalled
/// total yields `Some(0.0)`. `state` always ends up holding this observation.
pub fn observe_counters(state: &mut Option<CounterState>, total: u64, part: u64) -> Option<f64> {
    let previous = state.replace(CounterState {
        previous_total: total,
        previous_part: part,
    })?;

    if total < previous.previous_total || part < previous.previous_part {
        return None;
    }
    let d_total = total - previous.previous_total;
    if d_total == 0 {
        return Some(0.0);
    }
    let d_part = part - previous.previous_part;
    Some((100.0 * d_part as f64 / d_total as f64).clamp(0.0, 100.0))
}

/// Owns the counter state for one percentage stream.
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    state: Option<CounterState>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`observe_counters`].
    pub fn observe(&mut self, total: u64, part: u64) -> Option<f64> {
        observe_counters(&mut self.state, total, part)
    }

    /// Forgets the baseline; the next observation yields `None`.
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn state(&self) -> Option<CounterState> {
        self.state
    }
}

// ---------------------------------------------------------------------------
// Per-second rate of a single counter
// ---------------------------------------------------------------------------

/// Converts a monotonic event counter into events per second.
#[derive(Debug, Clone, Default)]
pub struct RateTracker {
    previous: Option<(u64, Instant)>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` read at `at` and returns the rate since the previous
    /// call.
    ///
    /// `None` on the first call and whenever the counter or the clock went
    /// backwards. Zero elapsed time yields `Some(0.0)`.
    pub fn observe(&mut self, count: u64, at: Instant) -> Option<f64> {
        let (prev_count, prev_at) = self.previous.replace((count, at))?;

        if count < prev_count || at < prev_at {
            return None;
        }
        let dt = at.duration_since(prev_at).as_secs_f64();
        if dt == 0.0 {
            return Some(0.0);
        }
        Some((count - prev_count) as f64 / dt)
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
