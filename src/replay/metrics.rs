//! Run Timing Records
//!
//! The timer appends one record per released event. `TimingSummary`
//! aggregates them after a run for drift reporting; the controller logs
//! the summary when the session finishes.

use serde::{Deserialize, Serialize};

use crate::replay::clock::{Nanos, NANOS_PER_MILLI};

/// Timing of a single release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventTiming {
    /// Trace timestamp of the event.
    pub event_ts: Nanos,
    /// Sleep the timer computed before this release; negative means the
    /// engine was behind schedule.
    pub slept_for: Nanos,
    /// 1-based release sequence number.
    pub seq: u64,
    /// Deviation of the realized wall gap from the scaled trace gap.
    pub drift: Nanos,
}

/// Aggregate timing for a completed run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimingSummary {
    pub events: u64,
    /// Largest absolute per-event drift.
    pub max_abs_drift: Nanos,
    pub mean_drift: Nanos,
    /// Signed sum of all drifts; the final value of the integrator.
    pub total_drift: Nanos,
}

impl TimingSummary {
    pub fn from_timings(timings: &[EventTiming]) -> Self {
        if timings.is_empty() {
            return Self::default();
        }
        let mut max_abs: Nanos = 0;
        let mut total: Nanos = 0;
        for timing in timings {
            max_abs = max_abs.max(timing.drift.abs());
            total += timing.drift;
        }
        Self {
            events: timings.len() as u64,
            max_abs_drift: max_abs,
            mean_drift: total / timings.len() as i64,
            total_drift: total,
        }
    }

    /// Largest absolute per-event drift, in milliseconds.
    #[inline]
    pub fn max_abs_drift_millis(&self) -> f64 {
        self.max_abs_drift as f64 / NANOS_PER_MILLI as f64
    }
}
