//! Replay Time Base
//!
//! Trace timestamps are plain nanoseconds since the Unix epoch so the
//! interval arithmetic in the timer hot loop stays integer math.
//! Helpers bridge to `chrono` for callers whose traces carry RFC3339
//! strings, and to `std::time::Duration` for the wall-clock side.

use std::time::Duration;

/// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
/// i64 gives us ~292 years of range, sufficient for any trace.
pub type Nanos = i64;

/// Conversion constants
pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a `Duration` into signed nanoseconds, saturating at `i64::MAX`.
#[inline]
pub fn duration_to_nanos(d: Duration) -> Nanos {
    Nanos::try_from(d.as_nanos()).unwrap_or(Nanos::MAX)
}

/// Convert signed nanoseconds into a `Duration`; negatives clamp to zero.
#[inline]
pub fn nanos_to_duration(ns: Nanos) -> Duration {
    Duration::from_nanos(ns.max(0) as u64)
}

/// Helper to convert chrono DateTime to Nanos. `None` when the instant
/// falls outside the ~1677..=2262 range an i64 of nanoseconds carries.
#[inline]
pub fn datetime_to_nanos(dt: &chrono::DateTime<chrono::Utc>) -> Option<Nanos> {
    dt.timestamp_nanos_opt()
}

/// Helper to convert Nanos to chrono DateTime. Pre-epoch values split
/// with floored division so the nanosecond part stays in `0..1e9`.
#[inline]
pub fn nanos_to_datetime(nanos: Nanos) -> Option<chrono::DateTime<chrono::Utc>> {
    let secs = nanos.div_euclid(NANOS_PER_SEC);
    let nsecs = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    chrono::DateTime::from_timestamp(secs, nsecs)
}

/// Helper to parse an ISO8601/RFC3339 string to Nanos. `None` on
/// malformed input or an out-of-range instant.
pub fn parse_timestamp(s: &str) -> Option<Nanos> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .and_then(|dt| datetime_to_nanos(&dt.with_timezone(&chrono::Utc)))
}
