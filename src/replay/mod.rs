//! Soft Real-Time Replay Engine
//!
//! Replays a time-ordered event stream into a user sink at simulated
//! wall-clock times, preserving the inter-event gaps of the original
//! trace (optionally compressed by an integer rate divisor).
//!
//! # Architecture
//!
//! ```text
//! Source ──▶ Loader ──▶ [batch queue] ──▶ Timer ──▶ [rendezvous] ──▶ Controller ──▶ Sink
//!              │                            │                            │
//!              └────────── quit ────────────┴──── quit / pause / resume ─┘
//! ```
//!
//! Three activities run per active session:
//!
//! - The **loader** pulls events from the source into fixed-capacity
//!   batches and pushes them through a bounded queue; the queue bound
//!   is the read-ahead limit and the backpressure mechanism.
//! - The **timer** owns the schedule. For each event it sleeps out the
//!   scaled trace gap, corrected by accumulated pause time and by a
//!   drift integrator that absorbs sink latency, then hands the event
//!   over a rendezvous queue.
//! - The **controller** is the only activity that invokes the sink and
//!   the only consumer of control signals. `play` returns once the
//!   controller is up; `wait` blocks until it has exited.
//!
//! Control signals are broadcast one-shots: quit ends the session,
//! pause/resume bracket a window whose wall duration is excluded from
//! the schedule. Reaction latency to any signal is bounded by the
//! timer's sleep chunk (250 ms by default); a sink call in progress
//! always runs to completion first.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod playback;
pub mod sink;
pub mod source;

pub(crate) mod controller;
pub(crate) mod loader;
pub(crate) mod signal;
pub(crate) mod timer;

pub use clock::Nanos;
pub use config::ReplayConfig;
pub use error::ReplayError;
pub use metrics::{EventTiming, TimingSummary};
pub use playback::{Playback, PlaybackControl};
pub use sink::{EventSink, NoopSink};
pub use source::{EventSource, Timestamped, VecSource};

#[cfg(test)]
mod playback_tests;
