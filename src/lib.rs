//! tickreplay
//!
//! Soft real-time replay of time-stamped event streams. Feed the
//! engine a time-ordered trace and a sink; it re-emits each event at
//! its simulated wall-clock time, preserving the trace's inter-event
//! gaps (optionally compressed by an integer rate divisor), with
//! pause/resume/quit control and per-event drift accounting.

pub mod replay;

pub use replay::{
    EventSink, EventSource, EventTiming, Nanos, NoopSink, Playback, PlaybackControl,
    ReplayConfig, ReplayError, Timestamped, TimingSummary, VecSource,
};
