//! Playback Handle
//!
//! Public façade over a replay session: construct with `new`, start
//! with `play`, steer with `pause`/`resume`/`quit`, then `wait` for
//! completion and read the timing records.

use crossbeam::channel::bounded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::replay::clock::{duration_to_nanos, Nanos};
use crate::replay::config::ReplayConfig;
use crate::replay::controller::Controller;
use crate::replay::error::ReplayError;
use crate::replay::metrics::{EventTiming, TimingSummary};
use crate::replay::signal::Controls;
use crate::replay::sink::{EventSink, NoopSink};
use crate::replay::source::{EventSource, Timestamped};

/// State shared between the handle and the session activities.
pub(crate) struct SessionShared {
    pub active: AtomicBool,
    pub paused: AtomicBool,
    pub failure: Mutex<Option<ReplayError>>,
    pub metrics: Mutex<Vec<EventTiming>>,
    pub wall_start: Mutex<Option<Instant>>,
    pub wall_run: Mutex<Option<Duration>>,
}

impl SessionShared {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            failure: Mutex::new(None),
            metrics: Mutex::new(Vec::new()),
            wall_start: Mutex::new(None),
            wall_run: Mutex::new(None),
        }
    }
}

/// Cloneable control surface for a session. A sink that wants to stop
/// the replay holds one of these and calls `quit` from inside the
/// callback; any thread may use it to pause and resume.
#[derive(Clone)]
pub struct PlaybackControl {
    controls: Arc<Controls>,
    shared: Arc<SessionShared>,
    symbol: String,
}

impl PlaybackControl {
    /// Pause the replay. No-op unless the session is active and running.
    pub fn pause(&self) {
        if !self.shared.active.load(Ordering::SeqCst) {
            return;
        }
        if self.shared.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        self.controls.pause_clock.write().started = Some(Instant::now());
        // Fresh resume channel before the pause edge, so an observer
        // that wakes on pause always finds an armed resume.
        self.controls.resume.rearm();
        self.controls.pause.fire();
        debug!(symbol = %self.symbol, "pause signalled");
    }

    /// Resume a paused replay. No-op unless paused.
    pub fn resume(&self) {
        if !self.shared.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        {
            // The accumulator is settled before the resume edge fires,
            // so the timer never recomputes a deadline against a stale
            // pause total.
            let mut clock = self.controls.pause_clock.write();
            if let Some(started) = clock.started.take() {
                clock.total += duration_to_nanos(started.elapsed());
            }
        }
        self.controls.pause.rearm();
        self.controls.resume.fire();
        debug!(symbol = %self.symbol, "resume signalled");
    }

    /// Stop the replay. No-op if the session is not active.
    pub fn quit(&self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.controls.quit.fire();
        debug!(symbol = %self.symbol, "quit signalled");
    }

    /// Whether the session is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Whether the session is currently paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }
}

/// One replay session.
///
/// The session consumes its source and sink on the first `play`;
/// replaying a finished session is not supported.
pub struct Playback<T: Timestamped + Send + 'static> {
    symbol: String,
    sim_start: Nanos,
    sim_end: Nanos,
    rate: u32,
    config: ReplayConfig,
    source: Option<Box<dyn EventSource<T>>>,
    sink: Option<Box<dyn EventSink<T>>>,
    controls: Arc<Controls>,
    shared: Arc<SessionShared>,
    controller: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Timestamped + Send + 'static> std::fmt::Debug for Playback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("symbol", &self.symbol)
            .field("sim_start", &self.sim_start)
            .field("sim_end", &self.sim_end)
            .field("rate", &self.rate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Timestamped + Send + 'static> Playback<T> {
    /// Create a session replaying `source` over the inclusive bracket
    /// `[sim_start, sim_end]` at the given rate. The bracket is handed
    /// to the source before the first poll. Without a sink, events are
    /// discarded on release.
    pub fn new(
        symbol: impl Into<String>,
        sim_start: Nanos,
        sim_end: Nanos,
        source: Option<Box<dyn EventSource<T>>>,
        rate: u32,
        sink: Option<Box<dyn EventSink<T>>>,
    ) -> Result<Self, ReplayError> {
        let mut source = source
            .ok_or_else(|| ReplayError::Configuration("an event source is required".into()))?;
        if rate == 0 {
            return Err(ReplayError::Configuration(
                "rate must be a positive integer".into(),
            ));
        }
        source.set_start_time(sim_start);
        source.set_end_time(sim_end);
        Ok(Self {
            symbol: symbol.into(),
            sim_start,
            sim_end,
            rate,
            config: ReplayConfig::default(),
            source: Some(source),
            sink: Some(sink.unwrap_or_else(|| Box::new(NoopSink))),
            controls: Arc::new(Controls::new()),
            shared: Arc::new(SessionShared::new()),
            controller: Mutex::new(None),
        })
    }

    /// Start the replay. No-op while already active. Returns once the
    /// controller thread has started.
    pub fn play(&mut self) {
        if self
            .shared
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let Some(source) = self.source.take() else {
            self.shared.active.store(false, Ordering::SeqCst);
            warn!(symbol = %self.symbol, "source already consumed; play ignored");
            return;
        };
        let sink = self.sink.take().unwrap_or_else(|| Box::new(NoopSink));

        self.controls.reset();
        self.shared.paused.store(false, Ordering::SeqCst);
        *self.shared.failure.lock() = None;
        self.shared.metrics.lock().clear();
        *self.shared.wall_start.lock() = None;
        *self.shared.wall_run.lock() = None;

        let (started_tx, started_rx) = bounded(1);
        let controller = Controller {
            source,
            sink,
            controls: Arc::clone(&self.controls),
            shared: Arc::clone(&self.shared),
            config: self.config.clone(),
            rate: self.rate,
            sim_start: self.sim_start,
            sim_end: self.sim_end,
            symbol: self.symbol.clone(),
            started_tx,
        };
        *self.controller.lock() = Some(thread::spawn(move || controller.run()));
        let _ = started_rx.recv();
    }

    /// Block until the controller has returned, then surface any source
    /// failure recorded during the run.
    pub fn wait(&self) -> Result<(), ReplayError> {
        let handle = self.controller.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.shared.active.store(false, Ordering::SeqCst);
        match self.shared.failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// See [`PlaybackControl::pause`].
    pub fn pause(&self) {
        self.control().pause();
    }

    /// See [`PlaybackControl::resume`].
    pub fn resume(&self) {
        self.control().resume();
    }

    /// See [`PlaybackControl::quit`].
    pub fn quit(&self) {
        self.control().quit();
    }

    /// Control surface usable from other threads or from inside the
    /// sink callback.
    pub fn control(&self) -> PlaybackControl {
        PlaybackControl {
            controls: Arc::clone(&self.controls),
            shared: Arc::clone(&self.shared),
            symbol: self.symbol.clone(),
        }
    }

    /// Replace the sink. Only meaningful before `play`.
    pub fn set_sink(&mut self, sink: impl EventSink<T> + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Change the rate. Rejected while a replay is active.
    pub fn set_rate(&mut self, rate: u32) -> Result<(), ReplayError> {
        if rate == 0 {
            return Err(ReplayError::Configuration(
                "rate must be a positive integer".into(),
            ));
        }
        if self.shared.active.load(Ordering::SeqCst) {
            return Err(ReplayError::Configuration(
                "rate cannot change while a replay is active".into(),
            ));
        }
        self.rate = rate;
        Ok(())
    }

    /// Replace the tuning knobs. Only meaningful before `play`.
    pub fn set_config(&mut self, config: ReplayConfig) {
        self.config = config;
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn rate(&self) -> u32 {
        self.rate
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Wall instant captured after priming; anchors all wall offsets.
    pub fn wall_start(&self) -> Option<Instant> {
        *self.shared.wall_start.lock()
    }

    /// Total wall duration of the last run.
    pub fn wall_run_duration(&self) -> Option<Duration> {
        *self.shared.wall_run.lock()
    }

    /// Per-event timing records of the last run. Read after `wait`.
    pub fn timings(&self) -> Vec<EventTiming> {
        self.shared.metrics.lock().clone()
    }

    /// Aggregate of the per-event timing records.
    pub fn timing_summary(&self) -> TimingSummary {
        TimingSummary::from_timings(&self.shared.metrics.lock())
    }
}
