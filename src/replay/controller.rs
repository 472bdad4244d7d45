//! Replay Controller
//!
//! Owns one replay run: spawns the loader, primes the read-ahead
//! queue, anchors wall time, spawns the timer, then services the
//! select loop over timed events and control signals. It is the only
//! activity that invokes the user sink, so sink calls never overlap.

use crossbeam::channel::{bounded, Sender};
use crossbeam::select;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::replay::clock::{duration_to_nanos, Nanos};
use crate::replay::config::ReplayConfig;
use crate::replay::loader::Loader;
use crate::replay::metrics::TimingSummary;
use crate::replay::playback::SessionShared;
use crate::replay::signal::Controls;
use crate::replay::sink::EventSink;
use crate::replay::source::{EventSource, Timestamped};
use crate::replay::timer::Timer;

pub(crate) struct Controller<T: Timestamped + Send + 'static> {
    pub source: Box<dyn EventSource<T>>,
    pub sink: Box<dyn EventSink<T>>,
    pub controls: Arc<Controls>,
    pub shared: Arc<SessionShared>,
    pub config: ReplayConfig,
    pub rate: u32,
    pub sim_start: Nanos,
    pub sim_end: Nanos,
    pub symbol: String,
    pub started_tx: Sender<()>,
}

impl<T: Timestamped + Send + 'static> Controller<T> {
    pub fn run(self) {
        let Controller {
            source,
            mut sink,
            controls,
            shared,
            config,
            rate,
            sim_start,
            sim_end,
            symbol,
            started_tx,
        } = self;

        let quit_rx = controls.quit.watch();
        let (batch_tx, batch_rx) = bounded(config.queue_len);
        // Rendezvous queue: the timer hands over one event at a time,
        // so sink latency backs up into its drift measurement.
        let (emit_tx, emit_rx) = bounded(0);

        let loader = Loader {
            source,
            batch_tx,
            controls: Arc::clone(&controls),
            shared: Arc::clone(&shared),
            batch_size: config.batch_size,
            sim_start,
            sim_end,
        };
        let loader_handle = thread::spawn(move || loader.run());

        // Unblock `play` before the priming wait begins.
        let _ = started_tx.send(());

        // Let the loader fill the batch queue before wall time is
        // anchored, so a slow source does not show up as early drift.
        let primed = select! {
            recv(quit_rx) -> _ => false,
            default(config.priming_delay) => true,
        };

        let mut timer_handle = None;
        let mut wall_start = None;
        if primed {
            let anchor = Instant::now();
            *shared.wall_start.lock() = Some(anchor);
            wall_start = Some(anchor);

            let timer = Timer {
                batch_rx,
                emit_tx,
                controls: Arc::clone(&controls),
                shared: Arc::clone(&shared),
                sim_start,
                rate,
                wall_start: anchor,
                max_sleep_chunk: duration_to_nanos(config.max_sleep_chunk),
            };
            timer_handle = Some(thread::spawn(move || timer.run()));
            info!(symbol = %symbol, rate, "replay started");

            loop {
                // Re-fetched every pass: the pause gate re-arms after
                // each pause/resume cycle.
                let pause_rx = controls.pause.watch();
                select! {
                    recv(emit_rx) -> msg => match msg {
                        Ok(event) => {
                            if controls.quit.fired() {
                                break;
                            }
                            // A pause edge can land while the timer is
                            // already handing this event over; hold it
                            // until resume so no delivery begins paused.
                            if controls.pause.fired() {
                                debug!(symbol = %symbol, "replay paused");
                                let resume_rx = controls.resume.watch();
                                select! {
                                    recv(resume_rx) -> _ => debug!(symbol = %symbol, "replay resumed"),
                                    recv(quit_rx) -> _ => break,
                                }
                            }
                            if let Err(err) = sink.on_event(event) {
                                warn!(
                                    symbol = %symbol,
                                    error = %err,
                                    "sink returned an error; replay continues"
                                );
                            }
                        }
                        // Timer closed the queue: natural end of run.
                        Err(_) => break,
                    },
                    recv(quit_rx) -> _ => break,
                    recv(pause_rx) -> _ => {
                        debug!(symbol = %symbol, "replay paused");
                        let resume_rx = controls.resume.watch();
                        select! {
                            recv(resume_rx) -> _ => debug!(symbol = %symbol, "replay resumed"),
                            recv(quit_rx) -> _ => break,
                        }
                    }
                }
            }
        }

        let _ = loader_handle.join();
        if let Some(handle) = timer_handle {
            let _ = handle.join();
        }

        let run_dur = wall_start.map(|anchor| anchor.elapsed()).unwrap_or(Duration::ZERO);
        *shared.wall_run.lock() = Some(run_dur);
        let summary = TimingSummary::from_timings(&shared.metrics.lock());
        info!(
            symbol = %symbol,
            events = summary.events,
            run_secs = run_dur.as_secs_f64(),
            max_drift_ms = summary.max_abs_drift_millis(),
            "replay finished"
        );
        shared.paused.store(false, Ordering::SeqCst);
        shared.active.store(false, Ordering::SeqCst);
    }
}
