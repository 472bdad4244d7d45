//! Release Timer
//!
//! Drains batches from the loader and releases each event to the
//! controller at its simulated wall-clock instant. The schedule is
//! relative: each event's target is the scaled trace gap from the
//! previous release, corrected by accumulated pause time and by a
//! running drift integrator that absorbs sink latency.

use crossbeam::channel::{Receiver, Sender};
use crossbeam::select;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::replay::clock::{duration_to_nanos, nanos_to_duration, Nanos};
use crate::replay::metrics::EventTiming;
use crate::replay::playback::SessionShared;
use crate::replay::signal::Controls;
use crate::replay::source::Timestamped;

pub(crate) struct Timer<T: Timestamped> {
    pub batch_rx: Receiver<Vec<T>>,
    pub emit_tx: Sender<T>,
    pub controls: Arc<Controls>,
    pub shared: Arc<SessionShared>,
    pub sim_start: Nanos,
    pub rate: u32,
    pub wall_start: Instant,
    pub max_sleep_chunk: Nanos,
}

impl<T: Timestamped> Timer<T> {
    /// Run until the batch queue closes or quit fires. Every exit path
    /// closes the timed-event queue by dropping its sender.
    pub fn run(self) {
        debug_assert!(self.rate >= 1, "rate must be positive");
        let quit_rx = self.controls.quit.watch();
        let rate = Nanos::from(self.rate);
        let mut prev_ts = self.sim_start;
        let mut prev_wall = self.wall_start;
        let mut pause_base = self.controls.paused_total();
        let mut drift: Nanos = 0;
        let mut seq: u64 = 0;

        loop {
            let batch = select! {
                recv(self.batch_rx) -> msg => match msg {
                    Ok(batch) => batch,
                    // Loader closed the queue and everything buffered
                    // has been drained: natural end of the run.
                    Err(_) => break,
                },
                recv(quit_rx) -> _ => return,
            };

            for event in batch {
                let ts = event.timestamp();
                // Scaled gap between this event and the previous release.
                let interval = (ts - prev_ts) / rate;
                let mut slept_for: Option<Nanos> = None;

                if ts != prev_ts {
                    loop {
                        let pause_adj = self.controls.paused_total() - pause_base;
                        let elapsed = duration_to_nanos(prev_wall.elapsed()) - pause_adj;
                        let sleep = interval - elapsed - drift;
                        if slept_for.is_none() {
                            slept_for = Some(sleep);
                        }
                        if sleep <= 0 {
                            // Behind schedule: release immediately.
                            break;
                        }
                        // Never sleep past the chunk bound, so quit and
                        // pause stay observable during long gaps.
                        let chunk = sleep.min(self.max_sleep_chunk);
                        let pause_rx = self.controls.pause.watch();
                        select! {
                            recv(quit_rx) -> _ => return,
                            recv(pause_rx) -> _ => {
                                if !self.block_until_resume(&quit_rx) {
                                    return;
                                }
                            }
                            default(nanos_to_duration(chunk)) => {}
                        }
                    }
                } else if self.controls.pause.fired() && !self.block_until_resume(&quit_rx) {
                    // Events sharing a timestamp skip the sleep, but the
                    // pause signal is still observed between releases.
                    return;
                }

                select! {
                    send(self.emit_tx, event) -> res => {
                        if res.is_err() {
                            return;
                        }
                    }
                    recv(quit_rx) -> _ => return,
                }

                let now = Instant::now();
                seq += 1;
                let pause_total = self.controls.paused_total();
                let wall_gap = duration_to_nanos(now - prev_wall) - (pause_total - pause_base);
                let drift_dur = wall_gap - interval;
                // Positive drift means the sink ran long: shorten future
                // sleeps. Negative means early: lengthen them.
                drift += drift_dur;
                self.shared.metrics.lock().push(EventTiming {
                    event_ts: ts,
                    slept_for: slept_for.unwrap_or(0),
                    seq,
                    drift: drift_dur,
                });
                prev_ts = ts;
                prev_wall = now;
                pause_base = pause_total;
            }
        }

        debug!(events = seq, "timer drained; closing timed-event queue");
    }

    /// Block until resume fires. Returns false on quit.
    fn block_until_resume(&self, quit_rx: &Receiver<()>) -> bool {
        let resume_rx = self.controls.resume.watch();
        select! {
            recv(resume_rx) -> _ => true,
            recv(quit_rx) -> _ => false,
        }
    }
}
