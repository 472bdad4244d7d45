//! Trace Loader
//!
//! Reads events from the source into fixed-capacity batches and hands
//! them to the timer through the bounded batch queue. The bounded queue
//! is the flow-control mechanism: the loader runs ahead of the timer by
//! at most `queue_len * batch_size` events.

use crossbeam::channel::Sender;
use crossbeam::select;
use std::mem;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::replay::clock::Nanos;
use crate::replay::error::ReplayError;
use crate::replay::playback::SessionShared;
use crate::replay::signal::Controls;
use crate::replay::source::{EventSource, Timestamped};

pub(crate) struct Loader<T: Timestamped> {
    pub source: Box<dyn EventSource<T>>,
    pub batch_tx: Sender<Vec<T>>,
    pub controls: Arc<Controls>,
    pub shared: Arc<SessionShared>,
    pub batch_size: usize,
    pub sim_start: Nanos,
    pub sim_end: Nanos,
}

impl<T: Timestamped> Loader<T> {
    /// Run until the source is exhausted, it fails, or quit fires.
    /// Every exit path closes the batch queue by dropping the sender.
    pub fn run(mut self) {
        let quit_rx = self.controls.quit.watch();
        let mut buf: Vec<T> = Vec::with_capacity(self.batch_size);
        let mut loaded: u64 = 0;
        let mut skipped: u64 = 0;

        loop {
            // Quit is checked between successive source polls; a source
            // that blocks inside next_event cannot be interrupted.
            if self.controls.quit.fired() {
                return;
            }
            match self.source.next_event() {
                Ok(Some(event)) => {
                    // The bracket handed to the source is advisory, so
                    // out-of-bracket events are dropped here.
                    let ts = event.timestamp();
                    if ts < self.sim_start || ts > self.sim_end {
                        skipped += 1;
                        continue;
                    }
                    buf.push(event);
                    loaded += 1;
                    if buf.len() == self.batch_size {
                        let full = mem::replace(&mut buf, Vec::with_capacity(self.batch_size));
                        select! {
                            send(self.batch_tx, full) -> res => {
                                if res.is_err() {
                                    return;
                                }
                            }
                            recv(quit_rx) -> _ => return,
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(
                        source = self.source.name(),
                        error = %err,
                        "source failed; closing batch queue"
                    );
                    *self.shared.failure.lock() = Some(ReplayError::Source(err));
                    return;
                }
            }
        }

        // Source exhausted: flush the partial batch.
        if !buf.is_empty() {
            select! {
                send(self.batch_tx, buf) -> _ => {}
                recv(quit_rx) -> _ => return,
            }
        }
        debug!(source = self.source.name(), loaded, skipped, "source exhausted");
    }
}
