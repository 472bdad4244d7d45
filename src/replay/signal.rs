//! Control Signals
//!
//! One-shot broadcast primitives for the replay control plane. A gate
//! fires by dropping the sender of a zero-capacity channel: every
//! receiver clone observes the disconnect at its next wait, so one
//! fire reaches any number of activities at once. Pause and resume
//! re-arm with a fresh channel after each edge, which keeps consecutive
//! edges distinguishable.

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::time::Instant;

use crate::replay::clock::Nanos;

/// Broadcast one-shot. `fire` is idempotent; `rearm` installs a fresh
/// channel for the next edge.
pub(crate) struct Gate {
    tx: Mutex<Option<Sender<()>>>,
    rx: Mutex<Receiver<()>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    /// Fire the signal, waking every receiver.
    pub fn fire(&self) {
        self.tx.lock().take();
    }

    /// Install a fresh channel so the next edge is observable again.
    pub fn rearm(&self) {
        let (tx, rx) = bounded(0);
        *self.tx.lock() = Some(tx);
        *self.rx.lock() = rx;
    }

    /// Receiver for the current edge. Disconnects when the gate fires.
    /// Callers re-fetch this inside their loops: a receiver taken
    /// before a re-arm refers to a spent edge.
    pub fn watch(&self) -> Receiver<()> {
        self.rx.lock().clone()
    }

    /// Whether the current edge has fired.
    pub fn fired(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Wall time spent paused. The handle writes on pause/resume edges,
/// the timer reads it when recomputing deadlines.
pub(crate) struct PauseClock {
    /// Total completed pause time for the session.
    pub total: Nanos,
    /// Instant the in-progress pause began, if paused.
    pub started: Option<Instant>,
}

/// Control plane shared by the handle and the three activities.
pub(crate) struct Controls {
    pub quit: Gate,
    pub pause: Gate,
    pub resume: Gate,
    pub pause_clock: RwLock<PauseClock>,
}

impl Controls {
    pub fn new() -> Self {
        Self {
            quit: Gate::new(),
            pause: Gate::new(),
            resume: Gate::new(),
            pause_clock: RwLock::new(PauseClock {
                total: 0,
                started: None,
            }),
        }
    }

    /// Fresh channels and a zeroed pause clock for a new run.
    pub fn reset(&self) {
        self.quit.rearm();
        self.pause.rearm();
        self.resume.rearm();
        *self.pause_clock.write() = PauseClock {
            total: 0,
            started: None,
        };
    }

    /// Completed pause time so far.
    pub fn paused_total(&self) -> Nanos {
        self.pause_clock.read().total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::TryRecvError;
    use std::thread;

    #[test]
    fn armed_gate_blocks_and_fired_gate_wakes() {
        let gate = Gate::new();
        let rx = gate.watch();
        assert!(!gate.fired());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        gate.fire();
        assert!(gate.fired());
        // The receiver taken before the fire observes it too.
        assert!(rx.recv().is_err());
        // Firing twice is a no-op.
        gate.fire();
    }

    #[test]
    fn rearm_makes_the_next_edge_distinguishable() {
        let gate = Gate::new();
        gate.fire();
        assert!(gate.fired());

        gate.rearm();
        assert!(!gate.fired());
        assert!(matches!(gate.watch().try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn fire_wakes_a_blocked_watcher() {
        let gate = std::sync::Arc::new(Gate::new());
        let watcher = {
            let gate = gate.clone();
            thread::spawn(move || gate.watch().recv().is_err())
        };
        gate.fire();
        assert!(watcher.join().unwrap());
    }
}
