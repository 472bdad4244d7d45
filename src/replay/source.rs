//! Event Sources
//!
//! Trait definitions for the pull side of the pipeline, plus an
//! in-memory source backed by a vector of events.

use anyhow::Result;

use crate::replay::clock::Nanos;

/// Implemented by any value that carries a point-in-time timestamp.
/// The engine never inspects anything else about an event.
pub trait Timestamped {
    /// Trace timestamp of this event.
    fn timestamp(&self) -> Nanos;
}

/// Pull iterator over events in timestamp order.
///
/// The engine polls `next_event` until it returns `Ok(None)` and never
/// polls again after that. A source failure closes the pipeline early
/// and is surfaced to the caller on `wait`.
pub trait EventSource<T: Timestamped>: Send {
    /// Next event from the trace, or `Ok(None)` once exhausted.
    fn next_event(&mut self) -> Result<Option<T>>;

    /// Advisory lower bound for the trace, set once before the first
    /// poll. The engine re-filters, so honoring it is an optimization.
    fn set_start_time(&mut self, _start: Nanos) {}

    /// Advisory upper bound for the trace, set once before the first
    /// poll.
    fn set_end_time(&mut self, _end: Nanos) {}

    /// Source identifier for logging/diagnostics.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// A source backed by an in-memory vector of events.
pub struct VecSource<T> {
    events: Vec<T>,
    index: usize,
    start: Option<Nanos>,
    end: Option<Nanos>,
    name: String,
}

impl<T: Timestamped> VecSource<T> {
    pub fn new(name: impl Into<String>, mut events: Vec<T>) -> Self {
        // Sort by time to ensure correct ordering
        events.sort_by_key(|e| e.timestamp());
        Self {
            events,
            index: 0,
            start: None,
            end: None,
            name: name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<T: Timestamped + Clone + Send> EventSource<T> for VecSource<T> {
    fn next_event(&mut self) -> Result<Option<T>> {
        while let Some(event) = self.events.get(self.index) {
            self.index += 1;
            let ts = event.timestamp();
            if self.start.is_some_and(|start| ts < start) {
                continue;
            }
            if self.end.is_some_and(|end| ts > end) {
                continue;
            }
            return Ok(Some(event.clone()));
        }
        Ok(None)
    }

    fn set_start_time(&mut self, start: Nanos) {
        self.start = Some(start);
    }

    fn set_end_time(&mut self, end: Nanos) {
        self.end = Some(end);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::clock::NANOS_PER_MILLI;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Tick {
        ts: Nanos,
        val: i64,
    }

    impl Timestamped for Tick {
        fn timestamp(&self) -> Nanos {
            self.ts
        }
    }

    #[test]
    fn sorts_events_on_construction() {
        let mut source = VecSource::new(
            "unsorted",
            vec![
                Tick { ts: 30 * NANOS_PER_MILLI, val: 3 },
                Tick { ts: 10 * NANOS_PER_MILLI, val: 1 },
                Tick { ts: 20 * NANOS_PER_MILLI, val: 2 },
            ],
        );
        let mut vals = Vec::new();
        while let Some(event) = source.next_event().unwrap() {
            vals.push(event.val);
        }
        assert_eq!(vals, vec![1, 2, 3]);
    }

    #[test]
    fn bracket_is_inclusive_on_both_ends() {
        let events: Vec<Tick> = (1..=10)
            .map(|i| Tick { ts: i * NANOS_PER_MILLI, val: i })
            .collect();
        let mut source = VecSource::new("bracketed", events);
        source.set_start_time(3 * NANOS_PER_MILLI);
        source.set_end_time(7 * NANOS_PER_MILLI);

        let mut vals = Vec::new();
        while let Some(event) = source.next_event().unwrap() {
            vals.push(event.val);
        }
        assert_eq!(vals, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn stays_exhausted_after_the_last_event() {
        let mut source = VecSource::new("tiny", vec![Tick { ts: 1, val: 1 }]);
        assert!(source.next_event().unwrap().is_some());
        assert!(source.next_event().unwrap().is_none());
        assert!(source.next_event().unwrap().is_none());
    }
}
