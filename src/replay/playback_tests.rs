//! End-to-End Playback Tests
//!
//! Timing assertions use the release-accuracy window the engine is
//! built for (±3 ms on a quiescent host); control-latency assertions
//! allow the documented sleep-chunk bound plus slack.

use super::clock::{Nanos, NANOS_PER_MILLI, NANOS_PER_SEC};
use super::config::ReplayConfig;
use super::error::ReplayError;
use super::playback::Playback;
use super::source::{EventSource, Timestamped, VecSource};

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

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

fn source(events: Vec<Tick>) -> Option<Box<dyn EventSource<Tick>>> {
    Some(Box::new(VecSource::new("trace", events)))
}

/// Short priming so the suite stays fast; wall offsets are measured
/// from the anchor captured after priming, so its length is irrelevant
/// to the assertions.
fn fast_config() -> ReplayConfig {
    ReplayConfig {
        priming_delay: Duration::from_millis(50),
        ..ReplayConfig::default()
    }
}

type Recorded = Arc<Mutex<Vec<(i64, Instant)>>>;

fn recording_sink(recorded: Recorded) -> impl FnMut(Tick) -> Result<()> + Send {
    move |tick: Tick| {
        recorded.lock().push((tick.val, Instant::now()));
        Ok(())
    }
}

fn offset_ms(wall_start: Instant, at: Instant) -> f64 {
    at.duration_since(wall_start).as_secs_f64() * 1e3
}

/// A single event one second into the trace, replayed at 2x, is
/// released 500 ms after the wall anchor.
#[test]
fn single_event_releases_at_half_gap_at_rate_two() {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let event_ts = NANOS_PER_SEC;
    let mut pb = Playback::new(
        "single",
        0,
        event_ts,
        source(vec![Tick { ts: event_ts, val: 6 }]),
        2,
        Some(Box::new(recording_sink(Arc::clone(&recorded)))),
    )
    .unwrap();
    pb.set_config(fast_config());
    pb.play();
    pb.wait().unwrap();

    let wall_start = pb.wall_start().expect("wall start anchored");
    let emits = recorded.lock();
    assert_eq!(emits.len(), 1);
    assert_eq!(emits[0].0, 6);
    let offset = offset_ms(wall_start, emits[0].1);
    assert!(
        (offset - 500.0).abs() <= 3.0,
        "released at {offset:.3} ms, want 500 ± 3"
    );

    let timings = pb.timings();
    assert_eq!(timings.len(), 1);
    assert_eq!(timings[0].seq, 1);
    assert!(timings[0].slept_for > 0);
}

/// Events arrive at the sink in source order, across batch boundaries
/// and through loader backpressure.
#[test]
fn delivers_events_in_source_order_across_batches() {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let events: Vec<Tick> = (1..=120)
        .map(|i| Tick { ts: i * 2 * NANOS_PER_MILLI, val: i })
        .collect();
    let mut pb = Playback::new(
        "ordering",
        0,
        NANOS_PER_SEC,
        source(events),
        8,
        Some(Box::new(recording_sink(Arc::clone(&recorded)))),
    )
    .unwrap();
    pb.set_config(ReplayConfig {
        batch_size: 16,
        queue_len: 2,
        priming_delay: Duration::from_millis(20),
        ..ReplayConfig::default()
    });
    pb.play();
    pb.wait().unwrap();

    let vals: Vec<i64> = recorded.lock().iter().map(|(val, _)| *val).collect();
    assert_eq!(vals, (1..=120).collect::<Vec<i64>>());
    assert_eq!(pb.timing_summary().events, 120);
}

/// A pause during the gap before an event delays that event by the
/// pause length.
#[test]
fn pause_delays_the_next_release_by_the_pause_length() {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let events = vec![
        Tick { ts: 25 * NANOS_PER_MILLI, val: 1 },
        Tick { ts: 425 * NANOS_PER_MILLI, val: 2 },
    ];
    let mut pb = Playback::new(
        "paused",
        0,
        NANOS_PER_SEC,
        source(events),
        1,
        Some(Box::new(recording_sink(Arc::clone(&recorded)))),
    )
    .unwrap();
    pb.set_config(fast_config());
    pb.play();

    while recorded.lock().len() < 1 {
        thread::sleep(Duration::from_millis(2));
    }
    thread::sleep(Duration::from_millis(250));
    let pause_started = Instant::now();
    pb.pause();
    assert!(pb.is_paused());
    thread::sleep(Duration::from_millis(100));
    pb.resume();
    let paused_for_ms = pause_started.elapsed().as_secs_f64() * 1e3;
    assert!(!pb.is_paused());
    pb.wait().unwrap();

    let wall_start = pb.wall_start().unwrap();
    let emits = recorded.lock();
    assert_eq!(emits.len(), 2);
    let second = offset_ms(wall_start, emits[1].1);
    let expected = 425.0 + paused_for_ms;
    assert!(
        (second - expected).abs() <= 3.0,
        "second release at {second:.3} ms, want {expected:.3} ± 3"
    );
}

/// Quit during a multi-minute sleep unblocks `wait` within the sleep
/// chunk bound, and the sink is never invoked.
#[test]
fn quit_interrupts_a_long_sleep_quickly() {
    let sink_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&sink_called);
    let events = vec![Tick { ts: 5_000 * 60 * NANOS_PER_SEC, val: 1 }];
    let mut pb = Playback::new(
        "longsleep",
        0,
        6_000 * 60 * NANOS_PER_SEC,
        source(events),
        1,
        Some(Box::new(move |_tick: Tick| -> Result<()> {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })),
    )
    .unwrap();
    pb.set_config(fast_config());
    pb.play();

    thread::sleep(Duration::from_millis(200));
    let quit_at = Instant::now();
    pb.quit();
    pb.wait().unwrap();

    assert!(
        quit_at.elapsed() <= Duration::from_millis(450),
        "wait took {:?} after quit",
        quit_at.elapsed()
    );
    assert!(!sink_called.load(Ordering::SeqCst));
}

/// Events sharing a timestamp are released back to back without a
/// sleep between them.
#[test]
fn equal_timestamps_release_back_to_back() {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let events = vec![
        Tick { ts: 20 * NANOS_PER_MILLI, val: 1 },
        Tick { ts: 20 * NANOS_PER_MILLI, val: 2 },
        Tick { ts: 20 * NANOS_PER_MILLI, val: 3 },
        Tick { ts: 60 * NANOS_PER_MILLI, val: 4 },
    ];
    let mut pb = Playback::new(
        "burst",
        0,
        NANOS_PER_SEC,
        source(events),
        1,
        Some(Box::new(recording_sink(Arc::clone(&recorded)))),
    )
    .unwrap();
    pb.set_config(fast_config());
    pb.play();
    pb.wait().unwrap();

    let vals: Vec<i64> = recorded.lock().iter().map(|(val, _)| *val).collect();
    assert_eq!(vals, vec![1, 2, 3, 4]);

    let timings = pb.timings();
    assert_eq!(timings.len(), 4);
    assert_eq!(timings[1].slept_for, 0);
    assert_eq!(timings[2].slept_for, 0);
    assert!(timings[3].slept_for > 0);
}

/// play while active, pause while paused, resume while running and
/// quit while inactive are all no-ops.
#[test]
fn control_calls_are_idempotent() {
    let events = vec![Tick { ts: 10 * NANOS_PER_MILLI, val: 1 }];
    let mut pb = Playback::new("idem", 0, NANOS_PER_SEC, source(events), 1, None).unwrap();
    pb.set_config(fast_config());

    // Inactive session: every control call is a no-op.
    pb.pause();
    assert!(!pb.is_paused());
    pb.resume();
    pb.quit();

    pb.play();
    assert!(pb.is_active());
    pb.play();
    assert!(pb.is_active());

    pb.pause();
    pb.pause();
    assert!(pb.is_paused());
    pb.resume();
    pb.resume();
    assert!(!pb.is_paused());

    pb.wait().unwrap();
    assert!(!pb.is_active());
    pb.quit();
}

/// The sink stops the replay by calling quit on the control surface;
/// no further events are delivered afterwards.
#[test]
fn sink_can_stop_the_replay_via_control() {
    let events: Vec<Tick> = (1..=50)
        .map(|i| Tick { ts: i * 5 * NANOS_PER_MILLI, val: i })
        .collect();
    let mut pb = Playback::new("sinkstop", 0, NANOS_PER_SEC, source(events), 1, None).unwrap();
    pb.set_config(fast_config());

    let control = pb.control();
    let seen = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&seen);
    pb.set_sink(move |_tick: Tick| -> Result<()> {
        let mut count = counter.lock();
        *count += 1;
        if *count == 3 {
            control.quit();
        }
        Ok(())
    });

    pb.play();
    pb.wait().unwrap();
    assert_eq!(*seen.lock(), 3);
}

struct FailingSource {
    polls: i64,
}

impl EventSource<Tick> for FailingSource {
    fn next_event(&mut self) -> Result<Option<Tick>> {
        self.polls += 1;
        if self.polls < 3 {
            Ok(Some(Tick { ts: self.polls * NANOS_PER_MILLI, val: self.polls }))
        } else {
            Err(anyhow::anyhow!("tape unreadable"))
        }
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A mid-trace source failure closes the pipeline and surfaces on
/// `wait` as a source error.
#[test]
fn source_failure_surfaces_on_wait() {
    let mut pb = Playback::new(
        "failing",
        0,
        NANOS_PER_SEC,
        Some(Box::new(FailingSource { polls: 0 })),
        1,
        None,
    )
    .unwrap();
    pb.set_config(fast_config());
    pb.play();

    let err = pb.wait().unwrap_err();
    assert!(matches!(err, ReplayError::Source(_)));
    assert!(err.to_string().contains("tape unreadable"));
}

#[test]
fn missing_source_is_a_configuration_error() {
    let err = Playback::<Tick>::new("x", 0, 0, None, 2, None).unwrap_err();
    assert!(matches!(err, ReplayError::Configuration(_)));
    assert!(err.to_string().starts_with("configuration:"));
}

#[test]
fn zero_rate_is_a_configuration_error() {
    let err = Playback::new("x", 0, 0, source(Vec::new()), 0, None).unwrap_err();
    assert!(matches!(err, ReplayError::Configuration(_)));

    let mut pb = Playback::new("x", 0, 0, source(Vec::new()), 1, None).unwrap();
    assert!(pb.set_rate(0).is_err());
    assert!(pb.set_rate(4).is_ok());
    assert_eq!(pb.rate(), 4);
}

/// A four-minute trace gap at rate 2 is a two-minute wall gap.
#[test]
fn rate_divides_trace_gaps() {
    let four_minutes: Nanos = 4 * 60 * NANOS_PER_SEC;
    assert_eq!(four_minutes / 2, 2 * 60 * NANOS_PER_SEC);
}
