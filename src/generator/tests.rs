use std::collections::{HashSet, VecDeque};
use std::{sync, thread};

use super::*;
use crate::config::DEFAULT_EPOCH_MS;

const EPOCH: u64 = DEFAULT_EPOCH_MS;

/// Clock that never advances.
#[derive(Debug)]
struct FixedClock(u64);

impl TimeSource for FixedClock {
    fn unix_ts_ms(&mut self) -> u64 {
        self.0
    }
}

/// Clock that replays prepared readings and then repeats the last one.
#[derive(Debug)]
struct ScriptedClock(VecDeque<u64>);

impl ScriptedClock {
    fn new(readings: &[u64]) -> Self {
        Self(readings.iter().copied().collect())
    }
}

impl TimeSource for ScriptedClock {
    fn unix_ts_ms(&mut self) -> u64 {
        if self.0.len() > 1 {
            self.0.pop_front().unwrap()
        } else {
            self.0[0]
        }
    }
}

/// Clock that stays at `ts` for `hold` readings and then moves to the next millisecond.
#[derive(Debug)]
struct HoldingClock {
    ts: u64,
    hold: usize,
    reads: usize,
}

impl TimeSource for HoldingClock {
    fn unix_ts_ms(&mut self) -> u64 {
        self.reads += 1;
        if self.reads <= self.hold {
            self.ts
        } else {
            self.ts + 1
        }
    }
}

fn generator_with<T: TimeSource>(config: Config, time_source: T) -> Generator<T> {
    Generator::with_time_source(config, time_source).unwrap()
}

/// Packs the documented example into the exact expected value
#[test]
fn packs_documented_example_into_exact_expected_value() {
    let g = generator_with(Config::new(10, 2), FixedClock(1_609_430_400_005));
    let id = g.next_id().unwrap();
    assert_eq!(u64::from(id), 22_061_056);
    assert_eq!(id.timestamp_offset(), 5);
    assert_eq!(id.datacenter_id(), 2);
    assert_eq!(id.node_id(), 10);
    assert_eq!(id.sequence(), 0);
    assert_eq!(id.unix_ts_ms(g.epoch_ms()), 1_609_430_400_005);
}

/// Rejects identifiers just above field maximums
#[test]
fn rejects_identifiers_just_above_field_maximums() {
    assert_eq!(
        Generator::new(128, 0).unwrap_err(),
        ConfigError::NodeIdOutOfRange(128)
    );
    assert_eq!(
        Generator::new(0, 8).unwrap_err(),
        ConfigError::DatacenterIdOutOfRange(8)
    );

    let g = Generator::new(127, 7).unwrap();
    assert_eq!((g.node_id(), g.datacenter_id()), (127, 7));
    assert_eq!(g.config(), Config::new(127, 7));
}

/// Increments sequence by one within the same millisecond
#[test]
fn increments_sequence_by_one_within_the_same_millisecond() {
    let g = generator_with(Config::new(3, 1), FixedClock(EPOCH + 42));
    let mut prev = g.next_id().unwrap();
    assert_eq!(prev.sequence(), 0);
    for i in 1..=MAX_SEQUENCE {
        let curr = g.next_id().unwrap();
        assert!(prev < curr);
        assert_eq!(curr.sequence(), i);
        assert_eq!(curr.timestamp_offset(), 42);
        assert_eq!(curr.datacenter_id(), 1);
        assert_eq!(curr.node_id(), 3);
        prev = curr;
    }
}

/// Waits for next millisecond when sequence is exhausted
#[test]
fn waits_for_next_millisecond_when_sequence_is_exhausted() {
    let clock = HoldingClock {
        ts: EPOCH + 1_000,
        hold: 4096 + 16,
        reads: 0,
    };
    let g = generator_with(Config::new(10, 2), clock);

    let ids = g.iter().take(4096).collect::<Result<Vec<_>, _>>().unwrap();
    assert!(ids.iter().all(|e| e.timestamp_offset() == 1_000));
    assert_eq!(ids[4095].sequence(), MAX_SEQUENCE);

    let next = g.next_id().unwrap();
    assert_eq!(next.sequence(), 0);
    assert_eq!(next.timestamp_offset(), 1_001);
    assert!(next > ids[4095]);
    // the exhausted call kept polling the clock until it moved on
    assert!(g.state.lock().time_source.reads > 4096 + 16);
}

/// Resets sequence when clock advances
#[test]
fn resets_sequence_when_clock_advances() {
    let g = generator_with(
        Config::new(0, 0),
        ScriptedClock::new(&[EPOCH + 10, EPOCH + 10, EPOCH + 10, EPOCH + 11]),
    );
    assert_eq!(g.next_id().unwrap().sequence(), 0);
    assert_eq!(g.next_id().unwrap().sequence(), 1);
    assert_eq!(g.next_id().unwrap().sequence(), 2);
    let e = g.next_id().unwrap();
    assert_eq!((e.timestamp_offset(), e.sequence()), (11, 0));
}

/// Returns error if clock moves backwards under fail policy
#[test]
fn returns_error_if_clock_moves_backwards_under_fail_policy() {
    let g = generator_with(
        Config::new(1, 1),
        ScriptedClock::new(&[EPOCH + 1_000, EPOCH + 990, EPOCH + 1_001]),
    );
    let first = g.next_id().unwrap();
    assert_eq!(
        g.next_id(),
        Err(Error::ClockRegression {
            last_ts_ms: EPOCH + 1_000,
            unix_ts_ms: EPOCH + 990,
        })
    );

    let third = g.next_id().unwrap();
    assert!(first < third);
    assert_eq!((third.timestamp_offset(), third.sequence()), (1_001, 0));
}

/// Waits out small clock rollback under wait policy
#[test]
fn waits_out_small_clock_rollback_under_wait_policy() {
    let config = Config::new(1, 1)
        .with_clock_regression(ClockRegressionPolicy::Wait { tolerance_ms: 20 });
    let g = generator_with(
        config,
        ScriptedClock::new(&[EPOCH + 1_000, EPOCH + 990, EPOCH + 995, EPOCH + 1_000]),
    );
    let first = g.next_id().unwrap();
    let second = g.next_id().unwrap();
    assert!(first < second);
    assert_eq!((second.timestamp_offset(), second.sequence()), (1_000, 1));
}

/// Returns error if clock rollback exceeds tolerance
#[test]
fn returns_error_if_clock_rollback_exceeds_tolerance() {
    let config = Config::new(1, 1)
        .with_clock_regression(ClockRegressionPolicy::Wait { tolerance_ms: 20 });
    let g = generator_with(config, ScriptedClock::new(&[EPOCH + 1_000, EPOCH + 979]));
    g.next_id().unwrap();
    assert_eq!(
        g.next_id(),
        Err(Error::ClockRegression {
            last_ts_ms: EPOCH + 1_000,
            unix_ts_ms: EPOCH + 979,
        })
    );
}

/// Returns error when timestamp exceeds epoch range
#[test]
fn returns_error_when_timestamp_exceeds_epoch_range() {
    let g = generator_with(Config::new(0, 0), FixedClock(EPOCH + MAX_TIMESTAMP_OFFSET));
    assert_eq!(g.next_id().unwrap().timestamp_offset(), MAX_TIMESTAMP_OFFSET);

    let g = generator_with(
        Config::new(0, 0),
        FixedClock(EPOCH + MAX_TIMESTAMP_OFFSET + 1),
    );
    for _ in 0..3 {
        assert_eq!(
            g.next_id(),
            Err(Error::EpochOverflow {
                unix_ts_ms: EPOCH + MAX_TIMESTAMP_OFFSET + 1,
                epoch_ms: EPOCH,
            })
        );
    }
}

/// Returns error when clock precedes epoch
#[test]
fn returns_error_when_clock_precedes_epoch() {
    let g = generator_with(Config::new(0, 0), FixedClock(EPOCH - 1));
    assert_eq!(
        g.next_id(),
        Err(Error::BeforeEpoch {
            unix_ts_ms: EPOCH - 1,
            epoch_ms: EPOCH,
        })
    );
}

/// Honors custom epoch
#[test]
fn honors_custom_epoch() {
    let epoch = 1_704_067_200_000;
    let g = generator_with(
        Config::new(0, 0).with_epoch_ms(epoch),
        FixedClock(epoch + 7),
    );
    let e = g.next_id().unwrap();
    assert_eq!(e.timestamp_offset(), 7);
    assert_eq!(e.unix_ts_ms(epoch), epoch + 7);
}

/// Encodes up-to-date timestamp
#[test]
fn encodes_up_to_date_timestamp() {
    use std::time;
    let g = Generator::new(5, 3).unwrap();
    for _ in 0..10_000 {
        let ts_now = time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .expect("clock may have gone backwards")
            .as_millis() as u64;
        let e = g.next_id().unwrap();
        assert!(e.unix_ts_ms(g.epoch_ms()).abs_diff(ts_now) < 16);
        assert_eq!((e.node_id(), e.datacenter_id()), (5, 3));
    }
}

/// Generates no duplicate IDs under multithreading
#[test]
fn generates_no_duplicate_ids_under_multithreading() -> Result<(), Box<dyn std::error::Error>> {
    const N_THREADS: usize = 4;
    const N_PER_THREAD: usize = 10_000;

    let g = sync::Arc::new(Generator::new(10, 2)?);
    let (tx, rx) = sync::mpsc::channel();
    for _ in 0..N_THREADS {
        let g = sync::Arc::clone(&g);
        let tx = tx.clone();
        thread::Builder::new()
            .spawn(move || {
                let mut prev = Id::MIN;
                for _ in 0..N_PER_THREAD {
                    let e = g.next_id().unwrap();
                    assert!(prev < e);
                    prev = e;
                    tx.send(e).unwrap();
                }
            })
            .map_err(|err| format!("failed to spawn thread: {:?}", err))?;
    }
    drop(tx);

    let mut s = HashSet::new();
    while let Ok(e) = rx.recv() {
        s.insert(e);
    }

    assert_eq!(s.len(), N_THREADS * N_PER_THREAD);
    Ok(())
}

/// Writer that collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogCapture(sync::Arc<sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber installed on the current thread and returns what it logged.
fn capture_logs(f: impl FnOnce()) -> String {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = capture.0.lock().unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn find_line<'a>(logs: &'a str, message: &str) -> &'a str {
    logs.lines()
        .find(|line| line.contains(message))
        .unwrap_or_else(|| panic!("no {:?} event in {:?}", message, logs))
}

/// Reports clock regression as warning
#[test]
fn reports_clock_regression_as_warning() {
    let logs = capture_logs(|| {
        let g = generator_with(
            Config::new(1, 1),
            ScriptedClock::new(&[EPOCH + 1_000, EPOCH + 990]),
        );
        g.next_id().unwrap();
        assert!(matches!(g.next_id(), Err(Error::ClockRegression { .. })));
    });
    let line = find_line(&logs, "clock moved backwards");
    assert!(line.contains("WARN"), "{:?}", line);
    assert!(line.contains(&format!("last_ts_ms={}", EPOCH + 1_000)), "{:?}", line);
}

/// Reports epoch overflow and clock before epoch as errors
#[test]
fn reports_epoch_overflow_and_clock_before_epoch_as_errors() {
    let logs = capture_logs(|| {
        let g = generator_with(
            Config::new(0, 0),
            FixedClock(EPOCH + MAX_TIMESTAMP_OFFSET + 1),
        );
        assert!(matches!(g.next_id(), Err(Error::EpochOverflow { .. })));
    });
    let line = find_line(&logs, "timestamp exceeds the range of epoch");
    assert!(line.contains("ERROR"), "{:?}", line);

    let logs = capture_logs(|| {
        let g = generator_with(Config::new(0, 0), FixedClock(EPOCH - 1));
        assert!(matches!(g.next_id(), Err(Error::BeforeEpoch { .. })));
    });
    let line = find_line(&logs, "clock reads earlier than epoch");
    assert!(line.contains("ERROR"), "{:?}", line);
}

/// Returns error instead of overflowing at the last representable millisecond
#[test]
fn returns_error_instead_of_overflowing_at_the_last_representable_millisecond() {
    let g = generator_with(
        Config::new(0, 0).with_epoch_ms(u64::MAX),
        FixedClock(u64::MAX),
    );
    let ids = g.iter().take(4096).collect::<Result<Vec<_>, _>>().unwrap();
    assert!(ids.iter().all(|e| e.timestamp_offset() == 0));
    assert_eq!(ids[4095].sequence(), MAX_SEQUENCE);
    assert_eq!(
        g.next_id(),
        Err(Error::EpochOverflow {
            unix_ts_ms: u64::MAX,
            epoch_ms: u64::MAX,
        })
    );
}
