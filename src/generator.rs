//! Snowflake generator and related types.

use parking_lot::Mutex;

use crate::clock::{StdSystemTime, TimeSource};
use crate::config::{ClockRegressionPolicy, Config};
use crate::id::{Id, MAX_SEQUENCE, MAX_TIMESTAMP_OFFSET};
use crate::{ConfigError, Error};

#[cfg(test)]
mod tests;

/// Represents a snowflake generator that encapsulates a per-millisecond sequence counter and
/// guarantees the monotonic order of identifiers it issues.
///
/// All calls to [`next_id`](Generator::next_id) on one instance are serialized by an internal
/// lock, so a generator can be shared across threads by reference or through an
/// [`Arc`](std::sync::Arc). There is no process-wide generator; construct one per node process
/// and pass it to whoever needs identifiers.
///
/// # Examples
///
/// ```rust
/// use std::{sync, thread};
/// use snowflake_id::Generator;
///
/// let g = sync::Arc::new(Generator::new(10, 2)?);
/// thread::scope(|s| {
///     for i in 0..4 {
///         let g = sync::Arc::clone(&g);
///         s.spawn(move || {
///             for _ in 0..8 {
///                 println!("{} by thread {}", g.next_id().unwrap(), i);
///                 thread::yield_now();
///             }
///         });
///     }
/// });
/// # Ok::<(), snowflake_id::ConfigError>(())
/// ```
///
/// # Sequence exhaustion and clock rollback
///
/// When 4096 identifiers have been issued within one millisecond, the next call spins until the
/// clock reaches the following millisecond. When the clock reads earlier than the last issued
/// identifier, the generator follows its [`ClockRegressionPolicy`]: it either fails right away
/// or spins until the clock catches up if the rollback is small enough.
#[derive(Debug)]
pub struct Generator<T = StdSystemTime> {
    node_id: u8,
    datacenter_id: u8,
    epoch_ms: u64,
    clock_regression: ClockRegressionPolicy,
    state: Mutex<State<T>>,
}

/// Mutable part of a generator, guarded by its lock.
#[derive(Debug)]
struct State<T> {
    last_ts_ms: u64,
    sequence: u16,
    time_source: T,
}

impl Generator {
    /// Creates a generator with the default epoch and clock regression policy that reads the
    /// system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `node_id` exceeds 127 or `datacenter_id` exceeds 7.
    pub fn new(node_id: u32, datacenter_id: u32) -> Result<Self, ConfigError> {
        Self::with_config(Config::new(node_id, datacenter_id))
    }

    /// Creates a generator from a configuration that reads the system clock.
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        Self::with_time_source(config, StdSystemTime)
    }
}

impl<T: TimeSource> Generator<T> {
    /// Creates a generator from a configuration and a custom time source.
    pub fn with_time_source(config: Config, time_source: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            node_id: config.node_id as u8,
            datacenter_id: config.datacenter_id as u8,
            epoch_ms: config.epoch_ms,
            clock_regression: config.clock_regression,
            state: Mutex::new(State {
                last_ts_ms: 0,
                sequence: 0,
                time_source,
            }),
        })
    }

    /// Returns the node id embedded in every identifier.
    pub const fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Returns the datacenter id embedded in every identifier.
    pub const fn datacenter_id(&self) -> u8 {
        self.datacenter_id
    }

    /// Returns the epoch in Unix milliseconds.
    pub const fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    /// Returns the configuration this generator was built from.
    pub fn config(&self) -> Config {
        Config::new(self.node_id.into(), self.datacenter_id.into())
            .with_epoch_ms(self.epoch_ms)
            .with_clock_regression(self.clock_regression)
    }

    /// Generates a new identifier.
    ///
    /// # Errors
    ///
    /// - [`Error::EpochOverflow`] if more than 2<sup>41</sup> - 1 milliseconds have passed since
    ///   the epoch.
    /// - [`Error::BeforeEpoch`] if the clock reads earlier than the epoch.
    /// - [`Error::ClockRegression`] if the clock moved backwards and the policy does not wait it
    ///   out.
    ///
    /// The generator state is left untouched on failure.
    pub fn next_id(&self) -> Result<Id, Error> {
        let mut state = self.state.lock();
        let mut now = state.time_source.unix_ts_ms();

        if now < state.last_ts_ms {
            now = self.recover_from_regression(&mut state, now)?;
        }

        let sequence = if now == state.last_ts_ms {
            let sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if sequence == 0 {
                tracing::debug!(
                    node_id = self.node_id,
                    datacenter_id = self.datacenter_id,
                    last_ts_ms = state.last_ts_ms,
                    "sequence exhausted; waiting for next millisecond"
                );
                let Some(next_ms) = state.last_ts_ms.checked_add(1) else {
                    tracing::error!(
                        unix_ts_ms = now,
                        epoch_ms = self.epoch_ms,
                        "sequence exhausted at the last representable millisecond"
                    );
                    return Err(Error::EpochOverflow {
                        unix_ts_ms: now,
                        epoch_ms: self.epoch_ms,
                    });
                };
                now = state.wait_until(next_ms);
            }
            sequence
        } else {
            0
        };

        let timestamp_offset = self.timestamp_offset(now)?;
        state.last_ts_ms = now;
        state.sequence = sequence;

        let id = Id::from_fields(
            timestamp_offset,
            self.datacenter_id,
            self.node_id,
            sequence,
        );
        tracing::trace!(%id, "issued snowflake id");
        Ok(id)
    }

    /// Returns an infinite iterator that calls [`next_id`](Generator::next_id) for each item.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snowflake_id::Generator;
    ///
    /// let g = Generator::new(10, 2)?;
    /// let ids = g.iter().take(4).collect::<Result<Vec<_>, _>>()?;
    /// assert!(ids.windows(2).all(|w| w[0] < w[1]));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { generator: self }
    }

    /// Applies the clock regression policy, returning a clock reading not less than the last
    /// issued timestamp.
    fn recover_from_regression(&self, state: &mut State<T>, now: u64) -> Result<u64, Error> {
        let last_ts_ms = state.last_ts_ms;
        match self.clock_regression {
            ClockRegressionPolicy::Wait { tolerance_ms } if last_ts_ms - now <= tolerance_ms => {
                tracing::warn!(
                    node_id = self.node_id,
                    datacenter_id = self.datacenter_id,
                    last_ts_ms,
                    now_ms = now,
                    "clock moved backwards; waiting for it to catch up"
                );
                Ok(state.wait_until(last_ts_ms))
            }
            _ => {
                tracing::warn!(
                    node_id = self.node_id,
                    datacenter_id = self.datacenter_id,
                    last_ts_ms,
                    now_ms = now,
                    "clock moved backwards; refusing to issue id"
                );
                Err(Error::ClockRegression {
                    last_ts_ms,
                    unix_ts_ms: now,
                })
            }
        }
    }

    /// Converts a clock reading into the 41-bit timestamp field.
    fn timestamp_offset(&self, unix_ts_ms: u64) -> Result<u64, Error> {
        let epoch_ms = self.epoch_ms;
        let Some(offset) = unix_ts_ms.checked_sub(epoch_ms) else {
            tracing::error!(unix_ts_ms, epoch_ms, "clock reads earlier than epoch");
            return Err(Error::BeforeEpoch {
                unix_ts_ms,
                epoch_ms,
            });
        };
        if offset > MAX_TIMESTAMP_OFFSET {
            tracing::error!(
                unix_ts_ms,
                epoch_ms,
                max_offset = MAX_TIMESTAMP_OFFSET,
                "timestamp exceeds the range of epoch"
            );
            return Err(Error::EpochOverflow {
                unix_ts_ms,
                epoch_ms,
            });
        }
        Ok(offset)
    }
}

impl<T: TimeSource> State<T> {
    /// Spins until the time source reads `target_ms` or later and returns that reading.
    fn wait_until(&mut self, target_ms: u64) -> u64 {
        loop {
            let now = self.time_source.unix_ts_ms();
            if now >= target_ms {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}

/// Infinite iterator over identifiers issued by a [`Generator`].
///
/// Created by [`Generator::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    generator: &'a Generator<T>,
}

impl<T: TimeSource> Iterator for Iter<'_, T> {
    type Item = Result<Id, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generator.next_id())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<T: TimeSource> std::iter::FusedIterator for Iter<'_, T> {}
