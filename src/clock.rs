//! Clock abstraction used by [`Generator`](crate::Generator).

use std::time;

/// A trait that defines the minimum system clock interface for [`Generator`](crate::Generator).
///
/// The generator reads the time source while holding its lock, so implementations may keep
/// mutable state without further synchronization.
pub trait TimeSource {
    /// Returns the current Unix timestamp in milliseconds.
    fn unix_ts_ms(&mut self) -> u64;
}

/// The default [`TimeSource`] that uses [`std::time::SystemTime`].
///
/// A wall clock set before the Unix epoch reads as zero, which the generator then rejects as
/// preceding its own epoch.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct StdSystemTime;

impl TimeSource for StdSystemTime {
    fn unix_ts_ms(&mut self) -> u64 {
        time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn unix_ts_ms(&mut self) -> u64 {
        (**self).unix_ts_ms()
    }
}
