//! Error types.

use thiserror::Error;

/// Error building a generator from an invalid configuration.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ConfigError {
    /// The node id does not fit in its 7-bit field.
    #[error("node id must be between 0 and 127, got {0}")]
    NodeIdOutOfRange(u32),

    /// The datacenter id does not fit in its 3-bit field.
    #[error("datacenter id must be between 0 and 7, got {0}")]
    DatacenterIdOutOfRange(u32),

    /// An environment variable holds a value that is not a non-negative integer.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Name of the variable.
        name: &'static str,
        /// Value found in the environment.
        value: String,
    },
}

/// Error generating an identifier. No identifier is issued when one of these is returned.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum Error {
    /// The time elapsed since the epoch no longer fits in the 41-bit timestamp field.
    ///
    /// This is permanent for the configured epoch: every subsequent call fails the same way.
    #[error("timestamp {unix_ts_ms} exceeds the 41-bit range of epoch {epoch_ms}")]
    EpochOverflow {
        /// Clock reading in Unix milliseconds.
        unix_ts_ms: u64,
        /// Configured epoch in Unix milliseconds.
        epoch_ms: u64,
    },

    /// The clock reads a time earlier than the epoch.
    #[error("timestamp {unix_ts_ms} precedes epoch {epoch_ms}")]
    BeforeEpoch {
        /// Clock reading in Unix milliseconds.
        unix_ts_ms: u64,
        /// Configured epoch in Unix milliseconds.
        epoch_ms: u64,
    },

    /// The clock moved backwards relative to the last issued identifier.
    #[error("clock moved backwards from {last_ts_ms} to {unix_ts_ms}")]
    ClockRegression {
        /// Timestamp of the last issued identifier in Unix milliseconds.
        last_ts_ms: u64,
        /// Clock reading in Unix milliseconds.
        unix_ts_ms: u64,
    },
}

/// Error parsing an invalid representation of an identifier.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Error)]
#[error("invalid snowflake id representation")]
pub struct ParseError {}
