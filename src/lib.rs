//! Sortable 64-bit snowflake identifiers
//!
//! ```rust
//! use snowflake_id::Generator;
//!
//! let g = Generator::new(10, 2)?; // node id, datacenter id
//! let id = g.next_id()?;
//! println!("{}", id); // e.g. "1219770479843270656"
//! println!("{}", id.encode_hex()); // e.g. "10ed6b6c1e850000"
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Field and bit layout
//!
//! This implementation produces identifiers with the following bit layout:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0|                     timestamp_offset                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |timestamp_offset |  dc |    node     |       sequence          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Where:
//!
//! - The most significant bit is reserved and always zero, so identifiers stay positive when
//!   stored as `i64`.
//! - The 41-bit `timestamp_offset` field holds the milliseconds elapsed since a custom epoch
//!   (2021-01-01T00:00:00+08:00 by default), which lasts about 69 years.
//! - The 3-bit `dc` field holds the datacenter id.
//! - The 7-bit `node` field holds the node id.
//! - The 12-bit `sequence` field is a counter that starts at zero in each millisecond and is
//!   incremented by one for each identifier generated within the same millisecond.
//!
//! Node and datacenter ids are fixed configuration supplied by the caller; distinct processes
//! must use distinct `(datacenter, node)` pairs for their identifiers to be unique.
//!
//! When the 12-bit `sequence` field is exhausted within one millisecond, the generator spins
//! until the clock moves on rather than reuse a value. A clock that moves backwards, an epoch
//! that is more than 2<sup>41</sup> - 1 milliseconds in the past, and a clock that reads earlier
//! than the epoch are all reported as errors; the generator never returns a placeholder value.
//!
//! # Logging
//!
//! Clock regressions, epoch overflows and sequence exhaustion are reported through [`tracing`]
//! events. Install a subscriber in the host application to collect them.

mod id;
pub use id::{
    Id, DATACENTER_ID_BITS, MAX_DATACENTER_ID, MAX_NODE_ID, MAX_SEQUENCE, MAX_TIMESTAMP_OFFSET,
    NODE_ID_BITS, SEQUENCE_BITS, TIMESTAMP_BITS,
};

mod error;
pub use error::{ConfigError, Error, ParseError};

pub mod clock;
pub use clock::{StdSystemTime, TimeSource};

pub mod config;
pub use config::{ClockRegressionPolicy, Config};

pub mod generator;
pub use generator::Generator;
