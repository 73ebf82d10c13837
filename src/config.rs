//! Generator configuration.

use std::env;

use crate::id::{MAX_DATACENTER_ID, MAX_NODE_ID};
use crate::ConfigError;

/// Default custom epoch: 2021-01-01T00:00:00+08:00 in Unix milliseconds.
pub const DEFAULT_EPOCH_MS: u64 = 1_609_430_400_000;

/// Environment variable read by [`Config::from_env`] for the node id.
pub const ENV_NODE_ID: &str = "SNOWFLAKE_NODE_ID";

/// Environment variable read by [`Config::from_env`] for the datacenter id.
pub const ENV_DATACENTER_ID: &str = "SNOWFLAKE_DATACENTER_ID";

/// Environment variable read by [`Config::from_env`] for the epoch.
pub const ENV_EPOCH_MS: &str = "SNOWFLAKE_EPOCH_MS";

/// How a generator reacts when the clock reads earlier than the last issued identifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClockRegressionPolicy {
    /// Returns [`Error::ClockRegression`](crate::Error::ClockRegression) immediately.
    #[default]
    Fail,

    /// Spins until the clock catches up if it moved back by at most `tolerance_ms`, and fails
    /// otherwise.
    Wait {
        /// Largest rollback in milliseconds that is waited out.
        tolerance_ms: u64,
    },
}

/// Fixed identity and behavior of a [`Generator`](crate::Generator).
///
/// # Examples
///
/// ```rust
/// use snowflake_id::{ClockRegressionPolicy, Config, Generator};
///
/// let config = Config::new(10, 2)
///     .with_epoch_ms(1_704_067_200_000)
///     .with_clock_regression(ClockRegressionPolicy::Wait { tolerance_ms: 5 });
/// let g = Generator::with_config(config)?;
/// println!("{}", g.next_id()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Node id in `0..=127`.
    pub node_id: u32,

    /// Datacenter id in `0..=7`.
    pub datacenter_id: u32,

    /// Custom epoch in Unix milliseconds.
    pub epoch_ms: u64,

    /// Reaction to backward clock movement.
    pub clock_regression: ClockRegressionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Config {
    /// Creates a configuration with the default epoch and clock regression policy.
    pub const fn new(node_id: u32, datacenter_id: u32) -> Self {
        Self {
            node_id,
            datacenter_id,
            epoch_ms: DEFAULT_EPOCH_MS,
            clock_regression: ClockRegressionPolicy::Fail,
        }
    }

    /// Replaces the epoch.
    pub const fn with_epoch_ms(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    /// Replaces the clock regression policy.
    pub const fn with_clock_regression(mut self, policy: ClockRegressionPolicy) -> Self {
        self.clock_regression = policy;
        self
    }

    /// Reads a configuration from `SNOWFLAKE_NODE_ID`, `SNOWFLAKE_DATACENTER_ID` and
    /// `SNOWFLAKE_EPOCH_MS`. Unset variables keep their defaults.
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name, value })
        }

        let mut config = Self::default();
        if let Some(value) = lookup(ENV_NODE_ID) {
            config.node_id = parse(ENV_NODE_ID, value)?;
        }
        if let Some(value) = lookup(ENV_DATACENTER_ID) {
            config.datacenter_id = parse(ENV_DATACENTER_ID, value)?;
        }
        if let Some(value) = lookup(ENV_EPOCH_MS) {
            config.epoch_ms = parse(ENV_EPOCH_MS, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that the node and datacenter ids fit in their fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id > MAX_NODE_ID as u32 {
            return Err(ConfigError::NodeIdOutOfRange(self.node_id));
        }
        if self.datacenter_id > MAX_DATACENTER_ID as u32 {
            return Err(ConfigError::DatacenterIdOutOfRange(self.datacenter_id));
        }
        Ok(())
    }
}
