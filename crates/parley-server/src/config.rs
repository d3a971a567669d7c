//! Configuration for the broker.
//!
//! Defaults can be overridden via a few environment variables:
//!
//! - `PARLEY_ADVANCED`        (set to anything: enable log, liveness, commands)
//! - `PARLEY_MAX_CLIENTS`     (default: "32", at most the roster capacity)
//! - `PARLEY_DISCONNECT_SECS` (default: "5", ticks without a ping reply)
//! - `PARLEY_TICK_MILLIS`     (default: "1000")
//! - `PARLEY_RUN_DIR`         (default: ".")

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use parley_core::{CLOCK_WRAP, ROSTER_CAPACITY};

use crate::error::BrokerError;

pub const ADVANCED_VAR: &str = "PARLEY_ADVANCED";
pub const RUN_DIR_VAR: &str = "PARLEY_RUN_DIR";

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Activity log, liveness monitor and chat commands.
    pub advanced: bool,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Ticks a client may go without answering a ping.
    pub disconnect_after: u64,

    /// Liveness tick period.
    pub tick: Duration,

    /// Directory holding the join FIFO, the log and the lock file.
    pub run_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            advanced: false,
            max_clients: ROSTER_CAPACITY,
            disconnect_after: 5,
            tick: Duration::from_millis(1000),
            run_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to defaults.
    pub fn from_env() -> Result<Self, BrokerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BrokerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            advanced: lookup(ADVANCED_VAR).is_some(),
            max_clients: read_or_default(&lookup, "PARLEY_MAX_CLIENTS", defaults.max_clients)?,
            disconnect_after: read_or_default(
                &lookup,
                "PARLEY_DISCONNECT_SECS",
                defaults.disconnect_after,
            )?,
            tick: Duration::from_millis(read_or_default(&lookup, "PARLEY_TICK_MILLIS", 1000u64)?),
            run_dir: lookup(RUN_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.run_dir),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.max_clients == 0 || self.max_clients > ROSTER_CAPACITY {
            return Err(BrokerError::Config(format!(
                "max clients must be between 1 and {}, got {}",
                ROSTER_CAPACITY, self.max_clients
            )));
        }
        if self.disconnect_after == 0 || self.disconnect_after >= CLOCK_WRAP {
            return Err(BrokerError::Config(format!(
                "disconnect threshold must be between 1 and {}, got {}",
                CLOCK_WRAP - 1,
                self.disconnect_after
            )));
        }
        if self.tick.is_zero() {
            return Err(BrokerError::Config("tick period must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn read_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, BrokerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| BrokerError::Config(format!("{}={:?}: {}", key, val, e))),
        None => Ok(default),
    }
}
