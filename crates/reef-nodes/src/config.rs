//! TOML configuration for parallel fan-out.
//!
//! Options live under a `[parallel]` table:
//!
//! ```toml
//! [parallel]
//! pool_size = 16
//! timeout_ms = 250
//! ```
//!
//! Missing keys fall back to [`DEFAULT_POOL_SIZE`] and [`DEFAULT_TIMEOUT`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pool::{DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT, ParallelConfig, WorkerPool};

/// Serializable form of [`ParallelConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParallelOptions {
    /// Number of member operations allowed to run at once.
    pub pool_size: usize,
    /// Maximum wait for one fan-out call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    parallel: ParallelOptions,
}

impl ParallelOptions {
    /// Load options from the `[parallel]` table of a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse options from the `[parallel]` table of a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        file.parallel.validate()?;
        Ok(file.parallel)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build runtime settings backed by a new, dedicated pool.
    pub fn build(&self) -> ParallelConfig {
        ParallelConfig::new(WorkerPool::new(self.pool_size), self.timeout())
    }
}
