//! Engine configuration, injected at construction.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the per-operation deadline in milliseconds.
pub const OP_TIMEOUT_ENV: &str = "LEDGER_OP_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number of milliseconds, got '{value}'")]
    InvalidTimeout { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on one unit of work, lock wait included.
    pub op_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl LedgerConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(OP_TIMEOUT_ENV) {
            let millis = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout {
                    name: OP_TIMEOUT_ENV,
                    value: value.clone(),
                })?;
            config.op_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
