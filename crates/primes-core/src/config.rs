use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::shard::DEFAULT_STORE_DIR;
use crate::sieve::{DEFAULT_BATCH_SIZE, DEFAULT_UPPER_BOUND};

/// Name of the optional config file looked up in the working directory.
pub const CONFIG_FILE: &str = "primes.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SieveConfig {
    /// Store directory, relative to the working directory unless absolute.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// New primes between checkpoints.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Exclusive ceiling on tested candidates.
    #[serde(default = "default_upper_bound")]
    pub upper_bound: u64,
    /// Call `sync_data` after every shard append.
    #[serde(default)]
    pub durable: bool,
    /// How long `run` waits for the store lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            batch_size: default_batch_size(),
            upper_bound: default_upper_bound(),
            durable: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl SieveConfig {
    /// Lock wait as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Store directory resolved against `root`.
    #[must_use]
    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(&self.store_dir)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub store_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub upper_bound: Option<u64>,
    pub durable: bool,
}

/// A config value that parsed but cannot be used.
#[derive(Debug, thiserror::Error)]
#[error("{field} {reason}")]
pub struct InvalidConfigValue {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Machine-readable code for a [`load_config`] or [`resolve_config`] failure.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> ErrorCode {
    if err.downcast_ref::<InvalidConfigValue>().is_some() {
        ErrorCode::InvalidConfigValue
    } else {
        ErrorCode::ConfigParseError
    }
}

pub fn load_config(root: &Path) -> Result<SieveConfig> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SieveConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SieveConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config(root: &Path, overrides: Overrides) -> Result<SieveConfig> {
    let mut config = load_config(root)?;

    if let Some(store_dir) = overrides.store_dir {
        config.store_dir = store_dir;
    }
    if let Some(batch_size) = overrides.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(upper_bound) = overrides.upper_bound {
        config.upper_bound = upper_bound;
    }
    config.durable |= overrides.durable;

    if config.batch_size == 0 {
        return Err(InvalidConfigValue {
            field: "batch_size",
            reason: "must be at least 1",
        }
        .into());
    }

    Ok(config)
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_DIR)
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_upper_bound() -> u64 {
    DEFAULT_UPPER_BOUND
}

const fn default_lock_timeout_ms() -> u64 {
    1_000
}
