//! Configuration for the ledger

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Metrics listen address
    pub metrics_listen_addr: String,

    /// Emit JSON formatted logs
    pub json_logs: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Storage deposit pricing
    pub rent: RentConfig,

    /// Account limits
    pub accounts: AccountsConfig,

    /// Payment request limits
    pub requests: RequestsConfig,

    /// Escrow hold window
    pub escrow: EscrowConfig,

    /// Background release sweep
    pub sweeper: SweeperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/cash-ledger"),
            service_name: "cash-ledger".to_string(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
            json_logs: false,
            rocksdb: RocksDBConfig::default(),
            rent: RentConfig::default(),
            accounts: AccountsConfig::default(),
            requests: RequestsConfig::default(),
            escrow: EscrowConfig::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Storage deposit pricing
///
/// A record of `space` bytes must hold `(overhead_bytes + space) *
/// per_byte` native units to stay allocated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RentConfig {
    /// Fixed per-record overhead (bytes)
    pub overhead_bytes: u64,

    /// Price per byte
    pub per_byte: u64,
}

impl Default for RentConfig {
    fn default() -> Self {
        Self {
            overhead_bytes: 128,
            per_byte: 6960,
        }
    }
}

impl RentConfig {
    /// Minimum deposit for a record of `space` bytes
    pub fn minimum_for(&self, space: usize) -> u64 {
        self.overhead_bytes
            .saturating_add(space as u64)
            .saturating_mul(self.per_byte)
    }
}

/// Account limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Friend list capacity
    pub max_friends: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self { max_friends: 64 }
    }
}

/// Payment request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestsConfig {
    /// Open requests allowed per requester (1 = single slot)
    pub max_open_per_requester: u32,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            max_open_per_requester: 1,
        }
    }
}

/// Escrow hold window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Seconds between creation and earliest release
    pub hold_secs: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            hold_secs: 24 * 60 * 60,
        }
    }
}

impl EscrowConfig {
    /// Hold window as a duration
    pub fn hold(&self) -> Result<chrono::Duration> {
        i64::try_from(self.hold_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                Error::Config(format!("escrow.hold_secs {} out of range", self.hold_secs))
            })
    }
}

/// Background release sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Run the sweeper in the node
    pub enabled: bool,

    /// Interval between sweeps (milliseconds)
    pub interval_ms: u64,

    /// Escrows released per sweep at most
    pub batch_limit: usize,

    /// Hex seed of the crank key; random when unset
    pub crank_seed_hex: Option<String>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 30_000,
            batch_limit: 64,
            crank_seed_hex: None,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CASH_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("CASH_LEDGER_METRICS_ADDR") {
            config.metrics_listen_addr = addr;
        }

        if let Ok(value) = std::env::var("CASH_LEDGER_JSON_LOGS") {
            config.json_logs = parse_env("CASH_LEDGER_JSON_LOGS", &value)?;
        }

        if let Ok(value) = std::env::var("CASH_LEDGER_ESCROW_HOLD_SECS") {
            config.escrow.hold_secs = parse_env("CASH_LEDGER_ESCROW_HOLD_SECS", &value)?;
        }

        if let Ok(value) = std::env::var("CASH_LEDGER_SWEEPER_ENABLED") {
            config.sweeper.enabled = parse_env("CASH_LEDGER_SWEEPER_ENABLED", &value)?;
        }

        if let Ok(seed) = std::env::var("CASH_LEDGER_CRANK_SEED") {
            config.sweeper.crank_seed_hex = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.accounts.max_friends == 0 {
            return Err(Error::Config("accounts.max_friends must be > 0".to_string()));
        }
        if self.requests.max_open_per_requester == 0 {
            return Err(Error::Config(
                "requests.max_open_per_requester must be > 0".to_string(),
            ));
        }
        self.escrow.hold()?;
        if self.sweeper.interval_ms == 0 || self.sweeper.batch_limit == 0 {
            return Err(Error::Config(
                "sweeper.interval_ms and sweeper.batch_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::Config(format!("{}={}: {}", name, value, e)))
}
