//! Centralized configuration for sqlrelay
//!
//! Layered the usual way: serde defaults, then an optional TOML file, then
//! environment variables. All values are read once at construction and never
//! mutated afterwards.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Service configuration, read-only after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// PostgreSQL connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Address to bind the HTTP listener to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum physical connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pool acquire timeout; acquisition fails fast rather than queueing
    /// behind long-lived transactions
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Admission ceiling for concurrent write transactions
    #[serde(default = "default_max_concurrent_transactions")]
    pub max_concurrent_transactions: usize,

    /// Age at which an unfinalized transaction is force-rolled-back
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,

    /// How often the monitor sweeps the registry
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    #[serde(default = "default_enable_transaction_monitor")]
    pub enable_transaction_monitor: bool,

    /// Allow permissive CORS (default: false = localhost only)
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_database_url() -> String {
    "postgres://localhost/sqlrelay".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_max_concurrent_transactions() -> usize {
    10
}

fn default_transaction_timeout_ms() -> u64 {
    30_000
}

fn default_monitor_interval_ms() -> u64 {
    5_000
}

fn default_enable_transaction_monitor() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        // Round-trips through serde so the field defaults stay in one place
        toml::from_str("").expect("empty config deserializes from defaults")
    }
}

impl RelayConfig {
    /// Load config from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env();
        Ok(config)
    }

    /// Build config from defaults plus environment overrides only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Environment variables take precedence over file values.
    fn apply_env(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(host) = env::var("SQLRELAY_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse("SQLRELAY_PORT") {
            self.port = port;
        }
        if let Some(max) = env_parse("SQLRELAY_MAX_CONNECTIONS") {
            self.max_connections = max;
        }
        if let Some(ms) = env_parse("SQLRELAY_ACQUIRE_TIMEOUT_MS") {
            self.acquire_timeout_ms = ms;
        }
        if let Some(max) = env_parse("SQLRELAY_MAX_CONCURRENT_TRANSACTIONS") {
            self.max_concurrent_transactions = max;
        }
        if let Some(ms) = env_parse("SQLRELAY_TRANSACTION_TIMEOUT_MS") {
            self.transaction_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("SQLRELAY_MONITOR_INTERVAL_MS") {
            self.monitor_interval_ms = ms;
        }
        if let Some(enabled) = env_parse("SQLRELAY_ENABLE_TRANSACTION_MONITOR") {
            self.enable_transaction_monitor = enabled;
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, raw, "ignoring unparseable environment override");
                None
            }
        },
        Err(_) => None,
    }
}
