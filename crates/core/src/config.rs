//! Relay transaction-core configuration.
//!
//! Provides the tunables for gas repricing, confirmation tracking and the
//! worker tick, loadable from a TOML file with per-field defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the transaction management core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Gas price multiplier applied per boost (must be > 1)
    #[serde(default = "default_retry_gas_price_factor")]
    pub retry_gas_price_factor: f64,

    /// Absolute cap on any broadcast gas price (wei)
    #[serde(default = "default_max_gas_price_wei")]
    pub max_gas_price_wei: u64,

    /// Safety margin over RPC gas estimation (must be >= 1)
    #[serde(default = "default_estimate_gas_factor")]
    pub estimate_gas_factor: f64,

    /// Fallback gas limit when estimation fails
    #[serde(default = "default_gas_limit")]
    pub default_gas_limit: u64,

    /// Mining depth at which a transaction is pruned from the store
    #[serde(default = "default_confirmations_needed")]
    pub confirmations_needed: u64,

    /// Blocks a transaction may sit unmined before it is repriced
    #[serde(default = "default_pending_timeout_blocks")]
    pub pending_transaction_timeout_blocks: u64,

    /// Root directory for persisted state
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// Erase the transaction store at startup (development only)
    #[serde(default)]
    pub dev_mode: bool,

    /// Worker loop tick interval (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_retry_gas_price_factor() -> f64 {
    1.25
}
fn default_max_gas_price_wei() -> u64 {
    100_000_000_000 // 100 gwei
}
fn default_estimate_gas_factor() -> f64 {
    1.1
}
fn default_gas_limit() -> u64 {
    300_000
}
fn default_confirmations_needed() -> u64 {
    12
}
fn default_pending_timeout_blocks() -> u64 {
    30
}
fn default_workdir() -> String {
    "./workdir".to_string()
}
fn default_tick_interval_ms() -> u64 {
    10_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retry_gas_price_factor: default_retry_gas_price_factor(),
            max_gas_price_wei: default_max_gas_price_wei(),
            estimate_gas_factor: default_estimate_gas_factor(),
            default_gas_limit: default_gas_limit(),
            confirmations_needed: default_confirmations_needed(),
            pending_transaction_timeout_blocks: default_pending_timeout_blocks(),
            workdir: default_workdir(),
            dev_mode: false,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `RELAY_CONFIG`, or use defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("RELAY_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.retry_gas_price_factor <= 1.0 {
            anyhow::bail!(
                "retry_gas_price_factor must be > 1, got {}",
                self.retry_gas_price_factor
            );
        }
        if self.estimate_gas_factor < 1.0 {
            anyhow::bail!(
                "estimate_gas_factor must be >= 1, got {}",
                self.estimate_gas_factor
            );
        }
        if self.confirmations_needed == 0 {
            anyhow::bail!("confirmations_needed must be >= 1");
        }
        if self.pending_transaction_timeout_blocks == 0 {
            anyhow::bail!("pending_transaction_timeout_blocks must be >= 1");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Log the active configuration.
    pub fn log_config(&self) {
        tracing::info!(
            retry_gas_price_factor = self.retry_gas_price_factor,
            max_gas_price_wei = self.max_gas_price_wei,
            estimate_gas_factor = self.estimate_gas_factor,
            default_gas_limit = self.default_gas_limit,
            "Gas parameters"
        );
        tracing::info!(
            confirmations_needed = self.confirmations_needed,
            pending_transaction_timeout_blocks = self.pending_transaction_timeout_blocks,
            tick_interval_ms = self.tick_interval_ms,
            "Confirmation tracking"
        );
        tracing::info!(
            workdir = %self.workdir,
            dev_mode = self.dev_mode,
            "Persistence"
        );
    }
}
