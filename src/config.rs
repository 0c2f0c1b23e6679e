//! Configuration module for the asset airlift
//!
//! Settings come from an optional TOML file; the source account's
//! credentials come from the environment (`ADDRESS`, `PRIVATE_KEY`, with
//! `.env` support) and override anything in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the source address
pub const ENV_ADDRESS: &str = "ADDRESS";
/// Environment variable holding the source signing secret
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Both ADDRESS and PRIVATE_KEY must be defined (missing {0})")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source account credentials
    #[serde(default)]
    pub source: SourceConfig,

    /// Node connection and transaction parameters
    #[serde(default)]
    pub network: NetworkConfig,

    /// Indexer used to list holdings
    #[serde(default)]
    pub holdings: HoldingsConfig,

    /// Transfer concurrency
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Output artifact
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub private_key: Option<String>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("address", &self.address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Gas limit used for every transfer, also the sweep's fee reserve
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub receipt_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingsConfig {
    #[serde(default = "default_holdings_base_url")]
    pub base_url: String,

    /// Path template, `{address}` and `{erc}` are substituted
    #[serde(default = "default_holdings_path")]
    pub path_template: String,

    #[serde(default = "default_holdings_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running transfers. Unbounded when absent.
    #[serde(default)]
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.avax.network/ext/bc/C/rpc".to_string() }
fn default_chain_id() -> u64 { 43114 }
fn default_gas_limit() -> u64 { 200_000 }
fn default_confirmation_timeout() -> u64 { 120 }
fn default_poll_interval() -> u64 { 1_000 }
fn default_holdings_base_url() -> String { "https://api.routescan.io".to_string() }
fn default_holdings_path() -> String {
    "/v2/network/mainnet/evm/43114/address/{address}/erc{erc}-holdings?ecosystem=avalanche&includedChainIds=43114%2C73772&count=true&limit=100".to_string()
}
fn default_holdings_timeout() -> u64 { 30 }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            gas_limit: default_gas_limit(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            receipt_poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_holdings_base_url(),
            path_template: default_holdings_path(),
            timeout_secs: default_holdings_timeout(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists (defaults otherwise), then apply `.env`
    /// and process environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file '{}' not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override source credentials from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.source.address = Some(address);
        }
        if let Some(key) = lookup(ENV_PRIVATE_KEY) {
            self.source.private_key = Some(key);
        }
    }

    /// Check everything that must hold before any network activity
    pub fn validate(&self) -> Result<(), ConfigError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.source.address) {
            return Err(ConfigError::MissingCredential(ENV_ADDRESS));
        }
        if !present(&self.source.private_key) {
            return Err(ConfigError::MissingCredential(ENV_PRIVATE_KEY));
        }
        if self.network.chain_id == 0 {
            return Err(ConfigError::Invalid("network.chain_id must be non-zero".into()));
        }
        if self.network.gas_limit == 0 {
            return Err(ConfigError::Invalid("network.gas_limit must be non-zero".into()));
        }
        if self.dispatch.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid(
                "dispatch.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
