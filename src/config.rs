//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend-as-a-service connection
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. "https://abcd.supabase.co"
    #[serde(default)]
    pub url: String,

    /// Public anonymous API key
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Price API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_url")]
    pub url: String,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_market_timeout")]
    pub request_timeout_secs: u64,
}

fn default_market_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_per_page() -> u32 {
    10
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_market_timeout() -> u64 {
    15
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            url: default_market_url(),
            vs_currency: default_vs_currency(),
            per_page: default_per_page(),
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_market_timeout(),
        }
    }
}

/// Wallet provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the local wallet
    #[serde(default = "default_wallet_rpc")]
    pub rpc_url: String,

    /// Fixed address to use instead of asking the wallet
    pub address: Option<String>,
}

fn default_wallet_rpc() -> String {
    "http://127.0.0.1:1248".to_string()
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_wallet_rpc(),
            address: None,
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("kraken").to_string_lossy().to_string())
        .unwrap_or_else(|| "./kraken_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("kraken").join("config.toml")),
            Some(PathBuf::from("./kraken.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Make sure the backend can actually be reached
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() || self.backend.anon_key.trim().is_empty() {
            return Err(ConfigError::MissingBackend);
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KRAKEN_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(key) = std::env::var("KRAKEN_BACKEND_ANON_KEY") {
            self.backend.anon_key = key;
        }

        if let Ok(url) = std::env::var("KRAKEN_MARKET_URL") {
            self.market.url = url;
        }

        if let Ok(url) = std::env::var("KRAKEN_WALLET_RPC_URL") {
            self.wallet.rpc_url = url;
        }

        if let Ok(data_dir) = std::env::var("KRAKEN_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Ok(level) = std::env::var("KRAKEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("KRAKEN_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Missing backend configuration: set backend.url and backend.anon_key (or KRAKEN_BACKEND_URL / KRAKEN_BACKEND_ANON_KEY)")]
    MissingBackend,
}

/// Generate a default config file content
///
/// `data_dir` is written as the resolved default path.
pub fn generate_default_config() -> String {
    r#"# Kraken Configuration
#
# Environment variables override these settings:
# - KRAKEN_BACKEND_URL
# - KRAKEN_BACKEND_ANON_KEY
# - KRAKEN_MARKET_URL
# - KRAKEN_WALLET_RPC_URL
# - KRAKEN_DATA_DIR
# - KRAKEN_LOG_LEVEL
# - KRAKEN_LOG_FORMAT

[backend]
# Project URL of the backend (auth, database, storage, realtime)
url = ""

# Public anonymous API key
anon_key = ""

# Request timeout in seconds
request_timeout_secs = 30

[market]
# Price API base URL
url = "https://api.coingecko.com/api/v3"

# Quote currency
vs_currency = "usd"

# Number of assets in the market overview
per_page = 10

# How often the market overview refreshes (seconds)
refresh_interval_secs = 30

# Request timeout in seconds
request_timeout_secs = 15

[wallet]
# JSON-RPC endpoint of the local wallet provider
rpc_url = "http://127.0.0.1:1248"

# Skip the wallet prompt and always use this address
# address = "0x..."

[storage]
# Directory for the local session file
data_dir = __DATA_DIR__

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json
format = "pretty"
"#
    .replace(
        "__DATA_DIR__",
        &toml::Value::String(default_data_dir()).to_string(),
    )
}
