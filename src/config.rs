//! Environment-based Configuration for the Relayer
//!
//! All deployment-specific values come from environment variables; components
//! receive them through this struct and never read the environment after
//! startup.
//!
//! # Environment Variables
//!
//! ## Runtime
//! - `ATLAS_ENV` - "production", "staging", or "development" (default: "development")
//! - `ATLAS_BTC_NETWORK` - "mainnet", "testnet", or "signet" (default: "testnet")
//! - `ATLAS_LOG_LEVEL` - Logging level (default: "info")
//! - `ATLAS_LOG_JSON` - Set to "1" for JSON log output
//!
//! ## Endpoints
//! - `ATLAS_BITCOIN_API` - Esplora-style Bitcoin API base URL
//! - `ATLAS_LEDGER_API` - Ledger-chain gateway base URL
//! - `ATLAS_API_PORT` - Port for the HTTP surface (default: 3001)
//!
//! ## Scanning
//! - `ATLAS_VAULT_ADDRESS` - Bitcoin address deposits are paid to (required)
//! - `ATLAS_SCAN_INTERVAL_SECS` - Scanner poll interval (default: 30)
//! - `ATLAS_PARAMS_REFRESH_SECS` - Global params refresh interval (default: 60)
//! - `ATLAS_REQUIRED_CONFIRMATIONS` - Confirmation depth before advancing (default: 6)
//! - `ATLAS_CURSOR_DB_PATH` - SQLite file for scan cursors (default: "data/cursors.db")
//! - `ATLAS_LAST_CONFIRMED_TIME_DEFAULT` - Default for the confirmed-time
//!   cursor when no value is persisted (ms since epoch, default: 0)

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Deployment environment
///
/// Injected into components that need environment-dependent behavior
/// (unstaking-period fallbacks) so both branches are testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnvironment {
    Production,
    Staging,
    Development,
}

impl RunEnvironment {
    /// Whether this deployment serves real funds
    pub fn is_production(&self) -> bool {
        matches!(self, RunEnvironment::Production)
    }
}

impl FromStr for RunEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(RunEnvironment::Production),
            "staging" => Ok(RunEnvironment::Staging),
            "development" | "dev" => Ok(RunEnvironment::Development),
            _ => Err(ConfigError::InvalidValue(
                "ATLAS_ENV".to_string(),
                format!("unknown environment: {}", s),
            )),
        }
    }
}

/// Bitcoin network the scanner follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
    Signet,
}

impl BtcNetwork {
    /// Stream identifier used in cursor keys
    pub fn stream_slug(&self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => "mainnet",
            BtcNetwork::Testnet => "testnet",
            BtcNetwork::Signet => "signet",
        }
    }

    /// Default Esplora-style API for this network
    pub fn default_bitcoin_api(&self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => "https://blockstream.info/api",
            BtcNetwork::Testnet => "https://blockstream.info/testnet/api",
            BtcNetwork::Signet => "https://blockstream.info/signet/api",
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            BtcNetwork::Mainnet => bitcoin::Network::Bitcoin,
            BtcNetwork::Testnet => bitcoin::Network::Testnet,
            BtcNetwork::Signet => bitcoin::Network::Signet,
        }
    }
}

impl FromStr for BtcNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(BtcNetwork::Mainnet),
            "testnet" | "test" => Ok(BtcNetwork::Testnet),
            "signet" => Ok(BtcNetwork::Signet),
            _ => Err(ConfigError::InvalidValue(
                "ATLAS_BTC_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    /// Deployment environment
    pub environment: RunEnvironment,

    /// Bitcoin network being scanned
    pub btc_network: BtcNetwork,

    /// Esplora-style Bitcoin API endpoint
    pub bitcoin_api: String,

    /// Ledger-chain gateway endpoint
    pub ledger_api: String,

    /// HTTP surface port
    pub api_port: u16,

    /// Bitcoin vault address deposits are paid to
    pub vault_address: String,

    /// Scanner poll interval in seconds
    pub scan_interval_secs: u64,

    /// Global params refresh interval in seconds
    pub params_refresh_secs: u64,

    /// Confirmation depth before a deposit leaves the mempool stage
    pub required_confirmations: u32,

    /// SQLite file backing the scan cursors
    pub cursor_db_path: String,

    /// Default for the confirmed-time cursor when no value is persisted
    pub last_confirmed_time_default: i64,

    /// Log level
    pub log_level: String,

    /// Emit JSON logs
    pub log_json: bool,
}

impl RelayerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment: RunEnvironment = env::var("ATLAS_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;

        let btc_network: BtcNetwork = env::var("ATLAS_BTC_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()?;

        let bitcoin_api = env::var("ATLAS_BITCOIN_API")
            .unwrap_or_else(|_| btc_network.default_bitcoin_api().to_string());

        let ledger_api = env::var("ATLAS_LEDGER_API")
            .map_err(|_| ConfigError::MissingEnvVar("ATLAS_LEDGER_API".to_string()))?;

        let vault_address = env::var("ATLAS_VAULT_ADDRESS")
            .map_err(|_| ConfigError::MissingEnvVar("ATLAS_VAULT_ADDRESS".to_string()))?;

        let api_port = parse_env_or("ATLAS_API_PORT", 3001)?;
        let scan_interval_secs = parse_env_or("ATLAS_SCAN_INTERVAL_SECS", 30)?;
        let params_refresh_secs = parse_env_or("ATLAS_PARAMS_REFRESH_SECS", 60)?;
        let required_confirmations = parse_env_or("ATLAS_REQUIRED_CONFIRMATIONS", 6)?;
        let last_confirmed_time_default = parse_env_or("ATLAS_LAST_CONFIRMED_TIME_DEFAULT", 0)?;

        let cursor_db_path =
            env::var("ATLAS_CURSOR_DB_PATH").unwrap_or_else(|_| "data/cursors.db".to_string());

        let log_level = env::var("ATLAS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("ATLAS_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            environment,
            btc_network,
            bitcoin_api,
            ledger_api,
            api_port,
            vault_address,
            scan_interval_secs,
            params_refresh_secs,
            required_confirmations,
            cursor_db_path,
            last_confirmed_time_default,
            log_level,
            log_json,
        })
    }

    /// Cursor stream key for the height cursor
    pub fn height_cursor_key(&self) -> String {
        format!("btc:{}:last_scanned_height", self.btc_network.stream_slug())
    }

    /// Cursor stream key for the confirmed-time cursor
    pub fn confirmed_time_cursor_key(&self) -> String {
        format!(
            "btc:{}:last_processed_confirmed_time",
            self.btc_network.stream_slug()
        )
    }
}

/// Parse an env var into T, falling back to `default` when unset
fn parse_env_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value.parse().map_err(|_| {
            ConfigError::InvalidValue(var_name.to_string(), format!("cannot parse: {}", value))
        }),
        Err(_) => Ok(default),
    }
}
