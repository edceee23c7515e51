//! ZaLift Configuration
//!
//! Shared configuration crate for the ledger, campaigns and the decryption
//! oracle.
//!
//! Handles loading configuration from:
//! 1. ZALIFT_CONFIG env var (explicit path)
//! 2. ./zalift.toml (current directory)
//! 3. ~/.zalift/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ZaliftConfig> = OnceLock::new();

const LOCAL_CONFIG_FILE: &str = "zalift.toml";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".zalift";

// ============================================================================
// Default Constants
// ============================================================================

/// Sepolia, where the original deployment lives.
const DEFAULT_CHAIN_ID: u64 = 11155111;

const DEFAULT_TOKEN_NAME: &str = "fUSDT";
const DEFAULT_TOKEN_SYMBOL: &str = "fUSDT";
const DEFAULT_DECIMALS: u8 = 6;

const DEFAULT_DB_PATH: &str = "./zalift-db";

const DEFAULT_MAX_DURATION_DAYS: u64 = 365;
const DEFAULT_POLL_INTERVAL_MS: u64 = 25;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaliftConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub decryption: DecryptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

/// Confidential token metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_token_name")]
    pub name: String,
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Lets any account mint encrypted amounts to itself.
    #[serde(default)]
    pub open_faucet: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOKEN_NAME.into(),
            symbol: DEFAULT_TOKEN_SYMBOL.into(),
            decimals: DEFAULT_DECIMALS,
            open_faucet: false,
        }
    }
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.into()
}
fn default_token_symbol() -> String {
    DEFAULT_TOKEN_SYMBOL.into()
}
fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

/// State store selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Rocksdb,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::Rocksdb),
            other => anyhow::bail!("unknown store backend '{}'", other),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub backend: StoreBackend,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.into(),
            backend: StoreBackend::Memory,
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.into()
}

/// Decryption oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionConfig {
    /// Longest validity window a user authorization may ask for.
    #[serde(default = "default_max_duration_days")]
    pub max_duration_days: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Artificial latency before each response.
    #[serde(default)]
    pub response_delay_ms: u64,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            max_duration_days: DEFAULT_MAX_DURATION_DAYS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            response_delay_ms: 0,
        }
    }
}

fn default_max_duration_days() -> u64 {
    DEFAULT_MAX_DURATION_DAYS
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable value for {}", key);
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ZaliftConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("ZALIFT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("ZALIFT_CONFIG points to missing file: {}", path.display());
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        env_parse("ZALIFT_CHAIN_ID", &mut self.chain.chain_id);

        // Database
        env_string("ZALIFT_DB_PATH", &mut self.database.path);
        env_parse("ZALIFT_DB_BACKEND", &mut self.database.backend);

        if let Some(v) = env_bool("ZALIFT_OPEN_FAUCET") {
            self.ledger.open_faucet = v;
        }

        // Decryption
        env_parse(
            "ZALIFT_DECRYPT_MAX_DAYS",
            &mut self.decryption.max_duration_days,
        );
        env_parse(
            "ZALIFT_DECRYPT_POLL_MS",
            &mut self.decryption.poll_interval_ms,
        );
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.ledger.open_faucet = true;
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ZaliftConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ZaliftConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ZaliftConfig) -> Result<(), ZaliftConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ZaliftConfig::global()`.
#[inline]
pub fn global_config() -> &'static ZaliftConfig {
    ZaliftConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ZaliftConfig::default();
        assert_eq!(config.chain.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.ledger.symbol, "fUSDT");
        assert_eq!(config.ledger.decimals, 6);
        assert!(!config.ledger.open_faucet);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.decryption.max_duration_days, 365);
    }

    #[test]
    fn test_generate_sample() {
        let sample = ZaliftConfig::generate_sample();
        assert!(sample.contains("[chain]"));
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[database]"));
        assert!(sample.contains("[decryption]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ZaliftConfig::generate_sample();
        let parsed: ZaliftConfig = toml::from_str(&sample).unwrap();
        assert!(parsed.ledger.open_faucet);
        assert_eq!(parsed.decryption.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: ZaliftConfig = toml::from_str(
            r#"
            [database]
            backend = "rocksdb"

            [decryption]
            response_delay_ms = 40
            "#,
        )
        .unwrap();
        assert_eq!(parsed.database.backend, StoreBackend::Rocksdb);
        assert_eq!(parsed.database.path, DEFAULT_DB_PATH);
        assert_eq!(parsed.decryption.response_delay_ms, 40);
        assert_eq!(parsed.decryption.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(parsed.chain.chain_id, DEFAULT_CHAIN_ID);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("zalift.toml");
        fs::write(&path, "[chain]\nchain_id = 31337\n").unwrap();

        let config = ZaliftConfig::load_from(&path).unwrap();
        // ZALIFT_CHAIN_ID is not set under test
        assert_eq!(config.chain.chain_id, 31337);
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("rocksdb".parse::<StoreBackend>().unwrap(), StoreBackend::Rocksdb);
        assert_eq!("RocksDB".parse::<StoreBackend>().unwrap(), StoreBackend::Rocksdb);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("rocksd".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_unknown_backend_keeps_current_value() {
        // Key used by this test only
        let key = "ZALIFT_TEST_DB_BACKEND_TYPO";
        unsafe { env::set_var(key, "rocksd") };

        let mut backend = StoreBackend::Rocksdb;
        env_parse(key, &mut backend);
        assert_eq!(backend, StoreBackend::Rocksdb);

        unsafe { env::set_var(key, "memory") };
        env_parse(key, &mut backend);
        assert_eq!(backend, StoreBackend::Memory);

        unsafe { env::remove_var(key) };
    }

    #[test]
    fn test_global_is_set_once() {
        let mut custom = ZaliftConfig::default();
        custom.chain.chain_id = 31337;
        let first = ZaliftConfig::set_global(custom);

        let global = ZaliftConfig::try_global().unwrap();
        if first.is_ok() {
            assert_eq!(global.chain.chain_id, 31337);
        }
        assert!(ZaliftConfig::set_global(ZaliftConfig::default()).is_err());
        assert!(std::ptr::eq(global, global_config()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ZaliftConfig::load_from(Path::new("/nonexistent/zalift.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
