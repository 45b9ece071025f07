//! # Order Core Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_STOCK_POLICY=reject                                          │
//! │     TALLY_DB_PATH=/var/lib/tally/tally.db                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path argument, else $TALLY_CONFIG, else                            │
//! │     ~/.config/tally-pos/orders.toml (Linux)                            │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     allow_negative stock, 5 attempts, TRX codes                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # orders.toml
//! [stock]
//! policy = "allow_negative"  # allow_negative | reject
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//!
//! [orders]
//! code_prefix = "TRX"
//! max_cart_items = 100
//! max_item_quantity = 9999
//! default_page_size = 20
//! max_page_size = 100
//!
//! [database]
//! path = "./tally.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//! ```

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_core::{CartLimits, StockPolicy, DEFAULT_ORDER_CODE_PREFIX, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};
use tally_db::DbConfig;
use tracing::{debug, info, warn};

use crate::error::{OrderError, OrderResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TALLY_CONFIG";

// =============================================================================
// Stock Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockSettings {
    /// What a shortage does to the sale.
    #[serde(default)]
    pub policy: StockPolicy,
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Replay of units of work that failed on a lock timeout, a stale stock
/// version or an order-code collision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total tries including the first one. 1 disables retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    500
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    /// Creates the exponential backoff for one operation.
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.initial_backoff_ms);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_attempts instead
            ..Default::default()
        }
    }
}

// =============================================================================
// Order Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// First segment of generated order codes.
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,

    #[serde(default = "default_max_cart_items")]
    pub max_cart_items: usize,

    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,

    /// Page size used when a list call passes 0.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_code_prefix() -> String {
    DEFAULT_ORDER_CODE_PREFIX.to_string()
}
fn default_max_cart_items() -> usize {
    MAX_CART_ITEMS
}
fn default_max_item_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}
fn default_page_size() -> u32 {
    20
}
fn default_max_page_size() -> u32 {
    100
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            code_prefix: default_code_prefix(),
            max_cart_items: default_max_cart_items(),
            max_item_quantity: default_max_item_quantity(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a unit of work waits on another writer before failing
    /// with a retryable error.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tally.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration of the order core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderConfig {
    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl OrderConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `$TALLY_CONFIG`, platform default)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> OrderResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading order config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load order config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document without touching the environment.
    pub fn from_toml(contents: &str) -> OrderResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrderResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(OrderError::Config("retry.max_attempts must be at least 1".into()));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(OrderError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        let prefix = self.orders.code_prefix.trim();
        if prefix.is_empty() || prefix.contains('-') {
            return Err(OrderError::Config(format!(
                "orders.code_prefix must be non-empty and contain no '-', got: '{}'",
                self.orders.code_prefix
            )));
        }

        if self.orders.max_cart_items == 0 || self.orders.max_item_quantity <= 0 {
            return Err(OrderError::Config(
                "orders.max_cart_items and orders.max_item_quantity must be positive".into(),
            ));
        }

        if self.orders.default_page_size == 0
            || self.orders.default_page_size > self.orders.max_page_size
        {
            return Err(OrderError::Config(
                "orders.default_page_size must be between 1 and orders.max_page_size".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(OrderError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    ///
    /// Unparseable values are logged and ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(policy) = std::env::var("TALLY_STOCK_POLICY") {
            match policy.parse::<StockPolicy>() {
                Ok(p) => {
                    debug!(policy = %p, "Overriding stock policy from environment");
                    self.stock.policy = p;
                }
                Err(e) => warn!(error = %e, "Ignoring TALLY_STOCK_POLICY"),
            }
        }

        if let Ok(attempts) = std::env::var("TALLY_RETRY_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring TALLY_RETRY_MAX_ATTEMPTS"),
            }
        }

        if let Ok(prefix) = std::env::var("TALLY_ORDER_CODE_PREFIX") {
            self.orders.code_prefix = prefix;
        }

        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("TALLY_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring TALLY_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(ms) = std::env::var("TALLY_DB_BUSY_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring TALLY_DB_BUSY_TIMEOUT_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("orders.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn cart_limits(&self) -> CartLimits {
        CartLimits {
            max_items: self.orders.max_cart_items,
            max_item_quantity: self.orders.max_item_quantity,
        }
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Clamps a requested page and page size to the configured bounds.
    ///
    /// Page numbers start at 1; a page size of 0 means "default".
    pub fn clamp_page(&self, page: u32, page_size: u32) -> (u32, u32) {
        let page = page.max(1);
        let page_size = match page_size {
            0 => self.orders.default_page_size,
            n => n.min(self.orders.max_page_size),
        };
        (page, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrderConfig::default();
        assert_eq!(config.stock.policy, StockPolicy::AllowNegative);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.orders.code_prefix, "TRX");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = OrderConfig::from_toml(
            r#"
            [stock]
            policy = "reject"

            [orders]
            max_page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.stock.policy, StockPolicy::Reject);
        assert_eq!(config.orders.max_page_size, 50);
        assert_eq!(config.orders.default_page_size, 20);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = OrderConfig::default();

        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
        config.retry.max_attempts = 1;

        config.orders.code_prefix = "TR-X".into();
        assert!(config.validate().is_err());
        config.orders.code_prefix = "POS".into();

        config.orders.default_page_size = 500;
        assert!(config.validate().is_err());
        config.orders.default_page_size = 10;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = OrderConfig::from_toml("[stock]\npolicy = \"whatever\"\n").unwrap_err();
        assert!(matches!(err, OrderError::Config(_)));
    }

    #[test]
    fn test_clamp_page() {
        let config = OrderConfig::default();
        assert_eq!(config.clamp_page(0, 0), (1, 20));
        assert_eq!(config.clamp_page(3, 1_000), (3, 100));
        assert_eq!(config.clamp_page(2, 15), (2, 15));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrderConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.orders.max_cart_items, MAX_CART_ITEMS);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&OrderConfig::default()).unwrap();
        assert!(toml_str.contains("[stock]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("allow_negative"));
    }
}
