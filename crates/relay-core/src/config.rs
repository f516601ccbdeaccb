//! Configuration parsing for the relay system.
//!
//! Settings come from a single JSON file. The top level holds relay-wide
//! settings and an `actors` array where each entry describes one source or
//! sink. Each actor receives its own config struct explicitly; there is no
//! global config instance.
//!
//! # Example config
//!
//! ```json
//! {
//!   "relay": { "module_name": "relay", "interval_secs": 60, "coins": ["bitcoin", "ethereum"] },
//!   "actors": [
//!     { "kind": "price_api", "key": "coingecko" },
//!     { "kind": "broker_writer", "key": "bus-out", "brokers": ["localhost:9092"] },
//!     { "kind": "store_writer", "key": "tsdb", "url": "memory://market" }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelaySettings,

    /// One entry per actor instance.
    pub actors: Vec<ActorConfig>,
}

impl AppConfig {
    /// Reject configs the runner cannot act on.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.relay.interval_secs == 0 {
            return Err(RelayError::Config("relay.interval_secs must be > 0".into()));
        }
        let mut seen = HashSet::new();
        for actor in &self.actors {
            if actor.key().is_empty() {
                return Err(RelayError::Config("actor key must not be empty".into()));
            }
            if !seen.insert(actor.key()) {
                return Err(RelayError::Config(format!("duplicate actor key: {}", actor.key())));
            }
            if let ActorConfig::StoreReader(c) | ActorConfig::StoreWriter(c) = actor {
                if c.pool_size == 0 {
                    return Err(RelayError::Config(format!("{}: pool_size must be > 0", c.key)));
                }
            }
        }
        Ok(())
    }
}

/// Relay-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Directory for daily-rotating log files.
    #[serde(default)]
    pub log_path: Option<String>,

    /// Seconds between relay ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Coin ids to relay (price-API ids, e.g. `"bitcoin"`).
    #[serde(default = "default_coins")]
    pub coins: Vec<String>,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// Day range for OHLCV fetches.
    #[serde(default = "default_ohlcv_days")]
    pub ohlcv_days: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            module_name: default_module_name(),
            log_path: None,
            interval_secs: default_interval_secs(),
            coins: default_coins(),
            vs_currency: default_vs_currency(),
            ohlcv_days: default_ohlcv_days(),
        }
    }
}

/// One actor, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorConfig {
    PriceApi(PriceApiConfig),
    BrokerReader(BrokerConfig),
    BrokerWriter(BrokerConfig),
    StoreReader(StoreConfig),
    StoreWriter(StoreConfig),
}

impl ActorConfig {
    pub fn key(&self) -> &str {
        match self {
            Self::PriceApi(c) => &c.key,
            Self::BrokerReader(c) | Self::BrokerWriter(c) => &c.key,
            Self::StoreReader(c) | Self::StoreWriter(c) => &c.key,
        }
    }
}

// ---------------------------------------------------------------------------
// Price API
// ---------------------------------------------------------------------------

/// Public price API (CoinGecko-compatible REST).
#[derive(Debug, Clone, Deserialize)]
pub struct PriceApiConfig {
    pub key: String,

    #[serde(default = "default_price_api_url")]
    pub base_url: String,

    /// Sent as `x-cg-pro-api-key` when present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout enforced by the HTTP client.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl PriceApiConfig {
    pub fn new(key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { key: key.into(), base_url: base_url.into(), api_key: None, timeout_ms: default_timeout_ms(), user_agent: None }
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Message-broker reader/writer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub key: String,

    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Consumer group (reader only).
    #[serde(default = "default_group_id")]
    pub group_id: String,

    #[serde(default)]
    pub topics: TopicNames,

    /// Maximum records per poll (reader only).
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: usize,
}

impl BrokerConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            brokers: default_brokers(),
            client_id: default_client_id(),
            group_id: default_group_id(),
            topics: TopicNames::default(),
            max_poll_records: default_max_poll_records(),
        }
    }
}

/// Topic per canonical value type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicNames {
    #[serde(default = "default_prices_topic")]
    pub prices: String,
    #[serde(default = "default_candles_topic")]
    pub candles: String,
    #[serde(default = "default_analytics_topic")]
    pub analytics: String,
    #[serde(default = "default_top_of_book_topic")]
    pub top_of_book: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            prices: default_prices_topic(),
            candles: default_candles_topic(),
            analytics: default_analytics_topic(),
            top_of_book: default_top_of_book_topic(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Time-series store reader/writer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub key: String,

    #[serde(default = "default_store_url")]
    pub url: String,

    /// Prefix for the per-type tables (`<prefix>prices`, `<prefix>candles`...).
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Number of pooled connections to register.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl StoreConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), url: default_store_url(), table_prefix: default_table_prefix(), pool_size: default_pool_size() }
    }

    pub fn table(&self, name: &str) -> String {
        format!("{}{name}", self.table_prefix)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_module_name() -> String {
    "market-relay".into()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_coins() -> Vec<String> {
    vec!["bitcoin".into(), "ethereum".into()]
}

fn default_vs_currency() -> String {
    "usd".into()
}

fn default_ohlcv_days() -> u32 {
    1
}

fn default_price_api_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".into()]
}

fn default_client_id() -> String {
    "market-relay".into()
}

fn default_group_id() -> String {
    "market-relay".into()
}

fn default_max_poll_records() -> usize {
    500
}

fn default_prices_topic() -> String {
    "crypto.prices".into()
}

fn default_candles_topic() -> String {
    "crypto.ohlcv".into()
}

fn default_analytics_topic() -> String {
    "crypto.analytics".into()
}

fn default_top_of_book_topic() -> String {
    "crypto.top-of-book".into()
}

fn default_store_url() -> String {
    "memory://market".into()
}

fn default_table_prefix() -> String {
    "crypto_".into()
}

fn default_pool_size() -> usize {
    1
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
