//! Configuration management for the quote router
//!
//! Loads configuration from config.toml at startup.
//! Durations and queue sizes are tunable here rather than hardcoded.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::Pair;

/// Application configuration
///
/// Loaded from config.toml at startup. Every section falls back to its
/// defaults when omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Router timing and queue settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Tracked pairs for the demo feed
    #[serde(default)]
    pub feed: FeedConfig,

    /// Status API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Router timing and queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Time without a trade after which a pair's highlight is cleared
    #[serde(default = "default_flash_window_ms")]
    pub flash_window_ms: u64,

    /// Delay before a history row's highlight is cleared
    #[serde(default = "default_highlight_delay_ms")]
    pub highlight_delay_ms: u64,

    /// Capacity of every router queue; producers block when it is full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Tracked pairs and synthetic feed cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Watchlist pairs, as "BASE/QUOTE"
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,

    /// Pair shown in the trade history; first watchlist pair when unset
    #[serde(default)]
    pub history_pair: Option<String>,

    /// Interval between synthetic updates
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Status API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            flash_window_ms: default_flash_window_ms(),
            highlight_delay_ms: default_highlight_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            pairs: default_pairs(),
            history_pair: None,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
        }
    }
}

fn default_flash_window_ms() -> u64 {
    400
}

fn default_highlight_delay_ms() -> u64 {
    400
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_pairs() -> Vec<String> {
    vec![
        "BTC/USD".to_string(),
        "ETH/USD".to_string(),
        "LTC/USD".to_string(),
    ]
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    5000
}

impl RouterConfig {
    #[inline]
    pub fn flash_window(&self) -> Duration {
        Duration::from_millis(self.flash_window_ms)
    }

    #[inline]
    pub fn highlight_delay(&self) -> Duration {
        Duration::from_millis(self.highlight_delay_ms)
    }

    /// Reject values the routers cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flash_window_ms == 0 {
            return Err(ConfigError::Invalid("router.flash_window_ms must be > 0".into()));
        }
        if self.highlight_delay_ms == 0 {
            return Err(ConfigError::Invalid("router.highlight_delay_ms must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("router.queue_capacity must be > 0".into()));
        }
        Ok(())
    }
}

impl FeedConfig {
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Parse the watchlist pairs
    pub fn parsed_pairs(&self) -> Result<Vec<Pair>, ConfigError> {
        self.pairs
            .iter()
            .map(|p| p.parse::<Pair>().map_err(|_| ConfigError::Invalid(format!("bad pair: {}", p))))
            .collect()
    }

    /// Pair for the history router
    pub fn parsed_history_pair(&self) -> Result<Pair, ConfigError> {
        match &self.history_pair {
            Some(p) => p
                .parse::<Pair>()
                .map_err(|_| ConfigError::Invalid(format!("bad history pair: {}", p))),
            None => self
                .parsed_pairs()?
                .into_iter()
                .next()
                .ok_or_else(|| ConfigError::Invalid("feed.pairs is empty".into())),
        }
    }
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed, or holds values
    /// the routers cannot run with.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        let config = match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(ConfigError::IoError(e)),
        };

        config.router.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
    /// Value out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) | ConfigError::Invalid(_) => None,
        }
    }
}
