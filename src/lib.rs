//! Quote routing core for a crypto watchlist
//!
//! Routes streamed quote and trade updates to a single consumer, adding
//! synthetic events that clear trade highlights once the market goes quiet.

pub mod core;
pub mod feed;
pub mod hot_path;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use crate::core::{HistoryUpdMsg, Pair, Quote, Trade, UpdateKind, UpdateMsg};
pub use hot_path::{HistoryRouter, QuoteRouter};
pub use infrastructure::config::{Config, RouterConfig};

use thiserror::Error;

/// Main error type for the quote router
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Outbound queue already taken")]
    OutboundTaken,

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<infrastructure::config::ConfigError> for RouterError {
    fn from(e: infrastructure::config::ConfigError) -> Self {
        RouterError::Config(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RouterError>;
