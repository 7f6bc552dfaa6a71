//! Infrastructure - cold path only
//!
//! This module contains code that never sits between a producer and the
//! consumer:
//! - Logging and metrics
//! - Configuration management
//! - Status API

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

pub use api::{start_server, AppState};
pub use metrics::{MetricsCollector, MetricsSnapshot};
