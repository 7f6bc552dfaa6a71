//! Centralized file-based logging system
//!
//! Writes logs to files in logs/ directory, separated by log type:
//! - logs/main/ - General application logs (JSON)
//! - logs/error/ - Error and warning logs only
//! - logs/router/ - Quote and history routing logs
//!
//! Console output mirrors everything. `RUST_LOG` overrides the default
//! `info` filter.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Subdirectories created under the log root
const LOG_TYPES: [&str; 3] = ["main", "error", "router"];

/// Initialize centralized file logging
///
/// Creates the log directories and sets up file appenders for each log
/// type. The returned guards must be kept alive for the duration of the
/// program or buffered lines are lost.
pub fn init_logging() -> io::Result<Vec<WorkerGuard>> {
    init_logging_in(Path::new("logs"))
}

/// Same as [`init_logging`] with an explicit log root
pub fn init_logging_in(logs_dir: &Path) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(logs_dir)?;

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender(&logs_dir.join("main"), "main");
    guards.push(main_guard);

    let (error_appender, error_guard) = create_appender(&logs_dir.join("error"), "error");
    guards.push(error_guard);

    let (router_appender, router_guard) = create_appender(&logs_dir.join("router"), "router");
    guards.push(router_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let router_layer = tracing_subscriber::fmt::layer()
        .with_writer(router_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_router_target(metadata.target())
        }));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(router_layer)
        .with(console_layer)
        .init();

    tracing::info!("Logging system initialized. Log files in {}", logs_dir.display());

    Ok(guards)
}

fn create_log_dirs(logs_dir: &Path) -> io::Result<()> {
    for log_type in &LOG_TYPES {
        fs::create_dir_all(logs_dir.join(log_type))?;
    }
    Ok(())
}

fn is_router_target(target: &str) -> bool {
    target.contains("router") || target.contains("history")
}

/// Create a rolling file appender
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);

    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_router {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "router", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_history {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "history", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_api {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "api", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
