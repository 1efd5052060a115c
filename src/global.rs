//! Process-wide logger
//!
//! For programs that want one logger reachable from anywhere:
//!
//! ```
//! use rust_kafka_logger::{global, LoggerConfig};
//! use std::time::Duration;
//!
//! let config = LoggerConfig {
//!     enable_console: false,
//!     ..LoggerConfig::default()
//! };
//! global::init(&config).unwrap();
//! global::info("service started");
//! global::shutdown(Duration::from_secs(1));
//! ```
//!
//! Calling a logging function before [`init`] prints
//! `[LOGGER ERROR] logger not initialized` to stderr and drops the message.

use crate::config::{
    ConfigSource, LoggerConfig, CONFIG_FILE_ENV, CONFIG_TYPE_ENV, DEFAULT_CONFIG_FILE,
};
use crate::core::{LogLevel, Logger, LoggerError, Result};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

static GLOBAL: RwLock<Option<Arc<Logger>>> = parking_lot::const_rwlock(None);

/// Build a logger from `config` and install it
pub fn init(config: &LoggerConfig) -> Result<()> {
    init_with(config.build()?);
    Ok(())
}

/// Install `logger`, replacing any previous one
///
/// A replaced logger shuts down once its last handle is dropped.
pub fn init_with(logger: Logger) {
    let previous = GLOBAL.write().replace(Arc::new(logger));
    drop(previous);
}

/// Configure from the environment and install
///
/// `RKLOG_CFGTYPE` picks the source (`env`, `file` or `both`, default
/// `env`); `RKLOG_CFGFILE` names the file (default `rk_log_config.toml`).
pub fn init_from_env() -> Result<()> {
    let source = match std::env::var(CONFIG_TYPE_ENV) {
        Ok(value) if !value.trim().is_empty() => value
            .parse::<ConfigSource>()
            .map_err(|e| LoggerError::config("environment", e))?,
        _ => ConfigSource::Env,
    };
    let path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);

    let config = LoggerConfig::load(source, Some(&path))?;
    init(&config)
}

/// The installed logger
pub fn logger() -> Option<Arc<Logger>> {
    GLOBAL.read().clone()
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Uninstall and shut down the logger
///
/// Returns `false` on timeout, or when another handle from [`logger`] is
/// still alive; that logger then shuts down when the last handle drops.
pub fn shutdown(timeout: Duration) -> bool {
    let Some(logger) = GLOBAL.write().take() else {
        return true;
    };
    match Arc::try_unwrap(logger) {
        Ok(mut logger) => logger.shutdown(timeout),
        Err(_) => {
            eprintln!(
                "[LOGGER WARNING] Global logger is still in use; \
                 it will shut down when the last handle is dropped"
            );
            false
        }
    }
}

pub fn log(level: LogLevel, message: impl Into<String>) {
    match GLOBAL.read().as_ref() {
        Some(logger) => logger.log(level, message),
        None => eprintln!("[LOGGER ERROR] logger not initialized"),
    }
}

pub fn t_log(level: LogLevel, topic: impl Into<String>, message: impl Into<String>) {
    match GLOBAL.read().as_ref() {
        Some(logger) => logger.with_topic(topic).log(level, message),
        None => eprintln!("[LOGGER ERROR] logger not initialized"),
    }
}

pub fn trace(message: impl Into<String>) {
    log(LogLevel::Trace, message);
}

pub fn debug(message: impl Into<String>) {
    log(LogLevel::Debug, message);
}

pub fn info(message: impl Into<String>) {
    log(LogLevel::Info, message);
}

pub fn warn(message: impl Into<String>) {
    log(LogLevel::Warn, message);
}

pub fn error(message: impl Into<String>) {
    log(LogLevel::Error, message);
}

pub fn fatal(message: impl Into<String>) {
    log(LogLevel::Fatal, message);
}
