//! Logging macros with `format!`-style arguments
//!
//! The first argument is anything with the logger's level methods: a
//! [`Logger`](crate::Logger) or a [`LogScope`](crate::core::LogScope).
//!
//! # Examples
//!
//! ```
//! use rust_kafka_logger::prelude::*;
//! use rust_kafka_logger::{info, tlog};
//!
//! let logger = Logger::new();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! let scope = logger.with_fields(LogContext::new().with_field("user", 42));
//! info!(scope, "User performed action: {}", "login");
//!
//! tlog!(logger, LogLevel::Warn, "audit", "Failed login for {}", "bob");
//! ```

/// Log a formatted message at the given level.
///
/// ```
/// # use rust_kafka_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_kafka_logger::log;
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a formatted message routed to a broker topic.
///
/// ```
/// # use rust_kafka_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_kafka_logger::tlog;
/// tlog!(logger, LogLevel::Info, "billing", "Invoice {} paid", 1042);
/// ```
#[macro_export]
macro_rules! tlog {
    ($logger:expr, $level:expr, $topic:expr, $($arg:tt)+) => {
        $logger.with_topic($topic).log($level, format!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message. The process keeps running.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
