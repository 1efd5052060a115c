//! Basic logger usage example
//!
//! Demonstrates console logging at different levels, scoped fields and the
//! formatting macros.
//!
//! Run with: cargo run --example basic_usage

use rust_kafka_logger::prelude::*;
use rust_kafka_logger::{info, warn};

fn main() -> Result<()> {
    println!("=== Rust Kafka Logger - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .min_level(LogLevel::Trace)
        .sink(ConsoleSink::new())
        .field("service", "basic-demo")
        .build();

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");
    logger.fatal("This is a fatal message");

    println!("\n2. Raising the minimum level to INFO:");
    logger.set_min_level(LogLevel::Info);
    logger.trace("Trace message (hidden)");
    logger.debug("Debug message (hidden)");
    logger.info("Info message (visible)");

    println!("\n3. Scoped fields:");
    let request = logger.with_fields(LogContext::new().with_field("request_id", "r-42"));
    request.info("Request received");
    request
        .with_field("elapsed_ms", 812)
        .warn("Request slower than expected");

    println!("\n4. Formatting macros:");
    let items = 3;
    info!(logger, "Processed {} items", items);
    warn!(request, "Retry {} of {}", 1, 3);

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
