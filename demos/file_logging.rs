//! File logging example
//!
//! Demonstrates console output alongside a size-rotated JSON log file.
//!
//! Run with: cargo run --example file_logging

use rust_kafka_logger::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Kafka Logger - File Logging Example ===\n");

    let policy = RotationPolicy::new()
        .with_max_size(64 * 1024)
        .with_max_backups(3)
        .with_compression(true);

    let mut logger = Logger::builder()
        .min_level(LogLevel::Debug)
        .sink(ConsoleSink::new())
        .sink(
            RotatingFileSink::with_policy("application.log", policy)?
                .with_formatter(Formatter::new(OutputFormat::Json)),
        )
        .async_mode(1024)
        .build();

    println!("1. Logging to both console and file:");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Performing some operations:");
    for i in 1..=5 {
        logger
            .with_fields(LogContext::new().with_field("item", i))
            .info(format!("Processing item {}/5", i));
    }
    logger.info("All operations completed");

    if !logger.shutdown(Duration::from_secs(5)) {
        eprintln!("Logger did not shut down cleanly");
    }

    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' for the JSON log output");
    Ok(())
}
