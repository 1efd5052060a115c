//! Broker logging example
//!
//! Sends envelope-enriched records through the broker pipeline. Without the
//! `kafka` feature the records are captured in memory and printed; with it,
//! they go to the brokers named by `RKKAFKA_BROKERS` (default
//! `localhost:9092`).
//!
//! Run with: cargo run --example broker_logging
//!      or:  cargo run --example broker_logging --features kafka

use rust_kafka_logger::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Kafka Logger - Broker Logging Example ===\n");

    let mut config = LoggerConfig {
        enable_kafka: true,
        kafka: ProducerConfig {
            key: KeyStrategy::Level,
            ..ProducerConfig::default()
        },
        ..LoggerConfig::default()
    };
    config.apply_process_env()?;

    #[cfg(feature = "kafka")]
    let (mut logger, captured) = (
        config.build()?,
        None::<crossbeam_channel::Receiver<rust_kafka_logger::broker::ProducerMessage>>,
    );

    #[cfg(not(feature = "kafka"))]
    let (mut logger, captured) = {
        let (client, broker) = ChannelClient::bounded(64);
        (config.build_with_client(Some(Box::new(client)))?, Some(broker))
    };

    println!("1. Default topic and routed topics:");
    logger.info("Service started");
    logger.t_warn("audit", "Admin login from new address");
    logger
        .with_topic("billing")
        .with_field("invoice", 1042)
        .error("Payment declined");

    println!("\n2. Redacting through the filter hook:");
    logger.set_filter_fn(|record: &mut Record| {
        if record.remove("card_number").is_some() {
            record.insert("redacted".into(), serde_json::Value::Bool(true));
        }
    })?;
    logger
        .with_fields(LogContext::new().with_field("card_number", "4111111111111111"))
        .warn("Card rejected");

    if !logger.shutdown(Duration::from_secs(10)) {
        eprintln!("Logger did not shut down cleanly");
    }

    if let Some(broker) = captured {
        println!("\n3. Captured broker messages:");
        for message in broker.try_iter() {
            println!(
                "   topic={} key={} value={}",
                message.topic,
                message.key,
                message.value_str().unwrap_or("<binary>")
            );
        }
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
