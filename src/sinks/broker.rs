//! Broker sink
//!
//! Renders each entry as a JSON record and hands it to the broker pipeline,
//! either straight to the producer (hook mode) or through a
//! [`BrokerWriter`] (stream mode).

use crate::broker::{BrokerProducer, BrokerWriter};
use crate::core::{Formatter, LogEntry, LoggerError, OutputFormat, Result, Sink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    /// Call `send_message` on the producer for each entry
    #[default]
    Hook,
    /// Write each rendered record through a lifecycle-safe writer
    Stream,
}

impl std::str::FromStr for BrokerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hook" => Ok(BrokerMode::Hook),
            "stream" | "writer" => Ok(BrokerMode::Stream),
            _ => Err(format!("Invalid broker mode: '{}'", s)),
        }
    }
}

enum Delivery {
    Hook(Arc<BrokerProducer>),
    Stream(Arc<BrokerWriter>),
}

pub struct BrokerSink {
    formatter: Formatter,
    delivery: Delivery,
}

impl BrokerSink {
    pub fn new(producer: Arc<BrokerProducer>, mode: BrokerMode) -> Self {
        let delivery = match mode {
            BrokerMode::Hook => Delivery::Hook(producer),
            BrokerMode::Stream => Delivery::Stream(Arc::new(BrokerWriter::new(producer))),
        };
        let mut formatter = Formatter::new(OutputFormat::Json);
        if let Some(envelope) = delivery_producer(&delivery).envelope() {
            formatter = formatter.with_field_names(envelope.config().field_names());
        }
        Self {
            formatter,
            delivery,
        }
    }

    /// Replace the formatter; text output is rejected since the pipeline
    /// only accepts JSON records
    pub fn with_formatter(mut self, formatter: Formatter) -> Result<Self> {
        if !formatter.format().is_structured() {
            return Err(LoggerError::config(
                "broker sink",
                "the broker sink requires a JSON or CloudEvents formatter",
            ));
        }
        self.formatter = formatter;
        Ok(self)
    }

    pub fn mode(&self) -> BrokerMode {
        match self.delivery {
            Delivery::Hook(_) => BrokerMode::Hook,
            Delivery::Stream(_) => BrokerMode::Stream,
        }
    }

    pub fn producer(&self) -> &Arc<BrokerProducer> {
        delivery_producer(&self.delivery)
    }

    /// The writer used in stream mode
    pub fn writer(&self) -> Option<&Arc<BrokerWriter>> {
        match &self.delivery {
            Delivery::Stream(writer) => Some(writer),
            Delivery::Hook(_) => None,
        }
    }
}

fn delivery_producer(delivery: &Delivery) -> &Arc<BrokerProducer> {
    match delivery {
        Delivery::Hook(producer) => producer,
        Delivery::Stream(writer) => writer.producer(),
    }
}

impl Sink for BrokerSink {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let payload = self.formatter.render(entry)?;
        match &self.delivery {
            Delivery::Hook(producer) => producer.send_message(payload.as_bytes()),
            Delivery::Stream(writer) => writer.write(payload.as_bytes()).map(|_| ()),
        }
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        match &self.delivery {
            Delivery::Stream(writer) => match writer.close() {
                Err(LoggerError::AlreadyClosed) | Ok(()) => Ok(()),
                Err(e) => Err(e),
            },
            Delivery::Hook(_) => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "broker"
    }
}
