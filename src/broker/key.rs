//! Partition key derivation
//!
//! The key is derived after the routing topic is removed and before any
//! filter hook or envelope enrichment touches the record.

use crate::core::{LoggerError, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Caller-supplied key derivation; may also mutate the record
pub type KeyFn = Arc<dyn Fn(&mut Record) -> String + Send + Sync>;

/// Caller-supplied record mutation run before enrichment
pub type FilterFn = Arc<dyn Fn(&mut Record) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Value of the level (or subject) field
    Level,
    /// Current Unix time in seconds
    Second,
    /// Current Unix time in nanoseconds
    Nanosecond,
    /// The configured key name, verbatim
    #[default]
    Fixed,
    /// Value of the field named by the key name; the field is removed
    Extracted,
    /// The registered key hook; falls back to `Level` without one
    Function,
}

impl KeyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStrategy::Level => "level",
            KeyStrategy::Second => "second",
            KeyStrategy::Nanosecond => "nanosecond",
            KeyStrategy::Fixed => "fixed",
            KeyStrategy::Extracted => "extracted",
            KeyStrategy::Function => "function",
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "level" => Ok(KeyStrategy::Level),
            "second" | "timesecond" => Ok(KeyStrategy::Second),
            "nanosecond" | "timenanosecond" => Ok(KeyStrategy::Nanosecond),
            "fixed" => Ok(KeyStrategy::Fixed),
            "extracted" => Ok(KeyStrategy::Extracted),
            "function" | "func" => Ok(KeyStrategy::Function),
            _ => Err(format!("Invalid key strategy: '{}'", s)),
        }
    }
}

/// Everything key derivation needs besides the record itself
#[derive(Clone, Copy)]
pub struct KeyPolicy<'a> {
    pub strategy: KeyStrategy,
    /// Fixed key, or the field name for `Extracted`
    pub key_name: &'a str,
    /// Field holding the level; `subject` when the envelope overloads it
    pub level_field: &'a str,
    pub key_fn: Option<&'a KeyFn>,
}

impl KeyPolicy<'_> {
    /// Derive the key for one record; never returns an empty key
    pub fn derive(&self, record: &mut Record) -> Result<String> {
        let key = match self.strategy {
            KeyStrategy::Fixed => self.key_name.to_string(),
            KeyStrategy::Extracted => extract_key(record, self.key_name)?,
            KeyStrategy::Second => unix_now().as_secs().to_string(),
            KeyStrategy::Nanosecond => unix_now().as_nanos().to_string(),
            KeyStrategy::Function => match self.key_fn {
                Some(key_fn) => key_fn(record),
                None => level_key(record, self.level_field)?,
            },
            KeyStrategy::Level => level_key(record, self.level_field)?,
        };

        if key.is_empty() {
            return Err(LoggerError::empty_key(self.strategy.as_str()));
        }
        Ok(key)
    }
}

fn extract_key(record: &mut Record, field: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(_)) => {}
        _ => return Err(LoggerError::missing_key(field)),
    }
    match record.remove(field) {
        Some(Value::String(key)) => Ok(key),
        _ => Err(LoggerError::missing_key(field)),
    }
}

fn level_key(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(level)) => Ok(level.clone()),
        Some(_) => Err(LoggerError::field_type(field, "string")),
        None => Err(LoggerError::missing_key(field)),
    }
}

fn unix_now() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
