//! CloudEvents-style envelope enrichment
//!
//! The envelope stamps every broker record with an identity (`id`) and the
//! provenance fields `source`, `specversion` and `type`. The fixed fields are
//! built once per [`Envelope`]; only the id is computed per record.

use crate::core::{FieldNames, LoggerError, Record, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_HMAC_KEY: &str = "rust_kafka_logger";
pub const DEFAULT_SOURCE: &str = "https://github.com/kcenon/rust_kafka_logger";
pub const DEFAULT_SPEC_VERSION: &str = "1.0";
pub const DEFAULT_EVENT_TYPE: &str = "io.rust_kafka_logger.log";

pub const ID_FIELD: &str = "id";
pub const SOURCE_FIELD: &str = "source";
pub const SPEC_VERSION_FIELD: &str = "specversion";
pub const TYPE_FIELD: &str = "type";
pub const SUBJECT_FIELD: &str = "subject";
pub const DATA_FIELD: &str = "data";
pub const TIME_FIELD: &str = "time";

/// How the `id` field is generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdStrategy {
    /// Base64 HMAC-SHA256 of the message body; identical bodies share an id
    #[default]
    #[serde(rename = "hmac")]
    Hmac,
    /// Random version 4 UUID
    #[serde(rename = "uuid")]
    Uuid,
    /// Zero-padded 20 digit counter starting at 1
    #[serde(rename = "incr")]
    Incremental,
    /// Supplied by the caller through fields or a filter hook; never overwritten
    #[serde(rename = "func")]
    Caller,
}

impl std::str::FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hmac" => Ok(IdStrategy::Hmac),
            "uuid" => Ok(IdStrategy::Uuid),
            "incr" | "incremental" => Ok(IdStrategy::Incremental),
            "func" | "function" | "caller" => Ok(IdStrategy::Caller),
            _ => Err(format!("Invalid id strategy: '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub id_strategy: IdStrategy,
    /// Secret for the HMAC strategy
    pub hmac_key: String,
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    /// Emit the log level under `subject` instead of `level`
    pub set_subject_level: bool,
    /// Fixed `subject` value; ignored while `set_subject_level` is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::default(),
            hmac_key: DEFAULT_HMAC_KEY.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            spec_version: DEFAULT_SPEC_VERSION.to_string(),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            set_subject_level: true,
            subject: None,
        }
    }
}

impl EnvelopeConfig {
    /// Copy with defaults substituted for empty strings
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        fn fill(value: &mut String, default: &str) {
            if value.is_empty() {
                *value = default.to_string();
            }
        }
        fill(&mut self.hmac_key, DEFAULT_HMAC_KEY);
        fill(&mut self.source, DEFAULT_SOURCE);
        fill(&mut self.spec_version, DEFAULT_SPEC_VERSION);
        fill(&mut self.event_type, DEFAULT_EVENT_TYPE);
        if self.subject.as_deref() == Some("") {
            self.subject = None;
        }
        self
    }

    /// Name of the field carrying the log level
    pub fn level_field(&self) -> &'static str {
        if self.set_subject_level {
            SUBJECT_FIELD
        } else {
            "level"
        }
    }

    /// Formatter field names matching this envelope
    pub fn field_names(&self) -> FieldNames {
        FieldNames::envelope(self.set_subject_level)
    }
}

/// `{source, specversion, type}` plus a fixed subject if configured
pub fn build_fixed_fields(config: &EnvelopeConfig) -> Record {
    let config = config.clone().with_defaults();
    let mut fields = Record::new();
    fields.insert(SOURCE_FIELD.to_string(), Value::String(config.source));
    fields.insert(SPEC_VERSION_FIELD.to_string(), Value::String(config.spec_version));
    fields.insert(TYPE_FIELD.to_string(), Value::String(config.event_type));
    if !config.set_subject_level {
        if let Some(subject) = config.subject {
            fields.insert(SUBJECT_FIELD.to_string(), Value::String(subject));
        }
    }
    fields
}

/// Per-producer enricher
///
/// Safe to share between threads: the HMAC is built fresh per call and the
/// counter is atomic.
#[derive(Debug)]
pub struct Envelope {
    config: EnvelopeConfig,
    fixed: Record,
    sequence: AtomicU64,
}

impl Envelope {
    pub fn new(config: EnvelopeConfig) -> Self {
        let config = config.with_defaults();
        let fixed = build_fixed_fields(&config);
        Self {
            config,
            fixed,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    pub fn fixed_fields(&self) -> &Record {
        &self.fixed
    }

    pub fn level_field(&self) -> &'static str {
        self.config.level_field()
    }

    /// Compute the id for a record
    ///
    /// Returns `None` for [`IdStrategy::Caller`], meaning the existing id
    /// must be left alone.
    pub fn compute_id(&self, record: &Record) -> Result<Option<String>> {
        match self.config.id_strategy {
            IdStrategy::Hmac => self.hmac_id(record).map(Some),
            IdStrategy::Uuid => random_uuid().map(Some),
            IdStrategy::Incremental => Ok(Some(self.next_sequence())),
            IdStrategy::Caller => Ok(None),
        }
    }

    /// Stamp the id and fixed fields onto the record
    pub fn add_fields(&self, record: &mut Record) -> Result<()> {
        let id = self.compute_id(record)?;
        for (key, value) in &self.fixed {
            record.insert(key.clone(), value.clone());
        }
        if let Some(id) = id {
            record.insert(ID_FIELD.to_string(), Value::String(id));
        }
        Ok(())
    }

    fn hmac_id(&self, record: &Record) -> Result<String> {
        let body = match record.get(DATA_FIELD) {
            Some(Value::String(body)) => body,
            Some(_) => return Err(LoggerError::field_type(DATA_FIELD, "string")),
            None => return Err(LoggerError::missing_key(DATA_FIELD)),
        };

        let mut mac = HmacSha256::new_from_slice(self.config.hmac_key.as_bytes())
            .map_err(|e| LoggerError::config("envelope", e.to_string()))?;
        mac.update(body.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn next_sequence(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{:020}", n)
    }
}

fn random_uuid() -> Result<String> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| LoggerError::other(format!("failed to read randomness for event id: {}", e)))?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    fn envelope(strategy: IdStrategy) -> Envelope {
        Envelope::new(EnvelopeConfig {
            id_strategy: strategy,
            ..EnvelopeConfig::default()
        })
    }

    #[test]
    fn test_fixed_fields_substitute_defaults() {
        let config = EnvelopeConfig {
            source: String::new(),
            spec_version: String::new(),
            event_type: "custom.type".to_string(),
            ..EnvelopeConfig::default()
        };
        let fields = build_fixed_fields(&config);

        assert_eq!(fields[SOURCE_FIELD], DEFAULT_SOURCE);
        assert_eq!(fields[SPEC_VERSION_FIELD], DEFAULT_SPEC_VERSION);
        assert_eq!(fields[TYPE_FIELD], "custom.type");
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_fixed_subject_only_without_level_overload() {
        let config = EnvelopeConfig {
            set_subject_level: false,
            subject: Some("billing".to_string()),
            ..EnvelopeConfig::default()
        };
        assert_eq!(build_fixed_fields(&config)[SUBJECT_FIELD], "billing");
        assert_eq!(config.level_field(), "level");

        let overloaded = EnvelopeConfig {
            subject: Some("billing".to_string()),
            ..EnvelopeConfig::default()
        };
        assert!(!build_fixed_fields(&overloaded).contains_key(SUBJECT_FIELD));
        assert_eq!(overloaded.level_field(), SUBJECT_FIELD);
    }

    #[test]
    fn test_hmac_id_is_content_derived() {
        let env = envelope(IdStrategy::Hmac);
        let a = env.compute_id(&record(json!({"data": "hello", "n": 1}))).unwrap();
        let b = env.compute_id(&record(json!({"data": "hello", "n": 2}))).unwrap();
        let c = env.compute_id(&record(json!({"data": "hello!"}))).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hmac_id_matches_reference() {
        let env = envelope(IdStrategy::Hmac);
        let id = env.compute_id(&record(json!({"data": "hello"}))).unwrap();

        let mut mac = HmacSha256::new_from_slice(DEFAULT_HMAC_KEY.as_bytes()).unwrap();
        mac.update(b"hello");
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(id, Some(expected));
    }

    #[test]
    fn test_hmac_id_does_not_accumulate() {
        let env = envelope(IdStrategy::Hmac);
        let rec = record(json!({"data": "same"}));
        let first = env.compute_id(&rec).unwrap();
        for _ in 0..5 {
            assert_eq!(env.compute_id(&rec).unwrap(), first);
        }
    }

    #[test]
    fn test_hmac_requires_string_body() {
        let env = envelope(IdStrategy::Hmac);
        assert!(matches!(
            env.compute_id(&record(json!({"msg": "x"}))),
            Err(LoggerError::MissingKeyField { .. })
        ));
        assert!(matches!(
            env.compute_id(&record(json!({"data": 42}))),
            Err(LoggerError::FieldType { .. })
        ));
    }

    #[test]
    fn test_incremental_ids_start_at_one() {
        let env = envelope(IdStrategy::Incremental);
        let rec = Record::new();
        let ids: Vec<String> = (0..3)
            .map(|_| env.compute_id(&rec).unwrap().unwrap())
            .collect();

        assert_eq!(ids[0], "00000000000000000001");
        assert_eq!(ids[1], "00000000000000000002");
        assert_eq!(ids[2], "00000000000000000003");
        assert!(ids.iter().all(|id| id.len() == 20));
    }

    #[test]
    fn test_incremental_ids_unique_across_threads() {
        let env = Arc::new(envelope(IdStrategy::Incremental));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let env = Arc::clone(&env);
                thread::spawn(move || {
                    (0..250)
                        .map(|_| env.compute_id(&Record::new()).unwrap().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
        assert!(seen.contains("00000000000000001000"));
    }

    #[test]
    fn test_uuid_ids_are_v4() {
        let env = envelope(IdStrategy::Uuid);
        let id = env.compute_id(&Record::new()).unwrap().unwrap();
        let parsed = uuid::Uuid::parse_str(&id).unwrap();

        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(Some(id), env.compute_id(&Record::new()).unwrap());
    }

    #[test]
    fn test_caller_strategy_keeps_existing_id() {
        let env = envelope(IdStrategy::Caller);
        let mut rec = record(json!({"data": "x", "id": "order-17"}));

        env.add_fields(&mut rec).unwrap();

        assert_eq!(rec[ID_FIELD], "order-17");
        assert_eq!(rec[SOURCE_FIELD], DEFAULT_SOURCE);
    }

    #[test]
    fn test_add_fields_stamps_envelope() {
        let env = envelope(IdStrategy::Incremental);
        let mut rec = record(json!({"data": "x", "subject": "info"}));

        env.add_fields(&mut rec).unwrap();

        assert_eq!(rec[ID_FIELD], "00000000000000000001");
        assert_eq!(rec[SPEC_VERSION_FIELD], "1.0");
        assert_eq!(rec[TYPE_FIELD], DEFAULT_EVENT_TYPE);
        assert_eq!(rec["subject"], "info");
    }

    #[test]
    fn test_id_strategy_names() {
        assert_eq!("incr".parse::<IdStrategy>(), Ok(IdStrategy::Incremental));
        assert_eq!("func".parse::<IdStrategy>(), Ok(IdStrategy::Caller));
        assert_eq!(
            serde_json::to_string(&IdStrategy::Incremental).unwrap(),
            "\"incr\""
        );
    }
}
