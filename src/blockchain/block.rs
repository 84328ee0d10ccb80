use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Timestamp layout used when the caller does not pick one.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("payload cannot be encoded as JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid timestamp format {0:?}")]
    TimeFormat(String),
}

/// Opaque block content, held as a JSON value tree so that any payload has
/// exactly one canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// Encode any serializable value. Maps with non-string keys (e.g. tuples)
    /// are rejected here, before a block can be built. Non-finite floats are
    /// not rejected: they encode as `null`, like `()`.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, BlockError> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Raw bytes are stored as lowercase hex text.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(Value::String(hex::encode(bytes)))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(Value::String(text.to_owned()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(Value::String(text))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A single record of the ledger. Every field is fixed at construction except
/// `nonce`, which only mining changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) payload: Payload,
    pub(crate) timestamp: String,
    pub(crate) previous_hash: Option<String>, // None for genesis
    pub(crate) nonce: u64,
}

impl Block {
    /// Create an unmined block stamped with the current local time.
    pub fn new(index: u64, payload: impl Into<Payload>, previous_hash: Option<String>) -> Self {
        let timestamp = Local::now().format(DEFAULT_TIME_FORMAT).to_string();
        Self::with_timestamp(index, payload, previous_hash, timestamp)
    }

    /// Like [`Block::new`], rendering the current time with a strftime-style `time_format`.
    pub fn with_time_format(
        index: u64,
        payload: impl Into<Payload>,
        previous_hash: Option<String>,
        time_format: &str,
    ) -> Result<Self, BlockError> {
        if StrftimeItems::new(time_format).any(|item| matches!(item, Item::Error)) {
            return Err(BlockError::TimeFormat(time_format.to_owned()));
        }
        // Some items only work for parsing and fail when rendered (e.g. `%#z`).
        let mut timestamp = String::new();
        write!(&mut timestamp, "{}", Local::now().format(time_format))
            .map_err(|_| BlockError::TimeFormat(time_format.to_owned()))?;
        Ok(Self::with_timestamp(index, payload, previous_hash, timestamp))
    }

    /// Rebuild a block around an already rendered timestamp.
    pub fn with_timestamp(
        index: u64,
        payload: impl Into<Payload>,
        previous_hash: Option<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            index,
            payload: payload.into(),
            timestamp: timestamp.into(),
            previous_hash,
            nonce: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub(crate) fn bump_nonce(&mut self) {
        self.nonce = self.nonce.wrapping_add(1);
    }

    /// Canonical encoding of every field: compact JSON with object keys sorted
    /// at every level. This string is the hash preimage.
    pub fn dump(&self) -> String {
        let previous_hash = match &self.previous_hash {
            Some(hash) => Value::String(hash.clone()),
            None => Value::Null,
        };
        let fields = BTreeMap::from([
            ("index", Value::from(self.index)),
            ("nonce", Value::from(self.nonce)),
            ("payload", canonical(self.payload.0.clone())),
            ("previous_hash", previous_hash),
            ("timestamp", Value::String(self.timestamp.clone())),
        ]);
        let object = fields
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect();
        Value::Object(object).to_string()
    }

    /// Lowercase hex SHA-256 of [`Block::dump`]. Recomputed on every call.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.dump().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Re-key every object through a `BTreeMap` so key order never depends on
/// which map backend serde_json was built with.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}
