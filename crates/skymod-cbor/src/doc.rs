//! Semi-structured record documents decoded from DAG-CBOR blocks.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde_cbor::Value;
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use crate::cid::Cid;

/// CBOR tag marking a content link.
pub const LINK_TAG: u64 = 42;

/// A decoded record: a CBOR map keyed by text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: BTreeMap<Value, Value>,
}

impl Document {
    /// Decode a block, isolating the decoder so that an internal fault on a
    /// malformed block surfaces as [`DecodeError::Fault`].
    pub fn decode_guarded(bytes: &[u8]) -> Result<Self, DecodeError> {
        guard_decode(bytes, Self::decode)
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        match serde_cbor::from_slice::<Value>(bytes)? {
            Value::Map(fields) => Ok(Self { fields }),
            other => Err(DecodeError::NotAMap {
                found: kind_name(&other),
            }),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(&Value::Text(field.to_owned()))
    }

    /// Read a field that must be present and hold a text string.
    pub fn required_str(&self, field: &str) -> Result<&str, ShapeError> {
        match self.get(field) {
            Some(Value::Text(text)) => Ok(text),
            Some(other) => Err(ShapeError::WrongType {
                field: field.to_owned(),
                expected: "text",
                found: kind_name(other),
            }),
            None => Err(ShapeError::Missing {
                field: field.to_owned(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as JSON for diagnostics. Links become `{"$link": cid}` and
    /// byte strings `{"$bytes": hex}`.
    pub fn to_json(&self) -> JsonValue {
        map_to_json(&self.fields)
    }
}

/// Run `decode` over `bytes`, converting an unwinding fault inside the
/// decoder into [`DecodeError::Fault`].
pub fn guard_decode<T, F>(bytes: &[u8], decode: F) -> Result<T, DecodeError>
where
    F: FnOnce(&[u8]) -> Result<T, DecodeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| decode(bytes))) {
        Ok(result) => result,
        Err(payload) => Err(DecodeError::Fault(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "decoder panicked".to_owned()
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::Text(_) => "text",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Tag(_, _) => "tag",
        _ => "unknown",
    }
}

fn map_to_json(map: &BTreeMap<Value, Value>) -> JsonValue {
    let mut out = JsonMap::new();
    for (key, value) in map {
        let key = match key {
            Value::Text(text) => text.clone(),
            other => to_json(other).to_string(),
        };
        out.insert(key, to_json(value));
    }
    JsonValue::Object(out)
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => i64::try_from(*i)
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(i.to_string())),
        Value::Float(f) => json!(f),
        Value::Bytes(bytes) => match Cid::from_link_bytes(bytes) {
            Ok(cid) if bytes.first() == Some(&0) => json!({ "$link": cid.to_string() }),
            _ => json!({ "$bytes": hex::encode(bytes) }),
        },
        Value::Text(text) => JsonValue::String(text.clone()),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => map_to_json(map),
        Value::Tag(LINK_TAG, inner) => match inner.as_ref() {
            Value::Bytes(bytes) => match Cid::from_link_bytes(bytes) {
                Ok(cid) => json!({ "$link": cid.to_string() }),
                Err(_) => json!({ "$bytes": hex::encode(bytes) }),
            },
            other => to_json(other),
        },
        Value::Tag(_, inner) => to_json(inner),
        _ => JsonValue::Null,
    }
}

/// Error raised when a block cannot be decoded into a [`Document`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed cbor: {0}")]
    Malformed(#[from] serde_cbor::Error),
    #[error("expected a map at top level, found {found}")]
    NotAMap { found: &'static str },
    #[error("decoder fault: {0}")]
    Fault(String),
}

/// Error raised when a decoded document lacks an expected field shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("field '{field}' is missing")]
    Missing { field: String },
    #[error("field '{field}' should be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}
