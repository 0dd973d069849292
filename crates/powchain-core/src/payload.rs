use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// A simple value transfer record. The chain never inspects it; it only ends
/// up inside a [`Payload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pays {} {}", self.from, self.to, self.amount)
    }
}

/// Opaque block contents.
///
/// Only the canonical serialization matters: compact JSON with object keys
/// in sorted order. Two payloads hash the same iff their canonical forms are
/// byte-for-byte equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    /// A bare string payload, used for the genesis marker and for the
    /// tampering demo.
    pub fn marker(text: impl Into<String>) -> Self {
        Self(Value::String(text.into()))
    }

    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_value(value)?))
    }

    pub fn canonical(&self) -> String {
        self.0.to_string()
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::marker(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::marker(text)
    }
}

impl From<Vec<String>> for Payload {
    fn from(records: Vec<String>) -> Self {
        Self(Value::Array(records.into_iter().map(Value::String).collect()))
    }
}

impl From<Vec<&str>> for Payload {
    fn from(records: Vec<&str>) -> Self {
        Self(Value::Array(records.into_iter().map(Value::from).collect()))
    }
}

impl<const N: usize> From<[&str; N]> for Payload {
    fn from(records: [&str; N]) -> Self {
        Self(Value::Array(records.into_iter().map(Value::from).collect()))
    }
}

impl From<Vec<Transaction>> for Payload {
    fn from(txs: Vec<Transaction>) -> Self {
        Self(Value::Array(
            txs.into_iter()
                .map(|t| json!({ "from": t.from, "to": t.to, "amount": t.amount }))
                .collect(),
        ))
    }
}
