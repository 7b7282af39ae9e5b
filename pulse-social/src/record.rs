//! Canonical, display-ready records produced by the fetchers.
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::FetchError;

/// Rendering of a value the source payload did not provide.
pub const MISSING: &str = "N/A";

/// One extracted field. Scalars keep their type until rendered; anything the
/// payload lacked (or that failed to parse) is [`FieldValue::Missing`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    #[default]
    Missing,
}

impl FieldValue {
    /// Scalar JSON maps to its typed variant. `null`, empty strings, arrays
    /// and objects are `Missing`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) if s.trim().is_empty() => FieldValue::Missing,
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Float))
                .unwrap_or(FieldValue::Missing),
            Value::Null | Value::Array(_) | Value::Object(_) => FieldValue::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Missing => f.write_str(MISSING),
        }
    }
}

// Rendered at the presentation boundary: every value becomes a string.
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Ordered label → value mapping. Serializes as a JSON object in field order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalRecord {
    fields: Vec<(String, FieldValue)>,
}

impl CanonicalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `label`, replacing an existing value in place.
    pub fn insert(&mut self, label: impl Into<String>, value: FieldValue) {
        let label = label.into();
        match self.fields.iter_mut().find(|(l, _)| *l == label) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for CanonicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Successful fetch: one record, or an ordered feed of records.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutput {
    Record(CanonicalRecord),
    Records(Vec<CanonicalRecord>),
}

impl FetchOutput {
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        match self {
            FetchOutput::Record(r) => vec![r],
            FetchOutput::Records(rs) => rs,
        }
    }
}

/// Per-identifier failure as reported to batch callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "Requested Identifier")]
    pub identifier: String,
    #[serde(rename = "Status")]
    pub status: &'static str,
    #[serde(rename = "Error Details")]
    pub details: String,
    #[serde(rename = "Error Kind")]
    pub kind: &'static str,
    #[serde(rename = "Platform")]
    pub platform: String,
}

impl ErrorRecord {
    pub const FAILED: &'static str = "Failed";

    pub fn new(
        identifier: impl Into<String>,
        platform: impl Into<String>,
        kind: &'static str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            status: Self::FAILED,
            details: details.into(),
            kind,
            platform: platform.into(),
        }
    }

    pub fn from_error(identifier: &str, platform: &str, error: &FetchError) -> Self {
        Self::new(identifier, platform, error.kind(), error.to_string())
    }
}
