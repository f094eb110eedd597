use std::collections::BTreeMap;

/// A single field value as stored in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// RFC 3339 timestamp, kept as the database reported it.
    Timestamp(String),
    String(String),
    /// Base64 payload, kept encoded.
    Bytes(String),
    /// Full resource name of the referenced document.
    Reference(String),
    GeoPoint { latitude: f64, longitude: f64 },
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Reference(_) => "reference",
            FieldValue::GeoPoint { .. } => "geo_point",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}
