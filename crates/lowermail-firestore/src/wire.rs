//! JSON shapes of the Firestore v1 REST API and their mapping to domain types.

use crate::error::{FirestoreError, Result};
use lowermail_core::{Document, DocumentId, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DOCUMENT_NAME_FIELD: &str = "__name__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(Option<String>),
    BooleanValue(bool),
    /// int64 travels as a decimal string; plain numbers are accepted too.
    IntegerValue(serde_json::Value),
    /// Finite numbers, or the strings `NaN`, `Infinity`, `-Infinity`.
    DoubleValue(serde_json::Value),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    pub order_by: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Cursor>,
    pub limit: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cursor {
    pub values: Vec<Value>,
    pub before: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    #[serde(default)]
    pub document: Option<WireDocument>,
    #[serde(default)]
    pub read_time: Option<String>,
    #[serde(default)]
    pub error: Option<Status>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchWriteRequest {
    pub writes: Vec<Write>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: WireDocument,
    pub update_mask: DocumentMask,
    pub current_document: Precondition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Precondition {
    pub exists: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWriteResponse {
    #[serde(default)]
    pub write_results: Vec<serde_json::Value>,
    #[serde(default)]
    pub status: Vec<Status>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

/// Query for one page of `collection`, ordered by document name, starting
/// strictly after `after` (a full document name).
pub fn page_query(collection: &str, after: Option<String>, limit: usize) -> RunQueryRequest {
    RunQueryRequest {
        structured_query: StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: collection.to_string(),
            }],
            order_by: vec![Order {
                field: FieldReference {
                    field_path: DOCUMENT_NAME_FIELD.to_string(),
                },
                direction: "ASCENDING",
            }],
            start_at: after.map(|name| Cursor {
                values: vec![Value::ReferenceValue(name)],
                before: false,
            }),
            limit: i32::try_from(limit).unwrap_or(i32::MAX),
        },
    }
}

/// Single-field update that fails if the document no longer exists.
pub fn field_update(document_name: String, field: &str, value: &FieldValue) -> Write {
    let mut fields = BTreeMap::new();
    fields.insert(field.to_string(), encode_value(value));
    Write {
        update: WireDocument {
            name: document_name,
            fields,
            create_time: None,
            update_time: None,
        },
        update_mask: DocumentMask {
            field_paths: vec![quote_field_path(field)],
        },
        current_document: Precondition { exists: true },
    }
}

/// Field names outside `[A-Za-z_][A-Za-z0-9_]*` must be backtick-quoted in
/// field paths.
pub fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        None => false,
    };
    if simple {
        return name.to_string();
    }
    let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

pub fn decode_document(document: WireDocument) -> Result<Document> {
    let id = document_id_from_name(&document.name)?;
    let mut fields = BTreeMap::new();
    for (name, value) in document.fields {
        fields.insert(name, decode_value(value)?);
    }
    Ok(Document { id, fields })
}

pub fn document_id_from_name(name: &str) -> Result<DocumentId> {
    let id = name
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| FirestoreError::Decode(format!("invalid document name: {name}")))?;
    Ok(DocumentId::new(id)?)
}

pub fn decode_value(value: Value) -> Result<FieldValue> {
    Ok(match value {
        Value::NullValue(_) => FieldValue::Null,
        Value::BooleanValue(flag) => FieldValue::Boolean(flag),
        Value::IntegerValue(raw) => FieldValue::Integer(decode_integer(&raw)?),
        Value::DoubleValue(raw) => FieldValue::Double(decode_double(&raw)?),
        Value::TimestampValue(ts) => FieldValue::Timestamp(ts),
        Value::StringValue(text) => FieldValue::String(text),
        Value::BytesValue(data) => FieldValue::Bytes(data),
        Value::ReferenceValue(name) => FieldValue::Reference(name),
        Value::GeoPointValue(point) => FieldValue::GeoPoint {
            latitude: point.latitude,
            longitude: point.longitude,
        },
        Value::ArrayValue(array) => FieldValue::Array(
            array
                .values
                .into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::MapValue(map) => {
            let mut fields = BTreeMap::new();
            for (name, value) in map.fields {
                fields.insert(name, decode_value(value)?);
            }
            FieldValue::Map(fields)
        }
    })
}

pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::NullValue(None),
        FieldValue::Boolean(flag) => Value::BooleanValue(*flag),
        FieldValue::Integer(number) => Value::IntegerValue(number.to_string().into()),
        FieldValue::Double(number) => Value::DoubleValue(encode_double(*number)),
        FieldValue::Timestamp(ts) => Value::TimestampValue(ts.clone()),
        FieldValue::String(text) => Value::StringValue(text.clone()),
        FieldValue::Bytes(data) => Value::BytesValue(data.clone()),
        FieldValue::Reference(name) => Value::ReferenceValue(name.clone()),
        FieldValue::GeoPoint {
            latitude,
            longitude,
        } => Value::GeoPointValue(LatLng {
            latitude: *latitude,
            longitude: *longitude,
        }),
        FieldValue::Array(values) => Value::ArrayValue(ArrayValue {
            values: values.iter().map(encode_value).collect(),
        }),
        FieldValue::Map(fields) => Value::MapValue(MapValue {
            fields: fields
                .iter()
                .map(|(name, value)| (name.clone(), encode_value(value)))
                .collect(),
        }),
    }
}

fn decode_integer(raw: &serde_json::Value) -> Result<i64> {
    match raw {
        serde_json::Value::String(text) => text
            .parse()
            .map_err(|_| FirestoreError::Decode(format!("invalid integerValue: {text}"))),
        serde_json::Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| FirestoreError::Decode(format!("invalid integerValue: {number}"))),
        other => Err(FirestoreError::Decode(format!(
            "invalid integerValue: {other}"
        ))),
    }
}

fn decode_double(raw: &serde_json::Value) -> Result<f64> {
    match raw {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| FirestoreError::Decode(format!("invalid doubleValue: {number}"))),
        serde_json::Value::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse()
                .map_err(|_| FirestoreError::Decode(format!("invalid doubleValue: {other}"))),
        },
        other => Err(FirestoreError::Decode(format!("invalid doubleValue: {other}"))),
    }
}

fn encode_double(number: f64) -> serde_json::Value {
    if number.is_nan() {
        return "NaN".into();
    }
    if number.is_infinite() {
        let label = if number > 0.0 { "Infinity" } else { "-Infinity" };
        return label.into();
    }
    serde_json::Number::from_f64(number)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::{
        decode_document, decode_value, document_id_from_name, field_update, page_query,
        quote_field_path, RunQueryResponse, Value,
    };
    use lowermail_core::FieldValue;
    use serde_json::json;

    #[test]
    fn decode_document_maps_typed_values() {
        let response: Vec<RunQueryResponse> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/users/u1",
                    "fields": {
                        "email": { "stringValue": " Foo@Bar.COM " },
                        "age": { "integerValue": "42" },
                        "score": { "doubleValue": 1.5 },
                        "ratio": { "doubleValue": "NaN" },
                        "active": { "booleanValue": true },
                        "deleted": { "nullValue": null },
                        "tags": { "arrayValue": { "values": [{ "stringValue": "a" }] } },
                        "empty": { "arrayValue": {} },
                        "profile": { "mapValue": { "fields": { "city": { "stringValue": "Oslo" } } } },
                        "home": { "geoPointValue": { "latitude": 59.9 } }
                    },
                    "createTime": "2024-01-01T00:00:00Z",
                    "updateTime": "2024-01-02T00:00:00Z"
                },
                "readTime": "2024-02-01T00:00:00Z"
            }
        ]))
        .expect("parse response");

        let wire = response[0].document.clone().expect("document");
        let document = decode_document(wire).expect("decode");
        assert_eq!(document.id.as_str(), "u1");
        assert_eq!(
            document.field("email"),
            Some(&FieldValue::from(" Foo@Bar.COM "))
        );
        assert_eq!(document.field("age"), Some(&FieldValue::Integer(42)));
        assert_eq!(document.field("score"), Some(&FieldValue::Double(1.5)));
        assert!(matches!(document.field("ratio"), Some(FieldValue::Double(v)) if v.is_nan()));
        assert_eq!(document.field("active"), Some(&FieldValue::Boolean(true)));
        assert_eq!(document.field("deleted"), Some(&FieldValue::Null));
        assert_eq!(
            document.field("tags"),
            Some(&FieldValue::Array(vec![FieldValue::from("a")]))
        );
        assert_eq!(document.field("empty"), Some(&FieldValue::Array(Vec::new())));
        assert!(matches!(document.field("profile"), Some(FieldValue::Map(map)) if map.len() == 1));
        assert_eq!(
            document.field("home"),
            Some(&FieldValue::GeoPoint {
                latitude: 59.9,
                longitude: 0.0
            })
        );
    }

    #[test]
    fn read_time_only_elements_carry_no_document() {
        let response: Vec<RunQueryResponse> =
            serde_json::from_value(json!([{ "readTime": "2024-02-01T00:00:00Z" }]))
                .expect("parse");
        assert!(response[0].document.is_none());
        assert!(response[0].error.is_none());
    }

    #[test]
    fn malformed_integer_is_a_decode_error() {
        let value: Value = serde_json::from_value(json!({ "integerValue": "forty" })).expect("parse");
        assert!(decode_value(value).is_err());
    }

    #[test]
    fn document_id_is_last_name_segment() {
        let id = document_id_from_name("projects/p/databases/(default)/documents/users/abc-123")
            .expect("id");
        assert_eq!(id.as_str(), "abc-123");
        assert!(document_id_from_name("projects/p/documents/users/").is_err());
    }

    #[test]
    fn page_query_orders_by_name_and_starts_after_cursor() {
        let first = serde_json::to_value(page_query("users", None, 500)).expect("json");
        assert_eq!(
            first,
            json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "users" }],
                    "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
                    "limit": 500
                }
            })
        );

        let next = serde_json::to_value(page_query(
            "users",
            Some("projects/p/databases/(default)/documents/users/u9".to_string()),
            500,
        ))
        .expect("json");
        assert_eq!(
            next["structuredQuery"]["startAt"],
            json!({
                "values": [{ "referenceValue": "projects/p/databases/(default)/documents/users/u9" }],
                "before": false
            })
        );
    }

    #[test]
    fn field_update_masks_single_field_with_exists_precondition() {
        let write = field_update(
            "projects/p/databases/(default)/documents/users/u1".to_string(),
            "email",
            &FieldValue::from("foo@bar.com"),
        );
        assert_eq!(
            serde_json::to_value(write).expect("json"),
            json!({
                "update": {
                    "name": "projects/p/databases/(default)/documents/users/u1",
                    "fields": { "email": { "stringValue": "foo@bar.com" } }
                },
                "updateMask": { "fieldPaths": ["email"] },
                "currentDocument": { "exists": true }
            })
        );
    }

    #[test]
    fn quote_field_path_wraps_non_identifiers() {
        assert_eq!(quote_field_path("email"), "email");
        assert_eq!(quote_field_path("_email2"), "_email2");
        assert_eq!(quote_field_path("e-mail"), "`e-mail`");
        assert_eq!(quote_field_path("9lives"), "`9lives`");
        assert_eq!(quote_field_path("we`ird"), "`we\\`ird`");
    }
}
