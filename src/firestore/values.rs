//! Firestore REST typed values and their conversion to `serde_json`.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl Document {
    /// Last segment of the resource name, i.e. the document id.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    StringValue(String),
    // Firestore sends 64-bit integers as strings.
    IntegerValue(String),
    DoubleValue(f64),
    BooleanValue(bool),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
    NullValue(Option<String>),
    TimestampValue(String),
    GeoPointValue(GeoPoint),
    BytesValue(String),
    ReferenceValue(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::StringValue(s.into())
    }

    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::TimestampValue(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

pub fn fields_to_json(fields: HashMap<String, Value>) -> Result<JsonValue> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, value_to_json(value)?);
    }
    Ok(JsonValue::Object(map))
}

fn value_to_json(value: Value) -> Result<JsonValue> {
    Ok(match value {
        Value::StringValue(s) => JsonValue::String(s),
        Value::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                Error::Firestore(format!("Failed to parse integer '{}': {}", s, e))
            })?;
            JsonValue::Number(i.into())
        }
        Value::DoubleValue(d) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::BooleanValue(b) => JsonValue::Bool(b),
        Value::MapValue(map) => fields_to_json(map.fields)?,
        Value::ArrayValue(array) => JsonValue::Array(
            array
                .values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::NullValue(_) => JsonValue::Null,
        Value::GeoPointValue(gp) => {
            serde_json::json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        Value::TimestampValue(s) | Value::BytesValue(s) | Value::ReferenceValue(s) => {
            JsonValue::String(s)
        }
    })
}
