// SPDX-License-Identifier: MIT

//! Type-erased, JSON-shaped values
//!
//! Step payloads and state fields are defined by the backend and evolve
//! independently of client releases. `DynamicValue` carries them without
//! knowing their schema and lets a consumer attempt a typed projection later.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::error::DecodeError;

/// A closed sum over the JSON data model.
///
/// Numbers keep their `serde_json::Number` representation so integers and
/// floats survive a text round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<DynamicValue>),
    Object(BTreeMap<String, DynamicValue>),
}

impl DynamicValue {
    /// An empty mapping
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Parse a value from its textual JSON form
    pub fn from_json_str(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(value.into())
    }

    /// Render the value as compact JSON text
    pub fn to_json_string(&self) -> String {
        Value::from(self.clone()).to_string()
    }

    /// Encode any serializable value
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DecodeError> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Project the value into a concrete type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(serde_json::from_value(Value::from(self.clone()))?)
    }

    /// Name of the JSON type, used in mismatch diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_object(&self) -> Result<&BTreeMap<String, DynamicValue>, DecodeError> {
        match self {
            Self::Object(map) => Ok(map),
            other => Err(DecodeError::mismatch("object", other.type_name())),
        }
    }

    pub fn as_array(&self) -> Result<&[DynamicValue], DecodeError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(DecodeError::mismatch("array", other.type_name())),
        }
    }

    pub fn as_str(&self) -> Result<&str, DecodeError> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(DecodeError::mismatch("string", other.type_name())),
        }
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(DecodeError::mismatch("boolean", other.type_name())),
        }
    }

    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        match self {
            Self::Number(n) => n
                .as_f64()
                .ok_or_else(|| DecodeError::Invalid(format!("{} is not representable as f64", n))),
            other => Err(DecodeError::mismatch("number", other.type_name())),
        }
    }

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        match self {
            Self::Number(n) => n
                .as_i64()
                .ok_or_else(|| DecodeError::Invalid(format!("{} is not an integer", n))),
            other => Err(DecodeError::mismatch("number", other.type_name())),
        }
    }

    /// Look up a key on an object value; `None` for missing keys and non-objects
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Required-field lookup on an object value
    pub fn field(&self, key: &str) -> Result<&DynamicValue, DecodeError> {
        self.as_object()?
            .get(key)
            .ok_or_else(|| DecodeError::MissingField(key.to_string()))
    }

    /// Walk a dot-separated path; numeric segments index into arrays
    pub fn get_path(&self, path: &str) -> Option<&DynamicValue> {
        path.split('.').try_fold(self, |current, part| match current {
            Self::Object(map) => map.get(part),
            Self::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<DynamicValue> for Value {
    fn from(value: DynamicValue) -> Self {
        match value {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(b) => Value::Bool(b),
            DynamicValue::Number(n) => Value::Number(n),
            DynamicValue::String(s) => Value::String(s),
            DynamicValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            DynamicValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for DynamicValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<BTreeMap<String, DynamicValue>> for DynamicValue {
    fn from(map: BTreeMap<String, DynamicValue>) -> Self {
        Self::Object(map)
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_round_trip() {
        let original = DynamicValue::from(json!({"a": 1, "b": [true, null, "x"]}));
        let text = original.to_json_string();
        let decoded = DynamicValue::from_json_str(&text).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_numbers_keep_their_kind() {
        let value = DynamicValue::from_json_str(r#"{"int": 7, "float": 7.5}"#).unwrap();
        assert_eq!(value.get("int").unwrap().as_i64().unwrap(), 7);
        assert!(value.get("float").unwrap().as_i64().is_err());
        assert_eq!(value.get("float").unwrap().as_f64().unwrap(), 7.5);
        assert_eq!(value.to_json_string(), r#"{"float":7.5,"int":7}"#);
    }

    #[test]
    fn test_projection_mismatch() {
        let value = DynamicValue::from("hello");
        let err = value.as_object().unwrap_err();
        assert_eq!(err.to_string(), "expected object, got string");
        assert!(value.as_array().is_err());
        assert_eq!(value.as_str().unwrap(), "hello");
    }

    #[test]
    fn test_missing_field() {
        let value = DynamicValue::from(json!({"path": "/ping"}));
        assert_eq!(value.field("path").unwrap().as_str().unwrap(), "/ping");
        let err = value.field("method").unwrap_err();
        assert!(matches!(err, DecodeError::MissingField(ref f) if f == "method"));
    }

    #[test]
    fn test_get_path() {
        let value = DynamicValue::from(json!({"order": {"items": [{"sku": "A1"}]}}));
        assert_eq!(
            value.get_path("order.items.0.sku"),
            Some(&DynamicValue::from("A1"))
        );
        assert_eq!(value.get_path("order.missing"), None);
        assert_eq!(value.get_path("order.items.3"), None);
    }

    #[test]
    fn test_decode_into_struct() {
        #[derive(Deserialize)]
        struct Ping {
            path: String,
            #[serde(default)]
            retries: u32,
        }

        let value = DynamicValue::from(json!({"path": "/ping", "extra": true}));
        let ping: Ping = value.decode().unwrap();
        assert_eq!(ping.path, "/ping");
        assert_eq!(ping.retries, 0);

        let bad = DynamicValue::from(json!(["not", "an", "object"]));
        assert!(bad.decode::<Ping>().is_err());
    }

    #[test]
    fn test_serde_passthrough() {
        let value: DynamicValue = serde_json::from_str(r#"[1, "two", {"three": 3}]"#).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
        let back = serde_json::to_string(&value).unwrap();
        assert_eq!(back, r#"[1,"two",{"three":3}]"#);
    }
}
