// SPDX-License-Identifier: MIT

//! Accumulated workflow state
//!
//! `CodableState` is never mutated in place by the engine: every update
//! returns a fresh value that replaces the previous one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sdk::error::DecodeError;
use crate::sdk::value::DynamicValue;

/// How a step output is combined with the value already stored in its slot
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to an array; array outputs are concatenated
    Append,
    /// Keep the larger number
    Max,
    /// Keep the smaller number
    Min,
    /// Shallow-merge object keys, new keys win
    Merge,
}

impl ReducerType {
    /// Combine `current` and `incoming` into the value that should be stored
    pub fn reduce(self, current: Option<&DynamicValue>, incoming: DynamicValue) -> DynamicValue {
        match self {
            ReducerType::Overwrite => incoming,
            ReducerType::Append => {
                let mut items = match current {
                    Some(DynamicValue::Array(existing)) => existing.clone(),
                    Some(DynamicValue::Null) | None => Vec::new(),
                    Some(other) => vec![other.clone()],
                };
                match incoming {
                    DynamicValue::Array(new_items) => items.extend(new_items),
                    other => items.push(other),
                }
                DynamicValue::Array(items)
            }
            ReducerType::Max => pick_number(current, incoming, |new, old| new > old),
            ReducerType::Min => pick_number(current, incoming, |new, old| new < old),
            ReducerType::Merge => match (current, incoming) {
                (Some(DynamicValue::Object(existing)), DynamicValue::Object(new_fields)) => {
                    let mut merged = existing.clone();
                    merged.extend(new_fields);
                    DynamicValue::Object(merged)
                }
                (_, incoming) => incoming,
            },
        }
    }
}

fn pick_number<F>(current: Option<&DynamicValue>, incoming: DynamicValue, wins: F) -> DynamicValue
where
    F: Fn(f64, f64) -> bool,
{
    let old = current.and_then(|v| v.as_f64().ok());
    match (old, incoming.as_f64().ok()) {
        (Some(old), Some(new)) if !wins(new, old) => current.cloned().unwrap_or(incoming),
        (Some(_), None) => current.cloned().unwrap_or(incoming),
        _ => incoming,
    }
}

/// Mapping from key to dynamic value threaded through a workflow
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodableState(BTreeMap<String, DynamicValue>);

impl CodableState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a state from an object value
    pub fn from_value(value: DynamicValue) -> Result<Self, DecodeError> {
        match value {
            DynamicValue::Object(fields) => Ok(Self(fields)),
            DynamicValue::Null => Ok(Self::empty()),
            other => Err(DecodeError::mismatch("object", other.type_name())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.0.get(key)
    }

    /// Nested lookup using dot notation (e.g. `ping.status`)
    pub fn get_path(&self, path: &str) -> Option<&DynamicValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.0.get(head)?;
        match rest {
            Some(rest) => value.get_path(rest),
            None => Some(value),
        }
    }

    /// A copy of this state with `key` replaced by `value`
    pub fn with(&self, key: impl Into<String>, value: DynamicValue) -> Self {
        self.with_reduced(key, value, ReducerType::Overwrite)
    }

    /// A copy of this state with `value` folded into `key` through `reducer`
    pub fn with_reduced(
        &self,
        key: impl Into<String>,
        value: DynamicValue,
        reducer: ReducerType,
    ) -> Self {
        let key = key.into();
        let reduced = reducer.reduce(self.0.get(&key), value);
        let mut fields = self.0.clone();
        fields.insert(key, reduced);
        Self(fields)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> DynamicValue {
        DynamicValue::Object(self.0.clone())
    }
}

impl From<BTreeMap<String, DynamicValue>> for CodableState {
    fn from(fields: BTreeMap<String, DynamicValue>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, DynamicValue)> for CodableState {
    fn from_iter<I: IntoIterator<Item = (String, DynamicValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
