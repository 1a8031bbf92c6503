//! Additional-details format adapter.
//!
//! The lookup service and the manual editor speak two raw shapes. Consumers
//! only ever see the canonical `{ show: [...], ...values }` form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical additional details: which keys to show, plus their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalDetails {
    pub show: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw payload shapes the adapter understands.
#[derive(Debug, PartialEq)]
pub enum RawAdditional<'a> {
    /// `{ checkbox: { key: bool }, values: { key: any } }` once the user has
    /// interacted with the selection.
    DualState {
        checkbox: &'a Map<String, Value>,
        values: Option<&'a Map<String, Value>>,
    },
    /// Field configuration array as first returned by the lookup service.
    Configuration,
    /// No payload yet, or a failed lookup.
    Empty,
    Unrecognized,
}

impl<'a> RawAdditional<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        match raw {
            Value::Null => Self::Empty,
            Value::Array(_) => Self::Configuration,
            Value::Object(map) => match (map.get("checkbox"), map.get("values")) {
                (Some(Value::Object(checkbox)), Some(Value::Object(values))) => Self::DualState {
                    checkbox,
                    values: Some(values),
                },
                (Some(Value::Object(checkbox)), None | Some(Value::Null)) => Self::DualState {
                    checkbox,
                    values: None,
                },
                _ => Self::Unrecognized,
            },
            _ => Self::Unrecognized,
        }
    }
}

impl AdditionalDetails {
    /// Reshape a raw payload. Never fails: anything unexpected means nothing
    /// is selected.
    pub fn from_raw(raw: &Value) -> Self {
        match RawAdditional::classify(raw) {
            RawAdditional::DualState { checkbox, values } => {
                let show = checkbox
                    .iter()
                    .filter(|(_, checked)| matches!(checked, Value::Bool(true)))
                    .map(|(key, _)| key.clone())
                    .collect();
                let mut extra = values.cloned().unwrap_or_default();
                // `show` is reserved for the selection list.
                extra.remove("show");
                Self { show, extra }
            }
            RawAdditional::Configuration | RawAdditional::Empty => Self::default(),
            RawAdditional::Unrecognized => {
                tracing::warn!(
                    kind = value_kind(raw),
                    "unrecognized additional details payload, treating as nothing selected"
                );
                Self::default()
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
