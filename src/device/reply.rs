//! Shapes a call's success payload into what the caller gets back.
//!
//! Single-field replies unwrap to the field's value so that commands with
//! one return value read like plain function calls. Replies whose fields
//! are all empty are introspection answers and come back as the list of
//! field names. A single empty field is ambiguous with a one-name
//! introspection reply; it is treated as a value.
use serde::Serialize;
use serde_json::{Map, Value};

// Firmware cannot use `-` and `+` as field names, so it spells them out
const ESCAPED_NAMES: [(&str, &str); 2] = [("_minus_", "-"), ("_plus_", "+")];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// The command returned nothing
    Empty,
    /// A single return value
    Value(Value),
    /// Several named return values
    Fields(Map<String, Value>),
    /// Field names of an introspection reply, in device order
    Names(Vec<String>),
}

impl Reply {
    pub fn from_payload(payload: Value) -> Self {
        match payload {
            Value::Null => Reply::Empty,
            Value::Object(fields) => shape_fields(fields),
            other => Reply::Value(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Reply::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Reply::Empty => Value::Null,
            Reply::Value(value) => value,
            Reply::Fields(fields) => Value::Object(fields),
            Reply::Names(names) => Value::Array(names.into_iter().map(Value::String).collect()),
        }
    }
}

fn shape_fields(fields: Map<String, Value>) -> Reply {
    match fields.len() {
        0 => Reply::Empty,
        1 => match fields.into_iter().next() {
            Some((_, value)) => Reply::Value(value),
            None => Reply::Empty,
        },
        _ if fields.values().all(is_empty_value) => {
            Reply::Names(fields.keys().map(|name| unescape_name(name)).collect())
        }
        _ => Reply::Fields(
            fields
                .into_iter()
                .map(|(name, value)| (unescape_name(&name), value))
                .collect(),
        ),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn unescape_name(name: &str) -> String {
    ESCAPED_NAMES
        .iter()
        .find(|(escaped, _)| *escaped == name)
        .map_or_else(|| name.to_string(), |(_, literal)| literal.to_string())
}
