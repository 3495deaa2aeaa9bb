use serde_json::{Number, Value};

use super::{ProtocolError, Result};

/// One positional argument of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Scalar(Number),
    Sequence(Vec<Number>),
    /// Inserted into the line verbatim, e.g. a pre-serialized JSON fragment
    Raw(String),
    /// Any JSON value; classified when the request is encoded
    Value(Value),
}

macro_rules! scalar_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Argument {
                fn from(value: $t) -> Self {
                    Argument::Scalar(Number::from(value))
                }
            }

            impl From<Vec<$t>> for Argument {
                fn from(values: Vec<$t>) -> Self {
                    Argument::Sequence(values.into_iter().map(Number::from).collect())
                }
            }

            impl From<&[$t]> for Argument {
                fn from(values: &[$t]) -> Self {
                    Argument::Sequence(values.iter().copied().map(Number::from).collect())
                }
            }
        )*
    };
}

scalar_from!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        match Number::from_f64(value) {
            Some(n) => Argument::Scalar(n),
            // NaN and infinities have no JSON form; rejected at encode time
            None => Argument::Value(Value::Null),
        }
    }
}

impl From<f32> for Argument {
    fn from(value: f32) -> Self {
        Argument::from(value as f64)
    }
}

impl From<Vec<f64>> for Argument {
    fn from(values: Vec<f64>) -> Self {
        let numbers: Option<Vec<Number>> = values.iter().map(|v| Number::from_f64(*v)).collect();
        match numbers {
            Some(numbers) => Argument::Sequence(numbers),
            None => Argument::Value(Value::Array(
                values
                    .into_iter()
                    .map(|v| Number::from_f64(v).map_or(Value::Null, Value::Number))
                    .collect(),
            )),
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Raw(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Raw(value)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// Build a `Vec<Argument>` from mixed values: `args![3, vec![1, 2], "{}"]`
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::protocol::Argument>::new() };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::protocol::Argument::from($arg)),+]
    };
}

impl Argument {
    fn encode(&self, position: usize) -> Result<String> {
        match self {
            Argument::Scalar(n) => Ok(n.to_string()),
            Argument::Sequence(values) => encode_sequence(values),
            Argument::Raw(text) => encode_raw(text, position),
            Argument::Value(value) => encode_value(value, position),
        }
    }
}

fn encode_sequence(values: &[Number]) -> Result<String> {
    // serde_json's compact writer emits no whitespace between elements
    serde_json::to_string(values).map_err(|e| ProtocolError::MalformedResponse(e.to_string()))
}

fn encode_raw(text: &str, position: usize) -> Result<String> {
    if text.contains(['\r', '\n']) {
        return Err(ProtocolError::UnsupportedArgumentType {
            position,
            kind: "string containing a line terminator".to_string(),
        });
    }
    Ok(text.to_string())
}

fn encode_value(value: &Value, position: usize) -> Result<String> {
    let unsupported = |kind: &str| ProtocolError::UnsupportedArgumentType {
        position,
        kind: kind.to_string(),
    };

    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(text) => encode_raw(text, position),
        Value::Array(items) => {
            let numbers: Option<Vec<Number>> = items
                .iter()
                .map(|item| match item {
                    Value::Number(n) => Some(n.clone()),
                    _ => None,
                })
                .collect();
            match numbers {
                Some(numbers) => encode_sequence(&numbers),
                None => Err(unsupported("sequence with non-numeric elements")),
            }
        }
        Value::Null => Err(unsupported("null")),
        Value::Bool(_) => Err(unsupported("boolean")),
        Value::Object(_) => Err(unsupported("object")),
    }
}

/// A numbered call and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: u16,
    pub args: Vec<Argument>,
}

impl Request {
    pub fn new(id: u16, args: Vec<Argument>) -> Self {
        Self { id, args }
    }

    /// Render the request as one wire line, without terminator
    pub fn encode(&self) -> Result<String> {
        let mut line = format!("[{}", self.id);
        for (position, arg) in self.args.iter().enumerate() {
            line.push_str(", ");
            line.push_str(&arg.encode(position)?);
        }
        line.push(']');
        Ok(line)
    }
}
