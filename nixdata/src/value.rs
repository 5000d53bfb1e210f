use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A scalar attribute value.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Double(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unwrap a value assigned to a textual property.
    ///
    /// `property` is only used for the error message.
    ///
    pub fn into_text(self, property: &str) -> Result<String> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(Error::TypeMismatch(format!(
                "{property} must be a string, got {}",
                other.type_name()
            ))),
        }
    }

    /// Unwrap a value assigned to a numeric property.
    ///
    pub fn into_number(self, property: &str) -> Result<f64> {
        match self.as_f64() {
            Some(n) => Ok(n),
            None => Err(Error::TypeMismatch(format!(
                "{property} must be numeric, got {}",
                self.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Double(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Read an optional string attribute.
///
/// A stored value of any other type means the file is damaged.
///
pub(crate) fn text_attr(value: Option<Value>, name: &str) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::CorruptData(format!(
            "attribute {name} should be a string, found {}",
            other.type_name()
        ))),
    }
}

/// Read an optional numeric attribute.
///
pub(crate) fn number_attr(value: Option<Value>, name: &str) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(value) => match value.as_f64() {
            Some(n) => Ok(Some(n)),
            None => Err(Error::CorruptData(format!(
                "attribute {name} should be numeric, found {}",
                value.type_name()
            ))),
        },
    }
}
