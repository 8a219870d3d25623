use crate::error::{ValohaiError, ValohaiResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type of a declared parameter; fixed by its first known value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Bool,
    Int,
    Float,
    Str,
    List,
}

/// A parameter value. Multi-value parameters are lists of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParameterValue>),
}

impl ParameterValue {
    /// Convert a JSON scalar, or an array of scalars. Objects, nested arrays and null are rejected.
    pub fn from_json(name: &str, value: &Value) -> ValohaiResult<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => Err(ValohaiError::Config(format!("parameter {name} has a nested list {item}"))),
                    _ => Self::from_json(name, item),
                })
                .collect::<ValohaiResult<Vec<_>>>()
                .map(Self::List),
            _ => Self::scalar_from_json(name, value),
        }
    }

    fn scalar_from_json(name: &str, value: &Value) -> ValohaiResult<Self> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .ok_or_else(|| ValohaiError::Config(format!("parameter {name} has an unrepresentable number {n}"))),
            Value::String(s) => Ok(Self::Str(s.clone())),
            other => Err(ValohaiError::Config(format!(
                "parameter {name} must be a bool, number, string or list, got {other}"
            ))),
        }
    }

    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::Bool(_) => ParameterType::Bool,
            Self::Int(_) => ParameterType::Int,
            Self::Float(_) => ParameterType::Float,
            Self::Str(_) => ParameterType::Str,
            Self::List(_) => ParameterType::List,
        }
    }

    /// Parse a command-line string as `ty`. `None` when it does not fit.
    ///
    /// Lists accept a JSON array or comma-separated items, each typed as a
    /// JSON scalar when it parses as one and as a string otherwise.
    pub fn coerce(raw: &str, ty: ParameterType) -> Option<Self> {
        match ty {
            ParameterType::Bool => parse_bool(raw).map(Self::Bool),
            ParameterType::Int => raw.trim().parse().ok().map(Self::Int),
            ParameterType::Float => raw.trim().parse().ok().map(Self::Float),
            ParameterType::Str => Some(Self::Str(raw.to_string())),
            ParameterType::List => coerce_list(raw),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and ints widened to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParameterValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn coerce_list(raw: &str) -> Option<ParameterValue> {
    if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(raw) {
        return ParameterValue::from_json("", &value).ok();
    }
    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match serde_json::from_str::<Value>(item) {
            Ok(value @ (Value::Bool(_) | Value::Number(_))) => {
                ParameterValue::scalar_from_json("", &value).unwrap_or_else(|_| ParameterValue::Str(item.to_string()))
            }
            _ => ParameterValue::Str(item.to_string()),
        })
        .collect();
    Some(ParameterValue::List(items))
}

/// `true`/`false`, case-insensitive.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<ParameterValue>> From<Vec<T>> for ParameterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
