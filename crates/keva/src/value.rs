//! The closed typed-value union and value-level errors.
//!
//! This module is the single conversion point between host-native data
//! and the value kinds the language understands (the JSON bridge in
//! [`crate::format`] goes through the constructors here too). All other
//! components consume only the closed set.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::diagnostics::Span;
use crate::env::EnvRef;
use crate::error::EvalResult;
use crate::func::FuncRef;
use crate::list::{collect_items, ArrayList, ListRef};

pub const ERROR_DEFAULT: &str = "Default";
pub const ERROR_TYPE_MISMATCH: &str = "TYPE_MISMATCH";
pub const ERROR_PARAMETER_COUNT_MISMATCH: &str = "TOO_FEW_PARAMETER";
pub const ERROR_INVALID_PARAMETER: &str = "TYPE_INVALID_PARAMETER";
pub const ERROR_EVALUATION_DEPTH_OVERFLOW: &str = "EVALUATION_DEPTH_OVERFLOW";

/// A language-level failure carried as ordinary data. Errors flow
/// through lists, records, and arguments like any other value; they are
/// only raised when a host explicitly asks for that.
#[derive(Debug, Clone)]
pub struct FsError {
    pub error_type: String,
    pub message: String,
    pub data: Option<Value>,
    pub location: Option<Span>,
}

impl FsError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            data: None,
            location: None,
        }
    }

    pub fn default_error(message: impl Into<String>) -> Self {
        Self::new(ERROR_DEFAULT, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ERROR_TYPE_MISMATCH, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ERROR_INVALID_PARAMETER, message)
    }

    pub fn parameter_count(message: impl Into<String>) -> Self {
        Self::new(ERROR_PARAMETER_COUNT_MISMATCH, message)
    }

    pub fn depth_overflow(max: usize) -> Self {
        Self::new(
            ERROR_EVALUATION_DEPTH_OVERFLOW,
            format!("maximum evaluation depth of {max} exceeded"),
        )
    }

    pub fn with_location(mut self, span: Span) -> Self {
        self.location = Some(span);
        self
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.error_type)
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Bytes(Arc<Vec<u8>>),
    List(ListRef),
    Record(EnvRef),
    Function(FuncRef),
    Error(Arc<FsError>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Guid(_) => "guid",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "key-value collection",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Long(_) | Value::Float(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn error(error: FsError) -> Value {
        Value::Error(Arc::new(error))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(ArrayList::new(items)))
    }

    pub fn record(pairs: Vec<(String, Value)>) -> Value {
        Value::Record(Arc::new(crate::env::MapEnv::new(None, pairs)))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Long(v) => write!(f, "Long({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Text(v) => write!(f, "Text({v:?})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::Guid(v) => write!(f, "Guid({v})"),
            Value::Bytes(v) => write!(f, "Bytes(len={})", v.len()),
            Value::List(v) => write!(f, "List(len={})", v.len()),
            Value::Record(_) => write!(f, "Record"),
            Value::Function(v) => write!(f, "Function({})", v.symbol()),
            Value::Error(e) => write!(f, "Error({e})"),
        }
    }
}

/// Promotes two numeric values to their common kind: Int → Long → Float.
pub fn common_numeric(a: &Value, b: &Value) -> Option<(Value, Value)> {
    use Value::{Float, Int, Long};
    match (a, b) {
        (Int(x), Int(y)) => Some((Int(*x), Int(*y))),
        (Long(x), Long(y)) => Some((Long(*x), Long(*y))),
        (Float(x), Float(y)) => Some((Float(*x), Float(*y))),
        (Int(x), Long(y)) => Some((Long(i64::from(*x)), Long(*y))),
        (Long(x), Int(y)) => Some((Long(*x), Long(i64::from(*y)))),
        (Int(x), Float(y)) => Some((Float(f64::from(*x)), Float(*y))),
        (Float(x), Int(y)) => Some((Float(*x), Float(f64::from(*y)))),
        (Long(x), Float(y)) => Some((Float(*x as f64), Float(*y))),
        (Float(x), Long(y)) => Some((Float(*x), Float(*y as f64))),
        _ => None,
    }
}

/// Structural equality with numeric promotion. Forcing lazy collections
/// can fail, hence the fallible signature.
pub fn values_equal(a: &Value, b: &Value) -> EvalResult<bool> {
    if a.is_numeric() && b.is_numeric() {
        return Ok(match common_numeric(a, b) {
            Some((Value::Int(x), Value::Int(y))) => x == y,
            Some((Value::Long(x), Value::Long(y))) => x == y,
            Some((Value::Float(x), Value::Float(y))) => x == y,
            _ => false,
        });
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Text(x), Value::Text(y)) => Ok(x == y),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x == y),
        (Value::Guid(x), Value::Guid(y)) => Ok(x == y),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x == y),
        (Value::List(x), Value::List(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for index in 0..x.len() {
                if !values_equal(&x.item(index)?, &y.item(index)?)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Record(x), Value::Record(y)) => {
            let left = x.entries()?;
            let right = y.entries()?;
            if left.len() != right.len() {
                return Ok(false);
            }
            for (key, value) in &left {
                if !y.is_defined(key) {
                    return Ok(false);
                }
                let other = y.get(key)?.unwrap_or(Value::Null);
                if !values_equal(value, &other)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Function(x), Value::Function(y)) => Ok(Arc::ptr_eq(x, y)),
        (Value::Error(x), Value::Error(y)) => {
            Ok(x.error_type == y.error_type && x.message == y.message)
        }
        _ => Ok(false),
    }
}

/// Ordering with numeric promotion; `None` means the kinds don't order.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_numeric() && b.is_numeric() {
        return match common_numeric(a, b) {
            Some((Value::Int(x), Value::Int(y))) => Some(x.cmp(&y)),
            Some((Value::Long(x), Value::Long(y))) => Some(x.cmp(&y)),
            Some((Value::Float(x), Value::Float(y))) => x.partial_cmp(&y),
            _ => None,
        };
    }
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other).unwrap_or(false)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Arc::new(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::list(value)
    }
}

impl From<FsError> for Value {
    fn from(value: FsError) -> Self {
        Value::error(value)
    }
}

/// Snapshot of a list value as a plain vector.
pub fn list_to_vec(list: &ListRef) -> EvalResult<Vec<Value>> {
    collect_items(list.as_ref())
}
