use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::value::Value;

/// Scalar types of the source language. `Void` only appears as a return type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    Int,
    Double,
    Boolean,
    String,
    Void,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("Cannot convert `{0}` to a number")]
    NotNumeric(String),

    #[error("Cannot store a value in void")]
    Void,
}

impl Type {
    /// Integer-like types usable as array indices and in `%`, `&`, `|`, `^`.
    pub fn is_integral(self) -> bool {
        matches!(self, Type::Int | Type::Boolean)
    }
}

/// Assignability of a statically typed expression to `target`.
///
/// Numbers go to int/double/boolean, booleans go anywhere,
/// strings only go to string.
pub fn assignable(target: Type, source: Type) -> bool {
    match source {
        Type::Int | Type::Double => matches!(target, Type::Int | Type::Double | Type::Boolean),
        Type::Boolean => target != Type::Void,
        Type::String => target == Type::String,
        Type::Void => false,
    }
}

/// Whether a host value may be assigned to a variable of `target`.
pub fn type_check(target: Type, value: &Value) -> bool {
    assignable(target, value.type_of())
}

fn parse_number(value: &Value) -> Result<f64, TypeError> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| TypeError::NotNumeric(s.clone())),
        other => other
            .as_f64()
            .ok_or_else(|| TypeError::NotNumeric(other.to_string())),
    }
}

/// Convert `value` into the representation of `target`.
///
/// int truncates toward zero, double widens, boolean compares the decimal
/// parse against zero, string stringifies.
pub fn coerce_value(target: Type, value: &Value) -> Result<Value, TypeError> {
    match target {
        Type::Int => match value {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Bool(v) => Ok(Value::Int(*v as i64)),
            other => Ok(Value::Int(parse_number(other)?.trunc() as i64)),
        },
        Type::Double => Ok(Value::Double(parse_number(value)?)),
        Type::Boolean => match value {
            Value::Bool(v) => Ok(Value::Bool(*v)),
            other => Ok(Value::Bool(parse_number(other)? != 0.0)),
        },
        Type::String => Ok(Value::Str(value.to_string())),
        Type::Void => Err(TypeError::Void),
    }
}
