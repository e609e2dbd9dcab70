use std::cmp::Ordering;
use thiserror::Error;

use crate::{op::OpCode, value::Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AluError {
    #[error("Cannot apply {0} to {1} and {2}")]
    TypeMismatch(OpCode, String, String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Cannot compare {0} with {1}")]
    Incomparable(String, String),

    #[error("{0} is not an arithmetic operation")]
    NotArithmetic(OpCode),
}

/// Numeric operands after promotion: int if both sides are int-like.
enum Num {
    Int(i64, i64),
    Double(f64, f64),
}

fn promote(a: &Value, b: &Value) -> Option<Num> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Some(Num::Int(x, y)),
        _ => Some(Num::Double(a.as_f64()?, b.as_f64()?)),
    }
}

fn ordering(a: &Value, b: &Value) -> Result<Ordering, AluError> {
    let incomparable = || AluError::Incomparable(format!("{:?}", a), format!("{:?}", b));
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(incomparable()),
        _ => match promote(a, b) {
            Some(Num::Int(x, y)) => Ok(x.cmp(&y)),
            Some(Num::Double(x, y)) => x.partial_cmp(&y).ok_or_else(incomparable),
            None => Err(incomparable()),
        },
    }
}

/// Two-operand ALU: returns the new value of the destination `a`.
pub fn alu(op: OpCode, a: &Value, b: &Value) -> Result<Value, AluError> {
    use OpCode::*;
    let mismatch = || AluError::TypeMismatch(op, format!("{:?}", a), format!("{:?}", b));

    match op {
        ADD => {
            if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            match promote(a, b).ok_or_else(mismatch)? {
                Num::Int(x, y) => Ok(Value::Int(x.wrapping_add(y))),
                Num::Double(x, y) => Ok(Value::Double(x + y)),
            }
        }
        SUB => match promote(a, b).ok_or_else(mismatch)? {
            Num::Int(x, y) => Ok(Value::Int(x.wrapping_sub(y))),
            Num::Double(x, y) => Ok(Value::Double(x - y)),
        },
        MUL => match promote(a, b).ok_or_else(mismatch)? {
            Num::Int(x, y) => Ok(Value::Int(x.wrapping_mul(y))),
            Num::Double(x, y) => Ok(Value::Double(x * y)),
        },
        DIV => match promote(a, b).ok_or_else(mismatch)? {
            Num::Int(_, 0) => Err(AluError::DivisionByZero),
            Num::Int(x, y) => Ok(Value::Int(x.wrapping_div(y))),
            Num::Double(x, y) => Ok(Value::Double(x / y)),
        },
        AND | OR | XOR => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(match op {
                AND => *x && *y,
                OR => *x || *y,
                _ => *x ^ *y,
            })),
            _ => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => Ok(Value::Int(match op {
                    AND => x & y,
                    OR => x | y,
                    _ => x ^ y,
                })),
                _ => Err(mismatch()),
            },
        },
        CP => Ok(Value::Int(match ordering(a, b)? {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        })),
        _ => Err(AluError::NotArithmetic(op)),
    }
}

/// `INC` / `DEC`
pub fn step(op: OpCode, a: &Value) -> Result<Value, AluError> {
    let delta = match op {
        OpCode::INC => 1,
        OpCode::DEC => -1,
        _ => return Err(AluError::NotArithmetic(op)),
    };
    match a {
        Value::Int(x) => Ok(Value::Int(x.wrapping_add(delta))),
        Value::Bool(x) => Ok(Value::Int(*x as i64 + delta)),
        Value::Double(x) => Ok(Value::Double(x + delta as f64)),
        Value::Str(_) => Err(AluError::TypeMismatch(
            op,
            format!("{:?}", a),
            format!("{}", delta),
        )),
    }
}
