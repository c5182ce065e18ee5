//! Operations on values.
//!
//! This module implements arithmetic, comparison, and logical operations
//! for the expression evaluator. Short-circuiting operators (`&&`, `||`,
//! `??`) live in the evaluator itself.

use std::cmp::Ordering;

use super::value::{EvalError, EvalResult, Value};

/// Apply logical negation.
pub fn not(value: Value) -> EvalResult<Value> {
    Ok(Value::Bool(!value.as_bool()?))
}

/// Apply unary negation.
pub fn neg(value: Value) -> EvalResult<Value> {
    match value {
        Value::Int(v) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EvalError::invalid_op("integer overflow")),
        Value::Float(v) => Ok(Value::Float(-v)),
        v => Err(EvalError::invalid_op(format!(
            "cannot apply unary '-' to {}",
            v.type_name()
        ))),
    }
}

/// Add two values. Strings concatenate with anything.
pub fn add(lhs: Value, rhs: Value) -> EvalResult<Value> {
    use Value::*;
    Ok(match (lhs, rhs) {
        (Int(a), Int(b)) => Int(a
            .checked_add(b)
            .ok_or_else(|| EvalError::invalid_op("integer overflow"))?),
        (Int(a), Float(b)) => Float(a as f64 + b),
        (Float(a), Int(b)) => Float(a + b as f64),
        (Float(a), Float(b)) => Float(a + b),

        (Str(a), b) => Str(a + &b.display()),
        (a, Str(b)) => Str(a.display() + &b),

        (List(mut a), List(b)) => {
            a.extend(b);
            List(a)
        }

        (a, b) => return Err(mismatch("add", &a, &b)),
    })
}

/// Subtract two values.
pub fn sub(lhs: Value, rhs: Value) -> EvalResult<Value> {
    use Value::*;
    Ok(match (lhs, rhs) {
        (Int(a), Int(b)) => Int(a
            .checked_sub(b)
            .ok_or_else(|| EvalError::invalid_op("integer overflow"))?),
        (Int(a), Float(b)) => Float(a as f64 - b),
        (Float(a), Int(b)) => Float(a - b as f64),
        (Float(a), Float(b)) => Float(a - b),
        (a, b) => return Err(mismatch("subtract", &a, &b)),
    })
}

/// Multiply two values.
pub fn mul(lhs: Value, rhs: Value) -> EvalResult<Value> {
    use Value::*;
    Ok(match (lhs, rhs) {
        (Int(a), Int(b)) => Int(a
            .checked_mul(b)
            .ok_or_else(|| EvalError::invalid_op("integer overflow"))?),
        (Int(a), Float(b)) => Float(a as f64 * b),
        (Float(a), Int(b)) => Float(a * b as f64),
        (Float(a), Float(b)) => Float(a * b),
        (a, b) => return Err(mismatch("multiply", &a, &b)),
    })
}

/// Divide two values. Integer division truncates.
pub fn div(lhs: Value, rhs: Value) -> EvalResult<Value> {
    use Value::*;
    Ok(match (lhs, rhs) {
        (Int(_), Int(0)) => return Err(EvalError::div_zero()),
        (Int(a), Int(b)) => Int(a
            .checked_div(b)
            .ok_or_else(|| EvalError::invalid_op("integer overflow"))?),
        (Int(a), Float(b)) => Float(a as f64 / b),
        (Float(a), Int(b)) => Float(a / b as f64),
        (Float(a), Float(b)) => Float(a / b),
        (a, b) => return Err(mismatch("divide", &a, &b)),
    })
}

/// Remainder of two values.
pub fn rem(lhs: Value, rhs: Value) -> EvalResult<Value> {
    use Value::*;
    Ok(match (lhs, rhs) {
        (Int(_), Int(0)) => return Err(EvalError::div_zero()),
        (Int(a), Int(b)) => Int(a
            .checked_rem(b)
            .ok_or_else(|| EvalError::invalid_op("integer overflow"))?),
        (Int(a), Float(b)) => Float(a as f64 % b),
        (Float(a), Int(b)) => Float(a % b as f64),
        (Float(a), Float(b)) => Float(a % b),
        (a, b) => return Err(mismatch("take remainder of", &a, &b)),
    })
}

/// Structural equality, with ints and floats compared numerically.
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (a, b) => a == b,
    }
}

/// Order two values. Only numbers and strings are ordered.
pub fn compare(lhs: &Value, rhs: &Value) -> EvalResult<Ordering> {
    use Value::*;
    let ordering = match (lhs, rhs) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Str(a), Str(b)) => Some(a.cmp(b)),
        (a, b) => return Err(mismatch("compare", a, b)),
    };
    ordering.ok_or_else(|| EvalError::invalid_op("cannot compare NaN"))
}

fn mismatch(verb: &str, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::invalid_op(format!(
        "cannot {} {} and {}",
        verb,
        lhs.type_name(),
        rhs.type_name()
    ))
}
