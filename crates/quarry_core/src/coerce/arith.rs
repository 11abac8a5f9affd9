use std::fmt;

use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::cast::{as_decimal, as_f64, as_i128, int_from_i128};
use super::numeric_result_type;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
            Self::Mod => write!(f, "%"),
        }
    }
}

fn type_mismatch(op: ArithOperator, left: &DataType, right: &DataType) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!("Cannot apply '{op}' to {left} and {right}"),
    )
}

fn invalid_operands(op: ArithOperator, left: &ScalarValue, right: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::InvalidOperand,
        format!("Cannot apply '{op}' to '{left}' and '{right}'"),
    )
}

/// Determine the static result type of an arithmetic expression.
///
/// `Any` operands defer the decision to evaluation time. Null literals take on
/// the type of the other operand.
pub fn arith_return_type(op: ArithOperator, left: &DataType, right: &DataType) -> Result<DataType> {
    match (left, right) {
        (DataType::Null, DataType::Null) => Ok(DataType::Null),
        (DataType::Any, _) | (_, DataType::Any) => Ok(DataType::Any),
        (DataType::Null, other) | (other, DataType::Null) => {
            if other.is_numeric() || (op == ArithOperator::Add && other.is_utf8()) {
                Ok(other.clone())
            } else {
                Err(type_mismatch(op, left, right))
            }
        }
        (DataType::Utf8, DataType::Utf8) if op == ArithOperator::Add => Ok(DataType::Utf8),
        (left, right) => numeric_result_type(left, right).ok_or_else(|| type_mismatch(op, left, right)),
    }
}

/// Evaluate an arithmetic operation on two values.
///
/// Integer and decimal arithmetic is checked. Floats follow IEEE semantics,
/// including for division by zero.
pub fn eval_arith(op: ArithOperator, left: &ScalarValue, right: &ScalarValue) -> Result<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Ok(ScalarValue::Null);
    }

    if let (ScalarValue::Utf8(l), ScalarValue::Utf8(r)) = (left, right) {
        if op == ArithOperator::Add {
            let mut s = String::with_capacity(l.len() + r.len());
            s.push_str(l);
            s.push_str(r);
            return Ok(ScalarValue::Utf8(s));
        }
    }

    let left_type = left.datatype();
    let right_type = right.datatype();
    let result_type = numeric_result_type(&left_type, &right_type)
        .ok_or_else(|| invalid_operands(op, left, right))?;

    match result_type {
        DataType::Decimal => {
            let (l, r) = match (as_decimal(left), as_decimal(right)) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(overflow(op, left, right)),
            };
            eval_decimal(op, l, r, left, right).map(ScalarValue::Decimal)
        }
        DataType::Float64 | DataType::Float32 => {
            let (l, r) = match (as_f64(left), as_f64(right)) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(invalid_operands(op, left, right)),
            };
            let v = match op {
                ArithOperator::Add => l + r,
                ArithOperator::Sub => l - r,
                ArithOperator::Mul => l * r,
                ArithOperator::Div => l / r,
                ArithOperator::Mod => l % r,
            };
            Ok(match result_type {
                DataType::Float32 => ScalarValue::Float32(v as f32),
                _ => ScalarValue::Float64(v),
            })
        }
        int_type => {
            let (l, r) = match (as_i128(left), as_i128(right)) {
                (Some(l), Some(r)) => (l, r),
                _ => return Err(invalid_operands(op, left, right)),
            };
            let v = match op {
                ArithOperator::Add => l.checked_add(r),
                ArithOperator::Sub => l.checked_sub(r),
                ArithOperator::Mul => l.checked_mul(r),
                ArithOperator::Div => {
                    if r == 0 {
                        return Err(division_by_zero(left, right));
                    }
                    l.checked_div(r)
                }
                ArithOperator::Mod => {
                    if r == 0 {
                        return Err(division_by_zero(left, right));
                    }
                    l.checked_rem(r)
                }
            };
            v.and_then(|v| int_from_i128(v, &int_type))
                .ok_or_else(|| overflow(op, left, right))
        }
    }
}

fn eval_decimal(
    op: ArithOperator,
    l: Decimal,
    r: Decimal,
    left: &ScalarValue,
    right: &ScalarValue,
) -> Result<Decimal> {
    let v = match op {
        ArithOperator::Add => l.checked_add(r),
        ArithOperator::Sub => l.checked_sub(r),
        ArithOperator::Mul => l.checked_mul(r),
        ArithOperator::Div => {
            if r.is_zero() {
                return Err(division_by_zero(left, right));
            }
            l.checked_div(r)
        }
        ArithOperator::Mod => {
            if r.is_zero() {
                return Err(division_by_zero(left, right));
            }
            l.checked_rem(r)
        }
    };
    v.ok_or_else(|| overflow(op, left, right))
}

fn division_by_zero(left: &ScalarValue, right: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::DivisionByZero,
        format!("Division by zero: {left} / {right}"),
    )
}

fn overflow(op: ArithOperator, left: &ScalarValue, right: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::ArithmeticOverflow,
        format!("Arithmetic overflow: {left} {op} {right}"),
    )
}

/// Negate a numeric value.
pub fn eval_negate(value: &ScalarValue) -> Result<ScalarValue> {
    let err = || {
        DbError::with_kind(
            ErrorKind::ArithmeticOverflow,
            format!("Cannot negate {value}"),
        )
    };

    Ok(match value {
        ScalarValue::Null => ScalarValue::Null,
        ScalarValue::Float32(v) => ScalarValue::Float32(-v),
        ScalarValue::Float64(v) => ScalarValue::Float64(-v),
        ScalarValue::Decimal(v) => ScalarValue::Decimal(-*v),
        other => match as_i128(other) {
            Some(v) => int_from_i128(-v, &other.datatype()).ok_or_else(err)?,
            None => {
                return Err(DbError::with_kind(
                    ErrorKind::InvalidOperand,
                    format!("Cannot negate non-numeric value {other}"),
                ));
            }
        },
    })
}
