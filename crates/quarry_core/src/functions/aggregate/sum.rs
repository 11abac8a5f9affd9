use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::{AggregateFunction, AggregateState, star_not_supported};
use crate::coerce::arith::{ArithOperator, eval_arith};
use crate::coerce::cast::{as_f64, as_i128, int_from_i128};
use crate::functions::{FunctionInfo, invalid_input_type_error};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Sum of non-null values. Signed integers sum to Int64, unsigned to UInt64,
/// floats to Float64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sum;

impl FunctionInfo for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }
}

impl AggregateFunction for Sum {
    fn return_type(&self, input: Option<&DataType>) -> Result<DataType> {
        let input = input.ok_or_else(|| star_not_supported(self))?;
        Ok(match input {
            DataType::Null => DataType::Null,
            DataType::Any => DataType::Any,
            DataType::Decimal => DataType::Decimal,
            DataType::Float32 | DataType::Float64 => DataType::Float64,
            dt if dt.is_unsigned() => DataType::UInt64,
            dt if dt.is_integer() => DataType::Int64,
            other => return Err(invalid_input_type_error(self, 0, other)),
        })
    }

    fn new_state(&self, input: Option<&DataType>) -> Box<dyn AggregateState> {
        let output = input
            .and_then(|dt| self.return_type(Some(dt)).ok())
            .unwrap_or(DataType::Any);
        Box::new(SumState {
            output,
            acc: SumAccumulator::Empty,
        })
    }
}

/// Running sum, widened so intermediate results don't overflow the input
/// type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SumAccumulator {
    Empty,
    Int(i128),
    Float(f64),
    Decimal(Decimal),
    /// Mixed input kinds, only possible for untyped inputs.
    Value(ScalarValue),
}

impl SumAccumulator {
    pub(crate) fn add(&mut self, value: &ScalarValue) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }

        let next = match (&*self, value) {
            (Self::Empty | Self::Int(_), v) if as_i128(v).is_some() => {
                let current = match self {
                    Self::Int(acc) => *acc,
                    _ => 0,
                };
                let v = as_i128(v).unwrap_or_default();
                Self::Int(current.checked_add(v).ok_or_else(|| overflow(value))?)
            }
            (Self::Empty, ScalarValue::Float32(_) | ScalarValue::Float64(_)) => {
                Self::Float(as_f64(value).unwrap_or_default())
            }
            (Self::Float(acc), ScalarValue::Float32(_) | ScalarValue::Float64(_)) => {
                Self::Float(acc + as_f64(value).unwrap_or_default())
            }
            (Self::Empty, ScalarValue::Decimal(v)) => Self::Decimal(*v),
            (Self::Decimal(acc), ScalarValue::Decimal(v)) => {
                Self::Decimal(acc.checked_add(*v).ok_or_else(|| overflow(value))?)
            }
            (_, v) if !v.datatype().is_numeric() => {
                return Err(DbError::with_kind(
                    ErrorKind::InvalidOperand,
                    format!("Cannot sum non-numeric value '{v}'"),
                ));
            }
            (acc, v) => {
                let current = acc.to_value()?;
                Self::Value(eval_arith(ArithOperator::Add, &current, v)?)
            }
        };
        *self = next;
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn to_value(&self) -> Result<ScalarValue> {
        Ok(match self {
            Self::Empty => ScalarValue::Null,
            Self::Int(v) => int_from_i128(*v, &DataType::Int64)
                .or_else(|| int_from_i128(*v, &DataType::UInt64))
                .ok_or_else(|| {
                    DbError::with_kind(
                        ErrorKind::ArithmeticOverflow,
                        format!("Sum {v} does not fit in a 64-bit integer"),
                    )
                })?,
            Self::Float(v) => ScalarValue::Float64(*v),
            Self::Decimal(v) => ScalarValue::Decimal(*v),
            Self::Value(v) => v.clone(),
        })
    }
}

fn overflow(value: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::ArithmeticOverflow,
        format!("Overflow when adding {value} to sum"),
    )
}

#[derive(Debug)]
pub struct SumState {
    output: DataType,
    acc: SumAccumulator,
}

impl AggregateState for SumState {
    fn update(&mut self, input: &ScalarValue) -> Result<()> {
        self.acc.add(input)
    }

    fn finalize(&self) -> Result<ScalarValue> {
        match (&self.acc, &self.output) {
            (SumAccumulator::Int(v), dt) if dt.is_integer() => int_from_i128(*v, dt).ok_or_else(|| {
                DbError::with_kind(
                    ErrorKind::ArithmeticOverflow,
                    format!("Sum {v} does not fit in {dt}"),
                )
            }),
            (acc, _) => acc.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_of(dt: &DataType, values: &[ScalarValue]) -> Result<ScalarValue> {
        let mut state = Sum.new_state(Some(dt));
        for v in values {
            state.update(v)?;
        }
        state.finalize()
    }

    #[test]
    fn sum_widens_ints() {
        let out = sum_of(
            &DataType::Int32,
            &[i32::MAX.into(), i32::MAX.into(), ScalarValue::Null],
        )
        .unwrap();
        assert_eq!(ScalarValue::Int64(2 * i32::MAX as i64), out);
    }

    #[test]
    fn sum_int64_overflow() {
        let err = sum_of(&DataType::Int64, &[i64::MAX.into(), 1i64.into()]).unwrap_err();
        assert_eq!(ErrorKind::ArithmeticOverflow, err.kind());
    }

    #[test]
    fn sum_empty_is_null() {
        assert_eq!(ScalarValue::Null, sum_of(&DataType::Int32, &[]).unwrap());
    }

    #[test]
    fn sum_decimal() {
        let out = sum_of(
            &DataType::Decimal,
            &[Decimal::new(15, 1).into(), Decimal::new(25, 1).into()],
        )
        .unwrap();
        assert_eq!(ScalarValue::Decimal(Decimal::new(40, 1)), out);
    }

    #[test]
    fn sum_untyped_mixed() {
        let out = sum_of(&DataType::Any, &[1.into(), 0.5f64.into()]).unwrap();
        assert_eq!(ScalarValue::Float64(1.5), out);
    }

    #[test]
    fn sum_rejects_strings() {
        let err = Sum.return_type(Some(&DataType::Utf8)).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
