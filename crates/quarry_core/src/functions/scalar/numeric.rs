use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::RoundingStrategy;

use super::{ScalarFunction, any_null, check_integer_input, check_numeric_input, int_arg};
use crate::functions::{FunctionInfo, plan_check_num_args, plan_check_num_args_range};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

fn overflow_error(func: &dyn FunctionInfo, value: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::ArithmeticOverflow,
        format!("Overflow in '{}' for value {value}", func.name()),
    )
    .with_field("function", func.name())
}

fn not_numeric_error(func: &dyn FunctionInfo, value: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::InvalidOperand,
        format!("Function '{}' expected a number, got '{value}'", func.name()),
    )
    .with_field("function", func.name())
}

/// Numeric functions keep the type of their input. Untyped inputs produce
/// untyped outputs.
fn numeric_return_type(func: &dyn FunctionInfo, input: &DataType) -> Result<DataType> {
    match input {
        DataType::Null => Ok(DataType::Null),
        DataType::Any => Ok(DataType::Any),
        dt if dt.is_numeric() => Ok(dt.clone()),
        other => Err(crate::functions::invalid_input_type_error(func, 0, other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abs;

impl FunctionInfo for Abs {
    fn name(&self) -> &'static str {
        "Abs"
    }
}

impl ScalarFunction for Abs {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args(self, inputs, 1)?;
        numeric_return_type(self, &inputs[0])
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        let v = &args[0];
        let out = match v {
            ScalarValue::Null => ScalarValue::Null,
            ScalarValue::Int8(x) => ScalarValue::Int8(x.checked_abs().ok_or_else(|| overflow_error(self, v))?),
            ScalarValue::Int16(x) => ScalarValue::Int16(x.checked_abs().ok_or_else(|| overflow_error(self, v))?),
            ScalarValue::Int32(x) => ScalarValue::Int32(x.checked_abs().ok_or_else(|| overflow_error(self, v))?),
            ScalarValue::Int64(x) => ScalarValue::Int64(x.checked_abs().ok_or_else(|| overflow_error(self, v))?),
            ScalarValue::UInt8(_)
            | ScalarValue::UInt16(_)
            | ScalarValue::UInt32(_)
            | ScalarValue::UInt64(_) => v.clone(),
            ScalarValue::Float32(x) => ScalarValue::Float32(x.abs()),
            ScalarValue::Float64(x) => ScalarValue::Float64(x.abs()),
            ScalarValue::Decimal(x) => ScalarValue::Decimal(x.abs()),
            other => return Err(not_numeric_error(self, other)),
        };
        Ok(out)
    }
}

/// `Round(x[, digits])`. Midpoints round away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round;

impl FunctionInfo for Round {
    fn name(&self) -> &'static str {
        "Round"
    }
}

impl ScalarFunction for Round {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args_range(self, inputs, 1, Some(2))?;
        check_numeric_input(self, 0, &inputs[0])?;
        if let Some(digits) = inputs.get(1) {
            check_integer_input(self, 1, digits)?;
        }
        numeric_return_type(self, &inputs[0])
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }
        let digits = match args.get(1) {
            Some(d) => int_arg(self, d)?.clamp(0, 28) as u32,
            None => 0,
        };

        let v = &args[0];
        let out = match v {
            ScalarValue::Decimal(d) => ScalarValue::Decimal(
                d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero),
            ),
            ScalarValue::Float64(f) => ScalarValue::Float64(round_f64(*f, digits)),
            ScalarValue::Float32(f) => ScalarValue::Float32(round_f64(*f as f64, digits) as f32),
            v if v.datatype().is_integer() => v.clone(),
            other => return Err(not_numeric_error(self, other)),
        };
        Ok(out)
    }
}

fn round_f64(v: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (v * scale).round() / scale
}

macro_rules! rounding_function {
    ($name:ident, $display:expr, $float:ident, $decimal:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl FunctionInfo for $name {
            fn name(&self) -> &'static str {
                $display
            }
        }

        impl ScalarFunction for $name {
            fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
                plan_check_num_args(self, inputs, 1)?;
                numeric_return_type(self, &inputs[0])
            }

            fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
                let v = &args[0];
                let out = match v {
                    ScalarValue::Null => ScalarValue::Null,
                    ScalarValue::Float32(f) => ScalarValue::Float32(f.$float()),
                    ScalarValue::Float64(f) => ScalarValue::Float64(f.$float()),
                    ScalarValue::Decimal(d) => ScalarValue::Decimal(d.$decimal()),
                    v if v.datatype().is_integer() => v.clone(),
                    other => return Err(not_numeric_error(self, other)),
                };
                Ok(out)
            }
        }
    };
}

rounding_function!(Ceil, "Ceil", ceil, ceil);
rounding_function!(Floor, "Floor", floor, floor);

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn abs_overflow() {
        let err = Abs.execute(&[ScalarValue::Int32(i32::MIN)]).unwrap_err();
        assert_eq!(ErrorKind::ArithmeticOverflow, err.kind());
        assert_eq!(ScalarValue::Int32(4), Abs.execute(&[ScalarValue::Int32(-4)]).unwrap());
    }

    #[test]
    fn round_decimal_away_from_zero() {
        let out = Round
            .execute(&[ScalarValue::Decimal(Decimal::new(25, 1))])
            .unwrap();
        assert_eq!(ScalarValue::Decimal(Decimal::new(3, 0)), out);

        let out = Round
            .execute(&[ScalarValue::Decimal(Decimal::new(-12345, 3)), 2.into()])
            .unwrap();
        assert_eq!(ScalarValue::Decimal(Decimal::new(-1235, 2)), out);
    }

    #[test]
    fn round_keeps_integers() {
        assert_eq!(ScalarValue::Int64(7), Round.execute(&[7i64.into()]).unwrap());
    }

    #[test]
    fn ceil_floor() {
        assert_eq!(ScalarValue::Float64(2.0), Ceil.execute(&[1.2f64.into()]).unwrap());
        assert_eq!(ScalarValue::Float64(1.0), Floor.execute(&[1.8f64.into()]).unwrap());
    }

    #[test]
    fn rejects_strings() {
        let err = Abs.return_type(&[DataType::Utf8]).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
