use quarry_error::{DbError, ErrorKind, Result};
use rand::Rng;

use super::{FunctionVolatility, ScalarFunction, any_null, check_integer_input, int_arg};
use crate::functions::{FunctionInfo, plan_check_num_args_range};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// `RandomNumber()` returns a float in `[0, 1)`, `RandomNumber(min, max)` an
/// integer in `[min, max)`.
///
/// Never shared between evaluations, every call produces a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomNumber;

impl FunctionInfo for RandomNumber {
    fn name(&self) -> &'static str {
        "RandomNumber"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["Random"]
    }
}

impl ScalarFunction for RandomNumber {
    fn volatility(&self) -> FunctionVolatility {
        FunctionVolatility::Volatile
    }

    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args_range(self, inputs, 0, Some(2))?;
        match inputs.len() {
            0 => Ok(DataType::Float64),
            2 => {
                check_integer_input(self, 0, &inputs[0])?;
                check_integer_input(self, 1, &inputs[1])?;
                Ok(DataType::Int32)
            }
            n => Err(DbError::with_kind(
                ErrorKind::ArityMismatch,
                format!("Function 'RandomNumber' expected 0 or 2 arguments, got {n}"),
            )
            .with_field("function", self.name())),
        }
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if args.is_empty() {
            return Ok(ScalarValue::Float64(rand::random::<f64>()));
        }
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }

        let min = int_arg(self, &args[0])?;
        let max = int_arg(self, &args[1])?;
        let (min, max) = match (i32::try_from(min), i32::try_from(max)) {
            (Ok(min), Ok(max)) => (min, max),
            _ => {
                return Err(DbError::with_kind(
                    ErrorKind::ArithmeticOverflow,
                    format!("RandomNumber bounds {min} and {max} must fit in an Int32"),
                )
                .with_field("function", self.name()));
            }
        };
        if min >= max {
            return Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("RandomNumber requires min < max, got {min} and {max}"),
            )
            .with_field("function", self.name()));
        }

        Ok(ScalarValue::Int32(rand::rng().random_range(min..max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_in_unit_range() {
        for _ in 0..100 {
            match RandomNumber.execute(&[]).unwrap() {
                ScalarValue::Float64(v) => assert!((0.0..1.0).contains(&v)),
                other => panic!("unexpected value: {other:?}"),
            }
        }
    }

    #[test]
    fn int_in_range() {
        for _ in 0..100 {
            match RandomNumber.execute(&[5.into(), 8.into()]).unwrap() {
                ScalarValue::Int32(v) => assert!((5..8).contains(&v)),
                other => panic!("unexpected value: {other:?}"),
            }
        }
    }

    #[test]
    fn one_arg_rejected() {
        let err = RandomNumber.return_type(&[DataType::Int32]).unwrap_err();
        assert_eq!(ErrorKind::ArityMismatch, err.kind());
    }

    #[test]
    fn is_volatile() {
        assert_eq!(FunctionVolatility::Volatile, RandomNumber.volatility());
    }
}
