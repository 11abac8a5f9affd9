use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::{AggregateFunction, AggregateState, star_not_supported};
use crate::coerce::cast::as_f64;
use crate::functions::{FunctionInfo, invalid_input_type_error};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Average of non-null values. Decimal inputs average to a decimal,
/// everything else to Float64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avg;

impl FunctionInfo for Avg {
    fn name(&self) -> &'static str {
        "Avg"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["Average"]
    }
}

impl AggregateFunction for Avg {
    fn return_type(&self, input: Option<&DataType>) -> Result<DataType> {
        let input = input.ok_or_else(|| star_not_supported(self))?;
        Ok(match input {
            DataType::Null => DataType::Null,
            DataType::Any => DataType::Any,
            DataType::Decimal => DataType::Decimal,
            dt if dt.is_numeric() => DataType::Float64,
            other => return Err(invalid_input_type_error(self, 0, other)),
        })
    }

    fn new_state(&self, _input: Option<&DataType>) -> Box<dyn AggregateState> {
        Box::new(AvgState::default())
    }
}

#[derive(Debug)]
pub struct AvgState {
    count: i64,
    float_sum: f64,
    /// Exact sum while every input has been a decimal.
    decimal_sum: Option<Decimal>,
}

impl Default for AvgState {
    fn default() -> Self {
        AvgState {
            count: 0,
            float_sum: 0.0,
            decimal_sum: Some(Decimal::ZERO),
        }
    }
}

impl AggregateState for AvgState {
    fn update(&mut self, input: &ScalarValue) -> Result<()> {
        if input.is_null() {
            return Ok(());
        }
        let f = as_f64(input).ok_or_else(|| {
            DbError::with_kind(
                ErrorKind::InvalidOperand,
                format!("Cannot average non-numeric value '{input}'"),
            )
        })?;

        self.decimal_sum = match (self.decimal_sum, input) {
            (Some(acc), ScalarValue::Decimal(v)) => Some(acc.checked_add(*v).ok_or_else(|| {
                DbError::with_kind(
                    ErrorKind::ArithmeticOverflow,
                    format!("Overflow when adding {v} to average"),
                )
            })?),
            _ => None,
        };
        self.float_sum += f;
        self.count += 1;
        Ok(())
    }

    fn finalize(&self) -> Result<ScalarValue> {
        if self.count == 0 {
            return Ok(ScalarValue::Null);
        }
        match self.decimal_sum {
            Some(sum) => {
                let avg = sum.checked_div(Decimal::from(self.count)).ok_or_else(|| {
                    DbError::with_kind(ErrorKind::ArithmeticOverflow, "Overflow computing average")
                })?;
                Ok(ScalarValue::Decimal(avg))
            }
            None => Ok(ScalarValue::Float64(self.float_sum / self.count as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_ints_is_float() {
        let mut state = Avg.new_state(Some(&DataType::Int32));
        for v in [1, 2, 4] {
            state.update(&v.into()).unwrap();
        }
        state.update(&ScalarValue::Null).unwrap();
        assert_eq!(ScalarValue::Float64(7.0 / 3.0), state.finalize().unwrap());
    }

    #[test]
    fn avg_decimal_exact() {
        let mut state = Avg.new_state(Some(&DataType::Decimal));
        state.update(&Decimal::new(10, 1).into()).unwrap();
        state.update(&Decimal::new(20, 1).into()).unwrap();
        assert_eq!(ScalarValue::Decimal(Decimal::new(15, 1)), state.finalize().unwrap());
    }

    #[test]
    fn avg_empty_is_null() {
        let state = Avg.new_state(Some(&DataType::Float64));
        assert_eq!(ScalarValue::Null, state.finalize().unwrap());
    }
}
