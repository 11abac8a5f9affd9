use std::cmp::Ordering;

use quarry_error::Result;

use super::{AggregateFunction, AggregateState, star_not_supported};
use crate::coerce::compare::sort_cmp;
use crate::functions::{FunctionInfo, invalid_input_type_error};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

fn minmax_return_type<F>(func: &F, input: Option<&DataType>) -> Result<DataType>
where
    F: FunctionInfo,
{
    let input = input.ok_or_else(|| star_not_supported(func))?;
    match input {
        DataType::List(_) | DataType::Struct(_) => Err(invalid_input_type_error(func, 0, input)),
        other => Ok(other.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Min;

impl FunctionInfo for Min {
    fn name(&self) -> &'static str {
        "Min"
    }
}

impl AggregateFunction for Min {
    fn return_type(&self, input: Option<&DataType>) -> Result<DataType> {
        minmax_return_type(self, input)
    }

    fn new_state(&self, _input: Option<&DataType>) -> Box<dyn AggregateState> {
        Box::new(MinMaxState {
            keep: Ordering::Less,
            current: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Max;

impl FunctionInfo for Max {
    fn name(&self) -> &'static str {
        "Max"
    }
}

impl AggregateFunction for Max {
    fn return_type(&self, input: Option<&DataType>) -> Result<DataType> {
        minmax_return_type(self, input)
    }

    fn new_state(&self, _input: Option<&DataType>) -> Box<dyn AggregateState> {
        Box::new(MinMaxState {
            keep: Ordering::Greater,
            current: None,
        })
    }
}

/// Keeps the value that orders `keep` relative to every other value seen.
#[derive(Debug)]
pub struct MinMaxState {
    keep: Ordering,
    current: Option<ScalarValue>,
}

impl AggregateState for MinMaxState {
    fn update(&mut self, input: &ScalarValue) -> Result<()> {
        if input.is_null() {
            return Ok(());
        }
        let replace = match &self.current {
            Some(current) => sort_cmp(input, current) == self.keep,
            None => true,
        };
        if replace {
            self.current = Some(input.clone());
        }
        Ok(())
    }

    fn finalize(&self) -> Result<ScalarValue> {
        Ok(self.current.clone().unwrap_or(ScalarValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_ignore_nulls() {
        let mut min = Min.new_state(Some(&DataType::Int32));
        let mut max = Max.new_state(Some(&DataType::Int32));
        for v in [ScalarValue::Null, 3.into(), 1.into(), 7.into()] {
            min.update(&v).unwrap();
            max.update(&v).unwrap();
        }
        assert_eq!(ScalarValue::Int32(1), min.finalize().unwrap());
        assert_eq!(ScalarValue::Int32(7), max.finalize().unwrap());
    }

    #[test]
    fn min_strings() {
        let mut min = Min.new_state(Some(&DataType::Utf8));
        for v in ["b", "a", "c"] {
            min.update(&v.into()).unwrap();
        }
        assert_eq!(ScalarValue::from("a"), min.finalize().unwrap());
    }

    #[test]
    fn all_null_is_null() {
        let mut max = Max.new_state(Some(&DataType::Int32));
        max.update(&ScalarValue::Null).unwrap();
        assert_eq!(ScalarValue::Null, max.finalize().unwrap());
    }
}
