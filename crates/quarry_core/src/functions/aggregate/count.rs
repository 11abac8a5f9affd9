use quarry_error::Result;

use super::{AggregateFunction, AggregateState};
use crate::functions::FunctionInfo;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// `Count(*)` counts rows, `Count(expr)` counts non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count;

impl FunctionInfo for Count {
    fn name(&self) -> &'static str {
        "Count"
    }
}

impl AggregateFunction for Count {
    fn return_type(&self, _input: Option<&DataType>) -> Result<DataType> {
        Ok(DataType::Int64)
    }

    fn is_nullable(&self) -> bool {
        false
    }

    fn new_state(&self, input: Option<&DataType>) -> Box<dyn AggregateState> {
        Box::new(CountState {
            count: 0,
            star: input.is_none(),
        })
    }
}

#[derive(Debug, Default)]
pub struct CountState {
    count: i64,
    star: bool,
}

impl AggregateState for CountState {
    fn update(&mut self, input: &ScalarValue) -> Result<()> {
        if self.star || !input.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(self.count))
    }
}
