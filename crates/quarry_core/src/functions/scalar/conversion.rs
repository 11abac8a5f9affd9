use quarry_error::{DbError, ErrorKind, Result};

use super::ScalarFunction;
use crate::coerce::cast::{can_cast, cast_scalar};
use crate::coerce::numeric_result_type;
use crate::functions::{FunctionInfo, plan_check_num_args, plan_check_num_args_range};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Returns the first non-null argument.
///
/// Numeric arguments of different types are promoted to a common type. The
/// value returned by `execute` is the argument itself, callers cast it to the
/// planned return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coalesce;

impl FunctionInfo for Coalesce {
    fn name(&self) -> &'static str {
        "Coalesce"
    }
}

impl ScalarFunction for Coalesce {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args_range(self, inputs, 1, None)?;

        let mut out = DataType::Null;
        for dt in inputs {
            out = match (&out, dt) {
                (_, DataType::Null) => out,
                (DataType::Null, dt) => dt.clone(),
                (DataType::Any, _) | (_, DataType::Any) => DataType::Any,
                (a, b) if a == b => out,
                (a, b) => numeric_result_type(a, b).ok_or_else(|| {
                    DbError::with_kind(
                        ErrorKind::TypeMismatch,
                        format!("Coalesce arguments have incompatible types {a} and {b}"),
                    )
                    .with_field("function", self.name())
                })?,
            };
        }
        Ok(out)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(ScalarValue::Null))
    }
}

macro_rules! cast_function {
    ($name:ident, $display:expr, $target:expr) => {
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
                let target = $target;
                if !can_cast(&inputs[0], &target) {
                    return Err(crate::functions::invalid_input_type_error(
                        self, 0, &inputs[0],
                    ));
                }
                Ok(target)
            }

            fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
                cast_scalar(&args[0], &$target)
            }
        }
    };
}

cast_function!(ToStringFn, "ToString", DataType::Utf8);
cast_function!(ToInt32, "ToInt32", DataType::Int32);
cast_function!(ToInt64, "ToInt64", DataType::Int64);
cast_function!(ToDecimal, "ToDecimal", DataType::Decimal);
cast_function!(ToDouble, "ToDouble", DataType::Float64);
