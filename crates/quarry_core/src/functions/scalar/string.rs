use quarry_error::Result;

use super::{ScalarFunction, any_null, check_integer_input, check_string_input, int_arg, str_arg};
use crate::functions::{FunctionInfo, plan_check_num_args, plan_check_num_args_range};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Number of characters in a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length;

impl FunctionInfo for Length {
    fn name(&self) -> &'static str {
        "Length"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["Len"]
    }
}

impl ScalarFunction for Length {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args(self, inputs, 1)?;
        check_string_input(self, 0, &inputs[0])?;
        Ok(DataType::Int32)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }
        let s = str_arg(self, &args[0])?;
        Ok(ScalarValue::Int32(s.chars().count() as i32))
    }
}

macro_rules! unary_string_function {
    ($name:ident, $display:expr, $func:expr) => {
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
                check_string_input(self, 0, &inputs[0])?;
                Ok(DataType::Utf8)
            }

            fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
                if any_null(args) {
                    return Ok(ScalarValue::Null);
                }
                let s = str_arg(self, &args[0])?;
                let f: fn(&str) -> String = $func;
                Ok(ScalarValue::Utf8(f(s)))
            }
        }
    };
}

unary_string_function!(ToUpper, "ToUpper", |s| s.to_uppercase());
unary_string_function!(ToLower, "ToLower", |s| s.to_lowercase());
unary_string_function!(Trim, "Trim", |s| s.trim().to_string());

/// `Substring(s, start[, length])` with a zero-based start.
///
/// Out of range positions are clamped rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substring;

impl FunctionInfo for Substring {
    fn name(&self) -> &'static str {
        "Substring"
    }
}

impl ScalarFunction for Substring {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args_range(self, inputs, 2, Some(3))?;
        check_string_input(self, 0, &inputs[0])?;
        for (idx, dt) in inputs.iter().enumerate().skip(1) {
            check_integer_input(self, idx, dt)?;
        }
        Ok(DataType::Utf8)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }
        let s = str_arg(self, &args[0])?;
        let start = int_arg(self, &args[1])?.max(0) as usize;
        let chars = s.chars().skip(start);
        let out: String = match args.get(2) {
            Some(len) => chars.take(int_arg(self, len)?.max(0) as usize).collect(),
            None => chars.collect(),
        };
        Ok(ScalarValue::Utf8(out))
    }
}

/// Concatenate the string forms of all arguments. Nulls are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concat;

impl FunctionInfo for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }
}

impl ScalarFunction for Concat {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args_range(self, inputs, 1, None)?;
        Ok(DataType::Utf8)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        let mut out = String::new();
        for arg in args.iter().filter(|a| !a.is_null()) {
            match arg {
                ScalarValue::Utf8(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        Ok(ScalarValue::Utf8(out))
    }
}

macro_rules! binary_string_predicate {
    ($name:ident, $display:expr, $func:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl FunctionInfo for $name {
            fn name(&self) -> &'static str {
                $display
            }
        }

        impl ScalarFunction for $name {
            fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
                plan_check_num_args(self, inputs, 2)?;
                check_string_input(self, 0, &inputs[0])?;
                check_string_input(self, 1, &inputs[1])?;
                Ok(DataType::Boolean)
            }

            fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
                if any_null(args) {
                    return Ok(ScalarValue::Null);
                }
                let s = str_arg(self, &args[0])?;
                let pat = str_arg(self, &args[1])?;
                let f: fn(&str, &str) -> bool = $func;
                Ok(ScalarValue::Boolean(f(s, pat)))
            }
        }
    };
}

binary_string_predicate!(StartsWith, "StartsWith", |s, p| s.starts_with(p));
binary_string_predicate!(EndsWith, "EndsWith", |s, p| s.ends_with(p));

/// `Replace(s, from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replace;

impl FunctionInfo for Replace {
    fn name(&self) -> &'static str {
        "Replace"
    }
}

impl ScalarFunction for Replace {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args(self, inputs, 3)?;
        for (idx, dt) in inputs.iter().enumerate() {
            check_string_input(self, idx, dt)?;
        }
        Ok(DataType::Utf8)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }
        let s = str_arg(self, &args[0])?;
        let from = str_arg(self, &args[1])?;
        let to = str_arg(self, &args[2])?;
        if from.is_empty() {
            return Ok(ScalarValue::Utf8(s.to_string()));
        }
        Ok(ScalarValue::Utf8(s.replace(from, to)))
    }
}

/// Zero-based character position of a substring, or -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOf;

impl FunctionInfo for IndexOf {
    fn name(&self) -> &'static str {
        "IndexOf"
    }
}

impl ScalarFunction for IndexOf {
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType> {
        plan_check_num_args(self, inputs, 2)?;
        check_string_input(self, 0, &inputs[0])?;
        check_string_input(self, 1, &inputs[1])?;
        Ok(DataType::Int32)
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        if any_null(args) {
            return Ok(ScalarValue::Null);
        }
        let s = str_arg(self, &args[0])?;
        let needle = str_arg(self, &args[1])?;
        let pos = match s.find(needle) {
            Some(byte_pos) => s[..byte_pos].chars().count() as i32,
            None => -1,
        };
        Ok(ScalarValue::Int32(pos))
    }
}
