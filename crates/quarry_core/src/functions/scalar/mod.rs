pub mod conversion;
pub mod numeric;
pub mod random;
pub mod string;

use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use quarry_error::{DbError, ErrorKind, Result};

use super::{FunctionInfo, invalid_input_type_error};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionVolatility {
    /// Every call to this function with the same arguments is not guaranteed to
    /// return the same value.
    Volatile,
    /// This function is consistent within the query.
    Consistent,
}

/// A scalar function.
pub trait ScalarFunction: FunctionInfo + Debug + Sync + Send {
    fn volatility(&self) -> FunctionVolatility {
        FunctionVolatility::Consistent
    }

    /// Check the argument types and determine the return type.
    ///
    /// Errors with `ArityMismatch` or `TypeMismatch`.
    fn return_type(&self, inputs: &[DataType]) -> Result<DataType>;

    /// Execute the function for one row.
    fn execute(&self, args: &[ScalarValue]) -> Result<ScalarValue>;
}

pub static BUILTIN_SCALAR_FUNCTIONS: &[&dyn ScalarFunction] = &[
    &string::Length,
    &string::ToUpper,
    &string::ToLower,
    &string::Trim,
    &string::Substring,
    &string::Concat,
    &string::StartsWith,
    &string::EndsWith,
    &string::Replace,
    &string::IndexOf,
    &numeric::Abs,
    &numeric::Round,
    &numeric::Ceil,
    &numeric::Floor,
    &conversion::Coalesce,
    &conversion::ToStringFn,
    &conversion::ToInt32,
    &conversion::ToInt64,
    &conversion::ToDecimal,
    &conversion::ToDouble,
    &random::RandomNumber,
];

/// Find a builtin scalar function by name, ignoring ASCII case.
pub fn find_scalar_function(name: &str) -> Option<&'static dyn ScalarFunction> {
    BUILTIN_SCALAR_FUNCTIONS
        .iter()
        .copied()
        .find(|f| f.is_named(name))
}

/// Reference to a builtin function held by bound expressions.
///
/// Equality and hashing use the function name.
#[derive(Clone, Copy)]
pub struct FunctionRef(pub &'static dyn ScalarFunction);

impl FunctionRef {
    pub fn function(&self) -> &'static dyn ScalarFunction {
        self.0
    }
}

impl Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef({})", self.0.name())
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name() == other.0.name()
    }
}

impl Eq for FunctionRef {}

impl Hash for FunctionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name().hash(state)
    }
}

/// Accept strings, objects and untyped nulls.
pub(crate) fn check_string_input<F>(func: &F, idx: usize, datatype: &DataType) -> Result<()>
where
    F: FunctionInfo + ?Sized,
{
    match datatype {
        DataType::Utf8 | DataType::Any | DataType::Null => Ok(()),
        other => Err(invalid_input_type_error(func, idx, other)),
    }
}

pub(crate) fn check_numeric_input<F>(func: &F, idx: usize, datatype: &DataType) -> Result<()>
where
    F: FunctionInfo + ?Sized,
{
    if datatype.is_numeric() || datatype.is_any() || datatype.is_null() {
        Ok(())
    } else {
        Err(invalid_input_type_error(func, idx, datatype))
    }
}

pub(crate) fn check_integer_input<F>(func: &F, idx: usize, datatype: &DataType) -> Result<()>
where
    F: FunctionInfo + ?Sized,
{
    if datatype.is_integer() || datatype.is_any() || datatype.is_null() {
        Ok(())
    } else {
        Err(invalid_input_type_error(func, idx, datatype))
    }
}

/// Read a string argument at runtime.
pub(crate) fn str_arg<'a, F>(func: &F, value: &'a ScalarValue) -> Result<&'a str>
where
    F: FunctionInfo + ?Sized,
{
    match value {
        ScalarValue::Utf8(s) => Ok(s),
        other => Err(DbError::with_kind(
            ErrorKind::InvalidOperand,
            format!("Function '{}' expected a string, got '{other}'", func.name()),
        )
        .with_field("function", func.name())),
    }
}

/// Read an integer argument at runtime.
pub(crate) fn int_arg<F>(func: &F, value: &ScalarValue) -> Result<i64>
where
    F: FunctionInfo + ?Sized,
{
    value.try_as_i64().map_err(|_| {
        DbError::with_kind(
            ErrorKind::InvalidOperand,
            format!("Function '{}' expected an integer, got '{value}'", func.name()),
        )
        .with_field("function", func.name())
    })
}

fn any_null(args: &[ScalarValue]) -> bool {
    args.iter().any(|a| a.is_null())
}
