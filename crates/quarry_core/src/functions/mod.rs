pub mod aggregate;
pub mod scalar;

use quarry_error::{DbError, ErrorKind, Result};

use crate::types::datatype::DataType;
use crate::util::suggest::did_you_mean;

/// Trait for defining information about functions.
pub trait FunctionInfo {
    /// Name of the function as it's displayed.
    fn name(&self) -> &'static str;

    /// Other names the function can be called by.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// If `name` refers to this function, ignoring ASCII case.
    fn is_named(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Check that the number of inputs is exactly `expected`.
pub fn plan_check_num_args<F>(func: &F, inputs: &[DataType], expected: usize) -> Result<()>
where
    F: FunctionInfo + ?Sized,
{
    plan_check_num_args_range(func, inputs, expected, Some(expected))
}

/// Check that the number of inputs is within a range. `max` of `None` means
/// variadic.
pub fn plan_check_num_args_range<F>(
    func: &F,
    inputs: &[DataType],
    min: usize,
    max: Option<usize>,
) -> Result<()>
where
    F: FunctionInfo + ?Sized,
{
    let n = inputs.len();
    let ok = n >= min && max.is_none_or(|max| n <= max);
    if ok {
        return Ok(());
    }

    let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    Err(DbError::with_kind(
        ErrorKind::ArityMismatch,
        format!(
            "Function '{}' expected {expected} arguments, got {n}",
            func.name()
        ),
    )
    .with_field("function", func.name()))
}

/// Error for an argument with an unsupported type.
pub fn invalid_input_type_error<F>(func: &F, idx: usize, datatype: &DataType) -> DbError
where
    F: FunctionInfo + ?Sized,
{
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!(
            "Function '{}' does not accept {datatype} as argument {}",
            func.name(),
            idx + 1
        ),
    )
    .with_field("function", func.name())
}

/// Error for a function name that's neither a scalar nor an aggregate
/// function.
pub fn unknown_function_error(name: &str) -> DbError {
    let candidates = scalar::BUILTIN_SCALAR_FUNCTIONS
        .iter()
        .map(|f| f.name())
        .chain(aggregate::BUILTIN_AGGREGATE_FUNCTIONS.iter().map(|f| f.name()));

    let msg = format!("Unknown function '{name}'");
    let msg = match did_you_mean(name, candidates) {
        Some(s) => format!("{msg}. Did you mean '{s}'?"),
        None => msg,
    };
    DbError::with_kind(ErrorKind::UnknownFunction, msg).with_field("function", name)
}
