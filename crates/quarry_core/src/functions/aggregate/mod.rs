pub mod avg;
pub mod count;
pub mod minmax;
pub mod sum;

use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use quarry_error::{DbError, ErrorKind, Result};

use super::FunctionInfo;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// A generic aggregate function.
///
/// Every aggregate takes a single input, `None` standing in for `*`.
pub trait AggregateFunction: FunctionInfo + Debug + Sync + Send {
    /// Check the input type and determine the return type.
    fn return_type(&self, input: Option<&DataType>) -> Result<DataType>;

    /// Create fresh state for a single group.
    fn new_state(&self, input: Option<&DataType>) -> Box<dyn AggregateState>;

    /// If the result can be null, such as when every input is null.
    fn is_nullable(&self) -> bool {
        true
    }
}

/// Running state of an aggregate for one group.
pub trait AggregateState: Debug + Send {
    /// Feed a single input value.
    fn update(&mut self, input: &ScalarValue) -> Result<()>;

    /// Produce the aggregate result for the values seen so far.
    fn finalize(&self) -> Result<ScalarValue>;
}

pub static BUILTIN_AGGREGATE_FUNCTIONS: &[&dyn AggregateFunction] = &[
    &count::Count,
    &sum::Sum,
    &avg::Avg,
    &minmax::Min,
    &minmax::Max,
];

pub fn find_aggregate_function(name: &str) -> Option<&'static dyn AggregateFunction> {
    BUILTIN_AGGREGATE_FUNCTIONS
        .iter()
        .copied()
        .find(|f| f.is_named(name))
}

pub fn is_aggregate_function(name: &str) -> bool {
    find_aggregate_function(name).is_some()
}

/// Reference to a builtin aggregate held by bound expressions.
#[derive(Clone, Copy)]
pub struct AggregateRef(pub &'static dyn AggregateFunction);

impl AggregateRef {
    pub fn function(&self) -> &'static dyn AggregateFunction {
        self.0
    }
}

impl Debug for AggregateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AggregateRef({})", self.0.name())
    }
}

impl PartialEq for AggregateRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name() == other.0.name()
    }
}

impl Eq for AggregateRef {}

impl Hash for AggregateRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name().hash(state)
    }
}

/// Error for `*` passed to an aggregate other than `Count`.
pub(crate) fn star_not_supported<F>(func: &F) -> DbError
where
    F: FunctionInfo + ?Sized,
{
    DbError::with_kind(
        ErrorKind::InvalidArgument,
        format!("'*' is not a valid argument to '{}'", func.name()),
    )
    .with_field("function", func.name())
}
