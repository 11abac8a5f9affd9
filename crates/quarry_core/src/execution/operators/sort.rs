use std::cmp::Ordering;
use std::fmt;

use quarry_error::Result;

use crate::coerce::compare::sort_cmp;
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::result::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub asc: bool,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.column, if self.asc { "ASC" } else { "DESC" })
    }
}

/// Fully materialize the input and sort it.
///
/// The sort is stable. Nulls sort first ascending and last descending. Rows
/// are cut down to `output_width` values afterwards, dropping hidden key
/// columns.
#[derive(Debug)]
pub struct PhysicalSort {
    pub(crate) input: PhysicalOperator,
    pub(crate) keys: Vec<SortKey>,
    pub(crate) output_width: usize,
}

impl PhysicalSort {
    pub fn new(input: PhysicalOperator, keys: Vec<SortKey>, output_width: usize) -> Self {
        PhysicalSort {
            input,
            keys,
            output_width,
        }
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let (Some(l), Some(r)) = (a.value(key.column), b.value(key.column)) else {
                continue;
            };
            let ord = sort_cmp(l, r);
            let ord = if key.asc { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl ExecutableOperator for PhysicalSort {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let mut rows = Vec::new();
        for row in self.input.execute(context)? {
            context.check_canceled()?;
            rows.push(row?);
        }

        rows.sort_by(|a, b| self.compare(a, b));

        let width = self.output_width;
        Ok(Box::new(rows.into_iter().map(move |mut row| {
            if row.len() > width {
                row.truncate(width);
            }
            Ok(row)
        })))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalSort {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Sort").with_values("keys", &self.keys)
    }
}
