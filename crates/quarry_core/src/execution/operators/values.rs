use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::result::row::Row;

/// Produce a fixed set of rows.
///
/// A SELECT without FROM projects over a single empty row.
#[derive(Debug)]
pub struct PhysicalValues {
    rows: Vec<Row>,
}

impl PhysicalValues {
    pub fn new(rows: Vec<Row>) -> Self {
        PhysicalValues { rows }
    }

    pub fn single_empty_row() -> Self {
        PhysicalValues {
            rows: vec![Row::new(Vec::new())],
        }
    }
}

impl ExecutableOperator for PhysicalValues {
    fn execute<'a>(&'a self, _context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

impl Explainable for PhysicalValues {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Values").with_value("num_rows", self.rows.len())
    }
}
