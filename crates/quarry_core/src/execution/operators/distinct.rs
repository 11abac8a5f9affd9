use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::types::scalar::ScalarValue;
use crate::util::hash::{HashSet, RANDOM_STATE};

/// Drop rows whose leading `num_columns` values were already emitted.
///
/// Values past `num_columns` (hidden sort keys) don't take part in the
/// comparison; the first row seen wins.
#[derive(Debug)]
pub struct PhysicalDistinct {
    pub(crate) input: PhysicalOperator,
    pub(crate) num_columns: usize,
}

impl PhysicalDistinct {
    pub fn new(input: PhysicalOperator, num_columns: usize) -> Self {
        PhysicalDistinct { input, num_columns }
    }
}

impl ExecutableOperator for PhysicalDistinct {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let mut seen: HashSet<Vec<ScalarValue>> = HashSet::with_hasher(RANDOM_STATE);
        let input = self.input.execute(context)?;
        Ok(Box::new(input.filter(move |row| match row {
            Ok(row) => {
                let width = self.num_columns.min(row.len());
                seen.insert(row.values()[..width].to_vec())
            }
            Err(_) => true,
        })))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalDistinct {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Distinct").with_value("num_columns", self.num_columns)
    }
}
