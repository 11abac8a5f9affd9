use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::result::row::Row;

/// Read the rows of a materialized CTE.
///
/// Rows get a single empty context since they don't come from a source
/// record.
#[derive(Debug)]
pub struct PhysicalCteScan {
    pub(crate) name: String,
    pub(crate) slot: usize,
}

impl PhysicalCteScan {
    pub fn new(name: impl Into<String>, slot: usize) -> Self {
        PhysicalCteScan {
            name: name.into(),
            slot,
        }
    }
}

impl ExecutableOperator for PhysicalCteScan {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let table = context.cte(self.slot)?;
        Ok(Box::new(table.iter().map(move |row| {
            context.check_canceled()?;
            Row::try_with_contexts(row.values().to_vec(), vec![None])
        })))
    }
}

impl Explainable for PhysicalCteScan {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("CteScan")
            .with_value("cte", &self.name)
            .with_value("slot", self.slot)
    }
}
