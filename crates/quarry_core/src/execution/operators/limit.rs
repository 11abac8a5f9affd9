use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};

/// Operator for SKIP and TAKE clauses.
#[derive(Debug)]
pub struct PhysicalLimit {
    pub(crate) input: PhysicalOperator,
    /// Number of rows to skip before emitting anything.
    pub(crate) skip: usize,
    /// Number of rows to emit, all remaining if not set.
    pub(crate) take: Option<usize>,
}

impl PhysicalLimit {
    pub fn new(input: PhysicalOperator, skip: Option<usize>, take: Option<usize>) -> Self {
        PhysicalLimit {
            input,
            skip: skip.unwrap_or(0),
            take,
        }
    }
}

impl ExecutableOperator for PhysicalLimit {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let mut remaining_skip = self.skip;
        let input = self.input.execute(context)?.filter(move |row| {
            // Errors are never skipped.
            if row.is_ok() && remaining_skip > 0 {
                remaining_skip -= 1;
                return false;
            }
            true
        });
        match self.take {
            Some(take) => Ok(Box::new(input.take(take))),
            None => Ok(Box::new(input)),
        }
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalLimit {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("Limit").with_value("skip", self.skip);
        if let Some(take) = self.take {
            ent = ent.with_value("take", take);
        }
        ent
    }
}
