use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;

/// Keep rows where the predicate is true. Null is falsy.
#[derive(Debug)]
pub struct PhysicalFilter {
    pub(crate) input: PhysicalOperator,
    pub(crate) predicate: PhysicalScalarExpression,
}

impl PhysicalFilter {
    pub fn new(input: PhysicalOperator, predicate: PhysicalScalarExpression) -> Self {
        PhysicalFilter { input, predicate }
    }
}

impl ExecutableOperator for PhysicalFilter {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let input = self.input.execute(context)?;
        Ok(Box::new(input.filter_map(move |row| {
            let row = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            match RowEvaluator::new(&row, &[]).eval_predicate(&self.predicate) {
                Ok(true) => Some(Ok(row)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        })))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalFilter {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Filter").with_value("predicate", &self.predicate)
    }
}
