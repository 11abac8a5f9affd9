use quarry_error::Result;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::result::row::Row;

/// Compute output rows, optionally filtering first.
///
/// The filter, projections and shared sub-expressions all evaluate against
/// the same input row, so a shared slot referenced by both the filter and a
/// projection is computed once.
#[derive(Debug)]
pub struct PhysicalProject {
    pub(crate) input: PhysicalOperator,
    pub(crate) filter: Option<PhysicalScalarExpression>,
    pub(crate) projections: Vec<PhysicalScalarExpression>,
    pub(crate) shared: Vec<PhysicalScalarExpression>,
}

impl PhysicalProject {
    pub fn new(input: PhysicalOperator, projections: Vec<PhysicalScalarExpression>) -> Self {
        PhysicalProject {
            input,
            filter: None,
            projections,
            shared: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Option<PhysicalScalarExpression>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_shared(mut self, shared: Vec<PhysicalScalarExpression>) -> Self {
        self.shared = shared;
        self
    }

    fn project_row(&self, row: &Row) -> Result<Option<Row>> {
        let mut eval = RowEvaluator::new(row, &self.shared);
        if let Some(filter) = &self.filter {
            if !eval.eval_predicate(filter)? {
                return Ok(None);
            }
        }
        let values = self
            .projections
            .iter()
            .map(|expr| eval.eval(expr))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Row::new(values)))
    }
}

impl ExecutableOperator for PhysicalProject {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let input = self.input.execute(context)?;
        Ok(Box::new(input.filter_map(move |row| {
            match row.and_then(|row| self.project_row(&row)) {
                Ok(Some(row)) => Some(Ok(row)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalProject {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("Project").with_values("projections", &self.projections);
        if let Some(filter) = &self.filter {
            ent = ent.with_value("filter", filter);
        }
        if !self.shared.is_empty() {
            ent = ent.with_values("shared", &self.shared);
        }
        ent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::compare::{ComparisonCoercion, ComparisonOperator};
    use crate::execution::collect_rows;
    use crate::execution::operators::values::PhysicalValues;
    use crate::functions::scalar::FunctionRef;
    use crate::functions::scalar::string::Length;
    use crate::types::datatype::DataType;
    use crate::types::scalar::ScalarValue;

    #[test]
    fn filter_and_projection_share_slot() {
        let values = PhysicalValues::new(vec![
            Row::new(vec!["Al".into()]),
            Row::new(vec!["Alice".into()]),
        ]);
        let shared = vec![PhysicalScalarExpression::ScalarFunction {
            function: FunctionRef(&Length),
            inputs: vec![PhysicalScalarExpression::column(0, DataType::Utf8)],
            datatype: DataType::Int32,
        }];
        let slot = PhysicalScalarExpression::Shared {
            slot: 0,
            datatype: DataType::Int32,
        };
        let filter = PhysicalScalarExpression::Comparison {
            op: ComparisonOperator::Gt,
            left: Box::new(slot.clone()),
            right: Box::new(PhysicalScalarExpression::literal(3.into())),
            coercion: ComparisonCoercion::Direct,
        };
        let project = PhysicalProject::new(
            Box::new(values),
            vec![PhysicalScalarExpression::column(0, DataType::Utf8), slot],
        )
        .with_filter(Some(filter))
        .with_shared(shared);

        let rows = collect_rows(&project, &ExecutionContext::default()).unwrap();
        assert_eq!(
            vec![Row::new(vec!["Alice".into(), ScalarValue::Int32(5)])],
            rows
        );
    }
}
