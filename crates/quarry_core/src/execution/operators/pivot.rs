use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use quarry_error::Result;
use tracing::trace;

use crate::coerce::compare::partial_cmp_values;
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::functions::aggregate::{AggregateRef, AggregateState};
use crate::result::group::GroupKey;
use crate::result::row::Row;
use crate::types::scalar::ScalarValue;

/// One aggregation computed for every pivot value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotAggregate {
    pub function: AggregateRef,
    pub input: PhysicalScalarExpression,
}

impl fmt::Display for PivotAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function.function().name(), self.input)
    }
}

/// Turn the values of one column into columns.
///
/// Rows are grouped on the retained columns in first seen order. Each output
/// row holds the retained values followed by one cell per pivot value and
/// aggregation, value major. A cell no input row contributed to is null, for
/// counts as well. Rows whose pivot value is null or not among the pivot
/// values only create their group.
#[derive(Debug)]
pub struct PhysicalPivot {
    pub(crate) input: PhysicalOperator,
    pub(crate) retained: Vec<usize>,
    pub(crate) pivot_column: usize,
    pub(crate) aggregates: Vec<PivotAggregate>,
    pub(crate) values: Vec<ScalarValue>,
}

type Cells = Vec<Option<Box<dyn AggregateState>>>;

impl PhysicalPivot {
    pub fn new(
        input: PhysicalOperator,
        retained: Vec<usize>,
        pivot_column: usize,
        aggregates: Vec<PivotAggregate>,
        values: Vec<ScalarValue>,
    ) -> Self {
        PhysicalPivot {
            input,
            retained,
            pivot_column,
            aggregates,
            values,
        }
    }

    fn value_index(&self, value: &ScalarValue) -> Option<usize> {
        if value.is_null() {
            return None;
        }
        self.values
            .iter()
            .position(|v| partial_cmp_values(v, value) == Some(Ordering::Equal))
    }

    fn update(&self, cells: &mut Cells, row: &Row) -> Result<()> {
        let Some(pivot) = row.value(self.pivot_column) else {
            return Ok(());
        };
        let Some(value_idx) = self.value_index(pivot) else {
            return Ok(());
        };

        let mut eval = RowEvaluator::new(row, &[]);
        for (agg_idx, agg) in self.aggregates.iter().enumerate() {
            let input = eval.eval(&agg.input)?;
            let cell = &mut cells[value_idx * self.aggregates.len() + agg_idx];
            let state = cell.get_or_insert_with(|| {
                agg.function
                    .function()
                    .new_state(Some(&agg.input.datatype()))
            });
            state.update(&input)?;
        }
        Ok(())
    }
}

impl ExecutableOperator for PhysicalPivot {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let num_cells = self.values.len() * self.aggregates.len();
        let mut groups: IndexMap<GroupKey, Cells> = IndexMap::new();

        for row in self.input.execute(context)? {
            context.check_canceled()?;
            let row = row?;
            let key = GroupKey::new(
                self.retained
                    .iter()
                    .map(|&idx| row.value(idx).cloned().unwrap_or(ScalarValue::Null))
                    .collect(),
            );
            let cells = groups
                .entry(key)
                .or_insert_with(|| (0..num_cells).map(|_| None).collect());
            self.update(cells, &row)?;
        }

        trace!(num_groups = groups.len(), "pivoted input");

        let rows = groups
            .into_iter()
            .map(|(key, cells)| {
                let mut values = key.values().to_vec();
                for cell in &cells {
                    values.push(match cell {
                        Some(state) => state.finalize()?,
                        None => ScalarValue::Null,
                    });
                }
                Ok(Row::new(values))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalPivot {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Pivot")
            .with_value("column", format!("#{}", self.pivot_column))
            .with_values("aggregates", &self.aggregates)
            .with_values("values", &self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::collect_rows;
    use crate::execution::operators::values::PhysicalValues;
    use crate::functions::aggregate::find_aggregate_function;
    use crate::types::datatype::DataType;

    fn input() -> PhysicalOperator {
        // (region, category, amount)
        Box::new(PhysicalValues::new(vec![
            Row::new(vec!["east".into(), "a".into(), 1.into()]),
            Row::new(vec!["west".into(), "a".into(), 2.into()]),
            Row::new(vec!["east".into(), "b".into(), 3.into()]),
            Row::new(vec!["east".into(), ScalarValue::Null, 4.into()]),
            Row::new(vec!["north".into(), ScalarValue::Null, 5.into()]),
        ]))
    }

    fn aggregate(name: &str) -> PivotAggregate {
        PivotAggregate {
            function: AggregateRef(find_aggregate_function(name).unwrap()),
            input: PhysicalScalarExpression::column(2, DataType::Int32),
        }
    }

    #[test]
    fn missing_combinations_are_null() {
        let pivot = PhysicalPivot::new(
            input(),
            vec![0],
            1,
            vec![aggregate("sum")],
            vec!["a".into(), "b".into(), "c".into()],
        );
        let rows = collect_rows(&pivot, &ExecutionContext::default()).unwrap();
        assert_eq!(
            vec![
                Row::new(vec!["east".into(), 1i64.into(), 3i64.into(), ScalarValue::Null]),
                Row::new(vec!["west".into(), 2i64.into(), ScalarValue::Null, ScalarValue::Null]),
                Row::new(vec!["north".into(), ScalarValue::Null, ScalarValue::Null, ScalarValue::Null]),
            ],
            rows
        );
    }

    #[test]
    fn multiple_aggregations_value_major() {
        let pivot = PhysicalPivot::new(
            input(),
            vec![0],
            1,
            vec![aggregate("count"), aggregate("max")],
            vec!["a".into(), "b".into()],
        );
        let rows = collect_rows(&pivot, &ExecutionContext::default()).unwrap();
        assert_eq!(
            Row::new(vec![
                "west".into(),
                1i64.into(),
                2.into(),
                ScalarValue::Null,
                ScalarValue::Null,
            ]),
            rows[1]
        );
    }
}
