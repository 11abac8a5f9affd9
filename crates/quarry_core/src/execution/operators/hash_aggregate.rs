use std::fmt;

use indexmap::IndexMap;
use quarry_error::Result;
use tracing::trace;

use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::functions::aggregate::AggregateRef;
use crate::result::group::{Group, GroupKey, GroupLayout, GroupRow};
use crate::result::row::Row;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// A bound aggregate call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalAggregateExpression {
    pub function: AggregateRef,
    /// Argument, `None` for `*`.
    pub input: Option<PhysicalScalarExpression>,
    /// Return type of the aggregate.
    pub datatype: DataType,
}

impl PhysicalAggregateExpression {
    fn input_type(&self) -> Option<DataType> {
        self.input.as_ref().map(|e| e.datatype())
    }
}

impl fmt::Display for PhysicalAggregateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}({input})", self.function.function().name()),
            None => write!(f, "{}(*)", self.function.function().name()),
        }
    }
}

/// Group input rows and compute aggregates per group.
///
/// Output rows hold the group values followed by the aggregate results.
/// Groups come out in the order their keys were first seen, except that
/// groups with a null in their key come after all others. Without grouping
/// expressions there's exactly one group, even for empty input.
#[derive(Debug)]
pub struct PhysicalHashAggregate {
    pub(crate) input: PhysicalOperator,
    pub(crate) groups: Vec<PhysicalScalarExpression>,
    pub(crate) aggregates: Vec<PhysicalAggregateExpression>,
    layout: GroupLayout,
}

impl PhysicalHashAggregate {
    pub fn new(
        input: PhysicalOperator,
        groups: Vec<PhysicalScalarExpression>,
        aggregates: Vec<PhysicalAggregateExpression>,
    ) -> Self {
        let mut layout = GroupLayout::new();
        for group in &groups {
            layout.push(group.to_string());
        }
        for agg in &aggregates {
            layout.push(agg.to_string());
        }
        PhysicalHashAggregate {
            input,
            groups,
            aggregates,
            layout,
        }
    }

    fn new_group(&self, key: GroupKey) -> Group {
        let states = self
            .aggregates
            .iter()
            .map(|agg| agg.function.function().new_state(agg.input_type().as_ref()))
            .collect();
        Group::new(key, states)
    }

    fn aggregate_inputs(&self, eval: &mut RowEvaluator) -> Result<Vec<ScalarValue>> {
        self.aggregates
            .iter()
            .map(|agg| match &agg.input {
                Some(input) => eval.eval(input),
                None => Ok(ScalarValue::Boolean(true)),
            })
            .collect()
    }
}

impl ExecutableOperator for PhysicalHashAggregate {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let mut table: IndexMap<GroupKey, Group> = IndexMap::new();

        for row in self.input.execute(context)? {
            context.check_canceled()?;
            let row = row?;
            let mut eval = RowEvaluator::new(&row, &[]);

            let key = GroupKey::new(
                self.groups
                    .iter()
                    .map(|expr| eval.eval(expr))
                    .collect::<Result<Vec<_>>>()?,
            );
            let inputs = self.aggregate_inputs(&mut eval)?;

            table
                .entry(key)
                .or_insert_with_key(|key| self.new_group(key.clone()))
                .update(&inputs)?;
        }

        if table.is_empty() && self.groups.is_empty() {
            let key = GroupKey::new(Vec::new());
            table.insert(key.clone(), self.new_group(key));
        }

        trace!(num_groups = table.len(), "aggregated input");

        let (with_nulls, without_nulls): (Vec<_>, Vec<_>) =
            table.into_values().partition(|group| group.key().has_null());

        let rows = without_nulls
            .iter()
            .chain(with_nulls.iter())
            .map(|group| Row::try_from(GroupRow::new(group, &self.layout)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalHashAggregate {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("HashAggregate")
            .with_values("groups", &self.groups)
            .with_values("aggregates", &self.aggregates)
    }
}
