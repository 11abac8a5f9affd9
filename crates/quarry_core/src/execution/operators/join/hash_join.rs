use std::fmt;

use quarry_error::Result;

use super::JoinLayout;
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream, collect_rows, expand_rows};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::result::row::Row;
use crate::types::scalar::ScalarValue;
use crate::util::hash::{HashMap, RANDOM_STATE};

/// An equality between an expression on the left input and one on the right
/// input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashJoinCondition {
    /// Evaluated against left rows.
    pub left: PhysicalScalarExpression,
    /// Evaluated against right rows.
    pub right: PhysicalScalarExpression,
}

impl fmt::Display for HashJoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(LEFT {}) = (RIGHT {})", self.left, self.right)
    }
}

/// Default join strategy.
///
/// Materializes the non-preserved side into a hash table keyed on the
/// equality conditions and streams the preserved side through it. Without
/// any equality conditions every build row is a candidate.
#[derive(Debug)]
pub struct PhysicalHashJoin {
    pub(crate) left: PhysicalOperator,
    pub(crate) right: PhysicalOperator,
    pub(crate) layout: JoinLayout,
    /// Full join condition over the combined row.
    pub(crate) condition: PhysicalScalarExpression,
    pub(crate) equalities: Vec<HashJoinCondition>,
}

impl PhysicalHashJoin {
    pub fn new(
        left: PhysicalOperator,
        right: PhysicalOperator,
        layout: JoinLayout,
        condition: PhysicalScalarExpression,
        equalities: Vec<HashJoinCondition>,
    ) -> Self {
        PhysicalHashJoin {
            left,
            right,
            layout,
            condition,
            equalities,
        }
    }

    fn build_keys(&self) -> Vec<&PhysicalScalarExpression> {
        if self.layout.outer_is_right() {
            self.equalities.iter().map(|c| &c.left).collect()
        } else {
            self.equalities.iter().map(|c| &c.right).collect()
        }
    }

    fn outer_keys(&self) -> Vec<&PhysicalScalarExpression> {
        if self.layout.outer_is_right() {
            self.equalities.iter().map(|c| &c.right).collect()
        } else {
            self.equalities.iter().map(|c| &c.left).collect()
        }
    }
}

/// Evaluate key expressions. Returns `None` if any part is null, nulls never
/// join.
fn eval_key(row: &Row, exprs: &[&PhysicalScalarExpression]) -> Result<Option<Vec<ScalarValue>>> {
    let mut eval = RowEvaluator::new(row, &[]);
    let mut key = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let v = eval.eval(expr)?;
        if v.is_null() {
            return Ok(None);
        }
        key.push(v);
    }
    Ok(Some(key))
}

#[derive(Debug)]
struct JoinHashTable {
    rows: Vec<Row>,
    /// Row indices per key, in insertion order. Not set when joining without
    /// equalities.
    index: Option<HashMap<Vec<ScalarValue>, Vec<usize>>>,
}

impl JoinHashTable {
    fn build(rows: Vec<Row>, keys: &[&PhysicalScalarExpression]) -> Result<Self> {
        if keys.is_empty() {
            return Ok(JoinHashTable { rows, index: None });
        }

        let mut index: HashMap<Vec<ScalarValue>, Vec<usize>> = HashMap::with_hasher(RANDOM_STATE);
        for (idx, row) in rows.iter().enumerate() {
            if let Some(key) = eval_key(row, keys)? {
                index.entry(key).or_default().push(idx);
            }
        }

        Ok(JoinHashTable {
            rows,
            index: Some(index),
        })
    }

    fn candidates(&self, outer: &Row, keys: &[&PhysicalScalarExpression]) -> Result<Vec<usize>> {
        match &self.index {
            None => Ok((0..self.rows.len()).collect()),
            Some(index) => match eval_key(outer, keys)? {
                Some(key) => Ok(index.get(&key).cloned().unwrap_or_default()),
                None => Ok(Vec::new()),
            },
        }
    }
}

impl ExecutableOperator for PhysicalHashJoin {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let (build, outer) = if self.layout.outer_is_right() {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        let build_rows = collect_rows(build.as_ref(), context)?;
        let table = JoinHashTable::build(build_rows, &self.build_keys())?;
        let outer_keys = self.outer_keys();

        let outer = outer.execute(context)?;
        Ok(expand_rows(outer, move |row| {
            context.check_canceled()?;
            let candidates = table.candidates(&row, &outer_keys)?;
            let mut out = Vec::new();
            self.layout
                .emit(&row, &table.rows, candidates, &self.condition, &mut out)?;
            Ok(out)
        }))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}

impl Explainable for PhysicalHashJoin {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("HashJoin")
            .with_value("join_type", self.layout.join_type)
            .with_value("condition", &self.condition)
            .with_values("equalities", &self.equalities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::JoinType;
    use crate::coerce::compare::{ComparisonCoercion, ComparisonOperator};
    use crate::execution::operators::values::PhysicalValues;
    use crate::types::datatype::DataType;

    fn side(values: &[Option<i32>]) -> PhysicalOperator {
        Box::new(PhysicalValues::new(
            values
                .iter()
                .map(|v| Row::try_with_contexts(vec![(*v).into()], vec![None]).unwrap())
                .collect(),
        ))
    }

    fn eq_condition() -> PhysicalScalarExpression {
        PhysicalScalarExpression::Comparison {
            op: ComparisonOperator::Eq,
            left: Box::new(PhysicalScalarExpression::column(0, DataType::Int32)),
            right: Box::new(PhysicalScalarExpression::column(1, DataType::Int32)),
            coercion: ComparisonCoercion::Direct,
        }
    }

    fn join(join_type: JoinType, left: &[Option<i32>], right: &[Option<i32>]) -> Vec<Vec<ScalarValue>> {
        let op = PhysicalHashJoin::new(
            side(left),
            side(right),
            JoinLayout {
                join_type,
                left_width: 1,
                right_width: 1,
                left_contexts: 1,
            },
            eq_condition(),
            vec![HashJoinCondition {
                left: PhysicalScalarExpression::column(0, DataType::Int32),
                right: PhysicalScalarExpression::column(0, DataType::Int32),
            }],
        );
        collect_rows(&op, &ExecutionContext::default())
            .unwrap()
            .into_iter()
            .map(|r| r.into_values())
            .collect()
    }

    #[test]
    fn inner_in_outer_then_build_order() {
        let rows = join(JoinType::Inner, &[Some(2), Some(1)], &[Some(1), Some(2), Some(1)]);
        assert_eq!(
            vec![
                vec![ScalarValue::from(2), 2.into()],
                vec![1.into(), 1.into()],
                vec![1.into(), 1.into()],
            ],
            rows
        );
    }

    #[test]
    fn left_pads_unmatched_and_nulls_never_match() {
        let rows = join(JoinType::Left, &[None, Some(3)], &[None, Some(3)]);
        assert_eq!(
            vec![
                vec![ScalarValue::Null, ScalarValue::Null],
                vec![3.into(), 3.into()],
            ],
            rows
        );
    }

    #[test]
    fn right_mirrors_left() {
        let rows = join(JoinType::Right, &[Some(1)], &[Some(5), Some(1)]);
        assert_eq!(
            vec![
                vec![ScalarValue::Null, 5.into()],
                vec![1.into(), 1.into()],
            ],
            rows
        );
    }
}
