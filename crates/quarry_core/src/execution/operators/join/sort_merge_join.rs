use std::cmp::Ordering;
use std::fmt;

use quarry_error::Result;
use tracing::trace;

use super::JoinLayout;
use crate::coerce::compare::{
    ComparisonCoercion, ComparisonOperator, coerce_to_domain, partial_cmp_values,
};
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream, collect_rows, expand_rows};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::result::row::Row;
use crate::types::scalar::ScalarValue;

/// Single comparison between the two inputs driving a sort-merge join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortMergeCondition {
    /// Evaluated against left rows.
    pub left: PhysicalScalarExpression,
    /// Evaluated against right rows.
    pub right: PhysicalScalarExpression,
    /// Operator with left as the first operand.
    pub op: ComparisonOperator,
    pub coercion: ComparisonCoercion,
}

impl SortMergeCondition {
    fn left_key(&self, row: &Row) -> Result<Option<ScalarValue>> {
        let v = RowEvaluator::eval_single(row, &self.left)?;
        Ok(match self.coercion {
            ComparisonCoercion::CoerceLeft(domain) => coerce_to_domain(&v, domain),
            _ => comparable(v),
        })
    }

    fn right_key(&self, row: &Row) -> Result<Option<ScalarValue>> {
        let v = RowEvaluator::eval_single(row, &self.right)?;
        Ok(match self.coercion {
            ComparisonCoercion::CoerceRight(domain) => coerce_to_domain(&v, domain),
            _ => comparable(v),
        })
    }
}

/// Keys that don't compare with themselves (nulls, NaN) can't match anything.
fn comparable(v: ScalarValue) -> Option<ScalarValue> {
    partial_cmp_values(&v, &v).map(|_| v)
}

impl fmt::Display for SortMergeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(LEFT {}) {} (RIGHT {})", self.left, self.op, self.right)
    }
}

/// Join by sorting both inputs on their keys and merging them.
///
/// Both sides are materialized before any row is produced. Merging yields,
/// for every outer row, the range of build keys equal to its own key, from
/// which the rows matching the operator follow. Produces exactly the rows a
/// hash join over the same inputs produces, in the same order: candidates are
/// put back into input order before the full condition is checked.
#[derive(Debug)]
pub struct PhysicalSortMergeJoin {
    pub(crate) left: PhysicalOperator,
    pub(crate) right: PhysicalOperator,
    pub(crate) layout: JoinLayout,
    pub(crate) condition: PhysicalScalarExpression,
    pub(crate) merge: SortMergeCondition,
}

impl PhysicalSortMergeJoin {
    pub fn new(
        left: PhysicalOperator,
        right: PhysicalOperator,
        layout: JoinLayout,
        condition: PhysicalScalarExpression,
        merge: SortMergeCondition,
    ) -> Self {
        PhysicalSortMergeJoin {
            left,
            right,
            layout,
            condition,
            merge,
        }
    }
}

/// Keys of one input sorted ascending, ties broken by input position. Rows
/// whose key can't match anything are left out.
fn sorted_keys(
    rows: &[Row],
    key_fn: impl Fn(&Row) -> Result<Option<ScalarValue>>,
) -> Result<Vec<(ScalarValue, usize)>> {
    let mut keys = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if let Some(key) = key_fn(row)? {
            keys.push((key, idx));
        }
    }
    keys.sort_by(|(a, a_idx), (b, b_idx)| compare_keys(a, b).then(a_idx.cmp(b_idx)));
    Ok(keys)
}

fn compare_keys(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    partial_cmp_values(a, b).unwrap_or(Ordering::Equal)
}

/// Merge two sorted key lists. For each outer row with a key, returns the
/// range `lo..hi` of build keys equal to it, indexed by outer position.
fn merge_keys(
    outer: &[(ScalarValue, usize)],
    build: &[(ScalarValue, usize)],
    num_outer_rows: usize,
    context: &ExecutionContext,
) -> Result<Vec<Option<(usize, usize)>>> {
    let mut bounds = vec![None; num_outer_rows];
    let (mut lo, mut hi) = (0, 0);

    for (key, outer_idx) in outer {
        context.check_canceled()?;
        while lo < build.len() && compare_keys(&build[lo].0, key) == Ordering::Less {
            lo += 1;
        }
        hi = hi.max(lo);
        while hi < build.len() && compare_keys(&build[hi].0, key) != Ordering::Greater {
            hi += 1;
        }
        bounds[*outer_idx] = Some((lo, hi));
    }

    Ok(bounds)
}

/// Build rows `b` where `outer op b` holds given the outer's equal range, in
/// input order.
fn candidates(build: &[(ScalarValue, usize)], (lo, hi): (usize, usize), op: ComparisonOperator) -> Vec<usize> {
    let n = build.len();
    let ranges = match op {
        ComparisonOperator::Eq => [lo..hi, 0..0],
        ComparisonOperator::NotEq => [0..lo, hi..n],
        ComparisonOperator::Lt => [hi..n, 0..0],
        ComparisonOperator::LtEq => [lo..n, 0..0],
        ComparisonOperator::Gt => [0..lo, 0..0],
        ComparisonOperator::GtEq => [0..hi, 0..0],
    };

    let mut indices: Vec<usize> = ranges
        .into_iter()
        .flat_map(|r| build[r].iter().map(|(_, idx)| *idx))
        .collect();
    indices.sort_unstable();
    indices
}

impl ExecutableOperator for PhysicalSortMergeJoin {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let outer_is_right = self.layout.outer_is_right();

        let left_rows = collect_rows(self.left.as_ref(), context)?;
        let right_rows = collect_rows(self.right.as_ref(), context)?;
        let left_keys = sorted_keys(&left_rows, |row| self.merge.left_key(row))?;
        let right_keys = sorted_keys(&right_rows, |row| self.merge.right_key(row))?;

        let (outer_rows, outer_keys, build_rows, build_keys, op) = if outer_is_right {
            (right_rows, right_keys, left_rows, left_keys, self.merge.op.flip())
        } else {
            (left_rows, left_keys, right_rows, right_keys, self.merge.op)
        };

        let bounds = merge_keys(&outer_keys, &build_keys, outer_rows.len(), context)?;
        trace!(
            num_outer_rows = outer_rows.len(),
            num_build_rows = build_rows.len(),
            "merged sort-merge join inputs"
        );

        let outer: RowStream<'a> = Box::new(outer_rows.into_iter().map(Ok));
        let mut bounds = bounds.into_iter();
        Ok(expand_rows(outer, move |row| {
            context.check_canceled()?;
            let matches = match bounds.next().flatten() {
                Some(range) => candidates(&build_keys, range, op),
                None => Vec::new(),
            };
            let mut out = Vec::new();
            self.layout
                .emit(&row, &build_rows, matches, &self.condition, &mut out)?;
            Ok(out)
        }))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}

impl Explainable for PhysicalSortMergeJoin {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("SortMergeJoin")
            .with_value("join_type", self.layout.join_type)
            .with_value("merge", &self.merge)
            .with_value("condition", &self.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::JoinType;
    use crate::coerce::compare::NumericDomain;
    use crate::execution::operators::join::hash_join::PhysicalHashJoin;
    use crate::execution::operators::values::PhysicalValues;
    use crate::types::datatype::DataType;

    fn side(values: Vec<ScalarValue>) -> PhysicalOperator {
        Box::new(PhysicalValues::new(
            values
                .into_iter()
                .map(|v| Row::try_with_contexts(vec![v], vec![None]).unwrap())
                .collect(),
        ))
    }

    fn layout(join_type: JoinType) -> JoinLayout {
        JoinLayout {
            join_type,
            left_width: 1,
            right_width: 1,
            left_contexts: 1,
        }
    }

    fn comparison(
        op: ComparisonOperator,
        left_type: DataType,
        right_type: DataType,
        coercion: ComparisonCoercion,
    ) -> (PhysicalScalarExpression, SortMergeCondition) {
        let condition = PhysicalScalarExpression::Comparison {
            op,
            left: Box::new(PhysicalScalarExpression::column(0, left_type.clone())),
            right: Box::new(PhysicalScalarExpression::column(1, right_type.clone())),
            coercion,
        };
        let merge = SortMergeCondition {
            left: PhysicalScalarExpression::column(0, left_type),
            right: PhysicalScalarExpression::column(0, right_type),
            op,
            coercion,
        };
        (condition, merge)
    }

    fn run(op: &dyn ExecutableOperator) -> Vec<Vec<ScalarValue>> {
        collect_rows(op, &ExecutionContext::default())
            .unwrap()
            .into_iter()
            .map(|r| r.into_values())
            .collect()
    }

    #[test]
    fn matches_hash_join_for_every_operator() {
        let left = vec![3.into(), ScalarValue::Null, 1.into(), 2.into()];
        let right = vec![2.into(), 1.into(), ScalarValue::Null, 3.into(), 2.into()];

        for op in [
            ComparisonOperator::Eq,
            ComparisonOperator::NotEq,
            ComparisonOperator::Lt,
            ComparisonOperator::LtEq,
            ComparisonOperator::Gt,
            ComparisonOperator::GtEq,
        ] {
            for join_type in [JoinType::Inner, JoinType::Left, JoinType::Right] {
                let (condition, merge) = comparison(
                    op,
                    DataType::Int32,
                    DataType::Int32,
                    ComparisonCoercion::Direct,
                );
                let merge_join = PhysicalSortMergeJoin::new(
                    side(left.clone()),
                    side(right.clone()),
                    layout(join_type),
                    condition.clone(),
                    merge,
                );
                let hash_join = PhysicalHashJoin::new(
                    side(left.clone()),
                    side(right.clone()),
                    layout(join_type),
                    condition,
                    Vec::new(),
                );
                assert_eq!(run(&hash_join), run(&merge_join), "{op} {join_type}");
            }
        }
    }

    #[test]
    fn merge_finds_equal_ranges() {
        let rows = |values: Vec<ScalarValue>| -> Vec<Row> {
            values
                .into_iter()
                .map(|v| Row::try_with_contexts(vec![v], vec![None]).unwrap())
                .collect()
        };
        let key = |row: &Row| Ok(comparable(row.values()[0].clone()));

        let outer = rows(vec![5.into(), 2.into(), ScalarValue::Null, 2.into(), 0.into()]);
        let build = rows(vec![2.into(), 4.into(), 2.into(), 1.into()]);
        let outer_keys = sorted_keys(&outer, key).unwrap();
        let build_keys = sorted_keys(&build, key).unwrap();
        assert_eq!(vec![4, 1, 3, 0], outer_keys.iter().map(|(_, idx)| *idx).collect::<Vec<_>>());

        let bounds = merge_keys(&outer_keys, &build_keys, outer.len(), &ExecutionContext::default()).unwrap();
        assert_eq!(vec![Some((4, 4)), Some((1, 3)), None, Some((1, 3)), Some((0, 0))], bounds);

        assert_eq!(vec![0, 2], candidates(&build_keys, (1, 3), ComparisonOperator::Eq));
        assert_eq!(vec![1], candidates(&build_keys, (1, 3), ComparisonOperator::Lt));
        assert_eq!(vec![1, 3], candidates(&build_keys, (1, 3), ComparisonOperator::NotEq));
    }

    #[test]
    fn coerced_string_keys() {
        let (condition, merge) = comparison(
            ComparisonOperator::Eq,
            DataType::Utf8,
            DataType::Int64,
            ComparisonCoercion::CoerceLeft(NumericDomain::Integer),
        );
        let join = PhysicalSortMergeJoin::new(
            side(vec![" 7".into(), "x".into()]),
            side(vec![7i64.into()]),
            layout(JoinType::Left),
            condition,
            merge,
        );
        assert_eq!(
            vec![
                vec![" 7".into(), 7i64.into()],
                vec!["x".into(), ScalarValue::Null],
            ],
            run(&join)
        );
    }
}
