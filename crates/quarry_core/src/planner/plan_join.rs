use tracing::debug;

use crate::coerce::compare::ComparisonCoercion;
use crate::coerce::compare::ComparisonOperator;
use crate::config::CompileOptions;
use crate::execution::PhysicalOperator;
use crate::execution::operators::join::JoinLayout;
use crate::execution::operators::join::hash_join::{HashJoinCondition, PhysicalHashJoin};
use crate::execution::operators::join::sort_merge_join::{PhysicalSortMergeJoin, SortMergeCondition};
use crate::expr::{ConjunctionOperator, PhysicalScalarExpression};
use crate::types::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Which input an expression over the combined row reads from. `None` if it
/// reads from both or neither.
fn side(expr: &PhysicalScalarExpression, left_width: usize) -> Option<Side> {
    let (min, max) = expr.column_range()?;
    if max < left_width {
        Some(Side::Left)
    } else if min >= left_width {
        Some(Side::Right)
    } else {
        None
    }
}

/// Rebase an expression over the combined row onto right rows.
fn rebase_right(mut expr: PhysicalScalarExpression, left_width: usize) -> PhysicalScalarExpression {
    expr.remap_columns(&|idx| idx - left_width);
    expr
}

/// If values of this type can be used directly as hash keys, with equal
/// values hashing equally.
fn is_hashable(datatype: &DataType) -> bool {
    !matches!(
        datatype,
        DataType::Any
            | DataType::Null
            | DataType::List(_)
            | DataType::Struct(_)
            | DataType::Float32
            | DataType::Float64
    )
}

fn split_and<'a>(expr: &'a PhysicalScalarExpression, out: &mut Vec<&'a PhysicalScalarExpression>) {
    match expr {
        PhysicalScalarExpression::Conjunction {
            op: ConjunctionOperator::And,
            left,
            right,
        } => {
            split_and(left, out);
            split_and(right, out);
        }
        other => out.push(other),
    }
}

/// Equality conjuncts of the condition usable as hash keys.
pub fn extract_equalities(condition: &PhysicalScalarExpression, left_width: usize) -> Vec<HashJoinCondition> {
    let mut conjuncts = Vec::new();
    split_and(condition, &mut conjuncts);

    conjuncts
        .into_iter()
        .filter_map(|conjunct| match conjunct {
            PhysicalScalarExpression::Comparison {
                op: ComparisonOperator::Eq,
                left,
                right,
                coercion: ComparisonCoercion::Direct,
            } => {
                let (l, r) = match (side(left, left_width)?, side(right, left_width)?) {
                    (Side::Left, Side::Right) => (left.as_ref(), right.as_ref()),
                    (Side::Right, Side::Left) => (right.as_ref(), left.as_ref()),
                    _ => return None,
                };
                let (lt, rt) = (l.datatype(), r.datatype());
                if lt != rt || !is_hashable(&lt) {
                    return None;
                }
                Some(HashJoinCondition {
                    left: l.clone(),
                    right: rebase_right(r.clone(), left_width),
                })
            }
            _ => None,
        })
        .collect()
}

/// The single comparison a sort-merge join can drive on, if the condition is
/// one.
pub fn sort_merge_condition(condition: &PhysicalScalarExpression, left_width: usize) -> Option<SortMergeCondition> {
    let PhysicalScalarExpression::Comparison {
        op,
        left,
        right,
        coercion,
    } = condition
    else {
        return None;
    };

    let (l, r, op, coercion) = match (side(left, left_width)?, side(right, left_width)?) {
        (Side::Left, Side::Right) => (left.as_ref(), right.as_ref(), *op, *coercion),
        (Side::Right, Side::Left) => {
            let coercion = match coercion {
                ComparisonCoercion::Direct => ComparisonCoercion::Direct,
                ComparisonCoercion::CoerceLeft(d) => ComparisonCoercion::CoerceRight(*d),
                ComparisonCoercion::CoerceRight(d) => ComparisonCoercion::CoerceLeft(*d),
            };
            (right.as_ref(), left.as_ref(), op.flip(), coercion)
        }
        _ => return None,
    };

    // Keys must sort in a single domain.
    if coercion == ComparisonCoercion::Direct {
        let (lt, rt) = (l.datatype(), r.datatype());
        let same_domain = (lt.is_numeric() && rt.is_numeric())
            || (lt.is_utf8() && rt.is_utf8())
            || (lt == DataType::Boolean && rt == DataType::Boolean);
        if !same_domain {
            return None;
        }
    }

    Some(SortMergeCondition {
        left: l.clone(),
        right: rebase_right(r.clone(), left_width),
        op,
        coercion,
    })
}

/// Pick a join strategy and build the operator.
///
/// Sort-merge is used when requested and the condition is a single
/// comparison between the two sides, the hash join otherwise.
pub fn plan_join(
    options: &CompileOptions,
    left: PhysicalOperator,
    right: PhysicalOperator,
    layout: JoinLayout,
    condition: PhysicalScalarExpression,
) -> PhysicalOperator {
    if options.use_sort_merge_join {
        match sort_merge_condition(&condition, layout.left_width) {
            Some(merge) => {
                debug!(%condition, "using sort-merge join");
                return Box::new(PhysicalSortMergeJoin::new(left, right, layout, condition, merge));
            }
            None => debug!(%condition, "condition not supported by sort-merge join, using hash join"),
        }
    }

    let equalities = extract_equalities(&condition, layout.left_width);
    debug!(%condition, num_equalities = equalities.len(), "using hash join");
    Box::new(PhysicalHashJoin::new(left, right, layout, condition, equalities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::compare::NumericDomain;

    fn col(idx: usize, datatype: DataType) -> Box<PhysicalScalarExpression> {
        Box::new(PhysicalScalarExpression::column(idx, datatype))
    }

    fn cmp(
        op: ComparisonOperator,
        left: Box<PhysicalScalarExpression>,
        right: Box<PhysicalScalarExpression>,
        coercion: ComparisonCoercion,
    ) -> PhysicalScalarExpression {
        PhysicalScalarExpression::Comparison {
            op,
            left,
            right,
            coercion,
        }
    }

    #[test]
    fn equalities_from_and_tree() {
        let cond = PhysicalScalarExpression::Conjunction {
            op: ConjunctionOperator::And,
            left: Box::new(cmp(
                ComparisonOperator::Eq,
                col(2, DataType::Int32),
                col(0, DataType::Int32),
                ComparisonCoercion::Direct,
            )),
            right: Box::new(cmp(
                ComparisonOperator::Gt,
                col(1, DataType::Int32),
                col(3, DataType::Int32),
                ComparisonCoercion::Direct,
            )),
        };
        let eqs = extract_equalities(&cond, 2);
        assert_eq!(1, eqs.len());
        assert_eq!(PhysicalScalarExpression::column(0, DataType::Int32), eqs[0].left);
        assert_eq!(PhysicalScalarExpression::column(0, DataType::Int32), eqs[0].right);
    }

    #[test]
    fn no_equalities_under_or_or_mixed_types() {
        let cond = cmp(
            ComparisonOperator::Eq,
            col(0, DataType::Int32),
            col(1, DataType::Int64),
            ComparisonCoercion::Direct,
        );
        assert!(extract_equalities(&cond, 1).is_empty());
    }

    #[test]
    fn sort_merge_flips_reversed_sides() {
        let cond = cmp(
            ComparisonOperator::Lt,
            col(1, DataType::Utf8),
            col(0, DataType::Int32),
            ComparisonCoercion::CoerceLeft(NumericDomain::Integer),
        );
        let merge = sort_merge_condition(&cond, 1).unwrap();
        assert_eq!(ComparisonOperator::Gt, merge.op);
        assert_eq!(ComparisonCoercion::CoerceRight(NumericDomain::Integer), merge.coercion);
        assert_eq!(PhysicalScalarExpression::column(0, DataType::Utf8), merge.right);
    }

    #[test]
    fn sort_merge_rejects_compound() {
        let cond = PhysicalScalarExpression::Conjunction {
            op: ConjunctionOperator::Or,
            left: Box::new(cmp(
                ComparisonOperator::Eq,
                col(0, DataType::Int32),
                col(1, DataType::Int32),
                ComparisonCoercion::Direct,
            )),
            right: Box::new(cmp(
                ComparisonOperator::Eq,
                col(0, DataType::Int32),
                col(1, DataType::Int32),
                ComparisonCoercion::Direct,
            )),
        };
        assert!(sort_merge_condition(&cond, 1).is_none());
    }
}
