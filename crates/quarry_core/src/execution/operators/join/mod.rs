//! Inner, left and right joins.
//!
//! Both strategies share the same output rules: rows are emitted in the order
//! of the preserved side (left for inner and left joins, right for right
//! joins), and each preserved row's matches in the order of the other side.
//! Every candidate pair is checked against the full join condition, so the
//! strategies only differ in how candidates are found.

pub mod hash_join;
pub mod sort_merge_join;

use quarry_error::Result;

use crate::ast::JoinType;
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::result::row::Row;

/// Shape of a join's inputs and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLayout {
    pub join_type: JoinType,
    pub left_width: usize,
    pub right_width: usize,
    /// Number of contexts on left rows, used when null padding the left side.
    pub left_contexts: usize,
}

impl JoinLayout {
    /// If the right side drives the output order.
    pub fn outer_is_right(&self) -> bool {
        self.join_type == JoinType::Right
    }

    fn combine(&self, outer: &Row, build: &Row) -> Result<Row> {
        if self.outer_is_right() {
            Row::try_join(build, outer)
        } else {
            Row::try_join(outer, build)
        }
    }

    fn pad(&self, outer: &Row) -> Result<Option<Row>> {
        match self.join_type {
            JoinType::Inner => Ok(None),
            JoinType::Left => Row::try_join(outer, &Row::null_padded(self.right_width, 1)).map(Some),
            JoinType::Right => Row::try_join(
                &Row::null_padded(self.left_width, self.left_contexts),
                outer,
            )
            .map(Some),
        }
    }

    /// Emit the output rows for one outer row given its candidate matches,
    /// which must be in build side order.
    pub(crate) fn emit(
        &self,
        outer: &Row,
        build: &[Row],
        candidates: impl IntoIterator<Item = usize>,
        condition: &PhysicalScalarExpression,
        out: &mut Vec<Row>,
    ) -> Result<()> {
        let mut matched = false;
        for idx in candidates {
            let joined = self.combine(outer, &build[idx])?;
            if RowEvaluator::new(&joined, &[]).eval_predicate(condition)? {
                out.push(joined);
                matched = true;
            }
        }
        if !matched {
            if let Some(padded) = self.pad(outer)? {
                out.push(padded);
            }
        }
        Ok(())
    }
}
