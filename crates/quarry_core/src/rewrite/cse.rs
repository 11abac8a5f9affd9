//! Common sub-expression extraction.
//!
//! Expressions evaluated against the same row (a filter, the projections and
//! any hidden sort keys) are scanned for structurally identical deterministic
//! sub-expressions. Each one occurring at least twice is moved into a shared
//! slot and every occurrence is replaced with a reference to that slot. Slots
//! are computed lazily by the row evaluator, so an occurrence in an untaken
//! CASE branch or a short-circuited conjunction is never forced.

use indexmap::IndexMap;
use tracing::debug;

use crate::expr::PhysicalScalarExpression;

/// Extract repeated sub-expressions out of `exprs`, returning the shared slot
/// expressions.
///
/// Inner expressions are extracted before the expressions containing them, so
/// a slot may reference slots with lower indices.
pub fn extract_common_subexpressions(
    exprs: &mut [PhysicalScalarExpression],
) -> Vec<PhysicalScalarExpression> {
    let mut shared = Vec::new();

    while let Some(candidate) = next_candidate(exprs) {
        let slot = shared.len();
        let replacement = PhysicalScalarExpression::Shared {
            slot,
            datatype: candidate.datatype(),
        };
        for expr in exprs.iter_mut() {
            replace_all(expr, &candidate, &replacement);
        }
        shared.push(candidate);
    }

    if !shared.is_empty() {
        debug!(slots = shared.len(), "extracted common sub-expressions");
    }

    shared
}

/// Find the innermost sub-expression occurring more than once.
fn next_candidate(exprs: &[PhysicalScalarExpression]) -> Option<PhysicalScalarExpression> {
    let mut counts: IndexMap<&PhysicalScalarExpression, usize> = IndexMap::new();
    for expr in exprs {
        count_subexpressions(expr, &mut counts);
    }

    counts
        .into_iter()
        .find(|(_, count)| *count > 1)
        .map(|(expr, _)| expr.clone())
}

/// Count candidate sub-expressions, children before parents.
fn count_subexpressions<'a>(
    expr: &'a PhysicalScalarExpression,
    counts: &mut IndexMap<&'a PhysicalScalarExpression, usize>,
) {
    for child in expr.children() {
        count_subexpressions(child, counts);
    }
    if is_candidate(expr) {
        *counts.entry(expr).or_insert(0) += 1;
    }
}

fn is_candidate(expr: &PhysicalScalarExpression) -> bool {
    !matches!(
        expr,
        PhysicalScalarExpression::Column { .. }
            | PhysicalScalarExpression::Literal { .. }
            | PhysicalScalarExpression::Shared { .. }
    ) && expr.is_deterministic()
}

fn replace_all(
    expr: &mut PhysicalScalarExpression,
    target: &PhysicalScalarExpression,
    replacement: &PhysicalScalarExpression,
) {
    if expr == target {
        *expr = replacement.clone();
        return;
    }
    for child in expr.children_mut() {
        replace_all(child, target, replacement);
    }
}
