//! Decomposition of WHERE into per-source filters.
//!
//! Each AND conjunct is classified by the aliases it references:
//!
//! - Conjuncts over a single alias are evaluated right after that alias'
//!   records are fetched (a pre-filter), and are offered to the source as a
//!   scan hint when the source is a method.
//! - Everything else is evaluated once every alias it references has been
//!   combined (a post-filter), or after the entire FROM clause (residual).
//!
//! A conjunct is never evaluated before a step that may null-pad one of its
//! aliases.

use std::collections::BTreeSet;

use tracing::debug;

use super::apply::FromStep;
use super::split::{conjoin, split_conjunction, tautology};
use crate::ast::{ColumnRef, Expr};

/// What pushdown needs to know about a flattened FROM step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushdownStep {
    pub alias: String,
    /// Names of the columns the step binds.
    pub columns: Vec<String>,
    pub null_supplying: bool,
    pub right_join: bool,
    /// If the step scans a table method, and so can receive hints.
    pub method: bool,
}

impl PushdownStep {
    pub fn new(step: &FromStep, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        PushdownStep {
            alias: step.alias().to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            null_supplying: step.is_null_supplying(),
            right_join: step.is_right_join(),
            method: step.is_method(),
        }
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Where a single conjunct gets evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// On the records of one step, before they're combined with anything.
    Pre(usize),
    /// On combined rows, right after the step at this index.
    Post(usize),
    /// After the whole FROM clause.
    Residual,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PushdownPlan {
    pub pre_filters: Vec<Vec<Expr>>,
    pub post_filters: Vec<Vec<Expr>>,
    pub residual: Vec<Expr>,
    /// Scan hint filter per step. Only set for method steps.
    pub hints: Vec<Option<Expr>>,
}

impl PushdownPlan {
    fn empty(num_steps: usize) -> Self {
        PushdownPlan {
            pre_filters: vec![Vec::new(); num_steps],
            post_filters: vec![Vec::new(); num_steps],
            residual: Vec::new(),
            hints: vec![None; num_steps],
        }
    }
}

/// Split `filter` and place each conjunct.
///
/// With pushdown disabled every conjunct is residual and no hints are
/// produced.
pub fn plan_pushdown(filter: Option<&Expr>, steps: &[PushdownStep], enabled: bool) -> PushdownPlan {
    let mut plan = PushdownPlan::empty(steps.len());

    let filter = match filter {
        Some(filter) => filter.clone(),
        None => return plan,
    };

    let mut conjuncts = Vec::new();
    split_conjunction(filter, &mut conjuncts);

    if !enabled {
        plan.residual = conjuncts;
        return plan;
    }

    let placements: Vec<_> = conjuncts
        .iter()
        .map(|c| {
            let placement = place_conjunct(c, steps);
            debug!(conjunct = %c, ?placement, "placed filter conjunct");
            placement
        })
        .collect();

    for (step_idx, step) in steps.iter().enumerate() {
        if !step.method {
            continue;
        }
        let hinted = conjuncts.iter().zip(&placements).map(|(c, p)| {
            if *p == Placement::Pre(step_idx) && is_source_evaluable(c) {
                c.clone()
            } else {
                tautology()
            }
        });
        plan.hints[step_idx] = conjoin(hinted);
    }

    for (conjunct, placement) in conjuncts.into_iter().zip(placements) {
        match placement {
            Placement::Pre(idx) => plan.pre_filters[idx].push(conjunct),
            Placement::Post(idx) => plan.post_filters[idx].push(conjunct),
            Placement::Residual => plan.residual.push(conjunct),
        }
    }

    plan
}

/// Decide where a conjunct can be evaluated.
pub fn place_conjunct(conjunct: &Expr, steps: &[PushdownStep]) -> Placement {
    let aliases = match referenced_steps(conjunct, steps) {
        Some(aliases) if !aliases.is_empty() => aliases,
        _ => return Placement::Residual,
    };

    // Non-empty, checked above.
    let (min, max) = match (aliases.first(), aliases.last()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => return Placement::Residual,
    };

    let later_right_join = steps
        .iter()
        .enumerate()
        .skip(min + 1)
        .filter(|(_, s)| s.right_join)
        .map(|(idx, _)| idx)
        .last();

    if min == max && !steps[min].null_supplying && later_right_join.is_none() {
        return Placement::Pre(min);
    }

    let idx = later_right_join.map_or(max, |j| j.max(max));
    if idx + 1 >= steps.len() {
        Placement::Residual
    } else {
        Placement::Post(idx)
    }
}

/// Indices of the steps a conjunct references, sorted.
///
/// Returns `None` if some column can't be attributed to exactly one step.
/// Binding reports the actual error later.
fn referenced_steps(expr: &Expr, steps: &[PushdownStep]) -> Option<Vec<usize>> {
    let mut found = BTreeSet::new();
    let mut resolved = true;

    expr.walk(&mut |e| {
        if let Expr::Column(col) = e {
            match resolve_column(col, steps) {
                Some(idx) => {
                    found.insert(idx);
                }
                None => resolved = false,
            }
        }
    });

    if resolved {
        Some(found.into_iter().collect())
    } else {
        None
    }
}

fn resolve_column(col: &ColumnRef, steps: &[PushdownStep]) -> Option<usize> {
    if let Some(qualifier) = &col.qualifier {
        if let Some(idx) = steps
            .iter()
            .position(|s| s.alias.eq_ignore_ascii_case(qualifier))
        {
            return Some(idx);
        }
        // Not an alias, so the qualifier is itself a column with `name` a
        // property on it.
        return resolve_unqualified(qualifier, steps);
    }
    resolve_unqualified(&col.name, steps)
}

fn resolve_unqualified(name: &str, steps: &[PushdownStep]) -> Option<usize> {
    let mut matches = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_column(name))
        .map(|(idx, _)| idx);
    match (matches.next(), matches.next()) {
        (Some(idx), None) => Some(idx),
        _ => None,
    }
}

/// If a source can be expected to evaluate this conjunct itself.
///
/// Pattern matching and `contains` over anything but literals are left to the
/// engine.
pub fn is_source_evaluable(expr: &Expr) -> bool {
    let mut evaluable = true;
    expr.walk(&mut |e| match e {
        Expr::Binary { op, .. } if op.is_pattern() => evaluable = false,
        Expr::Contains { expr, items } => {
            let all_literal = matches!(expr.as_ref(), Expr::Literal(_) | Expr::Column(_))
                && items.iter().all(|i| matches!(i, Expr::Literal(_)));
            if !all_literal {
                evaluable = false;
            }
        }
        _ => (),
    });
    evaluable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;

    fn step(alias: &str, columns: &[&str]) -> PushdownStep {
        PushdownStep {
            alias: alias.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            null_supplying: false,
            right_join: false,
            method: true,
        }
    }

    fn two_steps() -> Vec<PushdownStep> {
        vec![step("c", &["Id", "Name"]), step("o", &["OrderId", "CustomerId"])]
    }

    #[test]
    fn single_alias_is_pushed() {
        let filter = col("c.Name").equals(string("Alice"));
        let plan = plan_pushdown(Some(&filter), &two_steps(), true);

        assert_eq!(vec![filter.clone()], plan.pre_filters[0]);
        assert!(plan.residual.is_empty());
        assert_eq!(Some(filter), plan.hints[0]);
        assert_eq!(Some(tautology()), plan.hints[1]);
    }

    #[test]
    fn multi_alias_becomes_tautology_in_hints() {
        let single = col("o.OrderId").gt(int(10));
        let multi = col("c.Id").equals(col("o.CustomerId"));
        let filter = single.clone().and(multi.clone());
        let plan = plan_pushdown(Some(&filter), &two_steps(), true);

        assert_eq!(vec![single.clone()], plan.pre_filters[1]);
        // Last step, so after everything.
        assert_eq!(vec![multi], plan.residual);
        assert_eq!(Some(tautology().and(tautology())), plan.hints[0]);
        assert_eq!(Some(single.and(tautology())), plan.hints[1]);
    }

    #[test]
    fn unqualified_columns_resolve_by_name() {
        let filter = col("Name").equals(string("Bob"));
        assert_eq!(Placement::Pre(0), place_conjunct(&filter, &two_steps()));

        // Unknown column, left for binding to report.
        let filter = col("Nope").equals(int(1));
        assert_eq!(Placement::Residual, place_conjunct(&filter, &two_steps()));
    }

    #[test]
    fn pattern_not_offered_to_source() {
        let filter = col("c.Name").like(string("A%"));
        let plan = plan_pushdown(Some(&filter), &two_steps(), true);

        // Still filtered by the engine right after fetch.
        assert_eq!(vec![filter], plan.pre_filters[0]);
        assert_eq!(Some(tautology()), plan.hints[0]);
    }

    #[test]
    fn contains_literals_pushed_verbatim() {
        let literal = col("c.Name").contains([string("li"), string("ob")]);
        assert!(is_source_evaluable(&literal));

        let dynamic = col("c.Name").contains([col("c.Id")]);
        assert!(!is_source_evaluable(&dynamic));
    }

    #[test]
    fn null_supplying_side_not_prefiltered() {
        let mut steps = two_steps();
        steps[1].null_supplying = true;
        steps.push(step("x", &["Value"]));

        let filter = col("o.OrderId").is_null();
        assert_eq!(Placement::Post(1), place_conjunct(&filter, &steps));
    }

    #[test]
    fn later_right_join_delays_filter() {
        let mut steps = vec![
            step("a", &["A"]),
            step("b", &["B"]),
            step("c", &["C"]),
            step("d", &["D"]),
        ];
        steps[2].right_join = true;

        assert_eq!(Placement::Post(2), place_conjunct(&col("a.A").gt(int(1)), &steps));
        // After the right join, pre-filtering is fine again.
        assert_eq!(Placement::Pre(3), place_conjunct(&col("d.D").gt(int(1)), &steps));
        // The right join's own side isn't null-extended by it.
        assert_eq!(Placement::Pre(2), place_conjunct(&col("c.C").gt(int(1)), &steps));
    }

    #[test]
    fn disabled_keeps_everything_residual() {
        let filter = col("c.Name").equals(string("Alice"));
        let plan = plan_pushdown(Some(&filter), &two_steps(), false);
        assert_eq!(vec![filter], plan.residual);
        assert!(plan.hints.iter().all(|h| h.is_none()));
    }

    #[test]
    fn constant_conjunct_is_residual() {
        assert_eq!(
            Placement::Residual,
            place_conjunct(&int(1).equals(int(1)), &two_steps())
        );
    }
}
