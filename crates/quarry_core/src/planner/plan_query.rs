use quarry_error::Result;
use tracing::debug;

use super::bind_context::BindScope;
use super::expr_binder::ExpressionBinder;
use super::plan_select::SelectPlanner;
use super::plan_setop::SetOpPlanner;
use super::{PlanContext, PlannedCte, PlannedQuery};
use crate::ast::{OrderByExpr, Query, SetExpr};
use crate::execution::operators::limit::PhysicalLimit;
use crate::execution::operators::project::PhysicalProject;
use crate::execution::operators::sort::{PhysicalSort, SortKey};
use crate::expr::PhysicalScalarExpression;
use crate::rewrite::cte::{CteBinding, CteScope, check_cte_names};

#[derive(Debug)]
pub struct QueryPlanner;

impl QueryPlanner {
    /// Plan a query with its CTEs, ORDER BY, SKIP and TAKE.
    ///
    /// `outer` holds the CTEs visible from enclosing queries. CTEs declared
    /// here are compiled in order, each seeing only the ones before it.
    pub fn plan(&self, ctx: &mut PlanContext, query: &Query, outer: &CteScope) -> Result<PlannedQuery> {
        check_cte_names(&query.ctes)?;

        let mut ctes = outer.clone();
        for cte in &query.ctes {
            let planned = self.plan(ctx, &cte.query, &ctes)?;
            let columns = planned.columns.clone();
            let slot = ctx.push_cte(PlannedCte {
                name: cte.name.clone(),
                columns: planned.columns,
                root: planned.root,
            });
            debug!(cte = %cte.name, slot, "planned CTE");
            ctes.push(CteBinding {
                name: cte.name.clone(),
                slot,
                columns,
            });
        }

        let mut planned = match &query.body {
            SetExpr::Select(select) => SelectPlanner.plan(ctx, select, &query.order_by, &ctes)?,
            body => {
                let planned = SetOpPlanner.plan_set_expr(ctx, body, &ctes)?;
                self.plan_output_order(planned, &query.order_by)?
            }
        };

        if query.skip.is_some() || query.take.is_some() {
            let skip = query.skip.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
            let take = query.take.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
            planned.root = Box::new(PhysicalLimit::new(planned.root, skip, take));
        }

        Ok(planned)
    }

    /// Sort the output of a set operation or nested query.
    ///
    /// Keys bind against the output columns. Computed keys are appended as
    /// hidden values and dropped by the sort.
    fn plan_output_order(&self, planned: PlannedQuery, order_by: &[OrderByExpr]) -> Result<PlannedQuery> {
        if order_by.is_empty() {
            return Ok(planned);
        }

        let mut scope = BindScope::new();
        scope.push_alias(
            None,
            planned
                .columns
                .iter()
                .map(|c| (c.name.as_str(), c.datatype.clone(), c.nullable)),
        );

        let width = planned.columns.len();
        let mut keys = Vec::with_capacity(order_by.len());
        let mut hidden = Vec::new();
        for o in order_by {
            let column = match ExpressionBinder::new(&scope, "ORDER BY").bind(&o.expr)? {
                PhysicalScalarExpression::Column { idx, .. } => idx,
                expr => {
                    hidden.push(expr);
                    width + hidden.len() - 1
                }
            };
            keys.push(SortKey { column, asc: o.asc });
        }

        let mut root = planned.root;
        if !hidden.is_empty() {
            let projections = planned
                .columns
                .iter()
                .enumerate()
                .map(|(idx, c)| PhysicalScalarExpression::column(idx, c.datatype.clone()))
                .chain(hidden)
                .collect();
            root = Box::new(PhysicalProject::new(root, projections));
        }

        Ok(PlannedQuery {
            root: Box::new(PhysicalSort::new(root, keys, width)),
            columns: planned.columns,
        })
    }
}
