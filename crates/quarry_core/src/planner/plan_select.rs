use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::bind_context::BindScope;
use super::expr_binder::{ExpressionBinder, Grouping};
use super::plan_from::FromPlanner;
use super::plan_pivot::PivotPlanner;
use super::{PlanContext, PlannedQuery};
use crate::ast::{ColumnRef, Expr, OrderByExpr, Select, SelectItem};
use crate::execution::PhysicalOperator;
use crate::execution::operators::distinct::PhysicalDistinct;
use crate::execution::operators::filter::PhysicalFilter;
use crate::execution::operators::hash_aggregate::{PhysicalAggregateExpression, PhysicalHashAggregate};
use crate::execution::operators::project::PhysicalProject;
use crate::execution::operators::sort::{PhysicalSort, SortKey};
use crate::execution::operators::values::PhysicalValues;
use crate::expr::PhysicalScalarExpression;
use crate::functions::aggregate::is_aggregate_function;
use crate::result::table::Column;
use crate::rewrite::apply::flatten_from;
use crate::rewrite::cse::extract_common_subexpressions;
use crate::rewrite::cte::CteScope;
use crate::rewrite::split::conjoin;

/// A select item after wildcard expansion.
#[derive(Debug)]
struct SelectColumn {
    expr: Expr,
    name: String,
}

#[derive(Debug)]
enum OrderTarget {
    /// Sort on an output column.
    Visible(usize),
    /// Sort on a value computed alongside the output and dropped after
    /// sorting.
    Hidden(PhysicalScalarExpression),
}

/// Group and aggregate expressions of a hash aggregate.
type AggregateParts = (Vec<PhysicalScalarExpression>, Vec<PhysicalAggregateExpression>);

/// Bound expressions of a select, before common sub-expression extraction.
#[derive(Debug)]
struct BoundSelect {
    filter: Option<PhysicalScalarExpression>,
    projections: Vec<PhysicalScalarExpression>,
    order: Vec<(OrderTarget, bool)>,
    /// Nullability of each column of the rows the projections read.
    input_nullable: Vec<bool>,
}

#[derive(Debug)]
pub struct SelectPlanner;

impl SelectPlanner {
    /// Plan a select along with the ORDER BY of the query it's the body of.
    pub fn plan(
        &self,
        ctx: &mut PlanContext,
        select: &Select,
        order_by: &[OrderByExpr],
        ctes: &CteScope,
    ) -> Result<PlannedQuery> {
        let (mut root, scope, residual) = self.plan_from(ctx, select, ctes)?;
        let items = expand_projections(&select.projections, &scope)?;

        let is_grouped = !select.group_by.is_empty()
            || select.having.is_some()
            || items.iter().any(|item| contains_aggregate(&item.expr))
            || order_by.iter().any(|o| contains_aggregate(&o.expr));

        let bound = if is_grouped {
            if let Some(expr) = conjoin(residual) {
                let predicate = ExpressionBinder::new(&scope, "WHERE").bind_predicate(&expr)?;
                root = Box::new(PhysicalFilter::new(root, predicate));
            }
            let (aggregate, bound) = self.bind_grouped(select, &items, order_by, &scope)?;
            root = Box::new(PhysicalHashAggregate::new(root, aggregate.0, aggregate.1));
            bound
        } else {
            self.bind_ungrouped(&items, order_by, residual, &scope)?
        };

        let BoundSelect {
            filter,
            projections,
            order,
            input_nullable,
        } = bound;

        let columns: Vec<Column> = items
            .iter()
            .zip(&projections)
            .enumerate()
            .map(|(ordinal, (item, expr))| {
                Column::new(&item.name, expr.datatype(), is_nullable(expr, &input_nullable), ordinal)
            })
            .collect();
        let num_visible = projections.len();

        let mut sort_keys = Vec::with_capacity(order.len());
        let mut hidden = Vec::new();
        for (target, asc) in order {
            let column = match target {
                OrderTarget::Visible(idx) => idx,
                OrderTarget::Hidden(expr) => {
                    hidden.push(expr);
                    num_visible + hidden.len() - 1
                }
            };
            sort_keys.push(SortKey { column, asc });
        }

        let has_filter = filter.is_some();
        let mut exprs: Vec<PhysicalScalarExpression> = filter.into_iter().collect();
        exprs.extend(projections);
        exprs.extend(hidden);
        let shared = if ctx.options.enable_cse {
            extract_common_subexpressions(&mut exprs)
        } else {
            Vec::new()
        };
        let filter = if has_filter { Some(exprs.remove(0)) } else { None };

        root = Box::new(
            PhysicalProject::new(root, exprs)
                .with_filter(filter)
                .with_shared(shared),
        );
        if select.distinct {
            root = Box::new(PhysicalDistinct::new(root, num_visible));
        }
        if !sort_keys.is_empty() {
            root = Box::new(PhysicalSort::new(root, sort_keys, num_visible));
        }

        debug!(num_columns = columns.len(), grouped = is_grouped, "planned select");
        Ok(PlannedQuery { root, columns })
    }

    fn plan_from(
        &self,
        ctx: &mut PlanContext,
        select: &Select,
        ctes: &CteScope,
    ) -> Result<(PhysicalOperator, BindScope, Vec<Expr>)> {
        let Some(from) = &select.from else {
            let root: PhysicalOperator = Box::new(PhysicalValues::single_empty_row());
            return Ok((root, BindScope::new(), select.filter.iter().cloned().collect()));
        };

        let cte_names: Vec<&str> = ctes.names().collect();
        let flattened = flatten_from(from, &cte_names)?;
        let planned = FromPlanner.plan(ctx, &flattened, select.filter.as_ref(), ctes)?;

        match &flattened.pivot {
            Some(pivot) => {
                // The WHERE clause filters rows going into the pivot.
                let mut root = planned.root;
                if let Some(expr) = conjoin(planned.residual) {
                    let predicate = ExpressionBinder::new(&planned.scope, "WHERE").bind_predicate(&expr)?;
                    root = Box::new(PhysicalFilter::new(root, predicate));
                }
                let (root, scope) = PivotPlanner.plan(ctx, root, &planned.scope, pivot, ctes)?;
                Ok((root, scope, Vec::new()))
            }
            None => Ok((planned.root, planned.scope, planned.residual)),
        }
    }

    /// Bind a select without aggregation. WHERE conjuncts left by the FROM
    /// clause are fused into the projection.
    fn bind_ungrouped(
        &self,
        items: &[SelectColumn],
        order_by: &[OrderByExpr],
        residual: Vec<Expr>,
        scope: &BindScope,
    ) -> Result<BoundSelect> {
        let filter = match conjoin(residual) {
            Some(expr) => Some(ExpressionBinder::new(scope, "WHERE").bind_predicate(&expr)?),
            None => None,
        };
        let projections = items
            .iter()
            .map(|item| ExpressionBinder::new(scope, "SELECT").bind(&item.expr))
            .collect::<Result<Vec<_>>>()?;
        let order = order_by
            .iter()
            .map(|o| {
                let target = resolve_order_target(&o.expr, items, &projections, |expr| {
                    ExpressionBinder::new(scope, "ORDER BY").bind(expr)
                })?;
                Ok((target, o.asc))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BoundSelect {
            filter,
            projections,
            order,
            input_nullable: scope.columns().iter().map(|c| c.nullable).collect(),
        })
    }

    /// Bind a select over the output of a hash aggregate. HAVING becomes the
    /// projection filter.
    fn bind_grouped(
        &self,
        select: &Select,
        items: &[SelectColumn],
        order_by: &[OrderByExpr],
        scope: &BindScope,
    ) -> Result<(AggregateParts, BoundSelect)> {
        let groups = select
            .group_by
            .iter()
            .map(|expr| ExpressionBinder::new(scope, "GROUP BY").bind(expr))
            .collect::<Result<Vec<_>>>()?;
        let mut grouping = Grouping::new(groups);

        let projections = items
            .iter()
            .map(|item| ExpressionBinder::grouped(scope, "SELECT", &mut grouping).bind(&item.expr))
            .collect::<Result<Vec<_>>>()?;
        let filter = match &select.having {
            Some(expr) => Some(ExpressionBinder::grouped(scope, "HAVING", &mut grouping).bind_predicate(expr)?),
            None => None,
        };
        let mut order = Vec::with_capacity(order_by.len());
        for o in order_by {
            let target = resolve_order_target(&o.expr, items, &projections, |expr| {
                ExpressionBinder::grouped(scope, "ORDER BY", &mut grouping).bind(expr)
            })?;
            order.push((target, o.asc));
        }

        let scope_nullable: Vec<bool> = scope.columns().iter().map(|c| c.nullable).collect();
        let (groups, aggregates) = grouping.into_parts();
        let input_nullable = groups
            .iter()
            .map(|g| is_nullable(g, &scope_nullable))
            .chain(aggregates.iter().map(|a| a.function.function().is_nullable()))
            .collect();

        debug!(
            num_groups = groups.len(),
            num_aggregates = aggregates.len(),
            "planned grouping"
        );

        Ok((
            (groups, aggregates),
            BoundSelect {
                filter,
                projections,
                order,
                input_nullable,
            },
        ))
    }
}

/// Expand wildcards into column references.
fn expand_projections(items: &[SelectItem], scope: &BindScope) -> Result<Vec<SelectColumn>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SelectItem::Wildcard => {
                out.extend(scope.columns().iter().map(|col| SelectColumn {
                    expr: Expr::Column(ColumnRef {
                        qualifier: col.alias.clone(),
                        name: col.name.clone(),
                    }),
                    name: col.name.clone(),
                }));
            }
            SelectItem::QualifiedWildcard(alias) => {
                if !scope.has_alias(alias) {
                    return Err(DbError::with_kind(
                        ErrorKind::UnknownAlias,
                        format!("Unknown alias '{alias}'"),
                    )
                    .with_field("alias", alias));
                }
                for idx in scope.alias_columns(alias) {
                    if let Some(col) = scope.column(idx) {
                        out.push(SelectColumn {
                            expr: Expr::Column(ColumnRef {
                                qualifier: Some(alias.clone()),
                                name: col.name.clone(),
                            }),
                            name: col.name.clone(),
                        });
                    }
                }
            }
            SelectItem::Expr { expr, alias } => out.push(SelectColumn {
                expr: expr.clone(),
                name: alias.clone().unwrap_or_else(|| expr.output_name()),
            }),
        }
    }
    Ok(out)
}

/// Find the output column an ORDER BY key refers to, binding it as a hidden
/// key otherwise.
///
/// An unqualified name matches output names first, which is how aliases are
/// referenced.
fn resolve_order_target(
    expr: &Expr,
    items: &[SelectColumn],
    projections: &[PhysicalScalarExpression],
    bind: impl FnOnce(&Expr) -> Result<PhysicalScalarExpression>,
) -> Result<OrderTarget> {
    if let Expr::Column(ColumnRef { qualifier: None, name }) = expr {
        if let Some(idx) = items.iter().position(|item| item.name.eq_ignore_ascii_case(name)) {
            return Ok(OrderTarget::Visible(idx));
        }
    }
    if let Some(idx) = items.iter().position(|item| &item.expr == expr) {
        return Ok(OrderTarget::Visible(idx));
    }

    let bound = bind(expr)?;
    match projections.iter().position(|p| p == &bound) {
        Some(idx) => Ok(OrderTarget::Visible(idx)),
        None => Ok(OrderTarget::Hidden(bound)),
    }
}

fn contains_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if let Expr::Function { name, .. } = e {
            found |= is_aggregate_function(name);
        }
    });
    found
}

/// If an expression can produce null given the nullability of its input
/// columns.
fn is_nullable(expr: &PhysicalScalarExpression, input: &[bool]) -> bool {
    match expr {
        PhysicalScalarExpression::Column { idx, .. } => input.get(*idx).copied().unwrap_or(true),
        PhysicalScalarExpression::Literal { value, .. } => value.is_null(),
        PhysicalScalarExpression::IsNull { .. } => false,
        _ => true,
    }
}
