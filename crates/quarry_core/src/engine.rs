//! Compiling and running queries.

use std::fmt::Write as _;

use quarry_error::{ErrorKind, Result};
use tracing::{debug, info};

use crate::ast::Query;
use crate::config::CompileOptions;
use crate::datasource::DataSourceRegistry;
use crate::execution::context::{CancellationToken, ExecutionContext};
use crate::execution::{PhysicalOperator, collect_rows, explain_tree, materialize};
use crate::explain::ExplainConfig;
use crate::planner::plan_query::QueryPlanner;
use crate::planner::{PendingPivot, PivotDiscovery, PlanContext, PlannedCte, PlannedQuery};
use crate::result::table::{Column, Table};
use crate::rewrite::cte::CteScope;
use crate::types::scalar::ScalarValue;

/// A compiled query, ready to run.
///
/// Running the same plan multiple times re-reads every source. A query with a
/// pivot over a subquery keeps the registry it was compiled against, since
/// its output columns are only known once the subquery has run.
#[derive(Debug)]
pub struct ExecutablePlan {
    body: PlanBody,
}

#[derive(Debug)]
enum PlanBody {
    Ready(ReadyPlan),
    Deferred(DeferredPlan),
}

#[derive(Debug)]
struct ReadyPlan {
    /// CTEs in materialization order, each only reading ones before it.
    ctes: Vec<PlannedCte>,
    root: PhysicalOperator,
    columns: Vec<Column>,
}

/// A query whose columns depend on pivot values read from data.
///
/// Each run discovers the values one subquery at a time, planning the query
/// again after each, until planning completes.
#[derive(Debug)]
struct DeferredPlan {
    query: Query,
    registry: DataSourceRegistry,
    options: CompileOptions,
    /// CTEs planned before the first pivot subquery, for explaining.
    ctes: Vec<PlannedCte>,
    pending: PendingPivot,
}

impl ExecutablePlan {
    /// Columns of the result table.
    ///
    /// `None` if they depend on pivot values that are discovered when the plan
    /// runs.
    pub fn columns(&self) -> Option<&[Column]> {
        match &self.body {
            PlanBody::Ready(plan) => Some(&plan.columns),
            PlanBody::Deferred(_) => None,
        }
    }

    /// Run the plan to completion.
    pub fn run(&self, token: &CancellationToken) -> Result<Table> {
        token.check()?;

        let context = ExecutionContext::new(token.clone());
        match &self.body {
            PlanBody::Ready(plan) => plan.run(context),
            PlanBody::Deferred(plan) => plan.run(context),
        }
    }

    /// Render the operator trees of the plan.
    pub fn explain(&self, conf: ExplainConfig) -> String {
        let mut out = String::new();
        match &self.body {
            PlanBody::Ready(plan) => {
                explain_ctes(&plan.ctes, conf, &mut out);
                out.push_str(&explain_tree(plan.root.as_ref(), conf));
            }
            PlanBody::Deferred(plan) => {
                explain_ctes(&plan.ctes, conf, &mut out);
                let _ = writeln!(out, "Pivot values (pivot {}, discovered at run time)", plan.pending.index);
                out.push_str(&explain_tree(plan.pending.query.root.as_ref(), conf));
            }
        }
        out
    }
}

fn explain_ctes(ctes: &[PlannedCte], conf: ExplainConfig, out: &mut String) {
    for (slot, cte) in ctes.iter().enumerate() {
        let _ = writeln!(out, "CTE {} (slot {slot})", cte.name);
        out.push_str(&explain_tree(cte.root.as_ref(), conf));
    }
}

/// Materialize CTEs into the context, skipping the slots it already holds.
fn materialize_ctes(ctes: &[PlannedCte], context: &mut ExecutionContext) -> Result<()> {
    for cte in ctes.iter().skip(context.num_ctes()) {
        let table = materialize(&cte.name, &cte.columns, cte.root.as_ref(), context)?;
        debug!(cte = %cte.name, num_rows = table.num_rows(), "materialized CTE");
        context.push_cte(table);
    }
    Ok(())
}

impl ReadyPlan {
    fn run(&self, mut context: ExecutionContext) -> Result<Table> {
        materialize_ctes(&self.ctes, &mut context)?;

        let table = materialize("result", &self.columns, self.root.as_ref(), &context)?;
        debug!(num_rows = table.num_rows(), "query complete");

        Ok(table)
    }
}

impl DeferredPlan {
    fn run(&self, mut context: ExecutionContext) -> Result<Table> {
        let mut pivots = PivotDiscovery::default();
        loop {
            let mut ctx = PlanContext::with_pivots(&self.registry, &self.options, pivots);
            let planned = QueryPlanner.plan(&mut ctx, &self.query, &CteScope::new());

            match (planned, ctx.pivots.take_pending()) {
                (_, Some(pending)) => {
                    // CTEs planned before the subquery are the same on every
                    // pass, so their tables carry over.
                    materialize_ctes(&ctx.ctes[..pending.num_ctes], &mut context)?;
                    let values = discover_values(&pending.query, &context)?;
                    debug!(index = pending.index, num_values = values.len(), "discovered pivot values");
                    pivots = ctx.pivots;
                    pivots.insert(pending.index, values);
                }
                (Ok(planned), None) => {
                    let plan = ReadyPlan {
                        ctes: ctx.ctes,
                        root: planned.root,
                        columns: planned.columns,
                    };
                    return plan.run(context);
                }
                (Err(e), None) => return Err(e),
            }
        }
    }
}

/// Run a pivot values subquery, reading the first column of each row.
fn discover_values(query: &PlannedQuery, context: &ExecutionContext) -> Result<Vec<ScalarValue>> {
    let rows = collect_rows(query.root.as_ref(), context)?;
    Ok(rows.iter().filter_map(|row| row.value(0).cloned()).collect())
}

/// If a planning error may be caused by pivot columns that haven't been
/// discovered yet.
fn depends_on_pivot_columns(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::UnknownColumn | ErrorKind::SetOperationMismatch)
}

/// Compile a query against the data sources of a registry.
///
/// No data is read. Every name and type error is raised here, except for
/// references to columns generated by a pivot over a subquery: those columns
/// are discovered when the plan runs, and so are errors about them.
pub fn compile(query: &Query, registry: &DataSourceRegistry, options: &CompileOptions) -> Result<ExecutablePlan> {
    let mut ctx = PlanContext::new(registry, options);
    let planned = QueryPlanner.plan(&mut ctx, query, &CteScope::new());

    let body = match (planned, ctx.pivots.take_pending()) {
        (Err(e), Some(_)) if !depends_on_pivot_columns(e.kind()) => return Err(e),
        (_, Some(pending)) => {
            info!(index = pending.index, num_ctes = pending.num_ctes, "compiled query with pivot discovery");
            let mut ctes = ctx.ctes;
            ctes.truncate(pending.num_ctes);
            PlanBody::Deferred(DeferredPlan {
                query: query.clone(),
                registry: registry.clone(),
                options: options.clone(),
                ctes,
                pending,
            })
        }
        (Ok(planned), None) => {
            info!(
                num_columns = planned.columns.len(),
                num_ctes = ctx.ctes.len(),
                sort_merge = options.use_sort_merge_join,
                "compiled query"
            );
            PlanBody::Ready(ReadyPlan {
                ctes: ctx.ctes,
                root: planned.root,
                columns: planned.columns,
            })
        }
        (Err(e), None) => return Err(e),
    };

    Ok(ExecutablePlan { body })
}

/// Run a compiled plan, stopping early if `token` is canceled.
pub fn run(plan: &ExecutablePlan, token: &CancellationToken) -> Result<Table> {
    plan.run(token)
}
