//! Compilation of queries into operator trees.
//!
//! Planning binds names and types while building operators directly, there's
//! no separate logical plan. Each planner handles one part of a query and
//! returns the operator producing its rows along with the output columns.

pub mod bind_context;
pub mod expr_binder;
pub mod plan_from;
pub mod plan_join;
pub mod plan_pivot;
pub mod plan_query;
pub mod plan_select;
pub mod plan_setop;

use crate::config::CompileOptions;
use crate::datasource::DataSourceRegistry;
use crate::execution::PhysicalOperator;
use crate::result::table::Column;
use crate::types::scalar::ScalarValue;

/// A compiled CTE, materialized before the statement body runs.
#[derive(Debug)]
pub struct PlannedCte {
    pub name: String,
    pub columns: Vec<Column>,
    pub root: PhysicalOperator,
}

/// Operator producing the rows of a (sub)query, and the columns of those
/// rows.
#[derive(Debug)]
pub struct PlannedQuery {
    pub root: PhysicalOperator,
    pub columns: Vec<Column>,
}

/// Pivot values discovered by running their subqueries.
///
/// Pivots over a subquery are numbered in planning order. The first one whose
/// values aren't known records its planned subquery so the caller can run it
/// and plan again. Later ones plan without value columns.
#[derive(Debug, Default)]
pub struct PivotDiscovery {
    values: Vec<Option<Vec<ScalarValue>>>,
    next: usize,
    pending: Option<PendingPivot>,
}

/// A pivot subquery that has to run before planning can finish.
#[derive(Debug)]
pub struct PendingPivot {
    pub index: usize,
    pub query: PlannedQuery,
    /// Number of CTE slots planned before the subquery finished, all of which
    /// it may read.
    pub num_ctes: usize,
}

impl PivotDiscovery {
    /// Record the values of pivot `index`.
    pub fn insert(&mut self, index: usize, values: Vec<ScalarValue>) {
        if self.values.len() <= index {
            self.values.resize(index + 1, None);
        }
        self.values[index] = Some(values);
    }

    /// Number the next pivot over a subquery, returning its values if known.
    pub fn next_pivot(&mut self) -> (usize, Option<Vec<ScalarValue>>) {
        let index = self.next;
        self.next += 1;
        (index, self.values.get(index).cloned().flatten())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a subquery to run. Only the first one is kept.
    pub fn set_pending(&mut self, pending: PendingPivot) {
        if self.pending.is_none() {
            self.pending = Some(pending);
        }
    }

    /// Take the pending subquery, readying the discovered values for another
    /// planning pass.
    pub fn take_pending(&mut self) -> Option<PendingPivot> {
        self.next = 0;
        self.pending.take()
    }
}

/// State shared by every planner while compiling one statement.
#[derive(Debug)]
pub struct PlanContext<'a> {
    pub registry: &'a DataSourceRegistry,
    pub options: &'a CompileOptions,
    /// Every CTE compiled so far, nested ones included, indexed by slot.
    pub ctes: Vec<PlannedCte>,
    pub pivots: PivotDiscovery,
}

impl<'a> PlanContext<'a> {
    pub fn new(registry: &'a DataSourceRegistry, options: &'a CompileOptions) -> Self {
        Self::with_pivots(registry, options, PivotDiscovery::default())
    }

    pub fn with_pivots(registry: &'a DataSourceRegistry, options: &'a CompileOptions, pivots: PivotDiscovery) -> Self {
        PlanContext {
            registry,
            options,
            ctes: Vec::new(),
            pivots,
        }
    }

    /// Add a compiled CTE, returning its slot.
    pub fn push_cte(&mut self, cte: PlannedCte) -> usize {
        self.ctes.push(cte);
        self.ctes.len() - 1
    }
}
