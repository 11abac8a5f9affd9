//! Pull based row execution.
//!
//! A plan is a tree of operators. Executing an operator returns an iterator
//! over its output rows, pulling from its children as needed. Operators that
//! must see all of an input before producing output (hash tables, sorts,
//! groupings) materialize that input when first polled.

pub mod context;
pub mod operators;

use std::fmt::Debug;

use context::ExecutionContext;
use quarry_error::Result;

use crate::explain::{ExplainConfig, Explainable};
use crate::result::row::Row;
use crate::result::table::{Column, Table};

/// Stream of rows produced by an operator.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

pub trait ExecutableOperator: Explainable + Debug + Sync + Send {
    /// Start producing rows.
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>>;

    /// Child operators, for explaining.
    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        Vec::new()
    }
}

pub type PhysicalOperator = Box<dyn ExecutableOperator>;

/// Pull every row out of an operator, checking for cancellation between rows.
pub fn collect_rows(operator: &dyn ExecutableOperator, context: &ExecutionContext) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for row in operator.execute(context)? {
        context.check_canceled()?;
        rows.push(row?);
    }
    Ok(rows)
}

/// Run an operator into a table with the given columns.
pub fn materialize(
    name: &str,
    columns: &[Column],
    operator: &dyn ExecutableOperator,
    context: &ExecutionContext,
) -> Result<Table> {
    let mut table = Table::new(name, columns.to_vec());
    for row in operator.execute(context)? {
        context.check_canceled()?;
        let mut row = row?;
        // Hidden sort columns are dropped by the sort, but a plan without a
        // sort may still carry contexts.
        row.truncate(columns.len());
        table.push(row)?;
    }
    Ok(table)
}

/// Expand each input row into zero or more output rows.
pub(crate) fn expand_rows<'a, F>(input: RowStream<'a>, mut f: F) -> RowStream<'a>
where
    F: FnMut(Row) -> Result<Vec<Row>> + 'a,
{
    Box::new(input.flat_map(move |row| {
        let out: Vec<Result<Row>> = match row.and_then(&mut f) {
            Ok(rows) => rows.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        out
    }))
}

/// Render an operator tree, one operator per line.
pub fn explain_tree(operator: &dyn ExecutableOperator, conf: ExplainConfig) -> String {
    let mut out = String::new();
    explain_inner(operator, conf, 0, &mut out);
    out
}

fn explain_inner(operator: &dyn ExecutableOperator, conf: ExplainConfig, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&operator.explain_entry(conf).to_string());
    out.push('\n');
    for child in operator.children() {
        explain_inner(child, conf, depth + 1, out);
    }
}
