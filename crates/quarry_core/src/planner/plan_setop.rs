use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::expr_binder::unify_types;
use super::plan_query::QueryPlanner;
use super::plan_select::SelectPlanner;
use super::{PlanContext, PlannedQuery};
use crate::ast::{SetExpr, SetOperator};
use crate::execution::operators::set_operation::PhysicalSetOperation;
use crate::result::table::Column;
use crate::rewrite::cte::CteScope;
use crate::util::suggest::did_you_mean;

#[derive(Debug)]
pub struct SetOpPlanner;

impl SetOpPlanner {
    /// Plan a query body that isn't a plain select.
    pub fn plan_set_expr(&self, ctx: &mut PlanContext, expr: &SetExpr, ctes: &CteScope) -> Result<PlannedQuery> {
        match expr {
            SetExpr::Select(select) => SelectPlanner.plan(ctx, select, &[], ctes),
            SetExpr::Query(query) => QueryPlanner.plan(ctx, query, ctes),
            SetExpr::SetOperation {
                op,
                keys,
                left,
                right,
            } => {
                let left = self.plan_set_expr(ctx, left, ctes)?;
                let right = self.plan_set_expr(ctx, right, ctes)?;
                self.plan_set_operation(*op, keys, left, right)
            }
        }
    }

    /// Combine two inputs positionally.
    ///
    /// Output columns take their names from the left, types unify column by
    /// column. Rows are matched on `keys`, named by left output column, or on
    /// every column when empty.
    fn plan_set_operation(
        &self,
        op: SetOperator,
        keys: &[String],
        left: PlannedQuery,
        right: PlannedQuery,
    ) -> Result<PlannedQuery> {
        if left.columns.len() != right.columns.len() {
            return Err(DbError::with_kind(
                ErrorKind::SetOperationMismatch,
                format!(
                    "{op} inputs have different numbers of columns, {} and {}",
                    left.columns.len(),
                    right.columns.len()
                ),
            )
            .with_field("left", left.columns.len())
            .with_field("right", right.columns.len()));
        }

        let columns: Vec<Column> = left
            .columns
            .iter()
            .zip(&right.columns)
            .enumerate()
            .map(|(ordinal, (l, r))| {
                Column::new(
                    &l.name,
                    unify_types(&l.datatype, &r.datatype),
                    l.nullable || r.nullable,
                    ordinal,
                )
            })
            .collect();

        let keys = keys
            .iter()
            .map(|key| {
                columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(key))
                    .ok_or_else(|| {
                        let msg = format!("Unknown key column '{key}' for {op}");
                        let msg = match did_you_mean(key, columns.iter().map(|c| c.name.as_str())) {
                            Some(s) => format!("{msg}. Did you mean '{s}'?"),
                            None => msg,
                        };
                        DbError::with_kind(ErrorKind::UnknownColumn, msg).with_field("column", key)
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let keys = if keys.is_empty() {
            (0..columns.len()).collect()
        } else {
            keys
        };

        debug!(%op, num_columns = columns.len(), num_keys = keys.len(), "planned set operation");

        let output_types = columns.iter().map(|c| c.datatype.clone()).collect();
        let root = Box::new(PhysicalSetOperation::new(left.root, right.root, op, keys, output_types));
        Ok(PlannedQuery { root, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::operators::values::PhysicalValues;
    use crate::types::datatype::DataType;

    fn input(columns: &[(&str, DataType, bool)]) -> PlannedQuery {
        PlannedQuery {
            root: Box::new(PhysicalValues::new(Vec::new())),
            columns: columns
                .iter()
                .enumerate()
                .map(|(idx, (name, dt, nullable))| Column::new(*name, dt.clone(), *nullable, idx))
                .collect(),
        }
    }

    #[test]
    fn unifies_columns() {
        let planned = SetOpPlanner
            .plan_set_operation(
                SetOperator::Union,
                &[],
                input(&[("a", DataType::Int32, false), ("b", DataType::Null, true)]),
                input(&[("x", DataType::Int64, false), ("y", DataType::Utf8, false)]),
            )
            .unwrap();
        assert_eq!("a", planned.columns[0].name);
        assert_eq!(DataType::Int64, planned.columns[0].datatype);
        assert!(!planned.columns[0].nullable);
        assert_eq!(DataType::Utf8, planned.columns[1].datatype);
        assert!(planned.columns[1].nullable);
    }

    #[test]
    fn arity_mismatch() {
        let err = SetOpPlanner
            .plan_set_operation(
                SetOperator::Except,
                &[],
                input(&[("a", DataType::Int32, false)]),
                input(&[("a", DataType::Int32, false), ("b", DataType::Int32, false)]),
            )
            .unwrap_err();
        assert_eq!(ErrorKind::SetOperationMismatch, err.kind());
    }

    #[test]
    fn unknown_key() {
        let err = SetOpPlanner
            .plan_set_operation(
                SetOperator::Intersect,
                &["Idd".to_string()],
                input(&[("Id", DataType::Int32, false)]),
                input(&[("Id", DataType::Int32, false)]),
            )
            .unwrap_err();
        assert_eq!(ErrorKind::UnknownColumn, err.kind());
        assert!(err.message().contains("Did you mean 'Id'"));
    }
}
