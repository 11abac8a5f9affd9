use std::cmp::Ordering;

use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::{PendingPivot, PlanContext};
use super::bind_context::{BindScope, ScopeColumn};
use super::expr_binder::{bind_aggregate, bind_literal};
use super::plan_query::QueryPlanner;
use crate::ast::{Pivot, PivotValues};
use crate::coerce::cast::cast_scalar;
use crate::coerce::compare::partial_cmp_values;
use crate::execution::PhysicalOperator;
use crate::execution::operators::pivot::{PhysicalPivot, PivotAggregate};
use crate::functions::aggregate::find_aggregate_function;
use crate::functions::{FunctionInfo, unknown_function_error};
use crate::rewrite::cte::CteScope;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug)]
pub struct PivotPlanner;

impl PivotPlanner {
    /// Plan a pivot over the rows of `scope`, returning the operator and the
    /// scope of the pivoted rows.
    pub fn plan(
        &self,
        ctx: &mut PlanContext,
        input: PhysicalOperator,
        scope: &BindScope,
        pivot: &Pivot,
        ctes: &CteScope,
    ) -> Result<(PhysicalOperator, BindScope)> {
        let resolved = scope.resolve(&pivot.pivot_column)?;
        if resolved.property.is_some() {
            return Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("Pivot column '{}' must be a column", pivot.pivot_column),
            )
            .with_field("column", &pivot.pivot_column));
        }
        let pivot_idx = resolved.idx;
        let pivot_type = scope
            .column(pivot_idx)
            .map(|c| c.datatype.clone())
            .unwrap_or(DataType::Any);

        let mut aggregates = Vec::with_capacity(pivot.aggregations.len());
        let mut output_types = Vec::with_capacity(pivot.aggregations.len());
        for agg in &pivot.aggregations {
            let function = find_aggregate_function(&agg.function)
                .ok_or_else(|| unknown_function_error(&agg.function))?;
            let bound = bind_aggregate(scope, function, std::slice::from_ref(&agg.argument), false)?;
            let input = bound.input.ok_or_else(|| DbError::new("Pivot aggregate without input"))?;
            output_types.push(bound.datatype);
            aggregates.push(PivotAggregate {
                function: bound.function,
                input,
            });
        }

        let mut consumed = vec![pivot_idx];
        for agg in &aggregates {
            agg.input.for_each_column(&mut |idx| consumed.push(idx));
        }
        let retained: Vec<usize> = (0..scope.len()).filter(|idx| !consumed.contains(idx)).collect();

        let values = match &pivot.values {
            PivotValues::List(literals) => {
                let values = literals.iter().map(bind_literal).collect::<Result<Vec<_>>>()?;
                conform_values(values, &pivot_type, ErrorKind::TypeMismatch)?
            }
            PivotValues::Subquery(query) => match ctx.pivots.next_pivot() {
                // Discovered values come from data, a bad one is a runtime
                // failure.
                (_, Some(values)) => conform_values(values, &pivot_type, ErrorKind::InvalidOperand)?,
                (index, None) => {
                    if !ctx.pivots.is_pending() {
                        let planned = QueryPlanner.plan(ctx, query, ctes)?;
                        debug!(index, "pivot values pending discovery");
                        let num_ctes = ctx.ctes.len();
                        ctx.pivots.set_pending(PendingPivot {
                            index,
                            query: planned,
                            num_ctes,
                        });
                    }
                    Vec::new()
                }
            },
        };
        debug!(num_values = values.len(), num_retained = retained.len(), "planned pivot");

        let mut out = BindScope::new();
        for &idx in &retained {
            if let Some(col) = scope.column(idx) {
                out.push(ScopeColumn {
                    alias: pivot.alias.clone().or_else(|| col.alias.clone()),
                    ..col.clone()
                });
            }
        }
        for value in &values {
            for (agg, datatype) in pivot.aggregations.iter().zip(&output_types) {
                let name = if pivot.aggregations.len() == 1 {
                    value.to_string()
                } else {
                    let function = find_aggregate_function(&agg.function)
                        .map(|f| f.name())
                        .unwrap_or(agg.function.as_str());
                    format!("{value}_{function}_{}", agg.argument.output_name())
                };
                out.push(ScopeColumn {
                    alias: pivot.alias.clone(),
                    name,
                    datatype: datatype.clone(),
                    nullable: true,
                });
            }
        }

        let op = PhysicalPivot::new(input, retained, pivot_idx, aggregates, values);
        Ok((Box::new(op), out))
    }
}

/// Cast pivot values to the pivot column's type, dropping nulls and
/// duplicates.
fn conform_values(values: Vec<ScalarValue>, datatype: &DataType, kind: ErrorKind) -> Result<Vec<ScalarValue>> {
    let mut out: Vec<ScalarValue> = Vec::with_capacity(values.len());
    for value in values {
        if value.is_null() {
            continue;
        }
        let value = cast_scalar(&value, datatype).map_err(|_| {
            DbError::with_kind(
                kind,
                format!("Pivot value '{value}' is not compatible with {datatype}"),
            )
        })?;
        if !out
            .iter()
            .any(|v| partial_cmp_values(v, &value) == Some(Ordering::Equal))
        {
            out.push(value);
        }
    }
    Ok(out)
}
