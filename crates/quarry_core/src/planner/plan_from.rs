use std::sync::Arc;

use quarry_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::PlanContext;
use super::bind_context::BindScope;
use super::expr_binder::ExpressionBinder;
use super::plan_join::plan_join;
use crate::ast::{ApplySource, ApplyType, Expr, JoinType, TableSource};
use crate::coerce::cast::{cast_scalar, implicit_cast_allowed};
use crate::datasource::{DataSource, RowType, ScanHints, TableMethod};
use crate::execution::PhysicalOperator;
use crate::execution::operators::apply::{ApplyInput, PhysicalApply, PropertyShape};
use crate::execution::operators::cte_scan::PhysicalCteScan;
use crate::execution::operators::filter::PhysicalFilter;
use crate::execution::operators::join::JoinLayout;
use crate::execution::operators::scan::PhysicalScan;
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::RowEvaluator;
use crate::result::row::Row;
use crate::rewrite::apply::{FlattenedFrom, FromStep};
use crate::rewrite::cte::CteScope;
use crate::rewrite::pushdown::{PushdownStep, plan_pushdown};
use crate::rewrite::split::conjoin;
use crate::types::datatype::DataType;
use crate::util::suggest::did_you_mean;

/// Output of planning a FROM clause.
#[derive(Debug)]
pub struct PlannedFrom {
    pub root: PhysicalOperator,
    /// Columns of the combined rows, one alias per step.
    pub scope: BindScope,
    /// WHERE conjuncts left to evaluate after the whole FROM clause.
    pub residual: Vec<Expr>,
}

/// Row type of the records an alias was read from, for member applies.
#[derive(Debug, Clone)]
struct RecordType {
    source: Arc<dyn DataSource>,
    row_type: String,
}

#[derive(Debug)]
enum StepInput {
    Method {
        method: Arc<dyn TableMethod>,
        args: Vec<Expr>,
    },
    Cte {
        name: String,
        slot: usize,
    },
    Member {
        /// Step index of the alias the member is read from.
        source_step: usize,
        member: String,
    },
    Property {
        path: Expr,
        shape: PropertyShape,
    },
}

/// A flattened step with its columns resolved.
#[derive(Debug)]
struct ResolvedStep {
    alias: String,
    columns: Vec<(String, DataType, bool)>,
    input: StepInput,
    record_type: Option<RecordType>,
}

impl ResolvedStep {
    fn push_into(&self, scope: &mut BindScope) {
        scope.push_alias(
            Some(&self.alias),
            self.columns
                .iter()
                .map(|(name, datatype, nullable)| (name.as_str(), datatype.clone(), *nullable)),
        );
    }

    fn scope(&self) -> BindScope {
        let mut scope = BindScope::new();
        self.push_into(&mut scope);
        scope
    }
}

#[derive(Debug)]
pub struct FromPlanner;

impl FromPlanner {
    /// Plan the steps of a flattened FROM clause, placing the WHERE conjuncts
    /// that can be evaluated early.
    pub fn plan(
        &self,
        ctx: &PlanContext,
        from: &FlattenedFrom,
        filter: Option<&Expr>,
        ctes: &CteScope,
    ) -> Result<PlannedFrom> {
        let resolved = self.resolve_steps(ctx, &from.steps, ctes)?;

        let pushdown_steps: Vec<_> = from
            .steps
            .iter()
            .zip(&resolved)
            .map(|(step, r)| PushdownStep::new(step, r.columns.iter().map(|(name, _, _)| name.as_str())))
            .collect();
        let pushdown = plan_pushdown(filter, &pushdown_steps, ctx.options.enable_predicate_pushdown);

        let mut scope = BindScope::new();
        let mut root: Option<PhysicalOperator> = None;

        for (idx, (step, resolved)) in from.steps.iter().zip(&resolved).enumerate() {
            let pre_filter = match conjoin(pushdown.pre_filters[idx].iter().cloned()) {
                Some(expr) => Some(ExpressionBinder::new(&resolved.scope(), "WHERE").bind_predicate(&expr)?),
                None => None,
            };
            let hints = ScanHints {
                alias: resolved.alias.clone(),
                filter: pushdown.hints[idx].clone(),
            };

            let width_before = scope.len();
            let plan: PhysicalOperator = match (step, root.take()) {
                (FromStep::Source(_), None) => {
                    let input = self.plan_source(resolved, hints)?;
                    resolved.push_into(&mut scope);
                    with_filter(input, pre_filter)
                }
                (FromStep::Join { join_type, on, .. }, Some(left)) => {
                    let right = with_filter(self.plan_source(resolved, hints)?, pre_filter);
                    resolved.push_into(&mut scope);

                    let condition = ExpressionBinder::new(&scope, "ON").bind_predicate(on)?;
                    let layout = JoinLayout {
                        join_type: *join_type,
                        left_width: width_before,
                        right_width: resolved.columns.len(),
                        left_contexts: idx,
                    };
                    match join_type {
                        JoinType::Left => scope.make_nullable_from(width_before),
                        JoinType::Right => scope.make_nullable_until(width_before),
                        JoinType::Inner => (),
                    }
                    plan_join(ctx.options, left, right, layout, condition)
                }
                (FromStep::Apply { apply_type, .. }, Some(left)) => {
                    let input = self.plan_apply_input(resolved, &scope, hints)?;
                    resolved.push_into(&mut scope);
                    if *apply_type == ApplyType::Outer {
                        scope.make_nullable_from(width_before);
                    }
                    Box::new(PhysicalApply::new(left, *apply_type, input).with_filter(pre_filter))
                }
                _ => return Err(DbError::new("FROM clause must start with a single source")),
            };

            let plan = match conjoin(pushdown.post_filters[idx].iter().cloned()) {
                Some(expr) => {
                    let predicate = ExpressionBinder::new(&scope, "WHERE").bind_predicate(&expr)?;
                    with_filter(plan, Some(predicate))
                }
                None => plan,
            };
            root = Some(plan);
        }

        let root = root.ok_or_else(|| DbError::new("FROM clause without sources"))?;
        Ok(PlannedFrom {
            root,
            scope,
            residual: pushdown.residual,
        })
    }

    fn resolve_steps(&self, ctx: &PlanContext, steps: &[FromStep], ctes: &CteScope) -> Result<Vec<ResolvedStep>> {
        let mut resolved: Vec<ResolvedStep> = Vec::with_capacity(steps.len());
        let mut scope = BindScope::new();

        for step in steps {
            let r = match step {
                FromStep::Source(source) | FromStep::Join { source, .. } => {
                    self.resolve_table_source(ctx, source, ctes)?
                }
                FromStep::Apply { source, .. } => self.resolve_apply_source(ctx, source, &scope, &resolved)?,
            };
            debug!(alias = %r.alias, num_columns = r.columns.len(), "resolved FROM step");
            r.push_into(&mut scope);
            resolved.push(r);
        }

        Ok(resolved)
    }

    fn resolve_table_source(&self, ctx: &PlanContext, source: &TableSource, ctes: &CteScope) -> Result<ResolvedStep> {
        match source {
            TableSource::Method {
                schema, method, args, ..
            } => {
                let (method, columns, record_type) = resolve_method(ctx, schema, method)?;
                Ok(ResolvedStep {
                    alias: source.alias().to_string(),
                    columns,
                    input: StepInput::Method {
                        method,
                        args: args.clone(),
                    },
                    record_type: Some(record_type),
                })
            }
            TableSource::Cte { name, .. } => {
                let binding = ctes.resolve(name)?;
                Ok(ResolvedStep {
                    alias: source.alias().to_string(),
                    columns: binding
                        .columns
                        .iter()
                        .map(|c| (c.name.clone(), c.datatype.clone(), c.nullable))
                        .collect(),
                    input: StepInput::Cte {
                        name: binding.name.clone(),
                        slot: binding.slot,
                    },
                    record_type: None,
                })
            }
        }
    }

    fn resolve_apply_source(
        &self,
        ctx: &PlanContext,
        source: &ApplySource,
        outer: &BindScope,
        earlier: &[ResolvedStep],
    ) -> Result<ResolvedStep> {
        match source {
            ApplySource::Method {
                schema,
                method,
                args,
                alias,
            } => {
                let (method, columns, record_type) = resolve_method(ctx, schema, method)?;
                Ok(ResolvedStep {
                    alias: alias.clone(),
                    columns,
                    input: StepInput::Method {
                        method,
                        args: args.clone(),
                    },
                    record_type: Some(record_type),
                })
            }
            ApplySource::Member {
                source_alias,
                member,
                alias,
            } => {
                let (source_step, step) = earlier
                    .iter()
                    .enumerate()
                    .find(|(_, s)| s.alias.eq_ignore_ascii_case(source_alias))
                    .ok_or_else(|| {
                        DbError::with_kind(
                            ErrorKind::UnknownAlias,
                            format!("Unknown alias '{source_alias}'"),
                        )
                        .with_field("alias", source_alias)
                    })?;

                let record_type = step.record_type.as_ref().ok_or_else(|| {
                    DbError::with_kind(
                        ErrorKind::InvalidArgument,
                        format!("Alias '{source_alias}' does not expose table-valued members"),
                    )
                    .with_field("alias", source_alias)
                })?;
                let row_type = lookup_row_type(record_type)?;
                let def = row_type.table_member(member).ok_or_else(|| {
                    let msg = format!("Unknown table-valued member '{member}' on alias '{source_alias}'");
                    let msg = match did_you_mean(member, row_type.table_members.iter().map(|m| m.name.as_str())) {
                        Some(s) => format!("{msg}. Did you mean '{s}'?"),
                        None => msg,
                    };
                    DbError::with_kind(ErrorKind::UnknownColumn, msg).with_field("column", member)
                })?;

                let member_type = RecordType {
                    source: record_type.source.clone(),
                    row_type: def.row_type.clone(),
                };
                let columns = row_type_columns(lookup_row_type(&member_type)?);

                Ok(ResolvedStep {
                    alias: alias.clone(),
                    columns,
                    input: StepInput::Member {
                        source_step,
                        member: def.name.clone(),
                    },
                    record_type: Some(member_type),
                })
            }
            ApplySource::Property { path, alias } => {
                let bound = ExpressionBinder::new(outer, "APPLY").bind(path)?;
                let element = match bound.datatype() {
                    DataType::List(meta) => *meta.datatype,
                    DataType::Any | DataType::Null => DataType::Any,
                    other => {
                        return Err(DbError::with_kind(
                            ErrorKind::TypeMismatch,
                            format!("Cannot apply over '{path}' of type {other}, expected a list"),
                        )
                        .with_field("alias", alias));
                    }
                };

                let (columns, shape) = match element {
                    DataType::Struct(meta) => (
                        meta.fields
                            .iter()
                            .map(|f| (f.name.clone(), f.datatype.clone(), true))
                            .collect::<Vec<_>>(),
                        PropertyShape::Fields(meta.fields.iter().map(|f| f.name.clone()).collect()),
                    ),
                    other => (vec![("value".to_string(), other, true)], PropertyShape::Value),
                };

                Ok(ResolvedStep {
                    alias: alias.clone(),
                    columns,
                    input: StepInput::Property {
                        path: path.clone(),
                        shape,
                    },
                    record_type: None,
                })
            }
        }
    }

    /// Operator for a step that doesn't depend on earlier aliases.
    fn plan_source(&self, step: &ResolvedStep, hints: ScanHints) -> Result<PhysicalOperator> {
        match &step.input {
            StepInput::Method { method, args } => {
                let empty = BindScope::new();
                let row = Row::new(Vec::new());
                let values = bind_method_args(method.as_ref(), args, &empty)?
                    .iter()
                    .zip(method.parameters())
                    .map(|(arg, param)| cast_scalar(&RowEvaluator::eval_single(&row, arg)?, &param.datatype))
                    .collect::<Result<Vec<_>>>()?;
                debug!(method = method.name(), alias = %hints.alias, "planned scan");
                Ok(Box::new(PhysicalScan::new(
                    method.clone(),
                    values,
                    hints,
                    step.columns.len(),
                )))
            }
            StepInput::Cte { name, slot } => Ok(Box::new(PhysicalCteScan::new(name.clone(), *slot))),
            _ => Err(DbError::new(format!(
                "Step '{}' can only be planned as an apply",
                step.alias
            ))),
        }
    }

    fn plan_apply_input(&self, step: &ResolvedStep, outer: &BindScope, hints: ScanHints) -> Result<ApplyInput> {
        match &step.input {
            StepInput::Method { method, args } => Ok(ApplyInput::Method {
                method: method.clone(),
                args: bind_method_args(method.as_ref(), args, outer)?,
                parameter_types: method.parameters().iter().map(|p| p.datatype.clone()).collect(),
                hints,
                num_columns: step.columns.len(),
            }),
            StepInput::Member { source_step, member } => Ok(ApplyInput::Member {
                context: *source_step,
                member: member.clone(),
                num_columns: step.columns.len(),
            }),
            StepInput::Property { path, shape } => Ok(ApplyInput::Property {
                path: ExpressionBinder::new(outer, "APPLY").bind(path)?,
                shape: shape.clone(),
            }),
            StepInput::Cte { .. } => Err(DbError::new(format!(
                "CTE step '{}' cannot be applied",
                step.alias
            ))),
        }
    }
}

fn with_filter(input: PhysicalOperator, filter: Option<PhysicalScalarExpression>) -> PhysicalOperator {
    match filter {
        Some(predicate) => Box::new(PhysicalFilter::new(input, predicate)),
        None => input,
    }
}

fn resolve_method(
    ctx: &PlanContext,
    schema: &str,
    method: &str,
) -> Result<(Arc<dyn TableMethod>, Vec<(String, DataType, bool)>, RecordType)> {
    let source = ctx.registry.resolve(schema)?.clone();
    let method = ctx.registry.resolve_method(schema, method)?;
    let record_type = RecordType {
        source,
        row_type: method.row_type().to_string(),
    };
    let columns = row_type_columns(lookup_row_type(&record_type)?);
    Ok((method, columns, record_type))
}

fn lookup_row_type(record_type: &RecordType) -> Result<&RowType> {
    record_type.source.row_type(&record_type.row_type).ok_or_else(|| {
        DbError::with_kind(
            ErrorKind::DataSource,
            format!(
                "Schema '{}' does not declare row type '{}'",
                record_type.source.name(),
                record_type.row_type
            ),
        )
        .with_field("schema", record_type.source.name())
    })
}

fn row_type_columns(row_type: &RowType) -> Vec<(String, DataType, bool)> {
    row_type
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.datatype.clone(), c.nullable))
        .collect()
}

/// Bind method arguments, checking them against the declared parameters.
fn bind_method_args(method: &dyn TableMethod, args: &[Expr], scope: &BindScope) -> Result<Vec<PhysicalScalarExpression>> {
    let params = method.parameters();
    if params.len() != args.len() {
        return Err(DbError::with_kind(
            ErrorKind::ArityMismatch,
            format!(
                "Method '{}' expected {} arguments, got {}",
                method.name(),
                params.len(),
                args.len()
            ),
        )
        .with_field("method", method.name()));
    }

    args.iter()
        .zip(params)
        .map(|(arg, param)| {
            let bound = ExpressionBinder::new(scope, "method arguments").bind(arg)?;
            if !implicit_cast_allowed(&bound.datatype(), &param.datatype) {
                return Err(DbError::with_kind(
                    ErrorKind::TypeMismatch,
                    format!(
                        "Method '{}' parameter '{}' expects {}, got {}",
                        method.name(),
                        param.name,
                        param.datatype,
                        bound.datatype()
                    ),
                )
                .with_field("method", method.name()));
            }
            Ok(bound)
        })
        .collect()
}
