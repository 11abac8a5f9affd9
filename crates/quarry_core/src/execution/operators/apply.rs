use std::fmt;
use std::sync::Arc;

use quarry_error::{DbError, ErrorKind, Result};

use super::scan::record_to_row;
use crate::ast::ApplyType;
use crate::coerce::cast::cast_scalar;
use crate::datasource::{ScanHints, TableMethod};
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream, expand_rows};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::expr::evaluator::{RowEvaluator, property};
use crate::result::row::Row;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// How elements of an enumerated property become columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyShape {
    /// Elements are records, each named field becomes a column.
    Fields(Vec<String>),
    /// Each element becomes a single `value` column.
    Value,
}

/// Where the inner rows of an apply come from.
#[derive(Debug)]
pub enum ApplyInput {
    /// A table method called with arguments computed from the outer row.
    Method {
        method: Arc<dyn TableMethod>,
        args: Vec<PhysicalScalarExpression>,
        parameter_types: Vec<DataType>,
        hints: ScanHints,
        num_columns: usize,
    },
    /// A table-valued member of the record an earlier alias was read from.
    Member {
        /// Context index of the alias in the outer row.
        context: usize,
        member: String,
        num_columns: usize,
    },
    /// A list-valued expression over the outer row.
    Property {
        path: PhysicalScalarExpression,
        shape: PropertyShape,
    },
}

impl ApplyInput {
    fn num_columns(&self) -> usize {
        match self {
            Self::Method { num_columns, .. } | Self::Member { num_columns, .. } => *num_columns,
            Self::Property {
                shape: PropertyShape::Fields(fields),
                ..
            } => fields.len(),
            Self::Property {
                shape: PropertyShape::Value,
                ..
            } => 1,
        }
    }

    /// Compute the inner rows for one outer row.
    fn inner_rows(&self, outer: &Row, context: &ExecutionContext) -> Result<Vec<Row>> {
        match self {
            Self::Method {
                method,
                args,
                parameter_types,
                hints,
                num_columns,
            } => {
                let mut eval = RowEvaluator::new(outer, &[]);
                let args = args
                    .iter()
                    .zip(parameter_types)
                    .map(|(arg, datatype)| cast_scalar(&eval.eval(arg)?, datatype))
                    .collect::<Result<Vec<_>>>()?;

                let mut rows = Vec::new();
                for record in method.scan(&args, hints)? {
                    context.check_canceled()?;
                    rows.push(record_to_row(method.name(), record?, *num_columns)?);
                }
                Ok(rows)
            }
            Self::Member {
                context: idx,
                member,
                num_columns,
            } => {
                // A null padded alias has no record, so no members.
                let Some(record) = outer.context(*idx) else {
                    return Ok(Vec::new());
                };
                let Some(table_valued) = record.table_valued() else {
                    return Err(DbError::with_kind(
                        ErrorKind::DataSource,
                        format!("Record does not expose table-valued member '{member}'"),
                    )
                    .with_field("column", member.clone()));
                };
                table_valued
                    .member_rows(member)?
                    .into_iter()
                    .map(|record| record_to_row(member, record, *num_columns))
                    .collect()
            }
            Self::Property { path, shape } => {
                let value = RowEvaluator::eval_single(outer, path)?;
                let elements = match value {
                    ScalarValue::Null => return Ok(Vec::new()),
                    ScalarValue::List(elements) => elements,
                    other => {
                        return Err(DbError::with_kind(
                            ErrorKind::InvalidOperand,
                            format!("Cannot enumerate non-list value '{other}'"),
                        ));
                    }
                };
                elements
                    .iter()
                    .map(|element| {
                        let values = match shape {
                            PropertyShape::Value => vec![element.clone()],
                            PropertyShape::Fields(fields) => match element {
                                ScalarValue::Null => vec![ScalarValue::Null; fields.len()],
                                element => fields
                                    .iter()
                                    .map(|f| property(element, f))
                                    .collect::<Result<Vec<_>>>()?,
                            },
                        };
                        Row::try_with_contexts(values, vec![None])
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for ApplyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { method, hints, .. } => write!(f, "{} {}", method.name(), hints.alias),
            Self::Member {
                context, member, ..
            } => write!(f, "#{context}.{member}"),
            Self::Property { path, .. } => write!(f, "{path}"),
        }
    }
}

/// Expand each outer row with rows computed from it.
///
/// Cross apply drops outer rows without inner rows, outer apply emits them
/// once with every inner column null.
#[derive(Debug)]
pub struct PhysicalApply {
    pub(crate) input: PhysicalOperator,
    pub(crate) apply_type: ApplyType,
    pub(crate) source: ApplyInput,
    /// Filter over the inner row alone, applied before joining.
    pub(crate) filter: Option<PhysicalScalarExpression>,
}

impl PhysicalApply {
    pub fn new(input: PhysicalOperator, apply_type: ApplyType, source: ApplyInput) -> Self {
        PhysicalApply {
            input,
            apply_type,
            source,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<PhysicalScalarExpression>) -> Self {
        self.filter = filter;
        self
    }

    fn apply_row(&self, outer: Row, context: &ExecutionContext) -> Result<Vec<Row>> {
        context.check_canceled()?;
        let inner = self.source.inner_rows(&outer, context)?;

        let mut out = Vec::with_capacity(inner.len());
        for row in inner {
            if let Some(filter) = &self.filter {
                if !RowEvaluator::new(&row, &[]).eval_predicate(filter)? {
                    continue;
                }
            }
            out.push(Row::try_join(&outer, &row)?);
        }

        if out.is_empty() && self.apply_type == ApplyType::Outer {
            let padded = Row::null_padded(self.source.num_columns(), 1);
            out.push(Row::try_join(&outer, &padded)?);
        }

        Ok(out)
    }
}

impl ExecutableOperator for PhysicalApply {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        let input = self.input.execute(context)?;
        Ok(expand_rows(input, move |row| self.apply_row(row, context)))
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.input.as_ref()]
    }
}

impl Explainable for PhysicalApply {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("Apply")
            .with_value("apply_type", self.apply_type)
            .with_value("source", &self.source);
        if let Some(filter) = &self.filter {
            ent = ent.with_value("filter", filter);
        }
        ent
    }
}
