use quarry_error::{DbError, ErrorKind, Result};

use super::bind_context::BindScope;
use crate::ast::{BinaryOperator, ColumnRef, Expr, Literal, UnaryOperator};
use crate::coerce::arith::{ArithOperator, arith_return_type};
use crate::coerce::compare::{ComparisonOperator, comparison_coercion};
use crate::coerce::literal::{parse_decimal_literal, parse_integer_literal};
use crate::coerce::numeric_result_type;
use crate::execution::operators::hash_aggregate::PhysicalAggregateExpression;
use crate::expr::like::{CompiledPattern, PatternKind, PatternMatcher};
use crate::expr::{ConjunctionOperator, PhysicalScalarExpression, PhysicalWhenThen};
use crate::functions::aggregate::{AggregateFunction, AggregateRef, find_aggregate_function};
use crate::functions::scalar::{FunctionRef, find_scalar_function};
use crate::functions::{FunctionInfo, unknown_function_error};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;
use crate::util::suggest::did_you_mean;

/// Convert a literal into a value, checking it fits its type.
pub fn bind_literal(lit: &Literal) -> Result<ScalarValue> {
    Ok(match lit {
        Literal::Null => ScalarValue::Null,
        Literal::Boolean(b) => ScalarValue::Boolean(*b),
        Literal::Integer { text, datatype } => parse_integer_literal(text, datatype.as_ref())?,
        Literal::Decimal { text, datatype } => parse_decimal_literal(text, datatype.as_ref())?,
        Literal::String(s) => ScalarValue::Utf8(s.clone()),
    })
}

/// Type of a property read off a value of type `base`.
pub fn property_type(base: &DataType, name: &str) -> Result<DataType> {
    match base {
        DataType::Any | DataType::Null => Ok(DataType::Any),
        DataType::Struct(meta) => match meta.field(name) {
            Some(field) => Ok(field.datatype.clone()),
            None => {
                let msg = format!("Unknown property '{name}'");
                let msg = match did_you_mean(name, meta.fields.iter().map(|f| f.name.as_str())) {
                    Some(s) => format!("{msg}. Did you mean '{s}'?"),
                    None => msg,
                };
                Err(DbError::with_kind(ErrorKind::UnknownColumn, msg).with_field("column", name))
            }
        },
        other => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("Cannot read property '{name}' of {other}"),
        )
        .with_field("column", name)),
    }
}

/// Common type of the branches of a CASE or the sides of a set operation.
///
/// Nulls take the type of the other side, numerics are promoted, and anything
/// else that differs becomes `Any`.
pub fn unify_types(left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (l, r) if l == r => l.clone(),
        (l, r) => numeric_result_type(l, r).unwrap_or(DataType::Any),
    }
}

/// Grouping being bound against.
///
/// Expressions bound in grouped mode reference the output of the aggregate:
/// the group values followed by the aggregate results.
#[derive(Debug)]
pub struct Grouping {
    groups: Vec<PhysicalScalarExpression>,
    aggregates: Vec<PhysicalAggregateExpression>,
}

impl Grouping {
    pub fn new(groups: Vec<PhysicalScalarExpression>) -> Self {
        Grouping {
            groups,
            aggregates: Vec::new(),
        }
    }

    pub fn groups(&self) -> &[PhysicalScalarExpression] {
        &self.groups
    }

    pub fn aggregates(&self) -> &[PhysicalAggregateExpression] {
        &self.aggregates
    }

    pub fn into_parts(self) -> (Vec<PhysicalScalarExpression>, Vec<PhysicalAggregateExpression>) {
        (self.groups, self.aggregates)
    }

    /// Add an aggregate, reusing an identical one.
    fn push_aggregate(&mut self, agg: PhysicalAggregateExpression) -> PhysicalScalarExpression {
        let datatype = agg.datatype.clone();
        let idx = match self.aggregates.iter().position(|a| a == &agg) {
            Some(idx) => idx,
            None => {
                self.aggregates.push(agg);
                self.aggregates.len() - 1
            }
        };
        PhysicalScalarExpression::column(self.groups.len() + idx, datatype)
    }

    fn group_reference(&self, bound: &PhysicalScalarExpression) -> Option<PhysicalScalarExpression> {
        self.groups
            .iter()
            .position(|g| g == bound)
            .map(|idx| PhysicalScalarExpression::column(idx, self.groups[idx].datatype()))
    }
}

/// Binds AST expressions to physical expressions over the rows of a scope.
#[derive(Debug)]
pub struct ExpressionBinder<'a, 'b> {
    scope: &'a BindScope,
    /// Clause being bound, for error messages.
    clause: &'static str,
    /// Set when binding the argument of an aggregate.
    in_aggregate: bool,
    grouping: Option<&'b mut Grouping>,
}

impl<'a> ExpressionBinder<'a, 'static> {
    pub fn new(scope: &'a BindScope, clause: &'static str) -> Self {
        ExpressionBinder {
            scope,
            clause,
            in_aggregate: false,
            grouping: None,
        }
    }
}

impl<'a, 'b> ExpressionBinder<'a, 'b> {
    /// Bind against the output of `grouping`, collecting aggregate calls into
    /// it.
    pub fn grouped(scope: &'a BindScope, clause: &'static str, grouping: &'b mut Grouping) -> Self {
        ExpressionBinder {
            scope,
            clause,
            in_aggregate: false,
            grouping: Some(grouping),
        }
    }

    /// Bind a filter condition, which must be boolean.
    pub fn bind_predicate(&mut self, expr: &Expr) -> Result<PhysicalScalarExpression> {
        let bound = self.bind(expr)?;
        check_boolean(self.clause, &bound.datatype())?;
        Ok(bound)
    }

    pub fn bind(&mut self, expr: &Expr) -> Result<PhysicalScalarExpression> {
        if self.grouping.is_some() {
            if let Some(bound) = self.bind_grouped(expr)? {
                return Ok(bound);
            }
        }

        match expr {
            Expr::Literal(lit) => Ok(PhysicalScalarExpression::literal(bind_literal(lit)?)),
            Expr::Column(col) => self.bind_column(col),
            Expr::Property { expr, name } => {
                let base = self.bind(expr)?;
                let datatype = property_type(&base.datatype(), name)?;
                Ok(PhysicalScalarExpression::Property {
                    expr: Box::new(base),
                    name: name.clone(),
                    datatype,
                })
            }
            Expr::Unary { op, expr } => {
                let input = self.bind(expr)?;
                let datatype = input.datatype();
                match op {
                    UnaryOperator::Not => {
                        check_boolean("NOT", &datatype)?;
                        Ok(PhysicalScalarExpression::Not(Box::new(input)))
                    }
                    UnaryOperator::Negate => {
                        if !(datatype.is_numeric() || datatype.is_any() || datatype.is_null()) {
                            return Err(DbError::with_kind(
                                ErrorKind::TypeMismatch,
                                format!("Cannot negate {datatype}"),
                            ));
                        }
                        Ok(PhysicalScalarExpression::Negate {
                            expr: Box::new(input),
                            datatype,
                        })
                    }
                }
            }
            Expr::Binary { left, op, right } => self.bind_binary(left, *op, right),
            Expr::IsNull { expr, negated } => Ok(PhysicalScalarExpression::IsNull {
                expr: Box::new(self.bind(expr)?),
                negated: *negated,
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let expr = self.bind(expr)?;
                let list = list.iter().map(|e| self.bind(e)).collect::<Result<Vec<_>>>()?;
                let coercions = list
                    .iter()
                    .map(|item| comparison_coercion(&expr.datatype(), &item.datatype()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PhysicalScalarExpression::InList {
                    expr: Box::new(expr),
                    list,
                    coercions,
                    negated: *negated,
                })
            }
            Expr::Contains { expr, items } => Ok(PhysicalScalarExpression::Contains {
                expr: Box::new(self.bind(expr)?),
                items: items.iter().map(|e| self.bind(e)).collect::<Result<Vec<_>>>()?,
            }),
            Expr::Case {
                operand,
                conditions,
                else_result,
            } => self.bind_case(operand.as_deref(), conditions, else_result.as_deref()),
            Expr::Function { name, args, star } => self.bind_function(name, args, *star),
        }
    }

    fn bind_column(&mut self, col: &ColumnRef) -> Result<PhysicalScalarExpression> {
        let resolved = self.scope.resolve(col)?;
        if self.grouping.is_some() {
            return Err(DbError::with_kind(
                ErrorKind::InvalidGroupReference,
                format!(
                    "Column '{col}' must appear in GROUP BY or be used in an aggregate function"
                ),
            )
            .with_field("column", col.to_string()));
        }

        let datatype = self
            .scope
            .column(resolved.idx)
            .map(|c| c.datatype.clone())
            .ok_or_else(|| DbError::new(format!("Missing scope column {}", resolved.idx)))?;
        let column = PhysicalScalarExpression::column(resolved.idx, datatype);

        match resolved.property {
            Some(name) => {
                let datatype = property_type(&column.datatype(), &name)?;
                Ok(PhysicalScalarExpression::Property {
                    expr: Box::new(column),
                    name,
                    datatype,
                })
            }
            None => Ok(column),
        }
    }

    /// Bind `expr` directly against the grouping if it's a group expression
    /// or an aggregate call.
    fn bind_grouped(&mut self, expr: &Expr) -> Result<Option<PhysicalScalarExpression>> {
        let Some(grouping) = self.grouping.as_deref_mut() else {
            return Ok(None);
        };

        if let Expr::Function { name, args, star } = expr {
            if let Some(function) = find_aggregate_function(name) {
                let agg = bind_aggregate(self.scope, function, args, *star)?;
                return Ok(Some(grouping.push_aggregate(agg)));
            }
        }

        // Matching on the bound form lets `c.Region` match a grouping on
        // `Region`.
        match ExpressionBinder::new(self.scope, self.clause).bind(expr) {
            Ok(bound) => Ok(grouping.group_reference(&bound)),
            Err(e) if is_name_error(e.kind()) => Err(e),
            // Expressions wrapping aggregates only bind in grouped mode.
            Err(_) => Ok(None),
        }
    }

    fn bind_binary(&mut self, left: &Expr, op: BinaryOperator, right: &Expr) -> Result<PhysicalScalarExpression> {
        let l = self.bind(left)?;
        let r = self.bind(right)?;

        let arith = |op| -> Result<PhysicalScalarExpression> {
            let datatype = arith_return_type(op, &l.datatype(), &r.datatype())?;
            Ok(PhysicalScalarExpression::Arith {
                op,
                left: Box::new(l.clone()),
                right: Box::new(r.clone()),
                datatype,
            })
        };
        let comparison = |op| -> Result<PhysicalScalarExpression> {
            let coercion = comparison_coercion(&l.datatype(), &r.datatype())?;
            Ok(PhysicalScalarExpression::Comparison {
                op,
                left: Box::new(l.clone()),
                right: Box::new(r.clone()),
                coercion,
            })
        };

        match op {
            BinaryOperator::Plus => arith(ArithOperator::Add),
            BinaryOperator::Minus => arith(ArithOperator::Sub),
            BinaryOperator::Multiply => arith(ArithOperator::Mul),
            BinaryOperator::Divide => arith(ArithOperator::Div),
            BinaryOperator::Modulo => arith(ArithOperator::Mod),
            BinaryOperator::Eq => comparison(ComparisonOperator::Eq),
            BinaryOperator::NotEq => comparison(ComparisonOperator::NotEq),
            BinaryOperator::Lt => comparison(ComparisonOperator::Lt),
            BinaryOperator::LtEq => comparison(ComparisonOperator::LtEq),
            BinaryOperator::Gt => comparison(ComparisonOperator::Gt),
            BinaryOperator::GtEq => comparison(ComparisonOperator::GtEq),
            BinaryOperator::And | BinaryOperator::Or => {
                let conj = if op == BinaryOperator::And {
                    ConjunctionOperator::And
                } else {
                    ConjunctionOperator::Or
                };
                check_boolean(&conj.to_string(), &l.datatype())?;
                check_boolean(&conj.to_string(), &r.datatype())?;
                Ok(PhysicalScalarExpression::Conjunction {
                    op: conj,
                    left: Box::new(l),
                    right: Box::new(r),
                })
            }
            BinaryOperator::Like
            | BinaryOperator::NotLike
            | BinaryOperator::RLike
            | BinaryOperator::NotRLike => {
                let kind = match op {
                    BinaryOperator::Like | BinaryOperator::NotLike => PatternKind::Like,
                    _ => PatternKind::RLike,
                };
                let negated = matches!(op, BinaryOperator::NotLike | BinaryOperator::NotRLike);
                let compiled = match r.try_as_literal() {
                    Some(ScalarValue::Utf8(source)) => Some(CompiledPattern::try_new(source, kind)?),
                    _ => None,
                };
                let pattern = match compiled {
                    Some(compiled) => PatternMatcher::Static(compiled),
                    None => PatternMatcher::Dynamic(Box::new(r)),
                };
                Ok(PhysicalScalarExpression::Like {
                    expr: Box::new(l),
                    pattern,
                    kind,
                    negated,
                })
            }
        }
    }

    fn bind_case(
        &mut self,
        operand: Option<&Expr>,
        conditions: &[(Expr, Expr)],
        else_result: Option<&Expr>,
    ) -> Result<PhysicalScalarExpression> {
        let operand = operand.map(|e| self.bind(e)).transpose()?;

        let mut cases = Vec::with_capacity(conditions.len());
        for (when, then) in conditions {
            let when = self.bind(when)?;
            let when = match &operand {
                Some(operand) => PhysicalScalarExpression::Comparison {
                    op: ComparisonOperator::Eq,
                    coercion: comparison_coercion(&operand.datatype(), &when.datatype())?,
                    left: Box::new(operand.clone()),
                    right: Box::new(when),
                },
                None => {
                    check_boolean("CASE WHEN", &when.datatype())?;
                    when
                }
            };
            cases.push(PhysicalWhenThen {
                when,
                then: self.bind(then)?,
            });
        }

        let else_result = else_result.map(|e| self.bind(e)).transpose()?;

        let datatype = cases
            .iter()
            .map(|c| c.then.datatype())
            .chain(else_result.iter().map(|e| e.datatype()))
            .reduce(|acc, dt| unify_types(&acc, &dt))
            .unwrap_or(DataType::Null);

        Ok(PhysicalScalarExpression::Case {
            cases,
            else_result: else_result.map(Box::new),
            datatype,
        })
    }

    fn bind_function(&mut self, name: &str, args: &[Expr], star: bool) -> Result<PhysicalScalarExpression> {
        if let Some(function) = find_scalar_function(name) {
            if star {
                return Err(DbError::with_kind(
                    ErrorKind::InvalidArgument,
                    format!("Function '{}' does not accept '*'", function.name()),
                )
                .with_field("function", function.name()));
            }
            let inputs = args.iter().map(|e| self.bind(e)).collect::<Result<Vec<_>>>()?;
            let types: Vec<_> = inputs.iter().map(|e| e.datatype()).collect();
            let datatype = function.return_type(&types)?;
            return Ok(PhysicalScalarExpression::ScalarFunction {
                function: FunctionRef(function),
                inputs,
                datatype,
            });
        }

        match find_aggregate_function(name) {
            Some(function) if self.in_aggregate => Err(DbError::with_kind(
                ErrorKind::NestedAggregate,
                format!("Aggregate function '{}' cannot be nested", function.name()),
            )
            .with_field("function", function.name())),
            Some(function) => Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!(
                    "Aggregate function '{}' is not allowed in {}",
                    function.name(),
                    self.clause
                ),
            )
            .with_field("function", function.name())),
            None => Err(unknown_function_error(name)),
        }
    }
}

fn is_name_error(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnknownColumn | ErrorKind::AmbiguousColumn | ErrorKind::UnknownAlias
    )
}

/// Bind a single aggregate call against the rows being aggregated.
pub fn bind_aggregate(
    scope: &BindScope,
    function: &'static dyn AggregateFunction,
    args: &[Expr],
    star: bool,
) -> Result<PhysicalAggregateExpression> {
    let input = if star {
        None
    } else {
        if args.len() != 1 {
            return Err(DbError::with_kind(
                ErrorKind::ArityMismatch,
                format!(
                    "Aggregate function '{}' expected 1 argument, got {}",
                    function.name(),
                    args.len()
                ),
            )
            .with_field("function", function.name()));
        }
        let mut binder = ExpressionBinder {
            scope,
            clause: "an aggregate",
            in_aggregate: true,
            grouping: None,
        };
        Some(binder.bind(&args[0])?)
    };

    let datatype = function.return_type(input.as_ref().map(|e| e.datatype()).as_ref())?;
    Ok(PhysicalAggregateExpression {
        function: AggregateRef(function),
        input,
        datatype,
    })
}

fn check_boolean(op: &str, datatype: &DataType) -> Result<()> {
    match datatype {
        DataType::Boolean | DataType::Null | DataType::Any => Ok(()),
        other => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("{op} expects a boolean operand, got {other}"),
        )),
    }
}
