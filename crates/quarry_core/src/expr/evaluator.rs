use quarry_error::{DbError, ErrorKind, Result};

use super::like::{CompiledPattern, PatternMatcher};
use super::{ConjunctionOperator, PhysicalScalarExpression};
use crate::coerce::arith::{eval_arith, eval_negate};
use crate::coerce::cast::cast_scalar;
use crate::coerce::compare::{ComparisonOperator, eval_comparison};
use crate::result::row::Row;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Evaluates expressions against a single row.
///
/// Shared sub-expressions are computed the first time they're referenced and
/// cached for the rest of the row. An evaluator must not be reused across
/// rows.
#[derive(Debug)]
pub struct RowEvaluator<'a> {
    row: &'a Row,
    shared: &'a [PhysicalScalarExpression],
    cache: Vec<Option<ScalarValue>>,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(row: &'a Row, shared: &'a [PhysicalScalarExpression]) -> Self {
        RowEvaluator {
            row,
            shared,
            cache: vec![None; shared.len()],
        }
    }

    /// Evaluate an expression that doesn't reference shared slots.
    pub fn eval_single(row: &Row, expr: &PhysicalScalarExpression) -> Result<ScalarValue> {
        RowEvaluator::new(row, &[]).eval(expr)
    }

    /// Evaluate a filter predicate. Only `true` passes.
    pub fn eval_predicate(&mut self, expr: &PhysicalScalarExpression) -> Result<bool> {
        match self.eval(expr)? {
            ScalarValue::Boolean(b) => Ok(b),
            ScalarValue::Null => Ok(false),
            other => Err(DbError::with_kind(
                ErrorKind::InvalidOperand,
                format!("Expected predicate to evaluate to a boolean, got '{other}'"),
            )),
        }
    }

    pub fn eval(&mut self, expr: &PhysicalScalarExpression) -> Result<ScalarValue> {
        use PhysicalScalarExpression as E;

        match expr {
            E::Column { idx, .. } => self.row.value(*idx).cloned().ok_or_else(|| {
                DbError::new(format!(
                    "Column index {idx} out of bounds for row of width {}",
                    self.row.len()
                ))
            }),
            E::Literal { value, .. } => Ok(value.clone()),
            E::Property { expr, name, .. } => {
                let base = self.eval(expr)?;
                property(&base, name)
            }
            E::Arith {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_arith(*op, &left, &right)
            }
            E::Comparison {
                op,
                left,
                right,
                coercion,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(eval_comparison(*op, *coercion, &left, &right))
            }
            E::Conjunction { op, left, right } => self.eval_conjunction(*op, left, right),
            E::Not(expr) => match self.eval(expr)? {
                ScalarValue::Null => Ok(ScalarValue::Null),
                ScalarValue::Boolean(b) => Ok(ScalarValue::Boolean(!b)),
                other => Err(not_boolean(&other)),
            },
            E::Negate { expr, .. } => {
                let v = self.eval(expr)?;
                eval_negate(&v)
            }
            E::IsNull { expr, negated } => {
                let v = self.eval(expr)?;
                Ok(ScalarValue::Boolean(v.is_null() != *negated))
            }
            E::InList {
                expr,
                list,
                coercions,
                negated,
            } => {
                let v = self.eval(expr)?;
                if v.is_null() {
                    return Ok(ScalarValue::Null);
                }
                let mut saw_null = false;
                for (item, coercion) in list.iter().zip(coercions) {
                    let item = self.eval(item)?;
                    match eval_comparison(ComparisonOperator::Eq, *coercion, &v, &item) {
                        ScalarValue::Boolean(true) => return Ok(ScalarValue::Boolean(!negated)),
                        ScalarValue::Null => saw_null = true,
                        _ => (),
                    }
                }
                if saw_null {
                    Ok(ScalarValue::Null)
                } else {
                    Ok(ScalarValue::Boolean(*negated))
                }
            }
            E::Like {
                expr,
                pattern,
                kind,
                negated,
            } => {
                let v = self.eval(expr)?;
                let s = match text(&v) {
                    Some(s) => s,
                    None => return Ok(ScalarValue::Null),
                };
                let matched = match pattern {
                    PatternMatcher::Static(p) => p.is_match(&s),
                    PatternMatcher::Dynamic(p) => {
                        let p = self.eval(p)?;
                        match text(&p) {
                            Some(p) => CompiledPattern::try_new(&p, *kind)?.is_match(&s),
                            None => return Ok(ScalarValue::Null),
                        }
                    }
                };
                Ok(ScalarValue::Boolean(matched != *negated))
            }
            E::Contains { expr, items } => {
                let v = self.eval(expr)?;
                let s = match text(&v) {
                    Some(s) => s,
                    None => return Ok(ScalarValue::Null),
                };
                let mut saw_null = false;
                for item in items {
                    match text(&self.eval(item)?) {
                        Some(item) if s.contains(item.as_str()) => {
                            return Ok(ScalarValue::Boolean(true));
                        }
                        Some(_) => (),
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    Ok(ScalarValue::Null)
                } else {
                    Ok(ScalarValue::Boolean(false))
                }
            }
            E::Case {
                cases,
                else_result,
                datatype,
            } => {
                for case in cases {
                    if self.eval(&case.when)?.is_true() {
                        let v = self.eval(&case.then)?;
                        return conform(v, datatype);
                    }
                }
                match else_result {
                    Some(e) => {
                        let v = self.eval(e)?;
                        conform(v, datatype)
                    }
                    None => Ok(ScalarValue::Null),
                }
            }
            E::ScalarFunction {
                function,
                inputs,
                datatype,
            } => {
                let args = inputs
                    .iter()
                    .map(|input| self.eval(input))
                    .collect::<Result<Vec<_>>>()?;
                let v = function.function().execute(&args)?;
                conform(v, datatype)
            }
            E::Shared { slot, .. } => {
                if let Some(Some(v)) = self.cache.get(*slot) {
                    return Ok(v.clone());
                }
                let shared = self.shared;
                let expr = shared
                    .get(*slot)
                    .ok_or_else(|| DbError::new(format!("Missing shared expression {slot}")))?;
                let v = self.eval(expr)?;
                self.cache[*slot] = Some(v.clone());
                Ok(v)
            }
        }
    }

    fn eval_conjunction(
        &mut self,
        op: ConjunctionOperator,
        left: &PhysicalScalarExpression,
        right: &PhysicalScalarExpression,
    ) -> Result<ScalarValue> {
        // Value that decides the result on its own.
        let decisive = op == ConjunctionOperator::Or;

        let left = as_tristate(self.eval(left)?)?;
        if left == Some(decisive) {
            return Ok(ScalarValue::Boolean(decisive));
        }
        let right = as_tristate(self.eval(right)?)?;
        if right == Some(decisive) {
            return Ok(ScalarValue::Boolean(decisive));
        }
        match (left, right) {
            (Some(_), Some(_)) => Ok(ScalarValue::Boolean(!decisive)),
            _ => Ok(ScalarValue::Null),
        }
    }
}

fn not_boolean(value: &ScalarValue) -> DbError {
    DbError::with_kind(
        ErrorKind::InvalidOperand,
        format!("Expected a boolean value, got '{value}'"),
    )
}

fn as_tristate(value: ScalarValue) -> Result<Option<bool>> {
    match value {
        ScalarValue::Null => Ok(None),
        ScalarValue::Boolean(b) => Ok(Some(b)),
        other => Err(not_boolean(&other)),
    }
}

/// String form of a value for pattern matching. Nulls return `None`.
fn text(value: &ScalarValue) -> Option<String> {
    match value {
        ScalarValue::Null => None,
        ScalarValue::Utf8(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read a property from a struct value.
///
/// Dereferencing through null is an error. Missing fields on weakly typed
/// values read as null.
pub fn property(base: &ScalarValue, name: &str) -> Result<ScalarValue> {
    match base {
        ScalarValue::Struct(s) => Ok(s.get(name).cloned().unwrap_or(ScalarValue::Null)),
        ScalarValue::Null => Err(DbError::with_kind(
            ErrorKind::NullDereference,
            format!("Cannot read property '{name}' of null"),
        )
        .with_field("column", name.to_string())),
        other => Err(DbError::with_kind(
            ErrorKind::InvalidOperand,
            format!("Cannot read property '{name}' of non-record value '{other}'"),
        )
        .with_field("column", name.to_string())),
    }
}

/// Cast a computed value to the planned numeric type when they differ.
fn conform(value: ScalarValue, datatype: &DataType) -> Result<ScalarValue> {
    if value.is_null() || !datatype.is_numeric() {
        return Ok(value);
    }
    let actual = value.datatype();
    if &actual == datatype || !actual.is_numeric() {
        return Ok(value);
    }
    cast_scalar(&value, datatype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::compare::ComparisonCoercion;
    use crate::expr::PhysicalWhenThen;
    use crate::functions::scalar::FunctionRef;
    use crate::functions::scalar::string::Length;
    use crate::types::scalar::StructValue;

    fn lit(v: impl Into<ScalarValue>) -> PhysicalScalarExpression {
        PhysicalScalarExpression::literal(v.into())
    }

    fn and(
        left: PhysicalScalarExpression,
        right: PhysicalScalarExpression,
    ) -> PhysicalScalarExpression {
        PhysicalScalarExpression::Conjunction {
            op: ConjunctionOperator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn three_valued_and() {
        let row = Row::new(Vec::new());
        let null = lit(ScalarValue::Null);
        assert_eq!(
            ScalarValue::Boolean(false),
            RowEvaluator::eval_single(&row, &and(null.clone(), lit(false))).unwrap()
        );
        assert_eq!(
            ScalarValue::Null,
            RowEvaluator::eval_single(&row, &and(null, lit(true))).unwrap()
        );
    }

    #[test]
    fn and_short_circuits_errors() {
        // 1 / 0 is never evaluated.
        let div = PhysicalScalarExpression::Arith {
            op: crate::coerce::arith::ArithOperator::Div,
            left: Box::new(lit(1)),
            right: Box::new(lit(0)),
            datatype: DataType::Int32,
        };
        let cmp = PhysicalScalarExpression::Comparison {
            op: ComparisonOperator::Eq,
            left: Box::new(div),
            right: Box::new(lit(1)),
            coercion: ComparisonCoercion::Direct,
        };
        let row = Row::new(Vec::new());
        assert_eq!(
            ScalarValue::Boolean(false),
            RowEvaluator::eval_single(&row, &and(lit(false), cmp)).unwrap()
        );
    }

    #[test]
    fn property_through_null_errors() {
        let row = Row::new(vec![ScalarValue::Null]);
        let expr = PhysicalScalarExpression::Property {
            expr: Box::new(PhysicalScalarExpression::column(0, DataType::Any)),
            name: "City".to_string(),
            datatype: DataType::Any,
        };
        let err = RowEvaluator::eval_single(&row, &expr).unwrap_err();
        assert_eq!(ErrorKind::NullDereference, err.kind());

        let row = Row::new(vec![StructValue::new().with_field("City", "Oslo").into()]);
        assert_eq!(
            ScalarValue::from("Oslo"),
            RowEvaluator::eval_single(&row, &expr).unwrap()
        );
    }

    #[test]
    fn shared_slot_computed_once_per_row() {
        let shared = vec![PhysicalScalarExpression::ScalarFunction {
            function: FunctionRef(&Length),
            inputs: vec![PhysicalScalarExpression::column(0, DataType::Utf8)],
            datatype: DataType::Int32,
        }];
        let slot = PhysicalScalarExpression::Shared {
            slot: 0,
            datatype: DataType::Int32,
        };
        let row = Row::new(vec!["abcd".into()]);
        let mut eval = RowEvaluator::new(&row, &shared);
        assert_eq!(ScalarValue::Int32(4), eval.eval(&slot).unwrap());
        assert_eq!(Some(ScalarValue::Int32(4)), eval.cache[0]);
        assert_eq!(ScalarValue::Int32(4), eval.eval(&slot).unwrap());
    }

    #[test]
    fn case_casts_to_result_type() {
        let expr = PhysicalScalarExpression::Case {
            cases: vec![PhysicalWhenThen {
                when: lit(true),
                then: lit(1),
            }],
            else_result: Some(Box::new(lit(2i64))),
            datatype: DataType::Int64,
        };
        let row = Row::new(Vec::new());
        assert_eq!(
            ScalarValue::Int64(1),
            RowEvaluator::eval_single(&row, &expr).unwrap()
        );
    }
}
