use std::cmp::Ordering;
use std::fmt;

use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::cast::{as_decimal, as_f64, as_i128, parse_decimal};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOperator {
    /// Flip the operator for swapped operands, e.g. `a < b` => `b > a`.
    pub const fn flip(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::NotEq => Self::NotEq,
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
        }
    }

    /// If an ordering of `left.cmp(right)` satisfies this operator.
    pub fn is_satisfied_by(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::NotEq => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::LtEq => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::GtEq => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
        }
    }
}

/// Numeric domain that a string or object value is parsed into before being
/// compared with a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericDomain {
    Integer,
    Float,
    Decimal,
}

impl NumericDomain {
    pub fn for_type(datatype: &DataType) -> Option<Self> {
        if datatype.is_integer() {
            Some(Self::Integer)
        } else if datatype.is_float() {
            Some(Self::Float)
        } else if datatype == &DataType::Decimal {
            Some(Self::Decimal)
        } else {
            None
        }
    }
}

/// How the operands of a comparison are reconciled per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonCoercion {
    /// Values are compared as they are.
    Direct,
    /// Left value is coerced into the domain of the right operand.
    CoerceLeft(NumericDomain),
    /// Right value is coerced into the domain of the left operand.
    CoerceRight(NumericDomain),
}

/// Determine how two operands of the given types are compared.
///
/// Errors with `TypeMismatch` when the types can never be compared.
pub fn comparison_coercion(left: &DataType, right: &DataType) -> Result<ComparisonCoercion> {
    let weak = |dt: &DataType| dt.is_utf8() || dt.is_any();

    match (left, right) {
        (DataType::Null, _) | (_, DataType::Null) => Ok(ComparisonCoercion::Direct),
        (l, r) if l.is_numeric() && r.is_numeric() => Ok(ComparisonCoercion::Direct),
        (l, r) if weak(l) && r.is_numeric() => Ok(ComparisonCoercion::CoerceLeft(
            NumericDomain::for_type(r).unwrap_or(NumericDomain::Decimal),
        )),
        (l, r) if l.is_numeric() && weak(r) => Ok(ComparisonCoercion::CoerceRight(
            NumericDomain::for_type(l).unwrap_or(NumericDomain::Decimal),
        )),
        (DataType::Any, _) | (_, DataType::Any) => Ok(ComparisonCoercion::Direct),
        (DataType::List(_), DataType::List(_)) | (DataType::Struct(_), DataType::Struct(_)) => {
            Ok(ComparisonCoercion::Direct)
        }
        (l, r) if l == r => Ok(ComparisonCoercion::Direct),
        (l, r) => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("Cannot compare {l} with {r}"),
        )),
    }
}

/// Coerce a value into a numeric domain for comparison.
///
/// Returns `None` for values that can never satisfy a comparison: nulls,
/// unparsable strings, NaN and infinities.
pub fn coerce_to_domain(value: &ScalarValue, domain: NumericDomain) -> Option<ScalarValue> {
    match value {
        ScalarValue::Null => None,
        ScalarValue::Utf8(s) => {
            let s = s.trim();
            match domain {
                NumericDomain::Integer => s.parse::<i64>().ok().map(ScalarValue::Int64),
                NumericDomain::Float => s
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(ScalarValue::Float64),
                NumericDomain::Decimal => parse_decimal(s).map(ScalarValue::Decimal),
            }
        }
        ScalarValue::Float32(_) | ScalarValue::Float64(_) => {
            let f = as_f64(value)?;
            if !f.is_finite() {
                return None;
            }
            match domain {
                // Floats compare exactly against integers, no rounding.
                NumericDomain::Integer | NumericDomain::Float => Some(value.clone()),
                NumericDomain::Decimal => Decimal::try_from(f).ok().map(ScalarValue::Decimal),
            }
        }
        ScalarValue::Decimal(_) => Some(value.clone()),
        other if as_i128(other).is_some() => Some(other.clone()),
        _ => None,
    }
}

/// Compare two values with a SQL comparison operator.
///
/// Returns a boolean, or null when either side is null or can't be coerced.
pub fn eval_comparison(
    op: ComparisonOperator,
    coercion: ComparisonCoercion,
    left: &ScalarValue,
    right: &ScalarValue,
) -> ScalarValue {
    match compare_coerced(coercion, left, right) {
        Some(ord) => ScalarValue::Boolean(op.is_satisfied_by(ord)),
        None => ScalarValue::Null,
    }
}

/// Apply the coercion and compare, returning `None` if the comparison is
/// unknown.
pub fn compare_coerced(
    coercion: ComparisonCoercion,
    left: &ScalarValue,
    right: &ScalarValue,
) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }

    match coercion {
        ComparisonCoercion::Direct => partial_cmp_values(left, right),
        ComparisonCoercion::CoerceLeft(domain) => {
            let left = coerce_to_domain(left, domain)?;
            partial_cmp_values(&left, right)
        }
        ComparisonCoercion::CoerceRight(domain) => {
            let right = coerce_to_domain(right, domain)?;
            partial_cmp_values(left, &right)
        }
    }
}

/// Compare a float with an integer without losing precision.
fn cmp_f64_i128(f: f64, i: i128) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Less
        });
    }

    let t = f.trunc();
    // Anything outside of this range is outside of every integer type we have.
    if t < -1.8e19 {
        return Some(Ordering::Less);
    }
    if t > 1.9e19 {
        return Some(Ordering::Greater);
    }

    match (t as i128).cmp(&i) {
        Ordering::Equal => f.partial_cmp(&t),
        ord => Some(ord),
    }
}

/// Compare two non-null values, crossing numeric types exactly.
///
/// Returns `None` when the values aren't comparable.
pub fn partial_cmp_values(left: &ScalarValue, right: &ScalarValue) -> Option<Ordering> {
    use ScalarValue as S;

    match (left, right) {
        (S::Null, _) | (_, S::Null) => None,
        (S::Boolean(l), S::Boolean(r)) => Some(l.cmp(r)),
        (S::Utf8(l), S::Utf8(r)) => Some(l.cmp(r)),
        (S::List(l), S::List(r)) => {
            for (l, r) in l.iter().zip(r.iter()) {
                match partial_cmp_values(l, r)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(l.len().cmp(&r.len()))
        }
        (S::Struct(l), S::Struct(r)) => {
            if l == r {
                Some(Ordering::Equal)
            } else {
                None
            }
        }
        (l, r) => {
            if let (Some(l), Some(r)) = (as_i128(l), as_i128(r)) {
                return Some(l.cmp(&r));
            }

            let l_float = matches!(l, S::Float32(_) | S::Float64(_));
            let r_float = matches!(r, S::Float32(_) | S::Float64(_));

            match (l, r) {
                (S::Decimal(_), _) | (_, S::Decimal(_)) => {
                    match (as_decimal(l), as_decimal(r)) {
                        (Some(l), Some(r)) => Some(l.cmp(&r)),
                        // Non-finite floats don't convert, compare as floats.
                        _ => as_f64(l)?.partial_cmp(&as_f64(r)?),
                    }
                }
                _ if l_float && r_float => as_f64(l)?.partial_cmp(&as_f64(r)?),
                _ if l_float => cmp_f64_i128(as_f64(l)?, as_i128(r)?),
                _ if r_float => cmp_f64_i128(as_f64(r)?, as_i128(l)?).map(Ordering::reverse),
                _ => None,
            }
        }
    }
}

fn type_rank(value: &ScalarValue) -> u8 {
    match value {
        ScalarValue::Null => 0,
        ScalarValue::Boolean(_) => 1,
        ScalarValue::Utf8(_) => 3,
        ScalarValue::List(_) => 4,
        ScalarValue::Struct(_) => 5,
        _ => 2,
    }
}

/// Total order used for sorting. Nulls sort first.
///
/// Values that aren't comparable with each other are ordered by a fixed rank
/// of their kind so that sorting mixed object columns is deterministic.
pub fn sort_cmp(left: &ScalarValue, right: &ScalarValue) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => (),
    }

    if let Some(ord) = partial_cmp_values(left, right) {
        return ord;
    }

    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| match (as_f64(left), as_f64(right)) {
            (Some(l), Some(r)) => l.total_cmp(&r),
            _ => left.to_string().cmp(&right.to_string()),
        })
}
