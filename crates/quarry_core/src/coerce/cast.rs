use std::str::FromStr;

use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// Read an integer value as an i128. Non-integers return `None`.
pub(crate) fn as_i128(value: &ScalarValue) -> Option<i128> {
    Some(match value {
        ScalarValue::Int8(v) => *v as i128,
        ScalarValue::UInt8(v) => *v as i128,
        ScalarValue::Int16(v) => *v as i128,
        ScalarValue::UInt16(v) => *v as i128,
        ScalarValue::Int32(v) => *v as i128,
        ScalarValue::UInt32(v) => *v as i128,
        ScalarValue::Int64(v) => *v as i128,
        ScalarValue::UInt64(v) => *v as i128,
        _ => return None,
    })
}

/// Read any numeric value as an f64.
pub(crate) fn as_f64(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Float32(v) => Some(*v as f64),
        ScalarValue::Float64(v) => Some(*v),
        ScalarValue::Decimal(v) => v.to_f64(),
        other => as_i128(other).map(|v| v as f64),
    }
}

/// Read any numeric value as a decimal.
///
/// Non-finite floats and values outside the decimal range return `None`.
pub(crate) fn as_decimal(value: &ScalarValue) -> Option<Decimal> {
    match value {
        ScalarValue::Decimal(v) => Some(*v),
        ScalarValue::Float32(v) => Decimal::try_from(*v).ok(),
        ScalarValue::Float64(v) => Decimal::try_from(*v).ok(),
        other => {
            let v = as_i128(other)?;
            Decimal::try_from_i128_with_scale(v, 0).ok()
        }
    }
}

/// Build an integer scalar of type `datatype`, returning `None` if the value
/// doesn't fit.
pub(crate) fn int_from_i128(value: i128, datatype: &DataType) -> Option<ScalarValue> {
    Some(match datatype {
        DataType::Int8 => ScalarValue::Int8(i8::try_from(value).ok()?),
        DataType::UInt8 => ScalarValue::UInt8(u8::try_from(value).ok()?),
        DataType::Int16 => ScalarValue::Int16(i16::try_from(value).ok()?),
        DataType::UInt16 => ScalarValue::UInt16(u16::try_from(value).ok()?),
        DataType::Int32 => ScalarValue::Int32(i32::try_from(value).ok()?),
        DataType::UInt32 => ScalarValue::UInt32(u32::try_from(value).ok()?),
        DataType::Int64 => ScalarValue::Int64(i64::try_from(value).ok()?),
        DataType::UInt64 => ScalarValue::UInt64(u64::try_from(value).ok()?),
        _ => return None,
    })
}

/// Parse a trimmed string into a decimal, accepting scientific notation.
pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.contains(['e', 'E']) {
        Decimal::from_scientific(s).ok()
    } else {
        Decimal::from_str(s).ok()
    }
}

fn cast_error(value: &ScalarValue, to: &DataType) -> DbError {
    DbError::with_kind(ErrorKind::Cast, format!("Cannot cast '{value}' to {to}"))
}

/// Cast a value to some other type.
///
/// Integer targets are range checked. Floats are truncated toward zero when
/// cast to integers.
pub fn cast_scalar(value: &ScalarValue, to: &DataType) -> Result<ScalarValue> {
    if value.is_null() || to.is_any() || &value.datatype() == to {
        return Ok(value.clone());
    }

    let casted = match to {
        DataType::Null => None,
        DataType::Boolean => match value {
            ScalarValue::Boolean(v) => Some(ScalarValue::Boolean(*v)),
            ScalarValue::Utf8(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(ScalarValue::Boolean(true)),
                "false" => Some(ScalarValue::Boolean(false)),
                _ => None,
            },
            other => as_i128(other).map(|v| ScalarValue::Boolean(v != 0)),
        },
        to if to.is_integer() => {
            let v = match value {
                ScalarValue::Boolean(b) => Some(*b as i128),
                ScalarValue::Float32(_) | ScalarValue::Float64(_) => as_f64(value)
                    .filter(|f| f.is_finite())
                    .and_then(|f| {
                        let t = f.trunc();
                        // Outside of i128 range means outside of every target type.
                        if t.abs() < 1e38 { Some(t as i128) } else { None }
                    }),
                ScalarValue::Decimal(d) => d.trunc().to_i128(),
                ScalarValue::Utf8(s) => s.trim().parse::<i128>().ok(),
                other => as_i128(other),
            };
            v.and_then(|v| int_from_i128(v, to))
        }
        DataType::Float32 | DataType::Float64 => {
            let v = match value {
                ScalarValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
                ScalarValue::Utf8(s) => s.trim().parse::<f64>().ok(),
                other => as_f64(other),
            };
            v.map(|v| match to {
                DataType::Float32 => ScalarValue::Float32(v as f32),
                _ => ScalarValue::Float64(v),
            })
        }
        DataType::Decimal => match value {
            ScalarValue::Boolean(b) => Some(ScalarValue::Decimal(Decimal::from(*b as i64))),
            ScalarValue::Utf8(s) => parse_decimal(s).map(ScalarValue::Decimal),
            other => as_decimal(other).map(ScalarValue::Decimal),
        },
        DataType::Utf8 => Some(ScalarValue::Utf8(value.to_string())),
        DataType::List(_) => match value {
            ScalarValue::List(_) => Some(value.clone()),
            _ => None,
        },
        DataType::Struct(_) => match value {
            ScalarValue::Struct(_) => Some(value.clone()),
            _ => None,
        },
        _ => None,
    };

    casted.ok_or_else(|| cast_error(value, to))
}

/// If an explicit cast from `from` to `to` can ever succeed.
pub fn can_cast(from: &DataType, to: &DataType) -> bool {
    let scalar = |dt: &DataType| dt.is_numeric() || dt.is_utf8() || dt == &DataType::Boolean;

    match (from, to) {
        (DataType::Null, _) | (DataType::Any, _) | (_, DataType::Any) => true,
        (from, to) if from == to => true,
        (DataType::List(_), DataType::List(_)) => true,
        (DataType::Struct(_), DataType::Struct(_)) => true,
        (_, DataType::Utf8) => true,
        (from, to) => scalar(from) && scalar(to),
    }
}

/// If a value of type `from` may be passed where `to` is declared, e.g. as a
/// table method argument.
pub fn implicit_cast_allowed(from: &DataType, to: &DataType) -> bool {
    match (from, to) {
        (DataType::Null, _) | (DataType::Any, _) | (_, DataType::Any) => true,
        (from, to) if from == to => true,
        (from, to) => from.is_numeric() && to.is_numeric(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_int_range_checked() {
        let err = cast_scalar(&ScalarValue::Int64(300), &DataType::UInt8).unwrap_err();
        assert_eq!(ErrorKind::Cast, err.kind());

        let v = cast_scalar(&ScalarValue::Int64(200), &DataType::UInt8).unwrap();
        assert_eq!(ScalarValue::UInt8(200), v);
    }

    #[test]
    fn cast_string_to_numbers() {
        assert_eq!(
            ScalarValue::Int32(1500),
            cast_scalar(&ScalarValue::from(" 1500 "), &DataType::Int32).unwrap()
        );
        assert_eq!(
            ScalarValue::Decimal(Decimal::new(1005, 1)),
            cast_scalar(&ScalarValue::from("100.5"), &DataType::Decimal).unwrap()
        );
        assert!(cast_scalar(&ScalarValue::from("abc"), &DataType::Float64).is_err());
    }

    #[test]
    fn cast_float_truncates() {
        assert_eq!(
            ScalarValue::Int32(-3),
            cast_scalar(&ScalarValue::Float64(-3.9), &DataType::Int32).unwrap()
        );
        assert!(cast_scalar(&ScalarValue::Float64(f64::NAN), &DataType::Int32).is_err());
    }

    #[test]
    fn cast_to_string() {
        assert_eq!(
            ScalarValue::from("true"),
            cast_scalar(&ScalarValue::Boolean(true), &DataType::Utf8).unwrap()
        );
    }

    #[test]
    fn null_casts_to_anything() {
        assert_eq!(
            ScalarValue::Null,
            cast_scalar(&ScalarValue::Null, &DataType::Int8).unwrap()
        );
    }

    #[test]
    fn implicit_casts() {
        assert!(implicit_cast_allowed(&DataType::Int32, &DataType::Int64));
        assert!(implicit_cast_allowed(&DataType::Utf8, &DataType::Any));
        assert!(!implicit_cast_allowed(&DataType::Utf8, &DataType::Int64));
    }
}
