use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::cast::{int_from_i128, parse_decimal};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

fn overflow(text: &str, datatype: &DataType) -> DbError {
    DbError::with_kind(
        ErrorKind::LiteralOverflow,
        format!("Literal '{text}' is out of range for {datatype}"),
    )
}

fn invalid(text: &str) -> DbError {
    DbError::with_kind(
        ErrorKind::InvalidArgument,
        format!("Invalid numeric literal '{text}'"),
    )
}

/// Parse an integer literal.
///
/// Accepts decimal, hex (`0x`), binary (`0b`) and octal (`0o`) forms, with the
/// prefix and digits case-insensitive. Anything whose magnitude exceeds the
/// signed 64-bit range is rejected regardless of the declared type.
///
/// Without a declared type, literals that fit in an `Int32` are typed as such,
/// otherwise `Int64`.
pub fn parse_integer_literal(text: &str, declared: Option<&DataType>) -> Result<ScalarValue> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else {
        (10, lower.as_str())
    };

    if digits.is_empty() {
        return Err(invalid(text));
    }

    let magnitude = match u128::from_str_radix(digits, radix) {
        Ok(v) => v,
        Err(e) => {
            // Digits are valid, just too many of them.
            if digits.chars().all(|c| c.is_digit(radix)) {
                return Err(overflow(text, &DataType::Int64));
            }
            return Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("Invalid numeric literal '{text}': {e}"),
            ));
        }
    };

    let limit = if negative {
        i64::MAX as u128 + 1
    } else {
        i64::MAX as u128
    };
    if magnitude > limit {
        return Err(overflow(text, &DataType::Int64));
    }

    let value = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };

    match declared {
        None => Ok(int_from_i128(value, &DataType::Int32)
            .or_else(|| int_from_i128(value, &DataType::Int64))
            .ok_or_else(|| overflow(text, &DataType::Int64))?),
        Some(dt) if dt.is_integer() => {
            int_from_i128(value, dt).ok_or_else(|| overflow(text, dt))
        }
        Some(DataType::Float32) => Ok(ScalarValue::Float32(value as f32)),
        Some(DataType::Float64) => Ok(ScalarValue::Float64(value as f64)),
        Some(DataType::Decimal) => Ok(ScalarValue::Decimal(Decimal::from_i128_with_scale(value, 0))),
        Some(other) => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("Integer literal '{text}' cannot be typed as {other}"),
        )),
    }
}

/// Parse a literal with a fractional part or exponent.
///
/// Typed as `Decimal` unless declared as a float.
pub fn parse_decimal_literal(text: &str, declared: Option<&DataType>) -> Result<ScalarValue> {
    match declared {
        Some(DataType::Float32) | Some(DataType::Float64) => {
            let v: f64 = text.trim().parse().map_err(|_| invalid(text))?;
            if !v.is_finite() {
                return Err(overflow(text, declared.unwrap_or(&DataType::Float64)));
            }
            Ok(match declared {
                Some(DataType::Float32) => ScalarValue::Float32(v as f32),
                _ => ScalarValue::Float64(v),
            })
        }
        None | Some(DataType::Decimal) => {
            let valid = text
                .trim()
                .trim_start_matches(['-', '+'])
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'));
            if !valid {
                return Err(invalid(text));
            }
            parse_decimal(text)
                .map(ScalarValue::Decimal)
                .ok_or_else(|| overflow(text, &DataType::Decimal))
        }
        Some(other) => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("Decimal literal '{text}' cannot be typed as {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_prefixes_case_insensitive() {
        let cases = [
            ("0x1F", 31),
            ("0X1f", 31),
            ("0b101", 5),
            ("0B101", 5),
            ("0o17", 15),
            ("0O17", 15),
            ("42", 42),
        ];
        for (text, expected) in cases {
            assert_eq!(
                ScalarValue::Int32(expected),
                parse_integer_literal(text, None).unwrap(),
                "{text}"
            );
        }
    }

    #[test]
    fn untyped_widens_to_int64() {
        assert_eq!(
            ScalarValue::Int64(5_000_000_000),
            parse_integer_literal("5000000000", None).unwrap()
        );
        assert_eq!(
            ScalarValue::Int64(i64::MIN),
            parse_integer_literal("-9223372036854775808", None).unwrap()
        );
    }

    #[test]
    fn overflow_per_base() {
        for text in [
            "9223372036854775808",
            "0x8000000000000000",
            "0b1000000000000000000000000000000000000000000000000000000000000000",
            "0o1000000000000000000000",
            "0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        ] {
            let err = parse_integer_literal(text, None).unwrap_err();
            assert_eq!(ErrorKind::LiteralOverflow, err.kind(), "{text}");
        }
    }

    #[test]
    fn max_fits() {
        assert_eq!(
            ScalarValue::Int64(i64::MAX),
            parse_integer_literal("0x7fffffffffffffff", None).unwrap()
        );
    }

    #[test]
    fn typed_literal_range() {
        assert_eq!(
            ScalarValue::UInt8(255),
            parse_integer_literal("255", Some(&DataType::UInt8)).unwrap()
        );
        let err = parse_integer_literal("256", Some(&DataType::UInt8)).unwrap_err();
        assert_eq!(ErrorKind::LiteralOverflow, err.kind());
    }

    #[test]
    fn invalid_digits() {
        let err = parse_integer_literal("0x", None).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        let err = parse_integer_literal("0b102", None).unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn decimal_literals() {
        assert_eq!(
            ScalarValue::Decimal(Decimal::new(1005, 1)),
            parse_decimal_literal("100.5", None).unwrap()
        );
        assert_eq!(
            ScalarValue::Float64(1.5),
            parse_decimal_literal("1.5", Some(&DataType::Float64)).unwrap()
        );
    }
}
