//! Numeric promotion and per-row value coercion.
//!
//! Every place that combines two values of possibly different types goes
//! through here: arithmetic, comparisons, join keys, set operation columns and
//! function arguments.

pub mod arith;
pub mod cast;
pub mod compare;
pub mod literal;

use crate::types::datatype::DataType;

/// Result type of combining two numeric types.
///
/// Returns `None` if either type isn't numeric.
///
/// The small integer types widen to `Int32` when combined with each other.
/// `UInt32` combined with `Int64` widens to `UInt64`, and `Decimal` wins over
/// everything else.
pub fn numeric_result_type(left: &DataType, right: &DataType) -> Option<DataType> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }

    let either = |dt: DataType| left == &dt || right == &dt;

    let dt = if either(DataType::Decimal) {
        DataType::Decimal
    } else if either(DataType::Float64) {
        DataType::Float64
    } else if either(DataType::Float32) {
        DataType::Float32
    } else if either(DataType::UInt64) {
        DataType::UInt64
    } else if either(DataType::UInt32) && either(DataType::Int64) {
        DataType::UInt64
    } else if either(DataType::Int64) {
        DataType::Int64
    } else if either(DataType::UInt32) {
        if either(DataType::Int32) {
            DataType::Int64
        } else {
            // UInt32 with itself or any of the small types.
            DataType::UInt32
        }
    } else {
        DataType::Int32
    };

    Some(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_types_widen_to_int32() {
        let small = [
            DataType::Int8,
            DataType::UInt8,
            DataType::Int16,
            DataType::UInt16,
            DataType::Int32,
        ];
        for left in &small {
            for right in &small {
                assert_eq!(
                    Some(DataType::Int32),
                    numeric_result_type(left, right),
                    "{left} + {right}"
                );
            }
        }
    }

    #[test]
    fn uint32_with_int64_is_uint64_both_orders() {
        assert_eq!(
            Some(DataType::UInt64),
            numeric_result_type(&DataType::UInt32, &DataType::Int64)
        );
        assert_eq!(
            Some(DataType::UInt64),
            numeric_result_type(&DataType::Int64, &DataType::UInt32)
        );
    }

    #[test]
    fn ubyte_with_long_is_long() {
        assert_eq!(
            Some(DataType::Int64),
            numeric_result_type(&DataType::UInt8, &DataType::Int64)
        );
    }

    #[test]
    fn uint32_with_small_types() {
        assert_eq!(
            Some(DataType::UInt32),
            numeric_result_type(&DataType::UInt16, &DataType::UInt32)
        );
        assert_eq!(
            Some(DataType::UInt32),
            numeric_result_type(&DataType::UInt32, &DataType::Int8)
        );
        assert_eq!(
            Some(DataType::Int64),
            numeric_result_type(&DataType::UInt32, &DataType::Int32)
        );
    }

    #[test]
    fn decimal_dominates() {
        for other in [
            DataType::Int8,
            DataType::UInt64,
            DataType::Float32,
            DataType::Float64,
            DataType::Decimal,
        ] {
            assert_eq!(
                Some(DataType::Decimal),
                numeric_result_type(&other, &DataType::Decimal)
            );
        }
    }

    #[test]
    fn floats() {
        assert_eq!(
            Some(DataType::Float32),
            numeric_result_type(&DataType::Int64, &DataType::Float32)
        );
        assert_eq!(
            Some(DataType::Float64),
            numeric_result_type(&DataType::Float32, &DataType::Float64)
        );
    }

    #[test]
    fn non_numeric() {
        assert_eq!(None, numeric_result_type(&DataType::Utf8, &DataType::Int32));
        assert_eq!(None, numeric_result_type(&DataType::Any, &DataType::Int32));
    }
}
