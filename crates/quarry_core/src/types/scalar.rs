use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use quarry_error::{DbError, ErrorKind, Result};
use rust_decimal::Decimal;

use super::datatype::DataType;

/// A single value.
///
/// Equality and hashing are structural: values of different variants are never
/// equal, even when they'd compare equal numerically. Callers that need
/// cross-type comparisons go through the coercion module.
#[derive(Debug, Clone)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Utf8(String),
    List(Arc<Vec<ScalarValue>>),
    Struct(Arc<StructValue>),
}

impl ScalarValue {
    pub fn list(values: impl IntoIterator<Item = ScalarValue>) -> Self {
        ScalarValue::List(Arc::new(values.into_iter().collect()))
    }

    /// Returns the type of this value.
    ///
    /// Lists and structs infer their element/field types from the values they
    /// hold. Lists holding mixed or no values are typed `List<Any>`.
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::UInt8(_) => DataType::UInt8,
            Self::Int16(_) => DataType::Int16,
            Self::UInt16(_) => DataType::UInt16,
            Self::Int32(_) => DataType::Int32,
            Self::UInt32(_) => DataType::UInt32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Decimal(_) => DataType::Decimal,
            Self::Utf8(_) => DataType::Utf8,
            Self::List(values) => {
                let mut element: Option<DataType> = None;
                for value in values.iter().filter(|v| !v.is_null()) {
                    let dt = value.datatype();
                    match &element {
                        Some(existing) if existing != &dt => return DataType::list(DataType::Any),
                        Some(_) => (),
                        None => element = Some(dt),
                    }
                }
                DataType::list(element.unwrap_or(DataType::Any))
            }
            Self::Struct(value) => value.datatype(),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(DbError::with_kind(
                ErrorKind::InvalidOperand,
                format!("Expected a boolean value, got {other}"),
            )),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(s) => Ok(s.as_str()),
            other => Err(DbError::with_kind(
                ErrorKind::InvalidOperand,
                format!("Expected a string value, got {other}"),
            )),
        }
    }

    /// Try to read this value as a signed 64-bit integer.
    pub fn try_as_i64(&self) -> Result<i64> {
        let v = match self {
            Self::Int8(v) => *v as i64,
            Self::UInt8(v) => *v as i64,
            Self::Int16(v) => *v as i64,
            Self::UInt16(v) => *v as i64,
            Self::Int32(v) => *v as i64,
            Self::UInt32(v) => *v as i64,
            Self::Int64(v) => *v,
            Self::UInt64(v) => i64::try_from(*v).map_err(|_| {
                DbError::with_kind(ErrorKind::Cast, format!("{v} does not fit in an Int64"))
            })?,
            other => {
                return Err(DbError::with_kind(
                    ErrorKind::InvalidOperand,
                    format!("Expected an integer value, got {other}"),
                ));
            }
        };
        Ok(v)
    }

    /// Returns `Some` if this value is truthy in a filter context.
    ///
    /// Only `true` passes a filter, nulls and `false` do not.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Boolean(true))
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::UInt8(a), Self::UInt8(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::UInt16(a), Self::UInt16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => {
                normalized_f32_bits(*a) == normalized_f32_bits(*b)
            }
            (Self::Float64(a), Self::Float64(b)) => {
                normalized_f64_bits(*a) == normalized_f64_bits(*b)
            }
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => (),
            Self::Boolean(v) => v.hash(state),
            Self::Int8(v) => v.hash(state),
            Self::UInt8(v) => v.hash(state),
            Self::Int16(v) => v.hash(state),
            Self::UInt16(v) => v.hash(state),
            Self::Int32(v) => v.hash(state),
            Self::UInt32(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::UInt64(v) => v.hash(state),
            Self::Float32(v) => normalized_f32_bits(*v).hash(state),
            Self::Float64(v) => normalized_f64_bits(*v).hash(state),
            Self::Decimal(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::List(v) => v.hash(state),
            Self::Struct(v) => v.hash(state),
        }
    }
}

/// Bits for a float with -0.0 folded into 0.0 and all NaNs folded together.
fn normalized_f64_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

fn normalized_f32_bits(v: f32) -> u32 {
    if v == 0.0 {
        0.0f32.to_bits()
    } else if v.is_nan() {
        f32::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Struct(value) => write!(f, "{value}"),
        }
    }
}

/// A weakly typed record: an ordered map of field names to values.
///
/// Field lookups ignore ASCII case. The declared type of a struct column lives
/// on the column's `DataType`; values built without one infer their type from
/// their fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructValue {
    fields: Vec<(String, ScalarValue)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Infer a struct type from the held values. Null fields are typed `Any`.
    pub fn datatype(&self) -> DataType {
        DataType::struct_type(self.fields.iter().map(|(name, value)| {
            let dt = match value.datatype() {
                DataType::Null => DataType::Any,
                other => other,
            };
            (name.clone(), dt)
        }))
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

macro_rules! impl_from_primitive {
    ($prim:ty, $variant:ident) => {
        impl From<$prim> for ScalarValue {
            fn from(value: $prim) -> Self {
                ScalarValue::$variant(value)
            }
        }
    };
}

impl_from_primitive!(bool, Boolean);
impl_from_primitive!(i8, Int8);
impl_from_primitive!(u8, UInt8);
impl_from_primitive!(i16, Int16);
impl_from_primitive!(u16, UInt16);
impl_from_primitive!(i32, Int32);
impl_from_primitive!(u32, UInt32);
impl_from_primitive!(i64, Int64);
impl_from_primitive!(u64, UInt64);
impl_from_primitive!(f32, Float32);
impl_from_primitive!(f64, Float64);
impl_from_primitive!(Decimal, Decimal);
impl_from_primitive!(String, Utf8);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<StructValue> for ScalarValue {
    fn from(value: StructValue) -> Self {
        ScalarValue::Struct(Arc::new(value))
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => ScalarValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of(v: &ScalarValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn negative_zero_equals_zero() {
        let a = ScalarValue::Float64(0.0);
        let b = ScalarValue::Float64(-0.0);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_variants_not_equal() {
        assert_ne!(ScalarValue::Int32(1), ScalarValue::Int64(1));
    }

    #[test]
    fn list_datatype_inference() {
        let list = ScalarValue::list([ScalarValue::Int32(1), ScalarValue::Null]);
        assert_eq!(DataType::list(DataType::Int32), list.datatype());

        let mixed = ScalarValue::list([ScalarValue::Int32(1), ScalarValue::from("a")]);
        assert_eq!(DataType::list(DataType::Any), mixed.datatype());
    }

    #[test]
    fn struct_field_replace() {
        let s = StructValue::new()
            .with_field("Name", "a")
            .with_field("name", "b");
        assert_eq!(1, s.len());
        assert_eq!(Some(&ScalarValue::from("b")), s.get("NAME"));
    }
}
