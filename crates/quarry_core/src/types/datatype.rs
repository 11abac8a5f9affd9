use std::fmt;

/// A named field inside a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub datatype: DataType,
}

/// Metadata associated with structs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructTypeMeta {
    pub fields: Vec<StructField>,
}

impl StructTypeMeta {
    /// Find a field by name, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Metadata associated with lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListTypeMeta {
    pub datatype: Box<DataType>,
}

/// Supported data types.
///
/// Nullability is not part of the type, it's tracked next to it on columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Type of a bare NULL literal.
    Null,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Utf8,
    /// Object typed values, the concrete type is only known per row.
    Any,
    List(ListTypeMeta),
    Struct(StructTypeMeta),
}

impl DataType {
    pub fn list(element: DataType) -> Self {
        DataType::List(ListTypeMeta {
            datatype: Box::new(element),
        })
    }

    pub fn struct_type<S>(fields: impl IntoIterator<Item = (S, DataType)>) -> Self
    where
        S: Into<String>,
    {
        DataType::Struct(StructTypeMeta {
            fields: fields
                .into_iter()
                .map(|(name, datatype)| StructField {
                    name: name.into(),
                    datatype,
                })
                .collect(),
        })
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Self::Decimal)
    }

    pub const fn is_utf8(&self) -> bool {
        matches!(self, Self::Utf8)
    }

    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the element type if this is a list.
    pub fn list_element(&self) -> Option<&DataType> {
        match self {
            Self::List(meta) => Some(meta.datatype.as_ref()),
            _ => None,
        }
    }

    /// Get the type of a struct field.
    pub fn struct_field(&self, name: &str) -> Option<&DataType> {
        match self {
            Self::Struct(meta) => meta.field(name).map(|f| &f.datatype),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::Int16 => write!(f, "Int16"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::Int32 => write!(f, "Int32"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::Decimal => write!(f, "Decimal"),
            Self::Utf8 => write!(f, "Utf8"),
            Self::Any => write!(f, "Any"),
            Self::List(meta) => write!(f, "List<{}>", meta.datatype),
            Self::Struct(meta) => {
                write!(f, "Struct{{")?;
                for (idx, field) in meta.fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.datatype)?;
                }
                write!(f, "}}")
            }
        }
    }
}
