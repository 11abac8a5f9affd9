use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Broad classification of an error.
///
/// Hosts use the kind to decide how to report a failure. Kinds are split into
/// those raised while compiling a query (before any row is read) and those
/// raised while rows are being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A column reference could not be resolved.
    UnknownColumn,
    /// An unqualified column name matched columns from multiple aliases.
    AmbiguousColumn,
    UnknownFunction,
    UnknownSchema,
    UnknownMethod,
    UnknownCte,
    UnknownAlias,
    DuplicateAlias,
    DuplicateCte,
    /// An apply alias reused the name of a CTE in the same statement.
    AliasCollision,
    /// Wrong number of arguments to a function or table method.
    ArityMismatch,
    TypeMismatch,
    /// A column referenced after grouping is neither grouped nor aggregated.
    InvalidGroupReference,
    /// Set operation sides disagree on column count or key columns.
    SetOperationMismatch,
    /// A numeric literal does not fit its type.
    LiteralOverflow,
    NestedAggregate,
    InvalidArgument,
    /// Dereferenced a property through a null value.
    NullDereference,
    /// A value had a type its operation can't accept. Raised for weakly
    /// typed values, whose types are only known once rows are read.
    InvalidOperand,
    DivisionByZero,
    ArithmeticOverflow,
    Cast,
    /// A data source failed while producing rows.
    DataSource,
    Canceled,
    Internal,
}

impl ErrorKind {
    /// If this kind of error is raised during compilation.
    pub const fn is_compile_time(&self) -> bool {
        matches!(
            self,
            Self::UnknownColumn
                | Self::AmbiguousColumn
                | Self::UnknownFunction
                | Self::UnknownSchema
                | Self::UnknownMethod
                | Self::UnknownCte
                | Self::UnknownAlias
                | Self::DuplicateAlias
                | Self::DuplicateCte
                | Self::AliasCollision
                | Self::ArityMismatch
                | Self::TypeMismatch
                | Self::InvalidGroupReference
                | Self::SetOperationMismatch
                | Self::LiteralOverflow
                | Self::NestedAggregate
                | Self::InvalidArgument
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct DbError {
    inner: Box<DbErrorInner>,
}

struct DbErrorInner {
    msg: String,
    kind: ErrorKind,
    source: Option<Box<dyn Error + Send + Sync>>,
    fields: Vec<ErrorField>,
    backtrace: Backtrace,
}

struct ErrorField {
    key: Cow<'static, str>,
    value: String,
}

impl DbError {
    /// Create a new internal error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                msg: msg.into(),
                kind,
                source: None,
                fields: Vec::new(),
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a named value to the error, e.g. the identifier that failed to
    /// resolve.
    pub fn with_field(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.inner.fields.push(ErrorField {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn message(&self) -> &str {
        &self.inner.msg
    }

    /// Get the value of a field attached with `with_field`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;

        for field in &self.inner.fields {
            write!(f, "\n  {}: {}", field.key, field.value)?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self, self.inner.kind)?;

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace:\n{}", self.inner.backtrace)?;
        }

        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<fmt::Error> for DbError {
    fn from(value: fmt::Error) -> Self {
        DbError::with_source("Format error", Box::new(value))
    }
}

/// An extension trait for adding context to the Error variant of a result.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(DbError::with_source(f(), Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(DbError::new(format!("Missing required value: {msg}"))),
        }
    }
}

/// Return early with a "not implemented" error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        return Err($crate::DbError::new(format!("Not yet implemented: {}", format!($($arg)*))))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_retrievable() {
        let err = DbError::with_kind(ErrorKind::UnknownColumn, "Missing column 'nme'")
            .with_field("column", "nme");

        assert_eq!(ErrorKind::UnknownColumn, err.kind());
        assert_eq!(Some("nme"), err.field("column"));
        assert_eq!(None, err.field("function"));
        assert!(err.to_string().contains("column: nme"));
    }

    #[test]
    fn compile_time_kinds() {
        assert!(ErrorKind::LiteralOverflow.is_compile_time());
        assert!(ErrorKind::NestedAggregate.is_compile_time());
        assert!(ErrorKind::TypeMismatch.is_compile_time());
        assert!(!ErrorKind::InvalidOperand.is_compile_time());
        assert!(!ErrorKind::DivisionByZero.is_compile_time());
        assert!(!ErrorKind::Canceled.is_compile_time());
    }

    #[test]
    fn context_wraps_source() {
        let res: std::result::Result<i32, std::num::ParseIntError> = "abc".parse::<i32>();
        let err = res.context("failed to parse").unwrap_err();

        assert_eq!("failed to parse", err.message());
        assert!(err.source().is_some());
    }

    #[test]
    fn required_on_none() {
        let v: Option<i32> = None;
        let err = v.required("value").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
    }
}
