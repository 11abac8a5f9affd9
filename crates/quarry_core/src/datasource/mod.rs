//! Contract between the engine and the providers of rows.
//!
//! A data source is a named provider (referenced in queries as `#name`)
//! exposing table-valued methods. Each method yields records of a declared
//! row type. A row type may declare table-valued members, enumerable by an
//! apply over an alias of that row type.

pub mod memory;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use quarry_error::{DbError, ErrorKind, Result};

use crate::ast::Expr;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;
use crate::util::suggest::did_you_mean;

/// A scalar column of a row type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

/// A table-valued member of a row type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMemberDef {
    pub name: String,
    /// Name of the row type of the member's records. May be the declaring
    /// row type itself.
    pub row_type: String,
}

/// Shape of records produced by a method or member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowType {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub table_members: Vec<TableMemberDef>,
}

impl RowType {
    pub fn new(name: impl Into<String>) -> Self {
        RowType {
            name: name.into(),
            columns: Vec::new(),
            table_members: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, datatype: DataType, nullable: bool) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            datatype,
            nullable,
        });
        self
    }

    pub fn with_table_member(mut self, name: impl Into<String>, row_type: impl Into<String>) -> Self {
        self.table_members.push(TableMemberDef {
            name: name.into(),
            row_type: row_type.into(),
        });
        self
    }

    pub fn table_member(&self, name: &str) -> Option<&TableMemberDef> {
        self.table_members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// A record produced by a data source.
pub trait SourceRow: Debug + Send + Sync {
    /// Values in the order of the row type's columns.
    fn values(&self) -> &[ScalarValue];

    /// Access to the record's table-valued members, if it has any.
    fn table_valued(&self) -> Option<&dyn TableValued> {
        None
    }
}

/// Capability of a record to enumerate its table-valued members.
pub trait TableValued: Debug + Send + Sync {
    fn member_rows(&self, member: &str) -> Result<Vec<Arc<dyn SourceRow>>>;
}

pub type RecordStream = Box<dyn Iterator<Item = Result<Arc<dyn SourceRow>>> + Send>;

/// Hints passed to a method when it's scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHints {
    /// Alias the method is bound to in the query.
    pub alias: String,
    /// Filter the source may apply to skip records early.
    ///
    /// Conjuncts the source isn't expected to evaluate are replaced with
    /// `true`. The engine always re-applies the full predicate on returned
    /// records, so applying this is optional.
    pub filter: Option<Expr>,
}

impl ScanHints {
    pub fn new(alias: impl Into<String>) -> Self {
        ScanHints {
            alias: alias.into(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameter {
    pub name: String,
    pub datatype: DataType,
}

/// A parameterized table-valued method of a data source.
pub trait TableMethod: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn parameters(&self) -> &[MethodParameter];

    /// Name of the row type of the produced records.
    fn row_type(&self) -> &str;

    /// Produce the records for one invocation.
    ///
    /// Arguments have already been checked against and cast to the declared
    /// parameter types.
    fn scan(&self, args: &[ScalarValue], hints: &ScanHints) -> Result<RecordStream>;
}

pub trait DataSource: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn method(&self, name: &str) -> Option<Arc<dyn TableMethod>>;

    fn method_names(&self) -> Vec<String>;

    fn row_type(&self, name: &str) -> Option<&RowType>;
}

/// Data sources available to a query.
#[derive(Debug, Default, Clone)]
pub struct DataSourceRegistry {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn DataSource>) -> Result<()> {
        let key = source.name().to_ascii_lowercase();
        if self.sources.contains_key(&key) {
            return Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("Data source '{}' already registered", source.name()),
            )
            .with_field("schema", source.name()));
        }
        self.sources.insert(key, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DataSource>> {
        self.sources.get(&name.to_ascii_lowercase())
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.values().map(|s| s.name())
    }

    /// Get a source, erroring with a suggestion if it doesn't exist.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn DataSource>> {
        self.get(name).ok_or_else(|| {
            let msg = format!("Unknown schema '{name}'");
            let msg = match did_you_mean(name, self.source_names()) {
                Some(s) => format!("{msg}. Did you mean '{s}'?"),
                None => msg,
            };
            DbError::with_kind(ErrorKind::UnknownSchema, msg).with_field("schema", name)
        })
    }

    /// Get a method on a source, erroring with a suggestion if it doesn't
    /// exist.
    pub fn resolve_method(&self, schema: &str, method: &str) -> Result<Arc<dyn TableMethod>> {
        let source = self.resolve(schema)?;
        source.method(method).ok_or_else(|| {
            let msg = format!("Unknown method '{method}' on schema '{}'", source.name());
            let names = source.method_names();
            let msg = match did_you_mean(method, names.iter().map(|s| s.as_str())) {
                Some(s) => format!("{msg}. Did you mean '{s}'?"),
                None => msg,
            };
            DbError::with_kind(ErrorKind::UnknownMethod, msg)
                .with_field("schema", source.name())
                .with_field("method", method)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryDataSource, MemoryMethod};
    use super::*;

    fn registry() -> DataSourceRegistry {
        let source = MemoryDataSource::new("Geo")
            .with_row_type(RowType::new("Country").with_column("Name", DataType::Utf8, false))
            .with_method(MemoryMethod::new_static("Countries", "Country", Vec::new()));
        let mut registry = DataSourceRegistry::new();
        registry.register(Arc::new(source)).unwrap();
        registry
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(MemoryDataSource::new("geo")))
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
    }

    #[test]
    fn unknown_schema_suggestion() {
        let err = registry().resolve("Goe").unwrap_err();
        assert_eq!(ErrorKind::UnknownSchema, err.kind());
        assert_eq!(Some("Goe"), err.field("schema"));
        assert!(err.message().contains("Did you mean 'Geo'"), "{}", err.message());
    }

    #[test]
    fn unknown_method() {
        let err = registry().resolve_method("geo", "Countrys").unwrap_err();
        assert_eq!(ErrorKind::UnknownMethod, err.kind());
        assert_eq!(Some("Countrys"), err.field("method"));
        assert!(err.message().contains("Countries"));
    }

    #[test]
    fn method_lookup_ignores_case() {
        let method = registry().resolve_method("GEO", "countries").unwrap();
        assert_eq!("Countries", method.name());
    }
}
