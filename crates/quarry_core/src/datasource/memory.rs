//! In-memory data source.
//!
//! Used by hosts that already have their data in memory and throughout the
//! tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use quarry_error::{DbError, ErrorKind, Result};

use super::{
    DataSource,
    MethodParameter,
    RecordStream,
    RowType,
    ScanHints,
    SourceRow,
    TableMethod,
    TableValued,
};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// A record held in memory, optionally with table-valued members.
#[derive(Debug, Clone, Default)]
pub struct MemoryRow {
    values: Vec<ScalarValue>,
    members: HashMap<String, Vec<Arc<dyn SourceRow>>>,
}

impl MemoryRow {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        MemoryRow {
            values,
            members: HashMap::new(),
        }
    }

    pub fn with_member(mut self, name: &str, rows: Vec<MemoryRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| Arc::new(r) as Arc<dyn SourceRow>)
            .collect();
        self.members.insert(name.to_ascii_lowercase(), rows);
        self
    }

    pub fn into_source_row(self) -> Arc<dyn SourceRow> {
        Arc::new(self)
    }
}

impl SourceRow for MemoryRow {
    fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    fn table_valued(&self) -> Option<&dyn TableValued> {
        Some(self)
    }
}

impl TableValued for MemoryRow {
    fn member_rows(&self, member: &str) -> Result<Vec<Arc<dyn SourceRow>>> {
        // Members that were never populated are empty.
        Ok(self
            .members
            .get(&member.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

type RowGenerator = dyn Fn(&[ScalarValue]) -> Result<Vec<MemoryRow>> + Send + Sync;

enum MethodRows {
    Static(Vec<Arc<dyn SourceRow>>),
    Generated(Box<RowGenerator>),
}

impl fmt::Debug for MethodRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(rows) => f.debug_tuple("Static").field(&rows.len()).finish(),
            Self::Generated(_) => f.debug_tuple("Generated").finish(),
        }
    }
}

/// A table method backed by memory.
///
/// Every scan records the hints it received, letting callers observe what was
/// pushed down.
#[derive(Debug)]
pub struct MemoryMethod {
    name: String,
    row_type: String,
    parameters: Vec<MethodParameter>,
    rows: MethodRows,
    received_hints: Mutex<Vec<ScanHints>>,
}

impl MemoryMethod {
    /// A method without parameters always returning the same rows.
    pub fn new_static(name: impl Into<String>, row_type: impl Into<String>, rows: Vec<MemoryRow>) -> Self {
        MemoryMethod {
            name: name.into(),
            row_type: row_type.into(),
            parameters: Vec::new(),
            rows: MethodRows::Static(rows.into_iter().map(MemoryRow::into_source_row).collect()),
            received_hints: Mutex::new(Vec::new()),
        }
    }

    /// A parameterized method computing its rows from the arguments.
    pub fn new_generated<F>(
        name: impl Into<String>,
        row_type: impl Into<String>,
        parameters: impl IntoIterator<Item = (&'static str, DataType)>,
        generator: F,
    ) -> Self
    where
        F: Fn(&[ScalarValue]) -> Result<Vec<MemoryRow>> + Send + Sync + 'static,
    {
        MemoryMethod {
            name: name.into(),
            row_type: row_type.into(),
            parameters: parameters
                .into_iter()
                .map(|(name, datatype)| MethodParameter {
                    name: name.to_string(),
                    datatype,
                })
                .collect(),
            rows: MethodRows::Generated(Box::new(generator)),
            received_hints: Mutex::new(Vec::new()),
        }
    }

    /// Hints received by every scan so far, in order.
    pub fn received_hints(&self) -> Vec<ScanHints> {
        self.received_hints.lock().clone()
    }

    pub fn num_scans(&self) -> usize {
        self.received_hints.lock().len()
    }
}

impl TableMethod for MemoryMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[MethodParameter] {
        &self.parameters
    }

    fn row_type(&self) -> &str {
        &self.row_type
    }

    fn scan(&self, args: &[ScalarValue], hints: &ScanHints) -> Result<RecordStream> {
        self.received_hints.lock().push(hints.clone());

        let rows = match &self.rows {
            MethodRows::Static(rows) => rows.clone(),
            MethodRows::Generated(generator) => generator(args)
                .map_err(|e| {
                    DbError::with_kind(
                        ErrorKind::DataSource,
                        format!("Method '{}' failed: {}", self.name, e.message()),
                    )
                })?
                .into_iter()
                .map(MemoryRow::into_source_row)
                .collect(),
        };

        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

/// A data source holding its methods and row types in memory.
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    name: String,
    methods: IndexMap<String, Arc<MemoryMethod>>,
    row_types: HashMap<String, RowType>,
}

impl MemoryDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryDataSource {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_row_type(mut self, row_type: RowType) -> Self {
        self.row_types
            .insert(row_type.name.to_ascii_lowercase(), row_type);
        self
    }

    pub fn with_method(mut self, method: MemoryMethod) -> Self {
        self.methods
            .insert(method.name.to_ascii_lowercase(), Arc::new(method));
        self
    }

    /// Get the concrete method, e.g. to inspect received hints.
    pub fn memory_method(&self, name: &str) -> Option<Arc<MemoryMethod>> {
        self.methods.get(&name.to_ascii_lowercase()).cloned()
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn method(&self, name: &str) -> Option<Arc<dyn TableMethod>> {
        self.memory_method(name)
            .map(|m| m as Arc<dyn TableMethod>)
    }

    fn method_names(&self) -> Vec<String> {
        self.methods.values().map(|m| m.name.clone()).collect()
    }

    fn row_type(&self, name: &str) -> Option<&RowType> {
        self.row_types.get(&name.to_ascii_lowercase())
    }
}
