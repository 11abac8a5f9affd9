use std::fmt;

use quarry_error::{DbError, Result};

use super::row::Row;
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

/// An output column.
///
/// Equality compares name and type only, so a column is the same column
/// regardless of where it's projected or whether a join made it nullable.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub ordinal: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: DataType, nullable: bool, ordinal: usize) -> Self {
        Column {
            name: name.into(),
            datatype,
            nullable,
            ordinal,
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.datatype == other.datatype
    }
}

impl Eq for Column {}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Table {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Find a column by name, ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Append a row. The row must have a value for every column.
    pub fn push(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::new(format!(
                "Row has {} values, table '{}' has {} columns",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// If a row with equal values exists in the table.
    pub fn contains(&self, row: &Row) -> bool {
        self.rows.iter().any(|r| r == row)
    }

    /// Get a single value by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&ScalarValue> {
        let col = self.column(column)?;
        self.rows.get(row)?.value(col.ordinal)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>> {
        let col = self
            .column(column)
            .ok_or_else(|| DbError::new(format!("Missing column '{column}' in table")))?;
        Ok(self
            .rows
            .iter()
            .map(|r| r.value(col.ordinal).cloned().unwrap_or(ScalarValue::Null))
            .collect())
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(f, "{}", names.join("\t"))?;
        for row in &self.rows {
            let values: Vec<_> = row.values().iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", values.join("\t"))?;
        }
        Ok(())
    }
}
