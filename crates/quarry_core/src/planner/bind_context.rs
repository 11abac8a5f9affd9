use quarry_error::{DbError, ErrorKind, Result};

use crate::ast::ColumnRef;
use crate::types::datatype::DataType;
use crate::util::suggest::did_you_mean;

/// A column visible to expressions at some point in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeColumn {
    /// Alias the column is bound under, if any.
    pub alias: Option<String>,
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

/// Result of resolving a column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub idx: usize,
    /// Property read off the column when the reference's qualifier turned out
    /// to be a column name.
    pub property: Option<String>,
}

/// Columns of the row expressions are bound against, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindScope {
    columns: Vec<ScopeColumn>,
}

impl BindScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the columns of one alias.
    pub fn push_alias<'a>(
        &mut self,
        alias: Option<&str>,
        columns: impl IntoIterator<Item = (&'a str, DataType, bool)>,
    ) {
        for (name, datatype, nullable) in columns {
            self.columns.push(ScopeColumn {
                alias: alias.map(|a| a.to_string()),
                name: name.to_string(),
                datatype,
                nullable,
            });
        }
    }

    pub fn push(&mut self, column: ScopeColumn) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[ScopeColumn] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&ScopeColumn> {
        self.columns.get(idx)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Mark every column from `start` on as nullable.
    pub fn make_nullable_from(&mut self, start: usize) {
        for col in self.columns.iter_mut().skip(start) {
            col.nullable = true;
        }
    }

    /// Mark every column before `end` as nullable.
    pub fn make_nullable_until(&mut self, end: usize) {
        for col in self.columns.iter_mut().take(end) {
            col.nullable = true;
        }
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(alias)))
    }

    /// Indices of the columns bound under `alias`.
    pub fn alias_columns(&self, alias: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(alias)))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Resolve a column reference.
    ///
    /// A qualifier that isn't a known alias is treated as an unqualified
    /// column, with the reference's name a property on that column.
    pub fn resolve(&self, col: &ColumnRef) -> Result<ResolvedColumn> {
        match &col.qualifier {
            Some(qualifier) if self.has_alias(qualifier) => {
                let candidates = self.alias_columns(qualifier);
                let found = candidates
                    .iter()
                    .copied()
                    .find(|&idx| self.columns[idx].name.eq_ignore_ascii_case(&col.name));
                match found {
                    Some(idx) => Ok(ResolvedColumn {
                        idx,
                        property: None,
                    }),
                    None => Err(self.unknown_column_error(
                        &col.to_string(),
                        &col.name,
                        candidates.iter().map(|&idx| self.columns[idx].name.as_str()),
                    )),
                }
            }
            Some(qualifier) => {
                let idx = self.resolve_unqualified(qualifier)?;
                Ok(ResolvedColumn {
                    idx,
                    property: Some(col.name.clone()),
                })
            }
            None => Ok(ResolvedColumn {
                idx: self.resolve_unqualified(&col.name)?,
                property: None,
            }),
        }
    }

    fn resolve_unqualified(&self, name: &str) -> Result<usize> {
        let matches: Vec<_> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(idx, _)| idx)
            .collect();

        match matches.as_slice() {
            [idx] => Ok(*idx),
            [] => Err(self.unknown_column_error(
                name,
                name,
                self.columns.iter().map(|c| c.name.as_str()),
            )),
            _ => {
                let aliases: Vec<_> = matches
                    .iter()
                    .filter_map(|&idx| self.columns[idx].alias.as_deref())
                    .collect();
                Err(DbError::with_kind(
                    ErrorKind::AmbiguousColumn,
                    format!(
                        "Column '{name}' is ambiguous, it exists in: {}",
                        aliases.join(", ")
                    ),
                )
                .with_field("column", name.to_string()))
            }
        }
    }

    fn unknown_column_error<'a>(
        &self,
        display: &str,
        name: &str,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> DbError {
        let msg = format!("Unknown column '{display}'");
        let msg = match did_you_mean(name, candidates) {
            Some(s) => format!("{msg}. Did you mean '{s}'?"),
            None => msg,
        };
        DbError::with_kind(ErrorKind::UnknownColumn, msg).with_field("column", display.to_string())
    }
}
