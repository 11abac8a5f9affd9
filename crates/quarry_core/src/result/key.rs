use quarry_error::{DbError, Result};

use super::row::Row;
use crate::types::scalar::ScalarValue;

/// Values selected from a row along with the indices they were read from.
///
/// Used for join lookups and set operation de-duplication. Equality covers
/// both the values and the indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    values: Vec<ScalarValue>,
    columns: Vec<usize>,
}

impl Key {
    pub fn new(values: Vec<ScalarValue>, columns: Vec<usize>) -> Self {
        debug_assert_eq!(values.len(), columns.len());
        Key { values, columns }
    }

    /// Read the key columns out of a row.
    pub fn try_from_row(row: &Row, columns: &[usize]) -> Result<Self> {
        let values = columns
            .iter()
            .map(|&idx| {
                row.value(idx).cloned().ok_or_else(|| {
                    DbError::new(format!(
                        "Key column {idx} out of range for row with {} values",
                        row.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Key {
            values,
            columns: columns.to_vec(),
        })
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn has_null(&self) -> bool {
        self.values.iter().any(|v| v.is_null())
    }

    /// Check if the row holds this key's values at this key's indices.
    pub fn matches(&self, row: &Row) -> bool {
        self.columns
            .iter()
            .zip(&self.values)
            .all(|(&idx, value)| row.value(idx) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_rereads_row() {
        let row = Row::new(vec!["001".into(), 5.into(), "x".into()]);
        let key = Key::try_from_row(&row, &[0, 2]).unwrap();

        assert!(key.matches(&row));
        assert!(key.matches(&Row::new(vec!["001".into(), 6.into(), "x".into()])));
        assert!(!key.matches(&Row::new(vec!["002".into(), 5.into(), "x".into()])));
    }

    #[test]
    fn indices_are_part_of_identity() {
        let a = Key::new(vec![1.into()], vec![0]);
        let b = Key::new(vec![1.into()], vec![1]);
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range() {
        let row = Row::new(vec![1.into()]);
        assert!(Key::try_from_row(&row, &[3]).is_err());
    }
}
