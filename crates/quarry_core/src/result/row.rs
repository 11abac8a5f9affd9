use std::hash::{Hash, Hasher};
use std::sync::Arc;

use quarry_error::{DbError, Result};

use crate::datasource::SourceRow;
use crate::types::scalar::ScalarValue;

/// Provenance for one alias in a row. `None` when the alias was null padded
/// or its values didn't come from a source record.
pub type RowContext = Option<Arc<dyn SourceRow>>;

/// A fixed length sequence of values.
///
/// Rows flowing out of the FROM clause additionally carry one context per
/// alias, the source record the alias' values were read from. Later apply
/// stages use these to reach table-valued members of earlier aliases.
///
/// Equality and hashing only consider values.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<ScalarValue>,
    contexts: Option<Vec<RowContext>>,
}

impl Row {
    /// Create a row without any provenance.
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Row {
            values,
            contexts: None,
        }
    }

    /// Create a row with provenance. At least one context must be provided.
    pub fn try_with_contexts(values: Vec<ScalarValue>, contexts: Vec<RowContext>) -> Result<Self> {
        if contexts.is_empty() {
            return Err(DbError::new(
                "Cannot create a row with an empty context list",
            ));
        }
        Ok(Row {
            values,
            contexts: Some(contexts),
        })
    }

    /// A row of `width` nulls with `num_contexts` empty contexts.
    pub fn null_padded(width: usize, num_contexts: usize) -> Self {
        Row {
            values: vec![ScalarValue::Null; width],
            contexts: Some(vec![None; num_contexts.max(1)]),
        }
    }

    /// Concatenate two rows.
    ///
    /// Contexts are concatenated as well. A side without provenance
    /// contributes a single empty context. Errors if neither side has
    /// provenance.
    pub fn try_join(left: &Row, right: &Row) -> Result<Row> {
        let contexts = match (&left.contexts, &right.contexts) {
            (None, None) => {
                return Err(DbError::new(
                    "Cannot join two rows that both lack provenance",
                ));
            }
            (Some(l), Some(r)) => l.iter().chain(r.iter()).cloned().collect(),
            (Some(l), None) => l.iter().cloned().chain([None]).collect(),
            (None, Some(r)) => [None].into_iter().chain(r.iter().cloned()).collect(),
        };

        let mut values = Vec::with_capacity(left.values.len() + right.values.len());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);

        Ok(Row {
            values,
            contexts: Some(contexts),
        })
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<ScalarValue> {
        self.values
    }

    pub fn value(&self, idx: usize) -> Option<&ScalarValue> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contexts(&self) -> Option<&[RowContext]> {
        self.contexts.as_deref()
    }

    /// Get the source record for the alias at `idx`, if there is one.
    pub fn context(&self, idx: usize) -> Option<&Arc<dyn SourceRow>> {
        self.contexts.as_ref()?.get(idx)?.as_ref()
    }

    /// Keep only the first `len` values. Contexts are dropped since the row no
    /// longer corresponds to the aliases.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
        self.contexts = None;
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state)
    }
}

impl From<Vec<ScalarValue>> for Row {
    fn from(values: Vec<ScalarValue>) -> Self {
        Row::new(values)
    }
}
