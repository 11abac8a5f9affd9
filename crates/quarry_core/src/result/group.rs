use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use quarry_error::{DbError, Result};

use super::row::Row;
use crate::functions::aggregate::AggregateState;
use crate::types::scalar::ScalarValue;

/// Values of the grouping expressions for one group.
///
/// Keys of different arity are never equal. This holds for both `==` and
/// [`GroupKey::try_eq`], neither of which errors on mismatched arity.
#[derive(Debug, Clone, Eq)]
pub struct GroupKey {
    values: Vec<ScalarValue>,
}

impl GroupKey {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        GroupKey { values }
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_null(&self) -> bool {
        self.values.iter().any(|v| v.is_null())
    }

    /// Typed comparison of two keys.
    ///
    /// Returns `Ok(false)` for keys of different arity.
    pub fn try_eq(&self, other: &GroupKey) -> Result<bool> {
        if self.values.len() != other.values.len() {
            return Ok(false);
        }
        Ok(self.values == other.values)
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len() && self.values == other.values
    }
}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, value) in self.values.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Maps names of grouped and aggregated outputs to their ordinal in a group
/// row.
///
/// Ordinals below the number of grouping expressions refer to key values,
/// the rest to aggregate states in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupLayout {
    ordinals: IndexMap<String, usize>,
    width: usize,
}

impl GroupLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name. Later duplicates of a name are ignored so lookups resolve to
    /// the first ordinal.
    pub fn push(&mut self, name: impl Into<String>) -> usize {
        let ordinal = self.width;
        self.width += 1;
        let name = name.into().to_ascii_lowercase();
        self.ordinals.entry(name).or_insert(ordinal);
        ordinal
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }
}

/// Accumulated state for a single group.
#[derive(Debug)]
pub struct Group {
    key: GroupKey,
    states: Vec<Box<dyn AggregateState>>,
}

impl Group {
    pub fn new(key: GroupKey, states: Vec<Box<dyn AggregateState>>) -> Self {
        Group { key, states }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Feed one input value to each aggregate.
    pub fn update(&mut self, inputs: &[ScalarValue]) -> Result<()> {
        if inputs.len() != self.states.len() {
            return Err(DbError::new(format!(
                "Expected {} aggregate inputs, got {}",
                self.states.len(),
                inputs.len()
            )));
        }
        for (state, input) in self.states.iter_mut().zip(inputs) {
            state.update(input)?;
        }
        Ok(())
    }

    /// Current value of the aggregate at `idx`.
    pub fn aggregate_value(&self, idx: usize) -> Result<ScalarValue> {
        self.states
            .get(idx)
            .ok_or_else(|| DbError::new(format!("Missing aggregate state {idx}")))?
            .finalize()
    }

    pub fn num_aggregates(&self) -> usize {
        self.states.len()
    }
}

/// A group viewed as a row through a layout.
#[derive(Debug)]
pub struct GroupRow<'a> {
    group: &'a Group,
    layout: &'a GroupLayout,
}

impl<'a> GroupRow<'a> {
    pub fn new(group: &'a Group, layout: &'a GroupLayout) -> Self {
        GroupRow { group, layout }
    }

    fn value_at(&self, ordinal: usize) -> Result<ScalarValue> {
        let num_keys = self.group.key.len();
        if ordinal < num_keys {
            Ok(self.group.key.values[ordinal].clone())
        } else {
            self.group.aggregate_value(ordinal - num_keys)
        }
    }

    /// Get a value by output name.
    pub fn get(&self, name: &str) -> Result<ScalarValue> {
        let ordinal = self
            .layout
            .ordinal(name)
            .ok_or_else(|| DbError::new(format!("Missing '{name}' in group layout")))?;
        self.value_at(ordinal)
    }

    /// Materialize the group as an ordinary row: key values followed by
    /// aggregate results.
    pub fn to_row(&self) -> Result<Row> {
        let width = self.group.key.len() + self.group.num_aggregates();
        let values = (0..width)
            .map(|ordinal| self.value_at(ordinal))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(values))
    }
}

impl TryFrom<GroupRow<'_>> for Row {
    type Error = DbError;

    fn try_from(value: GroupRow<'_>) -> Result<Self> {
        value.to_row()
    }
}
