use quarry_error::{DbError, Result};
use tracing::trace;

use crate::ast::SetOperator;
use crate::coerce::cast::cast_scalar;
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, PhysicalOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::result::key::Key;
use crate::result::row::Row;
use crate::types::datatype::DataType;
use crate::util::hash::{HashSet, RANDOM_STATE};

/// Combine two inputs of equal arity.
///
/// Rows are matched on the values of the key columns only. Both sides are
/// first cast to the output column types so that e.g. an `Int32` key on one
/// side matches the same `Int64` key on the other.
///
/// * UNION keeps the first row seen for each key, left before right.
/// * UNION ALL concatenates.
/// * EXCEPT keeps every left row whose key isn't on the right.
/// * INTERSECT keeps the first left row for each key that's on the right.
#[derive(Debug)]
pub struct PhysicalSetOperation {
    pub(crate) left: PhysicalOperator,
    pub(crate) right: PhysicalOperator,
    pub(crate) op: SetOperator,
    pub(crate) keys: Vec<usize>,
    pub(crate) output_types: Vec<DataType>,
}

impl PhysicalSetOperation {
    pub fn new(
        left: PhysicalOperator,
        right: PhysicalOperator,
        op: SetOperator,
        keys: Vec<usize>,
        output_types: Vec<DataType>,
    ) -> Self {
        PhysicalSetOperation {
            left,
            right,
            op,
            keys,
            output_types,
        }
    }

    /// Cast to the output types, dropping any provenance and hidden values.
    fn conform(&self, row: Result<Row>) -> Result<Row> {
        let row = row?;
        let values = self
            .output_types
            .iter()
            .enumerate()
            .map(|(idx, datatype)| match row.value(idx) {
                Some(value) => cast_scalar(value, datatype),
                None => Err(DbError::new(format!(
                    "Set operation input has {} values, expected {}",
                    row.len(),
                    self.output_types.len()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(values))
    }

    fn key(&self, row: &Row) -> Result<Key> {
        Key::try_from_row(row, &self.keys)
    }

    fn right_keys(&self, context: &ExecutionContext) -> Result<HashSet<Key>> {
        let mut keys = HashSet::with_hasher(RANDOM_STATE);
        for row in self.right.execute(context)? {
            context.check_canceled()?;
            let row = self.conform(row)?;
            keys.insert(self.key(&row)?);
        }
        trace!(num_keys = keys.len(), "collected right side keys");
        Ok(keys)
    }
}

impl ExecutableOperator for PhysicalSetOperation {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        match self.op {
            SetOperator::UnionAll => {
                let left = self.left.execute(context)?;
                let right = self.right.execute(context)?;
                Ok(Box::new(left.chain(right).map(|row| self.conform(row))))
            }
            SetOperator::Union => {
                let left = self.left.execute(context)?;
                let right = self.right.execute(context)?;
                let mut seen = HashSet::with_hasher(RANDOM_STATE);
                Ok(Box::new(left.chain(right).filter_map(move |row| {
                    let row = self.conform(row).and_then(|row| Ok((self.key(&row)?, row)));
                    match row {
                        Ok((key, row)) => seen.insert(key).then_some(Ok(row)),
                        Err(e) => Some(Err(e)),
                    }
                })))
            }
            SetOperator::Except => {
                let right = self.right_keys(context)?;
                let left = self.left.execute(context)?;
                Ok(Box::new(left.filter_map(move |row| {
                    let row = self.conform(row).and_then(|row| Ok((self.key(&row)?, row)));
                    match row {
                        Ok((key, row)) => (!right.contains(&key)).then_some(Ok(row)),
                        Err(e) => Some(Err(e)),
                    }
                })))
            }
            SetOperator::Intersect => {
                let mut right = self.right_keys(context)?;
                let left = self.left.execute(context)?;
                // Keys are removed once emitted so each appears at most once.
                Ok(Box::new(left.filter_map(move |row| {
                    let row = self.conform(row).and_then(|row| Ok((self.key(&row)?, row)));
                    match row {
                        Ok((key, row)) => right.remove(&key).then_some(Ok(row)),
                        Err(e) => Some(Err(e)),
                    }
                })))
            }
        }
    }

    fn children(&self) -> Vec<&dyn ExecutableOperator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}

impl Explainable for PhysicalSetOperation {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("SetOperation")
            .with_value("op", self.op)
            .with_values("keys", &self.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::collect_rows;
    use crate::execution::operators::values::PhysicalValues;
    use crate::types::scalar::ScalarValue;

    fn side(rows: &[(&str, i32)]) -> PhysicalOperator {
        Box::new(PhysicalValues::new(
            rows.iter()
                .map(|(k, v)| Row::new(vec![(*k).into(), (*v).into()]))
                .collect(),
        ))
    }

    fn run(op: SetOperator, left: &[(&str, i32)], right: &[(&str, i32)]) -> Vec<(String, ScalarValue)> {
        let op = PhysicalSetOperation::new(
            side(left),
            side(right),
            op,
            vec![0],
            vec![DataType::Utf8, DataType::Int64],
        );
        collect_rows(&op, &ExecutionContext::default())
            .unwrap()
            .into_iter()
            .map(|r| (r.values()[0].to_string(), r.values()[1].clone()))
            .collect()
    }

    fn keys(rows: &[(String, ScalarValue)]) -> Vec<&str> {
        rows.iter().map(|(k, _)| k.as_str()).collect()
    }

    const A: &[(&str, i32)] = &[("001", 1), ("002", 2), ("002", 3)];
    const B: &[(&str, i32)] = &[("001", 10), ("002", 20), ("005", 50)];

    #[test]
    fn union_first_seen_wins() {
        let rows = run(SetOperator::Union, A, B);
        assert_eq!(vec!["001", "002", "005"], keys(&rows));
        assert_eq!(ScalarValue::Int64(1), rows[0].1);
    }

    #[test]
    fn union_all_casts_and_concatenates() {
        let rows = run(SetOperator::UnionAll, A, B);
        assert_eq!(6, rows.len());
        assert_eq!(ScalarValue::Int64(50), rows[5].1);
    }

    #[test]
    fn except_retains_left_duplicates() {
        let rows = run(SetOperator::Except, &[("003", 1), ("001", 2), ("003", 3)], B);
        assert_eq!(vec!["003", "003"], keys(&rows));
    }

    #[test]
    fn intersect_emits_each_key_once() {
        let rows = run(SetOperator::Intersect, A, B);
        assert_eq!(vec!["001", "002"], keys(&rows));
        assert_eq!(ScalarValue::Int64(2), rows[1].1);
    }
}
