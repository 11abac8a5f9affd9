use std::sync::Arc;

use quarry_error::{DbError, ErrorKind, Result};

use crate::datasource::{ScanHints, TableMethod};
use crate::execution::context::ExecutionContext;
use crate::execution::{ExecutableOperator, RowStream};
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::result::row::Row;
use crate::types::scalar::ScalarValue;

/// Scan a table method with constant arguments.
///
/// Each output row carries the record it was read from as its only context.
#[derive(Debug)]
pub struct PhysicalScan {
    pub(crate) method: Arc<dyn TableMethod>,
    pub(crate) args: Vec<ScalarValue>,
    pub(crate) hints: ScanHints,
    pub(crate) num_columns: usize,
}

impl PhysicalScan {
    pub fn new(
        method: Arc<dyn TableMethod>,
        args: Vec<ScalarValue>,
        hints: ScanHints,
        num_columns: usize,
    ) -> Self {
        PhysicalScan {
            method,
            args,
            hints,
            num_columns,
        }
    }
}

/// Convert a record into a row, checking it has the declared width.
pub(crate) fn record_to_row(
    method: &str,
    record: Arc<dyn crate::datasource::SourceRow>,
    num_columns: usize,
) -> Result<Row> {
    let values = record.values();
    if values.len() != num_columns {
        return Err(DbError::with_kind(
            ErrorKind::DataSource,
            format!(
                "Method '{method}' produced a record with {} values, expected {num_columns}",
                values.len()
            ),
        )
        .with_field("method", method.to_string()));
    }
    Row::try_with_contexts(values.to_vec(), vec![Some(record)])
}

impl ExecutableOperator for PhysicalScan {
    fn execute<'a>(&'a self, context: &'a ExecutionContext) -> Result<RowStream<'a>> {
        context.check_canceled()?;
        let records = self.method.scan(&self.args, &self.hints)?;
        let name = self.method.name();

        Ok(Box::new(records.map(move |record| {
            context.check_canceled()?;
            record_to_row(name, record?, self.num_columns)
        })))
    }
}

impl Explainable for PhysicalScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = ExplainEntry::new("Scan")
            .with_value("method", self.method.name())
            .with_value("alias", &self.hints.alias);
        if !self.args.is_empty() {
            ent = ent.with_values("args", &self.args);
        }
        if conf.verbose {
            if let Some(filter) = &self.hints.filter {
                ent = ent.with_value("hint", filter);
            }
        }
        ent
    }
}
