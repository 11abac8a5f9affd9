use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quarry_error::{DbError, ErrorKind, Result};

use crate::result::table::Table;

/// Signal for stopping a running query.
///
/// Clones share the same flag. Operators check it between rows, so a query
/// stops at the next row boundary after [`CancellationToken::cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the query.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Error if the query was canceled.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(DbError::with_kind(ErrorKind::Canceled, "Query canceled"));
        }
        Ok(())
    }
}

/// State shared by all operators during a single run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Materialized CTEs, indexed by slot.
    ctes: Vec<Arc<Table>>,
    token: CancellationToken,
}

impl ExecutionContext {
    pub fn new(token: CancellationToken) -> Self {
        ExecutionContext {
            ctes: Vec::new(),
            token,
        }
    }

    /// Add a materialized CTE, returning its slot.
    pub fn push_cte(&mut self, table: Table) -> usize {
        self.ctes.push(Arc::new(table));
        self.ctes.len() - 1
    }

    pub fn cte(&self, slot: usize) -> Result<&Arc<Table>> {
        self.ctes
            .get(slot)
            .ok_or_else(|| DbError::new(format!("CTE slot {slot} not materialized")))
    }

    pub fn num_ctes(&self) -> usize {
        self.ctes.len()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Error if the query was canceled.
    pub fn check_canceled(&self) -> Result<()> {
        self.token.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());

        other.cancel();
        assert!(token.is_canceled());
        assert_eq!(ErrorKind::Canceled, token.check().unwrap_err().kind());
    }

    #[test]
    fn missing_cte_slot() {
        let mut ctx = ExecutionContext::default();
        assert!(ctx.cte(0).is_err());
        let slot = ctx.push_cte(Table::new("a", Vec::new()));
        assert_eq!(0, slot);
        assert_eq!("a", ctx.cte(0).unwrap().name());
    }
}
