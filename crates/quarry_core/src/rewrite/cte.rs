//! CTE name resolution.
//!
//! CTEs compile one at a time in declaration order, each into its own plan.
//! A CTE is visible to the CTEs declared after it and to the statement body,
//! never to itself or anything declared before it.

use quarry_error::{DbError, ErrorKind, Result};

use crate::ast::Cte;
use crate::result::table::Column;
use crate::util::suggest::did_you_mean;

/// A compiled CTE visible to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct CteBinding {
    pub name: String,
    /// Index of the CTE's materialized table at execution time.
    pub slot: usize,
    pub columns: Vec<Column>,
}

/// CTEs visible at some point during compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CteScope {
    bindings: Vec<CteBinding>,
}

impl CteScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a compiled CTE visible. Shadows an outer CTE of the same name.
    pub fn push(&mut self, binding: CteBinding) {
        self.bindings.push(binding);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&CteBinding> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    /// Get a CTE, erroring with a suggestion if it isn't visible.
    pub fn resolve(&self, name: &str) -> Result<&CteBinding> {
        self.get(name).ok_or_else(|| {
            let msg = format!("Unknown CTE '{name}'");
            let msg = match did_you_mean(name, self.names()) {
                Some(s) => format!("{msg}. Did you mean '{s}'?"),
                None => msg,
            };
            DbError::with_kind(ErrorKind::UnknownCte, msg).with_field("cte", name.to_string())
        })
    }
}

/// Reject statements declaring the same CTE name twice.
pub fn check_cte_names(ctes: &[Cte]) -> Result<()> {
    for (idx, cte) in ctes.iter().enumerate() {
        if ctes[..idx]
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&cte.name))
        {
            return Err(DbError::with_kind(
                ErrorKind::DuplicateCte,
                format!("CTE '{}' is declared more than once", cte.name),
            )
            .with_field("cte", cte.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;

    fn binding(name: &str, slot: usize) -> CteBinding {
        CteBinding {
            name: name.to_string(),
            slot,
            columns: Vec::new(),
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let body = select([wildcard()]).into_query();
        let query = body
            .clone()
            .with_cte("Recent", body.clone())
            .with_cte("recent", body);

        let err = check_cte_names(&query.ctes).unwrap_err();
        assert_eq!(ErrorKind::DuplicateCte, err.kind());
        assert_eq!(Some("recent"), err.field("cte"));
    }

    #[test]
    fn resolve_suggests() {
        let mut scope = CteScope::new();
        scope.push(binding("Ranked", 0));

        assert_eq!(0, scope.resolve("RANKED").unwrap().slot);

        let err = scope.resolve("Rankd").unwrap_err();
        assert_eq!(ErrorKind::UnknownCte, err.kind());
        assert_eq!(Some("Rankd"), err.field("cte"));
        assert!(err.message().contains("Ranked"), "{}", err.message());
    }

    #[test]
    fn inner_shadows_outer() {
        let mut scope = CteScope::new();
        scope.push(binding("a", 0));
        scope.push(binding("A", 3));
        assert_eq!(3, scope.resolve("a").unwrap().slot);
    }
}
