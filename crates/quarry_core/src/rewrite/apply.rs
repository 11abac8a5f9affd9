//! Flattening of left-deep FROM trees into an ordered list of steps.

use quarry_error::{DbError, ErrorKind, Result};

use crate::ast::{ApplySource, ApplyType, Expr, FromNode, JoinType, Pivot, TableSource};

/// One step of a flattened FROM clause. Each step binds exactly one alias.
#[derive(Debug, Clone, PartialEq)]
pub enum FromStep {
    Source(TableSource),
    Join {
        source: TableSource,
        join_type: JoinType,
        on: Expr,
    },
    Apply {
        source: ApplySource,
        apply_type: ApplyType,
    },
}

impl FromStep {
    pub fn alias(&self) -> &str {
        match self {
            Self::Source(source) => source.alias(),
            Self::Join { source, .. } => source.alias(),
            Self::Apply { source, .. } => source.alias(),
        }
    }

    /// If rows of this step's alias may be replaced with nulls by the step
    /// itself.
    pub fn is_null_supplying(&self) -> bool {
        matches!(
            self,
            Self::Join {
                join_type: JoinType::Left,
                ..
            } | Self::Apply {
                apply_type: ApplyType::Outer,
                ..
            }
        )
    }

    /// If this step null-extends every alias bound before it.
    pub fn is_right_join(&self) -> bool {
        matches!(
            self,
            Self::Join {
                join_type: JoinType::Right,
                ..
            }
        )
    }

    /// If this step reads from a table method, which makes it eligible for
    /// scan hints.
    pub fn is_method(&self) -> bool {
        matches!(
            self,
            Self::Source(TableSource::Method { .. })
                | Self::Join {
                    source: TableSource::Method { .. },
                    ..
                }
                | Self::Apply {
                    source: ApplySource::Method { .. },
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedFrom {
    pub steps: Vec<FromStep>,
    /// Pivot applied to the combined output of all steps.
    pub pivot: Option<Pivot>,
}

impl FlattenedFrom {
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.alias())
    }
}

/// Flatten a FROM tree, left to right.
///
/// Rejects duplicate aliases, apply aliases that shadow a CTE, member
/// applies over aliases that aren't bound yet, and pivots anywhere other than
/// the top of the tree.
pub fn flatten_from(from: &FromNode, cte_names: &[&str]) -> Result<FlattenedFrom> {
    let (node, pivot) = match from {
        FromNode::Pivot { input, pivot } => (input.as_ref(), Some(pivot.clone())),
        other => (other, None),
    };

    let mut steps = Vec::new();
    collect_steps(node, &mut steps)?;

    for (idx, step) in steps.iter().enumerate() {
        let alias = step.alias();
        let earlier = &steps[..idx];

        if earlier.iter().any(|s| s.alias().eq_ignore_ascii_case(alias)) {
            return Err(DbError::with_kind(
                ErrorKind::DuplicateAlias,
                format!("Alias '{alias}' is specified more than once"),
            )
            .with_field("alias", alias.to_string()));
        }

        if let FromStep::Apply { source, .. } = step {
            if let Some(cte) = cte_names.iter().find(|c| c.eq_ignore_ascii_case(alias)) {
                return Err(DbError::with_kind(
                    ErrorKind::AliasCollision,
                    format!("Apply alias '{alias}' collides with CTE '{cte}'"),
                )
                .with_field("alias", alias.to_string())
                .with_field("cte", cte.to_string()));
            }

            if let ApplySource::Member { source_alias, .. } = source {
                if !earlier
                    .iter()
                    .any(|s| s.alias().eq_ignore_ascii_case(source_alias))
                {
                    return Err(DbError::with_kind(
                        ErrorKind::UnknownAlias,
                        format!("Unknown alias '{source_alias}'"),
                    )
                    .with_field("alias", source_alias.to_string()));
                }
            }
        }
    }

    Ok(FlattenedFrom { steps, pivot })
}

fn collect_steps(node: &FromNode, steps: &mut Vec<FromStep>) -> Result<()> {
    match node {
        FromNode::Source(source) => steps.push(FromStep::Source(source.clone())),
        FromNode::Join {
            left,
            right,
            join_type,
            on,
        } => {
            collect_steps(left, steps)?;
            steps.push(FromStep::Join {
                source: right.clone(),
                join_type: *join_type,
                on: on.clone(),
            });
        }
        FromNode::Apply {
            left,
            right,
            apply_type,
        } => {
            collect_steps(left, steps)?;
            steps.push(FromStep::Apply {
                source: right.clone(),
                apply_type: *apply_type,
            });
        }
        FromNode::Pivot { .. } => {
            return Err(DbError::with_kind(
                ErrorKind::InvalidArgument,
                "PIVOT must be the last element of the FROM clause",
            ));
        }
    }
    Ok(())
}
