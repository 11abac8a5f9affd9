use std::fmt;
use std::hash::{Hash, Hasher};

use quarry_error::{DbError, ErrorKind, Result};
use regex::Regex;

use super::PhysicalScalarExpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// SQL pattern with `%` and `_` wildcards matched against the whole
    /// string.
    Like,
    /// Regular expression search.
    RLike,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => write!(f, "LIKE"),
            Self::RLike => write!(f, "RLIKE"),
        }
    }
}

/// A pattern compiled to a regex once at plan time.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn try_new(source: &str, kind: PatternKind) -> Result<Self> {
        let re = match kind {
            PatternKind::Like => like_to_regex(source),
            PatternKind::RLike => source.to_string(),
        };
        let regex = Regex::new(&re).map_err(|e| {
            DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("Invalid {kind} pattern '{source}'"),
            )
            .with_field("pattern", source.to_string())
            .with_field("reason", e)
        })?;

        Ok(CompiledPattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for CompiledPattern {}

impl Hash for CompiledPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state)
    }
}

/// Pattern side of a LIKE or RLIKE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternMatcher {
    /// Literal pattern, compiled during planning.
    Static(CompiledPattern),
    /// Pattern computed per row.
    Dynamic(Box<PhysicalScalarExpression>),
}

impl fmt::Display for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(p) => write!(f, "'{}'", p.source),
            Self::Dynamic(expr) => write!(f, "{expr}"),
        }
    }
}

/// Translate a LIKE pattern into an anchored regex.
///
/// Matching is case-sensitive and `%`/`_` may match newlines.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '%' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}
