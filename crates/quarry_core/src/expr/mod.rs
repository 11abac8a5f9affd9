//! Bound expressions evaluated against a single row.

pub mod evaluator;
pub mod like;

use std::fmt;

use like::{PatternKind, PatternMatcher};

use crate::coerce::arith::ArithOperator;
use crate::coerce::compare::{ComparisonCoercion, ComparisonOperator};
use crate::functions::scalar::{FunctionRef, FunctionVolatility};
use crate::types::datatype::DataType;
use crate::types::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConjunctionOperator {
    And,
    Or,
}

impl fmt::Display for ConjunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalWhenThen {
    pub when: PhysicalScalarExpression,
    pub then: PhysicalScalarExpression,
}

/// An expression with every column reference resolved to a position in the
/// input row.
///
/// Equality is structural, which is what common sub-expression extraction
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalScalarExpression {
    Column {
        idx: usize,
        datatype: DataType,
    },
    Literal {
        value: ScalarValue,
        datatype: DataType,
    },
    Property {
        expr: Box<PhysicalScalarExpression>,
        name: String,
        datatype: DataType,
    },
    Arith {
        op: ArithOperator,
        left: Box<PhysicalScalarExpression>,
        right: Box<PhysicalScalarExpression>,
        datatype: DataType,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<PhysicalScalarExpression>,
        right: Box<PhysicalScalarExpression>,
        coercion: ComparisonCoercion,
    },
    Conjunction {
        op: ConjunctionOperator,
        left: Box<PhysicalScalarExpression>,
        right: Box<PhysicalScalarExpression>,
    },
    Not(Box<PhysicalScalarExpression>),
    Negate {
        expr: Box<PhysicalScalarExpression>,
        datatype: DataType,
    },
    IsNull {
        expr: Box<PhysicalScalarExpression>,
        negated: bool,
    },
    InList {
        expr: Box<PhysicalScalarExpression>,
        list: Vec<PhysicalScalarExpression>,
        coercions: Vec<ComparisonCoercion>,
        negated: bool,
    },
    Like {
        expr: Box<PhysicalScalarExpression>,
        pattern: PatternMatcher,
        kind: PatternKind,
        negated: bool,
    },
    /// True if the string contains any of the items.
    Contains {
        expr: Box<PhysicalScalarExpression>,
        items: Vec<PhysicalScalarExpression>,
    },
    Case {
        cases: Vec<PhysicalWhenThen>,
        else_result: Option<Box<PhysicalScalarExpression>>,
        datatype: DataType,
    },
    ScalarFunction {
        function: FunctionRef,
        inputs: Vec<PhysicalScalarExpression>,
        datatype: DataType,
    },
    /// Reference to an extracted common sub-expression, computed at most once
    /// per row.
    Shared {
        slot: usize,
        datatype: DataType,
    },
}

impl PhysicalScalarExpression {
    pub fn column(idx: usize, datatype: DataType) -> Self {
        Self::Column { idx, datatype }
    }

    pub fn literal(value: ScalarValue) -> Self {
        let datatype = value.datatype();
        Self::Literal { value, datatype }
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Self::Column { datatype, .. }
            | Self::Literal { datatype, .. }
            | Self::Property { datatype, .. }
            | Self::Arith { datatype, .. }
            | Self::Negate { datatype, .. }
            | Self::Case { datatype, .. }
            | Self::ScalarFunction { datatype, .. }
            | Self::Shared { datatype, .. } => datatype.clone(),
            Self::Comparison { .. }
            | Self::Conjunction { .. }
            | Self::Not(_)
            | Self::IsNull { .. }
            | Self::InList { .. }
            | Self::Like { .. }
            | Self::Contains { .. } => DataType::Boolean,
        }
    }

    /// Direct children of this expression.
    pub fn children(&self) -> Vec<&PhysicalScalarExpression> {
        match self {
            Self::Column { .. } | Self::Literal { .. } | Self::Shared { .. } => Vec::new(),
            Self::Property { expr, .. } => vec![expr.as_ref()],
            Self::Arith { left, right, .. }
            | Self::Comparison { left, right, .. }
            | Self::Conjunction { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Self::Not(expr) => vec![expr.as_ref()],
            Self::Negate { expr, .. } => vec![expr.as_ref()],
            Self::IsNull { expr, .. } => vec![expr.as_ref()],
            Self::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            Self::Like { expr, pattern, .. } => {
                let mut out = vec![expr.as_ref()];
                if let PatternMatcher::Dynamic(p) = pattern {
                    out.push(p.as_ref());
                }
                out
            }
            Self::Contains { expr, items } => {
                let mut out = vec![expr.as_ref()];
                out.extend(items.iter());
                out
            }
            Self::Case {
                cases, else_result, ..
            } => {
                let mut out: Vec<&PhysicalScalarExpression> =
                    Vec::with_capacity(cases.len() * 2 + 1);
                for case in cases {
                    out.push(&case.when);
                    out.push(&case.then);
                }
                if let Some(e) = else_result {
                    out.push(e.as_ref());
                }
                out
            }
            Self::ScalarFunction { inputs, .. } => inputs.iter().collect(),
        }
    }

    /// Mutable access to the direct children of this expression.
    pub fn children_mut(&mut self) -> Vec<&mut PhysicalScalarExpression> {
        match self {
            Self::Column { .. } | Self::Literal { .. } | Self::Shared { .. } => Vec::new(),
            Self::Property { expr, .. } => vec![expr.as_mut()],
            Self::Arith { left, right, .. }
            | Self::Comparison { left, right, .. }
            | Self::Conjunction { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Self::Not(expr) => vec![expr.as_mut()],
            Self::Negate { expr, .. } => vec![expr.as_mut()],
            Self::IsNull { expr, .. } => vec![expr.as_mut()],
            Self::InList { expr, list, .. } => {
                let mut out = vec![expr.as_mut()];
                out.extend(list.iter_mut());
                out
            }
            Self::Like { expr, pattern, .. } => {
                let mut out = vec![expr.as_mut()];
                if let PatternMatcher::Dynamic(p) = pattern {
                    out.push(p.as_mut());
                }
                out
            }
            Self::Contains { expr, items } => {
                let mut out = vec![expr.as_mut()];
                out.extend(items.iter_mut());
                out
            }
            Self::Case {
                cases, else_result, ..
            } => {
                let mut out: Vec<&mut PhysicalScalarExpression> =
                    Vec::with_capacity(cases.len() * 2 + 1);
                for case in cases {
                    out.push(&mut case.when);
                    out.push(&mut case.then);
                }
                if let Some(e) = else_result {
                    out.push(e.as_mut());
                }
                out
            }
            Self::ScalarFunction { inputs, .. } => inputs.iter_mut().collect(),
        }
    }

    /// If evaluating this expression twice on the same row always gives the
    /// same result.
    pub fn is_deterministic(&self) -> bool {
        if let Self::ScalarFunction { function, .. } = self {
            if function.function().volatility() == FunctionVolatility::Volatile {
                return false;
            }
        }
        self.children().into_iter().all(|c| c.is_deterministic())
    }

    /// Visit every column index referenced by this expression.
    pub fn for_each_column(&self, f: &mut impl FnMut(usize)) {
        if let Self::Column { idx, .. } = self {
            f(*idx);
        }
        for child in self.children() {
            child.for_each_column(f);
        }
    }

    /// Smallest and largest column index referenced, if any.
    pub fn column_range(&self) -> Option<(usize, usize)> {
        let mut range: Option<(usize, usize)> = None;
        self.for_each_column(&mut |idx| {
            range = Some(match range {
                Some((min, max)) => (min.min(idx), max.max(idx)),
                None => (idx, idx),
            })
        });
        range
    }

    /// Rewrite every column index.
    pub fn remap_columns(&mut self, f: &impl Fn(usize) -> usize) {
        if let Self::Column { idx, .. } = self {
            *idx = f(*idx);
        }
        for child in self.children_mut() {
            child.remap_columns(f);
        }
    }

    /// Returns the value if this is a literal.
    pub fn try_as_literal(&self) -> Option<&ScalarValue> {
        match self {
            Self::Literal { value, .. } => Some(value),
            _ => None,
        }
    }
}

fn fmt_list(exprs: &[PhysicalScalarExpression], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (idx, expr) in exprs.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

impl fmt::Display for PhysicalScalarExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { idx, .. } => write!(f, "#{idx}"),
            Self::Literal { value, .. } => match value {
                ScalarValue::Utf8(s) => write!(f, "'{s}'"),
                other => write!(f, "{other}"),
            },
            Self::Property { expr, name, .. } => write!(f, "{expr}.{name}"),
            Self::Arith {
                op, left, right, ..
            } => write!(f, "({left} {op} {right})"),
            Self::Comparison {
                op, left, right, ..
            } => write!(f, "({left} {op} {right})"),
            Self::Conjunction { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Not(expr) => write!(f, "NOT {expr}"),
            Self::Negate { expr, .. } => write!(f, "-{expr}"),
            Self::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            Self::InList {
                expr,
                list,
                negated,
                ..
            } => {
                write!(f, "{expr}")?;
                if *negated {
                    write!(f, " NOT")?;
                }
                write!(f, " IN (")?;
                fmt_list(list, f)?;
                write!(f, ")")
            }
            Self::Like {
                expr,
                pattern,
                kind,
                negated,
            } => {
                write!(f, "{expr}")?;
                if *negated {
                    write!(f, " NOT")?;
                }
                write!(f, " {kind} {pattern}")
            }
            Self::Contains { expr, items } => {
                write!(f, "contains({expr}, ")?;
                fmt_list(items, f)?;
                write!(f, ")")
            }
            Self::Case {
                cases, else_result, ..
            } => {
                write!(f, "CASE")?;
                for case in cases {
                    write!(f, " WHEN {} THEN {}", case.when, case.then)?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {e}")?;
                }
                write!(f, " END")
            }
            Self::ScalarFunction {
                function, inputs, ..
            } => {
                write!(f, "{}(", function.function().name())?;
                fmt_list(inputs, f)?;
                write!(f, ")")
            }
            Self::Shared { slot, .. } => write!(f, "$shared{slot}"),
        }
    }
}
