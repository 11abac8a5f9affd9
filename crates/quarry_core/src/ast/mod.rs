//! Parsed query representation.
//!
//! Produced by an external parser (or the helpers in [`builder`]). Nodes are
//! never mutated after construction; rewrites build new trees.

pub mod builder;

use std::fmt;

use crate::types::datatype::DataType;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub body: SetExpr,
    pub order_by: Vec<OrderByExpr>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<Select>),
    /// A nested query with its own ORDER BY, SKIP and TAKE.
    Query(Box<Query>),
    SetOperation {
        op: SetOperator,
        /// Columns of the first side's output used as the matching key. Empty
        /// means every column.
        keys: Vec<String>,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperator {
    Union,
    UnionAll,
    Except,
    Intersect,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "UNION"),
            Self::UnionAll => write!(f, "UNION ALL"),
            Self::Except => write!(f, "EXCEPT"),
            Self::Intersect => write!(f, "INTERSECT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub projections: Vec<SelectItem>,
    pub from: Option<FromNode>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(String),
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyType {
    Cross,
    Outer,
}

impl fmt::Display for ApplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cross => write!(f, "CROSS APPLY"),
            Self::Outer => write!(f, "OUTER APPLY"),
        }
    }
}

/// The FROM clause.
///
/// Joins and applies are left-deep: the right side is always a single source.
#[derive(Debug, Clone, PartialEq)]
pub enum FromNode {
    Source(TableSource),
    Join {
        left: Box<FromNode>,
        right: TableSource,
        join_type: JoinType,
        on: Expr,
    },
    Apply {
        left: Box<FromNode>,
        right: ApplySource,
        apply_type: ApplyType,
    },
    Pivot {
        input: Box<FromNode>,
        pivot: Pivot,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// `#schema.method(args) alias`
    Method {
        schema: String,
        method: String,
        args: Vec<Expr>,
        alias: Option<String>,
    },
    /// Reference to a CTE.
    Cte { name: String, alias: Option<String> },
}

impl TableSource {
    /// Alias the source is bound to, defaulting to the method or CTE name.
    pub fn alias(&self) -> &str {
        match self {
            Self::Method { method, alias, .. } => alias.as_deref().unwrap_or(method),
            Self::Cte { name, alias } => alias.as_deref().unwrap_or(name),
        }
    }
}

/// Right side of an apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplySource {
    /// A method whose arguments may reference earlier aliases.
    Method {
        schema: String,
        method: String,
        args: Vec<Expr>,
        alias: String,
    },
    /// A table-valued member of the record bound to an earlier alias.
    Member {
        source_alias: String,
        member: String,
        alias: String,
    },
    /// A list-valued property path, e.g. `c.Address.Phones`.
    Property { path: Expr, alias: String },
}

impl ApplySource {
    pub fn alias(&self) -> &str {
        match self {
            Self::Method { alias, .. } => alias,
            Self::Member { alias, .. } => alias,
            Self::Property { alias, .. } => alias,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub aggregations: Vec<PivotAggregation>,
    pub pivot_column: ColumnRef,
    pub values: PivotValues,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotAggregation {
    pub function: String,
    pub argument: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PivotValues {
    List(Vec<Literal>),
    /// Values discovered by running a query, first column.
    Subquery(Box<Query>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Integer in decimal, hex, binary or octal form, with an optional type
    /// from a suffix.
    Integer {
        text: String,
        datatype: Option<DataType>,
    },
    /// Number with a fractional part or exponent.
    Decimal {
        text: String,
        datatype: Option<DataType>,
    },
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer { text, .. } => write!(f, "{text}"),
            Self::Decimal { text, .. } => write!(f, "{text}"),
            Self::String(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Like,
    NotLike,
    RLike,
    NotRLike,
}

impl BinaryOperator {
    /// Pattern matching operators.
    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Like | Self::NotLike | Self::RLike | Self::NotRLike)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::RLike => "RLIKE",
            Self::NotRLike => "NOT RLIKE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    Column(ColumnRef),
    /// Property access on a struct valued expression.
    Property { expr: Box<Expr>, name: String },
    Unary { op: UnaryOperator, expr: Box<Expr> },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    IsNull { expr: Box<Expr>, negated: bool },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// True if the string value contains any of the items.
    Contains { expr: Box<Expr>, items: Vec<Expr> },
    Case {
        operand: Option<Box<Expr>>,
        conditions: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        /// `Count(*)`
        star: bool,
    },
}

impl Expr {
    /// Visit this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Self::Literal(_) | Self::Column(_) => (),
            Self::Property { expr, .. } => expr.walk(f),
            Self::Unary { expr, .. } => expr.walk(f),
            Self::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Self::IsNull { expr, .. } => expr.walk(f),
            Self::InList { expr, list, .. } => {
                expr.walk(f);
                list.iter().for_each(|e| e.walk(f));
            }
            Self::Contains { expr, items } => {
                expr.walk(f);
                items.iter().for_each(|e| e.walk(f));
            }
            Self::Case {
                operand,
                conditions,
                else_result,
            } => {
                if let Some(operand) = operand {
                    operand.walk(f);
                }
                for (when, then) in conditions {
                    when.walk(f);
                    then.walk(f);
                }
                if let Some(e) = else_result {
                    e.walk(f);
                }
            }
            Self::Function { args, .. } => args.iter().for_each(|e| e.walk(f)),
        }
    }

    /// Name used for an output column computed from this expression.
    pub fn output_name(&self) -> String {
        match self {
            Self::Column(col) => col.name.clone(),
            other => other.to_string(),
        }
    }
}

fn fmt_operand(expr: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match expr {
        Expr::Binary { .. } => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

fn fmt_list(list: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (idx, e) in list.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Column(col) => write!(f, "{col}"),
            Self::Property { expr, name } => write!(f, "{expr}.{name}"),
            Self::Unary { op, expr } => match op {
                UnaryOperator::Not => {
                    write!(f, "NOT ")?;
                    fmt_operand(expr, f)
                }
                UnaryOperator::Negate => {
                    write!(f, "-")?;
                    fmt_operand(expr, f)
                }
            },
            Self::Binary { left, op, right } => {
                fmt_operand(left, f)?;
                write!(f, " {op} ")?;
                fmt_operand(right, f)
            }
            Self::IsNull { expr, negated } => {
                fmt_operand(expr, f)?;
                if *negated {
                    write!(f, " IS NOT NULL")
                } else {
                    write!(f, " IS NULL")
                }
            }
            Self::InList {
                expr,
                list,
                negated,
            } => {
                fmt_operand(expr, f)?;
                if *negated {
                    write!(f, " NOT")?;
                }
                write!(f, " IN (")?;
                fmt_list(list, f)?;
                write!(f, ")")
            }
            Self::Contains { expr, items } => {
                write!(f, "contains(")?;
                write!(f, "{expr}, ")?;
                fmt_list(items, f)?;
                write!(f, ")")
            }
            Self::Case {
                operand,
                conditions,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for (when, then) in conditions {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {e}")?;
                }
                write!(f, " END")
            }
            Self::Function { name, args, star } => {
                write!(f, "{name}(")?;
                if *star {
                    write!(f, "*")?;
                } else {
                    fmt_list(args, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::builder::*;
    use super::*;

    #[test]
    fn display_nested_binary() {
        let expr = col("a").plus(col("b")).multiply(int(2));
        assert_eq!("(a + b) * 2", expr.to_string());
    }

    #[test]
    fn output_names() {
        assert_eq!("Name", col("c.Name").output_name());
        assert_eq!("Length(c.Name)", func("Length", [col("c.Name")]).output_name());
        assert_eq!("Count(*)", count_star().output_name());
    }

    #[test]
    fn walk_visits_all() {
        let expr = func("Length", [col("Name")]).gt(int(3)).and(col("b").is_null());
        let mut columns = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::Column(c) = e {
                columns.push(c.name.clone());
            }
        });
        assert_eq!(vec!["Name".to_string(), "b".to_string()], columns);
    }
}
