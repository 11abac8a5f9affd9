//! Helpers for constructing queries without a parser.

use super::*;

/// Column reference. `"c.Name"` is qualified by `c`. Further dots are property
/// accesses.
pub fn col(name: &str) -> Expr {
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or_default().to_string();
    let expr = match parts.next() {
        Some(second) => Expr::Column(ColumnRef {
            qualifier: Some(first),
            name: second.to_string(),
        }),
        None => Expr::Column(ColumnRef {
            qualifier: None,
            name: first,
        }),
    };
    parts.fold(expr, |expr, name| expr.prop(name))
}

pub fn int(v: i64) -> Expr {
    Expr::Literal(Literal::Integer {
        text: v.to_string(),
        datatype: None,
    })
}

/// Integer literal from its source text, e.g. `"0x1F"`.
pub fn int_text(text: &str) -> Expr {
    Expr::Literal(Literal::Integer {
        text: text.to_string(),
        datatype: None,
    })
}

/// Integer literal with a declared type.
pub fn typed_int(text: &str, datatype: DataType) -> Expr {
    Expr::Literal(Literal::Integer {
        text: text.to_string(),
        datatype: Some(datatype),
    })
}

pub fn decimal(text: &str) -> Expr {
    Expr::Literal(Literal::Decimal {
        text: text.to_string(),
        datatype: None,
    })
}

pub fn double(text: &str) -> Expr {
    Expr::Literal(Literal::Decimal {
        text: text.to_string(),
        datatype: Some(DataType::Float64),
    })
}

pub fn string(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()))
}

pub fn boolean(b: bool) -> Expr {
    Expr::Literal(Literal::Boolean(b))
}

pub fn null() -> Expr {
    Expr::Literal(Literal::Null)
}

pub fn func(name: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args: args.into_iter().collect(),
        star: false,
    }
}

pub fn count_star() -> Expr {
    Expr::Function {
        name: "Count".to_string(),
        args: Vec::new(),
        star: true,
    }
}

pub fn not(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOperator::Not,
        expr: Box::new(expr),
    }
}

pub fn negate(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOperator::Negate,
        expr: Box::new(expr),
    }
}

pub fn case_when(
    conditions: impl IntoIterator<Item = (Expr, Expr)>,
    else_result: Option<Expr>,
) -> Expr {
    Expr::Case {
        operand: None,
        conditions: conditions.into_iter().collect(),
        else_result: else_result.map(Box::new),
    }
}

impl Expr {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn prop(self, name: &str) -> Expr {
        Expr::Property {
            expr: Box::new(self),
            name: name.to_string(),
        }
    }

    pub fn plus(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Plus, right)
    }

    pub fn minus(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Minus, right)
    }

    pub fn multiply(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Multiply, right)
    }

    pub fn divide(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Divide, right)
    }

    pub fn modulo(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Modulo, right)
    }

    pub fn equals(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, right)
    }

    pub fn not_equals(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::NotEq, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, right)
    }

    pub fn lt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::LtEq, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, right)
    }

    pub fn gt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::GtEq, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Or, right)
    }

    pub fn like(self, pattern: Expr) -> Expr {
        self.binary(BinaryOperator::Like, pattern)
    }

    pub fn not_like(self, pattern: Expr) -> Expr {
        self.binary(BinaryOperator::NotLike, pattern)
    }

    pub fn rlike(self, pattern: Expr) -> Expr {
        self.binary(BinaryOperator::RLike, pattern)
    }

    pub fn not_rlike(self, pattern: Expr) -> Expr {
        self.binary(BinaryOperator::NotRLike, pattern)
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_list(self, list: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list: list.into_iter().collect(),
            negated: false,
        }
    }

    pub fn not_in_list(self, list: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list: list.into_iter().collect(),
            negated: true,
        }
    }

    pub fn contains(self, items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Contains {
            expr: Box::new(self),
            items: items.into_iter().collect(),
        }
    }
}

pub fn item(expr: Expr) -> SelectItem {
    SelectItem::Expr { expr, alias: None }
}

pub fn item_as(expr: Expr, alias: &str) -> SelectItem {
    SelectItem::Expr {
        expr,
        alias: Some(alias.to_string()),
    }
}

pub fn wildcard() -> SelectItem {
    SelectItem::Wildcard
}

pub fn qualified_wildcard(alias: &str) -> SelectItem {
    SelectItem::QualifiedWildcard(alias.to_string())
}

pub fn select(items: impl IntoIterator<Item = SelectItem>) -> Select {
    Select {
        distinct: false,
        projections: items.into_iter().collect(),
        from: None,
        filter: None,
        group_by: Vec::new(),
        having: None,
    }
}

impl Select {
    pub fn from(mut self, from: FromNode) -> Self {
        self.from = Some(from);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn group_by(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.group_by = exprs.into_iter().collect();
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn into_query(self) -> Query {
        Query::new(SetExpr::Select(Box::new(self)))
    }
}

impl Query {
    pub fn new(body: SetExpr) -> Self {
        Query {
            ctes: Vec::new(),
            body,
            order_by: Vec::new(),
            skip: None,
            take: None,
        }
    }

    pub fn with_cte(mut self, name: &str, query: Query) -> Self {
        self.ctes.push(Cte {
            name: name.to_string(),
            query: Box::new(query),
        });
        self
    }

    pub fn order_by(mut self, expr: Expr, asc: bool) -> Self {
        self.order_by.push(OrderByExpr { expr, asc });
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }
}

impl From<Select> for SetExpr {
    fn from(select: Select) -> Self {
        SetExpr::Select(Box::new(select))
    }
}

impl From<Query> for SetExpr {
    fn from(query: Query) -> Self {
        SetExpr::Query(Box::new(query))
    }
}

impl From<SetExpr> for Query {
    fn from(body: SetExpr) -> Self {
        Query::new(body)
    }
}

impl From<Select> for Query {
    fn from(select: Select) -> Self {
        select.into_query()
    }
}

pub fn set_op(
    op: SetOperator,
    keys: &[&str],
    left: impl Into<SetExpr>,
    right: impl Into<SetExpr>,
) -> SetExpr {
    SetExpr::SetOperation {
        op,
        keys: keys.iter().map(|k| k.to_string()).collect(),
        left: Box::new(left.into()),
        right: Box::new(right.into()),
    }
}

pub fn source_method(
    schema: &str,
    method: &str,
    args: impl IntoIterator<Item = Expr>,
    alias: &str,
) -> TableSource {
    TableSource::Method {
        schema: schema.to_string(),
        method: method.to_string(),
        args: args.into_iter().collect(),
        alias: Some(alias.to_string()),
    }
}

pub fn source_cte(name: &str, alias: &str) -> TableSource {
    TableSource::Cte {
        name: name.to_string(),
        alias: Some(alias.to_string()),
    }
}

/// `FROM #schema.method(args) alias`
pub fn method(schema: &str, method: &str, args: impl IntoIterator<Item = Expr>, alias: &str) -> FromNode {
    FromNode::Source(source_method(schema, method, args, alias))
}

/// `FROM cte alias`
pub fn cte(name: &str, alias: &str) -> FromNode {
    FromNode::Source(source_cte(name, alias))
}

pub fn apply_method(
    schema: &str,
    method: &str,
    args: impl IntoIterator<Item = Expr>,
    alias: &str,
) -> ApplySource {
    ApplySource::Method {
        schema: schema.to_string(),
        method: method.to_string(),
        args: args.into_iter().collect(),
        alias: alias.to_string(),
    }
}

pub fn apply_member(source_alias: &str, member: &str, alias: &str) -> ApplySource {
    ApplySource::Member {
        source_alias: source_alias.to_string(),
        member: member.to_string(),
        alias: alias.to_string(),
    }
}

pub fn apply_property(path: Expr, alias: &str) -> ApplySource {
    ApplySource::Property {
        path,
        alias: alias.to_string(),
    }
}

impl FromNode {
    pub fn join(self, right: TableSource, join_type: JoinType, on: Expr) -> Self {
        FromNode::Join {
            left: Box::new(self),
            right,
            join_type,
            on,
        }
    }

    pub fn inner_join(self, right: TableSource, on: Expr) -> Self {
        self.join(right, JoinType::Inner, on)
    }

    pub fn left_join(self, right: TableSource, on: Expr) -> Self {
        self.join(right, JoinType::Left, on)
    }

    pub fn right_join(self, right: TableSource, on: Expr) -> Self {
        self.join(right, JoinType::Right, on)
    }

    pub fn cross_apply(self, right: ApplySource) -> Self {
        FromNode::Apply {
            left: Box::new(self),
            right,
            apply_type: ApplyType::Cross,
        }
    }

    pub fn outer_apply(self, right: ApplySource) -> Self {
        FromNode::Apply {
            left: Box::new(self),
            right,
            apply_type: ApplyType::Outer,
        }
    }

    pub fn pivot(self, pivot: Pivot) -> Self {
        FromNode::Pivot {
            input: Box::new(self),
            pivot,
        }
    }
}

impl Pivot {
    /// Pivot `column` into one output column per value.
    pub fn new(
        aggregations: impl IntoIterator<Item = (&'static str, Expr)>,
        column: &str,
        values: PivotValues,
    ) -> Self {
        let pivot_column = match col(column) {
            Expr::Column(c) => c,
            _ => ColumnRef {
                qualifier: None,
                name: column.to_string(),
            },
        };
        Pivot {
            aggregations: aggregations
                .into_iter()
                .map(|(function, argument)| PivotAggregation {
                    function: function.to_string(),
                    argument,
                })
                .collect(),
            pivot_column,
            values,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

/// Pivot values from a literal list.
pub fn pivot_values(values: impl IntoIterator<Item = Expr>) -> PivotValues {
    PivotValues::List(
        values
            .into_iter()
            .map(|e| match e {
                Expr::Literal(lit) => lit,
                other => Literal::String(other.to_string()),
            })
            .collect(),
    )
}
