use crate::ast::{BinaryOperator, Expr, Literal};

/// Recursively split an expression on AND, putting the split expressions in
/// `out`.
pub fn split_conjunction(expr: Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            split_conjunction(*left, out);
            split_conjunction(*right, out);
        }
        other => out.push(other),
    }
}

/// Join expressions back together with AND. Returns `None` for an empty
/// input.
pub fn conjoin(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|left, right| Expr::Binary {
        left: Box::new(left),
        op: BinaryOperator::And,
        right: Box::new(right),
    })
}

/// Expression that's always true.
pub fn tautology() -> Expr {
    Expr::Literal(Literal::Boolean(true))
}
