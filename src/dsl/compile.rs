//! Lowers the optimized AST onto the query combinators, node for node.

use super::{CmpOp, Expr};
use crate::query::Query;

pub(crate) fn compile(expr: Expr) -> Query {
    match expr {
        Expr::Cmp { field, op, value } => match op {
            CmpOp::Eq => Query::Eq(field, value),
            CmpOp::Ne => Query::NotEq(field, value),
            CmpOp::Lt => Query::Lt(field, value),
            CmpOp::Le => Query::Le(field, value),
            CmpOp::Gt => Query::Gt(field, value),
            CmpOp::Ge => Query::Ge(field, value),
        },

        Expr::Between {
            field,
            lo,
            hi,
            lo_open,
            hi_open,
        } => Query::Between {
            field,
            lo,
            hi,
            lo_open,
            hi_open,
        },

        Expr::In { field, values } => Query::In(field, values.into_iter().collect()),

        Expr::And(left, right) => Query::And(vec![compile(*left), compile(*right)]),
        Expr::Or(left, right) => Query::Or(vec![compile(*left), compile(*right)]),
        Expr::Not(inner) => Query::Not(Box::new(compile(*inner))),
        Expr::AndNot(base, sub) => {
            Query::AndNot(Box::new(compile(*base)), Box::new(compile(*sub)))
        }
    }
}
