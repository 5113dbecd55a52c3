//! Algebraic rewrites on the parsed AST, applied before compilation.
//!
//! Rules:
//! 1. `NOT NOT x`        => `x`
//! 2. `NOT (x != v)`     => `x = v` (the reverse direction is left alone,
//!    `!=` has its own fast path)
//! 3. `NOT (x > v)`      => `x <= v`, and the three symmetric cases
//! 4. `x AND NOT y`      => `x ANDNOT y` (either operand order)
//! 5. `x > lo AND x < hi` on one field => a range with open/closed ends
//!    derived from the strictness of each comparison

use super::{CmpOp, Expr};

pub(crate) fn optimize(expr: Expr) -> Expr {
    match expr {
        Expr::And(left, right) => {
            let left = optimize(*left);
            let right = optimize(*right);

            if let Expr::Not(sub) = right {
                return Expr::AndNot(Box::new(left), sub);
            }
            if let Expr::Not(sub) = left {
                return Expr::AndNot(Box::new(right), sub);
            }

            match merge_range(left, right) {
                Ok(range) => range,
                Err((left, right)) => Expr::And(Box::new(left), Box::new(right)),
            }
        }

        Expr::Or(left, right) => Expr::Or(
            Box::new(optimize(*left)),
            Box::new(optimize(*right)),
        ),

        Expr::AndNot(base, sub) => Expr::AndNot(
            Box::new(optimize(*base)),
            Box::new(optimize(*sub)),
        ),

        Expr::Not(inner) => match optimize(*inner) {
            Expr::Not(x) => *x,
            Expr::Cmp {
                field,
                op: CmpOp::Ne,
                value,
            } => Expr::Cmp {
                field,
                op: CmpOp::Eq,
                value,
            },
            Expr::Cmp {
                field,
                op: CmpOp::Gt,
                value,
            } => Expr::Cmp {
                field,
                op: CmpOp::Le,
                value,
            },
            Expr::Cmp {
                field,
                op: CmpOp::Ge,
                value,
            } => Expr::Cmp {
                field,
                op: CmpOp::Lt,
                value,
            },
            Expr::Cmp {
                field,
                op: CmpOp::Lt,
                value,
            } => Expr::Cmp {
                field,
                op: CmpOp::Ge,
                value,
            },
            Expr::Cmp {
                field,
                op: CmpOp::Le,
                value,
            } => Expr::Cmp {
                field,
                op: CmpOp::Gt,
                value,
            },
            other => Expr::Not(Box::new(other)),
        },

        leaf => leaf,
    }
}

/// `x > lo AND x < hi` (any strict/loose mix, either operand order) on the
/// same field becomes one range lookup. Gives back the operands unchanged
/// when the shape does not match.
fn merge_range(left: Expr, right: Expr) -> Result<Expr, (Expr, Expr)> {
    let is_lower = |op: CmpOp| matches!(op, CmpOp::Gt | CmpOp::Ge);
    let is_upper = |op: CmpOp| matches!(op, CmpOp::Lt | CmpOp::Le);

    let merged = match (&left, &right) {
        (
            Expr::Cmp {
                field: f1,
                op: o1,
                value: v1,
            },
            Expr::Cmp {
                field: f2,
                op: o2,
                value: v2,
            },
        ) if f1 == f2 => {
            if is_lower(*o1) && is_upper(*o2) {
                Some((f1.clone(), v1.clone(), *o1, v2.clone(), *o2))
            } else if is_upper(*o1) && is_lower(*o2) {
                Some((f1.clone(), v2.clone(), *o2, v1.clone(), *o1))
            } else {
                None
            }
        }
        _ => None,
    };

    match merged {
        Some((field, lo, lo_op, hi, hi_op)) => Ok(Expr::Between {
            field,
            lo,
            hi,
            lo_open: lo_op == CmpOp::Gt,
            hi_open: hi_op == CmpOp::Lt,
        }),
        None => Err((left, right)),
    }
}
