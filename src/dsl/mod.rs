//! The query string language.
//!
//! `name = "x" AND age > uint8(5) OR role IN ("a", "b")` becomes a
//! [`Query`](crate::query::Query) in three stages: the parser builds an
//! AST, the optimizer applies algebraic rewrites, and the compiler lowers
//! the result onto the query combinators.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! OR      := AND   ("OR"  AND)*
//! AND     := UNARY ("AND" UNARY)*
//! UNARY   := "NOT" UNARY | PRIMARY
//! PRIMARY := "(" OR ")"
//!          | IDENT REL VALUE
//!          | IDENT "BETWEEN" "(" VALUE "," VALUE ")"
//!          | IDENT "IN" "(" VALUE ("," VALUE)* ")"
//! REL     := "=" | "!=" | "<" | "<=" | ">" | ">="
//! VALUE   := STRING | NUMBER | BOOL | IDENT "(" NUMBER ")"
//! ```
//!
//! The `IDENT "(" NUMBER ")"` value form is a bounds-checked cast
//! (`uint8(5)`, `float32(-3.2)`, ...); it is how untyped literals are
//! matched against strongly typed indexes.

mod compile;
mod lexer;
mod optimize;
mod parser;

pub use lexer::{Token, TokenKind};

use crate::error::Error;
use crate::query::Query;
use crate::value::Value;

/// Relational operator of a comparison term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed syntax tree. `AndNot` never comes out of the parser; the
/// optimizer introduces it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    Between {
        field: String,
        lo: Value,
        hi: Value,
        lo_open: bool,
        hi_open: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    AndNot(Box<Expr>, Box<Expr>),
}

/// Parses a query string into an optimized, executable query.
pub fn parse(input: &str) -> Result<Query, Error> {
    let ast = parser::parse(input)?;
    let ast = optimize::optimize(ast);
    Ok(compile::compile(ast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashIndex, IndexRegistry, SortedIndex};

    struct User {
        role: &'static str,
        ok: bool,
        price: f64,
    }

    /// Two users: 0 = developer / ok / 3.0, 1 = admin / not ok / 1.2.
    fn registry() -> IndexRegistry<User, i64> {
        let users = [
            User {
                role: "developer",
                ok: true,
                price: 3.0,
            },
            User {
                role: "admin",
                ok: false,
                price: 1.2,
            },
        ];

        let mut reg = IndexRegistry::new(Some(crate::index::KeyIndex::new(|u: &User| {
            if u.role == "developer" {
                40i64
            } else {
                42
            }
        })));
        reg.create(
            "role",
            Box::new(SortedIndex::new(|u: &User| u.role.to_string())),
            std::iter::empty(),
        )
        .unwrap();
        reg.create(
            "price",
            Box::new(SortedIndex::new(|u: &User| u.price)),
            std::iter::empty(),
        )
        .unwrap();
        reg.create(
            "ok",
            Box::new(HashIndex::new(|u: &User| u.ok)),
            std::iter::empty(),
        )
        .unwrap();

        for (slot, user) in users.iter().enumerate() {
            reg.set(user, slot as u32);
        }
        reg
    }

    fn run(reg: &IndexRegistry<User, i64>, input: &str) -> Vec<u32> {
        parse(input).unwrap().eval(reg).unwrap().to_vec()
    }

    fn run_unoptimized(reg: &IndexRegistry<User, i64>, input: &str) -> Vec<u32> {
        let ast = parser::parse(input).unwrap();
        compile::compile(ast).eval(reg).unwrap().to_vec()
    }

    #[test]
    fn test_queries_end_to_end() {
        let reg = registry();
        let cases: &[(&str, &[u32])] = &[
            (r#"id = 42"#, &[1]),
            (r#"role="admin""#, &[1]),
            (r#"role = 'admin'"#, &[1]),
            (r#"price = 1.2"#, &[1]),
            (r#"price = 4.2"#, &[]),
            (r#"ok = false"#, &[1]),
            (r#"ok = true"#, &[0]),
            (r#"NOT(ok = true)"#, &[1]),
            (r#"price < 3.0"#, &[1]),
            (r#"price <= 3.0"#, &[0, 1]),
            (r#"price > 1.2"#, &[0]),
            (r#"price >= 1.2"#, &[0, 1]),
            (r#"role != "admin""#, &[0]),
            (r#"id = 42 and role = "admin""#, &[1]),
            (r#"ok = true or price = 0.0"#, &[0]),
            (r#"role = "admin" AND price = 9.9"#, &[]),
            (r#"role = "admin" OR price = 9.9"#, &[1]),
            (r#"not (ok = true or price = 0.0)"#, &[1]),
            // AND binds tighter than OR
            (r#"role = "admin" OR ok = true AND price = 1.2"#, &[1]),
            (r#"role = "admin" OR ok = true AND price = 0.0"#, &[1]),
            (r#"role = "admin" OR (ok = true AND price = 1.2)"#, &[1]),
            (r#"role = "user" OR (ok = false AND price = 1.2)"#, &[1]),
            (r#"price BETWEEN(1.2, 3.0)"#, &[0, 1]),
            (r#"price between(2.0, 3.0)"#, &[0]),
            (r#"price between(3.0, 1.2)"#, &[]),
            (r#"role IN ("admin", "user")"#, &[1]),
            (r#"role IN ("admin", "developer")"#, &[0, 1]),
            (r#"role IN ("nobody")"#, &[]),
        ];

        for (input, expected) in cases {
            assert_eq!(&run(&reg, input), expected, "query: {input}");
        }
    }

    #[test]
    fn test_optimizer_preserves_semantics() {
        let reg = registry();
        let cases = [
            r#"NOT(NOT(role = "admin"))"#,
            r#"NOT(role != "admin")"#,
            r#"Not(price > 1.2)"#,
            r#"Not(price >= 1.3)"#,
            r#"Not(price < 3.0)"#,
            r#"Not(price <= 2.2)"#,
            r#"role = "admin" AND NOT(ok = true)"#,
            r#"NOT(ok = true) AND role = "admin""#,
            r#"price > 1.0 AND price < 2.0"#,
            r#"price >= 1.2 AND price < 3.0"#,
            r#"price > 1.2 AND price <= 3.0"#,
            r#"price >= 1.2 AND price <= 3.0"#,
            r#"not (ok = true or price = 0.0)"#,
        ];

        for input in cases {
            assert_eq!(
                run(&reg, input),
                run_unoptimized(&reg, input),
                "optimized and plain disagree on: {input}"
            );
        }
    }

    #[test]
    fn test_rewrites_fire() {
        use Expr::*;

        // NOT (a > v) parses + optimizes to a <= v
        let ast = optimize::optimize(parser::parse("NOT(price > 1.2)").unwrap());
        assert_eq!(
            ast,
            Cmp {
                field: "price".into(),
                op: CmpOp::Le,
                value: Value::F64(1.2),
            }
        );

        // strict/loose pairs merge into a range with matching open flags
        let ast = optimize::optimize(parser::parse("price > 1.0 AND price <= 2.0").unwrap());
        assert_eq!(
            ast,
            Between {
                field: "price".into(),
                lo: Value::F64(1.0),
                hi: Value::F64(2.0),
                lo_open: true,
                hi_open: false,
            }
        );

        // AND with a negated operand becomes ANDNOT
        let ast = optimize::optimize(parser::parse(r#"ok = true AND NOT(role = "x")"#).unwrap());
        let Expr::AndNot(base, sub) = ast else {
            panic!("expected AndNot");
        };
        assert!(matches!(*base, Cmp { op: CmpOp::Eq, .. }));
        assert!(matches!(*sub, Cmp { op: CmpOp::Eq, .. }));
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse("role = 3 role").unwrap_err();
        assert_eq!(
            err,
            Error::UnexpectedToken {
                actual: TokenKind::Ident,
                expected: TokenKind::Eof,
                span: (9, 13),
            }
        );
    }
}
