//! Recursive-descent parser: token stream to AST.

use super::lexer::{Lexer, Token, TokenKind};
use super::{CmpOp, Expr};
use crate::error::Error;
use crate::value::Value;

pub(crate) fn parse(input: &str) -> Result<Expr, Error> {
    let mut parser = Parser::new(input);
    let ast = parser.parse_or()?;
    if parser.current.kind != TokenKind::Eof {
        return Err(parser.unexpected(TokenKind::Eof));
    }
    Ok(ast)
}

struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Parser {
            input,
            lexer,
            current,
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn text(&self) -> &'a str {
        &self.input[self.current.start..self.current.end]
    }

    fn unexpected(&self, expected: TokenKind) -> Error {
        Error::UnexpectedToken {
            actual: self.current.kind,
            expected,
            span: self.current.span(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Error> {
        if self.current.kind != kind {
            return Err(self.unexpected(kind));
        }
        self.advance();
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_and()?;
        while self.current.kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        while self.current.kind == TokenKind::And {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        if self.current.kind == TokenKind::Not {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        if self.current.kind == TokenKind::LParen {
            self.advance();
            let inner = self.parse_or()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }

        if self.current.kind != TokenKind::Ident {
            return Err(self.unexpected(TokenKind::Ident));
        }
        let field = self.text().to_string();
        self.advance();

        match self.current.kind {
            TokenKind::Between => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let lo = self.parse_value()?;
                self.expect(TokenKind::Comma)?;
                let hi = self.parse_value()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Between {
                    field,
                    lo,
                    hi,
                    lo_open: false,
                    hi_open: false,
                })
            }
            TokenKind::In => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let mut values = vec![self.parse_value()?];
                while self.current.kind == TokenKind::Comma {
                    self.advance();
                    values.push(self.parse_value()?);
                }
                self.expect(TokenKind::RParen)?;
                Ok(Expr::In { field, values })
            }
            kind => {
                let op = match kind {
                    TokenKind::Eq => CmpOp::Eq,
                    TokenKind::Ne => CmpOp::Ne,
                    TokenKind::Lt => CmpOp::Lt,
                    TokenKind::Le => CmpOp::Le,
                    TokenKind::Gt => CmpOp::Gt,
                    TokenKind::Ge => CmpOp::Ge,
                    _ => return Err(self.unexpected(TokenKind::Eq)),
                };
                self.advance();
                let value = self.parse_value()?;
                Ok(Expr::Cmp { field, op, value })
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, Error> {
        match self.current.kind {
            TokenKind::Str => {
                let value = Value::Str(self.text().to_string());
                self.advance();
                Ok(value)
            }
            TokenKind::Number => {
                let value = self.parse_number()?;
                self.advance();
                Ok(value)
            }
            TokenKind::Bool => {
                let value = Value::Bool(self.text().eq_ignore_ascii_case("true"));
                self.advance();
                Ok(value)
            }
            // typed cast: uint8(10), float32(-3.2), ...
            TokenKind::Ident => {
                let type_name = self.text().to_string();
                self.advance();
                self.expect(TokenKind::LParen)?;
                if self.current.kind != TokenKind::Number {
                    return Err(self.unexpected(TokenKind::Number));
                }
                let value = cast_value(&type_name, self.text())?;
                self.advance();
                self.expect(TokenKind::RParen)?;
                Ok(value)
            }
            _ => Err(self.unexpected(TokenKind::Str)),
        }
    }

    /// Untyped literal: integers become `i64`, anything with a dot `f64`.
    fn parse_number(&mut self) -> Result<Value, Error> {
        let text = self.text();
        let parsed = if text.contains('.') {
            text.parse::<f64>().map(Value::F64).ok()
        } else {
            text.parse::<i64>().map(Value::I64).ok()
        };
        parsed.ok_or_else(|| self.unexpected(TokenKind::Number))
    }
}

macro_rules! checked_cast {
    ($literal:expr, $ty:ty, $variant:ident, $name:expr) => {
        $literal
            .parse::<$ty>()
            .map(Value::$variant)
            .map_err(|e| Error::Cast {
                type_name: $name.to_string(),
                reason: e.to_string(),
            })
    };
}

/// Bounds-checked numeric cast; each target type re-parses the literal so
/// overflow and float-to-int mismatches fail here rather than match
/// nothing later.
fn cast_value(type_name: &str, literal: &str) -> Result<Value, Error> {
    match type_name {
        "int8" => checked_cast!(literal, i8, I8, type_name),
        "int16" => checked_cast!(literal, i16, I16, type_name),
        "int32" => checked_cast!(literal, i32, I32, type_name),
        "int" | "int64" => checked_cast!(literal, i64, I64, type_name),
        "uint8" => checked_cast!(literal, u8, U8, type_name),
        "uint16" => checked_cast!(literal, u16, U16, type_name),
        "uint32" => checked_cast!(literal, u32, U32, type_name),
        "uint" | "uint64" => checked_cast!(literal, u64, U64, type_name),
        "float32" => checked_cast!(literal, f32, F32, type_name),
        "float64" => checked_cast!(literal, f64, F64, type_name),
        _ => Err(Error::Cast {
            type_name: type_name.to_string(),
            reason: "unsupported cast type".to_string(),
        }),
    }
}
