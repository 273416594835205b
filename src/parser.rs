//! Parser for symbolic right-hand-side expressions
//!
//! Parses expressions like:
//! - `a*x + b*y`
//! - `-k*x^2`
//! - `f(x, 2) / (1 + exp(-t))`
//! - `if(x < 0, -x, x)`

use crate::ast::{BinOp, Expr};
use crate::error::{CodegenError, CodegenResult};
use crate::lexer::{Lexer, Token};

/// Parser for expression text
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: Option<Token>,
    /// First lexer failure, reported when the parser reaches it
    pending_error: Option<CodegenError>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: None,
            pending_error: None,
        };
        parser.current = parser.pull();
        parser
    }

    fn pull(&mut self) -> Option<Token> {
        match self.lexer.next() {
            Some(Ok(token)) => Some(token),
            Some(Err(err)) => {
                self.pending_error.get_or_insert(err);
                None
            }
            None => None,
        }
    }

    /// Advance to the next token
    fn advance(&mut self) -> Option<Token> {
        let prev = self.current.take();
        self.current = self.pull();
        prev
    }

    /// Check if current token matches expected
    fn check(&self, expected: &Token) -> bool {
        match &self.current {
            Some(tok) => std::mem::discriminant(tok) == std::mem::discriminant(expected),
            None => false,
        }
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, expected: Token) -> CodegenResult<Token> {
        if self.check(&expected) {
            self.advance()
                .ok_or_else(|| CodegenError::parse_error("Unexpected end of input"))
        } else {
            Err(self.unexpected(&format!("`{}`", expected)))
        }
    }

    fn unexpected(&mut self, wanted: &str) -> CodegenError {
        if let Some(err) = self.pending_error.take() {
            return err;
        }
        match &self.current {
            Some(tok) => CodegenError::parse_error(format!("Expected {}, got `{}`", wanted, tok)),
            None => CodegenError::parse_error(format!("Expected {}, got end of input", wanted)),
        }
    }

    /// Parse one complete expression, rejecting trailing input
    pub fn parse_expression(&mut self) -> CodegenResult<Expr> {
        let expr = self.parse_expr()?;
        if self.current.is_some() || self.pending_error.is_some() {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    /// Parse an expression (handles operator precedence)
    pub fn parse_expr(&mut self) -> CodegenResult<Expr> {
        self.parse_comparison()
    }

    /// Parse comparisons: a < b, a == b
    fn parse_comparison(&mut self) -> CodegenResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match &self.current {
                Some(Token::Less) => BinOp::Less,
                Some(Token::LessEq) => BinOp::LessEq,
                Some(Token::Greater) => BinOp::Greater,
                Some(Token::GreaterEq) => BinOp::GreaterEq,
                Some(Token::EqEq) => BinOp::Equal,
                Some(Token::NotEq) => BinOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse additive expressions: a + b, a - b
    fn parse_additive(&mut self) -> CodegenResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = if self.check(&Token::Plus) {
                BinOp::Add
            } else if self.check(&Token::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse multiplicative expressions: a * b, a / b
    fn parse_multiplicative(&mut self) -> CodegenResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = if self.check(&Token::Star) {
                BinOp::Mul
            } else if self.check(&Token::Slash) {
                BinOp::Div
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse unary expressions: -a, +a
    fn parse_unary(&mut self) -> CodegenResult<Expr> {
        if self.check(&Token::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            Ok(Expr::Neg(Box::new(operand)))
        } else if self.check(&Token::Plus) {
            self.advance();
            self.parse_unary()
        } else {
            self.parse_power()
        }
    }

    /// Parse powers: a ^ b (right associative, exponent may be negated)
    fn parse_power(&mut self) -> CodegenResult<Expr> {
        let base = self.parse_primary()?;

        if self.check(&Token::Caret) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::binary(BinOp::Pow, base, exponent));
        }

        Ok(base)
    }

    /// Parse primary expressions: literals, names, calls, parenthesized
    fn parse_primary(&mut self) -> CodegenResult<Expr> {
        match &self.current {
            Some(Token::Number(text)) => {
                let text = text.clone();
                self.advance();
                Ok(Expr::Number(text))
            }

            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();

                if self.check(&Token::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Expr::Call { name, args });
                }

                Ok(Expr::Ident(name))
            }

            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }

            _ => Err(self.unexpected("an operand")),
        }
    }

    /// Parse function arguments: (arg1, arg2, ...)
    fn parse_args(&mut self) -> CodegenResult<Vec<Expr>> {
        self.expect(Token::LParen)?;

        let mut args = Vec::new();

        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);

            while self.check(&Token::Comma) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expr {
        Parser::new(source).parse_expression().unwrap()
    }

    #[test]
    fn test_parse_sum_of_products() {
        let expr = parse("a*x + b*y");
        if let Expr::Binary { op: BinOp::Add, lhs, rhs } = &expr {
            assert!(matches!(lhs.as_ref(), Expr::Binary { op: BinOp::Mul, .. }));
            assert!(matches!(rhs.as_ref(), Expr::Binary { op: BinOp::Mul, .. }));
        } else {
            panic!("Expected Add expression");
        }
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            parse("a - b - c"),
            Expr::binary(
                BinOp::Sub,
                Expr::binary(BinOp::Sub, Expr::ident("a"), Expr::ident("b")),
                Expr::ident("c"),
            )
        );
    }

    #[test]
    fn test_power_is_right_associative_and_binds_over_negation() {
        assert_eq!(
            parse("-x^2^n"),
            Expr::Neg(Box::new(Expr::binary(
                BinOp::Pow,
                Expr::ident("x"),
                Expr::binary(BinOp::Pow, Expr::number("2"), Expr::ident("n")),
            )))
        );
    }

    #[test]
    fn test_negative_exponent() {
        assert_eq!(
            parse("2^-t"),
            Expr::binary(
                BinOp::Pow,
                Expr::number("2"),
                Expr::Neg(Box::new(Expr::ident("t")))
            )
        );
    }

    #[test]
    fn test_parse_nested_calls() {
        let expr = parse("f(g(x), 1 + y)");
        if let Expr::Call { name, args } = &expr {
            assert_eq!(name, "f");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0], Expr::Call { name, .. } if name == "g"));
        } else {
            panic!("Expected Call");
        }
    }

    #[test]
    fn test_empty_call() {
        assert_eq!(parse("rand()"), Expr::call("rand", Vec::new()));
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = Parser::new("a b").parse_expression().unwrap_err();
        assert!(matches!(err, CodegenError::ParseError { .. }));
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let err = Parser::new("(a + b").parse_expression().unwrap_err();
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn test_lexer_error_surfaces() {
        let err = Parser::new("a + #").parse_expression().unwrap_err();
        assert!(matches!(err, CodegenError::LexerError { position: 4, .. }));
    }
}
