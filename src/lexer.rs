//! Lexer for symbolic right-hand-side expressions using logos
//!
//! Supports tokens like:
//! - Identifiers: x, k_on, p_
//! - Numbers: 1, 2.5, .5, 1e-3 (kept as source text)
//! - Operators: +, -, *, /, ^, **
//! - Comparisons: <, <=, >, >=, ==, !=
//! - Punctuation: (, ), ,

use logos::Logos;

use crate::error::{CodegenError, CodegenResult};

/// Token types for the expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Literals
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("^")]
    #[token("**")]
    Caret,

    #[token("<")]
    Less,

    #[token("<=")]
    LessEq,

    #[token(">")]
    Greater,

    #[token(">=")]
    GreaterEq,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    // Punctuation
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::Less => write!(f, "<"),
            Token::LessEq => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEq => write!(f, ">="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// Lexer wrapper that turns unrecognised input into positioned errors
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = CodegenResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        Some(token.map_err(|_| CodegenError::LexerError {
            position: self.inner.span().start,
            message: format!("unexpected input `{}`", self.inner.slice()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source).collect::<CodegenResult<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            tokens("a*x + b*y"),
            vec![
                Token::Ident("a".to_string()),
                Token::Star,
                Token::Ident("x".to_string()),
                Token::Plus,
                Token::Ident("b".to_string()),
                Token::Star,
                Token::Ident("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers_keep_source_text() {
        assert_eq!(
            tokens("1.50 + .5 - 2e-3"),
            vec![
                Token::Number("1.50".to_string()),
                Token::Plus,
                Token::Number(".5".to_string()),
                Token::Minus,
                Token::Number("2e-3".to_string()),
            ]
        );
    }

    #[test]
    fn test_power_spellings() {
        assert_eq!(tokens("x^2")[1], Token::Caret);
        assert_eq!(tokens("x**2")[1], Token::Caret);
    }

    #[test]
    fn test_call_and_comparison() {
        assert_eq!(
            tokens("if(x <= 1, f(x), 0)"),
            vec![
                Token::Ident("if".to_string()),
                Token::LParen,
                Token::Ident("x".to_string()),
                Token::LessEq,
                Token::Number("1".to_string()),
                Token::Comma,
                Token::Ident("f".to_string()),
                Token::LParen,
                Token::Ident("x".to_string()),
                Token::RParen,
                Token::Comma,
                Token::Number("0".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_unknown_character_reports_position() {
        let err = Lexer::new("x + $y")
            .collect::<CodegenResult<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(err, CodegenError::LexerError { position: 4, .. }));
    }
}
