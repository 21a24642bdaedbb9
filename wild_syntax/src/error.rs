use std::fmt::Display;

use crate::token::Token;

#[derive(Debug)]
pub enum ErrorMsg {
    // Collection errors
    IllegalToken,
    // Parse errors
    UnexpectedToken,
    MissingSemicolon,
    InvalidIdent,
    MissingParen,
    MissingBrace,
    MissingBracket,
    InvalidAssignment,
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::IllegalToken => "illegal token",
            Self::UnexpectedToken => "unexpected token",
            Self::MissingSemicolon => "missing semicolon, found",
            Self::InvalidIdent => "expected an identifier, found",
            Self::MissingParen => "missing closing parenthesis, found",
            Self::MissingBrace => "missing closing brace, found",
            Self::MissingBracket => "missing closing bracket, found",
            Self::InvalidAssignment => "cannot assign to",
        })
    }
}

/// A syntax error pinned to a source position.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(msg: ErrorMsg, token: &Token) -> Self {
        Self {
            message: format!("{msg} {token}"),
            line: token.line,
            column: token.column,
        }
    }

    pub fn raw(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}
