use std::fmt::Display;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ErrorKind {
    // Memory errors
    #[error("undefined variable {0}")]
    UndefinedVar(String),
    #[error("{0} is already declared in this scope")]
    Redeclaration(String),
    // Type errors
    #[error("unsupported operation {op} on {ty}")]
    UnsupportedOp { ty: &'static str, op: String },
    #[error("mismatched operand types {lhs} and {rhs}")]
    MismatchedTypes {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("expected a boolean condition, found {0}")]
    ExpectedBoolean(&'static str),
    #[error("expected a number, found {0}")]
    ExpectedNumber(&'static str),
    #[error("expected a document, found {0}")]
    ExpectedDocument(&'static str),
    #[error("cannot parse {0} as a number")]
    InvalidNumber(String),
    // Arithmetic errors
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    // Access errors
    #[error("index {0} out of range")]
    IndexOutOfRange(f64),
    #[error("invalid slice bounds {0}:{1}")]
    InvalidSlice(f64, f64),
    #[error("undefined attribute {0}")]
    UndefinedAttribute(String),
    #[error("missing key {0}")]
    KeyNotFound(String),
    #[error("dict keys must be strings or numbers, found {0}")]
    InvalidKey(&'static str),
    // Call errors
    #[error("{0} is not callable")]
    NotCallable(&'static str),
    #[error("wrong argument count: found {found}, expected {expected}")]
    ArgCount { expected: usize, found: usize },
    // Signal leaks
    #[error("{0} outside a loop")]
    StrayLoopSignal(&'static str),
    #[error("return outside a function")]
    StrayReturn,
    #[error("export outside the top level")]
    StrayExport,
    #[error("method {0} called without a subject")]
    MethodWithoutSubject(&'static str),
    // Meta errors
    #[error("meta chain deeper than {0} links")]
    MetaDepthExceeded(usize),
    #[error("__next must yield a document with value and ok")]
    BadIterator,
    // Module errors
    #[error("cannot read module {path}: {reason}")]
    ImportFailed { path: String, reason: String },
    #[error("syntax error in module {path}: {message}")]
    ImportSyntax { path: String, message: String },
    #[error("circular import of {0}")]
    ImportCycle(String),
    // Host I/O
    #[error("{0}")]
    Io(String),
}

/// A runtime error with the position of the nearest enclosing
/// statement, attached on the way out of statement evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub pos: Option<(usize, usize)>,
}

impl RuntimeError {
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.pos.get_or_insert((line, column));
        self
    }
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, pos: None }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.pos {
            Some((line, column)) => write!(f, "{line}:{column}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
