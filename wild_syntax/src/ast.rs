use std::{fmt::Display, rc::Rc};

use crate::token::TokenKind;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for stmt in &self.stmts {
            writeln!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Let { name: String, value: Expr },
    Assign { target: Expr, value: Expr },
    Return(Option<Expr>),
    Break,
    Continue,
    Import(Vec<String>),
    Export(Expr),
    Expr(Expr),
}

impl Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StmtKind::Let { name, value } => write!(f, "let {name} = {value};"),
            StmtKind::Assign { target, value } => write!(f, "{target} = {value};"),
            StmtKind::Return(Some(e)) => write!(f, "return {e};"),
            StmtKind::Return(None) => f.write_str("return;"),
            StmtKind::Break => f.write_str("break;"),
            StmtKind::Continue => f.write_str("continue;"),
            StmtKind::Import(path) => write!(f, "import {};", path.join(".")),
            StmtKind::Export(e) => write!(f, "export {e};"),
            StmtKind::Expr(e) => write!(f, "{e};"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{ ")?;
        for stmt in &self.stmts {
            write!(f, "{stmt} ")?;
        }
        f.write_str("}")
    }
}

/// How a function literal passes itself to its body. `Method` literals
/// (written in attribute position inside a document literal) receive the
/// owning document prepended as `self`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FnKind {
    Function,
    Lambda,
    Method,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DocEntry {
    /// `key: value`, stored in the document's dict part.
    Key { key: Expr, value: Expr },
    /// `name = value`, stored in the document's attribute map.
    Attr { name: String, value: Expr },
}

impl Display for DocEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key { key, value } => write!(f, "{key}: {value}"),
            Self::Attr { name, value } => write!(f, "{name} = {value}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Neg,
}

impl PrefixOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::BANG | TokenKind::NOT => Self::Not,
            TokenKind::MINUS => Self::Neg,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Not => "!",
            Self::Neg => "-",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl InfixOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS => Self::Add,
            TokenKind::MINUS => Self::Sub,
            TokenKind::STAR => Self::Mul,
            TokenKind::SLASH => Self::Div,
            TokenKind::SLASH_SLASH => Self::FloorDiv,
            TokenKind::PERCENT => Self::Mod,
            TokenKind::CARET => Self::Pow,
            TokenKind::EQUAL_EQUAL => Self::EqualEqual,
            TokenKind::BANG_EQUAL => Self::BangEqual,
            TokenKind::LESS => Self::Less,
            TokenKind::LESS_EQUAL => Self::LessEqual,
            TokenKind::GREATER => Self::Greater,
            TokenKind::GREATER_EQUAL => Self::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for InfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "^",
            Self::EqualEqual => "==",
            Self::BangEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::AND => Self::And,
            TokenKind::OR => Self::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Boolean(bool),
    Nil,
    Ident(String),
    Prefix {
        op: PrefixOp,
        expr: Box<Expr>,
    },
    Infix {
        lhs: Box<Expr>,
        op: InfixOp,
        rhs: Box<Expr>,
    },
    Logical {
        lhs: Box<Expr>,
        op: LogicalOp,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        obj: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        obj: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Property {
        obj: Box<Expr>,
        name: String,
    },
    Key {
        obj: Box<Expr>,
        key: Box<Expr>,
    },
    /// The body is shared so that closures over the same literal reuse one
    /// AST allocation.
    FnLit {
        params: Vec<String>,
        body: Rc<Block>,
        kind: FnKind,
    },
    List(Vec<Expr>),
    Doc(Vec<DocEntry>),
    Block(Block),
    /// The dual-mode postfix loop `cond { body }`.
    Loop {
        cond: Box<Expr>,
        body: Block,
    },
    While {
        cond: Box<Expr>,
        body: Block,
    },
    Repeat {
        body: Block,
        until: Box<Expr>,
    },
    For {
        binding: Option<String>,
        iterable: Box<Expr>,
        body: Block,
    },
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Nil => f.write_str("nil"),
            Self::Ident(name) => f.write_str(name),
            Self::Prefix { op, expr } => write!(f, "({op}{expr})"),
            Self::Infix { lhs, op, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Logical { lhs, op, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Ternary {
                cond,
                then,
                otherwise,
            } => match otherwise {
                Some(e) => write!(f, "({cond} ? {then} : {e})"),
                None => write!(f, "({cond} ? {then} : nil)"),
            },
            Self::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Index { obj, index } => write!(f, "{obj}[{index}]"),
            Self::Slice { obj, start, end } => {
                write!(f, "{obj}[")?;
                if let Some(s) = start {
                    write!(f, "{s}")?;
                }
                f.write_str(":")?;
                if let Some(e) = end {
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            Self::Property { obj, name } => write!(f, "{obj}.{name}"),
            Self::Key { obj, key } => write!(f, "{obj}{{{key}}}"),
            Self::FnLit { params, body, .. } => {
                write!(f, "fn({}) {body}", params.join(", "))
            }
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Doc(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{entry}")?;
                }
                f.write_str("}")
            }
            Self::Block(block) => write!(f, "{block}"),
            Self::Loop { cond, body } => write!(f, "{cond} {body}"),
            Self::While { cond, body } => write!(f, "while {cond} do {body}"),
            Self::Repeat { body, until } => write!(f, "repeat {body} until {until}"),
            Self::For {
                binding,
                iterable,
                body,
            } => match binding {
                Some(name) => write!(f, "for {name} in {iterable} do {body}"),
                None => write!(f, "for {iterable} do {body}"),
            },
        }
    }
}
