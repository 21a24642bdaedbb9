use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{Debug, Display},
    rc::Rc,
};

use wild_syntax::ast::{Block, FnKind};

use crate::{
    environment::Env,
    error::{ErrorKind, RuntimeError},
    interpret::Interpreter,
};

#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    Str(String),
    Document(Rc<RefCell<Document>>),
    Func(Rc<Func>),
    NativeFunc(NativeFunc),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::Document(_) => "document",
            Self::Func(_) | Self::NativeFunc(_) => "func",
        }
    }

    pub fn new_document(doc: Document) -> Self {
        Self::Document(Rc::new(RefCell::new(doc)))
    }
}

/// Documents compare by identity, not contents: meta chains may be
/// cyclic, so a structural comparison could never terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Document(a), Self::Document(b)) => Rc::ptr_eq(a, b),
            (Self::Func(a), Self::Func(b)) => Rc::ptr_eq(a, b),
            (Self::NativeFunc(a), Self::NativeFunc(b)) => a == b,
            _ => false,
        }
    }
}

/// Documents may contain themselves, so rendering stops at a fixed
/// depth instead of recursing forever.
const DISPLAY_DEPTH_LIMIT: usize = 16;

impl Value {
    fn fmt_at(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Document(d) => d.borrow().fmt_at(f, depth),
            Self::Func(func) => write!(f, "{func}"),
            Self::NativeFunc(func) => write!(f, "{func}"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_at(f, 0)
    }
}

/// The one compound value of the language: an ordered list, a dict
/// keyed by strings or numbers, named attributes, and an optional
/// prototype searched by meta dispatch.
#[derive(Debug, Default)]
pub struct Document {
    pub list: Vec<Value>,
    pub dict: Dict,
    pub attrs: HashMap<String, Value>,
    pub meta: Option<Rc<RefCell<Document>>>,
}

impl Document {
    pub fn len(&self) -> usize {
        self.attrs.len() + self.list.len() + self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Document {
    fn fmt_at(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        if depth >= DISPLAY_DEPTH_LIMIT {
            return f.write_str("...");
        }
        // A pure list renders like a list literal
        if self.attrs.is_empty() && self.dict.len() == 0 {
            f.write_str("[")?;
            for (i, v) in self.list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                v.fmt_at(f, depth + 1)?;
            }
            return f.write_str("]");
        }
        f.write_str("{")?;
        let mut first = true;
        let mut sep = |f: &mut std::fmt::Formatter<'_>| {
            if first {
                first = false;
                Ok(())
            } else {
                f.write_str(", ")
            }
        };
        for (name, v) in &self.attrs {
            sep(f)?;
            write!(f, "{name} = ")?;
            v.fmt_at(f, depth + 1)?;
        }
        for (k, v) in self.dict.entries() {
            sep(f)?;
            write!(f, "{k}: ")?;
            v.fmt_at(f, depth + 1)?;
        }
        for v in &self.list {
            sep(f)?;
            v.fmt_at(f, depth + 1)?;
        }
        f.write_str("}")
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_at(f, 0)
    }
}

/// Dict storage partitioned by key type. Number keys hash by their bit
/// pattern since f64 itself is not hashable.
#[derive(Debug, Default)]
pub struct Dict {
    str_keys: HashMap<String, Value>,
    num_keys: HashMap<u64, (f64, Value)>,
}

impl Dict {
    pub fn get(&self, key: &Value) -> Result<Option<Value>, ErrorKind> {
        match key {
            Value::Str(s) => Ok(self.str_keys.get(s).cloned()),
            Value::Number(n) => Ok(self.num_keys.get(&n.to_bits()).map(|(_, v)| v.clone())),
            other => Err(ErrorKind::InvalidKey(other.type_name())),
        }
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), ErrorKind> {
        match key {
            Value::Str(s) => {
                self.str_keys.insert(s, value);
                Ok(())
            }
            Value::Number(n) => {
                self.num_keys.insert(n.to_bits(), (n, value));
                Ok(())
            }
            other => Err(ErrorKind::InvalidKey(other.type_name())),
        }
    }

    pub fn len(&self) -> usize {
        self.str_keys.len() + self.num_keys.len()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().map(|(_, v)| v).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.str_keys
            .iter()
            .map(|(k, v)| (Value::Str(k.clone()), v.clone()))
            .chain(
                self.num_keys
                    .values()
                    .map(|(k, v)| (Value::Number(*k), v.clone())),
            )
    }
}

#[derive(Debug)]
pub struct Func {
    pub params: Vec<String>,
    pub body: Rc<Block>,
    pub env: Rc<RefCell<Env>>,
    pub kind: FnKind,
}

impl Display for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn({})", self.params.join(", "))
    }
}

#[derive(Clone)]
pub struct NativeFunc {
    pub name: &'static str,
    /// `None` marks a variadic function.
    pub arity: Option<usize>,
    /// Methods receive their subject prepended to the argument vector.
    pub method: bool,
    pub body: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl PartialEq for NativeFunc {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("method", &self.method)
            .finish()
    }
}

impl Display for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "native fn {}", self.name)
    }
}

/// Control signals threaded through statement evaluation, kept apart
/// from the error channel so `return` inside a loop inside a function
/// needs no string matching to route.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    Value(Value),
    Return(Value),
    Break,
    Continue,
    Export(Value),
}
