//! Meta-dispatch: attribute resolution through prototype chains and
//! the per-type default operation tables that back every operator,
//! access form, and coercion in the language.

use std::{cell::RefCell, rc::Rc};

use crate::{
    error::{ErrorKind, RuntimeError},
    interpret::Interpreter,
    stdlib,
    types::{Document, Value},
};

/// Meta chains are user-assembled and may be cyclic, so resolution
/// gives up after this many links instead of spinning.
pub const META_DEPTH_LIMIT: usize = 64;

/// Resolves a name against a document's own attributes, then up its
/// meta chain.
pub fn lookup(doc: &Rc<RefCell<Document>>, name: &str) -> Result<Option<Value>, ErrorKind> {
    let mut current = Rc::clone(doc);
    for _ in 0..META_DEPTH_LIMIT {
        let next = {
            let d = current.borrow();
            if let Some(value) = d.attrs.get(name) {
                return Ok(Some(value.clone()));
            }
            match &d.meta {
                Some(meta) => Rc::clone(meta),
                None => return Ok(None),
            }
        };
        current = next;
    }
    Err(ErrorKind::MetaDepthExceeded(META_DEPTH_LIMIT))
}

/// The default operation tables, consulted when no meta hook matches.
pub fn dispatch(
    interp: &mut Interpreter,
    subject: Value,
    op: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match &subject {
        Value::Number(n) => number_op(*n, op, &args).map_err(Into::into),
        Value::Str(s) => str_op(s, op, &args).map_err(Into::into),
        Value::Boolean(b) => bool_op(*b, op, &args).map_err(Into::into),
        Value::Nil => nil_op(op, &args).map_err(Into::into),
        Value::Document(d) => doc_op(interp, d, op, &args),
        Value::Func(_) | Value::NativeFunc(_) => func_op(interp, subject, op, args),
    }
}

fn unsupported(ty: &'static str, op: &str) -> ErrorKind {
    ErrorKind::UnsupportedOp {
        ty,
        op: op.to_string(),
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

fn num_arg(args: &[Value], i: usize) -> Result<f64, ErrorKind> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(ErrorKind::ExpectedNumber(other.type_name())),
        None => Err(ErrorKind::ExpectedNumber("nil")),
    }
}

/// Slice bounds: nil means the respective end, anything else must be
/// a number within range.
fn slice_bounds(start: &Value, end: &Value, len: usize) -> Result<(usize, usize), ErrorKind> {
    let lo = match start {
        Value::Nil => 0.0,
        Value::Number(n) => *n,
        other => return Err(ErrorKind::ExpectedNumber(other.type_name())),
    };
    let hi = match end {
        Value::Nil => len as f64,
        Value::Number(n) => *n,
        other => return Err(ErrorKind::ExpectedNumber(other.type_name())),
    };
    if lo < 0.0 || hi < lo || hi > len as f64 {
        return Err(ErrorKind::InvalidSlice(lo, hi));
    }
    Ok((lo as usize, hi as usize))
}

fn number_op(n: f64, op: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    Ok(match op {
        "__add" => Value::Number(n + num_arg(args, 0)?),
        "__sub" => Value::Number(n - num_arg(args, 0)?),
        "__mul" => Value::Number(n * num_arg(args, 0)?),
        "__div" => {
            let m = num_arg(args, 0)?;
            if m == 0.0 {
                return Err(ErrorKind::DivisionByZero);
            }
            Value::Number(n / m)
        }
        "__floor_div" => {
            let m = num_arg(args, 0)?;
            if m == 0.0 {
                return Err(ErrorKind::DivisionByZero);
            }
            Value::Number((n / m).floor())
        }
        // Truncated remainder, sign of the dividend
        "__mod" => {
            let m = num_arg(args, 0)?;
            if m == 0.0 {
                return Err(ErrorKind::ModuloByZero);
            }
            Value::Number(n % m)
        }
        "__pow" => Value::Number(n.powf(num_arg(args, 0)?)),
        "__unm" => Value::Number(-n),
        "__eq" => Value::Boolean(n == num_arg(args, 0)?),
        "__ne" => Value::Boolean(n != num_arg(args, 0)?),
        "__lt" => Value::Boolean(n < num_arg(args, 0)?),
        "__le" => Value::Boolean(n <= num_arg(args, 0)?),
        "__gt" => Value::Boolean(n > num_arg(args, 0)?),
        "__ge" => Value::Boolean(n >= num_arg(args, 0)?),
        "__str" => Value::Str(n.to_string()),
        "__num" => Value::Number(n),
        "__bool" => Value::Boolean(n != 0.0),
        _ => return Err(unsupported("number", op)),
    })
}

fn str_op(s: &str, op: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    let other = |i: usize| -> Result<String, ErrorKind> {
        match args.get(i) {
            Some(Value::Str(t)) => Ok(t.clone()),
            Some(v) => Err(ErrorKind::MismatchedTypes {
                lhs: "str",
                rhs: v.type_name(),
            }),
            None => Err(ErrorKind::MismatchedTypes {
                lhs: "str",
                rhs: "nil",
            }),
        }
    };
    Ok(match op {
        "__add" => Value::Str(format!("{s}{}", other(0)?)),
        "__eq" => Value::Boolean(s == other(0)?),
        "__ne" => Value::Boolean(s != other(0)?),
        "__lt" => Value::Boolean(s < other(0)?.as_str()),
        "__le" => Value::Boolean(s <= other(0)?.as_str()),
        "__gt" => Value::Boolean(s > other(0)?.as_str()),
        "__ge" => Value::Boolean(s >= other(0)?.as_str()),
        "__len" => Value::Number(s.chars().count() as f64),
        // Indexing and slicing address code points, not bytes
        "__index" => {
            let i = num_arg(args, 0)?;
            if i < 0.0 {
                return Err(ErrorKind::IndexOutOfRange(i));
            }
            match s.chars().nth(i as usize) {
                Some(c) => Value::Str(c.to_string()),
                None => return Err(ErrorKind::IndexOutOfRange(i)),
            }
        }
        "__slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (lo, hi) = slice_bounds(&arg(args, 0), &arg(args, 1), chars.len())?;
            Value::Str(chars[lo..hi].iter().collect())
        }
        "__num" => match s.trim().parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => return Err(ErrorKind::InvalidNumber(s.to_string())),
        },
        "__bool" => Value::Boolean(!s.is_empty()),
        "__str" => Value::Str(s.to_string()),
        "__iter" => stdlib::new_cursor(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => return Err(unsupported("str", op)),
    })
}

fn bool_op(b: bool, op: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    let other = |i: usize| -> Result<bool, ErrorKind> {
        match args.get(i) {
            Some(Value::Boolean(v)) => Ok(*v),
            Some(v) => Err(ErrorKind::ExpectedBoolean(v.type_name())),
            None => Err(ErrorKind::ExpectedBoolean("nil")),
        }
    };
    Ok(match op {
        "__not" => Value::Boolean(!b),
        "__eq" => Value::Boolean(b == other(0)?),
        "__ne" => Value::Boolean(b != other(0)?),
        "__str" => Value::Str(b.to_string()),
        "__bool" => Value::Boolean(b),
        _ => return Err(unsupported("boolean", op)),
    })
}

fn nil_op(op: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    Ok(match op {
        "__eq" => Value::Boolean(matches!(args.first(), Some(Value::Nil))),
        "__ne" => Value::Boolean(!matches!(args.first(), Some(Value::Nil))),
        "__str" => Value::Str("nil".to_string()),
        "__bool" => Value::Boolean(false),
        _ => return Err(unsupported("nil", op)),
    })
}

fn doc_op(
    interp: &mut Interpreter,
    doc: &Rc<RefCell<Document>>,
    op: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let subject = || Value::Document(Rc::clone(doc));
    let result = match op {
        "__len" => Value::Number(doc.borrow().len() as f64),
        "__bool" => Value::Boolean(!doc.borrow().is_empty()),
        "__str" => Value::Str(doc.borrow().to_string()),
        "__eq" => Value::Boolean(arg(args, 0) == subject()),
        "__ne" => Value::Boolean(arg(args, 0) != subject()),
        "__index" => {
            let i = num_arg(args, 0)?;
            let d = doc.borrow();
            if i < 0.0 || i as usize >= d.list.len() {
                return Err(ErrorKind::IndexOutOfRange(i).into());
            }
            d.list[i as usize].clone()
        }
        "__set_index" => {
            let i = num_arg(args, 0)?;
            let mut d = doc.borrow_mut();
            if i < 0.0 || i as usize >= d.list.len() {
                return Err(ErrorKind::IndexOutOfRange(i).into());
            }
            d.list[i as usize] = arg(args, 1);
            subject()
        }
        "__slice" => {
            let items = {
                let d = doc.borrow();
                let (lo, hi) = slice_bounds(&arg(args, 0), &arg(args, 1), d.list.len())?;
                d.list[lo..hi].to_vec()
            };
            stdlib::new_list(interp, items)
        }
        "__set_slice" => {
            let Value::Document(src) = arg(args, 2) else {
                return Err(ErrorKind::ExpectedDocument(arg(args, 2).type_name()).into());
            };
            let replacement = src.borrow().list.clone();
            let mut d = doc.borrow_mut();
            let (lo, hi) = slice_bounds(&arg(args, 0), &arg(args, 1), d.list.len())?;
            d.list.splice(lo..hi, replacement);
            subject()
        }
        "__key" => {
            let key = arg(args, 0);
            match doc.borrow().dict.get(&key)? {
                Some(v) => v,
                None => return Err(ErrorKind::KeyNotFound(key.to_string()).into()),
            }
        }
        "__set_key" => {
            doc.borrow_mut().dict.insert(arg(args, 0), arg(args, 1))?;
            subject()
        }
        "__dict" => {
            let entries: Vec<_> = doc.borrow().dict.entries().collect();
            stdlib::new_dict(interp, entries)?
        }
        "__set_dict" => {
            let Value::Document(src) = arg(args, 0) else {
                return Err(ErrorKind::ExpectedDocument(arg(args, 0).type_name()).into());
            };
            let entries: Vec<_> = src.borrow().dict.entries().collect();
            let mut d = doc.borrow_mut();
            d.dict = Default::default();
            for (k, v) in entries {
                d.dict.insert(k, v)?;
            }
            subject()
        }
        "__attribute" => {
            let Value::Str(name) = arg(args, 0) else {
                return Err(ErrorKind::UndefinedAttribute(arg(args, 0).to_string()).into());
            };
            match lookup(doc, &name)? {
                Some(v) => v,
                None => return Err(ErrorKind::UndefinedAttribute(name).into()),
            }
        }
        "__set_attribute" => {
            let Value::Str(name) = arg(args, 0) else {
                return Err(ErrorKind::UndefinedAttribute(arg(args, 0).to_string()).into());
            };
            doc.borrow_mut().attrs.insert(name, arg(args, 1));
            subject()
        }
        "__iter" => stdlib::new_cursor(doc.borrow().list.clone()),
        "__call" => return Err(ErrorKind::NotCallable("document").into()),
        _ => return Err(unsupported("document", op).into()),
    };
    Ok(result)
}

fn func_op(
    interp: &mut Interpreter,
    subject: Value,
    op: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match op {
        "__call" => interp.call_value(subject, args, None),
        "__str" => Ok(Value::Str(subject.to_string())),
        "__eq" => Ok(Value::Boolean(arg(&args, 0) == subject)),
        "__ne" => Ok(Value::Boolean(arg(&args, 0) != subject)),
        "__bool" => Ok(Value::Boolean(true)),
        _ => Err(unsupported("func", op).into()),
    }
}
