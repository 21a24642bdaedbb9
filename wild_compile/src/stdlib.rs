//! Native functions: the globals registered into the root environment
//! at startup, and the `classList`/`classDict` prototype documents
//! installed as the meta of list and dict literals.

use std::{
    cell::RefCell,
    io::{self, BufRead, Write},
    rc::Rc,
    thread,
    time::Duration,
};

use crate::{
    environment::Env,
    error::{ErrorKind, RuntimeError},
    interpret::Interpreter,
    types::{Document, NativeFunc, Value},
};

/// Prototype documents owned by the interpreter. Keeping them here
/// rather than in process-wide statics means two interpreters never
/// share mutable state.
#[derive(Debug)]
pub struct Classes {
    pub list: Rc<RefCell<Document>>,
    pub dict: Rc<RefCell<Document>>,
}

impl Classes {
    pub fn new() -> Self {
        let mut list = Document::default();
        list.attrs.insert(
            "append".to_string(),
            method("append", None, |_, mut args| {
                let Value::Document(doc) = args.remove(0) else {
                    return Err(ErrorKind::MethodWithoutSubject("append").into());
                };
                doc.borrow_mut().list.append(&mut args);
                Ok(Value::Document(doc))
            }),
        );
        list.attrs.insert(
            "reverse".to_string(),
            method("reverse", Some(0), |_, mut args| {
                let Value::Document(doc) = args.remove(0) else {
                    return Err(ErrorKind::MethodWithoutSubject("reverse").into());
                };
                doc.borrow_mut().list.reverse();
                Ok(Value::Document(doc))
            }),
        );
        list.attrs.insert(
            "__iter".to_string(),
            method("__iter", Some(0), |_, args| {
                let Some(Value::Document(doc)) = args.first() else {
                    return Err(ErrorKind::MethodWithoutSubject("__iter").into());
                };
                Ok(new_cursor(doc.borrow().list.clone()))
            }),
        );

        let mut dict = Document::default();
        dict.attrs.insert(
            "keys".to_string(),
            method("keys", Some(0), |interp, args| {
                let Some(Value::Document(doc)) = args.first() else {
                    return Err(ErrorKind::MethodWithoutSubject("keys").into());
                };
                let keys = doc.borrow().dict.keys();
                Ok(new_list(interp, keys))
            }),
        );
        dict.attrs.insert(
            "values".to_string(),
            method("values", Some(0), |interp, args| {
                let Some(Value::Document(doc)) = args.first() else {
                    return Err(ErrorKind::MethodWithoutSubject("values").into());
                };
                let values = doc.borrow().dict.values();
                Ok(new_list(interp, values))
            }),
        );
        dict.attrs.insert(
            "__iter".to_string(),
            method("__iter", Some(0), |_, args| {
                let Some(Value::Document(doc)) = args.first() else {
                    return Err(ErrorKind::MethodWithoutSubject("__iter").into());
                };
                Ok(new_cursor(doc.borrow().dict.values()))
            }),
        );

        Self {
            list: Rc::new(RefCell::new(list)),
            dict: Rc::new(RefCell::new(dict)),
        }
    }
}

impl Default for Classes {
    fn default() -> Self {
        Self::new()
    }
}

fn native(
    name: &'static str,
    arity: Option<usize>,
    body: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
) -> Value {
    Value::NativeFunc(NativeFunc {
        name,
        arity,
        method: false,
        body,
    })
}

fn method(
    name: &'static str,
    arity: Option<usize>,
    body: fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
) -> Value {
    Value::NativeFunc(NativeFunc {
        name,
        arity,
        method: true,
        body,
    })
}

/// A list document carrying the `classList` prototype.
pub fn new_list(interp: &Interpreter, items: Vec<Value>) -> Value {
    Value::new_document(Document {
        list: items,
        meta: Some(Rc::clone(&interp.classes.list)),
        ..Default::default()
    })
}

/// A dict document carrying the `classDict` prototype.
pub fn new_dict(
    interp: &Interpreter,
    entries: Vec<(Value, Value)>,
) -> Result<Value, RuntimeError> {
    let mut doc = Document {
        meta: Some(Rc::clone(&interp.classes.dict)),
        ..Default::default()
    };
    for (k, v) in entries {
        doc.dict.insert(k, v)?;
    }
    Ok(Value::new_document(doc))
}

/// A cursor over a snapshot of values, driving the `__iter`/`__next`
/// protocol. The cursor keeps its position in an attribute and its
/// `__next` method as an own attribute, no meta needed.
pub fn new_cursor(items: Vec<Value>) -> Value {
    let mut doc = Document {
        list: items,
        ..Default::default()
    };
    doc.attrs
        .insert("index".to_string(), Value::Number(0.0));
    doc.attrs.insert(
        "__next".to_string(),
        method("__next", Some(0), |_, args| {
            let Some(Value::Document(cursor)) = args.first() else {
                return Err(ErrorKind::BadIterator.into());
            };
            let mut c = cursor.borrow_mut();
            let idx = match c.attrs.get("index") {
                Some(Value::Number(n)) => *n as usize,
                _ => return Err(ErrorKind::BadIterator.into()),
            };
            c.attrs
                .insert("index".to_string(), Value::Number(idx as f64 + 1.0));
            match c.list.get(idx).cloned() {
                Some(value) => Ok(iter_result(value, true)),
                None => Ok(iter_result(Value::Nil, false)),
            }
        }),
    );
    Value::new_document(doc)
}

/// The `{value, ok}` pair yielded by `__next`.
pub fn iter_result(value: Value, ok: bool) -> Value {
    let mut doc = Document::default();
    doc.attrs.insert("value".to_string(), value);
    doc.attrs.insert("ok".to_string(), Value::Boolean(ok));
    Value::new_document(doc)
}

/// Registers every global native into the given (root) environment.
pub fn init(env: &mut Env) {
    env.set(
        "print",
        native("print", None, |interp, args| {
            let text = join_args(interp, args)?;
            print!("{text}");
            let _ = io::stdout().flush();
            Ok(Value::Nil)
        }),
    );
    env.set(
        "println",
        native("println", None, |interp, args| {
            let text = join_args(interp, args)?;
            println!("{text}");
            Ok(Value::Nil)
        }),
    );
    env.set(
        "input",
        native("input", Some(0), |_, _| {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| ErrorKind::Io(e.to_string()))?;
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Ok(Value::Str(line))
        }),
    );
    env.set(
        "len",
        native("len", Some(1), |interp, mut args| {
            interp.meta_call(args.remove(0), "__len", vec![])
        }),
    );
    env.set(
        "type",
        native("type", Some(1), |_, args| {
            Ok(Value::Str(args[0].type_name().to_string()))
        }),
    );
    env.set(
        "sleep",
        native("sleep", Some(1), |_, args| {
            let Value::Number(secs) = args[0] else {
                return Err(ErrorKind::ExpectedNumber(args[0].type_name()).into());
            };
            thread::sleep(Duration::from_secs_f64(secs.max(0.0)));
            Ok(Value::Nil)
        }),
    );
    env.set(
        "random",
        native("random", Some(0), |_, _| {
            Ok(Value::Number(rand::random::<f64>()))
        }),
    );
    env.set(
        "set_meta",
        native("set_meta", Some(2), |_, args| {
            let Value::Document(doc) = &args[0] else {
                return Err(ErrorKind::ExpectedDocument(args[0].type_name()).into());
            };
            doc.borrow_mut().meta = match &args[1] {
                Value::Document(meta) => Some(Rc::clone(meta)),
                Value::Nil => None,
                other => return Err(ErrorKind::ExpectedDocument(other.type_name()).into()),
            };
            Ok(args[0].clone())
        }),
    );
    env.set(
        "get_meta",
        native("get_meta", Some(1), |_, args| {
            let Value::Document(doc) = &args[0] else {
                return Err(ErrorKind::ExpectedDocument(args[0].type_name()).into());
            };
            let meta = doc.borrow().meta.clone();
            Ok(meta.map_or(Value::Nil, Value::Document))
        }),
    );
    env.set(
        "merge",
        native("merge", Some(2), |_, args| {
            let (Value::Document(a), Value::Document(b)) = (&args[0], &args[1]) else {
                return Err(ErrorKind::ExpectedDocument(
                    if matches!(args[0], Value::Document(_)) {
                        args[1].type_name()
                    } else {
                        args[0].type_name()
                    },
                )
                .into());
            };
            let mut merged = Document::default();
            {
                let (a, b) = (a.borrow(), b.borrow());
                merged.list.extend(a.list.iter().cloned());
                merged.list.extend(b.list.iter().cloned());
                for (k, v) in a.dict.entries().chain(b.dict.entries()) {
                    merged.dict.insert(k, v)?;
                }
                merged.attrs.extend(
                    a.attrs
                        .iter()
                        .chain(b.attrs.iter())
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                merged.meta = b.meta.clone().or_else(|| a.meta.clone());
            }
            Ok(Value::new_document(merged))
        }),
    );
    env.set(
        "str",
        native("str", Some(1), |interp, mut args| {
            interp.meta_call(args.remove(0), "__str", vec![])
        }),
    );
    env.set(
        "num",
        native("num", Some(1), |interp, mut args| {
            interp.meta_call(args.remove(0), "__num", vec![])
        }),
    );
    env.set(
        "bool",
        native("bool", Some(1), |interp, mut args| {
            interp.meta_call(args.remove(0), "__bool", vec![])
        }),
    );
    env.set(
        "list",
        native("list", None, |interp, args| Ok(new_list(interp, args))),
    );
    env.set(
        "dict",
        native("dict", Some(0), |interp, _| new_dict(interp, vec![])),
    );
}

fn join_args(interp: &mut Interpreter, args: Vec<Value>) -> Result<String, RuntimeError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        match interp.meta_call(arg, "__str", vec![])? {
            Value::Str(s) => parts.push(s),
            other => parts.push(other.to_string()),
        }
    }
    Ok(parts.join(" "))
}
