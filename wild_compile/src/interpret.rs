use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    path::PathBuf,
    rc::Rc,
};

use log::trace;
use wild_syntax::ast::{
    Block, DocEntry, Expr, FnKind, InfixOp, LogicalOp, PrefixOp, Program, Stmt, StmtKind,
};

use crate::{
    environment::Env,
    error::{ErrorKind, RuntimeError},
    meta, module,
    stdlib::{self, Classes},
    types::{Document, Flow, Func, Value},
};

/// Unwraps a `Flow::Value` or propagates the signal to the caller.
macro_rules! eval_value {
    ($self:ident, $expr:expr) => {
        match $self.eval_expr($expr)? {
            Flow::Value(v) => v,
            signal => return Ok(signal),
        }
    };
}

pub struct Interpreter {
    pub env: Rc<RefCell<Env>>,
    pub classes: Classes,
    /// Directory that dotted import paths resolve against.
    pub base_dir: PathBuf,
    pub(crate) modules: HashMap<PathBuf, Value>,
    pub(crate) loading: HashSet<PathBuf>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let env = Env::new();
        stdlib::init(&mut env.borrow_mut());
        Self {
            env,
            classes: Classes::new(),
            base_dir: PathBuf::from("."),
            modules: HashMap::default(),
            loading: HashSet::default(),
        }
    }

    /// Evaluates a whole program in the current (global) environment.
    /// `export` short-circuits and becomes the program value, else the
    /// last statement's value does.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let mut last = Value::Nil;
        for stmt in &program.stmts {
            match self.eval_top_stmt(stmt)? {
                Flow::Export(v) => return Ok(v),
                Flow::Value(v) => last = v,
                _ => {}
            }
        }
        Ok(last)
    }

    /// A single top-level statement. Loop and return signals have
    /// nowhere left to go here and become errors.
    pub fn eval_top_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        let kind = match self.eval_stmt(stmt)? {
            Flow::Break => ErrorKind::StrayLoopSignal("break"),
            Flow::Continue => ErrorKind::StrayLoopSignal("continue"),
            Flow::Return(_) => ErrorKind::StrayReturn,
            flow => return Ok(flow),
        };
        Err(RuntimeError::from(kind).at(stmt.line, stmt.column))
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        trace!("Eval {stmt}");
        self.eval_stmt_kind(&stmt.kind)
            .map_err(|e| e.at(stmt.line, stmt.column))
    }

    fn eval_stmt_kind(&mut self, kind: &StmtKind) -> Result<Flow, RuntimeError> {
        let flow = match kind {
            StmtKind::Let { name, value } => {
                let v = eval_value!(self, value);
                self.env.borrow_mut().declare(name, v)?;
                Flow::Value(Value::Nil)
            }
            StmtKind::Assign { target, value } => return self.eval_assign(target, value),
            StmtKind::Return(expr) => {
                let v = match expr {
                    Some(e) => eval_value!(self, e),
                    None => Value::Nil,
                };
                Flow::Return(v)
            }
            StmtKind::Break => Flow::Break,
            StmtKind::Continue => Flow::Continue,
            StmtKind::Import(path) => {
                let value = module::load(self, path)?;
                let name = path.last().expect("import paths are never empty");
                self.env.borrow_mut().set(name, value);
                Flow::Value(Value::Nil)
            }
            StmtKind::Export(expr) => Flow::Export(eval_value!(self, expr)),
            StmtKind::Expr(expr) => return self.eval_expr(expr),
        };
        Ok(flow)
    }

    fn eval_assign(&mut self, target: &Expr, value: &Expr) -> Result<Flow, RuntimeError> {
        match target {
            Expr::Ident(name) => {
                let v = eval_value!(self, value);
                self.env.borrow_mut().assign(name, v)?;
            }
            Expr::Property { obj, name } => {
                let o = eval_value!(self, obj);
                let v = eval_value!(self, value);
                self.meta_call(o, "__set_attribute", vec![Value::Str(name.clone()), v])?;
            }
            Expr::Index { obj, index } => {
                let o = eval_value!(self, obj);
                let i = eval_value!(self, index);
                check_number(&i)?;
                let v = eval_value!(self, value);
                self.meta_call(o, "__set_index", vec![i, v])?;
            }
            Expr::Slice { obj, start, end } => {
                let o = eval_value!(self, obj);
                let lo = match start {
                    Some(e) => eval_value!(self, e),
                    None => Value::Nil,
                };
                let hi = match end {
                    Some(e) => eval_value!(self, e),
                    None => Value::Nil,
                };
                check_bound(&lo)?;
                check_bound(&hi)?;
                let v = eval_value!(self, value);
                self.meta_call(o, "__set_slice", vec![lo, hi, v])?;
            }
            Expr::Key { obj, key } => {
                let o = eval_value!(self, obj);
                let k = eval_value!(self, key);
                let v = eval_value!(self, value);
                self.meta_call(o, "__set_key", vec![k, v])?;
            }
            _ => unreachable!("the parser rejects other assignment targets"),
        }
        Ok(Flow::Value(Value::Nil))
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Flow, RuntimeError> {
        let value = match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Boolean(b) => Value::Boolean(*b),
            Expr::Nil => Value::Nil,
            Expr::Ident(name) => self.env.borrow().get(name)?,
            Expr::Prefix { op, expr } => {
                let v = eval_value!(self, expr);
                let hook = match op {
                    PrefixOp::Not => "__not",
                    PrefixOp::Neg => "__unm",
                };
                self.meta_call(v, hook, vec![])?
            }
            Expr::Infix { lhs, op, rhs } => {
                let l = eval_value!(self, lhs);
                let r = eval_value!(self, rhs);
                // Operands must share a runtime type; coercion is the
                // business of explicit hooks, not operators.
                if l.type_name() != r.type_name() && !matches!(l, Value::Document(_)) {
                    return Err(ErrorKind::MismatchedTypes {
                        lhs: l.type_name(),
                        rhs: r.type_name(),
                    }
                    .into());
                }
                self.meta_call(l, infix_hook(*op), vec![r])?
            }
            Expr::Logical { lhs, op, rhs } => {
                let l = eval_value!(self, lhs);
                let Value::Boolean(lb) = l else {
                    return Err(ErrorKind::ExpectedBoolean(l.type_name()).into());
                };
                match (op, lb) {
                    (LogicalOp::And, false) => Value::Boolean(false),
                    (LogicalOp::Or, true) => Value::Boolean(true),
                    _ => {
                        let r = eval_value!(self, rhs);
                        let Value::Boolean(rb) = r else {
                            return Err(ErrorKind::ExpectedBoolean(r.type_name()).into());
                        };
                        Value::Boolean(rb)
                    }
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = eval_value!(self, cond);
                let Value::Boolean(b) = c else {
                    return Err(ErrorKind::ExpectedBoolean(c.type_name()).into());
                };
                return if b {
                    self.eval_expr(then)
                } else {
                    match otherwise {
                        Some(e) => self.eval_expr(e),
                        None => Ok(Flow::Value(Value::Nil)),
                    }
                };
            }
            Expr::Call { callee, args } => return self.eval_call(callee, args),
            Expr::Index { obj, index } => {
                let o = eval_value!(self, obj);
                let i = eval_value!(self, index);
                check_number(&i)?;
                self.meta_call(o, "__index", vec![i])?
            }
            Expr::Slice { obj, start, end } => {
                let o = eval_value!(self, obj);
                let lo = match start {
                    Some(e) => eval_value!(self, e),
                    None => Value::Nil,
                };
                let hi = match end {
                    Some(e) => eval_value!(self, e),
                    None => Value::Nil,
                };
                check_bound(&lo)?;
                check_bound(&hi)?;
                self.meta_call(o, "__slice", vec![lo, hi])?
            }
            Expr::Property { obj, name } => {
                let o = eval_value!(self, obj);
                self.meta_call(o, "__attribute", vec![Value::Str(name.clone())])?
            }
            Expr::Key { obj, key } => {
                let o = eval_value!(self, obj);
                let k = eval_value!(self, key);
                self.meta_call(o, "__key", vec![k])?
            }
            Expr::FnLit { params, body, kind } => Value::Func(Rc::new(Func {
                params: params.clone(),
                body: Rc::clone(body),
                env: Rc::clone(&self.env),
                kind: *kind,
            })),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(eval_value!(self, item));
                }
                stdlib::new_list(self, values)
            }
            Expr::Doc(entries) => return self.eval_doc(entries),
            Expr::Block(block) => {
                return self.eval_block_in(Env::with_parent(Rc::clone(&self.env)), block)
            }
            Expr::Loop { cond, body } => return self.eval_loop(cond, body),
            Expr::While { cond, body } => return self.eval_while(cond, body),
            Expr::Repeat { body, until } => return self.eval_repeat(body, until),
            Expr::For {
                binding,
                iterable,
                body,
            } => return self.eval_for(binding.as_deref(), iterable, body),
        };
        Ok(Flow::Value(value))
    }

    fn eval_doc(&mut self, entries: &[DocEntry]) -> Result<Flow, RuntimeError> {
        let mut doc = Document::default();
        let mut has_dict = false;
        for entry in entries {
            match entry {
                DocEntry::Attr { name, value } => {
                    let v = eval_value!(self, value);
                    doc.attrs.insert(name.clone(), v);
                }
                DocEntry::Key { key, value } => {
                    has_dict = true;
                    let k = eval_value!(self, key);
                    let v = eval_value!(self, value);
                    doc.dict.insert(k, v)?;
                }
            }
        }
        if has_dict {
            doc.meta = Some(Rc::clone(&self.classes.dict));
        }
        Ok(Flow::Value(Value::new_document(doc)))
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Flow, RuntimeError> {
        // Property callees keep their subject around so that methods
        // receive it.
        let (func, self_obj) = match callee {
            Expr::Property { obj, name } => {
                let o = eval_value!(self, obj);
                let f =
                    self.meta_call(o.clone(), "__attribute", vec![Value::Str(name.clone())])?;
                (f, Some(o))
            }
            _ => (eval_value!(self, callee), None),
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(eval_value!(self, arg));
        }
        Ok(Flow::Value(self.call_value(func, values, self_obj)?))
    }

    /// Calls any callable value: interpreted functions, natives, and
    /// documents exposing a `__call` hook.
    pub fn call_value(
        &mut self,
        func: Value,
        mut args: Vec<Value>,
        self_obj: Option<Value>,
    ) -> Result<Value, RuntimeError> {
        match func {
            Value::Func(f) => {
                let bound = (f.kind == FnKind::Method)
                    .then_some(self_obj)
                    .flatten();
                self.call_func(&f, bound, args)
            }
            Value::NativeFunc(nf) => {
                if let Some(arity) = nf.arity {
                    if args.len() != arity {
                        return Err(ErrorKind::ArgCount {
                            expected: arity,
                            found: args.len(),
                        }
                        .into());
                    }
                }
                if nf.method {
                    match self_obj {
                        Some(subject) => args.insert(0, subject),
                        None => return Err(ErrorKind::MethodWithoutSubject(nf.name).into()),
                    }
                }
                (nf.body)(self, args)
            }
            Value::Document(d) => match meta::lookup(&d, "__call")? {
                Some(hook) => {
                    let subject = Value::Document(Rc::clone(&d));
                    self.call_value(hook, args, Some(subject))
                }
                None => Err(ErrorKind::NotCallable("document").into()),
            },
            other => Err(ErrorKind::NotCallable(other.type_name()).into()),
        }
    }

    fn call_func(
        &mut self,
        func: &Func,
        bound_self: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if func.params.len() != args.len() {
            return Err(ErrorKind::ArgCount {
                expected: func.params.len(),
                found: args.len(),
            }
            .into());
        }
        // Parameters bind in a child of the *captured* environment;
        // this is what makes closures close.
        let env = Env::with_parent(Rc::clone(&func.env));
        {
            let mut e = env.borrow_mut();
            if let Some(subject) = bound_self {
                e.set("self", subject);
            }
            for (param, value) in func.params.iter().zip(args) {
                e.set(param, value);
            }
        }
        match self.eval_block_in(env, &func.body)? {
            Flow::Return(v) => Ok(v),
            // Falling off the end of a body yields nil
            Flow::Value(_) => Ok(Value::Nil),
            Flow::Break => Err(ErrorKind::StrayLoopSignal("break").into()),
            Flow::Continue => Err(ErrorKind::StrayLoopSignal("continue").into()),
            Flow::Export(_) => Err(ErrorKind::StrayExport.into()),
        }
    }

    /// Runs a block with the given environment installed, restoring
    /// the previous one on every exit path.
    pub(crate) fn eval_block_in(
        &mut self,
        env: Rc<RefCell<Env>>,
        block: &Block,
    ) -> Result<Flow, RuntimeError> {
        let saved = Rc::clone(&self.env);
        self.env = env;
        let mut result = Flow::Value(Value::Nil);
        for stmt in &block.stmts {
            match self.eval_stmt(stmt) {
                Ok(Flow::Value(v)) => result = Flow::Value(v),
                Ok(signal) => {
                    result = signal;
                    break;
                }
                Err(e) => {
                    self.env = saved;
                    return Err(e);
                }
            }
        }
        self.env = saved;
        Ok(result)
    }

    /// Hook resolution order: the subject's own attrs and meta chain,
    /// then the per-type default table.
    pub fn meta_call(
        &mut self,
        subject: Value,
        op: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Value::Document(d) = &subject {
            if let Some(hook) = meta::lookup(d, op)? {
                let subject = subject.clone();
                return self.call_value(hook, args, Some(subject));
            }
        }
        meta::dispatch(self, subject, op, args)
    }

    /// The dual-mode loop. A boolean condition makes a classic while;
    /// any other type fixes an iteration count up front. Either way
    /// `idx`, `key` and `val` are bound fresh in each body scope, and
    /// the loop's value is the last body value.
    fn eval_loop(&mut self, cond_expr: &Expr, body: &Block) -> Result<Flow, RuntimeError> {
        let first = eval_value!(self, cond_expr);
        let mut result = Value::Nil;
        if matches!(first, Value::Boolean(_)) {
            let mut cond = first;
            let mut idx = 0usize;
            loop {
                let Value::Boolean(b) = cond else {
                    return Err(ErrorKind::ExpectedBoolean(cond.type_name()).into());
                };
                if !b {
                    break;
                }
                let env = Env::with_parent(Rc::clone(&self.env));
                {
                    let mut e = env.borrow_mut();
                    e.set("idx", Value::Number(idx as f64));
                    e.set("key", Value::Nil);
                    e.set("val", Value::Boolean(true));
                }
                match self.eval_block_in(env, body)? {
                    Flow::Value(v) => result = v,
                    Flow::Break => return Ok(Flow::Value(result)),
                    Flow::Continue => {}
                    signal => return Ok(signal),
                }
                idx += 1;
                cond = eval_value!(self, cond_expr);
            }
            return Ok(Flow::Value(result));
        }
        let plan = LoopPlan::of(&first);
        for i in 0..plan.len() {
            let (idx, key, val) = plan.binding(i);
            let env = Env::with_parent(Rc::clone(&self.env));
            {
                let mut e = env.borrow_mut();
                e.set("idx", idx);
                e.set("key", key);
                e.set("val", val);
            }
            match self.eval_block_in(env, body)? {
                Flow::Value(v) => result = v,
                Flow::Break => break,
                Flow::Continue => {}
                signal => return Ok(signal),
            }
        }
        Ok(Flow::Value(result))
    }

    fn eval_while(&mut self, cond: &Expr, body: &Block) -> Result<Flow, RuntimeError> {
        let mut count = 0usize;
        loop {
            let c = eval_value!(self, cond);
            let Value::Boolean(b) = c else {
                return Err(ErrorKind::ExpectedBoolean(c.type_name()).into());
            };
            if !b {
                break;
            }
            match self.eval_block_in(Env::with_parent(Rc::clone(&self.env)), body)? {
                Flow::Value(_) | Flow::Continue => {}
                Flow::Break => break,
                signal => return Ok(signal),
            }
            count += 1;
        }
        Ok(Flow::Value(Value::Number(count as f64)))
    }

    fn eval_repeat(&mut self, body: &Block, until: &Expr) -> Result<Flow, RuntimeError> {
        let mut count = 0usize;
        loop {
            match self.eval_block_in(Env::with_parent(Rc::clone(&self.env)), body)? {
                Flow::Value(_) | Flow::Continue => {}
                Flow::Break => break,
                signal => return Ok(signal),
            }
            count += 1;
            let c = eval_value!(self, until);
            let Value::Boolean(b) = c else {
                return Err(ErrorKind::ExpectedBoolean(c.type_name()).into());
            };
            if b {
                break;
            }
        }
        Ok(Flow::Value(Value::Number(count as f64)))
    }

    fn eval_for(
        &mut self,
        binding: Option<&str>,
        iterable: &Expr,
        body: &Block,
    ) -> Result<Flow, RuntimeError> {
        let subject = eval_value!(self, iterable);
        let cursor = self.meta_call(subject, "__iter", vec![])?;
        let mut count = 0usize;
        loop {
            let step = self.meta_call(cursor.clone(), "__next", vec![])?;
            let Value::Document(result) = &step else {
                return Err(ErrorKind::BadIterator.into());
            };
            let (value, ok) = {
                let r = result.borrow();
                let ok = match r.attrs.get("ok") {
                    Some(Value::Boolean(b)) => *b,
                    _ => return Err(ErrorKind::BadIterator.into()),
                };
                (r.attrs.get("value").cloned().unwrap_or(Value::Nil), ok)
            };
            if !ok {
                break;
            }
            let env = Env::with_parent(Rc::clone(&self.env));
            if let Some(name) = binding {
                env.borrow_mut().set(name, value);
            }
            match self.eval_block_in(env, body)? {
                Flow::Value(_) | Flow::Continue => {}
                Flow::Break => break,
                signal => return Ok(signal),
            }
            count += 1;
        }
        Ok(Flow::Value(Value::Number(count as f64)))
    }
}

fn check_number(v: &Value) -> Result<(), RuntimeError> {
    match v {
        Value::Number(_) => Ok(()),
        other => Err(ErrorKind::ExpectedNumber(other.type_name()).into()),
    }
}

fn check_bound(v: &Value) -> Result<(), RuntimeError> {
    match v {
        Value::Number(_) | Value::Nil => Ok(()),
        other => Err(ErrorKind::ExpectedNumber(other.type_name()).into()),
    }
}

fn infix_hook(op: InfixOp) -> &'static str {
    match op {
        InfixOp::Add => "__add",
        InfixOp::Sub => "__sub",
        InfixOp::Mul => "__mul",
        InfixOp::Div => "__div",
        InfixOp::FloorDiv => "__floor_div",
        InfixOp::Mod => "__mod",
        InfixOp::Pow => "__pow",
        InfixOp::EqualEqual => "__eq",
        InfixOp::BangEqual => "__ne",
        InfixOp::Less => "__lt",
        InfixOp::LessEqual => "__le",
        InfixOp::Greater => "__gt",
        InfixOp::GreaterEqual => "__ge",
    }
}

/// The per-type `idx`/`key`/`val` bindings of the count-mode loop,
/// produced one iteration at a time so a large numeric count never
/// materializes a table.
enum LoopPlan {
    /// `idx`, `key` and `val` all equal the iteration index.
    Count(usize),
    /// Index-only: `key` and `val` stay nil.
    Blank(usize),
    /// A snapshot of `(key, val)` pairs; `idx` is the position.
    Pairs(Vec<(Value, Value)>),
}

impl LoopPlan {
    fn of(cond: &Value) -> Self {
        match cond {
            Value::Number(n) => Self::Count(n.floor().max(0.0) as usize),
            Value::Str(s) => Self::Pairs(
                s.chars()
                    .map(|c| Value::Str(c.to_string()))
                    .enumerate()
                    .map(|(i, c)| (Value::Number(i as f64), c))
                    .collect(),
            ),
            Value::Func(f) => Self::Pairs(
                f.params
                    .iter()
                    .map(|p| (Value::Str(p.clone()), Value::Nil))
                    .collect(),
            ),
            Value::NativeFunc(nf) => Self::Blank(nf.arity.unwrap_or(0)),
            Value::Document(d) => {
                let d = d.borrow();
                let mut pairs = Vec::with_capacity(d.len());
                for (i, v) in d.list.iter().enumerate() {
                    pairs.push((Value::Number(i as f64), v.clone()));
                }
                pairs.extend(d.dict.entries());
                pairs.extend(
                    d.attrs
                        .iter()
                        .map(|(name, v)| (Value::Str(name.clone()), v.clone())),
                );
                Self::Pairs(pairs)
            }
            Value::Nil | Value::Boolean(_) => Self::Pairs(vec![]),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Count(n) | Self::Blank(n) => *n,
            Self::Pairs(pairs) => pairs.len(),
        }
    }

    fn binding(&self, i: usize) -> (Value, Value, Value) {
        let idx = Value::Number(i as f64);
        match self {
            Self::Count(_) => (idx.clone(), idx.clone(), idx),
            Self::Blank(_) => (idx, Value::Nil, Value::Nil),
            Self::Pairs(pairs) => {
                let (key, val) = pairs[i].clone();
                (idx, key, val)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wild_syntax::{
        lex::{Collector, Lexer},
        parse::Parser,
    };

    fn eval(source: &str) -> Result<Value, RuntimeError> {
        let collector = Collector::collect(Lexer::new(source));
        collector.check().unwrap();
        let program = Parser::new(collector.tokens()).parse_all().unwrap();
        Interpreter::new().eval_program(&program)
    }

    fn eval_ok(source: &str) -> Value {
        eval(source).unwrap()
    }

    fn eval_err(source: &str) -> ErrorKind {
        eval(source).unwrap_err().kind
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval_ok("1 + 2 * 3;"), Value::Number(7.0));
        assert_eq!(eval_ok("7 // 2;"), Value::Number(3.0));
        assert_eq!(eval_ok("-7 % 3;"), Value::Number(-1.0));
        assert_eq!(eval_ok("2 ^ 3 ^ 2;"), Value::Number(64.0));
        assert_eq!(eval_ok("-2 ^ 2;"), Value::Number(-4.0));
        assert_eq!(eval_ok("7 % 3;"), Value::Number(1.0));
    }

    #[test]
    fn zero_divisors() {
        assert_eq!(eval_err("5 / 0;"), ErrorKind::DivisionByZero);
        assert_eq!(eval_err("5 // 0;"), ErrorKind::DivisionByZero);
        assert_eq!(eval_err("5 % 0;"), ErrorKind::ModuloByZero);
    }

    #[test]
    fn strings() {
        assert_eq!(
            eval_ok("\"foo\" + \"bar\";"),
            Value::Str("foobar".to_string())
        );
        assert_eq!(eval_ok("len(\"héllo\");"), Value::Number(5.0));
        assert_eq!(eval_ok("\"héllo\"[1];"), Value::Str("é".to_string()));
        assert_eq!(eval_ok("\"héllo\"[1:3];"), Value::Str("él".to_string()));
        assert_eq!(eval_err("\"abc\"[5];"), ErrorKind::IndexOutOfRange(5.0));
    }

    #[test]
    fn mismatched_infix_types() {
        assert_eq!(
            eval_err("1 == \"one\";"),
            ErrorKind::MismatchedTypes {
                lhs: "number",
                rhs: "str"
            }
        );
    }

    #[test]
    fn logical_is_strict_and_lazy() {
        assert_eq!(eval_err("1 and true;"), ErrorKind::ExpectedBoolean("number"));
        // The right side would divide by zero if evaluated
        assert_eq!(
            eval_ok("false and (1 / 0 == 1);"),
            Value::Boolean(false)
        );
        assert_eq!(eval_ok("true or (1 / 0 == 1);"), Value::Boolean(true));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval_ok("true ? 1 : 2;"), Value::Number(1.0));
        assert_eq!(eval_ok("false ? 1 : 2;"), Value::Number(2.0));
        assert_eq!(eval_ok("false ? 1;"), Value::Nil);
        assert_eq!(eval_err("1 ? 2 : 3;"), ErrorKind::ExpectedBoolean("number"));
    }

    #[test]
    fn scoping() {
        assert_eq!(eval_ok("let x = 1; { let x = 2; }; x;"), Value::Number(1.0));
        assert_eq!(
            eval_err("let x = 1; let x = 2;"),
            ErrorKind::Redeclaration("x".to_string())
        );
        assert_eq!(
            eval_err("y = 1;"),
            ErrorKind::UndefinedVar("y".to_string())
        );
        assert_eq!(
            eval_ok("let x = 1; { x = 5; }; x;"),
            Value::Number(5.0)
        );
    }

    #[test]
    fn closure_counters_are_independent() {
        let source = "
            let counter = fn(start) {
                let n = start;
                return fn() {
                    n = n + 1;
                    return n;
                };
            };
            let c1 = counter(0);
            let c2 = counter(10);
            c1();
            c2();
            c1();
        ";
        assert_eq!(eval_ok(source), Value::Number(2.0));
    }

    #[test]
    fn missing_return_yields_nil() {
        assert_eq!(eval_ok("let f = fn() { 1 + 1; }; f();"), Value::Nil);
    }

    #[test]
    fn arity_is_exact() {
        assert_eq!(
            eval_err("let f = fn(a) { return a; }; f(1, 2);"),
            ErrorKind::ArgCount {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn recursion() {
        let source = "
            fn fact(n) {
                return n == 0 ? 1 : n * fact(n - 1);
            }
            fact(5);
        ";
        assert_eq!(eval_ok(source), Value::Number(120.0));
    }

    #[test]
    fn while_returns_iteration_count() {
        assert_eq!(
            eval_ok("let x = 0; while x < 3 do { x = x + 1; }"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn repeat_runs_at_least_once() {
        assert_eq!(
            eval_ok("let x = 10; repeat { x = x + 1; } until x > 0;"),
            Value::Number(1.0)
        );
    }

    #[test]
    fn for_over_list() {
        assert_eq!(
            eval_ok("let total = 0; for v in [1, 2, 3] do { total = total + v; } total;"),
            Value::Number(6.0)
        );
        assert_eq!(
            eval_ok("for v in [1, 2, 3] do { v; }"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn for_over_string_code_points() {
        assert_eq!(
            eval_ok("let out = \"\"; for c in \"héllo\" do { out = out + c; } out;"),
            Value::Str("héllo".to_string())
        );
    }

    #[test]
    fn dual_mode_loop_counts_by_type() {
        assert_eq!(
            eval_ok("let t = 0; 3 { t = t + idx; }; t;"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_ok("let t = 0; 3.9 { t = t + 1; }; t;"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_ok("let t = 0; nil { t = t + 1; }; t;"),
            Value::Number(0.0)
        );
        assert_eq!(
            eval_ok("let out = \"\"; \"abc\" { out = out + val; }; out;"),
            Value::Str("abc".to_string())
        );
        assert_eq!(
            eval_ok("let f = fn(a, b) { return a; }; let t = 0; f { t = t + 1; }; t;"),
            Value::Number(2.0)
        );
    }

    #[test]
    fn huge_count_loops_start_immediately() {
        // The binding table must not be built up front
        assert_eq!(
            eval_ok("let x = 0; 1000000000 { x = x + 1; break; }; x;"),
            Value::Number(1.0)
        );
    }

    #[test]
    fn dual_mode_loop_boolean_is_classic_while() {
        assert_eq!(
            eval_ok("let x = 0; x < 3 { x = x + 1; }; x;"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_ok("let x = 0; false { x = x + 1; }; x;"),
            Value::Number(0.0)
        );
    }

    #[test]
    fn break_and_continue() {
        assert_eq!(
            eval_ok("let x = 0; while true do { x = x + 1; x == 3 ? { break; }; } x;"),
            Value::Number(3.0)
        );
        let source = "
            let total = 0;
            for v in [1, 2, 3, 4] do {
                v == 2 ? { continue; };
                total = total + v;
            }
            total;
        ";
        assert_eq!(eval_ok(source), Value::Number(8.0));
    }

    #[test]
    fn stray_signals_are_errors() {
        assert_eq!(eval_err("break;"), ErrorKind::StrayLoopSignal("break"));
        assert_eq!(eval_err("continue;"), ErrorKind::StrayLoopSignal("continue"));
        assert_eq!(eval_err("return 1;"), ErrorKind::StrayReturn);
        assert_eq!(
            eval_err("let f = fn() { break; }; while true do { f(); }"),
            ErrorKind::StrayLoopSignal("break")
        );
    }

    #[test]
    fn documents() {
        assert_eq!(eval_ok("let d = {x = 1}; d.x;"), Value::Number(1.0));
        assert_eq!(
            eval_ok("let d = {x = 1}; d.x = 5; d.x;"),
            Value::Number(5.0)
        );
        assert_eq!(
            eval_ok("let d = {\"a\": 1}; d{\"a\"};"),
            Value::Number(1.0)
        );
        assert_eq!(
            eval_ok("let d = {\"a\": 1}; d{\"b\"} = 2; d{\"b\"};"),
            Value::Number(2.0)
        );
        assert_eq!(
            eval_err("let d = {\"a\": 1}; d{\"b\"};"),
            ErrorKind::KeyNotFound("b".to_string())
        );
        assert_eq!(
            eval_err("let d = {x = 1}; d.y;"),
            ErrorKind::UndefinedAttribute("y".to_string())
        );
        assert_eq!(eval_ok("len({x = 1, \"a\": 2});"), Value::Number(2.0));
    }

    #[test]
    fn lists() {
        assert_eq!(eval_ok("[10, 20, 30][1];"), Value::Number(20.0));
        assert_eq!(
            eval_ok("let l = [1, 2]; l[0] = 9; l[0];"),
            Value::Number(9.0)
        );
        assert_eq!(eval_err("[1][5];"), ErrorKind::IndexOutOfRange(5.0));
        assert_eq!(eval_ok("len([1, 2, 3][1:]);"), Value::Number(2.0));
        assert_eq!(
            eval_ok("let l = [1, 2, 3, 4]; l[1:3] = [9]; len(l);"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn list_methods() {
        assert_eq!(
            eval_ok("let l = [1, 2]; l.append(3); len(l);"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_ok("let l = [1, 2, 3]; l.reverse(); l[0];"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn dict_methods() {
        assert_eq!(
            eval_ok("let d = {\"a\": 1, \"b\": 2}; len(d.keys());"),
            Value::Number(2.0)
        );
        assert_eq!(
            eval_ok("let t = 0; for v in {\"a\": 1, \"b\": 2} do { t = t + v; } t;"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn merge_unions_every_part() {
        // Lists concatenate
        assert_eq!(eval_ok("len(merge([1, 2], [3]));"), Value::Number(3.0));
        // Attrs union, the second document's entries winning
        assert_eq!(
            eval_ok("merge({x = 1, src = 1}, {src = 2, y = 3}).x;"),
            Value::Number(1.0)
        );
        assert_eq!(
            eval_ok("merge({x = 1, src = 1}, {src = 2, y = 3}).src;"),
            Value::Number(2.0)
        );
        // Dict entries likewise
        assert_eq!(
            eval_ok("merge({\"k\": 1}, {\"k\": 2}){\"k\"};"),
            Value::Number(2.0)
        );
        // The merged document keeps a meta, so list methods survive
        assert_eq!(
            eval_ok("let m = merge([1], [2, 3]); m.append(4); len(m);"),
            Value::Number(4.0)
        );
    }

    #[test]
    fn self_referential_document_renders() {
        let got = eval_ok("let l = [1]; l.append(l); str(l);");
        let Value::Str(s) = got else {
            panic!("expected a string");
        };
        assert!(s.starts_with("[1, [1, "));
        assert!(s.contains("..."));
    }

    #[test]
    fn methods_see_self() {
        let source = "
            let d = {
                count = 0,
                inc = fn() {
                    self.count = self.count + 1;
                    return self.count;
                },
            };
            d.inc();
            d.inc();
        ";
        assert_eq!(eval_ok(source), Value::Number(2.0));
    }

    #[test]
    fn meta_hook_overrides_addition() {
        let source = "
            let vec = {
                __add = fn(other) {
                    return set_meta({x = self.x + other.x}, get_meta(self));
                },
            };
            let a = set_meta({x = 1}, vec);
            let b = set_meta({x = 2}, vec);
            (a + b).x;
        ";
        assert_eq!(eval_ok(source), Value::Number(3.0));
    }

    #[test]
    fn cyclic_meta_chain_is_bounded() {
        let source = "
            let a = {};
            let b = {};
            set_meta(a, b);
            set_meta(b, a);
            a.missing;
        ";
        assert_eq!(
            eval_err(source),
            ErrorKind::MetaDepthExceeded(meta::META_DEPTH_LIMIT)
        );
    }

    #[test]
    fn callable_document() {
        let source = "
            let proto = {
                __call = fn(n) { return self.base + n; },
            };
            let adder = set_meta({base = 10}, proto);
            adder(5);
        ";
        assert_eq!(eval_ok(source), Value::Number(15.0));
    }

    #[test]
    fn export_short_circuits() {
        assert_eq!(eval_ok("export 42; 1;"), Value::Number(42.0));
        assert_eq!(eval_ok("1; 2;"), Value::Number(2.0));
    }

    #[test]
    fn coercion_builtins() {
        assert_eq!(eval_ok("str(1 + 2);"), Value::Str("3".to_string()));
        assert_eq!(eval_ok("num(\" 42 \");"), Value::Number(42.0));
        assert_eq!(eval_ok("bool(\"\");"), Value::Boolean(false));
        assert_eq!(eval_ok("type([1]);"), Value::Str("document".to_string()));
        assert_eq!(
            eval_err("num(\"forty\");"),
            ErrorKind::InvalidNumber("forty".to_string())
        );
    }

    #[test]
    fn runtime_errors_carry_statement_positions() {
        let err = eval("let x = 1;\n  x / 0;").unwrap_err();
        assert_eq!(err.pos, Some((2, 3)));
    }
}
