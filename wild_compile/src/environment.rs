use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::debug;

use crate::{error::ErrorKind, types::Value};

/// One scope frame: a name table plus an optional link to the
/// enclosing scope. Frames are shared through `Rc` so closures keep
/// their defining scope alive after the block that created it exits.
#[derive(Debug, Default)]
pub struct Env {
    values: HashMap<String, Value>,
    pub parent: Option<Rc<RefCell<Env>>>,
}

impl Env {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: Rc<RefCell<Env>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            ..Default::default()
        }))
    }

    /// Introduces a new binding. Shadowing an outer scope is fine,
    /// redeclaring within the current one is not.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), ErrorKind> {
        debug!("Declare {name} -> {value:?}");
        if self.values.contains_key(name) {
            return Err(ErrorKind::Redeclaration(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Unchecked insert, for host-made bindings: parameters, loop
    /// bindings, the standard library.
    pub fn set(&mut self, name: &str, value: Value) {
        debug!("Set {name} -> {value:?}");
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<Value, ErrorKind> {
        debug!("Get {name}");
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(parent) = &self.parent {
            debug!("Get {name} from parent");
            return parent.borrow().get(name);
        }
        Err(ErrorKind::UndefinedVar(name.to_string()))
    }

    /// Mutates the nearest enclosing scope that owns the name.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ErrorKind> {
        debug!("Assign {name} -> {value:?}");
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            debug!("Assign {name} in parent");
            return parent.borrow_mut().assign(name, value);
        }
        Err(ErrorKind::UndefinedVar(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn declare_and_get() {
        let env = Env::new();
        env.borrow_mut().declare("x", Value::Number(1.0)).unwrap();
        assert_eq!(env.borrow().get("x").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let env = Env::new();
        env.borrow_mut().declare("x", Value::Number(1.0)).unwrap();
        assert_eq!(
            env.borrow_mut().declare("x", Value::Number(2.0)),
            Err(ErrorKind::Redeclaration("x".to_string()))
        );
    }

    #[test]
    fn shadowing_in_child_scope_is_fine() {
        let outer = Env::new();
        outer.borrow_mut().declare("x", Value::Number(1.0)).unwrap();
        let inner = Env::with_parent(outer.clone());
        inner.borrow_mut().declare("x", Value::Number(2.0)).unwrap();
        assert_eq!(inner.borrow().get("x").unwrap(), Value::Number(2.0));
        assert_eq!(outer.borrow().get("x").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_outward() {
        let outer = Env::new();
        outer.borrow_mut().declare("x", Value::Number(1.0)).unwrap();
        let inner = Env::with_parent(outer.clone());
        inner
            .borrow_mut()
            .assign("x", Value::Number(5.0))
            .unwrap();
        assert_eq!(outer.borrow().get("x").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn assign_to_undeclared_fails() {
        let env = Env::new();
        assert_eq!(
            env.borrow_mut().assign("missing", Value::Nil),
            Err(ErrorKind::UndefinedVar("missing".to_string()))
        );
    }

    #[test]
    fn get_walks_outward() {
        let outer = Env::new();
        outer.borrow_mut().declare("x", Value::Number(3.0)).unwrap();
        let inner = Env::with_parent(Env::with_parent(outer));
        assert_eq!(inner.borrow().get("x").unwrap(), Value::Number(3.0));
    }
}
