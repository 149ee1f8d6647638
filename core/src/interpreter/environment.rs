use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Value;
use crate::error::{LoxError, Result};
use crate::lexer::Token;

#[derive(Default)]
struct Frame {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// One lexical scope at run time. Clones are handles to the same scope, so
/// closures and the block that created them see each other's writes.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        })))
    }

    pub fn enclosing(&self) -> Option<Environment> {
        self.0.borrow().enclosing.clone()
    }

    /// Binds `name` in this scope, replacing any earlier binding here.
    pub fn define(&self, name: &str, value: Value) {
        tracing::trace!(name, "define");
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    /// Looks `name` up here and then outward.
    pub fn get(&self, name: &Token) -> Result<Value> {
        let mut env = self.clone();
        loop {
            if let Some(value) = env.0.borrow().values.get(&name.lexeme) {
                return Ok(value.clone());
            }
            let next = env.enclosing();
            match next {
                Some(outer) => env = outer,
                None => return Err(undefined(name)),
            }
        }
    }

    /// Rebinds the nearest existing `name`. Never creates a binding.
    pub fn assign(&self, name: &Token, value: Value) -> Result<()> {
        let mut env = self.clone();
        loop {
            if let Some(slot) = env.0.borrow_mut().values.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }
            let next = env.enclosing();
            match next {
                Some(outer) => env = outer,
                None => return Err(undefined(name)),
            }
        }
    }

    /// The scope exactly `distance` links out.
    pub fn ancestor(&self, distance: usize) -> Option<Environment> {
        let mut env = self.clone();
        for _ in 0..distance {
            env = env.enclosing()?;
        }
        Some(env)
    }

    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value> {
        let env = self.ancestor(distance).ok_or_else(|| undefined(name))?;
        let value = env.0.borrow().values.get(&name.lexeme).cloned();
        value.ok_or_else(|| undefined(name))
    }

    pub fn assign_at(&self, distance: usize, name: &Token, value: Value) -> Result<()> {
        let env = self.ancestor(distance).ok_or_else(|| undefined(name))?;
        let mut frame = env.0.borrow_mut();
        match frame.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    /// Bindings of this scope only, sorted by name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<_> = self
            .0
            .borrow()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<_> = frame.values.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_enclosing", &frame.enclosing.is_some())
            .finish()
    }
}
