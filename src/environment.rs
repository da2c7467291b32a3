//! Chained scope frames.
//!
//! The same structure backs both static and dynamic phases: the type checker
//! stores [`Type`](crate::types::Type) tags, the interpreter stores
//! [`Value`](crate::value::Value)s. Frames are shared through
//! `Rc<RefCell<_>>` so closures can keep their defining frame alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use thiserror::Error;

/// Lookup or assignment of a name that no frame in the chain defines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Undefined variable '{name}'.")]
pub struct UndefinedBinding {
    pub name: String,
}

impl UndefinedBinding {
    fn new(name: &str) -> Self {
        UndefinedBinding {
            name: name.to_string(),
        }
    }
}

pub type EnvRef<V> = Rc<RefCell<Environment<V>>>;

#[derive(Debug)]
pub struct Environment<V> {
    values: HashMap<String, V>,
    enclosing: Option<EnvRef<V>>,
}

impl<V: Clone> Environment<V> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef<V>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Convenience: a fresh shared frame chained to `enclosing`.
    pub fn child(enclosing: &EnvRef<V>) -> EnvRef<V> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            enclosing,
        ))))
    }

    /// Insert or overwrite in this frame only.
    pub fn define(&mut self, name: &str, value: V) {
        self.values.insert(name.to_string(), value);
    }

    /// Copy of this frame's own bindings.
    pub fn snapshot(&self) -> HashMap<String, V> {
        self.values.clone()
    }

    /// Replace this frame's bindings with an earlier [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, values: HashMap<String, V>) {
        debug!("restore frame with {} binding(s)", values.len());
        self.values = values;
    }

    /// Does this very frame (not its ancestors) bind `name`?
    pub fn contains_local(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<V, UndefinedBinding> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(UndefinedBinding::new(name))
        }
    }

    /// Mutate the nearest frame that already binds `name`. Never creates.
    pub fn assign(&mut self, name: &str, value: V) -> Result<(), UndefinedBinding> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(UndefinedBinding::new(name))
        }
    }

    /// The frame exactly `distance` links out from `env`.
    pub fn ancestor(env: &EnvRef<V>, distance: usize) -> Result<EnvRef<V>, UndefinedBinding> {
        let mut frame: EnvRef<V> = Rc::clone(env);

        for _ in 0..distance {
            let next = frame.borrow().enclosing.clone();
            frame = next.ok_or_else(|| UndefinedBinding::new("<scope>"))?;
        }

        Ok(frame)
    }

    /// Direct lookup in the frame `distance` hops out; no linear walk.
    pub fn get_at(env: &EnvRef<V>, distance: usize, name: &str) -> Result<V, UndefinedBinding> {
        debug!("get_at distance={} name={}", distance, name);

        let frame = Self::ancestor(env, distance)?;
        let value = frame.borrow().values.get(name).cloned();

        value.ok_or_else(|| UndefinedBinding::new(name))
    }

    pub fn assign_at(
        env: &EnvRef<V>,
        distance: usize,
        name: &str,
        value: V,
    ) -> Result<(), UndefinedBinding> {
        debug!("assign_at distance={} name={}", distance, name);

        let frame = Self::ancestor(env, distance)?;
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(UndefinedBinding::new(name)),
        }
    }
}

impl<V: Clone> Default for Environment<V> {
    fn default() -> Self {
        Self::new()
    }
}
