//! Runtime classes and instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::ClassDecl;
use crate::callable::{Callable, KaliFunction};
use crate::environment::{EnvRef, Environment};
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::value::Value;

pub struct KaliClass {
    pub name: String,
    pub superclass: Option<Rc<KaliClass>>,
    methods: HashMap<String, Rc<KaliFunction>>,
    declaration: Rc<ClassDecl>,
    /// Frame the methods close over; binds `super` when there is a
    /// superclass. Field initializers run in a child of it.
    closure: EnvRef<Value>,
}

impl KaliClass {
    pub fn new(
        declaration: Rc<ClassDecl>,
        superclass: Option<Rc<KaliClass>>,
        methods: HashMap<String, Rc<KaliFunction>>,
        closure: EnvRef<Value>,
    ) -> Self {
        KaliClass {
            name: declaration.name.lexeme.clone(),
            superclass,
            methods,
            declaration,
            closure,
        }
    }

    /// Most-derived method named `name`.
    pub fn find_method(&self, name: &str) -> Option<Rc<KaliFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    /// The method named like the class, on this class only.
    pub fn initializer(&self) -> Option<Rc<KaliFunction>> {
        self.methods.get(&self.name).cloned()
    }

    /// Seed `instance` with declared fields, superclass first. Each
    /// initializer sees `this`.
    fn initialize_fields(
        &self,
        interpreter: &mut Interpreter,
        instance: &Rc<KaliInstance>,
    ) -> Result<()> {
        if let Some(superclass) = &self.superclass {
            superclass.initialize_fields(interpreter, instance)?;
        }

        if self.declaration.fields.is_empty() {
            return Ok(());
        }

        let frame = Environment::child(&self.closure);
        frame
            .borrow_mut()
            .define("this", Value::Instance(Rc::clone(instance)));

        for field in &self.declaration.fields {
            let value = match &field.initializer {
                Some(expr) => interpreter.evaluate_in(expr, Rc::clone(&frame))?,
                None => Value::Nil,
            };

            debug!("{}.{} = {}", self.name, field.name.lexeme, value);
            instance.set(&field.name.lexeme, value);
        }

        Ok(())
    }
}

impl Callable for Rc<KaliClass> {
    fn arity(&self) -> usize {
        self.initializer().map_or(0, |init| init.arity())
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        info!("Constructing {}", self.name);

        let instance = Rc::new(KaliInstance::new(Rc::clone(self)));
        self.initialize_fields(interpreter, &instance)?;

        if let Some(initializer) = self.initializer() {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for KaliClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub struct KaliInstance {
    pub class: Rc<KaliClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl KaliInstance {
    pub fn new(class: Rc<KaliClass>) -> Self {
        KaliInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Fields shadow methods. Methods come back bound to `self`.
    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.borrow().get(name) {
            return Some(value.clone());
        }

        self.class
            .find_method(name)
            .map(|method| Value::Function(Rc::new(method.bind(Rc::clone(self)))))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Debug for KaliInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}
