//! Things that can be called: host-provided natives and user functions.
//! Classes implement [`Callable`] too, see [`crate::class`].

use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::class::KaliInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::{KaliError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// Uniform call interface. The interpreter checks `arity()` against the
/// argument count before calling.
pub trait Callable {
    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// A function implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    arity: usize,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &'static str, arity: usize, func: NativeFn) -> Self {
        NativeFunction { name, arity, func }
    }

    /// `clock()`: seconds since the UNIX epoch.
    pub fn clock() -> Self {
        NativeFunction::new("clock", 0, |_args| {
            let seconds = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| KaliError::runtime(0, format!("Clock error: {}", e)))?
                .as_secs_f64();

            debug!("clock() -> {}", seconds);
            Ok(Value::Number(seconds))
        })
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);
        (self.func)(&arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A user function: its declaration plus the frame it closed over.
pub struct KaliFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef<Value>,
    is_initializer: bool,
}

impl KaliFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef<Value>, is_initializer: bool) -> Self {
        KaliFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure is a fresh frame binding `this`.
    pub fn bind(&self, instance: Rc<KaliInstance>) -> KaliFunction {
        debug!(
            "Binding '{}' to a {} instance",
            self.name(),
            instance.class.name
        );

        let frame = Environment::child(&self.closure);
        frame.borrow_mut().define("this", Value::Instance(instance));

        KaliFunction {
            declaration: Rc::clone(&self.declaration),
            closure: frame,
            is_initializer: self.is_initializer,
        }
    }

    fn this(&self) -> Result<Value> {
        Environment::get_at(&self.closure, 0, "this")
            .map_err(|e| KaliError::runtime(self.declaration.name.line, e.to_string()))
    }
}

impl Callable for KaliFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        info!("Calling '{}' with {} argument(s)", self.name(), arguments.len());

        let frame = Environment::child(&self.closure);
        {
            let mut frame = frame.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                frame.define(&param.name.lexeme, argument);
            }
        }

        let flow = interpreter.execute_block(&self.declaration.body, frame)?;

        if self.is_initializer {
            return self.this();
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

impl fmt::Debug for KaliFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
