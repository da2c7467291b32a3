//! Tree-walking evaluator.
//!
//! Variable, assignment, `this` and `super` nodes are looked up through the
//! distance table the resolver fills via [`Interpreter::note_local`]; a node
//! without an entry is a global. `return` travels back to the call boundary
//! as [`Flow::Return`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ClassDecl, Expr, ExprId, LiteralValue, Stmt, VarDecl};
use crate::callable::{KaliFunction, NativeFunction};
use crate::class::KaliClass;
use crate::environment::{EnvRef, Environment, UndefinedBinding};
use crate::error::{KaliError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef<Value>,
    environment: EnvRef<Value>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter printing to `output`. Globals are seeded with `clock`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef<Value> = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("clock", Value::Native(Rc::new(NativeFunction::clock())));

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record that the node `id` refers to a binding `depth` frames out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("note_local {:?} -> {}", id, depth);
        self.locals.insert(id, depth);
    }

    pub fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    pub fn snapshot_globals(&self) -> HashMap<String, Value> {
        self.globals.borrow().snapshot()
    }

    pub fn restore_globals(&mut self, values: HashMap<String, Value>) {
        self.globals.borrow_mut().restore(values);
    }

    /// Run a program. Stops at the first runtime error; output already
    /// written stays written.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());
        self.environment = Rc::clone(&self.globals);

        let result = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));

        self.output.flush()?;
        result?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var(decl) => self.declare_variable(decl)?,

            Stmt::Block(statements) => {
                let frame = Environment::child(&self.environment);
                return self.execute_block(statements, frame);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                let function =
                    KaliFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class(decl) => self.declare_class(decl)?,
        }

        Ok(Flow::Normal)
    }

    /// Execute `statements` with `frame` as the current environment. The
    /// previous environment is restored however the block ends.
    pub fn execute_block(&mut self, statements: &[Stmt], frame: EnvRef<Value>) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, frame);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn declare_variable(&mut self, decl: &VarDecl) -> Result<()> {
        let value = match &decl.initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };

        info!("Variable '{}' defined with value: {}", decl.name.lexeme, value);
        self.environment.borrow_mut().define(&decl.name.lexeme, value);
        Ok(())
    }

    fn declare_class(&mut self, decl: &Rc<ClassDecl>) -> Result<()> {
        let superclass = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(KaliError::runtime(
                        expr.line(),
                        "Superclass must be a class.",
                    ))
                }
            },
            None => None,
        };

        let name = &decl.name;
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        let closure = match &superclass {
            Some(superclass) => {
                let frame = Environment::child(&self.environment);
                frame
                    .borrow_mut()
                    .define("super", Value::Class(Rc::clone(superclass)));
                frame
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<KaliFunction>> = decl
            .methods
            .iter()
            .map(|method| {
                let is_initializer = method.name.lexeme == name.lexeme;
                let function =
                    KaliFunction::new(Rc::clone(method), Rc::clone(&closure), is_initializer);
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = KaliClass::new(Rc::clone(decl), superclass, methods, closure);
        info!("Class '{}' defined", name.lexeme);

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)))
            .map_err(|e| undefined(name, e))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::string(s),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Postfix { operand, operator } => {
                let (old, _) = self.increment(operand, operator)?;
                Ok(old)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let decided = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let callable = callee.as_callable().ok_or_else(|| {
                    KaliError::runtime(paren.line, "Can only call functions and classes.")
                })?;

                if values.len() != callable.arity() {
                    return Err(KaliError::runtime(
                        paren.line,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            values.len()
                        ),
                    ));
                }

                callable.call(self, values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(&name.lexeme).ok_or_else(|| {
                    KaliError::runtime(
                        name.line,
                        format!("Undefined property '{}'.", name.lexeme),
                    )
                }),
                _ => Err(KaliError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(KaliError::runtime(name.line, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.set(&name.lexeme, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    /// Evaluate `expr` with `frame` as the current environment.
    pub fn evaluate_in(&mut self, expr: &Expr, frame: EnvRef<Value>) -> Result<Value> {
        let previous = std::mem::replace(&mut self.environment, frame);
        let result = self.evaluate(expr);
        self.environment = previous;
        result
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        match operator.token_type {
            TokenType::PLUS_PLUS | TokenType::MINUS_MINUS => {
                let (_, new) = self.increment(right, operator)?;
                Ok(new)
            }

            TokenType::MINUS => match self.evaluate(right)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(KaliError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!self.evaluate(right)?.is_truthy())),

            _ => Err(KaliError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    /// Apply `++`/`--` to a bare variable. Returns `(old, new)`.
    fn increment(&mut self, target: &Expr, operator: &Token) -> Result<(Value, Value)> {
        let Expr::Variable { id, name } = target else {
            return Err(KaliError::runtime(
                operator.line,
                format!("Operand of '{}' must be a variable.", operator.lexeme),
            ));
        };

        let Value::Number(old) = self.look_up(*id, name)? else {
            return Err(KaliError::runtime(
                operator.line,
                "Operand must be a number.",
            ));
        };

        let new = if operator.token_type == TokenType::PLUS_PLUS {
            old + 1.0
        } else {
            old - 1.0
        };

        self.assign(*id, name, Value::Number(new))?;
        Ok((Value::Number(old), Value::Number(new)))
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = self.resolved_depth(id).ok_or_else(|| {
            KaliError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass = Environment::get_at(&self.environment, distance, "super")
            .map_err(|e| undefined(keyword, e))?;
        let Value::Class(superclass) = superclass else {
            return Err(KaliError::runtime(
                keyword.line,
                "Superclass must be a class.",
            ));
        };

        // `this` lives in the frame just inside the one binding `super`.
        let this = Environment::get_at(&self.environment, distance.saturating_sub(1), "this")
            .map_err(|e| undefined(keyword, e))?;
        let Value::Instance(instance) = this else {
            return Err(KaliError::runtime(
                keyword.line,
                "Can't use 'super' outside of a method.",
            ));
        };

        let method_fn = superclass.find_method(&method.lexeme).ok_or_else(|| {
            KaliError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(method_fn.bind(instance))))
    }

    fn look_up(&self, id: ExprId, name: &Token) -> Result<Value> {
        let found = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        found.map_err(|e| undefined(name, e))
    }

    fn assign(&mut self, id: ExprId, name: &Token, value: Value) -> Result<()> {
        let assigned = match self.locals.get(&id) {
            Some(&distance) => {
                Environment::assign_at(&self.environment, distance, &name.lexeme, value)
            }
            None => self.globals.borrow_mut().assign(&name.lexeme, value),
        };

        assigned.map_err(|e| undefined(name, e))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn undefined(name: &Token, error: UndefinedBinding) -> KaliError {
    KaliError::runtime(name.line, error.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    let line = operator.line;

    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{}{}", a, b))),
            _ => Err(KaliError::runtime(
                line,
                "Operands must be two numbers or two strings.",
            )),
        },

        TokenType::MINUS => numeric(line, left, right, |a, b| a - b),

        // IEEE semantics: x / 0 is an infinity or NaN, not an error.
        TokenType::SLASH => numeric(line, left, right, |a, b| a / b),

        TokenType::STAR => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                repeat(line, &s, n).map(Value::string)
            }
            _ => Err(KaliError::runtime(
                line,
                "Operands must be numbers, or a number and a string.",
            )),
        },

        TokenType::GREATER => compare(line, left, right, |a, b| a > b),
        TokenType::GREATER_EQUAL => compare(line, left, right, |a, b| a >= b),
        TokenType::LESS => compare(line, left, right, |a, b| a < b),
        TokenType::LESS_EQUAL => compare(line, left, right, |a, b| a <= b),

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.is_equal(&right))),
        TokenType::BANG_EQUAL => Ok(Value::Bool(!left.is_equal(&right))),

        _ => Err(KaliError::runtime(
            line,
            format!("Invalid binary operator '{}'.", operator.lexeme),
        )),
    }
}

fn numeric(line: usize, left: Value, right: Value, op: fn(f64, f64) -> f64) -> Result<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(a, b))),
        _ => Err(KaliError::runtime(line, "Operands must be numbers.")),
    }
}

/// Same-type ordering: numbers by value, strings by length, booleans as
/// `false < true`.
fn compare(line: usize, left: Value, right: Value, op: fn(f64, f64) -> bool) -> Result<Value> {
    let (a, b) = match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        (Value::String(a), Value::String(b)) => {
            (a.chars().count() as f64, b.chars().count() as f64)
        }
        (Value::Bool(a), Value::Bool(b)) => (f64::from(u8::from(*a)), f64::from(u8::from(*b))),
        _ => {
            debug!("compare {} with {}", left.kind(), right.kind());
            return Err(KaliError::runtime(line, "Operands must be the same type."));
        }
    };

    Ok(Value::Bool(op(a, b)))
}

/// `trunc(count)` copies of `s`; nothing for zero, negative or NaN counts.
fn repeat(line: usize, s: &str, count: f64) -> Result<String> {
    let count = count.trunc();
    if s.is_empty() || count.is_nan() || count <= 0.0 {
        return Ok(String::new());
    }

    // `as` saturates, so an infinite count lands on usize::MAX here.
    let copies = count as usize;
    match s.len().checked_mul(copies) {
        Some(len) if len <= isize::MAX as usize => Ok(s.repeat(copies)),
        _ => {
            debug!("repeat overflow: {} bytes x {}", s.len(), count);
            Err(KaliError::runtime(line, "String repetition is too large."))
        }
    }
}
