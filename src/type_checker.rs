//! Static type checker.
//!
//! A single walk over the resolved AST with its own [`Environment`] of
//! [`Type`] tags. Declarations are seen in source order, so a global must be
//! declared before a function body mentions it; a function's own signature
//! is bound before its body is checked, so direct recursion works.
//!
//! The first violation aborts the walk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ClassDecl, Expr, FunctionDecl, LiteralValue, Stmt, VarDecl};
use crate::environment::{EnvRef, Environment};
use crate::error::{KaliError, Result};
use crate::token::{Token, TokenType};
use crate::types::{ClassType, FunctionSig, Type};

pub struct TypeChecker {
    globals: EnvRef<Type>,
    environment: EnvRef<Type>,
    /// Declared return type of the body being checked.
    current_return: Type,
}

impl TypeChecker {
    pub fn new() -> Self {
        info!("TypeChecker instantiated");

        let globals: EnvRef<Type> = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock",
            Type::Function(Rc::new(FunctionSig {
                name: "clock".to_string(),
                params: Vec::new(),
                return_type: Type::Number,
            })),
        );

        TypeChecker {
            environment: Rc::clone(&globals),
            globals,
            current_return: Type::Void,
        }
    }

    pub fn snapshot_globals(&self) -> HashMap<String, Type> {
        self.globals.borrow().snapshot()
    }

    pub fn restore_globals(&mut self, values: HashMap<String, Type>) {
        self.globals.borrow_mut().restore(values);
    }

    /// Check a program. Global declarations persist into the next call.
    pub fn check(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Type checking {} statement(s)", statements.len());

        self.environment = Rc::clone(&self.globals);
        self.current_return = Type::Void;

        for stmt in statements {
            self.check_stmt(stmt)?;
        }

        info!("Type check passed");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.type_of(expr)?;
            }

            Stmt::Var(decl) => {
                let ty = self.declared_type(decl)?;
                debug!("var {}: {}", decl.name.lexeme, ty);
                self.environment.borrow_mut().define(&decl.name.lexeme, ty);
            }

            Stmt::Block(statements) => {
                let frame = Environment::child(&self.environment);
                self.check_block(statements, frame)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expect_condition(condition, "if")?;
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                self.expect_condition(condition, "while")?;
                self.check_stmt(body)?;
            }

            Stmt::Function(decl) => {
                let sig = self.signature(decl)?;
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Type::Function(Rc::clone(&sig)));
                self.check_function(decl, &sig)?;
            }

            Stmt::Return { keyword, value } => {
                let ty = match value {
                    Some(expr) => self.type_of(expr)?,
                    None => Type::Nil,
                };

                if !self.current_return.accepts(&ty) {
                    return Err(KaliError::compile(
                        keyword.line,
                        format!(
                            "Return type mismatch: expected {}, got {}.",
                            self.current_return, ty
                        ),
                    ));
                }
            }

            Stmt::Class(decl) => self.check_class(decl)?,
        }

        Ok(())
    }

    fn check_block(&mut self, statements: &[Stmt], frame: EnvRef<Type>) -> Result<()> {
        let previous = std::mem::replace(&mut self.environment, frame);
        let result = statements.iter().try_for_each(|stmt| self.check_stmt(stmt));
        self.environment = previous;
        result
    }

    fn expect_condition(&mut self, condition: &Expr, keyword: &str) -> Result<()> {
        let ty = self.type_of(condition)?;
        if ty != Type::Boolean {
            return Err(KaliError::compile(
                condition.line(),
                format!("Condition of '{}' must be boolean, got {}.", keyword, ty),
            ));
        }
        Ok(())
    }

    /// Type a `var` declaration or field from its annotation and initializer.
    fn declared_type(&mut self, decl: &VarDecl) -> Result<Type> {
        let name = &decl.name;

        let declared = match &decl.type_annotation {
            Some(annotation) => Some(self.annotation(annotation)?),
            None => None,
        };
        let initial = match &decl.initializer {
            Some(expr) => Some(self.type_of(expr)?),
            None => None,
        };

        match (declared, initial) {
            (Some(declared), Some(initial)) => {
                if declared.accepts(&initial) {
                    Ok(declared)
                } else {
                    Err(KaliError::compile(
                        name.line,
                        format!(
                            "Type mismatch: cannot assign {} to '{}' of type {}.",
                            initial, name.lexeme, declared
                        ),
                    ))
                }
            }

            (Some(declared), None) if declared.requires_initializer() => Err(KaliError::compile(
                name.line,
                format!(
                    "'{}' of type {} must be initialized.",
                    name.lexeme, declared
                ),
            )),

            (Some(declared), None) => Ok(declared),

            (None, Some(Type::Void)) => Err(KaliError::compile(
                name.line,
                format!("Can't store a void value in '{}'.", name.lexeme),
            )),

            (None, Some(initial)) => Ok(initial),

            (None, None) => Ok(Type::Nil),
        }
    }

    fn annotation(&self, token: &Token) -> Result<Type> {
        match token.token_type {
            TokenType::TYPE_NUMBER => Ok(Type::Number),
            TokenType::TYPE_STRING => Ok(Type::String),
            TokenType::TYPE_BOOLEAN => Ok(Type::Boolean),
            TokenType::TYPE_VOID => Ok(Type::Void),
            _ => match self.environment.borrow().get(&token.lexeme) {
                Ok(Type::Class(class)) => Ok(Type::Instance(class)),
                _ => Err(KaliError::compile(
                    token.line,
                    format!("Unknown type '{}'.", token.lexeme),
                )),
            },
        }
    }

    fn signature(&self, decl: &FunctionDecl) -> Result<Rc<FunctionSig>> {
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = self.annotation(&param.type_annotation)?;
            if ty == Type::Void {
                return Err(KaliError::compile(
                    param.name.line,
                    format!("Parameter '{}' can't be void.", param.name.lexeme),
                ));
            }
            params.push(ty);
        }

        let return_type = match &decl.return_type {
            Some(annotation) => self.annotation(annotation)?,
            None => Type::Void,
        };

        Ok(Rc::new(FunctionSig {
            name: decl.name.lexeme.clone(),
            params,
            return_type,
        }))
    }

    /// Check a body in a fresh frame binding the parameters.
    fn check_function(&mut self, decl: &FunctionDecl, sig: &FunctionSig) -> Result<()> {
        debug!("Checking body of '{}'", decl.name.lexeme);

        let frame = Environment::child(&self.environment);
        {
            let mut frame = frame.borrow_mut();
            for (param, ty) in decl.params.iter().zip(&sig.params) {
                frame.define(&param.name.lexeme, ty.clone());
            }
        }

        let enclosing = std::mem::replace(&mut self.current_return, sig.return_type.clone());
        let result = self.check_block(&decl.body, frame);
        self.current_return = enclosing;
        result?;

        let must_return = !matches!(sig.return_type, Type::Void | Type::Nil);
        if must_return && !always_returns(&decl.body) {
            return Err(KaliError::compile(
                decl.name.line,
                format!(
                    "'{}' must return a {} on every path.",
                    decl.name.lexeme, sig.return_type
                ),
            ));
        }

        Ok(())
    }

    fn check_class(&mut self, decl: &ClassDecl) -> Result<()> {
        let name = &decl.name;
        info!("Checking class '{}'", name.lexeme);

        let superclass = match &decl.superclass {
            Some(expr) => {
                if let Expr::Variable { name: super_name, .. } = expr {
                    if super_name.lexeme == name.lexeme {
                        return Err(KaliError::compile(
                            super_name.line,
                            "A class can't inherit from itself.",
                        ));
                    }
                }

                match self.type_of(expr)? {
                    Type::Class(class) => Some(class),
                    other => {
                        return Err(KaliError::compile(
                            expr.line(),
                            format!("Superclass must be a class, got {}.", other),
                        ))
                    }
                }
            }
            None => None,
        };

        let class = Rc::new(ClassType::new(&name.lexeme, superclass.clone()));
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Type::Class(Rc::clone(&class)));

        let mut signatures = Vec::with_capacity(decl.methods.len());
        for method in &decl.methods {
            let sig = self.signature(method)?;

            if method.name.lexeme == name.lexeme && sig.return_type != Type::Void {
                return Err(KaliError::compile(
                    method.name.line,
                    "An initializer can't declare a return type.",
                ));
            }

            if let Some(superclass) = &superclass {
                check_override(superclass, &method.name, &sig)?;
            }

            class.add_method(&method.name.lexeme, Rc::clone(&sig));
            signatures.push(sig);
        }

        let outer = Rc::clone(&self.environment);

        if let Some(superclass) = &superclass {
            let frame = Environment::child(&self.environment);
            frame
                .borrow_mut()
                .define("super", Type::Instance(Rc::clone(superclass)));
            self.environment = frame;
        }

        let frame = Environment::child(&self.environment);
        frame
            .borrow_mut()
            .define("this", Type::Instance(Rc::clone(&class)));
        self.environment = frame;

        let result = self.check_class_body(decl, &class, &signatures);
        self.environment = outer;
        result
    }

    fn check_class_body(
        &mut self,
        decl: &ClassDecl,
        class: &ClassType,
        signatures: &[Rc<FunctionSig>],
    ) -> Result<()> {
        for field in &decl.fields {
            let ty = self.declared_type(field)?;
            debug!("field {}.{}: {}", class.name, field.name.lexeme, ty);
            check_field(class, &field.name, &ty)?;
            class.add_field(&field.name.lexeme, ty);
        }

        for (method, sig) in decl.methods.iter().zip(signatures) {
            self.check_function(method, sig)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn type_of(&mut self, expr: &Expr) -> Result<Type> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(_) => Type::Number,
                LiteralValue::Str(_) => Type::String,
                LiteralValue::True | LiteralValue::False => Type::Boolean,
                LiteralValue::Nil => Type::Nil,
            }),

            Expr::Grouping(inner) => self.type_of(inner),

            Expr::Unary { operator, right } => match operator.token_type {
                TokenType::PLUS_PLUS | TokenType::MINUS_MINUS => self.increment(right, operator),
                TokenType::BANG => {
                    self.type_of(right)?;
                    Ok(Type::Boolean)
                }
                _ => {
                    let ty = self.type_of(right)?;
                    if ty != Type::Number {
                        return Err(KaliError::compile(
                            operator.line,
                            format!("Operand of '{}' must be a number, got {}.", operator.lexeme, ty),
                        ));
                    }
                    Ok(Type::Number)
                }
            },

            Expr::Postfix { operand, operator } => self.increment(operand, operator),

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.type_of(left)?;
                let right = self.type_of(right)?;
                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.type_of(left)?;
                let right = self.type_of(right)?;

                if left != Type::Boolean || right != Type::Boolean {
                    return Err(KaliError::compile(
                        operator.line,
                        format!(
                            "Operands of '{}' must be booleans, got {} and {}.",
                            operator.lexeme, left, right
                        ),
                    ));
                }
                Ok(Type::Boolean)
            }

            Expr::Variable { name, .. } => self.look_up(name, &name.lexeme),

            Expr::Assign { name, value, .. } => {
                let target = self.look_up(name, &name.lexeme)?;
                let value = self.type_of(value)?;

                if !target.accepts(&value) {
                    return Err(KaliError::compile(
                        name.line,
                        format!(
                            "Type mismatch: cannot assign {} to '{}' of type {}.",
                            value, name.lexeme, target
                        ),
                    ));
                }
                Ok(target)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.type_of(callee)?;

                let mut argument_types = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    argument_types.push(self.type_of(argument)?);
                }

                match callee {
                    Type::Class(class) => {
                        let params = class
                            .initializer()
                            .map(|init| init.params.clone())
                            .unwrap_or_default();
                        check_arguments(paren, &class.name, &params, &argument_types)?;
                        Ok(Type::Instance(class))
                    }
                    Type::Function(sig) => {
                        check_arguments(paren, &sig.name, &sig.params, &argument_types)?;
                        Ok(sig.return_type.clone())
                    }
                    other => Err(KaliError::compile(
                        paren.line,
                        format!("Can only call functions and classes, got {}.", other),
                    )),
                }
            }

            Expr::Get { object, name } => match self.type_of(object)? {
                Type::Instance(class) => class
                    .find_field(&name.lexeme)
                    .or_else(|| class.find_method(&name.lexeme).map(Type::Function))
                    .ok_or_else(|| {
                        KaliError::compile(
                            name.line,
                            format!("Undefined property '{}' on {}.", name.lexeme, class.name),
                        )
                    }),
                other => Err(KaliError::compile(
                    name.line,
                    format!("Only instances have properties, got {}.", other),
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Type::Instance(class) = self.type_of(object)? else {
                    return Err(KaliError::compile(name.line, "Only instances have fields."));
                };

                let field = class.find_field(&name.lexeme).ok_or_else(|| {
                    KaliError::compile(
                        name.line,
                        format!("Undefined field '{}' on {}.", name.lexeme, class.name),
                    )
                })?;

                let value = self.type_of(value)?;
                if !field.accepts(&value) {
                    return Err(KaliError::compile(
                        name.line,
                        format!(
                            "Type mismatch: cannot assign {} to field '{}' of type {}.",
                            value, name.lexeme, field
                        ),
                    ));
                }
                Ok(field)
            }

            Expr::This { keyword, .. } => self.look_up(keyword, "this"),

            Expr::Super {
                keyword, method, ..
            } => {
                let Type::Instance(superclass) = self.look_up(keyword, "super")? else {
                    return Err(KaliError::compile(
                        keyword.line,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                };

                superclass
                    .find_method(&method.lexeme)
                    .map(Type::Function)
                    .ok_or_else(|| {
                        KaliError::compile(
                            method.line,
                            format!(
                                "Undefined property '{}' on {}.",
                                method.lexeme, superclass.name
                            ),
                        )
                    })
            }
        }
    }

    fn increment(&mut self, target: &Expr, operator: &Token) -> Result<Type> {
        if !matches!(target, Expr::Variable { .. }) {
            return Err(KaliError::compile(
                operator.line,
                format!("Operand of '{}' must be a variable.", operator.lexeme),
            ));
        }

        let ty = self.type_of(target)?;
        if ty != Type::Number {
            return Err(KaliError::compile(
                operator.line,
                format!("Operand of '{}' must be a number, got {}.", operator.lexeme, ty),
            ));
        }
        Ok(Type::Number)
    }

    fn look_up(&self, token: &Token, name: &str) -> Result<Type> {
        self.environment
            .borrow()
            .get(name)
            .map_err(|e| KaliError::compile(token.line, e.to_string()))
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn binary(operator: &Token, left: Type, right: Type) -> Result<Type> {
    let mismatch = |expected: &str| {
        KaliError::compile(
            operator.line,
            format!(
                "Operands of '{}' must be {}, got {} and {}.",
                operator.lexeme, expected, left, right
            ),
        )
    };

    match operator.token_type {
        TokenType::PLUS => match (&left, &right) {
            (Type::Number, Type::Number) => Ok(Type::Number),
            (Type::String, Type::String) => Ok(Type::String),
            _ => Err(mismatch("two numbers or two strings")),
        },

        TokenType::MINUS | TokenType::SLASH => match (&left, &right) {
            (Type::Number, Type::Number) => Ok(Type::Number),
            _ => Err(mismatch("numbers")),
        },

        TokenType::STAR => match (&left, &right) {
            (Type::Number, Type::Number) => Ok(Type::Number),
            (Type::Number, Type::String) | (Type::String, Type::Number) => Ok(Type::String),
            _ => Err(mismatch("numbers, or a number and a string")),
        },

        TokenType::GREATER | TokenType::GREATER_EQUAL | TokenType::LESS | TokenType::LESS_EQUAL => {
            match (&left, &right) {
                (Type::Number, Type::Number)
                | (Type::String, Type::String)
                | (Type::Boolean, Type::Boolean) => Ok(Type::Boolean),
                _ => Err(mismatch("of the same comparable type")),
            }
        }

        TokenType::EQUAL_EQUAL | TokenType::BANG_EQUAL => {
            if left == right || left.accepts(&right) || right.accepts(&left) {
                Ok(Type::Boolean)
            } else {
                Err(KaliError::compile(
                    operator.line,
                    format!("Cannot compare {} with {}.", left, right),
                ))
            }
        }

        _ => Err(KaliError::compile(
            operator.line,
            format!("Invalid binary operator '{}'.", operator.lexeme),
        )),
    }
}

/// An override keeps the parameter types of the inherited method and
/// returns something the inherited return type accepts. Instance fields
/// shadow methods at runtime, so a method can't reuse an inherited field name.
fn check_override(superclass: &ClassType, name: &Token, sig: &FunctionSig) -> Result<()> {
    if let Some(ty) = superclass.find_field(&name.lexeme) {
        return Err(KaliError::compile(
            name.line,
            format!(
                "Method '{}' conflicts with inherited field of type {}.",
                name.lexeme, ty
            ),
        ));
    }

    if let Some(inherited) = superclass.find_method(&name.lexeme) {
        if inherited.params != sig.params || !inherited.return_type.accepts(&sig.return_type) {
            return Err(KaliError::compile(
                name.line,
                format!(
                    "Method '{}' overrides {}.{} with an incompatible signature: expected {}, got {}.",
                    name.lexeme,
                    superclass.name,
                    name.lexeme,
                    Type::Function(inherited),
                    Type::Function(Rc::new(sig.clone())),
                ),
            ));
        }
    }

    Ok(())
}

/// A field may redeclare an inherited field with the same type, but may not
/// share a name with any method it would shadow.
fn check_field(class: &ClassType, name: &Token, ty: &Type) -> Result<()> {
    if class.find_method(&name.lexeme).is_some() {
        return Err(KaliError::compile(
            name.line,
            format!("Field '{}' conflicts with a method of the same name.", name.lexeme),
        ));
    }

    if let Some(inherited) = class.superclass.as_ref().and_then(|s| s.find_field(&name.lexeme)) {
        if inherited != *ty {
            return Err(KaliError::compile(
                name.line,
                format!(
                    "Field '{}' must keep its inherited type {}, got {}.",
                    name.lexeme, inherited, ty
                ),
            ));
        }
    }

    Ok(())
}

fn check_arguments(paren: &Token, callee: &str, params: &[Type], arguments: &[Type]) -> Result<()> {
    if params.len() != arguments.len() {
        return Err(KaliError::compile(
            paren.line,
            format!(
                "Expected {} arguments but got {}.",
                params.len(),
                arguments.len()
            ),
        ));
    }

    for (index, (param, argument)) in params.iter().zip(arguments).enumerate() {
        if !param.accepts(argument) {
            return Err(KaliError::compile(
                paren.line,
                format!(
                    "Argument {} to '{}' must be {}, got {}.",
                    index + 1,
                    callee,
                    param,
                    argument
                ),
            ));
        }
    }

    Ok(())
}

/// Conservative: only a `return`, a block holding one, or an `if` whose
/// branches both return counts. Loops never do.
fn always_returns(statements: &[Stmt]) -> bool {
    statements.iter().any(|stmt| match stmt {
        Stmt::Return { .. } => true,
        Stmt::Block(inner) => always_returns(inner),
        Stmt::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => {
            always_returns(std::slice::from_ref(then_branch.as_ref()))
                && always_returns(std::slice::from_ref(else_branch.as_ref()))
        }
        _ => false,
    })
}
