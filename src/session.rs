//! One interpreter session: scan → parse → resolve → type-check → run.
//!
//! The checker's and the interpreter's global frames live as long as the
//! session, so successive [`Session::run`] calls (REPL lines) see earlier
//! definitions. A call that fails leaves both frames as they were before it,
//! so the checker never describes bindings the interpreter doesn't hold.
//! Diagnostics are per call.

use std::collections::HashMap;
use std::io::{self, Write};

use log::info;

use crate::ast::Stmt;
use crate::error::KaliError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::type_checker::TypeChecker;
use crate::types::Type;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Run the static type checker before evaluating.
    pub type_check: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions { type_check: true }
    }
}

/// Global bindings of both layers, taken before a call.
struct Checkpoint {
    types: HashMap<String, Type>,
    values: HashMap<String, Value>,
}

pub struct Session {
    options: SessionOptions,
    checker: TypeChecker,
    interpreter: Interpreter,
}

impl Session {
    /// Session printing to stdout.
    pub fn new(options: SessionOptions) -> Self {
        Self::with_output(options, Box::new(io::stdout()))
    }

    pub fn with_output(options: SessionOptions, output: Box<dyn Write>) -> Self {
        info!("Session started (type_check={})", options.type_check);

        Session {
            options,
            checker: TypeChecker::new(),
            interpreter: Interpreter::with_output(output),
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Run `source` through the whole pipeline. On failure the global
    /// bindings of both layers are rolled back.
    pub fn run(&mut self, source: &str) -> Result<(), Vec<KaliError>> {
        let checkpoint = self.checkpoint();

        let result = self.front_end(source).and_then(|statements| {
            self.interpreter
                .interpret(&statements)
                .map_err(|e| vec![e])
        });

        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    /// Resolve and type-check `source` without running it. The checker runs
    /// even when the session was built without it, and its globals are left
    /// untouched since nothing was executed.
    pub fn check(&mut self, source: &str) -> Result<(), Vec<KaliError>> {
        let saved = self.checker.snapshot_globals();

        let result = self
            .parse_and_resolve(source)
            .and_then(|statements| self.checker.check(&statements).map_err(|e| vec![e]));

        self.checker.restore_globals(saved);
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            types: self.checker.snapshot_globals(),
            values: self.interpreter.snapshot_globals(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        info!("Rolling back global bindings after a failed run");
        self.checker.restore_globals(checkpoint.types);
        self.interpreter.restore_globals(checkpoint.values);
    }

    fn front_end(&mut self, source: &str) -> Result<Vec<Stmt>, Vec<KaliError>> {
        let statements = self.parse_and_resolve(source)?;

        if self.options.type_check {
            self.checker.check(&statements).map_err(|e| vec![e])?;
        }

        Ok(statements)
    }

    fn parse_and_resolve(&mut self, source: &str) -> Result<Vec<Stmt>, Vec<KaliError>> {
        let statements = parse(source)?;
        Resolver::new(&mut self.interpreter).resolve(&statements)?;
        Ok(statements)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

/// Scan and parse `source`. Lexical and syntax errors are reported together.
pub fn parse(source: &str) -> Result<Vec<Stmt>, Vec<KaliError>> {
    let (tokens, mut errors) = Scanner::new(source).scan_all();

    match Parser::new(&tokens).parse() {
        Ok(statements) if errors.is_empty() => Ok(statements),
        Ok(_) => Err(errors),
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(errors)
        }
    }
}
