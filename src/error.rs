//! Centralised error hierarchy for the **Kali interpreter**.
//!
//! Every phase (scanner, parser, resolver, type checker, runtime, CLI) converts
//! its failure modes into one of the variants defined here. Each variant knows
//! the [`Phase`] it belongs to, and the phase decides the process exit status.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KaliError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error. `location` is `" at 'x'"` or `" at end"`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static scope error reported by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Static type error reported by the type checker.
    #[error("{message}\n[line {line}]")]
    Compile { message: String, line: usize },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Pipeline phase that produced an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Syntax,
    Resolve,
    Compile,
    Runtime,
    Io,
}

impl Phase {
    /// Process exit status signalled for a failure in this phase.
    pub fn exit_code(self) -> i32 {
        match self {
            Phase::Syntax | Phase::Resolve => 65,
            Phase::Compile => 66,
            Phase::Runtime => 70,
            Phase::Io => 74,
        }
    }
}

fn location(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl KaliError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        KaliError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        KaliError::Parse {
            message,
            location: location(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        KaliError::Resolve {
            message,
            location: location(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **type checker**.
    pub fn compile<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Compile error: line={}, msg={}", line, message);

        KaliError::Compile { message, line }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        KaliError::Runtime { message, line }
    }

    pub fn phase(&self) -> Phase {
        match self {
            KaliError::Lex { .. } | KaliError::Parse { .. } => Phase::Syntax,
            KaliError::Resolve { .. } => Phase::Resolve,
            KaliError::Compile { .. } => Phase::Compile,
            KaliError::Runtime { .. } => Phase::Runtime,
            KaliError::Io(_) | KaliError::Utf8(_) => Phase::Io,
        }
    }

    /// Bare message without the line decoration.
    pub fn message(&self) -> String {
        match self {
            KaliError::Lex { message, .. }
            | KaliError::Parse { message, .. }
            | KaliError::Resolve { message, .. }
            | KaliError::Compile { message, .. }
            | KaliError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, KaliError>;
