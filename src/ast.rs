//! Abstract syntax tree shared by the resolver, the type checker and the
//! interpreter.
//!
//! Nodes own their tokens. Function and class declarations sit behind `Rc`
//! so the runtime can keep them alive inside closures after the statement
//! list of one run has been dropped.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a name-bearing expression node. The resolver keys its
/// distance table on this, never on the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    /// Allocate an id that is unique for the lifetime of the process, so
    /// tables from successive REPL lines can be merged.
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// Every kind of *expression* in Kali.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralValue),

    /// Prefix operator: `!x`, `-x`, `++x`, `--x`.
    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    /// Postfix operator: `x++`, `x--`.
    Postfix {
        operand: Box<Expr>,
        operator: Token,
    },

    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    Grouping(Box<Expr>),

    Variable {
        id: ExprId,
        name: Token,
    },

    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get {
        object: Box<Expr>,
        name: Token,
    },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    This {
        id: ExprId,
        keyword: Token,
    },

    /// super.method
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

impl Expr {
    pub fn variable(name: Token) -> Self {
        Expr::Variable {
            id: ExprId::fresh(),
            name,
        }
    }

    /// Best line number for diagnostics about this expression.
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Unary { operator, .. } | Expr::Postfix { operator, .. } => operator.line,
            Expr::Binary { operator, .. } | Expr::Logical { operator, .. } => operator.line,
            Expr::Grouping(inner) => inner.line(),
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => name.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } | Expr::Set { name, .. } => name.line,
            Expr::This { keyword, .. } | Expr::Super { keyword, .. } => keyword.line,
        }
    }
}

/// `var name: type = initializer;` ‑ also used for class fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Token,
    /// `number`, `string`, `boolean`, `void` or a class identifier.
    pub type_annotation: Option<Token>,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Token,
    pub type_annotation: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Param>,
    /// Absent ⇒ `void`.
    pub return_type: Option<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Token,
    /// Always an [`Expr::Variable`] when present.
    pub superclass: Option<Expr>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<Rc<FunctionDecl>>,
}

/// Every kind of *statement*. A program is a sequence of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var(VarDecl),

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Function(Rc<FunctionDecl>),

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Class(Rc<ClassDecl>),
}
