//! minilisp - a small Lisp with a tree-walking evaluator
//!
//! This crate implements a minimal Lisp dialect in three stages: a lexer that
//! splits source text into raw token strings, a recursive-descent parser that
//! turns tokens into an [`ast::Expr`] tree, and an evaluator that walks the tree
//! against a mutable [`evaluator::Environment`].
//!
//! ```lisp
//! (setq x 10)                                   ; bind a variable
//! (+ 3 (* 4 2))                                 ; arithmetic, yields 11
//! (defun square (n) (* n n))                    ; define a function
//! (cond ((= x 0) "zero") (t "something else"))  ; conditionals
//! (quote (+ 1 2))                               ; unevaluated data
//! ```
//!
//! ## Semantics worth knowing
//!
//! - Numbers are computed as floating point and narrowed back to integers when
//!   the result has no fractional part, so `(/ 10 2)` yields `5` while
//!   `(/ 7 2)` yields `3.5`.
//! - Functions do not capture their definition scope. A call evaluates its body
//!   in a snapshot copy of the *caller's* environment plus the parameter
//!   bindings, and the copy is thrown away when the call returns. A `setq`
//!   inside a function body therefore never leaks into the caller.
//! - `list` is a predicate ("is this a list?"), not a list constructor.
//!
//! ## Modules
//!
//! - `lexer`: source text to token strings, parenthesis balance check
//! - `parser`: token strings to expression trees
//! - `ast`: expression tree and runtime value types
//! - `evaluator`: environments, special forms and function application
//! - `builtinops`: the registry of native operators
//! - `source`: multi-expression source handling for front ends

/// Maximum list nesting accepted by the parser.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum evaluation depth before evaluation is aborted.
/// Counts nested forms and function calls together; a non-tail recursive call
/// typically costs three or four levels. The native stack grows on demand, so
/// this only bounds runaway recursion.
pub const MAX_EVAL_DEPTH: usize = 10_000;

use crate::builtinops::Arity;

/// Raised by the lexer when a piece of input does not match the token grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct LexError {
    pub message: String,
    /// Byte offset of the rejected text in the original source
    pub offset: usize,
    /// The rejected text itself
    pub found: String,
}

impl LexError {
    pub fn new(offset: usize, found: impl Into<String>) -> Self {
        let found = found.into();
        LexError {
            message: format!("invalid character sequence: {found}"),
            offset,
            found,
        }
    }
}

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No tokens were left where an expression was expected
    UnexpectedEof,
    /// A list was opened but the token stream ended before it was closed
    Unbalanced,
    /// A closing parenthesis appeared without a matching opening one
    UnexpectedToken,
    /// Nesting exceeded the configured maximum parse depth
    TooDeeplyNested,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Index of the offending token
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, position: usize) -> Self {
        ParseError {
            kind,
            message: message.into(),
            position,
        }
    }
}

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("{name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: Arity,
        got: usize,
    },
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("division by zero")]
    DivisionByZero,
    /// Malformed special form
    #[error("{0}")]
    Syntax(String),
    #[error("empty list is not a valid expression")]
    EmptyList,
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("evaluation depth limit exceeded (max: {0})")]
    DepthExceeded(usize),
}

impl EvalError {
    pub(crate) fn arity(name: impl Into<String>, expected: Arity, got: usize) -> Self {
        EvalError::Arity {
            name: name.into(),
            expected,
            got,
        }
    }
}

/// Any failure of the lex, parse, evaluate pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("LexError: {0}")]
    Lex(#[from] LexError),
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error("EvalError: {0}")]
    Eval(#[from] EvalError),
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod source;
mod stack;

pub use ast::{Atom, Callable, Expr, Value};
pub use evaluator::{EvalConfig, Environment, Evaluator};
pub use lexer::{is_balanced, tokenize};
pub use parser::{ParseConfig, Parser, parse, parse_all};
