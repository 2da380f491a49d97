//! This module defines the expression tree produced by the parser and the runtime
//! values produced by the evaluator. [`Expr`] is deliberately thin: the parser only
//! folds integer literals, every other token stays as raw text and is resolved
//! during evaluation. [`Value`] covers every kind of data a program can hold,
//! including first-class callables. Conversion traits from common Rust types make
//! values easy to build in code and tests, and display logic renders values the
//! way the REPL prints them.

use crate::EvalError;
use crate::builtinops::Arity;
use std::sync::Arc;

/// Leaf of an expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// Token that lexically parsed as a base-10 integer
    Integer(i64),
    /// Any other token, kept verbatim (symbols, floats, string literals with quotes)
    Text(String),
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Atom(Atom),
    List(Vec<Expr>),
}

impl Expr {
    pub fn integer(n: i64) -> Self {
        Expr::Atom(Atom::Integer(n))
    }

    pub fn text<S: AsRef<str>>(token: S) -> Self {
        Expr::Atom(Atom::Text(token.as_ref().to_owned()))
    }

    pub fn list<I: IntoIterator<Item = Expr>>(items: I) -> Self {
        Expr::List(items.into_iter().collect())
    }

    /// The raw token of a text atom, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Expr::Atom(Atom::Text(token)) => Some(token),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Atom(Atom::Integer(n)) => write!(f, "{n}"),
            Expr::Atom(Atom::Text(token)) => write!(f, "{token}"),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Canonical erased signature of a native function.
///
/// Builtins borrow their already-evaluated arguments.
pub type BuiltinFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

/// A native function bound in the environment
#[derive(Clone)]
pub struct Builtin {
    pub(crate) name: String,
    pub(crate) arity: Arity,
    // Stored as an Arc so values stay cheap to clone when environments are snapshotted
    pub(crate) func: Arc<BuiltinFn>,
}

impl Builtin {
    pub fn new<F>(name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Builtin {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

/// A user-defined function created by `defun`.
///
/// Only the parameter list and body are kept. Free variables in the body are
/// resolved against the environment of the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub name: String,
    pub params: Arc<[String]>,
    pub body: Arc<[Expr]>,
}

/// Something that can be applied to a list of evaluated arguments
#[derive(Clone)]
pub enum Callable {
    Builtin(Builtin),
    Closure(Closure),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Builtin(builtin) => &builtin.name,
            Callable::Closure(closure) => &closure.name,
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Builtin(builtin) => write!(f, "Builtin({})", builtin.name),
            Callable::Closure(closure) => write!(
                f,
                "Closure({}, params={:?}, body={:?})",
                closure.name, closure.params, closure.body
            ),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Builtins are compared by name, not by function pointer
            (Callable::Builtin(a), Callable::Builtin(b)) => a.name == b.name,
            (Callable::Closure(a), Callable::Closure(b)) => a == b,
            _ => false,
        }
    }
}

/// Runtime value produced by evaluation
///
/// To build values in code, use the `From` conversions:
/// - `Value::from(42)` for integers, `Value::from(2.5)` for floats
/// - `Value::from("text")` for strings, `Value::from(true)` for booleans
/// - `Value::from([1, 2, 3])` or `Value::from(vec![...])` for lists
#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    /// Identifier inside unevaluated data; the evaluator never returns one
    Symbol(String),
    Bool(bool),
    List(Vec<Value>),
    Callable(Callable),
    /// Absence of a value, e.g. a `cond` where no clause matched
    Nil,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(items) => {
                write!(f, "List(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Callable(callable) => write!(f, "{callable:?}"),
            Value::Nil => write!(f, "Nil"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(callable)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(i64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Helper for building values in tests: accepts anything convertible to a `Value`
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

impl Value {
    /// Numeric view used by every arithmetic builtin.
    #[allow(clippy::cast_precision_loss)] // all arithmetic runs in f64
    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            other => Err(EvalError::TypeMismatch {
                expected: "a number",
                found: other.to_string(),
            }),
        }
    }

    /// Truthiness used by `cond`: `true` and nonzero numbers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(_)
            | Value::Symbol(_)
            | Value::List(_)
            | Value::Callable(_)
            | Value::Nil => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            // Debug formatting keeps the ".0" on whole floats such as literal 2.0
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) | Value::Symbol(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Callable(Callable::Builtin(builtin)) => {
                write!(f, "#<builtin:{}>", builtin.name)
            }
            Value::Callable(Callable::Closure(closure)) => {
                write!(f, "#<function:{}>", closure.name)
            }
            Value::Nil => write!(f, "nil"),
        }
    }
}

/// Structural equality, which is also what the `equal` builtin uses.
///
/// Lists compare element-wise and by length. Integers and floats are distinct
/// variants, so `Integer(2)` is not equal to `Float(2.0)`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) | (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }
}
