//! Built-in operations registry.
//!
//! Every native operator is described once by a [`BuiltinOp`] entry: its name,
//! its [`Arity`] and a plain function over already-evaluated arguments. The
//! evaluator consults this registry before looking a name up in the
//! environment, and [`crate::evaluator::create_global_env`] binds every entry as
//! a first-class callable value.
//!
//! ```lisp
//! (+ 3 (* 4 2))              ; 11
//! (/ 10 2)                   ; 5, whole results narrow to integers
//! (/ 7 2)                    ; 3.5
//! (< 1 2)                    ; true
//! (equal (quote (1 2)) (quote (1 2)))  ; true, structural
//! (atom 5)                   ; true
//! (list (quote (1)))         ; true, `list` is a predicate
//! ```
//!
//! ## Numeric model
//!
//! Arithmetic converts every operand to `f64`, computes, and narrows the result
//! back to an integer when it has no fractional part and fits in `i64`. Any
//! operand that is not a number is a type error; there is no coercion from
//! strings or booleans. A zero divisor is an error rather than an infinity.
//!
//! ## Adding New Operations
//!
//! 1. Implement `fn(&[Value]) -> Result<Value, EvalError>`
//! 2. Add an entry to `BUILTIN_OPS` with its arity
//! 3. Add test cases to the table in this module

use crate::EvalError;
use crate::ast::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Number of arguments accepted by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }

    /// Check an argument count, naming the operation in the error.
    pub fn validate(self, name: &str, count: usize) -> Result<(), EvalError> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(EvalError::arity(name, self, count))
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    pub id: &'static str,
    pub func: fn(&[Value]) -> Result<Value, EvalError>,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Validate the argument count, then run the operation.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.arity.validate(self.id, args.len())?;
        (self.func)(args)
    }
}

/// Narrow a computed float back to an integer when it is whole.
///
/// Values outside the `i64` range and non-finite values stay floats.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn normalize_number(x: f64) -> Value {
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = i64::MAX as f64;

    if x.is_finite() && x.fract() == 0.0 && (LOWER..UPPER).contains(&x) {
        Value::Integer(x as i64)
    } else {
        Value::Float(x)
    }
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, EvalError> {
    args.iter().map(Value::as_number).collect()
}

/// Borrow exactly `N` arguments, for builtins called outside the evaluator.
fn exactly<'a, const N: usize>(id: &str, args: &'a [Value]) -> Result<&'a [Value; N], EvalError> {
    args.try_into()
        .map_err(|_| EvalError::arity(id, Arity::Exact(N), args.len()))
}

/// Split numeric arguments into the first operand and the rest.
fn first_and_rest(id: &str, args: &[Value]) -> Result<(f64, Vec<f64>), EvalError> {
    let mut nums = numbers(args)?;
    if nums.is_empty() {
        return Err(EvalError::arity(id, Arity::AtLeast(1), 0));
    }
    let rest = nums.split_off(1);
    Ok((nums[0], rest))
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, EvalError> {
    let (first, rest) = first_and_rest("+", args)?;
    Ok(normalize_number(rest.into_iter().fold(first, |acc, n| acc + n)))
}

fn builtin_sub(args: &[Value]) -> Result<Value, EvalError> {
    let (first, rest) = first_and_rest("-", args)?;
    if rest.is_empty() {
        return Ok(normalize_number(-first));
    }
    Ok(normalize_number(rest.into_iter().fold(first, |acc, n| acc - n)))
}

fn builtin_mul(args: &[Value]) -> Result<Value, EvalError> {
    let (first, rest) = first_and_rest("*", args)?;
    Ok(normalize_number(rest.into_iter().fold(first, |acc, n| acc * n)))
}

fn builtin_div(args: &[Value]) -> Result<Value, EvalError> {
    let (first, rest) = first_and_rest("/", args)?;

    // A single operand yields its reciprocal
    if rest.is_empty() {
        if first == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        return Ok(normalize_number(1.0 / first));
    }

    let mut quotient = first;
    for divisor in rest {
        if divisor == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        quotient /= divisor;
    }
    Ok(normalize_number(quotient))
}

macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, EvalError> {
            let [a, b] = exactly::<2>($op_str, args)?;
            #[allow(clippy::float_cmp)]
            let result = a.as_number()? $op b.as_number()?;
            Ok(Value::Bool(result))
        }
    };
}

numeric_comparison!(builtin_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");

fn builtin_equal(args: &[Value]) -> Result<Value, EvalError> {
    let [a, b] = exactly::<2>("equal", args)?;
    Ok(Value::Bool(a == b))
}

fn builtin_atom(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = exactly::<1>("atom", args)?;
    Ok(Value::Bool(!value.is_list()))
}

// Predicate, not a constructor: answers "is the operand a list?"
fn builtin_list(args: &[Value]) -> Result<Value, EvalError> {
    let [value] = exactly::<1>("list", args)?;
    Ok(Value::Bool(value.is_list()))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: [BuiltinOp; 10] = [
    // Arithmetic operations
    BuiltinOp {
        id: "+",
        func: builtin_add,
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "-",
        func: builtin_sub,
        arity: Arity::AtLeast(1), // unary form negates
    },
    BuiltinOp {
        id: "*",
        func: builtin_mul,
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "/",
        func: builtin_div,
        arity: Arity::AtLeast(1), // unary form is the reciprocal
    },
    // Comparison operations
    BuiltinOp {
        id: "=",
        func: builtin_eq,
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "<",
        func: builtin_lt,
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: ">",
        func: builtin_gt,
        arity: Arity::Exact(2),
    },
    // Predicates
    BuiltinOp {
        id: "equal",
        func: builtin_equal,
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "atom",
        func: builtin_atom,
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "list",
        func: builtin_list,
        arity: Arity::Exact(1),
    },
];

static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.id, op)).collect());

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

/// Find a builtin operation by name
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}
