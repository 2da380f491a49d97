use crate::ast::{Atom, Builtin, Callable, Closure, Expr, Value};
use crate::builtinops::{Arity, get_builtin_ops};
use crate::stack::ensure_sufficient_stack;
use crate::{EvalError, MAX_EVAL_DEPTH};
use std::collections::HashMap;

/// Environment for variable bindings
///
/// A flat name-to-value map. There is no parent chain: a function call gets a
/// full snapshot copy of the caller's environment, so mutations inside the call
/// stay inside the call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// An empty environment with no builtins; see [`create_global_env`].
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
        }
    }

    /// Bind `name`, replacing any previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Independent copy of every binding, used for function calls.
    pub fn snapshot(&self) -> Environment {
        self.clone()
    }

    /// Register a custom builtin function under `name`.
    ///
    /// The function receives already-evaluated arguments. The arity is checked
    /// before the function runs.
    ///
    /// # Example
    /// ```
    /// use minilisp::builtinops::Arity;
    /// use minilisp::{Evaluator, Value};
    ///
    /// let evaluator = Evaluator::new();
    /// let mut env = evaluator.global_env();
    /// env.register_builtin("double", Arity::Exact(1), |args| {
    ///     Ok(Value::Float(args[0].as_number()? * 2.0))
    /// });
    /// let value = minilisp::source::eval_str(&evaluator, "(double 2.5)", &mut env).unwrap();
    /// assert_eq!(value, Value::Float(5.0));
    /// ```
    pub fn register_builtin<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.define(
            name,
            Value::Callable(Callable::Builtin(Builtin::new(name, arity, func))),
        );
    }

    /// Get all bindings as (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Create an environment holding every builtin operation as a callable value
pub fn create_global_env() -> Environment {
    let mut env = Environment::new();

    for op in get_builtin_ops() {
        env.define(
            op.id,
            Value::Callable(Callable::Builtin(Builtin::new(op.id, op.arity, op.func))),
        );
    }

    env
}

/// Evaluator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Nested forms plus function calls allowed before evaluation is aborted
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Tree-walking evaluator
///
/// Holds its configuration and a prototype environment with every builtin
/// bound. The environment being evaluated against is passed to
/// [`Evaluator::evaluate`] explicitly, so one evaluator can serve several
/// independent environments.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvalConfig,
    prelude: Environment,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator {
            config,
            prelude: create_global_env(),
        }
    }

    pub fn config(&self) -> EvalConfig {
        self.config
    }

    /// A fresh environment pre-populated with the builtins.
    pub fn global_env(&self) -> Environment {
        self.prelude.clone()
    }

    /// Evaluate `expr` against `env`.
    ///
    /// `setq` and `defun` bind into `env` as a side effect.
    pub fn evaluate(&self, expr: &Expr, env: &mut Environment) -> Result<Value, EvalError> {
        self.eval_with_depth_tracking(expr, env, 0)
    }

    /// Apply a callable to already-evaluated arguments, with `caller` as the
    /// environment a closure body snapshots.
    pub fn apply(
        &self,
        callable: &Callable,
        args: Vec<Value>,
        caller: &Environment,
    ) -> Result<Value, EvalError> {
        self.apply_with_depth(callable, args, caller, 0)
    }

    fn eval_with_depth_tracking(
        &self,
        expr: &Expr,
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value, EvalError> {
        if depth >= self.config.max_depth {
            tracing::warn!(max_depth = self.config.max_depth, "evaluation depth limit hit");
            return Err(EvalError::DepthExceeded(self.config.max_depth));
        }
        tracing::trace!(depth, %expr, "evaluating");

        ensure_sufficient_stack(|| match expr {
            Expr::Atom(Atom::Integer(n)) => Ok(Value::Integer(*n)),
            Expr::Atom(Atom::Text(token)) => resolve_symbol(token, env),
            Expr::List(elements) => self.eval_list(elements, env, depth),
        })
    }

    fn eval_list(
        &self,
        elements: &[Expr],
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let Some((head, operands)) = elements.split_first() else {
            return Err(EvalError::EmptyList);
        };
        let Some(operator) = head.as_text() else {
            return Err(EvalError::InvalidOperator(head.to_string()));
        };

        // Special forms take precedence over builtins, builtins over the environment
        match operator {
            "setq" => self.eval_setq(operands, env, depth),
            "defun" => eval_defun(operands, env),
            "quote" => eval_quote(operands),
            "cond" => self.eval_cond(operands, env, depth),
            _ => {
                if let Some(op) = crate::builtinops::find_op(operator) {
                    let args = self.eval_args(operands, env, depth)?;
                    return op.call(&args);
                }

                let callable = match env.get(operator) {
                    Some(Value::Callable(callable)) => callable.clone(),
                    Some(_) => return Err(EvalError::NotCallable(operator.to_owned())),
                    None => return Err(EvalError::UndefinedFunction(operator.to_owned())),
                };
                let args = self.eval_args(operands, env, depth)?;
                self.apply_with_depth(&callable, args, env, depth)
            }
        }
    }

    /// Evaluate argument expressions left to right
    fn eval_args(
        &self,
        args: &[Expr],
        env: &mut Environment,
        depth: usize,
    ) -> Result<Vec<Value>, EvalError> {
        args.iter()
            .map(|arg| self.eval_with_depth_tracking(arg, env, depth + 1))
            .collect()
    }

    fn apply_with_depth(
        &self,
        callable: &Callable,
        args: Vec<Value>,
        caller: &Environment,
        depth: usize,
    ) -> Result<Value, EvalError> {
        match callable {
            Callable::Builtin(builtin) => {
                builtin.arity.validate(&builtin.name, args.len())?;
                (builtin.func)(&args)
            }
            Callable::Closure(closure) => {
                let Closure { name, params, body } = closure;
                if params.len() != args.len() {
                    return Err(EvalError::arity(
                        name.as_str(),
                        Arity::Exact(params.len()),
                        args.len(),
                    ));
                }
                tracing::debug!(function = %name, args = args.len(), "calling function");

                // Snapshot of the caller's live bindings, not the definition scope
                let mut local = caller.snapshot();
                for (param, arg) in params.iter().zip(args) {
                    local.define(param.as_str(), arg);
                }

                ensure_sufficient_stack(|| -> Result<Value, EvalError> {
                    let mut result = Value::Nil;
                    for expr in body.iter() {
                        result = self.eval_with_depth_tracking(expr, &mut local, depth + 1)?;
                    }
                    Ok(result)
                })
            }
        }
    }

    /// `(setq name value-expr)`
    fn eval_setq(
        &self,
        operands: &[Expr],
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let [target, value_expr] = operands else {
            return Err(EvalError::arity("setq", Arity::Exact(2), operands.len()));
        };
        let name = symbol_name(target)
            .ok_or_else(|| EvalError::Syntax(format!("setq requires a symbol, got {target}")))?;

        let value = self.eval_with_depth_tracking(value_expr, env, depth + 1)?;
        tracing::debug!(name, %value, "setq");
        env.define(name, value.clone());
        Ok(value)
    }

    /// `(cond (test body...) ...)`
    fn eval_cond(
        &self,
        clauses: &[Expr],
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value, EvalError> {
        for clause in clauses {
            let Expr::List(items) = clause else {
                return Err(EvalError::Syntax(format!(
                    "each cond clause must be a list, got {clause}"
                )));
            };
            let Some((test, body)) = items.split_first() else {
                continue;
            };

            let taken = test.as_text() == Some("t")
                || self
                    .eval_with_depth_tracking(test, env, depth + 1)?
                    .is_truthy();
            if taken {
                let mut result = Value::Nil;
                for expr in body {
                    result = self.eval_with_depth_tracking(expr, env, depth + 1)?;
                }
                return Ok(result);
            }
        }
        Ok(Value::Nil)
    }
}

/// Resolve a text atom: string literal, bound name, or numeric literal.
fn resolve_symbol(token: &str, env: &Environment) -> Result<Value, EvalError> {
    if let Some(contents) = string_literal(token) {
        return Ok(Value::Str(contents));
    }
    if let Some(value) = env.get(token) {
        return Ok(value.clone());
    }
    parse_number(token).ok_or_else(|| EvalError::UndefinedSymbol(token.to_owned()))
}

/// Numeric fallback for unbound tokens. A `.` or an exponent marker makes the
/// token a float; anything else must be an integer.
fn parse_number(token: &str) -> Option<Value> {
    let looks_numeric = token
        .strip_prefix('-')
        .unwrap_or(token)
        .starts_with(|c: char| c.is_ascii_digit());
    if !looks_numeric {
        return None;
    }

    // An exponent marker also makes a float, so `1e3` is 1000.0 rather than
    // an unbound symbol
    if token.contains(['.', 'e', 'E']) {
        token.parse::<f64>().ok().map(Value::Float)
    } else {
        token.parse::<i64>().ok().map(Value::Integer)
    }
}

/// Contents of a double-quoted token with escapes resolved.
fn string_literal(token: &str) -> Option<String> {
    let inner = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))?;

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    Some(result)
}

/// Name usable as a binding target: a text atom that is not a string literal.
fn symbol_name(expr: &Expr) -> Option<&str> {
    expr.as_text().filter(|token| !token.starts_with('"'))
}

/// `(defun name (params...) body...)`
fn eval_defun(operands: &[Expr], env: &mut Environment) -> Result<Value, EvalError> {
    let [name_expr, params_expr, body @ ..] = operands else {
        return Err(EvalError::arity("defun", Arity::AtLeast(3), operands.len()));
    };
    if body.is_empty() {
        return Err(EvalError::arity("defun", Arity::AtLeast(3), operands.len()));
    }

    let name = symbol_name(name_expr).ok_or_else(|| {
        EvalError::Syntax(format!("defun requires a function name, got {name_expr}"))
    })?;

    let Expr::List(param_list) = params_expr else {
        return Err(EvalError::Syntax(format!(
            "defun parameters must be a list, got {params_expr}"
        )));
    };
    let params = param_list
        .iter()
        .map(|param| {
            symbol_name(param).map(str::to_owned).ok_or_else(|| {
                EvalError::Syntax(format!("defun parameters must be symbols, got {param}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(name, params = params.len(), "defun");
    env.define(
        name,
        Value::Callable(Callable::Closure(Closure {
            name: name.to_owned(),
            params: params.into(),
            body: body.into(),
        })),
    );
    Ok(Value::Str(name.to_owned()))
}

/// `(quote expr)`
fn eval_quote(operands: &[Expr]) -> Result<Value, EvalError> {
    match operands {
        [expr] => Ok(quote_to_value(expr)),
        _ => Err(EvalError::arity("quote", Arity::Exact(1), operands.len())),
    }
}

/// Convert an expression to data without evaluating it.
fn quote_to_value(expr: &Expr) -> Value {
    match expr {
        Expr::Atom(Atom::Integer(n)) => Value::Integer(*n),
        Expr::Atom(Atom::Text(token)) => {
            Value::Str(string_literal(token).unwrap_or_else(|| token.clone()))
        }
        Expr::List(items) => Value::List(items.iter().map(quote_to_value).collect()),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    fn parse_str(input: &str) -> Expr {
        parse(&tokenize(input).unwrap()).unwrap()
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        let evaluator = Evaluator::new();
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let mut env = evaluator.global_env();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(&evaluator, input, expected, &mut env, &test_id);
            }
        }
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(
        evaluator: &Evaluator,
        input: &str,
        expected: &TestResult,
        env: &mut Environment,
        test_id: &str,
    ) {
        let expr = parse_str(input);

        match (evaluator.evaluate(&expr, env), expected) {
            (Ok(actual), EvalResult(expected_val)) => {
                assert_eq!(actual, *expected_val, "{test_id}: wrong value for '{input}'");
            }
            (Err(_), Error) => {}
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), Error) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Ok(actual), SpecificError(expected_text)) => {
                panic!("{test_id}: expected error containing '{expected_text}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: expected {expected_val:?} for '{input}', got error {err:?}");
            }
        }
    }

    /// Each case runs in a fresh global environment
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        let evaluator = Evaluator::new();
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut env = evaluator.global_env();
            let test_id = format!("#{}", i + 1);
            execute_test_case(&evaluator, input, expected, &mut env, &test_id);
        }
    }

    #[test]
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === ATOMS ===
            ("42", success(42)),
            ("-271", success(-271)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("3.5", success(3.5)),
            ("-0.25", success(-0.25)),
            ("2.0", success(2.0)),
            ("1e3", success(1000.0)),
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            ("\"\"", success("")),
            ("\"with\\\"quotes\"", success("with\"quotes")),
            ("\"line\\nbreak\"", success("line\nbreak")),
            ("undefined-thing", SpecificError("undefined symbol: undefined-thing")),
            ("t", SpecificError("undefined symbol")),
            ("9223372036854775808", SpecificError("undefined symbol")),
            // === ARITHMETIC ===
            ("(+ 3 (* 4 2))", success(11)),
            ("(+ 1 2 3)", success(6)),
            ("(+ 42)", success(42)),
            ("(+ 1.5 1.5)", success(3)),
            ("(+ 1 0.5)", success(1.5)),
            ("(- 10 3 2)", success(5)),
            ("(- 10)", success(-10)),
            ("(- 0.5)", success(-0.5)),
            ("(* 2 3 4)", success(24)),
            ("(* 7)", success(7)),
            ("(* 2.5 4)", success(10)),
            ("(/ 10 2)", success(5)),
            ("(/ 7 2)", success(3.5)),
            ("(/ 100 10 5)", success(2)),
            ("(/ 4)", success(0.25)),
            ("(/ 1 0)", SpecificError("division by zero")),
            ("(/ 0)", SpecificError("division by zero")),
            ("(+ (* 2 3) (- 8 2))", success(12)),
            ("(+ \"a\" 1)", SpecificError("expected a number")),
            ("(* 2 (quote (1)))", SpecificError("expected a number")),
            ("(+)", SpecificError("+ expects at least 1 arguments, got 0")),
            ("(-)", Error),
            // === COMPARISON ===
            ("(= 5 5)", success(true)),
            ("(= 5 6)", success(false)),
            ("(= 2 2.0)", success(true)),
            ("(< 3 5)", success(true)),
            ("(< 5 3)", success(false)),
            ("(> 5 3)", success(true)),
            ("(> 3 5)", success(false)),
            ("(= 1 1 1)", SpecificError("= expects exactly 2 arguments, got 3")),
            ("(< 1)", Error),
            ("(> \"a\" 1)", SpecificError("expected a number")),
            // === QUOTE ===
            ("(quote (+ 1 2))", success(vec![val("+"), val(1), val(2)])),
            ("(quote x)", success("x")),
            ("(quote 42)", success(42)),
            ("(quote \"s\")", success("s")),
            ("(quote 2.5)", success("2.5")),
            ("(quote ())", success(Vec::<Value>::new())),
            (
                "(quote (a (b 1)))",
                success(vec![val("a"), val(vec![val("b"), val(1)])]),
            ),
            ("(quote)", SpecificError("quote expects exactly 1 arguments, got 0")),
            ("(quote a b)", Error),
            // === PREDICATES ===
            ("(equal (quote (1 2)) (quote (1 2)))", success(true)),
            ("(equal (quote (1 2)) (quote (1 2 3)))", success(false)),
            ("(equal (quote (1 2)) (quote (1 3)))", success(false)),
            ("(equal 3 (+ 1 2))", success(true)),
            ("(equal \"a\" \"a\")", success(true)),
            ("(equal 1)", Error),
            ("(atom 5)", success(true)),
            ("(atom \"x\")", success(true)),
            ("(atom (quote (1 2)))", success(false)),
            ("(list (quote (1 2)))", success(true)),
            ("(list 5)", success(false)),
            ("(list 1 2)", SpecificError("list expects exactly 1 arguments, got 2")),
            // === COND ===
            ("(cond ((= 1 0) \"nope\") ((= 2 2) \"sí\") (t \"unreachable\"))", success("sí")),
            ("(cond ((= 1 0) 1))", EvalResult(Value::Nil)),
            ("(cond)", EvalResult(Value::Nil)),
            ("(cond () (t 7))", success(7)),
            ("(cond (1 \"nonzero\"))", success("nonzero")),
            ("(cond (0 \"zero\") (t \"fallback\"))", success("fallback")),
            ("(cond (0.5 \"half\"))", success("half")),
            ("(cond (\"str\" 1) (t 2))", success(2)),
            ("(cond ((= 1 1)))", EvalResult(Value::Nil)),
            ("(cond (t 1 2 3))", success(3)),
            ("(cond x)", SpecificError("each cond clause must be a list")),
            // === ERRORS ===
            ("()", SpecificError("empty list is not a valid expression")),
            ("(1 2 3)", SpecificError("invalid operator: 1")),
            ("((quote +) 1 2)", SpecificError("invalid operator")),
            ("(frobnicate 1)", SpecificError("undefined function: frobnicate")),
            ("(setq x)", SpecificError("setq expects exactly 2 arguments, got 1")),
            ("(setq)", Error),
            ("(setq x 1 2)", Error),
            ("(setq 5 1)", SpecificError("setq requires a symbol")),
            ("(setq \"x\" 1)", SpecificError("setq requires a symbol")),
            ("(defun f)", SpecificError("defun expects at least 3 arguments, got 1")),
            ("(defun f (x))", Error),
            ("(defun f x x)", SpecificError("defun parameters must be a list")),
            ("(defun f (1) 1)", SpecificError("defun parameters must be symbols")),
            ("(defun (f) (x) x)", SpecificError("defun requires a function name")),
        ];

        run_comprehensive_tests(test_cases);
    }

    #[test]
    fn test_binding_and_functions_in_shared_environment() {
        run_tests_in_environment(vec![
            // Binding round-trip
            TestEnvironment(vec![
                ("(setq x 10)", success(10)),
                ("x", success(10)),
                ("(setq y (+ x 5))", success(15)),
                ("(* x y)", success(150)),
                ("(setq x \"rebound\")", success("rebound")),
                ("x", success("rebound")),
                ("(x 1)", SpecificError("x is not a function")),
            ]),
            // Recursive definition
            TestEnvironment(vec![
                (
                    "(defun factorial (n) (cond ((= n 0) 1) (t (* n (factorial (- n 1))))))",
                    success("factorial"),
                ),
                ("(factorial 0)", success(1)),
                ("(factorial 5)", success(120)),
                ("(factorial 10)", success(3_628_800)),
                ("(factorial)", SpecificError("factorial expects exactly 1 arguments, got 0")),
                ("(factorial 1 2)", Error),
            ]),
            // Multi-expression bodies return the last value
            TestEnvironment(vec![
                ("(defun twice (a) (setq b (* a 2)) (+ b 0))", success("twice")),
                ("(twice 21)", success(42)),
                // The body's setq stayed in the call's snapshot
                ("b", SpecificError("undefined symbol: b")),
            ]),
            // Snapshot isolation: callee mutations never reach the caller
            TestEnvironment(vec![
                ("(setq counter 1)", success(1)),
                ("(defun bump () (setq counter 99) counter)", success("bump")),
                ("(bump)", success(99)),
                ("counter", success(1)),
            ]),
            // Parameters shadow globals only inside the call
            TestEnvironment(vec![
                ("(setq n 100)", success(100)),
                ("(defun inc (n) (+ n 1))", success("inc")),
                ("(inc 1)", success(2)),
                ("n", success(100)),
            ]),
            // Free variables resolve against the caller's live bindings
            TestEnvironment(vec![
                ("(defun scaled (v) (* v factor))", success("scaled")),
                ("(scaled 2)", SpecificError("undefined symbol: factor")),
                ("(setq factor 3)", success(3)),
                ("(scaled 2)", success(6)),
                ("(setq factor 10)", success(10)),
                ("(scaled 2)", success(20)),
            ]),
            // Builtins are first-class values in the environment
            TestEnvironment(vec![
                ("(setq plus +)", EvalResult(create_global_env().get("+").unwrap().clone())),
                ("(plus 1 2 3)", success(6)),
                ("(plus)", Error),
                // Builtin names cannot be shadowed as operators
                ("(defun + (a b) 0)", success("+")),
                ("(+ 1 2)", success(3)),
            ]),
            // Redefinition replaces the previous function
            TestEnvironment(vec![
                ("(defun f () 1)", success("f")),
                ("(f)", success(1)),
                ("(defun f () 2)", success("f")),
                ("(f)", success(2)),
            ]),
            // Mutual recursion through the caller's environment
            TestEnvironment(vec![
                ("(defun is-even (n) (cond ((= n 0) (= 1 1)) (t (is-odd (- n 1)))))", success("is-even")),
                ("(defun is-odd (n) (cond ((= n 0) (= 1 0)) (t (is-even (- n 1)))))", success("is-odd")),
                ("(is-even 10)", success(true)),
                ("(is-odd 7)", success(true)),
                ("(is-even 3)", success(false)),
            ]),
        ]);
    }

    #[test]
    fn test_cond_short_circuits() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        evaluator
            .evaluate(&parse_str("(setq touched 0)"), &mut env)
            .unwrap();

        let result = evaluator
            .evaluate(
                &parse_str(
                    "(cond ((= 1 0) (setq touched 1)) ((= 2 2) \"sí\") ((setq touched 2) \"unreachable\") (t (setq touched 3)))",
                ),
                &mut env,
            )
            .unwrap();

        assert_eq!(result, val("sí"));
        assert_eq!(env.get("touched"), Some(&val(0)));
    }

    #[test]
    fn test_operands_evaluate_left_to_right() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        let result = evaluator
            .evaluate(&parse_str("(- (setq a 10) (setq a 3) a)"), &mut env)
            .unwrap();
        assert_eq!(result, val(4));
        assert_eq!(env.get("a"), Some(&val(3)));
    }

    #[test]
    fn test_failed_evaluation_does_not_bind() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        let before = env.len();
        assert!(
            evaluator
                .evaluate(&parse_str("(setq x (/ 1 0))"), &mut env)
                .is_err()
        );
        assert!(!env.contains("x"));
        assert_eq!(env.len(), before);
    }

    #[test]
    fn test_depth_limit() {
        let evaluator = Evaluator::with_config(EvalConfig { max_depth: 64 });
        let mut env = evaluator.global_env();
        evaluator
            .evaluate(&parse_str("(defun forever (n) (forever n))"), &mut env)
            .unwrap();

        let err = evaluator
            .evaluate(&parse_str("(forever 1)"), &mut env)
            .unwrap_err();
        assert_eq!(err, EvalError::DepthExceeded(64));

        // Shallow work still fits within the same limit
        evaluator
            .evaluate(
                &parse_str("(defun fact (n) (cond ((= n 0) 1) (t (* n (fact (- n 1))))))"),
                &mut env,
            )
            .unwrap();
        assert_eq!(
            evaluator.evaluate(&parse_str("(fact 5)"), &mut env).unwrap(),
            val(120)
        );
    }

    #[test]
    fn test_default_depth_on_test_thread() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();

        // Deep but finite recursion completes on a default-sized thread stack
        evaluator
            .evaluate(
                &parse_str("(defun sum (n) (cond ((= n 0) 0) (t (+ n (sum (- n 1))))))"),
                &mut env,
            )
            .unwrap();
        assert_eq!(
            evaluator.evaluate(&parse_str("(sum 1000)"), &mut env).unwrap(),
            val(500_500)
        );

        // Runaway recursion is stopped by the limit, not by the native stack
        evaluator
            .evaluate(&parse_str("(defun forever (n) (forever n))"), &mut env)
            .unwrap();
        assert_eq!(
            evaluator
                .evaluate(&parse_str("(forever 1)"), &mut env)
                .unwrap_err(),
            EvalError::DepthExceeded(MAX_EVAL_DEPTH)
        );
    }

    #[test]
    fn test_global_env_contains_builtins() {
        let evaluator = Evaluator::new();
        let env = evaluator.global_env();
        for name in ["+", "-", "*", "/", "=", "<", ">", "equal", "atom", "list"] {
            match env.get(name) {
                Some(Value::Callable(Callable::Builtin(builtin))) => {
                    assert_eq!(builtin.name(), name);
                }
                other => panic!("expected builtin for {name}, got {other:?}"),
            }
        }
        assert!(Environment::new().is_empty());
        assert_eq!(evaluator.config(), EvalConfig::default());
    }

    #[test]
    fn test_apply_callable_directly() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        evaluator
            .evaluate(&parse_str("(defun add3 (a b c) (+ a b c))"), &mut env)
            .unwrap();

        let add3 = env.get("add3").unwrap().as_callable().unwrap().clone();
        assert_eq!(
            evaluator
                .apply(&add3, vec![val(1), val(2), val(3.5)], &env)
                .unwrap(),
            val(6.5)
        );
        assert_eq!(
            evaluator.apply(&add3, vec![val(1)], &env).unwrap_err(),
            EvalError::arity("add3", Arity::Exact(3), 1)
        );

        let times = env.get("*").unwrap().as_callable().unwrap().clone();
        assert_eq!(
            evaluator.apply(&times, vec![val(6), val(7)], &env).unwrap(),
            val(42)
        );
    }

    #[test]
    fn test_register_builtin() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        env.register_builtin("first", Arity::Exact(1), |args| match &args[0] {
            Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Nil)),
            other => Err(EvalError::TypeMismatch {
                expected: "a list",
                found: other.to_string(),
            }),
        });

        assert_eq!(
            evaluator
                .evaluate(&parse_str("(first (quote (7 8 9)))"), &mut env)
                .unwrap(),
            val(7)
        );
        assert!(
            evaluator
                .evaluate(&parse_str("(first 1 2)"), &mut env)
                .is_err()
        );
        assert!(
            evaluator
                .evaluate(&parse_str("(first 1)"), &mut env)
                .is_err()
        );
    }

    #[test]
    fn test_get_all_bindings_sorted() {
        let mut env = Environment::new();
        env.define("b", val(2));
        env.define("a", val(1));
        env.define("c", val(3));
        let names: Vec<String> = env.get_all_bindings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_number_fallback() {
        assert_eq!(parse_number("12"), Some(val(12)));
        assert_eq!(parse_number("-3.5"), Some(val(-3.5)));
        assert_eq!(parse_number("6.02e23"), Some(val(6.02e23)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("1.2.3"), None);
    }
}
