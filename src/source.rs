//! Helpers for front ends that feed whole files or multi-line input into the
//! evaluator.

use crate::ast::Value;
use crate::evaluator::{Environment, Evaluator};
use crate::lexer::tokenize;
use crate::parser::parse_all;
use crate::{Error, ParseError, ParseErrorKind};

/// Group the lines of `text` into chunks, one per top-level expression.
///
/// Lines are accumulated until the running parenthesis count drops to zero or
/// below, at which point the chunk is emitted. Blank lines between chunks are
/// skipped. A trailing chunk that never balances is still emitted so the
/// parser can report it.
pub fn split_expressions(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut balance: i64 = 0;

    for line in text.lines() {
        if current.is_empty() && line.trim().is_empty() {
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        for c in line.chars() {
            match c {
                '(' => balance += 1,
                ')' => balance -= 1,
                _ => {}
            }
        }

        if balance <= 0 && !current.trim().is_empty() {
            chunks.push(std::mem::take(&mut current));
            balance = 0;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Lex, parse and evaluate every form in `text`, returning the last value.
///
/// Stops at the first error. Forms evaluated before the error keep their
/// effect on `env`.
pub fn eval_str(evaluator: &Evaluator, text: &str, env: &mut Environment) -> Result<Value, Error> {
    let tokens = tokenize(text)?;
    let exprs = parse_all(&tokens)?;

    let mut last = None;
    for expr in &exprs {
        last = Some(evaluator.evaluate(expr, env)?);
    }
    last.ok_or_else(|| {
        Error::Parse(ParseError::new(
            ParseErrorKind::UnexpectedEof,
            "no expression to evaluate",
            0,
        ))
    })
}

/// Evaluate each chunk of `text` independently, continuing after failures.
///
/// One result per chunk from [`split_expressions`], in order.
pub fn eval_source(
    evaluator: &Evaluator,
    text: &str,
    env: &mut Environment,
) -> Vec<Result<Value, Error>> {
    split_expressions(text)
        .iter()
        .map(|chunk| {
            let result = eval_str(evaluator, chunk, env);
            if let Err(e) = &result {
                tracing::debug!(error = %e, "chunk failed");
            }
            result
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use pretty_assertions::assert_eq;

    const FACTORIAL_PROGRAM: &str = "\
(defun factorial (n)
  (cond ((= n 0) 1)
        (t (* n (factorial (- n 1))))))

(setq x 5)
(factorial x)
";

    #[test]
    fn test_split_expressions() {
        let chunks = split_expressions(FACTORIAL_PROGRAM);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("(defun factorial (n)"));
        assert!(chunks[0].ends_with("(factorial (- n 1))))))"));
        assert_eq!(chunks[1], "(setq x 5)");
        assert_eq!(chunks[2], "(factorial x)");
    }

    #[test]
    fn test_split_expressions_edge_cases() {
        assert!(split_expressions("").is_empty());
        assert!(split_expressions("\n  \n\t\n").is_empty());

        // A line holding several forms stays one chunk
        assert_eq!(split_expressions("(setq a 1) (setq b 2)"), vec!["(setq a 1) (setq b 2)"]);

        // Unclosed trailing input is still handed over
        assert_eq!(split_expressions("(+ 1\n  2"), vec!["(+ 1\n  2"]);

        // Extra closers reset the count instead of poisoning later chunks
        assert_eq!(
            split_expressions("(a))\n(b\n)"),
            vec!["(a))", "(b\n)"]
        );

        // Bare atoms are chunks of their own
        assert_eq!(split_expressions("x\ny"), vec!["x", "y"]);
    }

    #[test]
    fn test_eval_str_returns_last_value() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        assert_eq!(
            eval_str(&evaluator, FACTORIAL_PROGRAM, &mut env).unwrap(),
            val(120)
        );
        assert_eq!(env.get("x"), Some(&val(5)));
    }

    #[test]
    fn test_eval_str_errors() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();

        assert!(matches!(
            eval_str(&evaluator, "(a #b)", &mut env),
            Err(Error::Lex(_))
        ));
        assert!(matches!(
            eval_str(&evaluator, "(+ 1 2", &mut env),
            Err(Error::Parse(ParseError {
                kind: ParseErrorKind::Unbalanced,
                ..
            }))
        ));
        assert!(matches!(
            eval_str(&evaluator, "   ", &mut env),
            Err(Error::Parse(ParseError {
                kind: ParseErrorKind::UnexpectedEof,
                ..
            }))
        ));

        // Forms before the failing one keep their effect
        let err = eval_str(&evaluator, "(setq kept 1) (/ kept 0) (setq lost 2)", &mut env)
            .unwrap_err();
        assert_eq!(err.to_string(), "EvalError: division by zero");
        assert!(env.contains("kept"));
        assert!(!env.contains("lost"));
    }

    #[test]
    fn test_eval_source_continues_after_errors() {
        let evaluator = Evaluator::new();
        let mut env = evaluator.global_env();
        let results = eval_source(
            &evaluator,
            "(setq a 2)\n(undefined-fn a)\n(a b\n(* a 21)\n",
            &mut env,
        );

        // "(a b" swallows the next line, leaving three chunks
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(val(2)));
        assert_eq!(
            results[1].as_ref().unwrap_err().to_string(),
            "EvalError: undefined function: undefined-fn"
        );
        assert!(matches!(results[2], Err(Error::Parse(_))));

        let results = eval_source(&evaluator, "(* a 21)\n(a)", &mut env);
        assert_eq!(results[0], Ok(val(42)));
        assert_eq!(
            results[1].as_ref().unwrap_err().to_string(),
            "EvalError: a is not a function"
        );
    }
}
