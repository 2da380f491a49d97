use clap::Parser;
use minilisp::ast::{Callable, Value};
use minilisp::evaluator::{EvalConfig, Environment, Evaluator};
use minilisp::source::{eval_source, eval_str};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use std::panic;
use std::process;

/// Interactive interpreter for a minimal Lisp
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Source file to evaluate before the prompt opens
    file: Option<PathBuf>,

    /// Exit after evaluating FILE instead of starting the REPL
    #[arg(long, requires = "file")]
    no_repl: bool,

    /// Maximum evaluation depth
    #[arg(long, default_value_t = minilisp::MAX_EVAL_DEPTH)]
    max_depth: usize,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}

fn main() {
    let args = Args::parse();
    init_tracing();

    let result = panic::catch_unwind(|| run(&args));

    match result {
        Ok(Ok(code)) => process::exit(code),
        Ok(Err(err)) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
        Err(panic_info) => {
            eprintln!("The REPL encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }

            process::exit(1);
        }
    }
}

/// Returns the process exit code.
fn run(args: &Args) -> Result<i32, ReadlineError> {
    let evaluator = Evaluator::with_config(EvalConfig {
        max_depth: args.max_depth,
    });
    let mut env = evaluator.global_env();

    if let Some(path) = &args.file {
        let clean = load_file(&evaluator, path, &mut env);
        if args.no_repl {
            return Ok(i32::from(!clean));
        }
    }

    run_repl(&evaluator, &mut env)?;
    Ok(0)
}

fn run_repl(evaluator: &Evaluator, env: &mut Environment) -> Result<(), ReadlineError> {
    println!("minilisp");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "minilisp> "
        } else {
            "      ... "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    // Handle special commands
                    if trimmed.starts_with(':') {
                        let _ = rl.add_history_entry(trimmed);
                        match trimmed.split_once(char::is_whitespace) {
                            Some((":load", path)) => {
                                load_file(evaluator, Path::new(path.trim()), env);
                            }
                            _ => match trimmed {
                                ":help" => print_help(),
                                ":env" => print_environment(env),
                                ":load" => println!("Usage: :load <path>"),
                                ":quit" | ":exit" => {
                                    println!("Goodbye!");
                                    break;
                                }
                                other => println!("Unknown command: {other} (try :help)"),
                            },
                        }
                        continue;
                    }
                } else {
                    pending.push('\n');
                }
                pending.push_str(&line);

                // Keep reading until the parentheses close
                if pending.matches('(').count() > pending.matches(')').count() {
                    continue;
                }

                let input = std::mem::take(&mut pending);
                let _ = rl.add_history_entry(input.trim());

                match eval_str(evaluator, &input, env) {
                    Ok(Value::Nil) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Interrupted) => {
                // Ctrl+C abandons a half-typed form
                if pending.is_empty() {
                    println!("Goodbye!");
                    break;
                }
                pending.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Evaluate every top-level form of a file, printing failures as they occur.
/// Returns whether every form succeeded.
fn load_file(evaluator: &Evaluator, path: &Path, env: &mut Environment) -> bool {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            println!("Error: cannot read {}: {e}", path.display());
            return false;
        }
    };

    let mut clean = true;
    for result in eval_source(evaluator, &text, env) {
        match result {
            Ok(Value::Nil) => {}
            Ok(value) => println!("{value}"),
            Err(e) => {
                println!("Error: {e}");
                clean = false;
            }
        }
    }
    clean
}

fn print_help() {
    println!("Commands:");
    println!("  :help         - Show this help message");
    println!("  :env          - Show current environment bindings");
    println!("  :load <path>  - Evaluate every form in a file");
    println!("  :quit         - Exit the interpreter");
    println!("  :exit         - Exit the interpreter");
    println!("  Ctrl+D        - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (setq name value)");
    println!("  (defun name (params...) body...)");
    println!("  (cond (test body...) ...)   ; `t` always matches");
    println!("  (quote expr)");
    println!();
    println!("Builtins:");
    println!("  Arithmetic: +, -, *, /");
    println!("  Comparison: =, <, >");
    println!("  Predicates: equal, atom, list");
    println!();
    println!("Examples:");
    println!("  (defun square (n) (* n n))");
    println!("  (square 12)");
    println!("  (cond ((> 3 2) \"yes\") (t \"no\"))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Callable(Callable::Builtin(_)) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        for row in builtins.chunks(4) {
            for name in row {
                print!("  {name:<15}");
            }
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
