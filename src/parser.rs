use crate::ast::{Atom, Expr};
use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Maximum list nesting before parsing fails
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Recursive-descent parser over a token slice.
///
/// The cursor is shared across calls, so a front end can call
/// [`Parser::parse_expr`] repeatedly to read consecutive top-level forms.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    tokens: &'a [String],
    position: usize,
    config: ParseConfig,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Self::with_config(tokens, ParseConfig::default())
    }

    pub fn with_config(tokens: &'a [String], config: ParseConfig) -> Self {
        Parser {
            tokens,
            position: 0,
            config,
        }
    }

    /// Index of the next unread token
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Parse one expression starting at the cursor.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_at_depth(0)
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn parse_at_depth(&mut self, depth: usize) -> Result<Expr, ParseError> {
        if depth >= self.config.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::TooDeeplyNested,
                format!(
                    "expression too deeply nested (max depth: {})",
                    self.config.max_depth
                ),
                self.position,
            ));
        }

        let Some(token) = self.peek() else {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                "unexpected end of input",
                self.position,
            ));
        };

        match token {
            "(" => {
                let open = self.position;
                self.position += 1;
                self.parse_list(open, depth)
            }
            ")" => Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                "unexpected token ')'",
                self.position,
            )),
            _ => {
                self.position += 1;
                Ok(Expr::Atom(atom_from_token(token)))
            }
        }
    }

    /// Parse list children after the opening parenthesis at `open`.
    fn parse_list(&mut self, open: usize, depth: usize) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(")") => {
                    self.position += 1;
                    return Ok(Expr::List(items));
                }
                Some(_) => items.push(self.parse_at_depth(depth + 1)?),
                None => {
                    return Err(ParseError::new(
                        ParseErrorKind::Unbalanced,
                        "unbalanced parentheses: list is never closed",
                        open,
                    ));
                }
            }
        }
    }
}

/// Integers are folded eagerly; every other token is resolved by the evaluator.
fn atom_from_token(token: &str) -> Atom {
    match token.parse::<i64>() {
        Ok(n) => Atom::Integer(n),
        Err(_) => Atom::Text(token.to_owned()),
    }
}

/// Parse the first expression in `tokens`.
///
/// Tokens after the first complete expression are left unread; use
/// [`Parser`] or [`parse_all`] to consume several top-level forms.
pub fn parse(tokens: &[String]) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse_expr()
}

/// Parse every top-level expression in `tokens`.
pub fn parse_all(tokens: &[String]) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut exprs = Vec::new();
    while !parser.is_finished() {
        exprs.push(parser.parse_expr()?);
    }
    Ok(exprs)
}
