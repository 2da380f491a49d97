//! Turns source text into a flat list of raw token strings.
//!
//! At every position the token grammar is tried in priority order:
//! parentheses, numbers (`-?\d+(\.\d+)?([eE][+-]?\d+)?`), double-quoted strings
//! with backslash escapes, and finally symbols made of
//! `[A-Za-z0-9_+\-*/!?=<>.]`. Whitespace separates tokens and is dropped.
//! Anything else is rejected with a [`LexError`].

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{anychar, char, digit1, none_of, one_of},
    combinator::{opt, recognize},
    multi::many0_count,
    sequence::preceded,
};

use crate::LexError;

/// Allowed non-alphanumeric characters in symbols
const SYMBOL_SPECIAL_CHARS: &str = "_+-*/!?=<>.";

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn paren(input: &str) -> IResult<&str, &str> {
    alt((tag("("), tag(")"))).parse(input)
}

/// Signed integer or decimal with optional exponent
fn number(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(char('-')),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

/// Double-quoted string; the quotes stay part of the token
fn string(input: &str) -> IResult<&str, &str> {
    recognize((
        char('"'),
        many0_count(alt((preceded(char('\\'), anychar), none_of("\"\\")))),
        char('"'),
    ))
    .parse(input)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    take_while1(is_symbol_char).parse(input)
}

fn token(input: &str) -> IResult<&str, &str> {
    alt((paren, number, string, symbol)).parse(input)
}

/// Split `source` into token strings.
pub fn tokenize(source: &str) -> Result<Vec<String>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = source.trim_start();

    while !rest.is_empty() {
        match token(rest) {
            Ok((remaining, tok)) => {
                tokens.push(tok.to_owned());
                rest = remaining.trim_start();
            }
            Err(_) => {
                let offset = source.len() - rest.len();
                return Err(LexError::new(offset, unrecognized_run(rest)));
            }
        }
    }

    Ok(tokens)
}

/// The text from the start of `input` up to the next position where a token
/// can begin, for error reporting.
fn unrecognized_run(input: &str) -> &str {
    input
        .char_indices()
        .skip(1)
        .find(|&(i, _)| token(&input[i..]).is_ok())
        .map_or(input, |(i, _)| &input[..i])
        .trim_end()
}

/// Check that parentheses are balanced: the depth never goes negative and ends
/// at zero. Parentheses inside string literals are counted too.
pub fn is_balanced(source: &str) -> bool {
    let mut depth: usize = 0;
    for c in source.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}
