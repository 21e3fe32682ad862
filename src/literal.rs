//! A small parser for the board's textual result representation.
//!
//! Remote procedures return one value, printed with the board
//! interpreter's own `repr`-style formatting. This parser accepts exactly
//! the shapes the procedure catalogue in [`crate::procedures`] can
//! produce: integers, booleans, `None`, quoted strings, and nested
//! tuples/lists — deliberately not a general-purpose expression evaluator.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    None,
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::None => write!(f, "None"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{it}")?;
                }
                write!(f, "]")
            }
            Literal::Tuple(items) => {
                write!(f, "(")?;
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{it}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("could not parse literal from {0:?}")]
pub struct LiteralParseError(pub String);

/// Parse a full textual value, e.g. `"(33188, 0, 0, 1, 0, 0, 6, 0, 0, 0)"`
/// or `"['boot.py', 'main.py']"` or `"True"`.
pub fn parse(input: &str) -> Result<Literal, LiteralParseError> {
    let trimmed = input.trim();
    let mut chars = trimmed.char_indices().peekable();
    let (value, rest) = parse_value(trimmed, &mut chars)
        .ok_or_else(|| LiteralParseError(trimmed.to_string()))?;
    if !rest.trim().is_empty() {
        return Err(LiteralParseError(trimmed.to_string()));
    }
    Ok(value)
}

fn parse_value<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Option<(Literal, &'a str)> {
    skip_ws(chars);
    let (_, c) = *chars.peek()?;
    match c {
        '(' | '[' => parse_sequence(full, chars),
        '\'' | '"' => parse_string(full, chars),
        _ => parse_scalar(full, chars),
    }
}

fn skip_ws(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

fn parse_sequence<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Option<(Literal, &'a str)> {
    let (_, open) = chars.next()?;
    let close = if open == '(' { ')' } else { ']' };
    let mut items = Vec::new();
    loop {
        skip_ws(chars);
        if let Some(&(idx, c)) = chars.peek() {
            if c == close {
                chars.next();
                let literal = if open == '(' {
                    Literal::Tuple(items)
                } else {
                    Literal::List(items)
                };
                return Some((literal, &full[idx + c.len_utf8()..]));
            }
        } else {
            return None;
        }
        let (value, _) = parse_value(full, chars)?;
        items.push(value);
        skip_ws(chars);
        if let Some(&(_, ',')) = chars.peek() {
            chars.next();
        }
    }
}

fn parse_string<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Option<(Literal, &'a str)> {
    let (_, quote) = chars.next()?;
    let mut s = String::new();
    loop {
        let (idx, c) = chars.next()?;
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            s.push(escaped);
            continue;
        }
        if c == quote {
            return Some((Literal::Str(s), &full[idx + c.len_utf8()..]));
        }
        s.push(c);
    }
}

fn parse_scalar<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Option<(Literal, &'a str)> {
    let start = chars.peek()?.0;
    let mut end = start;
    while let Some(&(idx, c)) = chars.peek() {
        if c == ',' || c == ')' || c == ']' || c.is_whitespace() {
            break;
        }
        end = idx + c.len_utf8();
        chars.next();
    }
    let token = &full[start..end];
    let literal = match token {
        "True" => Literal::Bool(true),
        "False" => Literal::Bool(false),
        "None" => Literal::None,
        _ => Literal::Int(token.parse::<i64>().ok()?),
    };
    Some((literal, &full[end..]))
}
