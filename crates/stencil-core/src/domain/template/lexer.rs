//! Splits template source into text and `{{ action }}` items, then splits
//! each action into tokens.
//!
//! Supports `{{- ` / ` -}}` whitespace trimming and `{{/* comments */}}`.
//! The scanner has a tolerant mode used by the security validator so that
//! even broken templates are inspected.

use std::fmt;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A piece of scanned template source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Item {
    Text(String),
    Action { text: String, line: usize },
}

/// Raw action text with its starting line, for static inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAction {
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LexError {
    pub line: usize,
    pub message: String,
}

fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Offset of the closing `}}` in `body`, skipping over string literals.
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q != b'`' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' || b == b'\'' {
                    quote = Some(b);
                } else if body[i..].starts_with(CLOSE) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn is_comment(body: &str) -> bool {
    let t = body.trim();
    t.starts_with("/*") && t.ends_with("*/")
}

/// Scan source into items. On an unterminated action the remainder is still
/// returned as an action, together with the error.
fn scan(source: &str) -> (Vec<Item>, Option<LexError>) {
    let mut items = Vec::new();
    let mut rest = source;
    let mut offset = 0;
    let mut trim_next = false;

    loop {
        let Some(open) = rest.find(OPEN) else {
            let text = if trim_next { rest.trim_start() } else { rest };
            if !text.is_empty() {
                items.push(Item::Text(text.to_string()));
            }
            return (items, None);
        };

        let mut after_open = &rest[open + OPEN.len()..];
        let trim_prev = after_open.starts_with('-')
            && after_open[1..].starts_with(|c: char| c.is_whitespace());
        if trim_prev {
            after_open = &after_open[1..];
        }

        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        if trim_prev {
            text = text.trim_end();
        }
        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }

        let action_offset = offset + open;
        let line = line_at(source, action_offset);
        let Some(close) = find_close(after_open) else {
            items.push(Item::Action {
                text: after_open.to_string(),
                line,
            });
            return (
                items,
                Some(LexError {
                    line,
                    message: "unclosed action".into(),
                }),
            );
        };

        let mut body = &after_open[..close];
        trim_next = body.ends_with('-')
            && body[..body.len() - 1].ends_with(|c: char| c.is_whitespace());
        if trim_next {
            body = &body[..body.len() - 1];
        }

        if !is_comment(body) {
            items.push(Item::Action {
                text: body.to_string(),
                line,
            });
        }

        let consumed = open + OPEN.len() + usize::from(trim_prev) + close + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
}

pub(crate) fn lex(source: &str) -> Result<Vec<Item>, LexError> {
    match scan(source) {
        (items, None) => Ok(items),
        (_, Some(err)) => Err(err),
    }
}

/// Every action in `source`, including an unterminated trailing one.
pub fn raw_actions(source: &str) -> Vec<RawAction> {
    scan(source)
        .0
        .into_iter()
        .filter_map(|item| match item {
            Item::Action { text, line } => Some(RawAction { text, line }),
            Item::Text(_) => None,
        })
        .collect()
}

// ============================================================================
// Action tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    Pipe,
    /// Keyword or function name.
    Ident(String),
    /// `.Name` or `$.Name`.
    Field(String),
    /// `.` on its own.
    Dot,
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Pipe => f.write_str("'|'"),
            Self::Ident(s) => write!(f, "'{s}'"),
            Self::Field(s) => write!(f, "'.{s}'"),
            Self::Dot => f.write_str("'.'"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize one action body.
///
/// In tolerant mode unsupported syntax is skipped instead of rejected.
pub(crate) fn tokenize(text: &str, tolerant: bool) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    macro_rules! reject {
        ($($arg:tt)*) => {{
            if tolerant {
                i += 1;
                continue;
            }
            return Err(format!($($arg)*));
        }};
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '"' | '\'' | '`' => {
                let (value, next) = read_string(&chars, i);
                match value {
                    Some(v) => tokens.push(Token::Str(v)),
                    None if tolerant => {}
                    None => return Err("unterminated string literal".into()),
                }
                i = next;
            }
            '$' => {
                if chars.get(i + 1) == Some(&'.') && chars.get(i + 2).is_some_and(|c| is_ident_char(*c)) {
                    let (name, next) = read_ident(&chars, i + 2);
                    tokens.push(Token::Field(name));
                    i = next;
                } else if tolerant {
                    let (_, next) = read_ident(&chars, i + 1);
                    i = next;
                } else {
                    return Err("template variables are not supported; use $.Name".into());
                }
            }
            '.' => {
                if chars.get(i + 1).is_some_and(|c| is_ident_char(*c)) {
                    let (name, next) = read_ident(&chars, i + 1);
                    let nested = chars.get(next) == Some(&'.')
                        && chars.get(next + 1).is_some_and(|c| is_ident_char(*c));
                    if nested && !tolerant {
                        return Err(format!("nested field access on '.{name}' is not supported"));
                    }
                    tokens.push(Token::Field(name));
                    i = next;
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                match literal.replace('_', "").parse::<i64>() {
                    Ok(n) => tokens.push(Token::Int(n)),
                    Err(_) if tolerant => {}
                    Err(_) => return Err(format!("unsupported number literal '{literal}'")),
                }
            }
            c if is_ident_char(c) => {
                let (word, next) = read_ident(&chars, i);
                i = next;
                match word.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            ':' | '=' => reject!("variable assignment is not supported"),
            other => reject!("unexpected character '{other}'"),
        }
    }
    Ok(tokens)
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Read a quoted literal starting at `start`. Returns `None` if unterminated.
fn read_string(chars: &[char], start: usize) -> (Option<String>, usize) {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return (Some(value), i + 1);
        }
        if c == '\\' && quote != '`' {
            i += 1;
            match chars.get(i) {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(&other) => value.push(other),
                None => break,
            }
        } else {
            value.push(c);
        }
        i += 1;
    }
    (None, chars.len())
}

/// Split action text into code with string literals blanked, plus the
/// literals themselves.
pub(crate) fn split_literals(text: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    let mut code = String::with_capacity(text.len());
    let mut literals = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '`' || c == '\'' {
            let (value, next) = read_string(&chars, i);
            literals.push(value.unwrap_or_else(|| chars[i + 1..].iter().collect()));
            code.push_str("\"\"");
            i = next;
        } else {
            code.push(c);
            i += 1;
        }
    }
    (code, literals)
}
