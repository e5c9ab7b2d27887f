//! Condition expressions gating file, dependency and hook entries.
//!
//! Grammar (Go-template style prefix calls):
//!
//! ```text
//! expr    := call | operand
//! call    := FUNC term+
//! term    := "(" expr ")" | operand
//! operand := .Name | $.Name | "quoted" | 'quoted' | `raw` | true | false | number
//! FUNC    := eq | ne | and | or | not
//! ```
//!
//! `eq A B C...` is true when `A` equals any of the rest. `and`/`or` accept
//! two or more terms. A bare operand is tested for truthiness with the same
//! rules as `{{if}}`: `""`, `false` and the number `0` are falsy. Variables
//! absent from the context read as `""`. Parentheses nest at most
//! [`MAX_NESTING`] levels.
//!
//! Expressions are parsed once into a [`Condition`] tree and evaluated per
//! context without re-parsing.

use std::fmt;

use crate::domain::{DomainError, entities::context::VariableContext};

use crate::domain::template::MAX_NESTING;

/// A value position inside a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Var(String),
    Lit(String),
}

impl Operand {
    fn resolve(&self, ctx: &VariableContext) -> String {
        match self {
            Self::Var(name) => ctx.lookup_str(name),
            Self::Lit(value) => value.clone(),
        }
    }
}

/// Parsed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// First operand equals any of the others.
    Eq(Operand, Vec<Operand>),
    Ne(Operand, Operand),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Var(String),
    Lit(String),
    /// Unquoted integer literal.
    Int(i64),
}

impl Condition {
    /// Parse an expression. Blank input is an error here; use
    /// [`Condition::compile`] for optional conditions.
    pub fn parse(expression: &str) -> Result<Self, DomainError> {
        let body = strip_delimiters(expression);
        let tokens = tokenize(expression, body)?;
        if tokens.is_empty() {
            return Err(malformed(expression, "empty expression"));
        }
        let mut parser = Parser {
            source: expression,
            tokens,
            pos: 0,
            depth: 0,
        };
        let cond = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(malformed(expression, format!("unexpected trailing {tok}")));
        }
        Ok(cond)
    }

    /// Parse an optional condition; `None` or blank means "always".
    pub fn compile(expression: Option<&str>) -> Result<Option<Self>, DomainError> {
        match expression.map(str::trim) {
            None | Some("") => Ok(None),
            Some(expr) => Self::parse(expr).map(Some),
        }
    }

    pub fn evaluate(&self, ctx: &VariableContext) -> bool {
        match self {
            Self::Eq(first, rest) => {
                let left = first.resolve(ctx);
                rest.iter().any(|o| o.resolve(ctx) == left)
            }
            Self::Ne(a, b) => a.resolve(ctx) != b.resolve(ctx),
            Self::And(l, r) => l.evaluate(ctx) && r.evaluate(ctx),
            Self::Or(l, r) => l.evaluate(ctx) || r.evaluate(ctx),
            Self::Not(e) => !e.evaluate(ctx),
            Self::Var(name) => ctx.is_truthy(name),
            Self::Lit(value) => !value.is_empty() && value != "false",
            Self::Int(n) => *n != 0,
        }
    }

    /// Variable names referenced by this condition.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Eq(first, rest) => {
                push_var(first, out);
                rest.iter().for_each(|o| push_var(o, out));
            }
            Self::Ne(a, b) => {
                push_var(a, out);
                push_var(b, out);
            }
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Self::Not(e) => e.collect_vars(out),
            Self::Var(n) => out.push(n.as_str()),
            Self::Lit(_) | Self::Int(_) => {}
        }
    }
}

fn push_var<'a>(operand: &'a Operand, out: &mut Vec<&'a str>) {
    if let Operand::Var(name) = operand {
        out.push(name.as_str());
    }
}

/// Evaluate a condition string against a context.
///
/// An empty expression is always true.
pub fn evaluate(expression: &str, ctx: &VariableContext) -> Result<bool, DomainError> {
    Ok(Condition::compile(Some(expression))?.is_none_or(|c| c.evaluate(ctx)))
}

// ============================================================================
// Lexing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Ident(String),
    Field(String),
    Str(String),
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Field(s) => write!(f, "field '.{s}'"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Word(s) => write!(f, "literal '{s}'"),
        }
    }
}

/// Accept conditions written as `{{ expr }}` as well as bare `expr`.
fn strip_delimiters(expression: &str) -> &str {
    let trimmed = expression.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(|s| s.trim_start_matches('-').trim_end_matches('-'))
        .unwrap_or(trimmed)
}

fn malformed(expression: &str, reason: impl Into<String>) -> DomainError {
    DomainError::MalformedCondition {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(source: &str, body: &str) -> Result<Vec<Token>, DomainError> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' | '\'' | '`' => {
                chars.next();
                let quote = c;
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        ch if ch == quote => {
                            closed = true;
                            break;
                        }
                        '\\' if quote != '`' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(malformed(source, "unterminated string literal"));
                }
                tokens.push(Token::Str(value));
            }
            '.' | '$' => {
                chars.next();
                if c == '$' {
                    match chars.next() {
                        Some((_, '.')) => {}
                        _ => return Err(malformed(source, "only '$.Name' references are supported")),
                    }
                }
                let name = take_while(body, &mut chars, is_ident_char);
                if name.is_empty() {
                    return Err(malformed(source, format!("expected a variable name at offset {start}")));
                }
                tokens.push(Token::Field(name.to_string()));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let word = take_while(body, &mut chars, |ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.');
                tokens.push(Token::Word(word.to_string()));
            }
            c if is_ident_char(c) => {
                let word = take_while(body, &mut chars, is_ident_char);
                match word {
                    "true" | "false" => tokens.push(Token::Word(word.to_string())),
                    _ => tokens.push(Token::Ident(word.to_string())),
                }
            }
            other => {
                return Err(malformed(source, format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

fn take_while<'s>(
    body: &'s str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'s>>,
    pred: impl Fn(char) -> bool,
) -> &'s str {
    let start = chars.peek().map_or(body.len(), |&(i, _)| i);
    let mut end = start;
    while let Some(&(i, ch)) = chars.peek() {
        if !pred(ch) {
            break;
        }
        end = i + ch.len_utf8();
        chars.next();
    }
    &body[start..end]
}

// ============================================================================
// Parsing
// ============================================================================

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Result<Condition, DomainError> {
        match self.peek() {
            Some(Token::Ident(_)) => self.call(),
            Some(_) => self.term(),
            None => Err(malformed(self.source, "expected an expression")),
        }
    }

    fn term(&mut self) -> Result<Condition, DomainError> {
        match self.next() {
            Some(Token::LParen) => {
                if self.depth >= MAX_NESTING {
                    return Err(malformed(
                        self.source,
                        format!("parentheses nested more than {MAX_NESTING} levels deep"),
                    ));
                }
                self.depth += 1;
                let inner = self.expr();
                self.depth -= 1;
                let inner = inner?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(malformed(self.source, "missing ')'")),
                }
            }
            Some(Token::Field(name)) => Ok(Condition::Var(name)),
            Some(Token::Word(s)) => Ok(s.parse().map_or(Condition::Lit(s), Condition::Int)),
            Some(Token::Str(s)) => Ok(Condition::Lit(s)),
            Some(Token::Ident(name)) => Err(DomainError::UnknownConditionFunction {
                expression: self.source.to_string(),
                function: name,
            }),
            Some(Token::RParen) => Err(malformed(self.source, "unexpected ')'")),
            None => Err(malformed(self.source, "expected an operand")),
        }
    }

    fn operand(&mut self, func: &str) -> Result<Operand, DomainError> {
        match self.next() {
            Some(Token::Field(name)) => Ok(Operand::Var(name)),
            Some(Token::Str(s)) | Some(Token::Word(s)) => Ok(Operand::Lit(s)),
            Some(tok) => Err(malformed(
                self.source,
                format!("'{func}' expects a variable or literal, found {tok}"),
            )),
            None => Err(malformed(self.source, format!("'{func}' is missing an argument"))),
        }
    }

    /// Terms up to the closing paren or end of input.
    fn terms(&mut self) -> Result<Vec<Condition>, DomainError> {
        let mut out = Vec::new();
        while !matches!(self.peek(), None | Some(Token::RParen)) {
            out.push(self.term()?);
        }
        Ok(out)
    }

    fn at_end_of_call(&self) -> bool {
        matches!(self.peek(), None | Some(Token::RParen))
    }

    fn call(&mut self) -> Result<Condition, DomainError> {
        let Some(Token::Ident(func)) = self.next() else {
            return Err(malformed(self.source, "expected a function name"));
        };
        match func.as_str() {
            "eq" => {
                let first = self.operand("eq")?;
                let mut rest = vec![self.operand("eq")?];
                while !self.at_end_of_call() {
                    rest.push(self.operand("eq")?);
                }
                Ok(Condition::Eq(first, rest))
            }
            "ne" => {
                let a = self.operand("ne")?;
                let b = self.operand("ne")?;
                if !self.at_end_of_call() {
                    return Err(malformed(self.source, "'ne' takes exactly two arguments"));
                }
                Ok(Condition::Ne(a, b))
            }
            "not" => {
                let mut terms = self.terms()?;
                if terms.len() != 1 {
                    return Err(malformed(self.source, "'not' takes exactly one argument"));
                }
                Ok(Condition::Not(Box::new(terms.remove(0))))
            }
            "and" | "or" => {
                let terms = self.terms()?;
                if terms.len() < 2 {
                    return Err(malformed(self.source, format!("'{func}' needs at least two arguments")));
                }
                let combine = |l: Condition, r: Condition| {
                    if func == "and" {
                        Condition::And(Box::new(l), Box::new(r))
                    } else {
                        Condition::Or(Box::new(l), Box::new(r))
                    }
                };
                let mut iter = terms.into_iter();
                let first = iter.next().ok_or_else(|| malformed(self.source, "empty call"))?;
                Ok(iter.fold(first, combine))
            }
            _ => Err(DomainError::UnknownConditionFunction {
                expression: self.source.to_string(),
                function: func,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::VariableValue;

    fn ctx(pairs: &[(&str, &str)]) -> VariableContext {
        VariableContext::from_values(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), VariableValue::String(v.to_string()))),
        )
    }

    #[test]
    fn empty_condition_is_true() {
        assert!(evaluate("", &ctx(&[])).unwrap());
        assert!(evaluate("   ", &ctx(&[])).unwrap());
    }

    #[test]
    fn ne_against_empty_literal() {
        let expr = r#"ne .AuthType """#;
        assert!(!evaluate(expr, &ctx(&[("AuthType", "")])).unwrap());
        assert!(evaluate(expr, &ctx(&[("AuthType", "jwt")])).unwrap());
    }

    #[test]
    fn eq_with_multiple_candidates() {
        let c = Condition::parse(r#"eq .Database "postgres" "mysql""#).unwrap();
        assert!(c.evaluate(&ctx(&[("Database", "mysql")])));
        assert!(!c.evaluate(&ctx(&[("Database", "sqlite")])));
    }

    #[test]
    fn nested_boolean_logic() {
        let c = Condition::parse(r#"and (eq .Database "postgres") (or .Docker (not .Minimal))"#).unwrap();
        assert!(c.evaluate(&ctx(&[("Database", "postgres"), ("Docker", "false")])));
        assert!(!c.evaluate(&ctx(&[("Database", "postgres"), ("Minimal", "yes")])));
        assert!(!c.evaluate(&ctx(&[("Database", "mysql"), ("Docker", "true")])));
    }

    #[test]
    fn variadic_and() {
        let c = Condition::parse("and .A .B .C").unwrap();
        assert!(c.evaluate(&ctx(&[("A", "1"), ("B", "1"), ("C", "1")])));
        assert!(!c.evaluate(&ctx(&[("A", "1"), ("B", "1")])));
    }

    #[test]
    fn truthiness_of_bare_variable() {
        assert!(evaluate(".Docker", &ctx(&[("Docker", "true")])).unwrap());
        assert!(!evaluate(".Docker", &ctx(&[("Docker", "false")])).unwrap());
        assert!(!evaluate(".Docker", &ctx(&[("Docker", "")])).unwrap());
        assert!(!evaluate(".Missing", &ctx(&[])).unwrap());
        assert!(evaluate("$.Docker", &ctx(&[("Docker", "yes")])).unwrap());
    }

    #[test]
    fn literal_truthiness_matches_templates() {
        use crate::domain::template::Template;

        let empty = ctx(&[]);
        for literal in ["0", "1", "-3", "true", "false", r#""""#, r#""0""#, r#""x""#] {
            let condition = evaluate(literal, &empty).unwrap();
            let rendered = Template::parse("t", &format!("{{{{if {literal}}}}}y{{{{end}}}}"))
                .unwrap()
                .render(&empty)
                .unwrap();
            assert_eq!(condition, rendered == "y", "literal {literal}");
        }
        assert!(!evaluate("0", &empty).unwrap());
        assert!(evaluate("not 0", &empty).unwrap());
    }

    #[test]
    fn deep_parentheses_are_malformed() {
        let depth = 300_000;
        let expr = format!("{}.A{}", "(".repeat(depth), ")".repeat(depth));
        let err = Condition::parse(&expr).unwrap_err();
        assert!(
            matches!(err, DomainError::MalformedCondition { ref reason, .. } if reason.contains("nested")),
            "{err}"
        );
        let ok = format!("{}.A{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(Condition::parse(&ok).is_ok());
    }

    #[test]
    fn absent_variable_compares_as_empty() {
        assert!(evaluate(r#"eq .Nope """#, &ctx(&[])).unwrap());
    }

    #[test]
    fn template_delimiters_are_accepted() {
        assert!(evaluate(r#"{{ eq .A "x" }}"#, &ctx(&[("A", "x")])).unwrap());
    }

    #[test]
    fn unknown_function_is_config_error() {
        let err = Condition::parse(r#"env "HOME""#).unwrap_err();
        assert!(matches!(err, DomainError::UnknownConditionFunction { ref function, .. } if function == "env"));
    }

    #[test]
    fn malformed_expressions() {
        for expr in [
            "eq .A",
            "ne .A .B .C",
            "not .A .B",
            "and .A",
            "(eq .A \"x\"",
            "eq .A \"x",
            "eq (not .A) \"x\"",
            ".",
            "eq .A \"x\")",
        ] {
            assert!(
                matches!(Condition::parse(expr), Err(DomainError::MalformedCondition { .. })),
                "{expr} should be malformed"
            );
        }
    }

    #[test]
    fn collects_referenced_variables() {
        let c = Condition::parse(r#"or (eq .A "x") (not .B)"#).unwrap();
        assert_eq!(c.variables(), vec!["A", "B"]);
    }
}
