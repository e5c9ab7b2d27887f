//! Builds the node tree from scanned items.

use super::functions;
use super::lexer::{Item, Token, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub line: usize,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Func(&'static str),
    Field(String),
    Dot,
    Str(String),
    Int(i64),
    Bool(bool),
    Sub(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParseError {
    pub line: usize,
    pub message: String,
}

fn error(line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        line,
        message: message.into(),
    }
}

/// Deepest block or parenthesis nesting the parser accepts.
pub const MAX_NESTING: usize = 64;

/// Keywords recognised at the start of an action.
const BLOCK_KEYWORDS: &[&str] = &["if", "else", "end", "range"];
const UNSUPPORTED_KEYWORDS: &[&str] = &["with", "define", "template", "block", "break", "continue", "nil"];

enum Action {
    Output(Pipeline),
    If(Pipeline),
    Range(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
}

/// How a nested list was terminated.
enum Terminator {
    Eof,
    ElseIf(Pipeline),
    Else(usize),
    End(usize),
}

pub(crate) fn parse(items: Vec<Item>) -> Result<Vec<Node>, ParseError> {
    let mut parser = Parser {
        items: items.into_iter(),
        depth: 0,
    };
    let (nodes, term) = parser.list()?;
    match term {
        Terminator::Eof => Ok(nodes),
        Terminator::ElseIf(p) => Err(error(p.line, "unexpected {{else if}}")),
        Terminator::Else(line) => Err(error(line, "unexpected {{else}}")),
        Terminator::End(line) => Err(error(line, "unexpected {{end}}")),
    }
}

struct Parser {
    items: std::vec::IntoIter<Item>,
    depth: usize,
}

impl Parser {
    fn nested<T>(
        &mut self,
        line: usize,
        block: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(error(line, format!("blocks nested more than {MAX_NESTING} levels deep")));
        }
        self.depth += 1;
        let result = block(self);
        self.depth -= 1;
        result
    }

    fn list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let (text, line) = match item {
                Item::Text(t) => {
                    nodes.push(Node::Text(t));
                    continue;
                }
                Item::Action { text, line } => (text, line),
            };
            match classify(&text, line)? {
                Action::Output(p) => nodes.push(Node::Output(p)),
                Action::If(p) => nodes.push(self.nested(line, |s| s.if_block(p, line))?),
                Action::Range(p) => nodes.push(self.nested(line, |s| s.range_block(p, line))?),
                Action::ElseIf(p) => return Ok((nodes, Terminator::ElseIf(p))),
                Action::Else => return Ok((nodes, Terminator::Else(line))),
                Action::End => return Ok((nodes, Terminator::End(line))),
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn if_block(&mut self, first: Pipeline, line: usize) -> Result<Node, ParseError> {
        let mut branches = Vec::new();
        let mut condition = first;
        loop {
            let (body, term) = self.list()?;
            branches.push((condition, body));
            match term {
                Terminator::End(_) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::ElseIf(next) => condition = next,
                Terminator::Else(_) => {
                    let otherwise = self.expect_end(line, "if")?;
                    return Ok(Node::If { branches, otherwise });
                }
                Terminator::Eof => return Err(error(line, "unclosed {{if}}")),
            }
        }
    }

    fn range_block(&mut self, pipeline: Pipeline, line: usize) -> Result<Node, ParseError> {
        let (body, term) = self.list()?;
        let otherwise = match term {
            Terminator::End(_) => Vec::new(),
            Terminator::Else(_) => self.expect_end(line, "range")?,
            Terminator::ElseIf(p) => return Err(error(p.line, "{{else if}} is not allowed in {{range}}")),
            Terminator::Eof => return Err(error(line, "unclosed {{range}}")),
        };
        Ok(Node::Range {
            pipeline,
            body,
            otherwise,
        })
    }

    fn expect_end(&mut self, line: usize, block: &str) -> Result<Vec<Node>, ParseError> {
        let (nodes, term) = self.list()?;
        match term {
            Terminator::End(_) => Ok(nodes),
            Terminator::Eof => Err(error(line, format!("unclosed {{{{{block}}}}}"))),
            Terminator::ElseIf(p) => Err(error(p.line, "{{else if}} after {{else}}")),
            Terminator::Else(l) => Err(error(l, "duplicate {{else}}")),
        }
    }
}

fn classify(text: &str, line: usize) -> Result<Action, ParseError> {
    let tokens = tokenize(text, false).map_err(|m| error(line, m))?;
    let keyword = match tokens.first() {
        Some(Token::Ident(word)) if BLOCK_KEYWORDS.contains(&word.as_str()) => Some(word.as_str()),
        Some(Token::Ident(word)) if UNSUPPORTED_KEYWORDS.contains(&word.as_str()) => {
            return Err(error(line, format!("'{word}' actions are not supported")));
        }
        None => return Err(error(line, "empty action")),
        _ => None,
    };

    match keyword {
        None => Ok(Action::Output(pipeline(&tokens, line)?)),
        Some("if") => Ok(Action::If(pipeline(&tokens[1..], line)?)),
        Some("range") => Ok(Action::Range(pipeline(&tokens[1..], line)?)),
        Some("end") if tokens.len() == 1 => Ok(Action::End),
        Some("else") if tokens.len() == 1 => Ok(Action::Else),
        Some("else") if tokens.get(1) == Some(&Token::Ident("if".into())) => {
            Ok(Action::ElseIf(pipeline(&tokens[2..], line)?))
        }
        Some(other) => Err(error(line, format!("malformed {{{{{other}}}}} action"))),
    }
}

fn pipeline(tokens: &[Token], line: usize) -> Result<Pipeline, ParseError> {
    let mut cursor = Cursor {
        tokens,
        pos: 0,
        line,
        depth: 0,
    };
    let p = cursor.pipeline()?;
    match cursor.peek() {
        None => Ok(p),
        Some(tok) => Err(error(line, format!("unexpected {tok}"))),
    }
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    line: usize,
    depth: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut commands = vec![self.command()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            let cmd = self.command()?;
            if !matches!(cmd.args.first(), Some(Arg::Func(_))) {
                return Err(error(self.line, "only functions can follow '|'"));
            }
            commands.push(cmd);
        }
        Ok(Pipeline {
            line: self.line,
            commands,
        })
    }

    fn command(&mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        while let Some(tok) = self.peek() {
            if matches!(tok, Token::Pipe | Token::RParen) {
                break;
            }
            args.push(self.arg()?);
        }
        match args.first() {
            None => Err(error(self.line, "missing value in pipeline")),
            Some(Arg::Func(_)) => Ok(Command { args }),
            Some(_) if args.len() > 1 => Err(error(self.line, "can't give arguments to a non-function")),
            Some(_) => Ok(Command { args }),
        }
    }

    fn arg(&mut self) -> Result<Arg, ParseError> {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        match tok {
            Token::LParen => {
                if self.depth >= MAX_NESTING {
                    return Err(error(
                        self.line,
                        format!("parentheses nested more than {MAX_NESTING} levels deep"),
                    ));
                }
                self.depth += 1;
                let inner = self.pipeline();
                self.depth -= 1;
                let inner = inner?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(error(self.line, "missing ')'"));
                }
                self.pos += 1;
                Ok(Arg::Sub(inner))
            }
            Token::RParen => Err(error(self.line, "unexpected ')'")),
            Token::Pipe => Err(error(self.line, "unexpected '|'")),
            Token::Ident(name) => match functions::lookup(&name) {
                Some(def) => Ok(Arg::Func(def.name)),
                None if BLOCK_KEYWORDS.contains(&name.as_str()) => {
                    Err(error(self.line, format!("unexpected keyword '{name}'")))
                }
                None => Err(error(self.line, format!("function \"{name}\" not defined"))),
            },
            Token::Field(name) => Ok(Arg::Field(name)),
            Token::Dot => Ok(Arg::Dot),
            Token::Str(s) => Ok(Arg::Str(s)),
            Token::Int(i) => Ok(Arg::Int(i)),
            Token::Bool(b) => Ok(Arg::Bool(b)),
        }
    }
}
