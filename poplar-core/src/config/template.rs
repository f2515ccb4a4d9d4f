//! Environment substitution for configuration text.
//!
//! Before the configuration file is decoded, every `{{ ... }}` action in it is
//! replaced by the value of one of two functions:
//!
//! - `env "NAME"` or `env("NAME")` - the raw value of `NAME`, empty if unset
//! - `envOr "NAME" "default"` or `envOr("NAME", "default")` - the value of
//!   `NAME`, or `default` when it is unset or empty
//!
//! Arguments are double-quoted strings (with `\"`, `\\`, `\n` and `\t`
//! escapes) or back-quoted raw strings. Text outside actions is copied as is.
//!
//! ```rust
//! use poplar_core::config::{render, MapEnvSource};
//!
//! let env = MapEnvSource::new().set("DB_HOST", "db.internal");
//! let out = render(r#"host: {{ envOr "DB_HOST" "localhost" }}"#, &env).unwrap();
//! assert_eq!(out, "host: db.internal");
//! ```

use super::env::EnvSource;
use crate::error::{Error, Result};
use tracing::trace;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Render configuration text, resolving `env` and `envOr` actions against
/// `env`.
pub fn render(input: &str, env: &dyn EnvSource) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut line = 1;

    while let Some(idx) = rest.find(OPEN) {
        let (text, tail) = rest.split_at(idx);
        out.push_str(text);
        line += newlines(text);

        let mut action = Action::new(&tail[OPEN.len()..], line);
        let value = action.evaluate(env)?;
        out.push_str(&value);

        line = action.line;
        rest = &tail[OPEN.len() + action.pos..];
    }

    out.push_str(rest);
    Ok(out)
}

fn newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    End,
}

/// Cursor over the body of a single action, starting just after `{{`.
struct Action<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    start_line: usize,
}

impl<'a> Action<'a> {
    fn new(src: &'a str, line: usize) -> Self {
        Self {
            src,
            pos: 0,
            line,
            start_line: line,
        }
    }

    fn evaluate(&mut self, env: &dyn EnvSource) -> Result<String> {
        let name = match self.next_token()? {
            Token::Ident(name) => name,
            Token::End => return Err(Error::template(self.start_line, "empty action")),
            other => {
                return Err(Error::template(
                    self.start_line,
                    format!("expected function name, found {}", describe(&other)),
                ));
            }
        };

        let args = match self.next_token()? {
            Token::LParen => self.call_args()?,
            Token::End => Vec::new(),
            Token::Str(first) => {
                let mut args = vec![first];
                loop {
                    match self.next_token()? {
                        Token::Str(arg) => args.push(arg),
                        Token::End => break,
                        other => return Err(self.unexpected(&other)),
                    }
                }
                args
            }
            other => return Err(self.unexpected(&other)),
        };

        trace!(function = %name, args = args.len(), "Evaluating template action");
        self.call(&name, args, env)
    }

    /// Parse `"a", "b")` after an opening parenthesis, then the closing `}}`.
    fn call_args(&mut self) -> Result<Vec<String>> {
        let mut args = Vec::new();
        match self.next_token()? {
            Token::RParen => {}
            Token::Str(first) => {
                args.push(first);
                loop {
                    match self.next_token()? {
                        Token::Comma => match self.next_token()? {
                            Token::Str(arg) => args.push(arg),
                            other => return Err(self.unexpected(&other)),
                        },
                        Token::RParen => break,
                        other => return Err(self.unexpected(&other)),
                    }
                }
            }
            other => return Err(self.unexpected(&other)),
        }

        match self.next_token()? {
            Token::End => Ok(args),
            other => Err(self.unexpected(&other)),
        }
    }

    fn call(&self, name: &str, args: Vec<String>, env: &dyn EnvSource) -> Result<String> {
        let expected = match name {
            "env" => 1,
            "envOr" => 2,
            _ => {
                return Err(Error::template(
                    self.start_line,
                    format!("unknown function {name:?}"),
                ));
            }
        };
        if args.len() != expected {
            return Err(Error::template(
                self.start_line,
                format!(
                    "{name} expects {expected} argument(s), got {}",
                    args.len()
                ),
            ));
        }

        let mut args = args.into_iter();
        let var = args.next().unwrap_or_default();
        Ok(match name {
            "env" => env.get(&var).unwrap_or_default(),
            _ => env
                .get_non_empty(&var)
                .unwrap_or_else(|| args.next().unwrap_or_default()),
        })
    }

    fn unexpected(&self, token: &Token) -> Error {
        Error::template(self.line, format!("unexpected {}", describe(token)))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn next_token(&mut self) -> Result<Token> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }

        if self.src[self.pos..].starts_with(CLOSE) {
            self.pos += CLOSE.len();
            return Ok(Token::End);
        }

        let Some(c) = self.peek() else {
            return Err(Error::template(self.start_line, "unterminated action"));
        };

        match c {
            '(' => {
                self.bump();
                Ok(Token::LParen)
            }
            ')' => {
                self.bump();
                Ok(Token::RParen)
            }
            ',' => {
                self.bump();
                Ok(Token::Comma)
            }
            '"' => self.quoted(),
            '`' => self.raw(),
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Ok(Token::Ident(ident))
            }
            other => Err(Error::template(
                self.line,
                format!("unexpected character {other:?} in action"),
            )),
        }
    }

    fn quoted(&mut self) -> Result<Token> {
        let line = self.line;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => {
                        return Err(Error::template(
                            self.line,
                            format!("unknown escape sequence \\{other}"),
                        ));
                    }
                    None => return Err(Error::template(line, "unterminated string")),
                },
                Some('\n') | None => return Err(Error::template(line, "unterminated string")),
                Some(c) => value.push(c),
            }
        }
    }

    fn raw(&mut self) -> Result<Token> {
        let line = self.line;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(Token::Str(value)),
                Some(c) => value.push(c),
                None => return Err(Error::template(line, "unterminated raw string")),
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier {name:?}"),
        Token::Str(value) => format!("string {value:?}"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::End => "end of action".to_string(),
    }
}
