//! Reader for the shell-variable-style config file.
//!
//! Supported subset:
//!
//! ```text
//! # comment
//! export PROJECTS_ROOT=~/code
//! HOSTS=("home" work)          # trailing comment
//! TOOLS=(
//!   shell
//!   'claude'
//! )
//! HOST_home_SSH="me@home-pc"
//! TOOL_claude_CMD='claude --continue'
//! ```
//!
//! No expansion is performed: `$HOME` stays literal. Later assignments win.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Array(Vec<String>),
}

/// All assignments in the file, by variable name.
pub type Vars = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Close,
}

pub fn parse(text: &str) -> Result<Vars, ParseError> {
    let mut vars = Vars::new();
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    while let Some((number, raw)) = lines.next() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let err = |message: String| ParseError {
            line: number,
            message,
        };

        let Some((name, rest)) = line.split_once('=') else {
            return Err(err(format!("expected NAME=value, found '{}'", line.trim_end())));
        };
        if !is_identifier(name) {
            return Err(err(format!("invalid variable name '{name}'")));
        }

        if let Some(items) = rest.strip_prefix('(') {
            let mut words = Vec::new();
            let mut closed = collect_array(items, &mut words).map_err(err)?;
            while !closed {
                let Some((next_number, next)) = lines.next() else {
                    return Err(ParseError {
                        line: number,
                        message: format!("array '{name}' is never closed"),
                    });
                };
                closed = collect_array(next, &mut words).map_err(|message| ParseError {
                    line: next_number,
                    message,
                })?;
            }
            vars.insert(name.to_string(), Value::Array(words));
            continue;
        }

        let tokens = lex(rest, false).map_err(err)?;
        if rest.starts_with(char::is_whitespace) && !tokens.is_empty() {
            return Err(err(format!("unexpected space after '{name}='")));
        }
        let value = match tokens.as_slice() {
            [] => String::new(),
            [Token::Word(word)] => word.clone(),
            _ => {
                return Err(err(format!(
                    "value of '{name}' has several words; quote it"
                )))
            }
        };
        vars.insert(name.to_string(), Value::Scalar(value));
    }

    Ok(vars)
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Adds the words of one array line to `words`. Returns true once `)` is seen.
fn collect_array(line: &str, words: &mut Vec<String>) -> Result<bool, String> {
    let mut tokens = lex(line, true)?.into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => words.push(word),
            Token::Close => {
                return match tokens.next() {
                    None => Ok(true),
                    Some(_) => Err("unexpected text after ')'".to_string()),
                };
            }
        }
    }
    Ok(false)
}

fn lex(line: &str, in_array: bool) -> Result<Vec<Token>, String> {
    let mut chars = line.chars().peekable();
    let mut tokens = Vec::new();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None | Some('#') => break,
            Some(')') if in_array => {
                chars.next();
                tokens.push(Token::Close);
                continue;
            }
            _ => {}
        }
        tokens.push(Token::Word(read_word(&mut chars, in_array)?));
    }

    Ok(tokens)
}

fn read_word(chars: &mut Peekable<Chars<'_>>, in_array: bool) -> Result<String, String> {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => break,
            ')' if in_array => break,
            '"' => {
                chars.next();
                loop {
                    match chars.next() {
                        None => return Err("unterminated double quote".to_string()),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => word.push(escaped),
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(other) => word.push(other),
                    }
                }
            }
            '\'' => {
                chars.next();
                loop {
                    match chars.next() {
                        None => return Err("unterminated single quote".to_string()),
                        Some('\'') => break,
                        Some(other) => word.push(other),
                    }
                }
            }
            '\\' => {
                chars.next();
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
            }
            other => {
                chars.next();
                word.push(other);
            }
        }
    }
    Ok(word)
}
