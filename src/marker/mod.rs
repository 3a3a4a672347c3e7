// src/marker/mod.rs

//! Environment markers
//!
//! A marker is the predicate after the `;` of a requirement, for example
//! `python_version < "3.8" and sys_platform != "win32"`. A requirement whose
//! marker evaluates to false for the target interpreter is not tracked.

mod environment;

pub use environment::MarkerEnvironment;

use crate::error::{Error, Result};
use crate::version::{Specifier, Version};
use std::fmt;
use tracing::debug;

/// Comparison operators allowed between marker values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOp {
    Compatible,
    Equal,
    NotEqual,
    LessOrEqual,
    GreaterOrEqual,
    LessThan,
    GreaterThan,
    Arbitrary,
    In,
    NotIn,
}

impl MarkerOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Compatible => "~=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Arbitrary => "===",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerValue {
    /// Environment variable, stored under its modern name
    Variable(String),
    /// Quoted string
    Literal(String),
}

impl MarkerValue {
    fn resolve<'a>(&'a self, env: &'a MarkerEnvironment) -> &'a str {
        match self {
            Self::Variable(name) => env.get(name).unwrap_or(""),
            Self::Literal(value) => value,
        }
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "{name}"),
            Self::Literal(value) if value.contains('"') => write!(f, "'{value}'"),
            Self::Literal(value) => write!(f, "\"{value}\""),
        }
    }
}

/// Parsed marker expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Compare {
        lhs: MarkerValue,
        op: MarkerOp,
        rhs: MarkerValue,
    },
    And(Vec<Marker>),
    Or(Vec<Marker>),
}

impl Marker {
    /// Parse a marker expression
    pub fn parse(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = Parser {
            input: s,
            tokens,
            pos: 0,
        };
        let marker = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(marker)
    }

    /// Evaluate against a target environment
    ///
    /// `extra` is always the empty string: requirements are tracked without
    /// any extras selected.
    pub fn evaluate(&self, env: &MarkerEnvironment) -> bool {
        match self {
            Self::And(items) => items.iter().all(|m| m.evaluate(env)),
            Self::Or(items) => items.iter().any(|m| m.evaluate(env)),
            Self::Compare { lhs, op, rhs } => compare(lhs.resolve(env), *op, rhs.resolve(env)),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.as_str()),
            Self::And(items) => write_joined(f, items, " and "),
            Self::Or(items) => write_joined(f, items, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Marker], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match item {
            Marker::Compare { .. } => write!(f, "{item}")?,
            _ => write!(f, "({item})")?,
        }
    }
    Ok(())
}

fn compare(lhs: &str, op: MarkerOp, rhs: &str) -> bool {
    match op {
        MarkerOp::In => return rhs.contains(lhs),
        MarkerOp::NotIn => return !rhs.contains(lhs),
        _ => {}
    }

    if let (Ok(spec), Ok(version)) = (
        Specifier::parse(&format!("{}{rhs}", op.as_str())),
        Version::parse(lhs),
    ) {
        return spec.matches(&version);
    }

    match op {
        MarkerOp::Equal | MarkerOp::Arbitrary => lhs == rhs,
        MarkerOp::NotEqual => lhs != rhs,
        _ => {
            debug!(
                "Marker comparison '{lhs}' {} '{rhs}' is undefined for strings",
                op.as_str()
            );
            false
        }
    }
}

const VARIABLES: &[&str] = &[
    "implementation_name",
    "implementation_version",
    "os_name",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_full_version",
    "python_version",
    "sys_platform",
    "extra",
];

fn canonical_variable(name: &str) -> Option<&'static str> {
    let modern = match name {
        "os.name" => "os_name",
        "sys.platform" => "sys_platform",
        "platform.version" => "platform_version",
        "platform.machine" => "platform_machine",
        "platform.python_implementation" | "python_implementation" => {
            "platform_python_implementation"
        }
        other => other,
    };
    VARIABLES.iter().copied().find(|v| *v == modern)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Op(MarkerOp),
    Str(String),
    Name(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let invalid = |reason: String| Error::InvalidMarker {
        input: input.to_string(),
        reason,
    };
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

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
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| invalid("unterminated string".to_string()))?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '<' | '>' | '=' | '!' | '~' => {
                let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
                let (op, len) = if rest.starts_with("===") {
                    (MarkerOp::Arbitrary, 3)
                } else if rest.starts_with("==") {
                    (MarkerOp::Equal, 2)
                } else if rest.starts_with("!=") {
                    (MarkerOp::NotEqual, 2)
                } else if rest.starts_with("<=") {
                    (MarkerOp::LessOrEqual, 2)
                } else if rest.starts_with(">=") {
                    (MarkerOp::GreaterOrEqual, 2)
                } else if rest.starts_with("~=") {
                    (MarkerOp::Compatible, 2)
                } else if rest.starts_with('<') {
                    (MarkerOp::LessThan, 1)
                } else if rest.starts_with('>') {
                    (MarkerOp::GreaterThan, 1)
                } else {
                    return Err(invalid(format!("unknown operator at '{rest}'")));
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "in" => tokens.push(Token::Op(MarkerOp::In)),
                    "not" => tokens.push(Token::Op(MarkerOp::NotIn)),
                    _ => tokens.push(Token::Name(word)),
                }
            }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        }
    }

    // `not` is only valid as the first half of `not in`
    let mut merged = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == Token::Op(MarkerOp::NotIn) {
            match iter.next() {
                Some(Token::Op(MarkerOp::In)) => merged.push(token),
                _ => return Err(invalid("expected 'in' after 'not'".to_string())),
            }
        } else {
            merged.push(token);
        }
    }

    Ok(merged)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        Error::InvalidMarker {
            input: self.input.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Marker> {
        let mut items = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Marker::Or(items)
        })
    }

    fn parse_and(&mut self) -> Result<Marker> {
        let mut items = vec![self.parse_atom()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.parse_atom()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Marker::And(items)
        })
    }

    fn parse_atom(&mut self) -> Result<Marker> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.next() != Some(Token::RParen) {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }

        let lhs = self.parse_value()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => return Err(self.error("expected comparison operator")),
        };
        let rhs = self.parse_value()?;
        Ok(Marker::Compare { lhs, op, rhs })
    }

    fn parse_value(&mut self) -> Result<MarkerValue> {
        match self.next() {
            Some(Token::Str(value)) => Ok(MarkerValue::Literal(value)),
            Some(Token::Name(name)) => canonical_variable(&name)
                .map(|v| MarkerValue::Variable(v.to_string()))
                .ok_or_else(|| self.error(&format!("unknown marker variable '{name}'"))),
            _ => Err(self.error("expected marker variable or quoted string")),
        }
    }
}
