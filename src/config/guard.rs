//! Guard expressions deciding whether a block takes part in a merge.
//!
//! ```text
//! $(tag) == 'package-2017-10'
//! !$(azure-arm) && $(csharp)
//! $(tag) in ['v1', 'v2']
//! ```
//!
//! `$(key)` reads a key from the context tree. A guard that reads an
//! undefined key is false. A guard that cannot be parsed is a [`GuardError`],
//! which callers downgrade to a warning and a false result.

use serde_json::Value;
use thiserror::Error;

use super::resolve::Resolver;
use super::ConfigError;

/// Deepest nesting of `!`, parentheses, brackets and operator chains a guard
/// may use.
pub const MAX_GUARD_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid guard '{expression}': {reason}")]
    Parse { expression: String, reason: String },

    #[error("guard '{expression}' could not read $({key}): {source}")]
    Reference {
        expression: String,
        key: String,
        source: ConfigError,
    },
}

/// Extracts the guard from a fenced-block info string by dropping the
/// leading language token: `"yaml $(tag) == 'v1'"` becomes `"$(tag) == 'v1'"`.
///
/// Returns `None` when nothing but the language is left.
pub fn guard_from_fence_info(info: &str) -> Option<String> {
    let info = info.trim();
    let (first, rest) = info
        .split_once(char::is_whitespace)
        .unwrap_or((info, ""));
    let is_language = first
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
        && !matches!(first, "true" | "false" | "null" | "in");
    let guard = if is_language { rest.trim() } else { info };
    (!guard.is_empty()).then(|| guard.to_string())
}

/// Evaluates `expression` against `context`.
///
/// Returns `Ok(false)` when the expression references a key `context` does
/// not define.
pub fn evaluate_guard(expression: &str, context: &Value) -> Result<bool, GuardError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let ast = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }

    let resolver = Resolver::new(context);
    let evaluator = Evaluator {
        expression,
        resolver: &resolver,
    };
    match evaluator.eval(&ast)? {
        Some(value) => Ok(truthy(&value)),
        None => Ok(false),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Reference(String),
    Literal(Value),
    Not,
    And,
    Or,
    Eq,
    NotEq,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, GuardError> {
    let error = |reason: String| GuardError::Parse {
        expression: expression.to_string(),
        reason,
    };
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '$' if next == Some('(') => {
                let start = i + 2;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == ')')
                    .map(|offset| start + offset)
                    .ok_or_else(|| error("unclosed $( reference".to_string()))?;
                let key: String = chars[start..end].iter().collect();
                if key.trim().is_empty() {
                    return Err(error("empty $() reference".to_string()));
                }
                tokens.push(Token::Reference(key.trim().to_string()));
                i = end + 1;
            }
            '\'' | '"' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(error("unterminated string".to_string())),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(j + 1) {
                                text.push(escaped);
                            }
                            j += 2;
                        }
                        Some(&q) if q == c => break,
                        Some(&other) => {
                            text.push(other);
                            j += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
                i = j + 1;
            }
            '!' | '=' => {
                let negated = c == '!';
                let eq_count = chars[i + 1..].iter().take(2).take_while(|&&c| c == '=').count();
                match (negated, eq_count) {
                    (true, 0) => tokens.push(Token::Not),
                    (true, _) => tokens.push(Token::NotEq),
                    (false, 1 | 2) => tokens.push(Token::Eq),
                    (false, _) => return Err(error("assignment is not allowed".to_string())),
                }
                i += 1 + eq_count;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| error(format!("invalid number '{text}'")))?;
                let value = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| error(format!("invalid number '{text}'")))?;
                tokens.push(Token::Literal(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" | "undefined" => Token::Literal(Value::Null),
                    "in" => Token::In,
                    _ => return Err(error(format!("unknown identifier '{word}'"))),
                });
            }
            other => return Err(error(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Expr {
    Reference(String),
    Literal(Value),
    List(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    expression: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> GuardError {
        GuardError::Parse {
            expression: self.expression.to_string(),
            reason: reason.to_string(),
        }
    }

    fn descend(&mut self) -> Result<(), GuardError> {
        self.depth += 1;
        if self.depth > MAX_GUARD_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_and()?;
        let mut chained = 0;
        while self.eat(&Token::Or) {
            self.descend()?;
            chained += 1;
            left = Expr::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        self.depth -= chained;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, GuardError> {
        let mut left = self.parse_unary()?;
        let mut chained = 0;
        while self.eat(&Token::And) {
            self.descend()?;
            chained += 1;
            left = Expr::And(Box::new(left), Box::new(self.parse_unary()?));
        }
        self.depth -= chained;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, GuardError> {
        if self.eat(&Token::Not) {
            return self.parse_not();
        }
        self.parse_compare()
    }

    fn parse_not(&mut self) -> Result<Expr, GuardError> {
        self.descend()?;
        let inner = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Not(Box::new(inner)))
    }

    fn parse_compare(&mut self) -> Result<Expr, GuardError> {
        let left = self.parse_primary()?;
        let build: fn(Box<Expr>, Box<Expr>) -> Expr = match self.peek() {
            Some(Token::Eq) => Expr::Eq,
            Some(Token::NotEq) => Expr::NotEq,
            Some(Token::In) => Expr::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_primary()?;
        Ok(build(Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> Result<Expr, GuardError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        self.pos += 1;
        match token {
            Token::Reference(key) => Ok(Expr::Reference(key)),
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                self.depth -= 1;
                Ok(inner)
            }
            Token::LBracket => {
                self.descend()?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.parse_or()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        if !self.eat(&Token::Comma) {
                            return Err(self.error("expected ',' or ']'"));
                        }
                    }
                }
                self.depth -= 1;
                Ok(Expr::List(items))
            }
            Token::Not => self.parse_not(),
            _ => Err(self.error("expected a value")),
        }
    }
}

struct Evaluator<'a, 'r> {
    expression: &'a str,
    resolver: &'a Resolver<'r>,
}

impl Evaluator<'_, '_> {
    /// `None` means an undefined key was read; it poisons the whole guard.
    fn eval(&self, expr: &Expr) -> Result<Option<Value>, GuardError> {
        let value = match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Reference(key) => {
                let found = self
                    .resolver
                    .get_dotted(key)
                    .map_err(|source| GuardError::Reference {
                        expression: self.expression.to_string(),
                        key: key.clone(),
                        source,
                    })?;
                match found {
                    Some(value) => value,
                    None => return Ok(None),
                }
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item)? {
                        Some(value) => values.push(value),
                        None => return Ok(None),
                    }
                }
                Value::Array(values)
            }
            Expr::Not(inner) => match self.eval(inner)? {
                Some(value) => Value::Bool(!truthy(&value)),
                None => return Ok(None),
            },
            Expr::And(left, right) | Expr::Or(left, right) => {
                let (Some(l), Some(r)) = (self.eval(left)?, self.eval(right)?) else {
                    return Ok(None);
                };
                let result = if matches!(expr, Expr::And(..)) {
                    truthy(&l) && truthy(&r)
                } else {
                    truthy(&l) || truthy(&r)
                };
                Value::Bool(result)
            }
            Expr::Eq(left, right) | Expr::NotEq(left, right) | Expr::In(left, right) => {
                let (Some(l), Some(r)) = (self.eval(left)?, self.eval(right)?) else {
                    return Ok(None);
                };
                Value::Bool(match expr {
                    Expr::Eq(..) => loose_eq(&l, &r),
                    Expr::NotEq(..) => !loose_eq(&l, &r),
                    _ => contains(&r, &l),
                })
            }
        };
        Ok(Some(value))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(items), _) => items.iter().any(|item| loose_eq(item, needle)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        (Value::String(text), Value::String(part)) => text.contains(part.as_str()),
        _ => false,
    }
}
