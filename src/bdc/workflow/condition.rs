// SPDX-License-Identifier: MIT

//! Guard expressions for workflow containers
//!
//! A container may carry a `condition` evaluated against the state it is
//! about to receive. Supported forms:
//! - `payment.status == 'AUTHORIZED'`
//! - `attempts < 3 and not blocked == true`
//! - `methods contains 'CARD' or (amount >= 100)`
//! - `true` / `false`

use crate::bdc::workflow::state::CodableState;
use crate::sdk::error::ConditionError;
use crate::sdk::value::DynamicValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(bool),
    Compare {
        path: String,
        op: CompareOp,
        right: Literal,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn parse_error(input: &str, reason: impl Into<String>) -> ConditionError {
    ConditionError::Parse {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

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
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(parse_error(input, "unterminated string literal"));
                }
                tokens.push(Token::Str(text));
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.next_if(|&(_, n)| n == '=').is_some();
                let op = match (c, followed_by_eq) {
                    ('=', true) => CompareOp::Eq,
                    ('!', true) => CompareOp::NotEq,
                    ('<', true) => CompareOp::Lte,
                    ('>', true) => CompareOp::Gte,
                    ('<', false) => CompareOp::Lt,
                    ('>', false) => CompareOp::Gt,
                    _ => return Err(parse_error(input, format!("unexpected '{}'", c))),
                };
                tokens.push(Token::Op(op));
            }
            _ => {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_whitespace() || "()=!<>'\"".contains(ch) {
                        break;
                    }
                    end = i + ch.len_utf8();
                    chars.next();
                }
                let word = &input[start..end];
                let token = match word {
                    "and" | "&&" => Token::And,
                    "or" | "||" => Token::Or,
                    "not" => Token::Not,
                    "contains" => Token::Op(CompareOp::Contains),
                    _ if word.starts_with(|ch: char| ch.is_ascii_digit() || ch == '-') => {
                        match word.parse::<f64>() {
                            Ok(n) => Token::Number(n),
                            Err(_) => {
                                return Err(parse_error(input, format!("bad number '{}'", word)))
                            }
                        }
                    }
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push(token);
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expression, ConditionError> {
        match self.advance() {
            Some(Token::Not) => Ok(Expression::Not(Box::new(self.unary()?))),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(parse_error(self.input, "expected ')'")),
                }
            }
            Some(Token::Ident(word)) => self.comparison(word),
            other => Err(parse_error(
                self.input,
                format!("unexpected token {:?}", other),
            )),
        }
    }

    fn comparison(&mut self, path: String) -> Result<Expression, ConditionError> {
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => {
                return match path.as_str() {
                    "true" => Ok(Expression::Constant(true)),
                    "false" => Ok(Expression::Constant(false)),
                    _ => Err(parse_error(
                        self.input,
                        format!("expected an operator after '{}'", path),
                    )),
                }
            }
        };
        self.pos += 1;

        let right = match self.advance() {
            Some(Token::Str(s)) => Literal::String(s),
            Some(Token::Number(n)) => Literal::Number(n),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Literal::Boolean(true),
                "false" => Literal::Boolean(false),
                "null" => Literal::Null,
                _ => {
                    return Err(parse_error(
                        self.input,
                        format!("expected a literal, found '{}'", word),
                    ))
                }
            },
            other => {
                return Err(parse_error(
                    self.input,
                    format!("expected a literal, found {:?}", other),
                ))
            }
        };

        Ok(Expression::Compare { path, op, right })
    }
}

/// Parse a guard expression
pub fn parse(input: &str) -> Result<Expression, ConditionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_error(input, "empty condition"));
    }

    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parse_error(input, "trailing tokens"));
    }
    Ok(expr)
}

/// Evaluate a parsed guard against state. Missing paths compare equal only to `null`.
pub fn evaluate(expr: &Expression, state: &CodableState) -> bool {
    match expr {
        Expression::Constant(b) => *b,
        Expression::Compare { path, op, right } => compare(state.get_path(path), *op, right),
        Expression::And(l, r) => evaluate(l, state) && evaluate(r, state),
        Expression::Or(l, r) => evaluate(l, state) || evaluate(r, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

/// Parse and evaluate in one go
pub fn check(input: &str, state: &CodableState) -> Result<bool, ConditionError> {
    Ok(evaluate(&parse(input)?, state))
}

fn compare(left: Option<&DynamicValue>, op: CompareOp, right: &Literal) -> bool {
    match op {
        CompareOp::Eq => matches_literal(left, right),
        CompareOp::NotEq => !matches_literal(left, right),
        CompareOp::Gt => numeric(left, right, |a, b| a > b),
        CompareOp::Gte => numeric(left, right, |a, b| a >= b),
        CompareOp::Lt => numeric(left, right, |a, b| a < b),
        CompareOp::Lte => numeric(left, right, |a, b| a <= b),
        CompareOp::Contains => match left {
            Some(DynamicValue::String(s)) => match right {
                Literal::String(needle) => s.contains(needle.as_str()),
                _ => false,
            },
            Some(DynamicValue::Array(items)) => {
                items.iter().any(|item| matches_literal(Some(item), right))
            }
            _ => false,
        },
    }
}

fn matches_literal(left: Option<&DynamicValue>, right: &Literal) -> bool {
    match (left, right) {
        (None | Some(DynamicValue::Null), Literal::Null) => true,
        (Some(DynamicValue::String(s)), Literal::String(r)) => s == r,
        (Some(DynamicValue::Bool(b)), Literal::Boolean(r)) => b == r,
        (Some(DynamicValue::Number(n)), Literal::Number(r)) => n
            .as_f64()
            .map(|f| (f - r).abs() < f64::EPSILON)
            .unwrap_or(false),
        _ => false,
    }
}

fn numeric<F>(left: Option<&DynamicValue>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left.and_then(|v| v.as_f64().ok()), right) {
        (Some(l), Literal::Number(r)) => cmp(l, *r),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: serde_json::Value) -> CodableState {
        CodableState::from_value(DynamicValue::from(value)).unwrap()
    }

    #[test]
    fn test_parse_simple_comparison() {
        assert_eq!(
            parse("status == 'done'").unwrap(),
            Expression::Compare {
                path: "status".to_string(),
                op: CompareOp::Eq,
                right: Literal::String("done".to_string()),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        assert!(
            matches!(expr, Expression::Or(_, ref right) if matches!(**right, Expression::And(_, _)))
        );
    }

    #[test]
    fn test_string_and_number_comparisons() {
        let s = state(json!({"intent": "search", "score": 7.5}));
        assert!(check("intent == 'search'", &s).unwrap());
        assert!(check("intent != \"code\"", &s).unwrap());
        assert!(check("score > 5", &s).unwrap());
        assert!(check("score <= 7.5", &s).unwrap());
        assert!(!check("score < 7", &s).unwrap());
    }

    #[test]
    fn test_nested_paths_and_contains() {
        let s = state(json!({
            "session": {"methods": ["CARD", "PAYPAL"], "country": "GB"}
        }));
        assert!(check("session.methods contains 'CARD'", &s).unwrap());
        assert!(!check("session.methods contains 'KLARNA'", &s).unwrap());
        assert!(check("session.country contains 'G'", &s).unwrap());
    }

    #[test]
    fn test_logical_operators_and_grouping() {
        let s = state(json!({"a": 1, "b": true}));
        assert!(check("a == 1 and b == true", &s).unwrap());
        assert!(check("a == 2 or (b == true and not a == 3)", &s).unwrap());
        assert!(!check("not (a == 1)", &s).unwrap());
    }

    #[test]
    fn test_missing_path_equals_null() {
        let s = state(json!({}));
        assert!(check("missing == null", &s).unwrap());
        assert!(!check("missing > 0", &s).unwrap());
        assert!(check("true", &s).unwrap());
        assert!(!check("false", &s).unwrap());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("status ==").is_err());
        assert!(parse("status == 'open").is_err());
        assert!(parse("(a == 1").is_err());
        assert!(parse("a == 1 b").is_err());
        assert!(parse("a = 1").is_err());
    }
}
