//! Expression parsing: an ordered fallback chain over a small infix dialect.
//!
//! Attempt order: LaTeX-normalized text first, then the raw text. First
//! success wins; exhausting the chain yields a [`ParseFailure`]. Failures are
//! tagged outcomes recovered locally by the validator, never surfaced to the
//! caller and never used as control-flow exceptions.
//!
//! The dialect covers what STEM course material actually contains at step
//! granularity: `+ - * / ^`, parentheses, decimal literals, implicit
//! multiplication (`2x`, `2(4)`), and at most one `=`.

use super::poly::{Polynomial, Rational};
use std::sync::OnceLock;
use thiserror::Error;

/// Why an expression could not be parsed. Recovered locally: a step without
/// a parseable expression simply has no symbolic support.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("malformed number literal {0:?}")]
    InvalidNumber(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected trailing input")]
    TrailingInput,

    #[error("division by a non-constant or zero divisor")]
    BadDivisor,

    #[error("unsupported exponent")]
    UnsupportedExponent,

    #[error("more than one '=' in expression")]
    MultipleEquals,

    #[error("coefficient overflow")]
    Overflow,
}

/// A successfully parsed candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// A bare expression in polynomial normal form.
    Expression(Polynomial),
    /// An equation `lhs = rhs`, stored as `lhs - rhs`.
    Equation(Polynomial),
}

/// Largest exponent the parser will expand. Course-level algebra never
/// exceeds this; it bounds the cost of `checked_pow`.
const MAX_EXPONENT: u32 = 10;

/// Parse through the fallback chain: LaTeX normalization, then raw text.
pub fn parse_candidate(input: &str) -> Result<Parsed, ParseFailure> {
    let raw = input.trim().to_string();
    let normalized = normalize_latex(&raw);

    let mut attempts = vec![normalized];
    if attempts[0] != raw {
        attempts.push(raw);
    }

    let mut last = ParseFailure::Empty;
    for attempt in attempts {
        match parse_one(&attempt) {
            Ok(parsed) => return Ok(parsed),
            Err(failure) => last = failure,
        }
    }
    Err(last)
}

/// Rewrite common LaTeX constructs into the infix dialect.
///
/// Not a full LaTeX parser: nested `\frac` resolves through repeated
/// innermost-first substitution; constructs outside the dialect are left in
/// place and fail in the parser, which then falls back to the raw text.
pub fn normalize_latex(input: &str) -> String {
    static FRAC: OnceLock<regex::Regex> = OnceLock::new();
    let frac = FRAC.get_or_init(|| {
        regex::Regex::new(r"\\frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").expect("static regex")
    });

    let mut text = input.to_string();
    // Innermost \frac first; loop until fixpoint
    loop {
        let replaced = frac.replace_all(&text, "(($1)/($2))").into_owned();
        if replaced == text {
            break;
        }
        text = replaced;
    }

    text.replace("\\cdot", "*")
        .replace("\\times", "*")
        .replace("\\div", "/")
        .replace("\\left", "")
        .replace("\\right", "")
        .replace('×', "*")
        .replace('÷', "/")
        .replace('−', "-") // unicode minus
        .replace('{', "(")
        .replace('}', ")")
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Rational),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Equals,
}

fn lex(input: &str) -> Result<Vec<Token>, ParseFailure> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = Rational::from_decimal(&literal)
                    .ok_or_else(|| ParseFailure::InvalidNumber(literal))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ParseFailure::UnexpectedChar(other)),
        }
    }
    if tokens.is_empty() {
        return Err(ParseFailure::Empty);
    }
    Ok(insert_implicit_multiplication(tokens))
}

/// Insert `*` between adjacent operands: `2x` -> `2 * x`, `2(4)` -> `2 * (4)`.
fn insert_implicit_multiplication(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let implicit = matches!(
            out.last(),
            Some(Token::Number(_)) | Some(Token::Ident(_)) | Some(Token::RParen)
        ) && matches!(
            token,
            Token::Number(_) | Token::Ident(_) | Token::LParen
        );
        if implicit {
            out.push(Token::Star);
        }
        out.push(token);
    }
    out
}

fn parse_one(input: &str) -> Result<Parsed, ParseFailure> {
    let tokens = lex(input)?;
    let equals_count = tokens.iter().filter(|t| **t == Token::Equals).count();
    match equals_count {
        0 => Ok(Parsed::Expression(parse_all(&tokens)?)),
        1 => {
            let split = tokens.iter().position(|t| *t == Token::Equals).unwrap();
            let lhs = parse_all(&tokens[..split])?;
            let rhs = parse_all(&tokens[split + 1..])?;
            let diff = lhs.checked_sub(&rhs).ok_or(ParseFailure::Overflow)?;
            Ok(Parsed::Equation(diff))
        }
        _ => Err(ParseFailure::MultipleEquals),
    }
}

fn parse_all(tokens: &[Token]) -> Result<Polynomial, ParseFailure> {
    let mut parser = Parser { tokens, pos: 0 };
    let poly = parser.parse_expr()?;
    if parser.pos != tokens.len() {
        return Err(ParseFailure::TrailingInput);
    }
    Ok(poly)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expr(&mut self) -> Result<Polynomial, ParseFailure> {
        let mut acc = self.parse_term()?;
        while let Some(op) = self.peek() {
            let add = match op {
                Token::Plus => true,
                Token::Minus => false,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            acc = if add {
                acc.checked_add(&rhs)
            } else {
                acc.checked_sub(&rhs)
            }
            .ok_or(ParseFailure::Overflow)?;
        }
        Ok(acc)
    }

    fn parse_term(&mut self) -> Result<Polynomial, ParseFailure> {
        let mut acc = self.parse_unary()?;
        while let Some(op) = self.peek() {
            let multiply = match op {
                Token::Star => true,
                Token::Slash => false,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            if multiply {
                acc = acc.checked_mul(&rhs).ok_or(ParseFailure::Overflow)?;
            } else {
                // Division only by nonzero constants keeps results polynomial
                let divisor = rhs.as_constant().ok_or(ParseFailure::BadDivisor)?;
                acc = acc
                    .checked_div_const(divisor)
                    .ok_or(ParseFailure::BadDivisor)?;
            }
        }
        Ok(acc)
    }

    fn parse_unary(&mut self) -> Result<Polynomial, ParseFailure> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.parse_unary()?
                    .checked_neg()
                    .ok_or(ParseFailure::Overflow)
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Polynomial, ParseFailure> {
        let base = self.parse_atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.advance();
            let exponent = match self.advance() {
                Some(Token::Number(value)) => *value,
                Some(_) => return Err(ParseFailure::UnsupportedExponent),
                None => return Err(ParseFailure::UnexpectedEnd),
            };
            let exponent = exponent_from(exponent)?;
            return base
                .checked_pow(exponent)
                .ok_or(ParseFailure::Overflow);
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Polynomial, ParseFailure> {
        match self.advance().cloned() {
            Some(Token::Number(value)) => Ok(Polynomial::constant(value)),
            Some(Token::Ident(name)) => Ok(Polynomial::variable(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(_) => Err(ParseFailure::TrailingInput),
                    None => Err(ParseFailure::UnexpectedEnd),
                }
            }
            Some(_) => Err(ParseFailure::TrailingInput),
            None => Err(ParseFailure::UnexpectedEnd),
        }
    }
}

/// Only small nonnegative integer exponents keep expressions polynomial.
fn exponent_from(value: Rational) -> Result<u32, ParseFailure> {
    for candidate in 0..=MAX_EXPONENT {
        if value == Rational::from_integer(candidate as i64) {
            return Ok(candidate);
        }
    }
    Err(ParseFailure::UnsupportedExponent)
}
