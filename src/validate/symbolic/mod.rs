//! Symbolic evidence matching.
//!
//! Extracts candidate mathematical expressions from free text and decides
//! algebraic equivalence: two equations are equivalent when their monic
//! polynomial normal forms coincide, two bare expressions when their
//! difference simplifies to zero. Equivalence, not syntactic identity, so
//! `2x+5=13` supports `2x=8`; `x^2=4` does not support `x=2` because the
//! quadratic has a second root.

mod parse;
mod poly;

pub use parse::{parse_candidate, ParseFailure, Parsed};
pub use poly::{Polynomial, Rational};

use std::sync::OnceLock;

/// Extract candidate expressions from text: LaTeX spans first, then bare
/// `lhs = rhs` equations with surrounding prose trimmed off.
pub fn extract_expressions(text: &str) -> Vec<String> {
    static LATEX_SPANS: OnceLock<Vec<regex::Regex>> = OnceLock::new();

    let latex_spans = LATEX_SPANS.get_or_init(|| {
        vec![
            regex::Regex::new(r"\$([^$]+)\$").expect("static regex"),
            regex::Regex::new(r"\\\((.+?)\\\)").expect("static regex"),
            regex::Regex::new(r"\\\[(.+?)\\\]").expect("static regex"),
        ]
    });

    let mut expressions = Vec::new();
    let mut push = |candidate: String| {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty() && !expressions.contains(&candidate) {
            expressions.push(candidate);
        }
    };

    for pattern in latex_spans {
        for capture in pattern.captures_iter(text) {
            push(capture[1].to_string());
        }
    }
    // One candidate per '=', never spanning lines. The runs on either side
    // stop at any character outside the equation alphabet and at the
    // neighboring '=', so several equations on one line each survive.
    for line in text.lines() {
        let parts: Vec<&str> = line.split('=').collect();
        for pair in parts.windows(2) {
            let lhs: String = {
                let run: Vec<char> = pair[0]
                    .chars()
                    .rev()
                    .take_while(|&c| is_equation_char(c))
                    .collect();
                run.into_iter().rev().collect()
            };
            let rhs: String = pair[1].chars().take_while(|&c| is_equation_char(c)).collect();
            if let Some(trimmed) = trim_equation(&lhs, &rhs) {
                push(trimmed);
            }
        }
    }
    expressions
}

/// Characters a bare equation's sides may contain.
fn is_equation_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '\t' | '+' | '-' | '*' | '/' | '^' | '.' | '(' | ')')
}

/// Strip prose tokens from the outer edges of a bare equation:
/// `"so x" = "4"` becomes `"x = 4"`. Returns None when nothing math-like is
/// left on either side.
fn trim_equation(lhs: &str, rhs: &str) -> Option<String> {
    let lhs_tokens: Vec<&str> = lhs.split_whitespace().collect();
    let rhs_tokens: Vec<&str> = rhs.split_whitespace().collect();

    let start = lhs_tokens
        .iter()
        .rposition(|t| !is_mathish(t))
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = rhs_tokens
        .iter()
        .position(|t| !is_mathish(t))
        .unwrap_or(rhs_tokens.len());

    let lhs_keep = lhs_tokens.get(start..)?.join(" ");
    let rhs_keep = rhs_tokens.get(..end)?.join(" ");
    if lhs_keep.is_empty() || rhs_keep.is_empty() {
        return None;
    }
    Some(format!("{} = {}", lhs_keep, rhs_keep))
}

/// A token participates in an equation when it carries any non-alphabetic
/// math character or is a single-letter variable; longer pure-word tokens
/// are prose.
fn is_mathish(token: &str) -> bool {
    token.len() == 1 || token.chars().any(|c| !c.is_ascii_alphabetic())
}

/// Whether two extracted expressions are algebraically equivalent.
///
/// Parse failures on either side mean "no symbolic support for this pair",
/// never an error.
pub fn equivalent(a: &str, b: &str) -> bool {
    match (parse_candidate(a), parse_candidate(b)) {
        (Ok(Parsed::Equation(p)), Ok(Parsed::Equation(q))) => {
            match (p.monic(), q.monic()) {
                (Some(p), Some(q)) => p == q,
                _ => false,
            }
        }
        (Ok(Parsed::Expression(p)), Ok(Parsed::Expression(q))) => p == q,
        // Equation vs bare expression is not a supported comparison
        _ => false,
    }
}

/// First fragment expression (by position) equivalent to any step
/// expression, if one exists.
pub fn find_match(step_expressions: &[String], fragment_expressions: &[String]) -> Option<usize> {
    for (index, fragment_expr) in fragment_expressions.iter().enumerate() {
        for step_expr in step_expressions {
            if equivalent(step_expr, fragment_expr) {
                return Some(index);
            }
        }
    }
    None
}
