//! Formula evaluator.
//!
//! Modifier values and conditions are small expressions authored as text,
//! e.g. `"base_vit * 0.1 + (hasItem('Shield') ? 20 : 0)"`. They are parsed
//! into an [`Expr`] once (see [`cache`]) and evaluated against a
//! [`FormulaScope`] that resolves identifiers and helper functions.
//!
//! Evaluation never fails from the caller's point of view: [`evaluate`]
//! returns `0` and [`check`] returns `false` for anything that does not
//! parse or evaluate cleanly.

pub mod analyze;
pub mod ast;
pub mod cache;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use analyze::{analyze_formula_calls, analyze_formula_references};
pub use ast::Expr;
pub use eval::{eval_expr, FormulaScope, Layered, MATH_FUNCTIONS};
pub use value::Value;

use crate::error::FormulaError;

/// Parse a formula without evaluating it.
pub fn parse_formula(formula: &str) -> Result<Expr, FormulaError> {
    parser::Parser::new(formula)?.parse()
}

/// Whether `formula` is syntactically valid. Never evaluates it.
///
/// # Examples
///
/// ```rust
/// use buildstat::formula::validate_formula_syntax;
///
/// assert!(validate_formula_syntax("vit > 100 ? 5 : 0"));
/// assert!(!validate_formula_syntax("vit > ? 5"));
/// ```
pub fn validate_formula_syntax(formula: &str) -> bool {
    parse_formula(formula).is_ok()
}

/// Evaluate `formula` and return the raw value, surfacing errors.
pub fn try_evaluate<S: FormulaScope + ?Sized>(
    formula: &str,
    scope: &S,
) -> Result<Value, FormulaError> {
    let trimmed = formula.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return Ok(Value::Number(n));
    }
    match cache::parse_cached(trimmed).as_ref() {
        Ok(expr) => eval_expr(expr, scope),
        Err(e) => Err(e.clone()),
    }
}

/// Evaluate a numeric formula, mapping every failure to `0`.
///
/// # Examples
///
/// ```rust
/// use buildstat::formula::{evaluate, Value};
/// use std::collections::HashMap;
///
/// let mut scope: HashMap<String, Value> = HashMap::new();
/// scope.insert("level".into(), Value::Number(12.0));
///
/// assert_eq!(evaluate("level * 5", &scope), 60.0);
/// assert_eq!(evaluate("42", &scope), 42.0);
/// assert_eq!(evaluate("(level * 5", &scope), 0.0);
/// ```
pub fn evaluate<S: FormulaScope + ?Sized>(formula: &str, scope: &S) -> f64 {
    match try_evaluate_number(formula, scope) {
        Ok(n) => n,
        Err(error) => {
            tracing::debug!(formula, %error, "formula evaluation failed");
            0.0
        }
    }
}

/// [`try_evaluate`] narrowed to finite numbers.
pub fn try_evaluate_number<S: FormulaScope + ?Sized>(
    formula: &str,
    scope: &S,
) -> Result<f64, FormulaError> {
    match try_evaluate(formula, scope)? {
        Value::Number(n) if n.is_finite() => Ok(n),
        _ => Err(FormulaError::NotANumber),
    }
}

/// Evaluate a condition. Empty conditions always pass.
pub fn check<S: FormulaScope + ?Sized>(condition: &str, scope: &S) -> bool {
    if condition.trim().is_empty() {
        return true;
    }
    match try_evaluate(condition, scope) {
        Ok(v) => v.truthy(),
        Err(error) => {
            tracing::debug!(condition, %error, "condition evaluation failed");
            false
        }
    }
}

/// [`check`] for an optional condition.
pub fn check_opt<S: FormulaScope + ?Sized>(condition: Option<&str>, scope: &S) -> bool {
    condition.map_or(true, |c| check(c, scope))
}

/// Replace every standalone occurrence of the identifier `token` in
/// `formula` with `replacement`. Quoted text is left alone.
pub fn replace_identifier(formula: &str, token: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut quote: Option<char> = None;
    let mut chars = formula.char_indices().peekable();
    let mut prev: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q && prev != Some('\\') {
                quote = None;
            }
            prev = Some(c);
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            out.push(c);
            prev = Some(c);
            continue;
        }
        let boundary_before = !prev.is_some_and(lexer::is_ident_char) && prev != Some('.');
        if boundary_before && formula[i..].starts_with(token) {
            let end = i + token.len();
            let boundary_after = !formula[end..]
                .chars()
                .next()
                .is_some_and(lexer::is_ident_char);
            if boundary_after {
                out.push_str(replacement);
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
                prev = token.chars().last();
                continue;
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Whether `formula` reads the identifier `token` outside quoted text.
pub fn references_identifier(formula: &str, token: &str) -> bool {
    analyze_formula_references(formula).contains(token)
}
