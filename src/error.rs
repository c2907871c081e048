//! Error types.
//!
//! Resolution itself never fails: formula errors are swallowed and mapped to
//! `0`/`false` at the evaluator boundary. These types surface from the
//! authoring-time entry points (parsing, catalogue and config loading).

use crate::stat_id::StatKey;
use thiserror::Error;

/// Errors produced while parsing or evaluating a formula.
///
/// # Examples
///
/// ```rust
/// use buildstat::formula::parse_formula;
/// use buildstat::FormulaError;
///
/// let err = parse_formula("(1 + 2").unwrap_err();
/// assert!(matches!(err, FormulaError::Parse { .. }));
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// The formula text is not valid in the expression language.
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    /// The formula evaluated to something that is not a finite number.
    #[error("Formula did not produce a finite number")]
    NotANumber,
}

/// Errors produced while loading a content catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Invalid catalogue JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate stat key: {0}")]
    DuplicateStat(StatKey),

    #[error("Duplicate entity id: {0}")]
    DuplicateEntity(String),
}

/// Top-level error for loader entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error("Invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = FormulaError::Parse {
            position: 4,
            message: "expected ')'".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("4"));
        assert!(display.contains("expected ')'"));
    }

    #[test]
    fn test_duplicate_stat_display() {
        let err = CatalogueError::DuplicateStat(StatKey::new("vit"));
        assert_eq!(err.to_string(), "Duplicate stat key: vit");
    }

    #[test]
    fn test_engine_error_wraps_catalogue() {
        let err: EngineError = CatalogueError::DuplicateEntity("sword".into()).into();
        assert!(err.to_string().contains("sword"));
    }
}
