//! Process-wide cache of parsed formulas.
//!
//! Entries are keyed by formula text alone. When the cache grows past its
//! capacity it is cleared wholesale; it holds no state that affects results.

use super::ast::Expr;
use super::parser::Parser;
use crate::error::FormulaError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

pub const DEFAULT_CAPACITY: usize = 2000;

pub type Parsed = Arc<Result<Expr, FormulaError>>;

struct FormulaCache {
    entries: HashMap<String, Parsed>,
    capacity: usize,
}

fn cache() -> MutexGuard<'static, FormulaCache> {
    static CACHE: OnceLock<Mutex<FormulaCache>> = OnceLock::new();
    CACHE
        .get_or_init(|| {
            Mutex::new(FormulaCache {
                entries: HashMap::new(),
                capacity: DEFAULT_CAPACITY,
            })
        })
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parse `formula`, reusing a cached AST when one exists.
///
/// Parse failures are cached as well, so malformed content is only
/// tokenized once.
pub fn parse_cached(formula: &str) -> Parsed {
    if let Some(hit) = cache().entries.get(formula) {
        return Arc::clone(hit);
    }

    let parsed: Parsed = Arc::new(Parser::new(formula).and_then(Parser::parse));

    let mut guard = cache();
    if guard.entries.len() >= guard.capacity {
        tracing::trace!(entries = guard.entries.len(), "formula cache full, clearing");
        guard.entries.clear();
    }
    guard
        .entries
        .insert(formula.to_string(), Arc::clone(&parsed));
    parsed
}

/// Change the capacity. A capacity of zero is treated as one.
pub fn set_capacity(capacity: usize) {
    let mut guard = cache();
    guard.capacity = capacity.max(1);
    if guard.entries.len() > guard.capacity {
        guard.entries.clear();
    }
}

pub fn capacity() -> usize {
    cache().capacity
}

pub fn len() -> usize {
    cache().entries.len()
}

pub fn clear() {
    cache().entries.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_shares_ast() {
        let a = parse_cached("level * 3 + cache_test_marker_a");
        let b = parse_cached("level * 3 + cache_test_marker_a");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_parse_errors_are_cached() {
        let parsed = parse_cached("((cache_test_marker_b");
        assert!(parsed.is_err());
    }
}
