use super::lexer::{Lexer, TokenKind};
use std::collections::BTreeSet;

/// Names that never count as references.
const KEYWORDS: &[&str] = &[
    "Math",
    "true",
    "false",
    "null",
    "undefined",
    "NaN",
    "Infinity",
];

/// Extract the bare identifiers a formula reads.
///
/// Quoted substrings, `object.member` names, function-call names and
/// language keywords are skipped. Lexing stops at the first invalid
/// character; identifiers seen before it are still reported.
///
/// # Examples
///
/// ```rust
/// use buildstat::formula::analyze_formula_references;
///
/// let refs = analyze_formula_references("base_vit * 0.1 + countItems('Sword') + Math.max(spd, 2)");
/// let refs: Vec<_> = refs.into_iter().collect();
/// assert_eq!(refs, vec!["base_vit".to_string(), "spd".to_string()]);
/// ```
pub fn analyze_formula_references(formula: &str) -> BTreeSet<String> {
    let tokens: Vec<TokenKind> = Lexer::new(formula)
        .map_while(Result::ok)
        .map(|t| t.kind)
        .collect();

    let mut refs = BTreeSet::new();
    for (i, kind) in tokens.iter().enumerate() {
        let TokenKind::Ident(name) = kind else {
            continue;
        };
        if KEYWORDS.contains(&name.as_str()) {
            continue;
        }
        let after_dot = i > 0 && tokens[i - 1] == TokenKind::Dot;
        let is_call = tokens.get(i + 1) == Some(&TokenKind::LParen);
        if after_dot || is_call {
            continue;
        }
        refs.insert(name.clone());
    }
    refs
}

/// Names of the functions a formula calls: `name` for helpers and
/// `Object.method` for member calls.
///
/// # Examples
///
/// ```rust
/// use buildstat::formula::analyze_formula_calls;
///
/// let calls = analyze_formula_calls("countItems('ring') + Math.max(vit, 'hasItem(x)')");
/// let calls: Vec<_> = calls.into_iter().collect();
/// assert_eq!(calls, vec!["Math.max".to_string(), "countItems".to_string()]);
/// ```
pub fn analyze_formula_calls(formula: &str) -> BTreeSet<String> {
    let tokens: Vec<TokenKind> = Lexer::new(formula)
        .map_while(Result::ok)
        .map(|t| t.kind)
        .collect();

    let mut calls = BTreeSet::new();
    for (i, kind) in tokens.iter().enumerate() {
        let TokenKind::Ident(name) = kind else {
            continue;
        };
        if tokens.get(i + 1) != Some(&TokenKind::LParen) {
            continue;
        }
        let object = match i.checked_sub(2).map(|j| (&tokens[j], &tokens[j + 1])) {
            Some((TokenKind::Ident(object), TokenKind::Dot)) => Some(object),
            _ => None,
        };
        calls.insert(match object {
            Some(object) => format!("{}.{}", object, name),
            None => name.clone(),
        });
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignores_quoted_text() {
        let refs = analyze_formula_references("hasItem('vit boots') ? vit : 0");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["vit"]);
    }

    #[test]
    fn test_ignores_keywords() {
        assert!(analyze_formula_references("true && !false").is_empty());
    }

    #[test]
    fn test_deduplicates() {
        let refs = analyze_formula_references("a + a * b");
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_calls_collected() {
        let calls = analyze_formula_calls("itemFlatt('x') * Math.floor(level) + foo.bar(1) + vit");
        assert_eq!(
            calls.into_iter().collect::<Vec<_>>(),
            vec!["Math.floor", "foo.bar", "itemFlatt"]
        );
        assert!(analyze_formula_calls("vit * 2").is_empty());
    }

    #[test]
    fn test_partial_on_lex_error() {
        let refs = analyze_formula_references("a + b # c");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
