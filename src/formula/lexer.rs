use crate::error::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Lt,
    LtEq,
    Gt,
    GtEq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    AmpAmp,
    PipePipe,
    Question,
    Colon,
    LParen,
    RParen,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub pos: usize,
}

/// Tokenizer over a formula string.
pub struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            done: false,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind, FormulaError> {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.chars.next();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            self.chars.next();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.chars.next();
            }
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.chars.next();
            }
        }
        let end = self.offset();
        let text = &self.src[start..end];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| FormulaError::Parse {
                position: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<TokenKind, FormulaError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => {
                    return Err(FormulaError::Parse {
                        position: start,
                        message: "unterminated string".to_string(),
                    })
                }
                Some((_, c)) if c == quote => return Ok(TokenKind::Str(value)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => value.push(c),
                    None => {
                        return Err(FormulaError::Parse {
                            position: start,
                            message: "unterminated string escape".to_string(),
                        })
                    }
                },
                Some((_, c)) => value.push(c),
            }
        }
    }

    fn lex_ident(&mut self, start: usize) -> TokenKind {
        while matches!(self.peek_char(), Some(c) if is_ident_char(c)) {
            self.chars.next();
        }
        let end = self.offset();
        TokenKind::Ident(self.src[start..end].to_string())
    }

    pub fn next_token(&mut self) -> Result<Token, FormulaError> {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
        let Some((pos, ch)) = self.chars.next() else {
            self.done = true;
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.src.len(),
            });
        };

        let kind = match ch {
            '0'..='9' => self.lex_number(pos)?,
            '.' if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) => {
                self.lex_number(pos)?
            }
            '\'' | '"' => self.lex_string(ch, pos)?,
            c if is_ident_start(c) => self.lex_ident(pos),
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '=' if self.eat('=') => {
                if self.eat('=') {
                    TokenKind::EqEqEq
                } else {
                    TokenKind::EqEq
                }
            }
            '&' if self.eat('&') => TokenKind::AmpAmp,
            '|' if self.eat('|') => TokenKind::PipePipe,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            other => {
                return Err(FormulaError::Parse {
                    position: pos,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };
        Ok(Token { kind, pos })
    }

    /// Tokenize the whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, FormulaError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if end {
                return Ok(tokens);
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, FormulaError>;

    /// Yields tokens up to (excluding) `Eof`, stopping after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) => None,
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a >= 2 && !b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::GtEq,
                TokenKind::Number(2.0),
                TokenKind::AmpAmp,
                TokenKind::Bang,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strict_equality_and_power() {
        assert_eq!(
            kinds("x === 2 ** 3"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::EqEqEq,
                TokenKind::Number(2.0),
                TokenKind::StarStar,
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_both_quotes() {
        assert_eq!(
            kinds("'Sword' \"Bow\""),
            vec![
                TokenKind::Str("Sword".into()),
                TokenKind::Str("Bow".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_decimal_forms() {
        assert_eq!(
            kinds(".5 1.25 2e2"),
            vec![
                TokenKind::Number(0.5),
                TokenKind::Number(1.25),
                TokenKind::Number(200.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("'abc").tokenize().is_err());
    }

    #[test]
    fn test_single_ampersand_rejected() {
        assert!(Lexer::new("a & b").tokenize().is_err());
    }
}
