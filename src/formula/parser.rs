use super::ast::{BinOp, Callee, Expr, LogicalOp, UnaryOp};
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::FormulaError;

/// Deepest nesting of parentheses, call arguments, ternaries, prefix
/// operators and `**` chains.
pub const MAX_NESTING: usize = 128;

/// Longest accepted token stream. Bounds the depth of left-nested binary
/// chains, which the nesting counter does not see.
pub const MAX_TOKENS: usize = 4096;

/// Recursive-descent parser for the formula language.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(src: &str) -> Result<Self, FormulaError> {
        let tokens = Lexer::new(src).tokenize()?;
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::Parse {
                position: tokens[MAX_TOKENS].pos,
                message: format!("formula longer than {} tokens", MAX_TOKENS),
            });
        }
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_conditional()?;
        match self.peek() {
            TokenKind::Eof => Ok(expr),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    fn peek(&self) -> &TokenKind {
        // tokenize() always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: String) -> FormulaError {
        let position = self.tokens[self.pos.min(self.tokens.len() - 1)].pos;
        FormulaError::Parse { position, message }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), FormulaError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", expected, self.peek())))
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, FormulaError>,
    ) -> Result<T, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {}", MAX_NESTING)));
        }
        self.depth += 1;
        let out = parse(self);
        self.depth -= 1;
        out
    }

    // ── Precedence levels ────────────────────────────────────────

    fn parse_conditional(&mut self) -> Result<Expr, FormulaError> {
        self.nested(Self::parse_conditional_inner)
    }

    fn parse_conditional_inner(&mut self) -> Result<Expr, FormulaError> {
        let cond = self.parse_or()?;
        if matches!(self.peek(), TokenKind::Question) {
            self.advance();
            let then = self.parse_conditional()?;
            self.expect(TokenKind::Colon)?;
            let otherwise = self.parse_conditional()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), TokenKind::PipePipe) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), TokenKind::AmpAmp) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::NotEq,
                TokenKind::EqEqEq => BinOp::StrictEq,
                TokenKind::BangEqEq => BinOp::StrictNotEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::GtEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary_op(&self) -> Option<UnaryOp> {
        match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        }
    }

    /// A prefix operator may not be the base of `**`: `-2 ** 2` is an
    /// error, `(-2) ** 2` and `2 ** -2` are fine.
    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if self.unary_op().is_none() {
            return self.parse_power();
        }
        let expr = self.parse_prefixed()?;
        if matches!(self.peek(), TokenKind::StarStar) {
            return Err(self.error("unary operator before '**' needs parentheses".to_string()));
        }
        Ok(expr)
    }

    fn parse_prefixed(&mut self) -> Result<Expr, FormulaError> {
        let Some(op) = self.unary_op() else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.nested(Self::parse_prefixed)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `**` is right-associative.
    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_postfix()?;
        if matches!(self.peek(), TokenKind::StarStar) {
            self.advance();
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.parse_ident_tail(name),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    fn parse_ident_tail(&mut self, name: String) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), TokenKind::Dot) {
            self.advance();
            let property = match self.advance() {
                TokenKind::Ident(p) => p,
                other => {
                    return Err(self.error(format!("expected member name, found {:?}", other)))
                }
            };
            if matches!(self.peek(), TokenKind::LParen) {
                let args = self.parse_args()?;
                return Ok(Expr::Call {
                    callee: Callee::Method {
                        object: name,
                        method: property,
                    },
                    args,
                });
            }
            return Ok(Expr::Member {
                object: name,
                property,
            });
        }

        if matches!(self.peek(), TokenKind::LParen) {
            let args = self.parse_args()?;
            return Ok(Expr::Call {
                callee: Callee::Function(name),
                args,
            });
        }

        Ok(match name.as_str() {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "null" | "undefined" => Expr::Undefined,
            "NaN" => Expr::Number(f64::NAN),
            "Infinity" => Expr::Number(f64::INFINITY),
            _ => Expr::Ident(name),
        })
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if matches!(self.peek(), TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_conditional()?);
            match self.advance() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                other => {
                    return Err(self.error(format!("expected ',' or ')', found {:?}", other)))
                }
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
