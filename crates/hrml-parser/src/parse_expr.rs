//! Attribute expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 7. `or` / `||`
//! 6. `and` / `&&`
//! 5. `==`, `!=`, `<`, `>`, `<=`, `>=`, `in`, `not in` (no chaining)
//! 4. `+`, `-`
//! 3. `*`, `/`, `%`
//! 2. unary `not` / `!`, unary `-`
//! 1. literals, list literals, dotted paths, builtin calls, `( … )`

use hrml_lexer::{Lexer, Token, TokenKind};
use hrml_types::ast::{BinOp, Expr, ExprKind, Expression, UnaryOp};
use hrml_types::{ErrorCode, SourceFile, Span, TemplateError};

/// Maximum nesting of parenthesised, list, call and unary sub-expressions.
const MAX_NESTING: u32 = 16;

/// Parse the expression `text`, which starts at `start` inside `source_file`.
pub fn parse_expression(
    text: &str,
    source_file: &SourceFile,
    start: Span,
) -> hrml_types::Result<Expression> {
    let tokens = Lexer::new(text, source_file, start).lex()?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        source_file,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if !parser.at_end() {
        let token = parser.peek().clone();
        return Err(parser.error(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("unexpected '{}' after the end of the expression", token.kind),
            token.span,
        ));
    }
    Ok(Expression {
        source: text.to_string(),
        expr,
    })
}

struct ExprParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    depth: u32,
}

impl ExprParser<'_> {
    // ── Token Cursor ──────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        // the lexer always terminates the stream with Eof
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> hrml_types::Result<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(self.error(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', found '{}'", kind, found.kind),
                found.span,
            ))
        }
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>, span: Span) -> TemplateError {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        TemplateError::new(&self.source_file.name, code, message, span, source_line)
    }

    // ── Nesting ───────────────────────────────────────────────────────────────

    fn enter(&mut self) -> hrml_types::Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(
                ErrorCode::NESTING_LIMIT_EXCEEDED,
                format!("expressions may nest at most {MAX_NESTING} levels deep"),
                self.peek().span,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// A nested sub-expression (parenthesised, list element, call argument).
    fn parse_nested(&mut self) -> hrml_types::Result<Expr> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `OrExpr = AndExpr { "or" AndExpr }`
    fn parse_or(&mut self) -> hrml_types::Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    /// `AndExpr = CompExpr { "and" CompExpr }`
    fn parse_and(&mut self) -> hrml_types::Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_comparison()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    /// `CompExpr = AddExpr [ CompOp AddExpr ]`
    ///
    /// Comparisons do not chain: `a < b < c` is an error.
    fn parse_comparison(&mut self) -> hrml_types::Result<Expr> {
        let left = self.parse_additive()?;
        let Some((op, width)) = self.match_comparison_op() else {
            return Ok(left);
        };
        for _ in 0..width {
            self.advance();
        }
        let right = self.parse_additive()?;
        if self.match_comparison_op().is_some() {
            let token = self.peek().clone();
            return Err(self.error(
                ErrorCode::UNEXPECTED_TOKEN,
                "comparisons cannot be chained; combine them with 'and'",
                token.span,
            ));
        }
        Ok(binary(left, op, right))
    }

    /// Comparison operator at the cursor and how many tokens it spans.
    fn match_comparison_op(&self) -> Option<(BinOp, usize)> {
        let op = match self.peek_kind() {
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::BangEq => BinOp::NotEq,
            TokenKind::Less => BinOp::Less,
            TokenKind::Greater => BinOp::Greater,
            TokenKind::LessEq => BinOp::LessEq,
            TokenKind::GreaterEq => BinOp::GreaterEq,
            TokenKind::In => BinOp::In,
            TokenKind::Not if self.look_ahead(1) == &TokenKind::In => return Some((BinOp::NotIn, 2)),
            _ => return None,
        };
        Some((op, 1))
    }

    /// `AddExpr = MulExpr { ("+" | "-") MulExpr }`
    fn parse_additive(&mut self) -> hrml_types::Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    /// `MulExpr = UnaryExpr { ("*" | "/" | "%") UnaryExpr }`
    fn parse_multiplicative(&mut self) -> hrml_types::Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    /// `UnaryExpr = ("not" | "!" | "-") UnaryExpr | Primary`
    fn parse_unary(&mut self) -> hrml_types::Result<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        let start = self.advance().span;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;

        // fold `-3` into a literal
        if let (UnaryOp::Neg, ExprKind::Number(n)) = (op, &operand.kind) {
            return Ok(Expr::new(ExprKind::Number(-n), start.merge(operand.span)));
        }
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> hrml_types::Result<Expr> {
        let token = self.advance();
        let span = token.span;
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::new(ExprKind::Number(n), span)),
            TokenKind::String(s) => Ok(Expr::new(ExprKind::String(s), span)),
            TokenKind::True => Ok(Expr::new(ExprKind::Bool(true), span)),
            TokenKind::False => Ok(Expr::new(ExprKind::Bool(false), span)),
            TokenKind::Null => Ok(Expr::new(ExprKind::Null, span)),
            TokenKind::LParen => {
                let inner = self.parse_nested()?;
                let close = self.expect(&TokenKind::RParen)?;
                Ok(Expr::new(inner.kind, span.merge(close.span)))
            }
            TokenKind::LBracket => {
                let items = self.parse_list(&TokenKind::RBracket)?;
                let close = self.expect(&TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::List(items), span.merge(close.span)))
            }
            TokenKind::Identifier(name) if self.peek_kind() == &TokenKind::LParen => {
                self.advance();
                let args = self.parse_list(&TokenKind::RParen)?;
                let close = self.expect(&TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::Call { name, args }, span.merge(close.span)))
            }
            TokenKind::Identifier(name) => self.parse_path(name, span),
            TokenKind::Eof => Err(self.error(
                ErrorCode::UNEXPECTED_TOKEN,
                "expected an expression",
                span,
            )),
            other => Err(self.error(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected an expression, found '{other}'"),
                span,
            )),
        }
    }

    /// Comma-separated sub-expressions up to (not including) `close`.
    /// A trailing comma is allowed.
    fn parse_list(&mut self, close: &TokenKind) -> hrml_types::Result<Vec<Expr>> {
        let mut items = Vec::new();
        while self.peek_kind() != close {
            items.push(self.parse_nested()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// `Path = Ident { "." (Ident | Keyword | Integer) }`
    fn parse_path(&mut self, first: String, start: Span) -> hrml_types::Result<Expr> {
        let mut segments = vec![first];
        let mut span = start;
        while self.eat(&TokenKind::Dot) {
            let token = self.advance();
            let segment = match token.kind {
                TokenKind::Identifier(name) => name,
                TokenKind::Number(n) if n.fract() == 0.0 && n >= 0.0 => format!("{}", n as u64),
                TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::In => token.kind.to_string(),
                other => {
                    return Err(self.error(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected a field name or index after '.', found '{other}'"),
                        token.span,
                    ));
                }
            };
            segments.push(segment);
            span = span.merge(token.span);
        }
        Ok(Expr::new(ExprKind::Path(segments), span))
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
