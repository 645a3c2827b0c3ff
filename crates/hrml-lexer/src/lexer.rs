//! Attribute expression lexer: converts expression text to a token stream.
//!
//! Expressions live inside quoted attribute values, so the lexer is handed
//! the position of the value inside its template and reports spans in
//! template coordinates. Lexing stops at the first error: a malformed
//! expression is a fatal parse error for the whole template.

use hrml_types::{ErrorCode, SourceFile, Span, TemplateError};

use crate::token::{Token, TokenKind};

/// The expression lexer.
pub struct Lexer<'src> {
    /// The expression text.
    text: &'src str,
    /// The expression text as bytes.
    source: &'src [u8],
    /// Template the expression belongs to, for error context.
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based, template coordinates).
    line: u32,
    /// Current column number (1-based, template coordinates).
    col: u32,
    /// Kind of the last emitted token.
    previous: Option<TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a lexer for `text`, which starts at `start` inside `source_file`.
    pub fn new(text: &'src str, source_file: &'src SourceFile, start: Span) -> Self {
        Self {
            text,
            source: text.as_bytes(),
            source_file,
            pos: 0,
            line: start.start_line,
            col: start.start_col,
            previous: None,
        }
    }

    /// Lex the entire expression. The stream always ends with [`TokenKind::Eof`].
    pub fn lex(mut self) -> hrml_types::Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan()?;
            let is_eof = token.kind == TokenKind::Eof;
            self.previous = Some(token.kind.clone());
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // continuation bytes do not start a new column
            self.col += 1;
        }
        Some(ch)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(start_line, start_col, self.line, self.col)
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>, span: Span) -> TemplateError {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        TemplateError::new(&self.source_file.name, code, message, span, source_line)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────────

    fn scan(&mut self) -> hrml_types::Result<Token> {
        self.skip_whitespace();

        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, Span::point(self.line, self.col)));
        };

        let kind = match ch {
            b'0'..=b'9' => self.scan_number(start),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(start),
            b'\'' | b'"' => self.scan_string(ch, start_line, start_col)?,

            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,

            b'=' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::EqEq
            }
            b'!' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::BangEq
            }
            b'!' => TokenKind::Not,
            b'<' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::LessEq
            }
            b'<' => TokenKind::Less,
            b'>' if self.peek() == Some(b'=') => {
                self.advance();
                TokenKind::GreaterEq
            }
            b'>' => TokenKind::Greater,
            b'&' if self.peek() == Some(b'&') => {
                self.advance();
                TokenKind::And
            }
            b'|' if self.peek() == Some(b'|') => {
                self.advance();
                TokenKind::Or
            }

            b'=' => {
                return Err(self.error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "unexpected '='; use '==' to compare values",
                    self.span_from(start_line, start_col),
                ));
            }
            _ => {
                let found = self.text[start..].chars().next().unwrap_or('?');
                return Err(self.error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected character '{found}'"),
                    self.span_from(start_line, start_col),
                ));
            }
        };

        Ok(Token::new(kind, self.span_from(start_line, start_col)))
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }

        // After a `.` this is a list index (`items.0.name`), never a decimal.
        let after_dot = self.previous == Some(TokenKind::Dot);
        if !after_dot && self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9'))
        {
            self.advance(); // consume '.'
            while let Some(b'0'..=b'9') = self.peek() {
                self.advance();
            }
        }

        let value: f64 = self.text[start..self.pos].parse().unwrap_or(0.0);
        TokenKind::Number(value)
    }

    fn scan_identifier(&mut self, start: usize) -> TokenKind {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.text[start..self.pos];
        TokenKind::from_keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
    }

    fn scan_string(
        &mut self,
        quote: u8,
        start_line: u32,
        start_col: u32,
    ) -> hrml_types::Result<TokenKind> {
        let mut buf = Vec::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        self.span_from(start_line, start_col),
                    ));
                }
                Some(ch) if ch == quote => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => buf.push(b'\n'),
                    Some(b't') => buf.push(b'\t'),
                    Some(b'r') => buf.push(b'\r'),
                    Some(other) => buf.push(other),
                    None => {
                        return Err(self.error(
                            ErrorCode::UNTERMINATED_STRING,
                            "unterminated string literal",
                            self.span_from(start_line, start_col),
                        ));
                    }
                },
                Some(ch) => buf.push(ch),
            }
        }
        Ok(TokenKind::String(String::from_utf8_lossy(&buf).into_owned()))
    }
}
