//! Markup lexer: splits template text into literal text and
//! processing-instruction segments.
//!
//! Recognised markers:
//! - `<?name attr="value" flag?>` opens an instruction (`/?>` is accepted too)
//! - `<?/name?>` and the legacy `</?name?>` close one
//!
//! Only names in [`INSTRUCTION_NAMES`] are instructions. Anything else that
//! looks like a marker (`<?xml version="1.0"?>`) stays literal text. The
//! lexer knows nothing about nesting; pairing opens with closes is the
//! parser's job.

use hrml_types::{ErrorCode, SourceFile, Span, TemplateError};

/// Every processing-instruction name the engine understands.
pub const INSTRUCTION_NAMES: &[&str] = &[
    // Self-closing
    "load", "get", "asset", "json",
    // Block-form
    "set", "if", "else", "for", "slot", "block", "call", "error", "style", "script",
    // Action directives
    "btn", "link", "form",
];

/// One lexed piece of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text between instructions.
    Text { text: String, span: Span },
    /// An opening instruction.
    Open(Instruction),
    /// A closing marker.
    Close { name: String, span: Span },
}

/// An opening processing instruction with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub span: Span,
}

impl Instruction {
    /// Value of the first attribute with this name.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// `true` if the attribute is present, with or without a value.
    pub fn has_flag(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

/// A single `key="value"` pair, or a bare `key` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    /// Span of the attribute name.
    pub span: Span,
    /// Position of the first character inside the quotes.
    pub value_start: Option<Span>,
}

/// The markup lexer. Segments are pulled one at a time with
/// [`MarkupLexer::next_segment`].
pub struct MarkupLexer<'src> {
    /// The full template text.
    text: &'src str,
    /// The template text as bytes.
    source: &'src [u8],
    /// Source file for error reporting.
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
}

impl<'src> MarkupLexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            text: &source_file.source,
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Lex the next segment, or `None` at end of input.
    pub fn next_segment(&mut self) -> hrml_types::Result<Option<Segment>> {
        if self.at_end() {
            return Ok(None);
        }
        if let Some(name) = self.close_marker_at(self.pos) {
            return self.scan_close(name).map(Some);
        }
        if let Some(name) = self.open_marker_at(self.pos) {
            return self.scan_open(name).map(|i| Some(Segment::Open(i)));
        }
        Ok(Some(self.scan_text()))
    }

    /// Consume raw text up to and including the close marker for `name`.
    ///
    /// Used for instructions whose body is not markup (`<?style?>`). Nothing
    /// inside is interpreted.
    pub fn raw_until_close(&mut self, name: &str, opened_at: Span) -> hrml_types::Result<String> {
        let start = self.pos;
        while !self.at_end() {
            if self.close_marker_at(self.pos) == Some(name) {
                let text = self.text[start..self.pos].to_string();
                self.scan_close(name)?;
                return Ok(text);
            }
            self.advance();
        }
        Err(self.error(
            ErrorCode::UNCLOSED_INSTRUCTION,
            format!("unclosed <?{name}?>: reached end of input before <?/{name}?>"),
            opened_at,
        ))
    }

    /// Current position, for callers reporting end-of-input errors.
    pub fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            self.col += 1;
        }
        Some(ch)
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn starts_with_at(&self, pos: usize, s: &str) -> bool {
        self.source[pos.min(self.source.len())..].starts_with(s.as_bytes())
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
    // Marker detection
    // ─────────────────────────────────────────────────────────────

    /// Known instruction name starting at `pos`, followed by a delimiter.
    fn known_name_at(&self, pos: usize) -> Option<&'static str> {
        INSTRUCTION_NAMES.iter().copied().find(|name| {
            self.starts_with_at(pos, name)
                && matches!(
                    self.source.get(pos + name.len()),
                    Some(b' ' | b'\t' | b'\r' | b'\n' | b'?' | b'/')
                )
        })
    }

    fn open_marker_at(&self, pos: usize) -> Option<&'static str> {
        if self.starts_with_at(pos, "<?") {
            self.known_name_at(pos + 2)
        } else {
            None
        }
    }

    fn close_marker_at(&self, pos: usize) -> Option<&'static str> {
        if self.starts_with_at(pos, "<?/") || self.starts_with_at(pos, "</?") {
            self.known_name_at(pos + 3)
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Segment scanners
    // ─────────────────────────────────────────────────────────────

    fn scan_text(&mut self) -> Segment {
        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        self.advance();
        while !self.at_end()
            && self.open_marker_at(self.pos).is_none()
            && self.close_marker_at(self.pos).is_none()
        {
            self.advance();
        }
        Segment::Text {
            text: self.text[start..self.pos].to_string(),
            span: self.span_from(start_line, start_col),
        }
    }

    fn scan_close(&mut self, name: &str) -> hrml_types::Result<Segment> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance_by(3 + name.len());
        self.skip_whitespace();
        if self.starts_with_at(self.pos, "?>") {
            self.advance_by(2);
            Ok(Segment::Close {
                name: name.to_string(),
                span: self.span_from(start_line, start_col),
            })
        } else {
            Err(self.error(
                ErrorCode::UNEXPECTED_INPUT,
                format!("expected '?>' to end <?/{name}?>"),
                self.span_from(start_line, start_col),
            ))
        }
    }

    fn scan_open(&mut self, name: &'static str) -> hrml_types::Result<Instruction> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance_by(2 + name.len());

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            if self.starts_with_at(self.pos, "?>") {
                self.advance_by(2);
                break;
            }
            if self.starts_with_at(self.pos, "/?>") {
                self.advance_by(3);
                break;
            }
            match self.peek() {
                None => {
                    return Err(self.error(
                        ErrorCode::UNCLOSED_INSTRUCTION,
                        format!("unterminated <?{name}: expected '?>'"),
                        self.span_from(start_line, start_col),
                    ));
                }
                Some(ch) if is_attr_name_byte(ch) => attrs.push(self.scan_attribute(name)?),
                Some(_) => {
                    let found = self.text[self.pos..].chars().next().unwrap_or('?');
                    return Err(self.error(
                        ErrorCode::UNEXPECTED_INPUT,
                        format!("unexpected character '{found}' in <?{name}?>"),
                        Span::point(self.line, self.col),
                    ));
                }
            }
        }

        Ok(Instruction {
            name: name.to_string(),
            attrs,
            span: self.span_from(start_line, start_col),
        })
    }

    fn scan_attribute(&mut self, instruction: &str) -> hrml_types::Result<Attribute> {
        let start_line = self.line;
        let start_col = self.col;
        let start = self.pos;
        while self.peek().is_some_and(is_attr_name_byte) {
            self.advance();
        }
        let name = self.text[start..self.pos].to_string();
        let span = self.span_from(start_line, start_col);

        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            return Ok(Attribute {
                name,
                value: None,
                span,
                value_start: None,
            });
        }
        self.advance(); // consume '='
        self.skip_whitespace();

        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => {
                return Err(self.error(
                    ErrorCode::UNQUOTED_ATTRIBUTE,
                    format!("value of '{name}' in <?{instruction}?> must be quoted"),
                    span,
                ));
            }
        };
        self.advance();
        let value_start = Span::point(self.line, self.col);
        let value_pos = self.pos;
        while self.peek().is_some_and(|ch| ch != quote) {
            self.advance();
        }
        if self.at_end() {
            return Err(self.error(
                ErrorCode::UNCLOSED_INSTRUCTION,
                format!("unterminated value of '{name}' in <?{instruction}?>"),
                span,
            ));
        }
        let value = self.text[value_pos..self.pos].to_string();
        self.advance(); // closing quote

        Ok(Attribute {
            name,
            value: Some(value),
            span,
            value_start: Some(value_start),
        })
    }
}

fn is_attr_name_byte(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, b'_' | b'-' | b':' | b'@' | b'.')
}
