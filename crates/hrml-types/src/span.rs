use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A line/column range in a template, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "line")]
    pub start_line: u32,
    #[serde(rename = "column")]
    pub start_col: u32,
    pub end_line: u32,
    #[serde(rename = "end_column")]
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Zero-width span at one position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// The smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) =
            (self.start_line, self.start_col).min((other.start_line, other.start_col));
        let (end_line, end_col) = (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Span::new(start_line, start_col, end_line, end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A span inside a named template file.
///
/// Every processing-instruction node carries one so that warnings and
/// render-time errors can point back at the template that produced them,
/// even after composition has moved the node into another file's tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: Arc<str>,
    pub span: Span,
}

impl Location {
    pub fn new(file: Arc<str>, span: Span) -> Self {
        Self { file, span }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.span)
    }
}

/// One template's path and text, kept for error reporting.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// The text of 1-based line `line_number`, without its line ending.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)?;
        self.source.lines().nth(idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_orders_by_position() {
        let attr = Span::new(2, 3, 2, 8);
        let name = Span::new(1, 5, 1, 10);
        assert_eq!(attr.merge(name), Span::new(1, 5, 2, 8));
        assert_eq!(Span::point(1, 3).merge(name), Span::new(1, 3, 1, 10));
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new(Arc::from("pages/index.hrml"), Span::new(3, 7, 3, 15));
        assert_eq!(loc.to_string(), "pages/index.hrml:3:7");
    }

    #[test]
    fn test_source_lines() {
        let src = SourceFile::new("page.hrml", "<p>\r\n  <?get id=\"x\"?>\n</p>");
        assert_eq!(src.line(1), Some("<p>"));
        assert_eq!(src.line(2), Some("  <?get id=\"x\"?>"));
        assert_eq!(src.line(3), Some("</p>"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(SourceFile::new("empty.hrml", "").line(1), None);
    }
}
