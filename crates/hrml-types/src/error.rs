use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed processing instructions and block structure.
    Markup,
    /// Malformed attribute expressions.
    Expression,
}

/// Numeric error code (E100–E199).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Markup errors (E100–E149) ──
    pub const UNEXPECTED_INPUT: Self = Self(100);
    pub const UNCLOSED_INSTRUCTION: Self = Self(101);
    pub const DANGLING_ELSE: Self = Self(102);
    pub const MISSING_ATTRIBUTE: Self = Self(103);
    pub const UNQUOTED_ATTRIBUTE: Self = Self(104);
    pub const UNEXPECTED_CLOSE: Self = Self(105);
    pub const MISPLACED_INSTRUCTION: Self = Self(106);
    pub const INVALID_ATTRIBUTE: Self = Self(107);

    // ── Expression errors (E150–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(150);
    pub const UNTERMINATED_STRING: Self = Self(151);
    pub const NESTING_LIMIT_EXCEEDED: Self = Self(152);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            150..=199 => ErrorCategory::Expression,
            _ => ErrorCategory::Markup,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markup => write!(f, "markup"),
            Self::Expression => write!(f, "expression"),
        }
    }
}

/// A structured template syntax error.
///
/// Parse errors are fatal: they abort composition before any render is
/// attempted, so they always carry the file, position and offending line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateError {
    /// Template path.
    pub file: String,
    /// Error code (e.g., E102).
    pub code: ErrorCode,
    /// Error category (derived from code).
    pub category: ErrorCategory,
    /// Human-readable error message.
    pub message: String,
    /// Source location.
    #[serde(flatten)]
    pub span: Span,
    /// The exact source line for context.
    pub source_line: String,
}

impl TemplateError {
    /// Create a new error.
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }

    /// Returns `true` for an `<?else?>` that does not follow an If.
    pub fn is_dangling_else(&self) -> bool {
        self.code == ErrorCode::DANGLING_ELSE
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for TemplateError {}
