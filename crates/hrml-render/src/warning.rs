//! Non-fatal render diagnostics.

use std::fmt;

use hrml_types::Location;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// A `<?get?>` or `<?json?>` value resolved to nothing.
    MissingValue,
    /// An endpoint invocation failed or timed out.
    CallFailed,
    /// An asset could not be read to compute its digest.
    AssetUnresolved,
}

/// A recoverable problem met while rendering. The output is still valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>, location: &Location) -> Self {
        Self {
            kind,
            message: message.into(),
            file: location.file.to_string(),
            line: location.span.start_line,
            column: location.span.start_col,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {:?}: {}",
            self.file, self.line, self.column, self.kind, self.message
        )
    }
}
