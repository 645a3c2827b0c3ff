//! Composition error types.

use hrml_types::TemplateError;
use thiserror::Error;

/// A fatal composition failure. No render is attempted after one of these.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A template failed to parse.
    #[error(transparent)]
    Parse(#[from] TemplateError),
    /// A template includes itself, directly or transitively.
    #[error("cyclic include: {}", .chain.join(" -> "))]
    CyclicInclude {
        /// The inclusion chain, starting and ending with the repeated path.
        chain: Vec<String>,
    },
    /// The source provider has no template at this path.
    #[error("template not found: {path}")]
    SourceNotFound { path: String },
    /// The template exists but could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ComposeError {
    /// Template path the error points at, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Parse(err) => Some(&err.file),
            Self::CyclicInclude { chain } => chain.first().map(String::as_str),
            Self::SourceNotFound { path } | Self::Io { path, .. } => Some(path),
        }
    }
}
