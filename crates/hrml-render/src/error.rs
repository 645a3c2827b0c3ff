//! Render and configuration error types.

use std::path::PathBuf;

use hrml_compose::ComposeError;
use hrml_eval::EvalError;
use hrml_types::Location;
use thiserror::Error;

/// A fatal render failure.
///
/// Missing values, failed calls and unresolved assets are not errors; they
/// are reported as [`Warning`](crate::Warning)s next to the output.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Parsing or composition failed before anything was rendered.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// An expression failed to evaluate.
    #[error("{location}: {source} (in `{expression}`)")]
    Eval {
        location: Location,
        expression: String,
        #[source]
        source: EvalError,
    },
    /// Includes nested the composed tree deeper than the renderer walks.
    #[error("composed template nests more than {0} levels deep")]
    NestingLimit(usize),
    /// The request context was not a map.
    #[error("render context must be a map, got {0}")]
    Context(&'static str),
}

impl RenderError {
    /// Where in which template the error occurred, when known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Eval { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// Failure to load an `hrml.toml` project file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
