//! Shared types for the HRML template engine.
//!
//! This crate defines the syntax tree node types, source spans, the runtime
//! [`Value`] model and the structured syntax error type used across all
//! engine stages.

mod error;
mod span;
mod value;
pub mod ast;

pub use error::{ErrorCategory, ErrorCode, TemplateError};
pub use span::{Location, SourceFile, Span};
pub use value::Value;

/// Result type used by the parsing stages.
pub type Result<T> = std::result::Result<T, TemplateError>;
