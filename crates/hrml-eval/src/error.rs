//! Evaluation error types.

use thiserror::Error;

/// An expression evaluation failure.
///
/// These indicate an authoring bug (comparing a list with a number, calling
/// a function that does not exist) rather than a data-shape issue, so the
/// renderer treats them as fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operator applied to operands of the wrong types.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Call to a name outside the builtin registry.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// Builtin called with the wrong number or types of arguments.
    #[error("{function}(): {message}")]
    ArgumentType { function: String, message: String },
    /// `/` or `%` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
