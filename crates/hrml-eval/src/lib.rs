//! HRML expression engine.
//!
//! Evaluates parsed attribute expressions against a scoped variable
//! [`Environment`]. Missing variables resolve to null rather than failing;
//! operator misuse and bad builtin arguments are [`EvalError`]s.

pub mod builtins;
mod env;
mod error;
mod evaluator;

pub use builtins::{escape_html, Builtin};
pub use env::Environment;
pub use error::{EvalError, EvalResult};
pub use evaluator::{evaluate, Evaluator};
