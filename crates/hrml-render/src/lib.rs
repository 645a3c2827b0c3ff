//! HRML renderer.
//!
//! ```text
//! template → parse → compose (loads, slots/blocks) → render → (html, styles, warnings)
//! ```
//!
//! [`Engine`] is the entry point: it owns the composer, the shared style
//! registry, the call cache and the endpoint invoker, and runs one
//! independent tree walk per [`Engine::render`] call.

mod asset;
mod cache;
mod config;
mod engine;
mod error;
mod invoker;
mod page;
mod renderer;
pub mod style;
mod warning;

pub use asset::AssetResolver;
pub use cache::{CallCache, CallKey};
pub use config::{EngineConfig, PathsConfig, RenderConfig, SiteConfig};
pub use engine::{Engine, Rendered};
pub use error::{ConfigError, RenderError};
pub use invoker::{EndpointInvoker, InvocationError, InvocationErrorKind, NoInvoker};
pub use page::{script_safe_json, wrap_page};
pub use style::StyleRegistry;
pub use warning::{Warning, WarningKind};
