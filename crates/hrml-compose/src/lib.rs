//! HRML composer.
//!
//! Turns an entry template into a single [`RenderTree`]: every `<?load?>` is
//! replaced by its target's nodes, each file's top-level blocks fill the
//! slots of the files it loads, and include cycles are rejected. Composed
//! trees are cached per entry until invalidated.

mod composer;
mod error;
mod source;

pub use composer::{Composer, RenderTree};
pub use error::ComposeError;
pub use source::{normalize_path, FileSystemSource, MemorySource, SourceProvider};
