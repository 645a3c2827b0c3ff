//! Template source providers.
//!
//! A provider maps a template path to its parsed [`SyntaxTree`], parsing each
//! source once and handing out shared trees afterwards. Providers are shared
//! between concurrent renders, so they are `Send + Sync` and cache in a
//! [`DashMap`].

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use hrml_parser::parse_template;
use hrml_types::ast::SyntaxTree;

use crate::error::ComposeError;

/// Supplies parsed templates by path.
pub trait SourceProvider: Send + Sync {
    /// The parsed template at `path` (already normalised).
    fn get(&self, path: &str) -> Result<Arc<SyntaxTree>, ComposeError>;

    /// Forget any cached parse of `path`.
    fn invalidate(&self, _path: &str) {}

    /// Forget every cached parse.
    fn clear(&self) {}
}

/// Canonical form of a template path: relative to the template root,
/// `/`-separated, without `.` segments.
///
/// `"/layouts/./base.hrml"` and `"layouts/base.hrml"` name the same template.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// ══════════════════════════════════════════════════════════════════════════════
// Filesystem
// ══════════════════════════════════════════════════════════════════════════════

/// Reads templates from a directory tree.
pub struct FileSystemSource {
    root: PathBuf,
    trees: DashMap<String, Arc<SyntaxTree>>,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            trees: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `path`, or `None` if it would escape the root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        (!escapes).then(|| self.root.join(relative))
    }
}

impl SourceProvider for FileSystemSource {
    fn get(&self, path: &str) -> Result<Arc<SyntaxTree>, ComposeError> {
        if let Some(tree) = self.trees.get(path) {
            return Ok(Arc::clone(&tree));
        }

        let not_found = || ComposeError::SourceNotFound {
            path: path.to_string(),
        };
        let file = self.resolve(path).ok_or_else(not_found)?;
        let text = match std::fs::read_to_string(&file) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(source) => {
                return Err(ComposeError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };

        let tree = Arc::new(parse_template(path, &text)?);
        tracing::debug!(path, file = %file.display(), "parsed template");
        self.trees.insert(path.to_string(), Arc::clone(&tree));
        Ok(tree)
    }

    fn invalidate(&self, path: &str) {
        self.trees.remove(path);
    }

    fn clear(&self) {
        self.trees.clear();
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// In-memory
// ══════════════════════════════════════════════════════════════════════════════

/// Holds template sources in memory. Used for embedding and in tests.
#[derive(Default)]
pub struct MemorySource {
    sources: DashMap<String, Arc<str>>,
    trees: DashMap<String, Arc<SyntaxTree>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with(self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    /// Add or replace a template. A replaced template is re-parsed on next use.
    pub fn insert(&self, path: &str, source: &str) {
        let path = normalize_path(path);
        self.trees.remove(&path);
        self.sources.insert(path, Arc::from(source));
    }

    /// Remove a template.
    pub fn remove(&self, path: &str) {
        let path = normalize_path(path);
        self.trees.remove(&path);
        self.sources.remove(&path);
    }
}

impl SourceProvider for MemorySource {
    fn get(&self, path: &str) -> Result<Arc<SyntaxTree>, ComposeError> {
        if let Some(tree) = self.trees.get(path) {
            return Ok(Arc::clone(&tree));
        }
        let source = self
            .sources
            .get(path)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| ComposeError::SourceNotFound {
                path: path.to_string(),
            })?;
        let tree = Arc::new(parse_template(path, &source)?);
        self.trees.insert(path.to_string(), Arc::clone(&tree));
        Ok(tree)
    }

    fn invalidate(&self, path: &str) {
        self.trees.remove(path);
    }

    fn clear(&self) {
        self.trees.clear();
    }
}
