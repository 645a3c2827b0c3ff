//! Static asset URLs.

use std::io;
use std::path::{Component, Path, PathBuf};

use dashmap::DashMap;
use hrml_compose::normalize_path;
use sha2::{Digest, Sha256};

/// Hex digits of the content digest appended in production.
const VERSION_LEN: usize = 8;

/// Maps `<?asset path="..."?>` paths to public URLs.
///
/// Content digests for cache-busting are computed once per path and kept
/// for the life of the resolver; [`AssetResolver::invalidate`] forgets one.
#[derive(Debug)]
pub struct AssetResolver {
    static_url: String,
    root: PathBuf,
    digests: DashMap<String, String>,
}

impl AssetResolver {
    pub fn new(static_url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            static_url: static_url.into(),
            root: root.into(),
            digests: DashMap::new(),
        }
    }

    /// Public URL of `path`, unchanged apart from the prefix.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.static_url.trim_end_matches('/'),
            normalize_path(path)
        )
    }

    /// Public URL of `path` with a `?v=` content digest.
    pub fn versioned_url(&self, path: &str) -> io::Result<String> {
        let path = normalize_path(path);
        let version = match self.digests.get(&path) {
            Some(digest) => digest.clone(),
            None => {
                let digest = self.digest(&path)?;
                self.digests.insert(path.clone(), digest.clone());
                digest
            }
        };
        Ok(format!("{}?v={version}", self.url(&path)))
    }

    /// Forget the digest of `path` so the next versioned URL re-reads it.
    pub fn invalidate(&self, path: &str) {
        self.digests.remove(&normalize_path(path));
    }

    pub fn clear(&self) {
        self.digests.clear();
    }

    fn digest(&self, path: &str) -> io::Result<String> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "asset path leaves the static directory",
            ));
        }
        let bytes = std::fs::read(self.root.join(relative))?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Ok(digest[..VERSION_LEN].to_string())
    }
}
