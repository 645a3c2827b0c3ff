//! Project configuration (`hrml.toml`).
//!
//! ```toml
//! [paths]
//! templates = "templates"
//! static = "static"
//!
//! [site]
//! name = "My Site"
//! description = "..."
//! favicon = "/static/favicon.ico"
//!
//! [render]
//! production = true
//! ```
//!
//! Every key is optional. Tables the engine does not use (`[server]`,
//! `[database]`, ...) are ignored so one file can serve the whole application.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub paths: PathsConfig,
    pub site: SiteConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), site = %config.site.name, "loaded configuration");
        Ok(config)
    }
}

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Template root; load paths are relative to it.
    pub templates: PathBuf,
    /// Directory `<?asset?>` paths are read from for cache-busting digests.
    #[serde(rename = "static")]
    pub static_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// `[site]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub description: Option<String>,
    pub favicon: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "HRML App".to_string(),
            description: None,
            favicon: None,
        }
    }
}

/// `[render]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Enables asset cache-busting and logs warnings at `warn` level.
    pub production: bool,
    /// HTML-escape `<?get?>` output unless the value is tagged safe.
    pub escape: bool,
    /// Public URL prefix for `<?asset?>` paths.
    pub static_url: String,
    /// Stylesheet linked from the page shell.
    pub stylesheet: String,
    /// Client-side partial-update script linked from the page shell.
    pub client_script: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            production: false,
            escape: true,
            static_url: "/static/".to_string(),
            stylesheet: "/static/css/style.css".to_string(),
            client_script: "/hrml.js".to_string(),
        }
    }
}
