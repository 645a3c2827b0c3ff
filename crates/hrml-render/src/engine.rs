//! The render entry point.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use hrml_compose::{Composer, FileSystemSource, SourceProvider};
use hrml_eval::Environment;
use hrml_types::Value;

use crate::asset::AssetResolver;
use crate::cache::CallCache;
use crate::config::EngineConfig;
use crate::error::{ConfigError, RenderError};
use crate::invoker::{EndpointInvoker, NoInvoker};
use crate::page::wrap_page;
use crate::renderer::{Renderer, Services};
use crate::style::StyleRegistry;
use crate::warning::Warning;

/// The result of one render.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub output: String,
    /// Collected style fragments, de-duplicated, in first-use order.
    pub styles: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Rendered {
    /// The collected styles as one stylesheet.
    pub fn stylesheet(&self) -> String {
        self.styles.join("\n")
    }
}

/// Renders templates.
///
/// An engine is shared between threads; every render walks its own copy of
/// the variable scopes while the composed trees, style tokens, cached call
/// results and asset digests are shared.
///
/// ```no_run
/// use hrml_render::{Engine, EngineConfig};
/// use hrml_types::Value;
///
/// let engine = Engine::new(EngineConfig::default()).production(true);
/// let page = engine.render_page("index.hrml", &Value::Null)?;
/// println!("{}", page.output);
/// # Ok::<(), hrml_render::RenderError>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    composer: Composer,
    styles: Arc<StyleRegistry>,
    calls: Arc<CallCache>,
    invoker: Arc<dyn EndpointInvoker>,
    assets: AssetResolver,
}

impl Engine {
    /// An engine reading templates from `config.paths.templates`.
    pub fn new(config: EngineConfig) -> Self {
        let source = Arc::new(FileSystemSource::new(config.paths.templates.clone()));
        Self::with_source(config, source)
    }

    /// An engine reading templates from `source`.
    pub fn with_source(config: EngineConfig, source: Arc<dyn SourceProvider>) -> Self {
        let assets = AssetResolver::new(
            config.render.static_url.clone(),
            config.paths.static_dir.clone(),
        );
        Self {
            composer: Composer::new(source),
            styles: Arc::new(StyleRegistry::new()),
            calls: Arc::new(CallCache::new()),
            invoker: Arc::new(NoInvoker),
            assets,
            config,
        }
    }

    /// An engine configured by the `hrml.toml` at `path`. Relative template
    /// and static directories are taken relative to the file's directory.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = EngineConfig::load(path)?;
        if let Some(root) = path.parent() {
            config.paths.templates = root.join(&config.paths.templates);
            config.paths.static_dir = root.join(&config.paths.static_dir);
        }
        Ok(Self::new(config))
    }

    // ── Builder overrides ────────────────────────────────────────────────

    pub fn with_invoker(mut self, invoker: Arc<dyn EndpointInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_style_registry(mut self, styles: Arc<StyleRegistry>) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_call_cache(mut self, calls: Arc<CallCache>) -> Self {
        self.calls = calls;
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.config.render.production = production;
        self
    }

    pub fn escape_by_default(mut self, escape: bool) -> Self {
        self.config.render.escape = escape;
        self
    }

    pub fn site_name(mut self, name: impl Into<String>) -> Self {
        self.config.site.name = name.into();
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn style_registry(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn call_cache(&self) -> &CallCache {
        &self.calls
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering
    // ══════════════════════════════════════════════════════════════════════

    /// Render `entry` with `context` (a map, or null for none) as the
    /// request scope.
    pub fn render(&self, entry: &str, context: &Value) -> Result<Rendered, RenderError> {
        let tree = self.composer.compose(entry)?;
        let env = self.environment(context)?;
        let services = Services {
            styles: &self.styles,
            calls: &self.calls,
            invoker: self.invoker.as_ref(),
            assets: &self.assets,
            production: self.config.render.production,
            escape: self.config.render.escape,
        };
        let output = Renderer::new(services, env).render(&tree.nodes)?;
        tracing::debug!(
            entry = %tree.entry,
            bytes = output.html.len(),
            styles = output.styles.len(),
            warnings = output.warnings.len(),
            "rendered template"
        );
        Ok(Rendered {
            output: output.html,
            styles: output.styles,
            warnings: output.warnings,
        })
    }

    /// [`Engine::render`] wrapped in the full page shell, with the collected
    /// styles in the head.
    pub fn render_page(&self, entry: &str, context: &Value) -> Result<Rendered, RenderError> {
        let mut rendered = self.render(entry, context)?;
        rendered.output = wrap_page(
            &self.config.site,
            &self.config.render,
            &rendered.output,
            &rendered.styles,
        );
        Ok(rendered)
    }

    /// Forget `path` and every composed tree built from it.
    pub fn invalidate(&self, path: &str) {
        self.composer.invalidate(path);
        self.assets.invalidate(path);
    }

    /// Forget every parsed template, composed tree, cached call and asset digest.
    pub fn clear(&self) {
        self.composer.clear();
        self.calls.clear();
        self.assets.clear();
    }

    /// Site constants below the request context.
    fn environment(&self, context: &Value) -> Result<Environment, RenderError> {
        let site = &self.config.site;
        let mut constants = BTreeMap::new();
        constants.insert("site_name".to_string(), Value::from(site.name.as_str()));
        constants.insert(
            "site_description".to_string(),
            site.description
                .as_deref()
                .map_or(Value::Null, Value::from),
        );

        let mut env = Environment::new();
        env.push_map(constants);
        match context {
            Value::Map(fields) => env.push_map(fields.clone()),
            Value::Null => {}
            other => return Err(RenderError::Context(other.type_name())),
        }
        Ok(env)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cached_trees", &self.composer.cached())
            .field("cached_calls", &self.calls.len())
            .finish_non_exhaustive()
    }
}
