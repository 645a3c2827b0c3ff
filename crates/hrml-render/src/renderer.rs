//! Render-tree walk.
//!
//! One [`Renderer`] per render: a single depth-first pass over the composed
//! nodes with a private scope stack, accumulating output text, collected
//! style fragments and warnings. Shared state (style tokens, cached call
//! results, asset digests) is reached through [`Services`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hrml_eval::{escape_html, evaluate, Environment};
use hrml_types::ast::{
    Action, ActionKind, Asset, Call, Expression, For, Get, Json, Node, Script, Style, Text,
};
use hrml_types::{Location, Value};

use crate::asset::AssetResolver;
use crate::cache::{CallCache, CallKey};
use crate::error::RenderError;
use crate::invoker::EndpointInvoker;
use crate::page::script_safe_json;
use crate::style::{rewrite_class_attributes, rewrite_css, StyleRegistry};
use crate::warning::{Warning, WarningKind};

/// Class of a `<?btn?>` that names none.
const DEFAULT_BUTTON_CLASS: &str = "btn btn-primary";

/// Deepest nesting of containers in a composed tree. Each file is bounded
/// by the parser; this bounds nesting built up across includes.
pub(crate) const MAX_RENDER_DEPTH: usize = 128;

/// Engine-wide collaborators and flags a render reads.
pub(crate) struct Services<'a> {
    pub styles: &'a StyleRegistry,
    pub calls: &'a CallCache,
    pub invoker: &'a dyn EndpointInvoker,
    pub assets: &'a AssetResolver,
    pub production: bool,
    pub escape: bool,
}

/// What one render produced.
pub(crate) struct Output {
    pub html: String,
    pub styles: Vec<String>,
    pub warnings: Vec<Warning>,
}

pub(crate) struct Renderer<'a> {
    services: Services<'a>,
    env: Environment,
    /// Style tokens already fetched during this render.
    tokens: HashMap<Arc<str>, String>,
    styles: Vec<String>,
    seen_styles: HashSet<String>,
    warnings: Vec<Warning>,
    /// Containers currently being rendered.
    depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(services: Services<'a>, env: Environment) -> Self {
        Self {
            services,
            env,
            tokens: HashMap::new(),
            styles: Vec::new(),
            seen_styles: HashSet::new(),
            warnings: Vec::new(),
            depth: 0,
        }
    }

    pub fn render(mut self, nodes: &[Node]) -> Result<Output, RenderError> {
        let mut html = String::new();
        self.render_nodes(nodes, &mut html)?;
        Ok(Output {
            html,
            styles: self.styles,
            warnings: self.warnings,
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Node walk
    // ══════════════════════════════════════════════════════════════════════

    /// Render a container's children.
    ///
    /// Bindings made by `set` and `call` last until the end of the
    /// container and are released here on every exit path.
    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), RenderError> {
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(RenderError::NestingLimit(MAX_RENDER_DEPTH));
        }
        self.depth += 1;
        let scopes = self.env.depth();
        let result = nodes
            .iter()
            .try_for_each(|node| self.render_node(node, out));
        self.env.truncate(scopes);
        self.depth -= 1;
        result
    }

    fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), RenderError> {
        match node {
            Node::Text(text) => self.render_text(text, out),
            Node::Set(set) => {
                let mut captured = String::new();
                self.render_nodes(&set.children, &mut captured)?;
                let value = Value::from_captured_text(&captured).unwrap_or(Value::Safe(captured));
                self.bind(&set.id, value);
            }
            Node::Get(get) => self.render_get(get, out)?,
            Node::If(node) => {
                if self.eval(&node.condition, &node.loc)?.is_truthy() {
                    self.render_nodes(&node.then_branch, out)?;
                } else if let Some(else_branch) = &node.else_branch {
                    self.render_nodes(else_branch, out)?;
                }
            }
            Node::For(node) => self.render_for(node, out)?,
            Node::Call(call) => self.render_call(call, out)?,
            Node::Style(style) => self.collect_style(style),
            Node::Script(script) => self.render_script(script, out)?,
            Node::Json(json) => self.render_json(json, out)?,
            Node::Asset(asset) => self.render_asset(asset, out),
            Node::Action(action) => self.render_action(action, out)?,
            // composition resolves these; a bare tree renders slot defaults
            Node::Slot(slot) => self.render_nodes(&slot.children, out)?,
            Node::Block(_) | Node::Load(_) => {}
        }
        Ok(())
    }

    fn render_text(&mut self, text: &Text, out: &mut String) {
        match &text.scope {
            Some(scope) => {
                let token = self.token(&scope.component);
                out.push_str(&rewrite_class_attributes(&text.text, &scope.classes, &token));
            }
            None => out.push_str(&text.text),
        }
    }

    fn render_get(&mut self, get: &Get, out: &mut String) -> Result<(), RenderError> {
        let value = self.eval(&get.value, &get.loc)?;
        if !value.is_null() {
            self.write_value(&value, get.raw, out);
            return Ok(());
        }
        match &get.default {
            // template text, emitted as written
            Some(default) => out.push_str(default),
            None => self.warn(
                WarningKind::MissingValue,
                format!("no value for `{}`", get.value.source),
                &get.loc,
            ),
        }
        Ok(())
    }

    fn render_for(&mut self, node: &For, out: &mut String) -> Result<(), RenderError> {
        let items = match self.eval(&node.iterable, &node.loc)? {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        };

        for (i, item) in items.into_iter().enumerate() {
            let depth = self.env.depth();
            self.env.push_scope();
            self.env.define(&node.item, item);
            if let Some(index) = &node.index {
                self.env.define(index, Value::Number(i as f64));
            }
            let result = self.render_nodes(&node.body, out);
            self.env.truncate(depth);
            result?;
        }
        Ok(())
    }

    fn render_call(&mut self, call: &Call, out: &mut String) -> Result<(), RenderError> {
        let mut args = BTreeMap::new();
        for (name, expr) in &call.args {
            args.insert(name.clone(), self.eval(expr, &call.loc)?);
        }

        let ttl = call
            .cache_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);
        let key = ttl.map(|_| CallKey::new(&call.endpoint, &call.method, &args));

        let cached = key.as_ref().and_then(|key| self.services.calls.get(key));
        let result = match cached {
            Some(value) => {
                tracing::trace!(endpoint = %call.endpoint, method = %call.method, "call cache hit");
                Ok(value)
            }
            None => {
                let result = self
                    .services
                    .invoker
                    .call(&call.endpoint, &call.method, &args);
                if let (Ok(value), Some(key), Some(ttl)) = (&result, key, ttl) {
                    self.services.calls.insert(key, value.clone(), ttl);
                }
                result
            }
        };

        match result {
            Ok(value) => {
                self.bind(&call.as_name, value);
                self.render_nodes(&call.body, out)
            }
            Err(err) => {
                self.warn(
                    WarningKind::CallFailed,
                    format!("{} {} failed: {err}", call.method, call.endpoint),
                    &call.loc,
                );
                let Some(on_error) = &call.on_error else {
                    return Ok(());
                };
                let depth = self.env.depth();
                self.bind("error", err.to_value());
                let result = self.render_nodes(on_error, out);
                self.env.truncate(depth);
                result
            }
        }
    }

    fn collect_style(&mut self, style: &Style) {
        let css = if style.scoped {
            let token = self.token(&style.loc.file);
            rewrite_css(&style.css, &token)
        } else {
            style.css.clone()
        };
        if self.seen_styles.insert(css.clone()) {
            self.styles.push(css);
        }
    }

    fn render_script(&mut self, script: &Script, out: &mut String) -> Result<(), RenderError> {
        out.push_str("<script");
        for (name, value) in &script.attrs {
            match value {
                Some(value) => out.push_str(&format!(" {name}=\"{}\"", escape_html(value))),
                None => out.push_str(&format!(" {name}")),
            }
        }
        out.push('>');
        self.render_nodes(&script.children, out)?;
        out.push_str("</script>");
        Ok(())
    }

    fn render_json(&mut self, json: &Json, out: &mut String) -> Result<(), RenderError> {
        let value = self.eval(&json.value, &json.loc)?;
        if value.is_null() {
            self.warn(
                WarningKind::MissingValue,
                format!("no value for `{}`", json.value.source),
                &json.loc,
            );
        }
        out.push_str(&script_safe_json(&value));
        Ok(())
    }

    fn render_asset(&mut self, asset: &Asset, out: &mut String) {
        let assets = self.services.assets;
        let url = if self.services.production {
            match assets.versioned_url(&asset.path) {
                Ok(url) => url,
                Err(err) => {
                    self.warn(
                        WarningKind::AssetUnresolved,
                        format!("cannot version {}: {err}", asset.path),
                        &asset.loc,
                    );
                    assets.url(&asset.path)
                }
            }
        } else {
            assets.url(&asset.path)
        };
        out.push_str(&escape_html(&url));
    }

    fn render_action(&mut self, action: &Action, out: &mut String) -> Result<(), RenderError> {
        let data = format!(
            r#"data-{}="{}" data-target="{}" data-swap="{}""#,
            action.method,
            escape_html(&action.endpoint),
            escape_html(&action.target),
            escape_html(&action.swap)
        );
        let class = action.class.as_deref();
        let (open, close) = match action.kind {
            ActionKind::Button => (
                format!(
                    r#"<button class="{}" {data}>"#,
                    escape_html(class.unwrap_or(DEFAULT_BUTTON_CLASS))
                ),
                "</button>",
            ),
            ActionKind::Link => (format!(r##"<a href="#"{} {data}>"##, class_attr(class)), "</a>"),
            ActionKind::Form => (format!("<form{} {data}>", class_attr(class)), "</form>"),
        };
        out.push_str(&open);
        self.render_nodes(&action.children, out)?;
        out.push_str(close);
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn eval(&self, expr: &Expression, loc: &Location) -> Result<Value, RenderError> {
        evaluate(&expr.expr, &self.env).map_err(|source| RenderError::Eval {
            location: Location::new(Arc::clone(&loc.file), expr.expr.span),
            expression: expr.source.clone(),
            source,
        })
    }

    /// Bind `name` in a fresh scope that lasts until the enclosing container ends.
    fn bind(&mut self, name: &str, value: Value) {
        self.env.push_scope();
        self.env.define(name, value);
    }

    fn write_value(&self, value: &Value, raw: bool, out: &mut String) {
        let text = value.to_display_string();
        if raw || value.is_safe() || !self.services.escape {
            out.push_str(&text);
        } else {
            out.push_str(&escape_html(&text));
        }
    }

    fn token(&mut self, component: &Arc<str>) -> String {
        if let Some(token) = self.tokens.get(component) {
            return token.clone();
        }
        let token = self.services.styles.token(component);
        self.tokens.insert(Arc::clone(component), token.clone());
        token
    }

    fn warn(&mut self, kind: WarningKind, message: String, loc: &Location) {
        let warning = Warning::new(kind, message, loc);
        if self.services.production {
            tracing::warn!(location = %loc, kind = ?kind, "{}", warning.message);
        } else {
            tracing::debug!(location = %loc, kind = ?kind, "{}", warning.message);
        }
        self.warnings.push(warning);
    }
}

fn class_attr(class: Option<&str>) -> String {
    class
        .map(|class| format!(r#" class="{}""#, escape_html(class)))
        .unwrap_or_default()
}
