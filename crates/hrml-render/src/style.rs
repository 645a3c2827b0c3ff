//! Scoped styles.
//!
//! Each template that declares a scoped `<?style?>` gets a short token
//! derived from its identity (the template path). Class selectors in the
//! style and the matching `class="..."` tokens in the same file's markup
//! both get `-<token>` appended, so `.card` in `components/card.hrml`
//! becomes `.card-3f2a91c0` in the stylesheet and in the markup.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hrml_lexer::class_selectors;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

/// Length of a style token in hex digits.
pub const TOKEN_LEN: usize = 8;

type TokenFn = dyn Fn(&str) -> String + Send + Sync;

/// First [`TOKEN_LEN`] hex digits of SHA-256 over the component identity.
pub fn default_token(component: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(component.as_bytes()));
    digest[..TOKEN_LEN].to_string()
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

/// Component identity → style token, shared by every render of an engine.
///
/// Append-only. Concurrent first uses of one identity converge on a single
/// token: the first insert wins and later ones read it back.
pub struct StyleRegistry {
    tokens: DashMap<String, String>,
    /// Token → the identity that claimed it, for collision detection.
    owners: DashMap<String, String>,
    collisions: AtomicUsize,
    hasher: Box<TokenFn>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::with_hasher(default_token)
    }

    /// A registry deriving tokens with `hasher` instead of SHA-256.
    pub fn with_hasher(hasher: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            tokens: DashMap::new(),
            owners: DashMap::new(),
            collisions: AtomicUsize::new(0),
            hasher: Box::new(hasher),
        }
    }

    /// The token for `component`, created on first use.
    pub fn token(&self, component: &str) -> String {
        if let Some(token) = self.tokens.get(component) {
            return token.clone();
        }

        let candidate = (self.hasher)(component);
        let token = self
            .tokens
            .entry(component.to_string())
            .or_insert(candidate)
            .value()
            .clone();

        match self.owners.entry(token.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(component.to_string());
            }
            Entry::Occupied(owner) if owner.get() != component => {
                self.collisions.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    token = %token,
                    component,
                    owner = %owner.get(),
                    "style token collision"
                );
            }
            Entry::Occupied(_) => {}
        }
        token
    }

    /// Number of identities registered.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of token collisions detected so far.
    pub fn collisions(&self) -> usize {
        self.collisions.load(Ordering::Relaxed)
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StyleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleRegistry")
            .field("tokens", &self.tokens)
            .field("collisions", &self.collisions())
            .finish_non_exhaustive()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Rewriting
// ══════════════════════════════════════════════════════════════════════════════

/// The scoped form of a class name.
pub fn scoped_class(class: &str, token: &str) -> String {
    format!("{class}-{token}")
}

/// Append `-token` to every class selector in `css`.
pub fn rewrite_css(css: &str, token: &str) -> String {
    let mut out = String::with_capacity(css.len() + 16);
    let mut last = 0;
    for selector in class_selectors(css) {
        out.push_str(&css[last..selector.range.end]);
        out.push('-');
        out.push_str(token);
        last = selector.range.end;
    }
    out.push_str(&css[last..]);
    out
}

/// `class="..."` / `class='...'`. A value still open at the end of the text
/// is matched too, since a text node can end inside an attribute that an
/// instruction continues.
static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(^|\s)(class\s*=\s*)(?:"([^"]*)("|$)|'([^']*)('|$))"#)
        .expect("class attribute pattern is valid")
});

/// Append `-token` to each class in `class` attributes of `markup` that
/// `classes` names. Other classes are left alone.
pub fn rewrite_class_attributes(markup: &str, classes: &BTreeSet<String>, token: &str) -> String {
    if classes.is_empty() {
        return markup.to_string();
    }
    CLASS_ATTR
        .replace_all(markup, |caps: &Captures<'_>| {
            let (quote, value, close) = match caps.get(3) {
                Some(value) => ("\"", value.as_str(), caps.get(4)),
                None => (
                    "'",
                    caps.get(5).map_or("", |m| m.as_str()),
                    caps.get(6),
                ),
            };
            let value = rewrite_class_list(value, classes, token);
            format!(
                "{}{}{quote}{value}{}",
                &caps[1],
                &caps[2],
                close.map_or("", |m| m.as_str())
            )
        })
        .into_owned()
}

/// Rewrite a whitespace-separated class list, keeping its spacing.
fn rewrite_class_list(list: &str, classes: &BTreeSet<String>, token: &str) -> String {
    let mut out = String::with_capacity(list.len());
    let mut rest = list;
    while !rest.is_empty() {
        let word_start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        out.push_str(&rest[..word_start]);
        rest = &rest[word_start..];
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        if classes.contains(word) {
            out.push_str(&scoped_class(word, token));
        } else {
            out.push_str(word);
        }
        rest = &rest[word_end..];
    }
    out
}
