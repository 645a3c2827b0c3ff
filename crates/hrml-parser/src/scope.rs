//! Scoped-style ownership of literal text.
//!
//! A file declaring `<?style?>` (not `global`) owns the class names its
//! selectors mention. Every literal text node of that file is tagged with
//! the file's [`StyleScope`] so the renderer can rewrite matching `class`
//! attributes with the same token as the selectors. The tag travels with
//! the node through composition, so markup keeps its file's scope even
//! when spliced into a layout.

use std::collections::BTreeSet;
use std::sync::Arc;

use hrml_lexer::class_selectors;
use hrml_types::ast::{Node, StyleScope};

/// Tag the text nodes of `nodes` with the scope of the file at `path`.
pub(crate) fn attach_style_scope(path: &Arc<str>, nodes: &mut [Node]) {
    let mut classes = BTreeSet::new();
    collect_scoped_classes(nodes, &mut classes);
    if classes.is_empty() {
        return;
    }
    let scope = Arc::new(StyleScope {
        component: Arc::clone(path),
        classes,
    });
    tag_text(nodes, &scope);
}

fn collect_scoped_classes(nodes: &[Node], out: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Style(style) if style.scoped => {
                out.extend(class_selectors(&style.css).into_iter().map(|c| c.name));
            }
            _ => {
                for children in node.child_lists() {
                    collect_scoped_classes(children, out);
                }
            }
        }
    }
}

fn tag_text(nodes: &mut [Node], scope: &Arc<StyleScope>) {
    for node in nodes {
        match node {
            Node::Text(text) => text.scope = Some(Arc::clone(scope)),
            // script bodies are not markup
            Node::Script(_) => {}
            _ => {
                for children in node.child_lists_mut() {
                    tag_text(children, scope);
                }
            }
        }
    }
}
