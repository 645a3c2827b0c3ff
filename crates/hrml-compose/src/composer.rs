//! Include resolution and slot/block linking.
//!
//! Composition walks the include graph depth-first with an explicit stack
//! of files being expanded, so include depth never grows the native call
//! stack and a path reappearing on that stack is reported as a cycle before
//! it is expanded. Each file is expanded once per composition:
//!
//! 1. its top-level `<?block?>`s are collected (a later block for the same
//!    slot replaces an earlier one) and removed from the tree;
//! 2. every `<?load?>` is replaced by the target's expansion with the
//!    collected blocks injected into the target's open slots;
//! 3. the file's own slots stay open for whoever loads it.
//!
//! Slots still open once the entry is expanded fall back to their default
//! children.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use hrml_types::ast::{Node, Set, SyntaxTree};

use crate::error::ComposeError;
use crate::source::{normalize_path, SourceProvider};

/// A fully composed, render-ready tree.
#[derive(Debug)]
pub struct RenderTree {
    /// The entry template path.
    pub entry: Arc<str>,
    pub nodes: Vec<Node>,
    /// Every template the tree was built from, the entry included.
    pub dependencies: BTreeSet<String>,
}

impl RenderTree {
    pub fn depends_on(&self, path: &str) -> bool {
        self.dependencies.contains(path)
    }
}

/// Composes entry templates and caches the result per entry.
///
/// Composition is pure given immutable sources, so racing renders may
/// compose the same entry concurrently; the last one to finish wins the
/// cache slot and both results are equivalent.
pub struct Composer {
    source: Arc<dyn SourceProvider>,
    cache: DashMap<String, Arc<RenderTree>>,
}

impl Composer {
    pub fn new(source: Arc<dyn SourceProvider>) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn SourceProvider> {
        &self.source
    }

    /// The composed tree for `entry`, from cache when available.
    pub fn compose(&self, entry: &str) -> Result<Arc<RenderTree>, ComposeError> {
        let entry = normalize_path(entry);
        if let Some(tree) = self.cache.get(&entry) {
            tracing::trace!(entry = %entry, "render tree cache hit");
            return Ok(Arc::clone(&tree));
        }

        let tree = Arc::new(compose_tree(self.source.as_ref(), &entry)?);
        tracing::debug!(
            entry = %entry,
            dependencies = tree.dependencies.len(),
            "composed render tree"
        );
        self.cache.insert(entry, Arc::clone(&tree));
        Ok(tree)
    }

    /// Evict `path` from the source cache and every composed tree built from it.
    pub fn invalidate(&self, path: &str) {
        let path = normalize_path(path);
        self.source.invalidate(&path);
        let before = self.cache.len();
        self.cache.retain(|_, tree| !tree.depends_on(&path));
        tracing::debug!(
            path = %path,
            evicted = before.saturating_sub(self.cache.len()),
            "invalidated template"
        );
    }

    /// Evict everything.
    pub fn clear(&self) {
        self.source.clear();
        self.cache.clear();
    }

    /// Number of cached render trees.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Include graph walk
// ══════════════════════════════════════════════════════════════════════════════

/// A file on the inclusion chain whose loads are still being expanded.
struct Frame {
    path: String,
    tree: Arc<SyntaxTree>,
    /// Load targets not yet expanded, in reverse source order.
    pending: Vec<String>,
}

impl Frame {
    fn new(path: String, tree: Arc<SyntaxTree>) -> Self {
        let mut pending: Vec<String> = tree
            .load_targets()
            .iter()
            .map(|target| normalize_path(target))
            .collect();
        pending.reverse();
        Self {
            path,
            tree,
            pending,
        }
    }
}

/// Compose `entry` (already normalised) into a render tree.
pub(crate) fn compose_tree(
    source: &dyn SourceProvider,
    entry: &str,
) -> Result<RenderTree, ComposeError> {
    let mut expanded: HashMap<String, Vec<Node>> = HashMap::new();
    let mut dependencies = BTreeSet::new();
    let mut chain = vec![Frame::new(entry.to_string(), source.get(entry)?)];
    dependencies.insert(entry.to_string());

    while let Some(top) = chain.last_mut() {
        match top.pending.pop() {
            Some(target) => {
                if expanded.contains_key(&target) {
                    continue;
                }
                if let Some(start) = chain.iter().position(|f| f.path == target) {
                    let mut cycle: Vec<String> =
                        chain[start..].iter().map(|f| f.path.clone()).collect();
                    cycle.push(target);
                    return Err(ComposeError::CyclicInclude { chain: cycle });
                }
                let tree = source.get(&target)?;
                dependencies.insert(target.clone());
                chain.push(Frame::new(target, tree));
            }
            None => {
                let Some(frame) = chain.pop() else { break };
                let nodes = expand_file(&frame.tree, &expanded)?;
                expanded.insert(frame.path, nodes);
            }
        }
    }

    let nodes = expanded.remove(entry).unwrap_or_default();
    Ok(RenderTree {
        entry: Arc::from(entry),
        nodes: close_open_slots(nodes),
        dependencies,
    })
}

/// Expand one file whose load targets are all in `expanded`.
fn expand_file(
    tree: &SyntaxTree,
    expanded: &HashMap<String, Vec<Node>>,
) -> Result<Vec<Node>, ComposeError> {
    let no_blocks = HashMap::new();
    let mut blocks = HashMap::new();
    for node in &tree.nodes {
        if let Node::Block(block) = node {
            // loads inside block content see no blocks; their open slots
            // are forwarded to whoever loads this file
            let content = expand_nodes(&block.children, &no_blocks, expanded)?;
            blocks.insert(block.slot.clone(), content);
        }
    }
    expand_nodes(&tree.nodes, &blocks, expanded)
}

/// Copy `nodes`, inlining loads and dropping blocks.
fn expand_nodes(
    nodes: &[Node],
    blocks: &HashMap<String, Vec<Node>>,
    expanded: &HashMap<String, Vec<Node>>,
) -> Result<Vec<Node>, ComposeError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            // top-level blocks were collected by the caller; nested ones render nothing
            Node::Block(_) => {}
            Node::Load(load) => {
                let target = normalize_path(&load.file);
                let content = expanded
                    .get(&target)
                    .cloned()
                    .ok_or(ComposeError::SourceNotFound { path: target })?;
                let content = inject_blocks(content, blocks);
                match &load.alias {
                    Some(alias) => out.push(Node::Set(Set {
                        id: alias.clone(),
                        children: content,
                        loc: load.loc.clone(),
                    })),
                    None => out.extend(content),
                }
            }
            other => {
                let mut copy = other.clone();
                for children in copy.child_lists_mut() {
                    *children = expand_nodes(children, blocks, expanded)?;
                }
                out.push(copy);
            }
        }
    }
    Ok(out)
}

/// Replace slots that have a matching block with the block's content.
///
/// Injected content is not searched again: slots inside it belong to the
/// file that supplied the block and are filled further up the chain.
fn inject_blocks(nodes: Vec<Node>, blocks: &HashMap<String, Vec<Node>>) -> Vec<Node> {
    if blocks.is_empty() {
        return nodes;
    }
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        if let Node::Slot(slot) = &node {
            if let Some(content) = blocks.get(&slot.id) {
                out.extend(content.iter().cloned());
                continue;
            }
        }
        for children in node.child_lists_mut() {
            *children = inject_blocks(std::mem::take(children), blocks);
        }
        out.push(node);
    }
    out
}

/// Replace every remaining slot with its default children.
fn close_open_slots(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        for children in node.child_lists_mut() {
            *children = close_open_slots(std::mem::take(children));
        }
        match node {
            Node::Slot(slot) => out.extend(slot.children),
            other => out.push(other),
        }
    }
    out
}
