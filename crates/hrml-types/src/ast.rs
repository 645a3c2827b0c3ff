//! Syntax tree node types for HRML templates.
//!
//! A [`SyntaxTree`] is the parse of one template file. Every node owns its
//! children; there are no back-references. Processing-instruction nodes
//! carry a [`Location`] so diagnostics survive composition.
//!
//! Attribute expressions are parsed once, at parse time, into [`Expression`]
//! values and re-evaluated per render.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{Location, Span};

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// The parse of a single template file.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub path: Arc<str>,
    pub nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new(path: Arc<str>, nodes: Vec<Node>) -> Self {
        Self { path, nodes }
    }

    /// Every `<?load?>` target referenced anywhere in this file, in source order.
    pub fn load_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        collect_loads(&self.nodes, &mut targets);
        targets
    }
}

fn collect_loads(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        if let Node::Load(load) = node {
            if !out.contains(&load.file) {
                out.push(load.file.clone());
            }
        }
        for children in node.child_lists() {
            collect_loads(children, out);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Nodes
// ══════════════════════════════════════════════════════════════════════════════

/// One node of a template syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(Text),
    Load(Load),
    Slot(Slot),
    Block(Block),
    Set(Set),
    Get(Get),
    If(If),
    For(For),
    Call(Call),
    Style(Style),
    Script(Script),
    Asset(Asset),
    Json(Json),
    Action(Action),
}

impl Node {
    /// Shorthand for an unscoped literal text node.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text {
            text: text.into(),
            scope: None,
        })
    }

    /// All child node lists owned by this node.
    pub fn child_lists(&self) -> Vec<&Vec<Node>> {
        match self {
            Node::Slot(n) => vec![&n.children],
            Node::Block(n) => vec![&n.children],
            Node::Set(n) => vec![&n.children],
            Node::If(n) => {
                let mut lists = vec![&n.then_branch];
                lists.extend(n.else_branch.as_ref());
                lists
            }
            Node::For(n) => vec![&n.body],
            Node::Call(n) => {
                let mut lists = vec![&n.body];
                lists.extend(n.on_error.as_ref());
                lists
            }
            Node::Script(n) => vec![&n.children],
            Node::Action(n) => vec![&n.children],
            Node::Text(_)
            | Node::Load(_)
            | Node::Get(_)
            | Node::Style(_)
            | Node::Asset(_)
            | Node::Json(_) => Vec::new(),
        }
    }

    /// Mutable access to all child node lists owned by this node.
    pub fn child_lists_mut(&mut self) -> Vec<&mut Vec<Node>> {
        match self {
            Node::Slot(n) => vec![&mut n.children],
            Node::Block(n) => vec![&mut n.children],
            Node::Set(n) => vec![&mut n.children],
            Node::If(n) => {
                let mut lists = vec![&mut n.then_branch];
                lists.extend(n.else_branch.as_mut());
                lists
            }
            Node::For(n) => vec![&mut n.body],
            Node::Call(n) => {
                let mut lists = vec![&mut n.body];
                lists.extend(n.on_error.as_mut());
                lists
            }
            Node::Script(n) => vec![&mut n.children],
            Node::Action(n) => vec![&mut n.children],
            Node::Text(_)
            | Node::Load(_)
            | Node::Get(_)
            | Node::Style(_)
            | Node::Asset(_)
            | Node::Json(_) => Vec::new(),
        }
    }
}

/// Literal markup, emitted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    /// Present when the originating file declares scoped styles; class
    /// attributes in this text are rewritten with the file's style token.
    pub scope: Option<Arc<StyleScope>>,
}

/// The scoped-style identity of one template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleScope {
    /// Component identity (the template path).
    pub component: Arc<str>,
    /// Class names declared by the file's scoped style selectors.
    pub classes: BTreeSet<String>,
}

/// `<?load file="..." as="..."?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub file: String,
    pub alias: Option<String>,
    pub loc: Location,
}

/// `<?slot id="..."?>default<?/slot?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: String,
    pub children: Vec<Node>,
    pub loc: Location,
}

/// `<?block slot="..."?>content<?/block?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub slot: String,
    pub children: Vec<Node>,
    pub loc: Location,
}

/// `<?set id="..."?>value<?/set?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub id: String,
    pub children: Vec<Node>,
    pub loc: Location,
}

/// `<?get id="expr" default="..." raw?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Get {
    pub value: Expression,
    pub default: Option<String>,
    pub raw: bool,
    pub loc: Location,
}

/// `<?if cond="expr"?>…<?/if?>` with an optional else branch.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Expression,
    pub then_branch: Vec<Node>,
    pub else_branch: Option<Vec<Node>>,
    pub loc: Location,
}

/// `<?for item in="expr" index="i"?>…<?/for?>`
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub item: String,
    pub index: Option<String>,
    pub iterable: Expression,
    pub body: Vec<Node>,
    pub loc: Location,
}

/// `<?call endpoint="..." as="..." method="..." cache="..." arg="expr"?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub endpoint: String,
    pub as_name: String,
    /// Upper-cased HTTP-style method name.
    pub method: String,
    /// Declared cache duration in seconds.
    pub cache_secs: Option<u64>,
    /// Argument bindings in source order.
    pub args: Vec<(String, Expression)>,
    /// Rendered after a successful call, with the result in scope.
    pub body: Vec<Node>,
    /// The `<?error?>` branch, rendered when the invocation fails.
    pub on_error: Option<Vec<Node>>,
    pub loc: Location,
}

/// `<?style?>css<?/style?>` or `<?style global?>css<?/style?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub scoped: bool,
    pub css: String,
    pub loc: Location,
}

/// `<?script type="..."?>…<?/script?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<Node>,
    pub loc: Location,
}

/// `<?asset path="..."?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub path: String,
    pub loc: Location,
}

/// `<?json id="expr"?>`
#[derive(Debug, Clone, PartialEq)]
pub struct Json {
    pub value: Expression,
    pub loc: Location,
}

/// Which element an action directive renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// `<?btn?>` → `<button>`
    Button,
    /// `<?link?>` → `<a>`
    Link,
    /// `<?form?>` → `<form>`
    Form,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "btn" => Some(Self::Button),
            "link" => Some(Self::Link),
            "form" => Some(Self::Form),
            _ => None,
        }
    }
}

/// `<?btn post="/api/x" target="#id" swap="outerHTML"?>label<?/btn?>`
///
/// Renders the data attributes consumed by the client-side partial-update
/// script.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    /// Lower-case method name (`get`, `post`, ...).
    pub method: String,
    pub endpoint: String,
    pub target: String,
    pub swap: String,
    pub class: Option<String>,
    pub children: Vec<Node>,
    pub loc: Location,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// A parsed attribute expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub source: String,
    pub expr: Expr,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Every expression kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Expr>),
    /// Dotted variable path: `user.profile.name`, `items.0`
    Path(Vec<String>),
    /// Builtin function call: `upper(name)`
    Call { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEq => "<=",
            Self::GreaterEq => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}
