//! Composition tests: includes, slot/block linking, cycles, caching and
//! invalidation, over both source providers.

use std::fs;
use std::sync::Arc;

use hrml_compose::{ComposeError, Composer, FileSystemSource, MemorySource, SourceProvider};
use hrml_types::ast::Node;
use tempfile::TempDir;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn composer(files: &[(&str, &str)]) -> Composer {
    let source = MemorySource::new();
    for (path, text) in files {
        source.insert(path, text);
    }
    Composer::new(Arc::new(source))
}

/// Flatten a composed tree to text, writing instructions as `{name}`.
fn flatten(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(&t.text),
            Node::Get(g) => out.push_str(&format!("{{{}}}", g.value.source)),
            Node::Set(s) => out.push_str(&format!("{{set {}:{}}}", s.id, flatten(&s.children))),
            Node::Slot(s) => out.push_str(&format!("{{slot {}}}", s.id)),
            Node::If(n) => out.push_str(&format!("{{if {}}}", flatten(&n.then_branch))),
            other => out.push_str(&format!("{{{other:?}}}")),
        }
    }
    out
}

fn composed(files: &[(&str, &str)], entry: &str) -> String {
    let tree = composer(files)
        .compose(entry)
        .unwrap_or_else(|e| panic!("composition failed: {e}"));
    flatten(&tree.nodes)
}

const BASE: &str = r#"<html><title><?slot id="title"?>Untitled<?/slot?></title><body><?slot id="body"?><?/slot?></body></html>"#;

// ══════════════════════════════════════════════════════════════════════════════
// Slots and blocks
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn slot_without_block_renders_default() {
    let page = r#"<?load file="base.hrml"?><?block slot="body"?>Hello<?/block?>"#;
    assert_eq!(
        composed(&[("base.hrml", BASE), ("page.hrml", page)], "page.hrml"),
        "<html><title>Untitled</title><body>Hello</body></html>"
    );
}

#[test]
fn block_replaces_default_never_both() {
    let page = r#"<?load file="base.hrml"?><?block slot="title"?>Home<?/block?>"#;
    assert_eq!(
        composed(&[("base.hrml", BASE), ("page.hrml", page)], "page.hrml"),
        "<html><title>Home</title><body></body></html>"
    );
}

#[test]
fn block_for_absent_slot_is_dropped() {
    let page = r#"<?load file="base.hrml"?><?block slot="sidebar"?>ignored<?/block?>"#;
    let out = composed(&[("base.hrml", BASE), ("page.hrml", page)], "page.hrml");
    assert!(!out.contains("ignored"));
}

#[test]
fn nested_block_renders_nothing() {
    let page = r#"<?load file="base.hrml"?><?if cond="1"?><?block slot="body"?>inner<?/block?><?/if?>"#;
    assert_eq!(
        composed(&[("base.hrml", BASE), ("page.hrml", page)], "page.hrml"),
        "<html><title>Untitled</title><body></body></html>{if }"
    );
}

#[test]
fn open_slots_in_entry_render_defaults() {
    assert_eq!(
        composed(&[("base.hrml", BASE)], "base.hrml"),
        "<html><title>Untitled</title><body></body></html>"
    );
}

#[test]
fn slots_are_forwarded_through_block_content() {
    let section = r#"<?load file="base.hrml"?><?block slot="body"?><main><?slot id="content"?>none<?/slot?></main><?/block?>"#;
    let page = r#"<?load file="section.hrml"?><?block slot="content"?>Article<?/block?>"#;
    assert_eq!(
        composed(
            &[("base.hrml", BASE), ("section.hrml", section), ("page.hrml", page)],
            "page.hrml"
        ),
        "<html><title>Untitled</title><body><main>Article</main></body></html>"
    );
}

#[test]
fn slots_inside_control_flow_are_filled() {
    let layout = r#"<?if cond="user"?><?slot id="greeting"?>hi<?/slot?><?/if?>"#;
    let page = r#"<?load file="layout.hrml"?><?block slot="greeting"?>welcome<?/block?>"#;
    assert_eq!(
        composed(&[("layout.hrml", layout), ("page.hrml", page)], "page.hrml"),
        "{if welcome}"
    );
}

#[test]
fn blocks_keep_their_instructions() {
    let page = r#"<?load file="base.hrml"?><?block slot="body"?><?get id="user.name"?><?/block?>"#;
    assert_eq!(
        composed(&[("base.hrml", BASE), ("page.hrml", page)], "page.hrml"),
        "<html><title>Untitled</title><body>{user.name}</body></html>"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Loads
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn plain_include_is_inlined() {
    let files = [
        ("nav.hrml", "<nav/>"),
        ("page.hrml", r#"<body><?load file="partials/../nav.hrml"?></body>"#),
    ];
    // parent segments never resolve
    assert!(matches!(
        composer(&files).compose("page.hrml"),
        Err(ComposeError::SourceNotFound { .. })
    ));
    let files = [
        ("partials/nav.hrml", "<nav/>"),
        ("page.hrml", r#"<body><?load file="/partials/./nav.hrml"?></body>"#),
    ];
    assert_eq!(composed(&files, "page.hrml"), "<body><nav/></body>");
}

#[test]
fn load_with_alias_binds_instead_of_inlining() {
    let files = [
        ("card.hrml", "<div>card</div>"),
        ("page.hrml", r#"<?load file="card.hrml" as="card"?>x"#),
    ];
    assert_eq!(composed(&files, "page.hrml"), "{set card:<div>card</div>}x");
}

#[test]
fn diamond_includes_are_not_cycles() {
    let files = [
        ("d.hrml", "D"),
        ("b.hrml", r#"B<?load file="d.hrml"?>"#),
        ("c.hrml", r#"C<?load file="d.hrml"?>"#),
        ("a.hrml", r#"<?load file="b.hrml"?><?load file="c.hrml"?>"#),
    ];
    assert_eq!(composed(&files, "a.hrml"), "BDCD");
}

#[test]
fn cyclic_include_names_the_chain() {
    let c = composer(&[
        ("a.hrml", r#"<?load file="b.hrml"?>"#),
        ("b.hrml", r#"<?load file="c.hrml"?>"#),
        ("c.hrml", r#"<?load file="a.hrml"?>"#),
    ]);
    match c.compose("a.hrml") {
        Err(ComposeError::CyclicInclude { chain }) => {
            assert_eq!(chain, vec!["a.hrml", "b.hrml", "c.hrml", "a.hrml"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn two_file_cycle_fails_without_overflow() {
    let c = composer(&[
        ("a.hrml", r#"<?block slot="x"?><?/block?><?load file="b.hrml"?>"#),
        ("b.hrml", r#"<?if cond="1"?><?load file="a.hrml"?><?/if?>"#),
    ]);
    let err = c.compose("a.hrml").unwrap_err();
    assert_eq!(err.to_string(), "cyclic include: a.hrml -> b.hrml -> a.hrml");
}

#[test]
fn deep_include_chain() {
    let mut files: Vec<(String, String)> = (0..500)
        .map(|i| (format!("f{i}.hrml"), format!(r#"<?load file="f{}.hrml"?>"#, i + 1)))
        .collect();
    files.push(("f500.hrml".to_string(), "end".to_string()));
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
    assert_eq!(composed(&refs, "f0.hrml"), "end");
}

#[test]
fn missing_target() {
    let c = composer(&[("page.hrml", r#"<?load file="gone.hrml"?>"#)]);
    let err = c.compose("page.hrml").unwrap_err();
    assert!(matches!(&err, ComposeError::SourceNotFound { path } if path == "gone.hrml"));
    assert_eq!(err.path(), Some("gone.hrml"));
}

#[test]
fn parse_errors_surface_with_location() {
    let c = composer(&[
        ("page.hrml", r#"<?load file="broken.hrml"?>"#),
        ("broken.hrml", "line one\n<?if cond=\"x\"?>"),
    ]);
    let Err(ComposeError::Parse(err)) = c.compose("page.hrml") else {
        panic!("expected a parse error");
    };
    assert_eq!(err.file, "broken.hrml");
    assert_eq!(err.span.start_line, 2);
}

// ══════════════════════════════════════════════════════════════════════════════
// Caching
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn composed_trees_are_cached_and_shared() {
    let c = composer(&[("base.hrml", BASE), ("page.hrml", r#"<?load file="base.hrml"?>"#)]);
    let first = c.compose("page.hrml").unwrap();
    let second = c.compose("/page.hrml").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(c.cached(), 1);
    assert!(first.depends_on("base.hrml"));
    assert!(first.depends_on("page.hrml"));
}

#[test]
fn invalidation_evicts_dependents_only() {
    let source = Arc::new(
        MemorySource::new()
            .with("base.hrml", BASE)
            .with("a.hrml", r#"<?load file="base.hrml"?>"#)
            .with("b.hrml", "standalone"),
    );
    let c = Composer::new(source.clone());
    c.compose("a.hrml").unwrap();
    c.compose("b.hrml").unwrap();
    assert_eq!(c.cached(), 2);

    source.insert("base.hrml", "new base");
    c.invalidate("base.hrml");
    assert_eq!(c.cached(), 1);
    assert_eq!(flatten(&c.compose("a.hrml").unwrap().nodes), "new base");

    c.clear();
    assert_eq!(c.cached(), 0);
}

#[test]
fn filesystem_source_reads_and_reloads() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("layouts")).unwrap();
    fs::write(dir.path().join("layouts/base.hrml"), BASE).unwrap();
    fs::write(
        dir.path().join("index.hrml"),
        r#"<?load file="layouts/base.hrml"?><?block slot="title"?>Index<?/block?>"#,
    )
    .unwrap();

    let source: Arc<dyn SourceProvider> = Arc::new(FileSystemSource::new(dir.path()));
    let c = Composer::new(source);
    assert_eq!(
        flatten(&c.compose("index.hrml").unwrap().nodes),
        "<html><title>Index</title><body></body></html>"
    );

    fs::write(
        dir.path().join("layouts/base.hrml"),
        r#"<h1><?slot id="title"?><?/slot?></h1>"#,
    )
    .unwrap();
    // unchanged until invalidated
    assert!(flatten(&c.compose("index.hrml").unwrap().nodes).starts_with("<html>"));
    c.invalidate("layouts/base.hrml");
    assert_eq!(flatten(&c.compose("index.hrml").unwrap().nodes), "<h1>Index</h1>");
}

#[test]
fn filesystem_source_missing_file() {
    let dir = TempDir::new().unwrap();
    let c = Composer::new(Arc::new(FileSystemSource::new(dir.path())));
    assert!(matches!(
        c.compose("nope.hrml"),
        Err(ComposeError::SourceNotFound { .. })
    ));
}

#[test]
fn concurrent_compositions_agree() {
    let c = Arc::new(composer(&[
        ("base.hrml", BASE),
        ("page.hrml", r#"<?load file="base.hrml"?><?block slot="body"?>x<?/block?>"#),
    ]));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = Arc::clone(&c);
            std::thread::spawn(move || flatten(&c.compose("page.hrml").unwrap().nodes))
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            "<html><title>Untitled</title><body>x</body></html>"
        );
    }
}
