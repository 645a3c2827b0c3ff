//! Parser tests: block structure, attributes, else/error branches,
//! expression precedence and style scopes.

use hrml_parser::parse_template;
use hrml_types::ast::*;
use hrml_types::{ErrorCode, TemplateError};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn parse_ok(source: &str) -> SyntaxTree {
    match parse_template("page.hrml", source) {
        Ok(tree) => tree,
        Err(e) => panic!("expected a successful parse, got: {e}"),
    }
}

fn parse_err(source: &str) -> TemplateError {
    match parse_template("page.hrml", source) {
        Ok(tree) => panic!("expected a parse error, got: {tree:?}"),
        Err(e) => e,
    }
}

fn texts(nodes: &[Node]) -> String {
    nodes
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Structure
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn literal_text_is_kept_verbatim() {
    let tree = parse_ok("<p class=\"a\">&amp; hi</p>");
    assert_eq!(tree.nodes, vec![Node::text("<p class=\"a\">&amp; hi</p>")]);
    assert_eq!(&*tree.path, "page.hrml");
}

#[test]
fn self_closing_instructions_take_no_children() {
    let tree = parse_ok(r#"<?load file="layout.hrml"?><?get id="user.name"?><?asset path="/a.css"?>"#);
    assert!(matches!(&tree.nodes[0], Node::Load(l) if l.file == "layout.hrml" && l.alias.is_none()));
    let Node::Get(get) = &tree.nodes[1] else {
        panic!("expected get");
    };
    assert_eq!(
        get.value.expr.kind,
        ExprKind::Path(vec!["user".into(), "name".into()])
    );
    assert!(!get.raw);
    assert!(matches!(&tree.nodes[2], Node::Asset(a) if a.path == "/a.css"));
}

#[test]
fn nested_blocks_own_their_children() {
    let tree = parse_ok(r#"<?slot id="main"?><?for item in="items"?><li><?get id="item"?></li><?/for?><?/slot?>"#);
    let Node::Slot(slot) = &tree.nodes[0] else {
        panic!("expected slot");
    };
    assert_eq!(slot.id, "main");
    let Node::For(each) = &slot.children[0] else {
        panic!("expected for");
    };
    assert_eq!(each.item, "item");
    assert_eq!(each.index, None);
    assert_eq!(each.body.len(), 3);
}

#[test]
fn for_accepts_item_attribute_and_index() {
    let tree = parse_ok(r#"<?for item="row" in="rows" index="i"?>x<?/for?>"#);
    let Node::For(each) = &tree.nodes[0] else {
        panic!("expected for");
    };
    assert_eq!(each.item, "row");
    assert_eq!(each.index.as_deref(), Some("i"));
}

#[test]
fn get_modifiers() {
    let tree = parse_ok(r#"<?get id="bio" default="n/a" raw?>"#);
    let Node::Get(get) = &tree.nodes[0] else {
        panic!("expected get");
    };
    assert_eq!(get.default.as_deref(), Some("n/a"));
    assert!(get.raw);
}

#[test]
fn unknown_markers_stay_text() {
    let tree = parse_ok("<?xml version=\"1.0\"?><?php echo 1; ?>");
    assert_eq!(texts(&tree.nodes), "<?xml version=\"1.0\"?><?php echo 1; ?>");
}

#[test]
fn legacy_close_form() {
    let tree = parse_ok(r#"<?set id="x"?>5</?set?>"#);
    assert!(matches!(&tree.nodes[0], Node::Set(s) if s.id == "x" && texts(&s.children) == "5"));
}

#[test]
fn load_targets_are_collected_in_order() {
    let tree = parse_ok(
        r#"<?load file="a.hrml"?><?block slot="x"?><?load file="b.hrml"?><?/block?><?load file="a.hrml"?>"#,
    );
    assert_eq!(tree.load_targets(), vec!["a.hrml", "b.hrml"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// If / Else
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn else_inside_if() {
    let tree = parse_ok(r#"<?if cond="0"?>A<?else?>B<?/else?><?/if?>"#);
    let Node::If(node) = &tree.nodes[0] else {
        panic!("expected if");
    };
    assert_eq!(texts(&node.then_branch), "A");
    assert_eq!(texts(node.else_branch.as_deref().unwrap()), "B");
}

#[test]
fn else_after_if_close() {
    let tree = parse_ok("<?if cond=\"ok\"?>A<?/if?>\n  <?else?>B<?/else?>!");
    assert_eq!(tree.nodes.len(), 2);
    let Node::If(node) = &tree.nodes[0] else {
        panic!("expected if");
    };
    assert_eq!(texts(node.else_branch.as_deref().unwrap()), "B");
    assert_eq!(tree.nodes[1], Node::text("!"));
}

#[test]
fn dangling_else_without_if() {
    let err = parse_err("<p>x</p><?else?>B<?/else?>");
    assert!(err.is_dangling_else());
    assert_eq!(err.span.start_col, 9);
}

#[test]
fn else_separated_from_if_by_text_is_dangling() {
    let err = parse_err(r#"<?if cond="a"?>A<?/if?> text <?else?>B<?/else?>"#);
    assert_eq!(err.code, ErrorCode::DANGLING_ELSE);
}

#[test]
fn second_else_is_dangling() {
    let err = parse_err(r#"<?if cond="a"?>A<?else?>B<?/else?><?/if?><?else?>C<?/else?>"#);
    assert_eq!(err.code, ErrorCode::DANGLING_ELSE);
}

#[test]
fn content_after_inner_else_is_rejected() {
    let err = parse_err(r#"<?if cond="a"?>A<?else?>B<?/else?>C<?/if?>"#);
    assert_eq!(err.code, ErrorCode::DANGLING_ELSE);
}

// ══════════════════════════════════════════════════════════════════════════════
// Call
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn call_attributes_and_error_branch() {
    let tree = parse_ok(
        r#"<?call endpoint="/api/users" as="users" method="post" cache="30" page="p + 1"?><ul></ul><?error?>failed<?/error?><?/call?>"#,
    );
    let Node::Call(call) = &tree.nodes[0] else {
        panic!("expected call");
    };
    assert_eq!(call.endpoint, "/api/users");
    assert_eq!(call.as_name, "users");
    assert_eq!(call.method, "POST");
    assert_eq!(call.cache_secs, Some(30));
    assert_eq!(call.args.len(), 1);
    assert_eq!(call.args[0].0, "page");
    assert_eq!(call.args[0].1.source, "p + 1");
    assert_eq!(texts(&call.body), "<ul></ul>");
    assert_eq!(texts(call.on_error.as_deref().unwrap()), "failed");
}

#[test]
fn call_method_defaults_to_get() {
    let tree = parse_ok(r#"<?call endpoint="/x" as="x"?><?/call?>"#);
    assert!(matches!(&tree.nodes[0], Node::Call(c) if c.method == "GET" && c.cache_secs.is_none()));
}

#[test]
fn error_outside_call_is_misplaced() {
    let err = parse_err("<?error?>x<?/error?>");
    assert_eq!(err.code, ErrorCode::MISPLACED_INSTRUCTION);
}

#[test]
fn invalid_cache_duration() {
    let err = parse_err(r#"<?call endpoint="/x" as="x" cache="soon"?><?/call?>"#);
    assert_eq!(err.code, ErrorCode::INVALID_ATTRIBUTE);
}

#[test]
fn cache_duration_is_bounded() {
    let year = parse_ok(r#"<?call endpoint="/x" as="x" cache="31536000"?><?/call?>"#);
    assert!(matches!(&year.nodes[0], Node::Call(c) if c.cache_secs == Some(31_536_000)));

    for huge in ["31536001", "18446744073709551615", "18446744073709551616"] {
        let source = format!(r#"<?call endpoint="/x" as="x" cache="{huge}"?><?/call?>"#);
        let err = parse_err(&source);
        assert_eq!(err.code, ErrorCode::INVALID_ATTRIBUTE);
        assert!(err.message.contains(huge));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unclosed_block_reports_the_opening() {
    let err = parse_err("<div>\n  <?if cond=\"a\"?>\n    text\n</div>");
    assert_eq!(err.code, ErrorCode::UNCLOSED_INSTRUCTION);
    assert_eq!(err.file, "page.hrml");
    assert_eq!(err.span.start_line, 2);
    assert_eq!(err.span.start_col, 3);
    assert_eq!(err.source_line, "  <?if cond=\"a\"?>");
}

#[test]
fn mismatched_close() {
    let err = parse_err(r#"<?if cond="a"?><?for x in="xs"?><?/if?>"#);
    assert_eq!(err.code, ErrorCode::UNEXPECTED_CLOSE);
    assert!(err.message.contains("<?/if?>"));
}

#[test]
fn stray_close() {
    let err = parse_err("text<?/slot?>");
    assert_eq!(err.code, ErrorCode::UNEXPECTED_CLOSE);
}

#[test]
fn self_closing_given_a_close() {
    let err = parse_err(r#"<?get id="x"?><?/get?>"#);
    assert_eq!(err.code, ErrorCode::UNEXPECTED_CLOSE);
    assert!(err.message.contains("self-closing"));
}

#[test]
fn missing_required_attribute() {
    let err = parse_err("<?load?>");
    assert_eq!(err.code, ErrorCode::MISSING_ATTRIBUTE);
    assert!(err.message.contains("'file'"));
}

#[test]
fn invalid_set_name() {
    let err = parse_err(r#"<?set id="1abc"?>x<?/set?>"#);
    assert_eq!(err.code, ErrorCode::INVALID_ATTRIBUTE);
}

#[test]
fn expression_errors_point_into_the_attribute() {
    let err = parse_err("<p>\n<?if cond=\"a and\"?>x<?/if?>");
    assert_eq!(err.code, ErrorCode::UNEXPECTED_TOKEN);
    assert_eq!(err.span.start_line, 2);
    assert_eq!(err.span.start_col, 17);
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

fn condition(source: &str) -> Expr {
    let tree = parse_ok(&format!("<?if cond=\"{source}\"?><?/if?>"));
    match &tree.nodes[0] {
        Node::If(node) => node.condition.expr.clone(),
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn or_binds_looser_than_and() {
    let expr = condition("a or b and c");
    let ExprKind::Binary { op, right, .. } = expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Or);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::And, .. }));
}

#[test]
fn comparisons_do_not_chain() {
    let tree = parse_template("page.hrml", r#"<?if cond="1 < 2 < 3"?><?/if?>"#);
    assert!(tree.is_err());
}

#[test]
fn calls_lists_and_index_paths() {
    let expr = condition("len(items.0.tags) > 0 and 'x' in ['x', 'y']");
    let ExprKind::Binary { left, right, .. } = expr.kind else {
        panic!("expected binary");
    };
    let ExprKind::Binary { left: call, .. } = left.kind else {
        panic!("expected comparison");
    };
    let ExprKind::Call { name, args } = call.kind else {
        panic!("expected call");
    };
    assert_eq!(name, "len");
    assert_eq!(
        args[0].kind,
        ExprKind::Path(vec!["items".into(), "0".into(), "tags".into()])
    );
    assert!(matches!(
        right.kind,
        ExprKind::Binary { op: BinOp::In, ref right, .. } if matches!(&right.kind, ExprKind::List(items) if items.len() == 2)
    ));
}

#[test]
fn nesting_limit() {
    let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
    let err = parse_err(&format!("<?if cond=\"{deep}\"?><?/if?>"));
    assert_eq!(err.code, ErrorCode::NESTING_LIMIT_EXCEEDED);
}

fn nested_ifs(levels: usize) -> String {
    let open = "<?if cond=\"1\"?>\n".repeat(levels);
    let close = "<?/if?>".repeat(levels);
    format!("{open}x{close}")
}

#[test]
fn instruction_nesting_limit() {
    assert!(parse_template("deep.hrml", &nested_ifs(64)).is_ok());

    let err = parse_err(&nested_ifs(65));
    assert_eq!(err.code, ErrorCode::NESTING_LIMIT_EXCEEDED);
    assert_eq!(err.span.start_line, 65);
}

#[test]
fn nesting_limit_holds_on_small_stacks() {
    let source = nested_ifs(10_000);
    let err = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || parse_template("deep.hrml", &source).map(|_| ()))
        .unwrap()
        .join()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NESTING_LIMIT_EXCEEDED);
}

// ══════════════════════════════════════════════════════════════════════════════
// Styles, scripts and actions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn style_body_is_raw_and_scopes_text() {
    let tree = parse_ok(
        "<div class=\"card\"><?get id=\"x\"?></div><?style?>.card { color: red } .card-title {}<?/style?>",
    );
    let Node::Text(text) = &tree.nodes[0] else {
        panic!("expected text");
    };
    let scope = text.scope.as_ref().expect("text should be scoped");
    assert_eq!(&*scope.component, "page.hrml");
    assert_eq!(
        scope.classes.iter().cloned().collect::<Vec<_>>(),
        vec!["card".to_string(), "card-title".to_string()]
    );
    let Node::Style(style) = &tree.nodes[3] else {
        panic!("expected style");
    };
    assert!(style.scoped);
    assert_eq!(style.css, ".card { color: red } .card-title {}");
}

#[test]
fn global_style_does_not_scope() {
    let tree = parse_ok("<p class=\"a\"></p><?style global?>.a {}<?/style?>");
    assert!(matches!(&tree.nodes[0], Node::Text(t) if t.scope.is_none()));
    assert!(matches!(&tree.nodes[1], Node::Style(s) if !s.scoped));
}

#[test]
fn script_keeps_attributes() {
    let tree = parse_ok(r#"<?script type="module" defer?>var d = <?json id="data"?>;<?/script?>"#);
    let Node::Script(script) = &tree.nodes[0] else {
        panic!("expected script");
    };
    assert_eq!(
        script.attrs,
        vec![
            ("type".to_string(), Some("module".to_string())),
            ("defer".to_string(), None)
        ]
    );
    assert!(matches!(&script.children[1], Node::Json(_)));
}

#[test]
fn action_defaults() {
    let tree = parse_ok(r#"<?btn post="/api/save"?>Save<?/btn?>"#);
    let Node::Action(action) = &tree.nodes[0] else {
        panic!("expected action");
    };
    assert_eq!(action.kind, ActionKind::Button);
    assert_eq!(action.method, "post");
    assert_eq!(action.endpoint, "/api/save");
    assert_eq!(action.target, "#body");
    assert_eq!(action.swap, "innerHTML");
    assert_eq!(action.class, None);
}

#[test]
fn action_requires_a_method() {
    let err = parse_err(r##"<?link target="#x"?>Go<?/link?>"##);
    assert_eq!(err.code, ErrorCode::MISSING_ATTRIBUTE);
}
