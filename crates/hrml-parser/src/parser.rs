//! Template parser: pairs instruction segments into a syntax tree.

use std::sync::Arc;

use hrml_lexer::{Instruction, MarkupLexer, Segment};
use hrml_types::ast::*;
use hrml_types::{ErrorCode, Location, SourceFile, Span, TemplateError};

use crate::parse_expr::parse_expression;
use crate::scope::attach_style_scope;

/// Instructions that never take children or a closing marker.
const SELF_CLOSING: &[&str] = &["load", "get", "asset", "json"];

/// Attributes of `<?call?>` that are not endpoint arguments.
const CALL_RESERVED: &[&str] = &["endpoint", "as", "method", "cache"];

/// Longest `cache` duration a `<?call?>` may declare: one year.
const MAX_CACHE_SECS: u64 = 365 * 24 * 60 * 60;

/// Deepest nesting of block-form instructions.
const MAX_DEPTH: usize = 64;

/// Method attributes accepted by the action directives.
const ACTION_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// The HRML template parser.
///
/// Pulls segments from the markup lexer and builds nodes recursively; each
/// block-form instruction owns the nodes up to its matching close.
pub struct Parser<'src> {
    lexer: MarkupLexer<'src>,
    source_file: &'src SourceFile,
    path: Arc<str>,
    /// Block-form instructions currently open.
    depth: usize,
}

/// Children of one block-form instruction.
#[derive(Default)]
struct Body {
    nodes: Vec<Node>,
    /// The `<?else?>` of an If or the `<?error?>` of a Call.
    branch: Option<Vec<Node>>,
}

impl<'src> Parser<'src> {
    /// Create a parser for one template file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            lexer: MarkupLexer::new(source_file),
            source_file,
            path: Arc::from(source_file.name.as_str()),
            depth: 0,
        }
    }

    /// Parse the whole file.
    pub fn parse(mut self) -> hrml_types::Result<SyntaxTree> {
        let mut nodes = self.parse_body(None)?.nodes;
        attach_style_scope(&self.path, &mut nodes);
        Ok(SyntaxTree::new(self.path, nodes))
    }

    // ── Error Helpers ─────────────────────────────────────────────────────────

    fn error(&self, code: ErrorCode, message: impl Into<String>, span: Span) -> TemplateError {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        TemplateError::new(&self.source_file.name, code, message, span, source_line)
    }

    fn location(&self, span: Span) -> Location {
        Location::new(Arc::clone(&self.path), span)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Block Structure
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse nodes until the close matching `parent`, or end of input at the
    /// top level.
    fn parse_body(&mut self, parent: Option<&Instruction>) -> hrml_types::Result<Body> {
        let Some(open) = parent else {
            return self.parse_nodes(None);
        };
        if self.depth >= MAX_DEPTH {
            return Err(self.error(
                ErrorCode::NESTING_LIMIT_EXCEEDED,
                format!("instructions may nest at most {MAX_DEPTH} levels deep"),
                open.span,
            ));
        }
        self.depth += 1;
        let body = self.parse_nodes(parent);
        self.depth -= 1;
        body
    }

    fn parse_nodes(&mut self, parent: Option<&Instruction>) -> hrml_types::Result<Body> {
        let mut body = Body::default();
        let mut after_else = false;

        loop {
            let Some(segment) = self.lexer.next_segment()? else {
                return match parent {
                    Some(open) => Err(self.error(
                        ErrorCode::UNCLOSED_INSTRUCTION,
                        format!(
                            "unclosed <?{0}?>: reached end of input before <?/{0}?>",
                            open.name
                        ),
                        open.span,
                    )),
                    None => Ok(body),
                };
            };

            match segment {
                Segment::Text { text, span } => {
                    if after_else {
                        if text.trim().is_empty() {
                            continue;
                        }
                        return Err(self.content_after_else(span));
                    }
                    body.nodes.push(Node::text(text));
                }
                Segment::Close { name, span } => {
                    return match parent {
                        Some(open) if open.name == name => Ok(body),
                        Some(open) => Err(self.error(
                            ErrorCode::UNEXPECTED_CLOSE,
                            format!("<?/{name}?> does not close the open <?{}?>", open.name),
                            span,
                        )),
                        None if SELF_CLOSING.contains(&name.as_str()) => Err(self.error(
                            ErrorCode::UNEXPECTED_CLOSE,
                            format!("<?{name}?> is self-closing and takes no <?/{name}?>"),
                            span,
                        )),
                        None => Err(self.error(
                            ErrorCode::UNEXPECTED_CLOSE,
                            format!("<?/{name}?> without a matching <?{name}?>"),
                            span,
                        )),
                    };
                }
                Segment::Open(ins) => {
                    if after_else {
                        return Err(self.content_after_else(ins.span));
                    }
                    match ins.name.as_str() {
                        "else" if parent.is_some_and(|p| p.name == "if") => {
                            body.branch = Some(self.parse_body(Some(&ins))?.nodes);
                            after_else = true;
                        }
                        "else" => self.attach_trailing_else(&mut body.nodes, &ins)?,
                        "error" => {
                            if !parent.is_some_and(|p| p.name == "call") {
                                return Err(self.error(
                                    ErrorCode::MISPLACED_INSTRUCTION,
                                    "<?error?> is only allowed inside <?call?>",
                                    ins.span,
                                ));
                            }
                            if body.branch.is_some() {
                                return Err(self.error(
                                    ErrorCode::MISPLACED_INSTRUCTION,
                                    "a <?call?> takes at most one <?error?> branch",
                                    ins.span,
                                ));
                            }
                            body.branch = Some(self.parse_body(Some(&ins))?.nodes);
                        }
                        _ => {
                            let node = self.parse_instruction(ins)?;
                            body.nodes.push(node);
                        }
                    }
                }
            }
        }
    }

    fn content_after_else(&self, span: Span) -> TemplateError {
        self.error(
            ErrorCode::DANGLING_ELSE,
            "<?else?> must be the last thing inside its <?if?>",
            span,
        )
    }

    /// `<?if?>…<?/if?> <?else?>…<?/else?>`: the else attaches to the If
    /// immediately before it. Whitespace between the two is dropped.
    fn attach_trailing_else(
        &mut self,
        nodes: &mut Vec<Node>,
        ins: &Instruction,
    ) -> hrml_types::Result<()> {
        let last = nodes.iter().rposition(|node| !is_blank_text(node));
        let target = match last {
            Some(idx) if matches!(&nodes[idx], Node::If(n) if n.else_branch.is_none()) => idx,
            _ => {
                return Err(self.error(
                    ErrorCode::DANGLING_ELSE,
                    "dangling <?else?>: it must directly follow an <?if?>",
                    ins.span,
                ));
            }
        };
        nodes.truncate(target + 1);
        let branch = self.parse_body(Some(ins))?.nodes;
        if let Some(Node::If(node)) = nodes.last_mut() {
            node.else_branch = Some(branch);
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Instructions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_instruction(&mut self, ins: Instruction) -> hrml_types::Result<Node> {
        let loc = self.location(ins.span);
        let node = match ins.name.as_str() {
            "load" => Node::Load(Load {
                file: self.required(&ins, "file")?.to_string(),
                alias: self.optional_name(&ins, "as")?,
                loc,
            }),
            "get" => Node::Get(Get {
                value: self.expression(&ins, "id")?,
                default: optional(&ins, "default"),
                raw: ins.has_flag("raw"),
                loc,
            }),
            "asset" => Node::Asset(Asset {
                path: self.required(&ins, "path")?.to_string(),
                loc,
            }),
            "json" => Node::Json(Json {
                value: self.expression(&ins, "id")?,
                loc,
            }),
            "set" => {
                let id = self.name(&ins, "id")?;
                Node::Set(Set {
                    id,
                    children: self.parse_body(Some(&ins))?.nodes,
                    loc,
                })
            }
            "if" => {
                let condition = self.expression(&ins, "cond")?;
                let body = self.parse_body(Some(&ins))?;
                Node::If(If {
                    condition,
                    then_branch: body.nodes,
                    else_branch: body.branch,
                    loc,
                })
            }
            "for" => self.parse_for(&ins, loc)?,
            "slot" => {
                let id = self.required(&ins, "id")?.to_string();
                Node::Slot(Slot {
                    id,
                    children: self.parse_body(Some(&ins))?.nodes,
                    loc,
                })
            }
            "block" => {
                let slot = self.required(&ins, "slot")?.to_string();
                Node::Block(Block {
                    slot,
                    children: self.parse_body(Some(&ins))?.nodes,
                    loc,
                })
            }
            "call" => self.parse_call(&ins, loc)?,
            "style" => Node::Style(Style {
                scoped: !ins.has_flag("global"),
                css: self.lexer.raw_until_close("style", ins.span)?,
                loc,
            }),
            "script" => Node::Script(Script {
                attrs: ins
                    .attrs
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect(),
                children: self.parse_body(Some(&ins))?.nodes,
                loc,
            }),
            name => match ActionKind::from_name(name) {
                Some(kind) => self.parse_action(kind, &ins, loc)?,
                None => {
                    return Err(self.error(
                        ErrorCode::UNEXPECTED_INPUT,
                        format!("unknown instruction <?{name}?>"),
                        ins.span,
                    ));
                }
            },
        };
        Ok(node)
    }

    /// `<?for item in="expr" index="i"?>` or `<?for item="x" in="expr"?>`
    fn parse_for(&mut self, ins: &Instruction, loc: Location) -> hrml_types::Result<Node> {
        let item = ins
            .attr("item")
            .and_then(|a| a.value.clone())
            .or_else(|| {
                ins.attrs
                    .iter()
                    .find(|a| a.value.is_none())
                    .map(|a| a.name.clone())
            })
            .ok_or_else(|| {
                self.error(
                    ErrorCode::MISSING_ATTRIBUTE,
                    "<?for?> needs a loop variable: <?for item in=\"...\"?>",
                    ins.span,
                )
            })?;
        if !is_identifier(&item) {
            return Err(self.error(
                ErrorCode::INVALID_ATTRIBUTE,
                format!("'{item}' is not a valid loop variable name"),
                ins.span,
            ));
        }
        let iterable = self.expression(ins, "in")?;
        let index = self.optional_name(ins, "index")?;
        let body = self.parse_body(Some(ins))?.nodes;
        Ok(Node::For(For {
            item,
            index,
            iterable,
            body,
            loc,
        }))
    }

    /// `<?call endpoint="/x" as="name" method="POST" cache="60" arg="expr"?>`
    fn parse_call(&mut self, ins: &Instruction, loc: Location) -> hrml_types::Result<Node> {
        let endpoint = self.required(ins, "endpoint")?.to_string();
        let as_name = self.name(ins, "as")?;
        let method = optional(ins, "method")
            .unwrap_or_else(|| "GET".to_string())
            .to_ascii_uppercase();

        let cache_secs = match ins.attr("cache") {
            None => None,
            Some(attr) => {
                let text = attr.value.as_deref().unwrap_or("");
                let secs = text
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|&secs| secs <= MAX_CACHE_SECS)
                    .ok_or_else(|| {
                        self.error(
                            ErrorCode::INVALID_ATTRIBUTE,
                            format!(
                                "cache duration must be a whole number of seconds \
                                 up to {MAX_CACHE_SECS}, got '{text}'"
                            ),
                            attr.span,
                        )
                    })?;
                Some(secs)
            }
        };

        let mut args = Vec::new();
        for attr in ins
            .attrs
            .iter()
            .filter(|a| !CALL_RESERVED.contains(&a.name.as_str()))
        {
            let (Some(value), Some(start)) = (&attr.value, attr.value_start) else {
                return Err(self.error(
                    ErrorCode::INVALID_ATTRIBUTE,
                    format!("argument '{}' of <?call?> needs a value", attr.name),
                    attr.span,
                ));
            };
            let expr = parse_expression(value, self.source_file, start)?;
            args.push((attr.name.clone(), expr));
        }

        let body = self.parse_body(Some(ins))?;
        Ok(Node::Call(Call {
            endpoint,
            as_name,
            method,
            cache_secs,
            args,
            body: body.nodes,
            on_error: body.branch,
            loc,
        }))
    }

    /// `<?btn post="/api/x" target="#list" swap="outerHTML"?>Label<?/btn?>`
    fn parse_action(
        &mut self,
        kind: ActionKind,
        ins: &Instruction,
        loc: Location,
    ) -> hrml_types::Result<Node> {
        let Some((method, endpoint)) = ins.attrs.iter().find_map(|a| {
            let method = a.name.to_ascii_lowercase();
            match &a.value {
                Some(v) if ACTION_METHODS.contains(&method.as_str()) => Some((method, v.clone())),
                _ => None,
            }
        }) else {
            return Err(self.error(
                ErrorCode::MISSING_ATTRIBUTE,
                format!(
                    "<?{}?> requires one of get, post, put, patch or delete",
                    ins.name
                ),
                ins.span,
            ));
        };
        let target = optional(ins, "target").unwrap_or_else(|| "#body".to_string());
        let swap = optional(ins, "swap").unwrap_or_else(|| "innerHTML".to_string());
        let class = optional(ins, "class");
        let children = self.parse_body(Some(ins))?.nodes;
        Ok(Node::Action(Action {
            kind,
            method,
            endpoint,
            target,
            swap,
            class,
            children,
            loc,
        }))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Attribute Helpers
    // ══════════════════════════════════════════════════════════════════════════

    /// A required, non-empty attribute value.
    fn required<'i>(&self, ins: &'i Instruction, name: &str) -> hrml_types::Result<&'i str> {
        match ins.attr(name) {
            Some(attr) => match attr.value.as_deref() {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(self.error(
                    ErrorCode::MISSING_ATTRIBUTE,
                    format!("'{name}' in <?{}?> needs a non-empty value", ins.name),
                    attr.span,
                )),
            },
            None => Err(self.error(
                ErrorCode::MISSING_ATTRIBUTE,
                format!("<?{}?> requires a '{name}' attribute", ins.name),
                ins.span,
            )),
        }
    }

    /// A required attribute naming a variable.
    fn name(&self, ins: &Instruction, attr: &str) -> hrml_types::Result<String> {
        let value = self.required(ins, attr)?;
        self.check_identifier(ins, attr, value)?;
        Ok(value.to_string())
    }

    /// An optional attribute naming a variable.
    fn optional_name(&self, ins: &Instruction, attr: &str) -> hrml_types::Result<Option<String>> {
        match ins.attr(attr) {
            None => Ok(None),
            Some(_) => self.name(ins, attr).map(Some),
        }
    }

    fn check_identifier(&self, ins: &Instruction, attr: &str, value: &str) -> hrml_types::Result<()> {
        if is_identifier(value) {
            return Ok(());
        }
        let span = ins.attr(attr).map_or(ins.span, |a| a.span);
        Err(self.error(
            ErrorCode::INVALID_ATTRIBUTE,
            format!("'{value}' is not a valid variable name for '{attr}'"),
            span,
        ))
    }

    /// A required attribute holding an expression.
    fn expression(&self, ins: &Instruction, name: &str) -> hrml_types::Result<Expression> {
        let text = self.required(ins, name)?;
        let start = ins
            .attr(name)
            .and_then(|a| a.value_start)
            .unwrap_or(ins.span);
        parse_expression(text, self.source_file, start)
    }
}

fn optional(ins: &Instruction, name: &str) -> Option<String> {
    ins.attr(name).and_then(|a| a.value.clone())
}

fn is_blank_text(node: &Node) -> bool {
    matches!(node, Node::Text(t) if t.text.trim().is_empty())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
