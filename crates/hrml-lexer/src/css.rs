//! Class-selector scanner for style text.
//!
//! Finds `.name` tokens in selector preludes only. Declarations, comments,
//! strings and at-rule preludes are skipped, so `width: 1.5rem` or
//! `url(logo.png)` are never mistaken for selectors. Blocks of the
//! conditional group at-rules (`@media`, `@supports`, ...) contain rules
//! and are scanned like the top level.

use std::ops::Range;

/// At-rules whose blocks contain further style rules.
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "container", "layer", "document", "scope"];

/// A class selector occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSelector {
    /// Class name without the leading dot.
    pub name: String,
    /// Byte range of the name inside the scanned text.
    pub range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Rules,
    Declarations,
}

/// Locate every class selector in `css`, in source order.
pub fn class_selectors(css: &str) -> Vec<ClassSelector> {
    let bytes = css.as_bytes();
    let mut found = Vec::new();
    let mut pending = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut prelude_start = 0usize;
    let mut pos = 0usize;

    while pos < bytes.len() {
        let in_rules = stack.last().copied().unwrap_or(Block::Rules) == Block::Rules;
        match bytes[pos] {
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = css[pos + 2..].find("*/").map_or(bytes.len(), |i| pos + 2 + i + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                pos = skip_string(bytes, pos + 1, quote);
                continue;
            }
            b'\\' => {
                pos += 2;
                continue;
            }
            b'{' => {
                let prelude = css[prelude_start..pos].trim_start();
                if !in_rules {
                    stack.push(Block::Declarations);
                } else if let Some(at_rule) = prelude.strip_prefix('@') {
                    let name: String = at_rule
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                        .collect();
                    if GROUPING_AT_RULES.contains(&name.to_ascii_lowercase().as_str()) {
                        stack.push(Block::Rules);
                    } else {
                        stack.push(Block::Declarations);
                    }
                } else {
                    found.append(&mut pending);
                    stack.push(Block::Declarations);
                }
                pending.clear();
                prelude_start = pos + 1;
            }
            b'}' => {
                stack.pop();
                pending.clear();
                prelude_start = pos + 1;
            }
            b';' if in_rules => {
                // `@import ...;` and friends end without a block
                pending.clear();
                prelude_start = pos + 1;
            }
            b'.' if in_rules && bytes.get(pos + 1).is_some_and(|&b| is_name_start(b)) => {
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                pending.push(ClassSelector {
                    name: css[start..end].to_string(),
                    range: start..end,
                });
                pos = end;
                continue;
            }
            _ => {}
        }
        pos += 1;
    }

    found
}

fn skip_string(bytes: &[u8], mut pos: usize, quote: u8) -> usize {
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'-' || b >= 0x80
}

fn is_name_byte(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit()
}
