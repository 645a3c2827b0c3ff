//! Full-page document shell and script-safe JSON.

use hrml_eval::escape_html;
use hrml_types::Value;

use crate::config::{RenderConfig, SiteConfig};

/// Wrap rendered `body` markup in a complete HTML document.
///
/// The head carries the site title and meta tags, the site stylesheet, the
/// client script, and one `<style>` block holding `styles` when there are any.
pub fn wrap_page(site: &SiteConfig, render: &RenderConfig, body: &str, styles: &[String]) -> String {
    let mut head = vec![
        r#"<meta charset="UTF-8">"#.to_string(),
        r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#.to_string(),
        format!("<title>{}</title>", escape_html(&site.name)),
    ];
    if let Some(description) = &site.description {
        head.push(format!(
            r#"<meta name="description" content="{}">"#,
            escape_html(description)
        ));
    }
    if let Some(favicon) = &site.favicon {
        head.push(format!(r#"<link rel="icon" href="{}">"#, escape_html(favicon)));
    }
    head.push(format!(
        r#"<link rel="stylesheet" href="{}">"#,
        escape_html(&render.stylesheet)
    ));
    head.push(format!(
        r#"<script src="{}"></script>"#,
        escape_html(&render.client_script)
    ));
    if !styles.is_empty() {
        head.push(format!("<style>\n{}\n</style>", styles.join("\n")));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n{}\n</head>\n<body>\n{}\n</body>\n</html>",
        head.join("\n"),
        body
    )
}

/// Serialize `value` as JSON that can sit inside a `<script>` element.
///
/// `<`, `>`, `&`, U+2028 and U+2029 are written as `\u` escapes, so the text
/// never closes the element or opens a comment.
pub fn script_safe_json(value: &Value) -> String {
    let json = value.to_json_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}
