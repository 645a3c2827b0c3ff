//! HRML parser: converts template text into a [`SyntaxTree`].
//!
//! Parsing is per file and fails fast: the first malformed instruction or
//! expression aborts with a [`TemplateError`](hrml_types::TemplateError).
//! No cross-file work happens here; `<?load?>` targets are kept as plain
//! path strings for the composer.

mod parse_expr;
mod parser;
mod scope;

pub use parse_expr::parse_expression;
pub use parser::Parser;

use hrml_types::ast::SyntaxTree;

/// Parse one template file.
pub fn parse_template(path: &str, source: &str) -> hrml_types::Result<SyntaxTree> {
    let source_file = hrml_types::SourceFile::new(path, source);
    Parser::new(&source_file).parse()
}
