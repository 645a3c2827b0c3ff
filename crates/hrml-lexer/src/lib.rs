//! HRML lexers.
//!
//! - [`markup`]: template text → literal text and processing-instruction segments
//! - [`lexer`]: attribute expression text → token stream
//! - [`css`]: locates class selectors in style text

pub mod css;
pub mod lexer;
pub mod markup;
pub mod token;

pub use css::{class_selectors, ClassSelector};
pub use lexer::Lexer;
pub use markup::{Attribute, Instruction, MarkupLexer, Segment, INSTRUCTION_NAMES};
pub use token::{Token, TokenKind};
