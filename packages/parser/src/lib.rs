//! # LML Parser
//!
//! Turns template text into a tree of [`TagNode`]s. Attribute values are kept
//! raw; giving them meaning is left to the interpreter's processors. Macro
//! tags (`<@name>`) keep their body as unparsed text so every expansion gets
//! an independent parse.

pub mod ast;
pub mod error;
pub mod parser;
pub mod tokenizer;


pub use ast::{Node, RawAttribute, Span, TagNode, TextNode, MACRO_SIGIL};
pub use error::{char_span, format_error, ParseError, ParseResult};
pub use parser::{parse, Parser};
pub use tokenizer::{tokenize, Token, Tokenizer};
