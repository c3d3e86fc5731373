//! A self-contained JSON codec: tokenizer, context-stack parser, and
//! streaming writer, all built on [`jsonc_mem`]'s bounded arena.
//!
//! A [`Parser`] owns one arena and produces a [`Document`] per call; a
//! [`Writer`] owns one output buffer and emits bytes incrementally through a
//! matching context stack of its own. Neither accepts JSON comments — see
//! `lexer` for why `/` is tokenized but never produces a comment.

pub mod error;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod span;
pub mod token;
pub mod value;
pub mod writer;

pub use error::{ParseError, ParseResult, WriteError, WriteResult};
pub use names::NameTable;
pub use parser::{Document, Parser};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use value::{ArenaStr, ArrayNode, NodeRef, ObjectNode, Value};
pub use writer::Writer;
