//! Parser module: tokens to syntax tree

#[allow(clippy::module_inception)]
mod parser;

pub use parser::{parse, ParseResult, Parser, SyntaxError};
