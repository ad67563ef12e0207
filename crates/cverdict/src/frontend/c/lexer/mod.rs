//! Lexer module for tokenizing C source code

mod scanner;
mod token;

pub use scanner::{tokenize, Lexer};
pub use token::{Token, TokenClass, TokenKind};
