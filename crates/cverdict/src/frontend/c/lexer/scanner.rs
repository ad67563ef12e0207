//! Lexer implementation using logos

use super::token::{Token, TokenClass, TokenKind};
use crate::common::{LineIndex, Position, Span};
use logos::Logos;

/// Lexer for C source code.
///
/// Never fails: malformed input comes out as `TokenKind::Invalid` and
/// scanning resumes after it. The stream always ends with a single `Eof`.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    index: LineIndex,
    /// End of the last token scanned, comments included
    cursor: Position,
    keep_comments: bool,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            index: LineIndex::new(source),
            cursor: Position::new(1, 1, 0),
            keep_comments: false,
            at_eof: false,
        }
    }

    /// Emit comment tokens instead of skipping them
    pub fn with_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Option<Token> {
        if self.at_eof {
            return None;
        }

        loop {
            let Some(result) = self.inner.next() else {
                self.at_eof = true;
                let len = self.inner.source().len();
                let span = self.advance_to(len..len);
                return Some(Token::new(TokenKind::Eof, "", span));
            };

            let range = self.inner.span();
            let source = self.inner.source();
            let lexeme = source.get(range.clone()).unwrap_or_default();
            let previous = self.cursor;
            let span = self.advance_to(range.clone());
            let first_on_line = previous.offset == 0 || previous.line < span.start.line;

            let kind = match result {
                Ok(kind) if kind.class() == TokenClass::Comment && !self.keep_comments => {
                    continue;
                }
                Ok(TokenKind::Directive) if !first_on_line => {
                    TokenKind::Invalid("stray '#' in program".to_string())
                }
                Ok(kind) => kind,
                Err(()) if lexeme.starts_with("/*") => {
                    TokenKind::Invalid("unterminated block comment".to_string())
                }
                Err(()) => {
                    let found = source
                        .get(range.start..)
                        .and_then(|rest| rest.chars().next())
                        .unwrap_or('?');
                    TokenKind::Invalid(format!("unexpected character '{}'", found))
                }
            };
            return Some(Token::new(kind, lexeme, span));
        }
    }

    /// Tokenize the entire source and return all tokens, `Eof` included
    pub fn tokenize_all(self) -> Vec<Token> {
        self.collect()
    }

    /// Get the source being lexed
    pub fn source(&self) -> &'a str {
        self.inner.source()
    }

    /// Span of `range`, resolved from the cursor so columns stay linear
    /// on long lines
    fn advance_to(&mut self, range: std::ops::Range<usize>) -> Span {
        let source = self.inner.source();
        let start = self.index.position_after(source, self.cursor, range.start);
        let end = self.index.position_after(source, start, range.end);
        self.cursor = end;
        Span::new(start, end)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Tokenize `source`, skipping comments
pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer::new(source)
}
