//! Recursive descent parser for C
//!
//! Syntax errors never escape [`Parser::parse`]. A failing construct returns
//! `Err(SyntaxError)` up to the nearest statement or declaration boundary,
//! where it is turned into a diagnostic, replaced by an error placeholder and
//! followed by resynchronization.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::common::{Diagnostic, Span};
use crate::frontend::c::ast::*;
use crate::frontend::c::lexer::{Token, TokenKind};

/// Library typedef names known without expanding any `#include`
const BUILTIN_TYPEDEFS: &[&str] = &[
    "size_t", "ssize_t", "ptrdiff_t", "FILE", "bool", "int8_t", "int16_t", "int32_t",
    "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "intptr_t", "uintptr_t",
    "va_list", "off_t", "time_t", "wchar_t",
];

/// A syntax error at a single location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

pub type ParseResult<T> = Result<T, SyntaxError>;

/// Deepest nesting of statements, parentheses, initializers and
/// declarators the parser follows
const MAX_NESTING: usize = 128;

/// Tallest expression tree the parser builds, counting each operator of a
/// left-associative chain as one level
const MAX_HEIGHT: usize = 1024;

/// Parse a token stream into a translation unit plus syntax diagnostics
pub fn parse<I>(tokens: I) -> (TranslationUnit, Vec<Diagnostic>)
where
    I: IntoIterator<Item = Token>,
{
    Parser::new(tokens.into_iter()).parse()
}

/// A declarator after its derivations have been applied to the base type
struct Declarator {
    name: Option<(String, Span)>,
    ty: CType,
}

/// One step from a base type toward a declared type
enum Derivation {
    Pointer(TypeQualifiers),
    Array(Option<usize>),
    Function(Vec<ParamDecl>, bool),
}

/// Recursive descent parser for C
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    current: Token,
    lookahead: VecDeque<Token>,
    /// Span of the last consumed token
    prev_span: Span,
    typedefs: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
    height: usize,
    /// `return` keywords consumed so far
    returns: usize,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        let mut parser = Self {
            tokens,
            current: Token::new(TokenKind::Eof, "", Span::default()),
            lookahead: VecDeque::new(),
            prev_span: Span::default(),
            typedefs: BUILTIN_TYPEDEFS.iter().map(ToString::to_string).collect(),
            diagnostics: Vec::new(),
            depth: 0,
            height: 0,
            returns: 0,
        };
        parser.current = parser.pull();
        parser
    }

    /// Parse a complete translation unit
    pub fn parse(mut self) -> (TranslationUnit, Vec<Diagnostic>) {
        let mut declarations = Vec::new();

        while !self.at_end() {
            if self.check(&TokenKind::RBrace) {
                let token = self.advance();
                self.report(SyntaxError::new("unexpected '}' at file scope", token.span));
                continue;
            }
            if self.match_token(&TokenKind::Semi) {
                continue;
            }

            let start = self.current.span;
            let returns = self.returns;
            match self.parse_declaration(true) {
                Ok(decl) => declarations.push(decl),
                Err(error) => {
                    self.report(error);
                    self.synchronize();
                    if self.check(&TokenKind::RBrace) {
                        self.advance();
                    }
                    let kind = DeclKind::Error {
                        skipped_return: self.returns > returns,
                    };
                    declarations.push(Declaration::new(kind, self.finish(start)));
                }
            }
        }

        (TranslationUnit::new(declarations), self.diagnostics)
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Next significant token; trivia is dropped and lexer errors reported
    fn pull(&mut self) -> Token {
        loop {
            match self.tokens.next() {
                Some(token) if token.kind.is_trivia() => {}
                Some(Token {
                    kind: TokenKind::Invalid(message),
                    span,
                    ..
                }) => self.diagnostics.push(Diagnostic::syntax(message, span)),
                Some(token) => return token,
                None => {
                    let end = self.current.span.end_point().merge(self.prev_span.end_point());
                    return Token::new(TokenKind::Eof, "", Span::point(end.end));
                }
            }
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let next = match self.lookahead.pop_front() {
            Some(token) => token,
            None => self.pull(),
        };
        let prev = std::mem::replace(&mut self.current, next);
        self.prev_span = prev.span;
        if matches!(prev.kind, TokenKind::Return) {
            self.returns += 1;
        }
        prev
    }

    fn peek(&mut self) -> &TokenKind {
        self.peek_nth(0)
    }

    /// Token `n + 1` places past the current one
    fn peek_nth(&mut self, n: usize) -> &TokenKind {
        while self.lookahead.len() <= n {
            let token = self.pull();
            self.lookahead.push_back(token);
        }
        &self.lookahead[n].kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                format!("expected {}, found {}", kind, self.describe_current()),
                self.current.span,
            ))
        }
    }

    /// Statement terminator.
    ///
    /// When the next token cannot continue the construct (a closing brace,
    /// end of input, or anything on a later line) the `;` is reported at the
    /// end of the previous token and parsing carries on as if it were there.
    fn expect_semi(&mut self) -> ParseResult<()> {
        if self.match_token(&TokenKind::Semi) {
            return Ok(());
        }

        let on_later_line = self.current.span.line() > self.prev_span.end.line;
        if on_later_line || matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            let message = format!("expected ';' before {}", self.describe_current());
            self.report(SyntaxError::new(message, self.prev_span.end_point()));
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("expected ';', found {}", self.describe_current()),
                self.current.span,
            ))
        }
    }

    fn describe_current(&self) -> String {
        match self.current.kind {
            TokenKind::Eof => "end of file".to_string(),
            _ => format!("'{}'", self.current.lexeme),
        }
    }

    fn error_here(&self, what: &str) -> SyntaxError {
        SyntaxError::new(
            format!("expected {}, found {}", what, self.describe_current()),
            self.current.span,
        )
    }

    fn report(&mut self, error: SyntaxError) {
        self.diagnostics.push(Diagnostic::syntax(error.message, error.span));
    }

    /// Span from `start` through the last consumed token
    fn finish(&self, start: Span) -> Span {
        if self.prev_span.end.offset < start.start.offset {
            start
        } else {
            start.merge(self.prev_span)
        }
    }

    /// Parse one nesting level down
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING || self.height >= MAX_HEIGHT {
            return Err(SyntaxError::new("nesting is too deep", self.current.span));
        }
        self.depth += 1;
        self.height += 1;
        let result = parse(self);
        self.depth -= 1;
        self.height -= 1;
        result
    }

    /// Run `parse`, which may [`grow`](Self::grow) the tree, then restore the height
    fn chained<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let height = self.height;
        let result = parse(self);
        self.height = height;
        result
    }

    /// One more operator on a left-associative chain
    fn grow(&mut self) -> ParseResult<()> {
        if self.height >= MAX_HEIGHT {
            return Err(SyntaxError::new("expression is too deeply nested", self.current.span));
        }
        self.height += 1;
        Ok(())
    }

    /// Skip to the next statement or declaration boundary.
    ///
    /// Stops after a `;` or a balanced `}` closing a block opened while
    /// skipping, or before a `}` that closes the enclosing block.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, Span)> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            let token = self.advance();
            Ok((name, token.span))
        } else {
            Err(self.error_here(what))
        }
    }

    fn is_typedef_name(&self, kind: &TokenKind) -> bool {
        matches!(kind, TokenKind::Identifier(name) if self.typedefs.contains(name))
    }

    /// Does the current token begin a type name (for casts and `sizeof`)
    fn is_type_start(&self, kind: &TokenKind) -> bool {
        kind.can_start_declaration() || self.is_typedef_name(kind)
    }

    /// Treat an unknown identifier as a typedef name when only a declarator
    /// can follow it: `pid_t pid`, `DIR *dir = ...`.
    ///
    /// In statement position `a * b` could be a product, so a pointer
    /// declarator is accepted only when its name is followed by something a
    /// discarded product never is.
    fn adopt_type_name(&mut self, in_statement: bool) -> bool {
        let TokenKind::Identifier(name) = &self.current.kind else {
            return false;
        };
        if self.typedefs.contains(name) {
            return false;
        }
        let name = name.clone();

        let mut n = 0;
        while matches!(self.peek_nth(n), TokenKind::Star) {
            n += 1;
        }
        let names_declarator = matches!(self.peek_nth(n), TokenKind::Identifier(_));
        let declarator = names_declarator
            && (n == 0
                || !in_statement
                || matches!(
                    self.peek_nth(n + 1),
                    TokenKind::Eq
                        | TokenKind::Semi
                        | TokenKind::Comma
                        | TokenKind::LBracket
                        | TokenKind::RParen
                ));
        if declarator {
            self.typedefs.insert(name);
        }
        declarator
    }

    /// Does the current token begin a declaration
    fn starts_declaration(&mut self) -> bool {
        if self.current.kind.can_start_declaration() {
            return true;
        }
        if self.adopt_type_name(true) {
            return true;
        }
        if !self.is_typedef_name(&self.current.kind) {
            return false;
        }
        matches!(
            self.peek(),
            TokenKind::Identifier(_)
                | TokenKind::Star
                | TokenKind::Const
                | TokenKind::Volatile
                | TokenKind::Restrict
        )
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn parse_declaration(&mut self, top_level: bool) -> ParseResult<Declaration> {
        let start = self.current.span;
        let (storage_class, base_type) = self.parse_declaration_specifiers()?;

        // struct/union/enum without declarator
        if self.match_token(&TokenKind::Semi) {
            let span = self.finish(start);
            return Ok(Declaration::new(tag_declaration(base_type, span), span));
        }

        let first = self.parse_declarator(base_type.clone(), false)?;

        if matches!(first.ty.kind, TypeKind::Function { .. }) && self.check(&TokenKind::LBrace) {
            if !top_level {
                return Err(SyntaxError::new(
                    "function definition is not allowed here",
                    self.current.span,
                ));
            }
            let body = self.parse_block();
            let span = self.finish(start);
            let func = function_decl(first, storage_class, span).with_body(body);
            return Ok(Declaration::new(DeclKind::Function(func), span));
        }

        let mut declarators = Vec::new();
        let mut next = first;
        loop {
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            declarators.push((next, init));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
            next = self.parse_declarator(base_type.clone(), false)?;
        }
        self.expect_semi()?;
        let span = self.finish(start);

        if storage_class == Some(StorageClass::Typedef) {
            let mut typedefs = Vec::new();
            for (declarator, _) in declarators {
                if let Some((name, name_span)) = declarator.name {
                    self.typedefs.insert(name.clone());
                    typedefs.push(TypedefDecl::new(name, name_span, declarator.ty, span));
                }
            }
            return Ok(Declaration::new(DeclKind::Typedef(typedefs), span));
        }

        if declarators.len() == 1 {
            let (declarator, init) = declarators.remove(0);
            if matches!(declarator.ty.kind, TypeKind::Function { .. }) {
                let func = function_decl(declarator, storage_class, span);
                return Ok(Declaration::new(DeclKind::Function(func), span));
            }
            let var = var_decl(declarator, storage_class, init, span);
            return Ok(Declaration::new(DeclKind::Variable(var), span));
        }

        let vars = declarators
            .into_iter()
            .map(|(declarator, init)| var_decl(declarator, storage_class, init, span))
            .collect();
        Ok(Declaration::new(DeclKind::MultipleVariables(vars), span))
    }

    fn parse_declaration_specifiers(&mut self) -> ParseResult<(Option<StorageClass>, CType)> {
        let start = self.current.span;
        let mut storage_class = None;
        let mut type_specs = Vec::new();
        let mut qualifiers = TypeQualifiers::default();
        let mut signed: Option<bool> = None;
        let mut named: Option<TypeKind> = None;

        loop {
            if named.is_none() && type_specs.is_empty() && signed.is_none() {
                self.adopt_type_name(false);
            }
            match &self.current.kind {
                // Storage class
                TokenKind::Typedef => storage_class = Some(StorageClass::Typedef),
                TokenKind::Extern => storage_class = Some(StorageClass::Extern),
                TokenKind::Static => storage_class = Some(StorageClass::Static),
                TokenKind::Auto => storage_class = Some(StorageClass::Auto),
                TokenKind::Register => storage_class = Some(StorageClass::Register),
                TokenKind::ThreadLocal | TokenKind::Inline | TokenKind::Noreturn => {}

                // Type qualifiers
                TokenKind::Const => qualifiers.is_const = true,
                TokenKind::Volatile => qualifiers.is_volatile = true,
                TokenKind::Restrict => qualifiers.is_restrict = true,
                TokenKind::Atomic => {}

                // Sign specifiers
                TokenKind::Signed => signed = Some(true),
                TokenKind::Unsigned => signed = Some(false),

                // Type specifiers
                TokenKind::Void => type_specs.push("void"),
                TokenKind::Char => type_specs.push("char"),
                TokenKind::Short => type_specs.push("short"),
                TokenKind::Int => type_specs.push("int"),
                TokenKind::Long => type_specs.push("long"),
                TokenKind::Float => type_specs.push("float"),
                TokenKind::Double => type_specs.push("double"),
                TokenKind::Bool => type_specs.push("_Bool"),
                TokenKind::Complex => {}

                // Struct/union/enum
                TokenKind::Struct | TokenKind::Union | TokenKind::Enum if named.is_none() => {
                    let keyword = self.advance();
                    named = Some(match keyword.kind {
                        TokenKind::Struct => self.nested(|p| p.parse_struct_or_union(true))?,
                        TokenKind::Union => self.nested(|p| p.parse_struct_or_union(false))?,
                        _ => self.parse_enum()?,
                    });
                    continue;
                }

                // Typedef name, only where no other type has been given
                TokenKind::Identifier(name)
                    if named.is_none()
                        && type_specs.is_empty()
                        && signed.is_none()
                        && self.typedefs.contains(name) =>
                {
                    named = Some(TypeKind::Typedef(name.clone()));
                }

                _ => break,
            }
            self.advance();
        }

        let kind = match named {
            Some(kind) if type_specs.is_empty() && signed.is_none() => kind,
            Some(_) => {
                return Err(SyntaxError::new(
                    "two or more data types in declaration specifiers",
                    self.finish(start),
                ));
            }
            None => self.type_from_specifiers(&type_specs, signed, start)?,
        };

        let span = self.finish(start);
        Ok((storage_class, CType::new(kind, span).with_qualifiers(qualifiers)))
    }

    fn type_from_specifiers(
        &self,
        specs: &[&str],
        signed: Option<bool>,
        start: Span,
    ) -> ParseResult<TypeKind> {
        let is_signed = signed.unwrap_or(true);

        let mut sorted = specs.to_vec();
        sorted.sort_unstable();
        match sorted.as_slice() {
            [] if signed.is_none() => Err(SyntaxError::new(
                format!("expected type specifier, found {}", self.describe_current()),
                self.current.span,
            )),
            [] | ["int"] => Ok(TypeKind::Int { signed: is_signed }),
            ["void"] if signed.is_none() => Ok(TypeKind::Void),
            ["char"] => Ok(TypeKind::Char { signed: is_signed }),
            ["short"] | ["int", "short"] => Ok(TypeKind::Short { signed: is_signed }),
            ["long"] | ["int", "long"] => Ok(TypeKind::Long { signed: is_signed }),
            ["long", "long"] | ["int", "long", "long"] => {
                Ok(TypeKind::LongLong { signed: is_signed })
            }
            ["float"] if signed.is_none() => Ok(TypeKind::Float),
            ["double"] | ["double", "long"] if signed.is_none() => Ok(TypeKind::Double),
            ["_Bool"] if signed.is_none() => Ok(TypeKind::Bool),
            _ => Err(SyntaxError::new(
                format!("invalid combination of type specifiers '{}'", specs.join(" ")),
                self.finish(start),
            )),
        }
    }

    fn parse_struct_or_union(&mut self, is_struct: bool) -> ParseResult<TypeKind> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let members = if self.match_token(&TokenKind::LBrace) {
            let mut members = Vec::new();

            while !self.check(&TokenKind::RBrace) && !self.at_end() {
                let (_, base_type) = self.parse_declaration_specifiers()?;
                // Anonymous struct/union member
                if self.match_token(&TokenKind::Semi) {
                    continue;
                }
                loop {
                    let member = if self.check(&TokenKind::Colon) {
                        Declarator {
                            name: None,
                            ty: base_type.clone(),
                        }
                    } else {
                        self.parse_declarator(base_type.clone(), false)?
                    };
                    // Bit field width
                    if self.match_token(&TokenKind::Colon) {
                        self.parse_constant_expression()?;
                    }
                    let member_name = member.name.map(|(name, _)| name).unwrap_or_default();
                    members.push((member_name, member.ty));

                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_semi()?;
            }

            self.expect(TokenKind::RBrace)?;
            members
        } else if name.is_none() {
            return Err(self.error_here("struct or union name or body"));
        } else {
            Vec::new() // Forward declaration
        };

        if is_struct {
            Ok(TypeKind::Struct { name, members })
        } else {
            Ok(TypeKind::Union { name, members })
        }
    }

    fn parse_enum(&mut self) -> ParseResult<TypeKind> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let variants = if self.match_token(&TokenKind::LBrace) {
            let mut variants = Vec::new();
            let mut next_value: i64 = 0;

            while !self.check(&TokenKind::RBrace) && !self.at_end() {
                let (variant_name, _) = self.expect_identifier("enumerator name")?;

                if self.match_token(&TokenKind::Eq) {
                    let expr = self.parse_constant_expression()?;
                    if let Some(value) = expr.constant_value() {
                        next_value = value;
                    }
                }

                variants.push((variant_name, Some(next_value)));
                next_value = next_value.wrapping_add(1);

                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }

            self.expect(TokenKind::RBrace)?;
            variants
        } else if name.is_none() {
            return Err(self.error_here("enum name or body"));
        } else {
            Vec::new() // Forward declaration
        };

        Ok(TypeKind::Enum { name, variants })
    }

    // =========================================================================
    // Declarators
    // =========================================================================

    /// Parse a declarator and apply it to `base_type`.
    ///
    /// With `abstract_ok` the name may be omitted, as in parameter lists and
    /// type names.
    fn parse_declarator(&mut self, base_type: CType, abstract_ok: bool) -> ParseResult<Declarator> {
        let (name, derivations) = self.parse_declarator_parts(abstract_ok)?;

        let mut ty = base_type;
        for derivation in derivations {
            let span = ty.span;
            ty = match derivation {
                Derivation::Pointer(qualifiers) => {
                    CType::pointer_to(ty, span).with_qualifiers(qualifiers)
                }
                Derivation::Array(size) => CType::new(
                    TypeKind::Array {
                        element: Box::new(ty),
                        size,
                    },
                    span,
                ),
                Derivation::Function(params, variadic) => CType::new(
                    TypeKind::Function {
                        return_type: Box::new(ty),
                        params,
                        variadic,
                    },
                    span,
                ),
            };
        }

        Ok(Declarator { name, ty })
    }

    /// Derivations are returned innermost-type first: for `*a[3]` the
    /// pointer applies before the array.
    fn parse_declarator_parts(
        &mut self,
        abstract_ok: bool,
    ) -> ParseResult<(Option<(String, Span)>, Vec<Derivation>)> {
        let mut pointers = Vec::new();
        while self.match_token(&TokenKind::Star) {
            let mut qualifiers = TypeQualifiers::default();
            loop {
                match &self.current.kind {
                    TokenKind::Const => qualifiers.is_const = true,
                    TokenKind::Volatile => qualifiers.is_volatile = true,
                    TokenKind::Restrict => qualifiers.is_restrict = true,
                    _ => break,
                }
                self.advance();
            }
            pointers.push(Derivation::Pointer(qualifiers));
        }

        let mut inner = Vec::new();
        let name = if self.check(&TokenKind::LParen) && self.paren_starts_declarator() {
            // Parenthesized declarator: int (*fp)(int)
            self.advance();
            let (name, derivations) = self.nested(|p| p.parse_declarator_parts(abstract_ok))?;
            self.expect(TokenKind::RParen)?;
            inner = derivations;
            name
        } else if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            let token = self.advance();
            Some((name, token.span))
        } else if abstract_ok {
            None
        } else {
            return Err(self.error_here("identifier in declarator"));
        };

        let mut suffixes = self.parse_declarator_suffixes()?;
        suffixes.reverse();

        let mut derivations = pointers;
        derivations.extend(suffixes);
        derivations.extend(inner);
        Ok((name, derivations))
    }

    /// `(` opens a nested declarator rather than a parameter list
    fn paren_starts_declarator(&mut self) -> bool {
        match self.peek().clone() {
            TokenKind::Star | TokenKind::LParen => true,
            TokenKind::Identifier(name) => !self.typedefs.contains(&name),
            _ => false,
        }
    }

    fn parse_declarator_suffixes(&mut self) -> ParseResult<Vec<Derivation>> {
        let mut suffixes = Vec::new();
        loop {
            if self.match_token(&TokenKind::LBracket) {
                while matches!(
                    self.current.kind,
                    TokenKind::Static | TokenKind::Const | TokenKind::Restrict | TokenKind::Volatile
                ) {
                    self.advance();
                }
                let size = if self.check(&TokenKind::RBracket) {
                    None
                } else if self.check(&TokenKind::Star) && matches!(self.peek(), TokenKind::RBracket) {
                    self.advance();
                    None
                } else {
                    let expr = self.parse_assignment_expression()?;
                    expr.constant_value().and_then(|n| usize::try_from(n).ok())
                };
                self.expect(TokenKind::RBracket)?;
                suffixes.push(Derivation::Array(size));
            } else if self.match_token(&TokenKind::LParen) {
                let (params, variadic) = self.nested(Self::parse_parameter_list)?;
                self.expect(TokenKind::RParen)?;
                suffixes.push(Derivation::Function(params, variadic));
            } else {
                return Ok(suffixes);
            }
        }
    }

    fn parse_parameter_list(&mut self) -> ParseResult<(Vec<ParamDecl>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;

        if self.check(&TokenKind::RParen) {
            return Ok((params, variadic));
        }

        // (void)
        if self.check(&TokenKind::Void) && matches!(self.peek(), TokenKind::RParen) {
            self.advance();
            return Ok((params, variadic));
        }

        loop {
            if self.match_token(&TokenKind::Ellipsis) {
                variadic = true;
                break;
            }

            let start = self.current.span;
            let (_, base_type) = self.parse_declaration_specifiers()?;
            let declarator = self.parse_declarator(base_type, true)?;
            params.push(ParamDecl::new(
                declarator.name,
                declarator.ty,
                self.finish(start),
            ));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok((params, variadic))
    }

    /// Type name in a cast, `sizeof` or compound literal
    fn parse_type_name(&mut self) -> ParseResult<CType> {
        let (_, base_type) = self.parse_declaration_specifiers()?;
        Ok(self.parse_declarator(base_type, true)?.ty)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_block(&mut self) -> Block {
        let start = self.current.span;
        if let Err(error) = self.expect(TokenKind::LBrace) {
            self.report(error);
            return Block::new(Vec::new(), start, start);
        }

        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            items.push(self.parse_block_item());
        }

        let close = if self.check(&TokenKind::RBrace) {
            self.advance().span
        } else {
            let eof = self.current.span;
            self.report(SyntaxError::new("expected '}' at end of input", eof));
            eof
        };

        Block::new(items, self.finish(start), close)
    }

    /// One block item; errors are recovered here
    fn parse_block_item(&mut self) -> BlockItem {
        let start = self.current.span;
        let returns = self.returns;
        let result = if self.starts_declaration() {
            self.parse_declaration(false).map(BlockItem::Declaration)
        } else {
            self.parse_statement().map(BlockItem::Statement)
        };

        match result {
            Ok(item) => item,
            Err(error) => {
                self.report(error);
                self.synchronize();
                let kind = StmtKind::Error {
                    skipped_return: self.returns > returns,
                };
                BlockItem::Statement(Stmt::new(kind, self.finish(start)))
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;

        match &self.current.kind {
            TokenKind::LBrace => {
                let block = self.parse_block();
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }

            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Case => self.parse_case_statement(),
            TokenKind::Default => self.parse_default_statement(),
            TokenKind::Break => {
                self.advance();
                self.expect_semi()?;
                Ok(Stmt::new(StmtKind::Break, self.finish(start)))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semi()?;
                Ok(Stmt::new(StmtKind::Continue, self.finish(start)))
            }
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Goto => self.parse_goto_statement(),

            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::new(StmtKind::Empty, start))
            }

            // Labeled statement
            TokenKind::Identifier(name) => {
                let name = name.clone();
                if matches!(self.peek(), TokenKind::Colon) {
                    self.advance(); // identifier
                    self.advance(); // colon
                    let stmt = if self.check(&TokenKind::RBrace) {
                        // label at the end of a block
                        Stmt::new(StmtKind::Empty, self.prev_span)
                    } else {
                        self.parse_statement()?
                    };
                    return Ok(Stmt::new(
                        StmtKind::Label {
                            name,
                            stmt: Box::new(stmt),
                        },
                        self.finish(start),
                    ));
                }
                self.parse_expression_statement()
            }

            _ if self.current.kind.can_start_declaration() => {
                let decl = self.parse_declaration(false)?;
                let span = decl.span;
                Ok(Stmt::new(StmtKind::Declaration(decl), span))
            }

            _ => self.parse_expression_statement(),
        }
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(condition)
    }

    fn parse_if_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::If)?;
        let condition = self.parse_condition()?;

        let then_branch = Box::new(self.parse_statement()?);

        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            self.finish(start),
        ))
    }

    fn parse_while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::While)?;
        let condition = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::new(StmtKind::While { condition, body }, self.finish(start)))
    }

    fn parse_do_while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Do)?;

        let body = Box::new(self.parse_statement()?);

        self.expect(TokenKind::While)?;
        let condition = self.parse_condition()?;
        self.expect_semi()?;

        Ok(Stmt::new(StmtKind::DoWhile { body, condition }, self.finish(start)))
    }

    fn parse_for_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        let init = if self.match_token(&TokenKind::Semi) {
            None
        } else if self.starts_declaration() {
            Some(ForInit::Declaration(self.parse_declaration(false)?))
        } else {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Semi)?;
            Some(ForInit::Expr(expr))
        };

        let condition = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semi)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen)?;

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::new(
            StmtKind::For {
                init,
                condition,
                update,
                body,
            },
            self.finish(start),
        ))
    }

    fn parse_switch_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Switch)?;
        let expr = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::new(StmtKind::Switch { expr, body }, self.finish(start)))
    }

    fn parse_case_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Case)?;
        let value = self.parse_constant_expression()?;
        self.expect(TokenKind::Colon)?;
        let stmt = Box::new(self.parse_label_body()?);

        Ok(Stmt::new(StmtKind::Case { value, stmt }, self.finish(start)))
    }

    fn parse_default_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Default)?;
        self.expect(TokenKind::Colon)?;
        let stmt = Box::new(self.parse_label_body()?);

        Ok(Stmt::new(StmtKind::Default(stmt), self.finish(start)))
    }

    /// Statement after `case x:`; an empty one is allowed before `}`
    fn parse_label_body(&mut self) -> ParseResult<Stmt> {
        if self.check(&TokenKind::RBrace) {
            Ok(Stmt::new(StmtKind::Empty, self.prev_span))
        } else {
            self.parse_statement()
        }
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Return)?;

        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semi()?;

        Ok(Stmt::new(StmtKind::Return(value), self.finish(start)))
    }

    fn parse_goto_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Goto)?;
        let (label, _) = self.expect_identifier("label name")?;
        self.expect_semi()?;

        Ok(Stmt::new(StmtKind::Goto(label), self.finish(start)))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span;
        let expr = self.parse_expression()?;
        self.expect_semi()?;

        Ok(Stmt::new(StmtKind::Expr(expr), self.finish(start)))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;
        let first = self.parse_assignment_expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut exprs = vec![first];
        while self.match_token(&TokenKind::Comma) {
            exprs.push(self.parse_assignment_expression()?);
        }
        Ok(Expr::new(ExprKind::Comma(exprs), self.finish(start)))
    }

    fn parse_constant_expression(&mut self) -> ParseResult<Expr> {
        self.parse_conditional_expression()
    }

    fn parse_assignment_expression(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;
        let left = self.parse_conditional_expression()?;

        if let Some(op) = self.get_assignment_op() {
            self.advance();
            let right = self.nested(Self::parse_assignment_expression)?;

            return Ok(Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(left),
                    value: Box::new(right),
                },
                self.finish(start),
            ));
        }

        Ok(left)
    }

    fn get_assignment_op(&self) -> Option<AssignOp> {
        match &self.current.kind {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::AddAssign),
            TokenKind::MinusEq => Some(AssignOp::SubAssign),
            TokenKind::StarEq => Some(AssignOp::MulAssign),
            TokenKind::SlashEq => Some(AssignOp::DivAssign),
            TokenKind::PercentEq => Some(AssignOp::ModAssign),
            TokenKind::AmpEq => Some(AssignOp::AndAssign),
            TokenKind::PipeEq => Some(AssignOp::OrAssign),
            TokenKind::CaretEq => Some(AssignOp::XorAssign),
            TokenKind::LtLtEq => Some(AssignOp::ShlAssign),
            TokenKind::GtGtEq => Some(AssignOp::ShrAssign),
            _ => None,
        }
    }

    fn parse_conditional_expression(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;
        let condition = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let then_expr = self.nested(Self::parse_expression)?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.nested(Self::parse_conditional_expression)?;

            return Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(condition),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                self.finish(start),
            ));
        }

        Ok(condition)
    }

    /// Left-associative binary operators by precedence climbing
    fn parse_binary_expression(&mut self, min_level: u8) -> ParseResult<Expr> {
        self.chained(|p| p.parse_binary_chain(min_level))
    }

    fn parse_binary_chain(&mut self, min_level: u8) -> ParseResult<Expr> {
        let start = self.current.span;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, level)) = binary_op(&self.current.kind) {
            if level < min_level {
                break;
            }
            self.grow()?;
            self.advance();
            let right = self.parse_binary_expression(level + 1)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.finish(start),
            );
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;

        let wrap: fn(Box<Expr>) -> ExprKind = match &self.current.kind {
            TokenKind::PlusPlus => ExprKind::PreIncrement,
            TokenKind::MinusMinus => ExprKind::PreDecrement,
            TokenKind::Amp => ExprKind::AddrOf,
            TokenKind::Star => ExprKind::Deref,
            TokenKind::Plus => |operand| ExprKind::Unary {
                op: UnaryOp::Plus,
                operand,
            },
            TokenKind::Minus => |operand| ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            },
            TokenKind::Bang => |operand| ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            },
            TokenKind::Tilde => |operand| ExprKind::Unary {
                op: UnaryOp::BitNot,
                operand,
            },
            TokenKind::Sizeof | TokenKind::Alignof => return self.parse_sizeof(),
            TokenKind::LParen => {
                let next = self.peek().clone();
                if self.is_type_start(&next) {
                    return self.parse_cast();
                }
                return self.parse_postfix_expression();
            }
            _ => return self.parse_postfix_expression(),
        };

        self.advance();
        let operand = self.nested(Self::parse_unary_expression)?;
        Ok(Expr::new(wrap(Box::new(operand)), self.finish(start)))
    }

    fn parse_sizeof(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;
        self.advance();

        if self.check(&TokenKind::LParen) {
            let next = self.peek().clone();
            if self.is_type_start(&next) {
                self.advance();
                let ty = self.parse_type_name()?;
                self.expect(TokenKind::RParen)?;
                return Ok(Expr::new(
                    ExprKind::Sizeof(SizeofArg::Type(ty)),
                    self.finish(start),
                ));
            }
        }

        let operand = self.nested(Self::parse_unary_expression)?;
        Ok(Expr::new(
            ExprKind::Sizeof(SizeofArg::Expr(Box::new(operand))),
            self.finish(start),
        ))
    }

    /// `(type) operand` or a compound literal `(type){ ... }`
    fn parse_cast(&mut self) -> ParseResult<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::LParen)?;
        let ty = self.parse_type_name()?;
        self.expect(TokenKind::RParen)?;

        if self.check(&TokenKind::LBrace) {
            let initializers = match self.parse_initializer_list()? {
                Initializer::List(items) => items,
                other => vec![other],
            };
            let literal = Expr::new(ExprKind::CompoundLiteral { ty, initializers }, self.finish(start));
            return self.parse_postfix_suffixes(literal);
        }

        let operand = self.nested(Self::parse_unary_expression)?;
        Ok(Expr::new(
            ExprKind::Cast {
                ty,
                expr: Box::new(operand),
            },
            self.finish(start),
        ))
    }

    fn parse_postfix_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_primary_expression()?;
        self.parse_postfix_suffixes(expr)
    }

    fn parse_postfix_suffixes(&mut self, expr: Expr) -> ParseResult<Expr> {
        self.chained(|p| p.parse_postfix_chain(expr))
    }

    fn parse_postfix_chain(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            let start = expr.span;
            if self.current.kind.is_postfix_operator() {
                self.grow()?;
            }
            let kind = match &self.current.kind {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.nested(Self::parse_expression)?;
                    self.expect(TokenKind::RBracket)?;
                    ExprKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.nested(Self::parse_argument_list)?;
                    self.expect(TokenKind::RParen)?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                TokenKind::Dot => {
                    self.advance();
                    let (field, _) = self.expect_identifier("field name")?;
                    ExprKind::Member {
                        object: Box::new(expr),
                        field,
                    }
                }
                TokenKind::Arrow => {
                    self.advance();
                    let (field, _) = self.expect_identifier("field name")?;
                    ExprKind::PtrMember {
                        pointer: Box::new(expr),
                        field,
                    }
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    ExprKind::PostIncrement(Box::new(expr))
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    ExprKind::PostDecrement(Box::new(expr))
                }
                _ => return Ok(expr),
            };
            expr = Expr::new(kind, self.finish(start));
        }
    }

    fn parse_argument_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_assignment_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    fn parse_primary_expression(&mut self) -> ParseResult<Expr> {
        let span = self.current.span;

        let kind = match &self.current.kind {
            TokenKind::IntLiteral(s) => ExprKind::IntLiteral(int_literal(s, 10, span)?),
            TokenKind::HexLiteral(s) => ExprKind::IntLiteral(int_literal(&s[2..], 16, span)?),
            TokenKind::BinaryLiteral(s) => ExprKind::IntLiteral(int_literal(&s[2..], 2, span)?),
            TokenKind::OctalLiteral(s) => ExprKind::IntLiteral(int_literal(&s[1..], 8, span)?),
            TokenKind::FloatLiteral(s) => {
                ExprKind::FloatLiteral(s.trim_end_matches(['f', 'F', 'l', 'L']).parse().unwrap_or(0.0))
            }
            TokenKind::CharLiteral(s) => ExprKind::CharLiteral(char_literal(s)),
            TokenKind::StringLiteral(_) => {
                // Adjacent literals concatenate: "a" "b"
                let mut value = String::new();
                while let TokenKind::StringLiteral(s) = &self.current.kind {
                    value.push_str(&string_literal(s));
                    self.advance();
                }
                return Ok(Expr::new(ExprKind::StringLiteral(value), self.finish(span)));
            }
            TokenKind::Identifier(name) => ExprKind::Identifier(name.clone()),
            TokenKind::LParen => {
                self.advance();
                let expr = self.nested(Self::parse_expression)?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            _ => return Err(self.error_here("expression")),
        };

        self.advance();
        Ok(Expr::new(kind, span))
    }

    // =========================================================================
    // Initializers
    // =========================================================================

    fn parse_initializer(&mut self) -> ParseResult<Initializer> {
        if self.check(&TokenKind::LBrace) {
            self.parse_initializer_list()
        } else {
            Ok(Initializer::Expr(self.parse_assignment_expression()?))
        }
    }

    fn parse_initializer_list(&mut self) -> ParseResult<Initializer> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
                let designator = self.parse_designator()?;
                // Nested designators: .a.b = 1 keeps the outermost
                while self.check(&TokenKind::Dot) || self.check(&TokenKind::LBracket) {
                    self.parse_designator()?;
                }
                self.expect(TokenKind::Eq)?;
                let value = Box::new(self.nested(Self::parse_initializer)?);
                items.push(Initializer::Designated { designator, value });
            } else {
                items.push(self.nested(Self::parse_initializer)?);
            }

            // Trailing comma allowed
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Initializer::List(items))
    }

    fn parse_designator(&mut self) -> ParseResult<Designator> {
        if self.match_token(&TokenKind::Dot) {
            let (name, _) = self.expect_identifier("field name")?;
            Ok(Designator::Field(name))
        } else {
            self.expect(TokenKind::LBracket)?;
            let index = self.parse_constant_expression()?;
            self.expect(TokenKind::RBracket)?;
            Ok(Designator::Index(Box::new(index)))
        }
    }
}

// =============================================================================
// Free helpers
// =============================================================================

/// Binary operator and its precedence level, loosest first
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::PipePipe => (BinaryOp::LogOr, 0),
        TokenKind::AmpAmp => (BinaryOp::LogAnd, 1),
        TokenKind::Pipe => (BinaryOp::BitOr, 2),
        TokenKind::Caret => (BinaryOp::BitXor, 3),
        TokenKind::Amp => (BinaryOp::BitAnd, 4),
        TokenKind::EqEq => (BinaryOp::Eq, 5),
        TokenKind::NotEq => (BinaryOp::Ne, 5),
        TokenKind::Lt => (BinaryOp::Lt, 6),
        TokenKind::Gt => (BinaryOp::Gt, 6),
        TokenKind::LtEq => (BinaryOp::Le, 6),
        TokenKind::GtEq => (BinaryOp::Ge, 6),
        TokenKind::LtLt => (BinaryOp::Shl, 7),
        TokenKind::GtGt => (BinaryOp::Shr, 7),
        TokenKind::Plus => (BinaryOp::Add, 8),
        TokenKind::Minus => (BinaryOp::Sub, 8),
        TokenKind::Star => (BinaryOp::Mul, 9),
        TokenKind::Slash => (BinaryOp::Div, 9),
        TokenKind::Percent => (BinaryOp::Mod, 9),
        _ => return None,
    };
    Some(entry)
}

fn tag_declaration(ty: CType, span: Span) -> DeclKind {
    let members = |members: Vec<(String, CType)>| {
        Some(
            members
                .into_iter()
                .map(|(name, ty)| StructMember::new(name, ty, span))
                .collect(),
        )
    };
    match ty.kind {
        TypeKind::Struct { name, members: m } => {
            DeclKind::Struct(StructDecl::new(name, members(m), span))
        }
        TypeKind::Union { name, members: m } => {
            DeclKind::Union(UnionDecl::new(name, members(m), span))
        }
        TypeKind::Enum { name, variants } => DeclKind::Enum(EnumDecl::new(
            name,
            Some(
                variants
                    .into_iter()
                    .map(|(name, value)| {
                        let value = value.map(|v| Expr::new(ExprKind::IntLiteral(v), span));
                        EnumVariant::new(name, value, span)
                    })
                    .collect(),
            ),
            span,
        )),
        // `int;` declares nothing
        _ => DeclKind::MultipleVariables(Vec::new()),
    }
}

fn function_decl(declarator: Declarator, storage_class: Option<StorageClass>, span: Span) -> FuncDecl {
    let (name, name_span) = declarator.name.unwrap_or_default();
    let (return_type, params, variadic) = match declarator.ty.kind {
        TypeKind::Function {
            return_type,
            params,
            variadic,
        } => (*return_type, params, variadic),
        _ => (declarator.ty, Vec::new(), false),
    };

    let mut func = FuncDecl::new(name, name_span, return_type, params, span).with_variadic(variadic);
    if let Some(sc) = storage_class {
        func = func.with_storage_class(sc);
    }
    func
}

fn var_decl(
    declarator: Declarator,
    storage_class: Option<StorageClass>,
    init: Option<Initializer>,
    span: Span,
) -> VarDecl {
    let (name, name_span) = declarator.name.unwrap_or_default();
    let mut var = VarDecl::new(name, name_span, declarator.ty, span);
    if let Some(sc) = storage_class {
        var = var.with_storage_class(sc);
    }
    if let Some(init) = init {
        var = var.with_init(init);
    }
    var
}

/// Integer literal digits in `radix`; values past `i64::MAX` wrap like C
fn int_literal(digits: &str, radix: u32, span: Span) -> ParseResult<i64> {
    let digits = digits.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, radix)
        .map(|value| value as i64)
        .map_err(|_| SyntaxError::new("integer literal is too large", span))
}

fn char_literal(s: &str) -> char {
    let inner = s.get(1..s.len().saturating_sub(1)).unwrap_or_default();
    let mut chars = inner.chars().peekable();
    match chars.next() {
        Some('\\') => char::from(unescape(&mut chars)),
        Some(c) => c,
        None => '\0',
    }
}

fn string_literal(s: &str) -> String {
    let inner = s.get(1..s.len().saturating_sub(1)).unwrap_or_default();
    let mut result = String::new();
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        // Line continuation inside the literal
        match chars.peek() {
            Some('\n') => {
                chars.next();
            }
            Some('\r') => {
                chars.next();
                chars.next_if_eq(&'\n');
            }
            _ => result.push(char::from(unescape(&mut chars))),
        }
    }

    result
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// Decode an escape sequence after its backslash
fn unescape(chars: &mut Chars<'_>) -> u8 {
    match chars.next() {
        Some('n') => b'\n',
        Some('r') => b'\r',
        Some('t') => b'\t',
        Some('a') => 0x07,
        Some('b') => 0x08,
        Some('f') => 0x0C,
        Some('v') => 0x0B,
        Some(c @ '0'..='7') => octal_escape(chars, c.to_digit(8).unwrap_or(0)),
        Some('x') => {
            let mut value: u32 = 0;
            let mut found_digit = false;
            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(16)) {
                chars.next();
                value = value.wrapping_mul(16).wrapping_add(digit);
                found_digit = true;
            }
            if found_digit { value as u8 } else { b'x' }
        }
        Some(c) if c.is_ascii() => c as u8,
        Some(_) => b'?',
        None => 0,
    }
}

/// Up to three octal digits, the first already consumed
fn octal_escape(chars: &mut Chars<'_>, first: u32) -> u8 {
    let mut value = first;
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                chars.next();
                value = value * 8 + digit;
            }
            None => break,
        }
    }
    value as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DiagnosticKind;
    use crate::frontend::c::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> (TranslationUnit, Vec<Diagnostic>) {
        parse(tokenize(source))
    }

    fn parse_clean(source: &str) -> TranslationUnit {
        let (tu, diagnostics) = parse_source(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        tu
    }

    fn body(tu: &TranslationUnit) -> &Block {
        tu.functions()
            .next()
            .and_then(|f| f.body.as_ref())
            .expect("function body")
    }

    #[test]
    fn test_parse_simple_function() {
        let tu = parse_clean("int main() { return 0; }");

        assert_eq!(tu.declarations.len(), 1);
        if let DeclKind::Function(f) = &tu.declarations[0].kind {
            assert_eq!(f.name, "main");
            assert!(f.body.is_some());
            assert_eq!((f.name_span.line(), f.name_span.column()), (1, 5));
        } else {
            panic!("expected function declaration");
        }
    }

    #[test]
    fn test_parse_variable_declaration() {
        let tu = parse_clean("int x = 42;");

        assert_eq!(tu.declarations.len(), 1);
        if let DeclKind::Variable(v) = &tu.declarations[0].kind {
            assert_eq!(v.name, "x");
            assert!(v.init.is_some());
        } else {
            panic!("expected variable declaration");
        }
    }

    #[test]
    fn test_parse_expressions() {
        let tu = parse_clean("int f() { return 1 + 2 * 3; }");
        let BlockItem::Statement(stmt) = &body(&tu).items[0] else {
            panic!("expected statement");
        };
        let StmtKind::Return(Some(expr)) = &stmt.kind else {
            panic!("expected return");
        };
        assert!(matches!(
            &expr.kind,
            ExprKind::Binary { op: BinaryOp::Add, right, .. }
                if matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. })
        ));
        assert_eq!((expr.span.column(), expr.span.end.column), (18, 27));
    }

    #[test]
    fn test_parse_control_flow() {
        parse_clean("void f() { if (x) y = 1; else y = 2; }");
        parse_clean("void f() { while (x < 10) x++; }");
        parse_clean("void f() { for (int i = 0; i < 10; i++) x++; }");
        parse_clean("void f() { do { x--; } while (x); }");
        parse_clean("int f(int k) { switch (k) { case 1: return 1; default: break; } return 0; }");
        parse_clean("void f() { goto out; out: ; }");
    }

    #[test]
    fn test_parse_library_types_and_casts() {
        let tu = parse_clean(
            "#include <stdio.h>\n\
             int main(void) {\n\
                 size_t n = sizeof(char) * 4;\n\
                 FILE *f = fopen(\"x\", \"r\");\n\
                 char *s = (char *)malloc(n);\n\
                 return 0;\n\
             }\n",
        );
        let items = &body(&tu).items;
        assert_eq!(items.len(), 4);
        let BlockItem::Declaration(decl) = &items[2] else {
            panic!("expected declaration");
        };
        let DeclKind::Variable(var) = &decl.kind else {
            panic!("expected variable");
        };
        assert!(var.ty.is_pointer());
        let init = var.init.as_ref().and_then(Initializer::as_expr).expect("init");
        assert_eq!(init.callee_name(), Some("malloc"));
    }

    #[test]
    fn test_parse_user_typedef() {
        let tu = parse_clean("typedef struct node { int v; struct node *next; } Node, *NodePtr;\nNode *head;");
        assert!(matches!(&tu.declarations[0].kind, DeclKind::Typedef(t) if t.len() == 2));
        assert!(matches!(&tu.declarations[1].kind, DeclKind::Variable(v) if v.ty.is_pointer()));
    }

    #[test]
    fn test_unknown_library_typedefs_declare() {
        let tu = parse_clean(
            "int main(void) {\n\
                 pid_t pid = fork();\n\
                 clock_t started = clock();\n\
                 pthread_t worker;\n\
                 DIR *dir = opendir(\".\");\n\
                 uint_fast8_t small, *cursor;\n\
                 return pid;\n\
             }\n",
        );
        let items = &body(&tu).items;
        assert_eq!(items.len(), 6);
        assert!(items[..5].iter().all(|item| matches!(item, BlockItem::Declaration(_))));
        let BlockItem::Declaration(decl) = &items[3] else {
            panic!("expected declaration");
        };
        assert!(matches!(&decl.kind, DeclKind::Variable(v) if v.name == "dir" && v.ty.is_pointer()));

        parse_clean("void on_signal(sig_atomic_t seen, pthread_mutex_t *lock);");
        parse_clean("static jmp_buf env;\nint f(void) { return (int)sizeof(env); }");
    }

    #[test]
    fn test_products_stay_expressions() {
        let tu = parse_clean("int f(int a, int b) {\n    a * b + 1;\n    return a * b;\n}");
        let items = &body(&tu).items;
        assert!(matches!(&items[0], BlockItem::Statement(s) if matches!(s.kind, StmtKind::Expr(_))));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let depth = 50_000;
        let braces = format!("int f(void) {{ {} return 0; {} }}", "{".repeat(depth), "}".repeat(depth));
        let (tu, diagnostics) = parse_source(&braces);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
        assert_eq!(diagnostics[0].message, "nesting is too deep");
        assert_eq!(tu.declarations.len(), 1);

        let parens = format!("int g(void) {{ return {}1{}; }}", "(".repeat(depth), ")".repeat(depth));
        let (_, diagnostics) = parse_source(&parens);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
        assert_eq!(diagnostics[0].message, "nesting is too deep");

        let unary = format!("int h(int a) {{ return {}a; }}", "-".repeat(depth));
        let (_, diagnostics) = parse_source(&unary);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);

        let chain = format!("int k(int a) {{ return a{}; }}", " + a".repeat(depth));
        let (_, diagnostics) = parse_source(&chain);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
        assert_eq!(diagnostics[0].message, "expression is too deeply nested");

        let calls = format!("int m(int a) {{ return a{}; }}", "[0]".repeat(depth));
        let (_, diagnostics) = parse_source(&calls);
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let depth = 100;
        parse_clean(&format!("int f(void) {{ {} return 0; {} }}", "{".repeat(depth), "}".repeat(depth)));
        parse_clean(&format!("int g(void) {{ return {}1{}; }}", "(".repeat(depth), ")".repeat(depth)));
        parse_clean(&format!("int k(int a) {{ return a{}; }}", " + a".repeat(500)));
    }

    #[test]
    fn test_parse_function_pointer_declarator() {
        let tu = parse_clean("void (*handler)(int);");
        let DeclKind::Variable(var) = &tu.declarations[0].kind else {
            panic!("expected variable");
        };
        assert_eq!(var.name, "handler");
        assert!(matches!(
            &var.ty.kind,
            TypeKind::Pointer(inner) if matches!(inner.kind, TypeKind::Function { .. })
        ));
    }

    #[test]
    fn test_missing_semicolon_at_line_end() {
        let source = "int main() {\n    printf(\"hi\")\n    int x = 1;\n    return x;\n}\n";
        let (tu, diagnostics) = parse_source(source);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert_eq!((diagnostics[0].span.line(), diagnostics[0].span.column()), (2, 17));
        // the rest of the body survives
        assert_eq!(body(&tu).items.len(), 3);
    }

    #[test]
    fn test_recovery_resynchronizes_at_statement_boundary() {
        let source = "int f() { int a = ) 3; return a; }\nint g() { return 1; }";
        let (tu, diagnostics) = parse_source(source);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].span.column(), 19);
        let items = &body(&tu).items;
        assert!(matches!(&items[0], BlockItem::Statement(s) if matches!(s.kind, StmtKind::Error { .. })));
        assert!(matches!(&items[1], BlockItem::Statement(s) if matches!(s.kind, StmtKind::Return(_))));
        assert_eq!(tu.functions().count(), 2);
    }

    #[test]
    fn test_unbalanced_braces() {
        let (tu, diagnostics) = parse_source("int f() { return 1; }\n}\nint g() { return 2;");
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["unexpected '}' at file scope", "expected '}' at end of input"]
        );
        assert_eq!(tu.functions().count(), 2);
    }

    #[test]
    fn test_lexer_errors_become_diagnostics() {
        let (tu, diagnostics) = parse_source("int x = 1 @ 2;\nint y;");
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "unexpected character '@'"));
        assert_eq!(tu.declarations.len(), 2);
    }

    #[test]
    fn test_block_close_span() {
        let tu = parse_clean("int main() {\n    return 0;\n}\n");
        let close = body(&tu).close;
        assert_eq!((close.line(), close.column()), (3, 1));
    }

    #[test]
    fn test_literals() {
        assert_eq!(string_literal(r#""a\tb\n""#), "a\tb\n");
        assert_eq!(char_literal(r"'\0'"), '\0');
        assert_eq!(char_literal(r"'\x41'"), 'A');
        assert_eq!(char_literal("'z'"), 'z');
        assert_eq!(int_literal("1F", 16, Span::default()), Ok(31));
        assert_eq!(int_literal("10UL", 10, Span::default()), Ok(10));
    }
}
