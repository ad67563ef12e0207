//! Symbol table and scope management

use std::collections::HashMap;

use string_interner::{DefaultStringInterner, DefaultSymbol};

use crate::common::Span;
use crate::frontend::c::ast::{CType, DeclKind, Declaration, Expr, TypeKind, VarDecl};

/// Library typedefs that name plain scalars
const SCALAR_TYPEDEFS: &[&str] = &[
    "size_t", "ssize_t", "ptrdiff_t", "bool", "int8_t", "int16_t", "int32_t", "int64_t",
    "uint8_t", "uint16_t", "uint32_t", "uint64_t", "intptr_t", "uintptr_t", "off_t", "time_t",
    "wchar_t",
];

/// Typedef chains longer than this are treated as unresolved
const MAX_TYPEDEF_DEPTH: usize = 16;

/// A symbol in the symbol table
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Span of the declaring identifier; unique per declaration
    pub span: Span,
    pub kind: SymbolKind,
    pub ty: CType,
    /// Automatic storage inside a function body
    pub local: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, span: Span, kind: SymbolKind, ty: CType) -> Self {
        Self {
            name: name.into(),
            span,
            kind,
            ty,
            local: false,
        }
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// A local variable or parameter whose value lives in this function
    pub fn is_local_object(&self) -> bool {
        self.local && matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
    }
}

/// Kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
    Typedef,
    EnumConstant(i64),
}

/// A scope containing symbols
#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: HashMap<DefaultSymbol, Symbol>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a symbol, shadowing any earlier one of the same name in
    /// this scope. Redeclarations are legal C at file scope.
    pub fn define(&mut self, key: DefaultSymbol, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(key, symbol)
    }

    pub fn lookup(&self, key: DefaultSymbol) -> Option<&Symbol> {
        if let Some(sym) = self.symbols.get(&key) {
            Some(sym)
        } else if let Some(parent) = &self.parent {
            parent.lookup(key)
        } else {
            None
        }
    }

    /// Take the parent scope, replacing self with the parent
    pub fn pop_to_parent(&mut self) -> bool {
        if let Some(parent) = self.parent.take() {
            *self = *parent;
            true
        } else {
            false
        }
    }

    /// Push a new child scope
    pub fn push_child(&mut self) {
        let old_scope = std::mem::take(self);
        self.parent = Some(Box::new(old_scope));
    }
}

/// Scope chain plus the interner its keys come from
pub struct SymbolTable<'a> {
    interner: &'a mut DefaultStringInterner,
    scope: Scope,
}

impl<'a> SymbolTable<'a> {
    pub fn new(interner: &'a mut DefaultStringInterner, scope: Scope) -> Self {
        Self { interner, scope }
    }

    pub fn into_scope(self) -> Scope {
        self.scope
    }

    pub fn enter(&mut self) {
        self.scope.push_child();
    }

    pub fn leave(&mut self) {
        self.scope.pop_to_parent();
    }

    pub fn define(&mut self, symbol: Symbol) {
        let key = self.interner.get_or_intern(&symbol.name);
        self.scope.define(key, symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let key = self.interner.get(name)?;
        self.scope.lookup(key)
    }

    /// The local variable or parameter called `name`, if that is what it is
    pub fn local_object(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name).filter(|sym| sym.is_local_object())
    }

    /// Follow typedef names to the underlying type.
    ///
    /// Returns `None` for names that are neither declared here nor known
    /// library scalars.
    pub fn resolve_type(&self, ty: &CType) -> Option<CType> {
        let mut current = ty.clone();
        for _ in 0..MAX_TYPEDEF_DEPTH {
            let TypeKind::Typedef(name) = &current.kind else {
                return Some(current);
            };
            match self.lookup(name) {
                Some(sym) if sym.kind == SymbolKind::Typedef => current = sym.ty.clone(),
                Some(_) => return None,
                None if SCALAR_TYPEDEFS.contains(&name.as_str()) => {
                    return Some(CType::new(TypeKind::Long { signed: false }, current.span));
                }
                None => return None,
            }
        }
        None
    }

    /// Bring every name `decl` introduces into the current scope
    pub fn declare(&mut self, decl: &Declaration, in_function: bool) {
        match &decl.kind {
            DeclKind::Variable(var) => self.define_variable(var, in_function),
            DeclKind::MultipleVariables(vars) => {
                for var in vars {
                    self.define_variable(var, in_function);
                }
            }
            DeclKind::Function(func) => self.define(Symbol::new(
                func.name.clone(),
                func.name_span,
                SymbolKind::Function,
                func.return_type.clone(),
            )),
            DeclKind::Typedef(defs) => {
                for def in defs {
                    self.define_enum_constants(&def.ty, def.span);
                    self.define(Symbol::new(
                        def.name.clone(),
                        def.name_span,
                        SymbolKind::Typedef,
                        def.ty.clone(),
                    ));
                }
            }
            DeclKind::Enum(decl) => {
                for variant in decl.variants.iter().flatten() {
                    let value = variant
                        .value
                        .as_ref()
                        .and_then(Expr::constant_value)
                        .unwrap_or_default();
                    self.define(Symbol::new(
                        variant.name.clone(),
                        variant.span,
                        SymbolKind::EnumConstant(value),
                        CType::int(variant.span),
                    ));
                }
            }
            DeclKind::Struct(_) | DeclKind::Union(_) | DeclKind::Error { .. } => {}
        }
    }

    /// Block-scope variables without `static`/`extern` are locals
    pub fn define_variable(&mut self, var: &VarDecl, in_function: bool) {
        self.define_enum_constants(&var.ty, var.span);
        let mut symbol = Symbol::new(var.name.clone(), var.name_span, SymbolKind::Variable, var.ty.clone());
        if in_function && !var.is_static() {
            symbol = symbol.local();
        }
        self.define(symbol);
    }

    /// Declare the constants of an enum type, wherever it appears
    fn define_enum_constants(&mut self, ty: &CType, span: Span) {
        if let TypeKind::Enum { variants, .. } = &ty.kind {
            for (name, value) in variants {
                let value = value.unwrap_or_default();
                self.define(Symbol::new(name.clone(), span, SymbolKind::EnumConstant(value), ty.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_symbol(name: &str, line: u32) -> Symbol {
        let span = Span::point(crate::common::Position::new(line, 1, line as usize));
        Symbol::new(name, span, SymbolKind::Variable, CType::int(span))
    }

    #[test]
    fn test_inner_scope_shadows_and_pops() {
        let mut interner = DefaultStringInterner::default();
        let mut table = SymbolTable::new(&mut interner, Scope::new());

        table.define(int_symbol("x", 1));
        table.enter();
        table.define(int_symbol("x", 2).local());
        let inner = table.lookup("x").expect("x");
        assert_eq!(inner.span.line(), 2);
        assert!(inner.is_local_object());

        table.leave();
        assert_eq!(table.lookup("x").map(|s| s.span.line()), Some(1));
        assert!(table.lookup("y").is_none());
    }

    #[test]
    fn test_resolve_type_follows_typedefs() {
        let mut interner = DefaultStringInterner::default();
        let mut table = SymbolTable::new(&mut interner, Scope::new());
        let span = Span::default();
        let ptr = CType::pointer_to(CType::char(span), span);
        table.define(Symbol::new("str_t", span, SymbolKind::Typedef, ptr));
        table.define(Symbol::new(
            "name_t",
            span,
            SymbolKind::Typedef,
            CType::new(TypeKind::Typedef("str_t".into()), span),
        ));

        let named = CType::new(TypeKind::Typedef("name_t".into()), span);
        assert!(table.resolve_type(&named).is_some_and(|t| t.is_pointer()));

        let size = CType::new(TypeKind::Typedef("size_t".into()), span);
        assert!(table.resolve_type(&size).is_some_and(|t| t.is_scalar()));

        let unknown = CType::new(TypeKind::Typedef("mystery_t".into()), span);
        assert!(table.resolve_type(&unknown).is_none());
    }
}
