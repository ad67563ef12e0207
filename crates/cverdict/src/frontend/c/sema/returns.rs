//! Non-void functions that can finish without a value

use super::flow::{Lattice, Transfer};
use super::scope::SymbolTable;
use crate::common::{Diagnostic, Span};
use crate::frontend::c::ast::{Expr, FuncDecl, VarDecl};

/// Reachability is the only fact this checker needs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reachable;

impl Lattice for Reachable {
    fn join(self, _other: Self) -> Self {
        Reachable
    }
}

#[derive(Debug, Default)]
pub struct ReturnChecker {
    function: String,
    /// Parser recovery skipped over a `return`
    recovered: bool,
    diagnostics: Vec<Diagnostic>,
}

impl ReturnChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `func` needs checking at all
    pub fn applies_to(func: &FuncDecl) -> bool {
        func.is_definition() && !func.returns_void()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl Transfer for ReturnChecker {
    type State = Reachable;

    fn entry(&mut self, func: &FuncDecl, _symbols: &SymbolTable) -> Reachable {
        self.function = func.name.clone();
        Reachable
    }

    fn declare(&mut self, _var: &VarDecl, _symbols: &SymbolTable, _state: &mut Reachable) {}

    fn eval(&mut self, _expr: &Expr, _symbols: &SymbolTable, _state: &mut Reachable) {}

    fn on_return(&mut self, value: Option<&Expr>, span: Span, _symbols: &SymbolTable, _state: Reachable) {
        if value.is_none() {
            self.diagnostics
                .push(Diagnostic::missing_return(&self.function, span));
        }
    }

    fn on_fall_off(&mut self, close: Span, _symbols: &SymbolTable, _state: Reachable) {
        if !self.recovered {
            self.diagnostics
                .push(Diagnostic::missing_return(&self.function, close));
        }
    }

    fn recover(&mut self, skipped_return: bool, _state: &mut Reachable) {
        self.recovered |= skipped_return;
    }
}
