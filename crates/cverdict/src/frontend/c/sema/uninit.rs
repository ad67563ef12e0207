//! Reads of local scalars before any assignment
//!
//! A variable is definitely assigned at a point when every path reaching
//! that point assigns it, so states join by intersection.

use std::collections::{BTreeSet, HashSet};

use super::flow::{Lattice, Transfer};
use super::scope::SymbolTable;
use crate::common::{Diagnostic, Span};
use crate::frontend::c::ast::{
    BinaryOp, Expr, ExprKind, FuncDecl, Initializer, VarDecl,
};

/// Declarations definitely assigned on the current path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assigned(BTreeSet<Span>);

impl Lattice for Assigned {
    fn join(self, other: Self) -> Self {
        Assigned(self.0.intersection(&other.0).copied().collect())
    }
}

#[derive(Debug, Default)]
pub struct UninitChecker {
    /// Declarations declared without an initializer and worth tracking
    tracked: HashSet<Span>,
    reported: HashSet<Span>,
    diagnostics: Vec<Diagnostic>,
}

impl UninitChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn read(&mut self, expr: &Expr, symbols: &SymbolTable, state: &mut Assigned) {
        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_) => {}

            ExprKind::Identifier(name) => {
                let Some(symbol) = symbols.lookup(name) else {
                    return;
                };
                let key = symbol.span;
                if self.tracked.contains(&key) && !state.0.contains(&key) && self.reported.insert(key) {
                    self.diagnostics
                        .push(Diagnostic::uninitialized_read(name, expr.span));
                }
            }

            ExprKind::Binary {
                op: BinaryOp::LogAnd | BinaryOp::LogOr,
                left,
                right,
            } => {
                self.read(left, symbols, state);
                let mut rhs = state.clone();
                self.read(right, symbols, &mut rhs);
                *state = std::mem::take(state).join(rhs);
            }
            ExprKind::Binary { left, right, .. } => {
                self.read(left, symbols, state);
                self.read(right, symbols, state);
            }

            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.read(condition, symbols, state);
                let mut then_state = state.clone();
                self.read(then_expr, symbols, &mut then_state);
                self.read(else_expr, symbols, state);
                *state = then_state.join(std::mem::take(state));
            }

            ExprKind::Assign { op, target, value } => {
                self.read(value, symbols, state);
                if op.is_compound() {
                    self.read(target, symbols, state);
                }
                self.write(target, symbols, state);
            }

            ExprKind::PreIncrement(operand)
            | ExprKind::PreDecrement(operand)
            | ExprKind::PostIncrement(operand)
            | ExprKind::PostDecrement(operand) => {
                self.read(operand, symbols, state);
                self.write(operand, symbols, state);
            }

            // Taking the address hands the variable to code we cannot see
            ExprKind::AddrOf(inner) => match &inner.strip_casts().kind {
                ExprKind::Identifier(_) => self.write(inner, symbols, state),
                _ => self.read(inner, symbols, state),
            },

            ExprKind::Unary { operand, .. } | ExprKind::Deref(operand) => {
                self.read(operand, symbols, state)
            }
            ExprKind::Cast { expr, .. } => self.read(expr, symbols, state),

            // Unevaluated operand
            ExprKind::Sizeof(_) => {}

            ExprKind::Call { callee, args } => {
                self.read(callee, symbols, state);
                for arg in args {
                    self.read(arg, symbols, state);
                }
            }
            ExprKind::Index { array, index } => {
                self.read(array, symbols, state);
                self.read(index, symbols, state);
            }
            ExprKind::Member { object, .. } => self.read(object, symbols, state),
            ExprKind::PtrMember { pointer, .. } => self.read(pointer, symbols, state),
            ExprKind::Comma(exprs) => {
                for expr in exprs {
                    self.read(expr, symbols, state);
                }
            }
            ExprKind::CompoundLiteral { initializers, .. } => {
                for init in initializers {
                    self.read_initializer(init, symbols, state);
                }
            }
        }
    }

    fn read_initializer(&mut self, init: &Initializer, symbols: &SymbolTable, state: &mut Assigned) {
        match init {
            Initializer::Expr(expr) => self.read(expr, symbols, state),
            Initializer::List(items) => {
                for item in items {
                    self.read_initializer(item, symbols, state);
                }
            }
            Initializer::Designated { value, .. } => self.read_initializer(value, symbols, state),
        }
    }

    /// Store into `target`; only a bare name counts as an assignment
    fn write(&mut self, target: &Expr, symbols: &SymbolTable, state: &mut Assigned) {
        match &target.strip_casts().kind {
            ExprKind::Identifier(name) => {
                if let Some(symbol) = symbols.lookup(name) {
                    state.0.insert(symbol.span);
                }
            }
            // `*p = v` and `a[i] = v` read the pointer and index
            _ => self.read(target, symbols, state),
        }
    }

    fn is_trackable(var: &VarDecl, symbols: &SymbolTable) -> bool {
        if var.is_static() {
            return false;
        }
        symbols
            .resolve_type(&var.ty)
            .is_some_and(|ty| ty.is_scalar())
    }
}

impl Transfer for UninitChecker {
    type State = Assigned;

    fn entry(&mut self, _func: &FuncDecl, _symbols: &SymbolTable) -> Assigned {
        Assigned::default()
    }

    fn declare(&mut self, var: &VarDecl, symbols: &SymbolTable, state: &mut Assigned) {
        if Self::is_trackable(var, symbols) {
            self.tracked.insert(var.name_span);
        }
        match &var.init {
            Some(init) => {
                self.read_initializer(init, symbols, state);
                state.0.insert(var.name_span);
            }
            None if var.is_static() => {
                state.0.insert(var.name_span);
            }
            None => {}
        }
    }

    fn eval(&mut self, expr: &Expr, symbols: &SymbolTable, state: &mut Assigned) {
        self.read(expr, symbols, state);
    }

    fn on_return(&mut self, _value: Option<&Expr>, _span: Span, _symbols: &SymbolTable, _state: Assigned) {}

    fn on_fall_off(&mut self, _close: Span, _symbols: &SymbolTable, _state: Assigned) {}

    fn recover(&mut self, _skipped_return: bool, state: &mut Assigned) {
        state.0.extend(self.tracked.iter().copied());
    }
}
