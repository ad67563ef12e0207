//! Allocations bound to locals and never released
//!
//! Every allocation whose result is stored in a local variable becomes a
//! [`ResourceHandle`]. Handles move between three states; where paths meet
//! the worse state wins, so a handle still acquired on any path reaching
//! an exit is reported there.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::flow::{Lattice, Transfer};
use super::scope::SymbolTable;
use crate::common::{Diagnostic, Span};
use crate::frontend::c::ast::{
    BinaryOp, Expr, ExprKind, FuncDecl, Initializer, UnaryOp, VarDecl,
};

/// Acquirers that take an existing handle as their first argument
const REALLOCATORS: &[&str] = &["realloc"];

/// Acquire and release functions that belong together
#[derive(Debug, Clone)]
pub struct ResourceFamily {
    pub name: &'static str,
    pub acquirers: Vec<String>,
    pub releasers: Vec<String>,
}

impl ResourceFamily {
    fn new(name: &'static str, acquirers: &[&str], releasers: &[&str]) -> Self {
        Self {
            name,
            acquirers: acquirers.iter().map(|s| s.to_string()).collect(),
            releasers: releasers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The allocation functions the leak checker knows about
#[derive(Debug, Clone)]
pub struct ResourceTable {
    families: Vec<ResourceFamily>,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ResourceTable {
    const HEAP: usize = 0;

    /// Heap memory released by `free`, streams released by `fclose`
    pub fn standard() -> Self {
        Self {
            families: vec![
                ResourceFamily::new(
                    "heap",
                    &["malloc", "calloc", "realloc", "strdup", "strndup"],
                    &["free"],
                ),
                ResourceFamily::new("stream", &["fopen", "fdopen", "tmpfile"], &["fclose"]),
            ],
        }
    }

    /// Add allocators to the heap family
    pub fn with_allocators<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.families[Self::HEAP]
            .acquirers
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Add release functions to the heap family
    pub fn with_releasers<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.families[Self::HEAP]
            .releasers
            .extend(names.into_iter().map(Into::into));
        self
    }

    fn acquiring_family(&self, name: &str) -> Option<usize> {
        self.families
            .iter()
            .position(|family| family.acquirers.iter().any(|a| a == name))
    }

    fn is_releaser(&self, name: &str) -> bool {
        self.families
            .iter()
            .any(|family| family.releasers.iter().any(|r| r == name))
    }

    fn releases(&self, family: usize, name: &str) -> bool {
        self.families
            .get(family)
            .is_some_and(|family| family.releasers.iter().any(|r| r == name))
    }
}

/// One allocation bound to a local variable
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    pub variable: String,
    pub acquired_at: Span,
    pub acquired_by: String,
    family: usize,
}

type HandleId = usize;

/// Ordered so that joining keeps the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandleState {
    Released,
    /// Returned or stored somewhere this function cannot follow
    Escaped,
    Acquired,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeakState {
    handles: BTreeMap<HandleId, HandleState>,
    /// Handles each local may currently hold, keyed by declaration
    bindings: BTreeMap<Span, BTreeSet<HandleId>>,
}

impl Lattice for LeakState {
    fn join(mut self, other: Self) -> Self {
        for (id, state) in other.handles {
            self.handles
                .entry(id)
                .and_modify(|s| *s = (*s).max(state))
                .or_insert(state);
        }
        for (var, ids) in other.bindings {
            self.bindings.entry(var).or_default().extend(ids);
        }
        self
    }
}

impl LeakState {
    fn transition(&mut self, ids: &BTreeSet<HandleId>, from: HandleState, to: HandleState) {
        for id in ids {
            if let Some(state) = self.handles.get_mut(id) {
                if *state == from {
                    *state = to;
                }
            }
        }
    }
}

pub struct LeakChecker<'r> {
    resources: &'r ResourceTable,
    handles: Vec<ResourceHandle>,
    reported: HashSet<HandleId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> LeakChecker<'r> {
    pub fn new(resources: &'r ResourceTable) -> Self {
        Self {
            resources,
            handles: Vec::new(),
            reported: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Declaration span and held handles of the local `expr` names
    fn bound(
        &self,
        expr: &Expr,
        symbols: &SymbolTable,
        state: &LeakState,
    ) -> Option<BTreeSet<HandleId>> {
        let name = expr.as_identifier()?;
        let symbol = symbols.local_object(name)?;
        state.bindings.get(&symbol.span).cloned()
    }

    fn escape(&self, expr: &Expr, symbols: &SymbolTable, state: &mut LeakState) {
        if let Some(origin) = pointer_origin(expr) {
            if let Some(ids) = self.bound(origin, symbols, state) {
                state.transition(&ids, HandleState::Acquired, HandleState::Escaped);
            }
        }
    }

    fn visit(&mut self, expr: &Expr, symbols: &SymbolTable, state: &mut LeakState) {
        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Identifier(_)
            | ExprKind::Sizeof(_) => {}

            ExprKind::Assign { op, target, value } => {
                self.visit(value, symbols, state);
                self.visit(target, symbols, state);
                if !op.is_compound() {
                    self.assign(target, value, symbols, state);
                }
            }

            ExprKind::Call { callee, args } => {
                self.visit(callee, symbols, state);
                for arg in args {
                    self.visit(arg, symbols, state);
                }
                let releaser = callee.as_identifier().filter(|name| self.resources.is_releaser(name));
                if let (Some(releaser), Some(arg)) = (releaser, args.first()) {
                    self.release(arg, releaser, symbols, state);
                }
            }

            ExprKind::AddrOf(inner) => {
                if self.bound(inner, symbols, state).is_some() {
                    self.escape(inner, symbols, state);
                } else {
                    self.visit(inner, symbols, state);
                }
            }

            ExprKind::Binary {
                op: BinaryOp::LogAnd | BinaryOp::LogOr,
                left,
                right,
            } => {
                self.visit(left, symbols, state);
                let mut rhs = state.clone();
                self.visit(right, symbols, &mut rhs);
                *state = std::mem::take(state).join(rhs);
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit(left, symbols, state);
                self.visit(right, symbols, state);
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.visit(condition, symbols, state);
                let mut then_state = state.clone();
                self.visit(then_expr, symbols, &mut then_state);
                self.visit(else_expr, symbols, state);
                *state = then_state.join(std::mem::take(state));
            }

            ExprKind::Unary { operand, .. }
            | ExprKind::Deref(operand)
            | ExprKind::PreIncrement(operand)
            | ExprKind::PreDecrement(operand)
            | ExprKind::PostIncrement(operand)
            | ExprKind::PostDecrement(operand) => self.visit(operand, symbols, state),
            ExprKind::Cast { expr, .. } => self.visit(expr, symbols, state),
            ExprKind::Index { array, index } => {
                self.visit(array, symbols, state);
                self.visit(index, symbols, state);
            }
            ExprKind::Member { object, .. } => self.visit(object, symbols, state),
            ExprKind::PtrMember { pointer, .. } => self.visit(pointer, symbols, state),
            ExprKind::Comma(exprs) => {
                for expr in exprs {
                    self.visit(expr, symbols, state);
                }
            }
            ExprKind::CompoundLiteral { initializers, .. } => {
                for init in initializers {
                    self.store_initializer(init, symbols, state);
                }
            }
        }
    }

    /// Initializer elements are stored into an aggregate
    fn store_initializer(&mut self, init: &Initializer, symbols: &SymbolTable, state: &mut LeakState) {
        match init {
            Initializer::Expr(expr) => {
                self.visit(expr, symbols, state);
                self.escape(expr, symbols, state);
            }
            Initializer::List(items) => {
                for item in items {
                    self.store_initializer(item, symbols, state);
                }
            }
            Initializer::Designated { value, .. } => self.store_initializer(value, symbols, state),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, symbols: &SymbolTable, state: &mut LeakState) {
        let local = target
            .as_identifier()
            .and_then(|name| symbols.local_object(name));
        match local {
            Some(symbol) => {
                let (key, name) = (symbol.span, symbol.name.clone());
                self.bind(key, &name, value, symbols, state);
            }
            // Stored into a field, an element, through a pointer or into a global
            None => self.escape(value, symbols, state),
        }
    }

    /// `value` now lives in the local declared at `key`
    fn bind(&mut self, key: Span, name: &str, value: &Expr, symbols: &SymbolTable, state: &mut LeakState) {
        let source = value.strip_casts();
        let acquired = source
            .callee_name()
            .and_then(|callee| Some((callee, self.resources.acquiring_family(callee)?)));

        if let (Some((callee, family)), ExprKind::Call { args, .. }) = (acquired, &source.kind) {
            if REALLOCATORS.contains(&callee) {
                if let Some(previous) = args.first() {
                    let same_variable = previous
                        .as_identifier()
                        .and_then(|prev| symbols.local_object(prev))
                        .is_some_and(|prev| prev.span == key);
                    if same_variable && state.bindings.get(&key).is_some_and(|ids| !ids.is_empty()) {
                        return;
                    }
                    self.escape(previous, symbols, state);
                }
            }
            self.acquire(key, name, source, callee, family, state);
            return;
        }

        self.escape(source, symbols, state);
        state.bindings.remove(&key);
    }

    fn acquire(
        &mut self,
        key: Span,
        name: &str,
        call: &Expr,
        callee: &str,
        family: usize,
        state: &mut LeakState,
    ) {
        let overwritten = state.bindings.get(&key).cloned().unwrap_or_default();
        for id in overwritten {
            if state.handles.get(&id) == Some(&HandleState::Acquired) && self.reported.insert(id) {
                let handle = &self.handles[id];
                self.diagnostics.push(
                    Diagnostic::resource_leak(&handle.variable, &handle.acquired_by, handle.acquired_at)
                        .with_related(call.span, format!("'{name}' is overwritten here")),
                );
            }
        }

        let id = self.handles.len();
        self.handles.push(ResourceHandle {
            variable: name.to_string(),
            acquired_at: call.span,
            acquired_by: callee.to_string(),
            family,
        });
        state.handles.insert(id, HandleState::Acquired);
        state.bindings.insert(key, BTreeSet::from([id]));
    }

    fn release(&mut self, arg: &Expr, releaser: &str, symbols: &SymbolTable, state: &mut LeakState) {
        let Some(ids) = self.bound(arg, symbols, state) else {
            return;
        };
        for id in ids {
            if !self.resources.releases(self.handles[id].family, releaser) {
                continue;
            }
            if let Some(handle_state) = state.handles.get_mut(&id) {
                *handle_state = HandleState::Released;
            }
        }
    }

    fn report_acquired(&mut self, state: &LeakState, exit: Span, note: &str) {
        for (&id, &handle_state) in &state.handles {
            if handle_state != HandleState::Acquired || !self.reported.insert(id) {
                continue;
            }
            let handle = &self.handles[id];
            self.diagnostics.push(
                Diagnostic::resource_leak(&handle.variable, &handle.acquired_by, handle.acquired_at)
                    .with_related(exit, note),
            );
        }
    }
}

impl Transfer for LeakChecker<'_> {
    type State = LeakState;

    fn entry(&mut self, _func: &FuncDecl, _symbols: &SymbolTable) -> LeakState {
        LeakState::default()
    }

    fn declare(&mut self, var: &VarDecl, symbols: &SymbolTable, state: &mut LeakState) {
        let Some(init) = &var.init else {
            return;
        };
        match (init, symbols.local_object(&var.name)) {
            (Initializer::Expr(value), Some(symbol)) => {
                let key = symbol.span;
                self.visit(value, symbols, state);
                self.bind(key, &var.name, value, symbols, state);
            }
            (Initializer::Expr(value), None) => {
                self.visit(value, symbols, state);
                self.escape(value, symbols, state);
            }
            (init, _) => self.store_initializer(init, symbols, state),
        }
    }

    fn eval(&mut self, expr: &Expr, symbols: &SymbolTable, state: &mut LeakState) {
        self.visit(expr, symbols, state);
    }

    fn branch(&mut self, cond: &Expr, symbols: &SymbolTable, mut state: LeakState) -> (LeakState, LeakState) {
        self.visit(cond, symbols, &mut state);
        let mut then_state = state.clone();
        let mut else_state = state;

        if let Some((pointer, null_when_true)) = null_test(cond) {
            let null_state = if null_when_true {
                &mut then_state
            } else {
                &mut else_state
            };
            if let Some(ids) = self.bound(pointer, symbols, null_state) {
                // A null pointer holds nothing to release
                for id in ids {
                    null_state.handles.insert(id, HandleState::Released);
                }
            }
        }
        (then_state, else_state)
    }

    fn on_return(&mut self, value: Option<&Expr>, span: Span, symbols: &SymbolTable, mut state: LeakState) {
        if let Some(value) = value {
            self.escape(value, symbols, &mut state);
        }
        self.report_acquired(&state, span, "function returns here");
    }

    fn on_fall_off(&mut self, close: Span, _symbols: &SymbolTable, state: LeakState) {
        self.report_acquired(&state, close, "function ends here");
    }

    fn recover(&mut self, _skipped_return: bool, state: &mut LeakState) {
        for handle_state in state.handles.values_mut() {
            if *handle_state == HandleState::Acquired {
                *handle_state = HandleState::Escaped;
            }
        }
    }
}

/// The variable a pointer value is derived from: `p`, `(char *)p`, `p + n`
fn pointer_origin(expr: &Expr) -> Option<&Expr> {
    let expr = expr.strip_casts();
    match &expr.kind {
        ExprKind::Identifier(_) => Some(expr),
        ExprKind::Binary {
            op: BinaryOp::Add | BinaryOp::Sub,
            left,
            right,
        } => pointer_origin(left).or_else(|| pointer_origin(right)),
        _ => None,
    }
}

/// Recognize a null test, returning the tested pointer and whether the
/// true branch is the one where it is null
fn null_test(cond: &Expr) -> Option<(&Expr, bool)> {
    let cond = cond.strip_casts();
    match &cond.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => null_test(operand).map(|(pointer, null)| (pointer, !null)),
        ExprKind::Binary {
            op: op @ (BinaryOp::Eq | BinaryOp::Ne),
            left,
            right,
        } => {
            let pointer = if is_null(right) {
                left
            } else if is_null(left) {
                right
            } else {
                return None;
            };
            Some((tested_pointer(pointer)?, *op == BinaryOp::Eq))
        }
        ExprKind::Identifier(_) | ExprKind::Assign { .. } => Some((tested_pointer(cond)?, false)),
        _ => None,
    }
}

/// `p` itself, or the target of `(p = malloc(n))`
fn tested_pointer(expr: &Expr) -> Option<&Expr> {
    let expr = expr.strip_casts();
    match &expr.kind {
        ExprKind::Identifier(_) => Some(expr),
        ExprKind::Assign { target, .. } => tested_pointer(target),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    match &expr.strip_casts().kind {
        ExprKind::Identifier(name) => name == "NULL",
        ExprKind::IntLiteral(0) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::c::lexer::tokenize;
    use crate::frontend::c::parser::parse;
    use crate::frontend::c::sema::flow::walk_function;
    use crate::frontend::c::sema::scope::Scope;
    use pretty_assertions::assert_eq;
    use string_interner::DefaultStringInterner;

    fn check_with(source: &str, resources: &ResourceTable) -> Vec<Diagnostic> {
        let (tu, diagnostics) = parse(tokenize(source));
        assert!(diagnostics.is_empty(), "unexpected syntax errors: {diagnostics:?}");
        let mut interner = DefaultStringInterner::default();
        let mut found = Vec::new();
        for func in tu.functions() {
            let mut checker = LeakChecker::new(resources);
            walk_function(&mut checker, func, &Scope::new(), &mut interner);
            found.extend(checker.into_diagnostics());
        }
        found
    }

    fn leaks(source: &str) -> Vec<(u32, u32)> {
        check_with(source, &ResourceTable::standard())
            .iter()
            .map(|d| (d.span.line(), d.span.column()))
            .collect()
    }

    #[test]
    fn test_unreleased_allocation_is_reported_at_call() {
        let found = check_with(
            "void f(void) {\n    char *p = malloc(4);\n}",
            &ResourceTable::standard(),
        );
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].span.line(), found[0].span.column()), (2, 15));
        assert_eq!(found[0].related[0].span.line(), 3);
        assert_eq!(found[0].message, "resource from 'malloc' bound to 'p' is never released");
    }

    #[test]
    fn test_matching_release() {
        assert!(leaks("void f(void) { char *p = malloc(4); free(p); }").is_empty());
        assert!(leaks("void f(void) { FILE *f = fopen(\"x\", \"r\"); fclose(f); }").is_empty());
    }

    #[test]
    fn test_wrong_family_does_not_release() {
        assert_eq!(leaks("void f(void) { FILE *f = fopen(\"x\", \"r\"); free(f); }").len(), 1);
    }

    #[test]
    fn test_release_on_one_branch_only() {
        let source = "void f(int c) { char *p = malloc(4); if (c) free(p); }";
        assert_eq!(leaks(source).len(), 1);
    }

    #[test]
    fn test_null_check_return_is_not_a_leak() {
        let source = "int f(void) {\nchar *p = malloc(4);\nif (p == NULL) return 1;\nfree(p);\nreturn 0;\n}";
        assert!(leaks(source).is_empty());
        let source = "int f(void) { char *p; if (!(p = malloc(4))) return 1; free(p); return 0; }";
        assert!(leaks(source).is_empty());
        let source = "int f(void) { char *p = malloc(4); if (p) { free(p); } return 0; }";
        assert!(leaks(source).is_empty());
    }

    #[test]
    fn test_escaped_handles_are_not_reported() {
        assert!(leaks("char *f(void) { char *p = malloc(4); return p; }").is_empty());
        assert!(leaks("void f(struct s *o) { char *p = malloc(4); o->buf = p; }").is_empty());
        assert!(leaks("void f(void) { char *p = malloc(4); char *q = p; free(q); }").is_empty());
        assert!(leaks("void f(char **out) { char *p = malloc(4); *out = p; }").is_empty());
    }

    #[test]
    fn test_unknown_call_keeps_handle() {
        assert_eq!(leaks("void f(void) { char *p = malloc(4); use(p); }").len(), 1);
    }

    #[test]
    fn test_overwrite_reports_first_allocation() {
        let source = "void f(void) {\nchar *p = malloc(4);\np = malloc(8);\nfree(p);\n}";
        let found = check_with(source, &ResourceTable::standard());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span.line(), 2);
        assert_eq!(found[0].related[0].span.line(), 3);
    }

    #[test]
    fn test_realloc_into_same_variable() {
        let source = "void f(void) { char *p = malloc(4); p = realloc(p, 8); free(p); }";
        assert!(leaks(source).is_empty());
    }

    #[test]
    fn test_realloc_into_other_variable_moves_ownership() {
        let source = "void f(void) { char *p = malloc(4); char *q = realloc(p, 8); free(q); }";
        assert!(leaks(source).is_empty());
    }

    #[test]
    fn test_custom_allocator_family() {
        let resources = ResourceTable::standard()
            .with_allocators(["xmalloc"])
            .with_releasers(["xfree"]);
        let source = "void f(void) { char *p = xmalloc(4); xfree(p); char *q = xmalloc(1); }";
        let found = check_with(source, &resources);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("'q'"));
    }

    #[test]
    fn test_leak_inside_loop_body() {
        let source = "void f(int n) { while (n--) { char *p = malloc(4); } }";
        assert_eq!(leaks(source).len(), 1);
    }
}
