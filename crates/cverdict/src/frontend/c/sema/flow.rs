//! Path-sensitive walk over a function body
//!
//! Each checker supplies a [`Transfer`] describing how its state evolves
//! through expressions. The walker owns the control flow: branches fork
//! the state, join points merge it with [`Lattice::join`], and statements
//! after `return`, `break`, `continue`, `goto` or a call to a noreturn
//! function see no state at all until a label makes them reachable again.
//!
//! Loops are walked once. A loop body may run zero times, so the state
//! after a `while` or `for` is the join of the state before the loop with
//! the state at the end of the body.

use std::collections::HashMap;

use string_interner::DefaultStringInterner;

use super::scope::{Scope, Symbol, SymbolKind, SymbolTable};
use crate::common::Span;
use crate::frontend::c::ast::{
    BinaryOp, Block, BlockItem, DeclKind, Declaration, Expr, ExprKind, ForInit, FuncDecl, Stmt,
    StmtKind, VarDecl,
};

/// Calls that never return control to the caller
const NORETURN_CALLS: &[&str] = &["exit", "abort", "_Exit", "quick_exit"];

/// Dataflow facts that can be merged where paths meet
pub trait Lattice: Clone {
    fn join(self, other: Self) -> Self;
}

/// Merge two possibly unreachable states
pub fn join<S: Lattice>(a: Option<S>, b: Option<S>) -> Option<S> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.join(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// How one checker reacts to the statements and expressions of a body
pub trait Transfer {
    type State: Lattice;

    /// State on entry, with the parameters already in scope
    fn entry(&mut self, func: &FuncDecl, symbols: &SymbolTable) -> Self::State;

    /// A local variable declaration, after its name is in scope
    fn declare(&mut self, var: &VarDecl, symbols: &SymbolTable, state: &mut Self::State);

    /// An expression evaluated for its effects
    fn eval(&mut self, expr: &Expr, symbols: &SymbolTable, state: &mut Self::State);

    /// Evaluate a condition and split into (true, false) successors.
    ///
    /// `&&` and `||` never reach this: the walker splits them and asks
    /// about each operand on its own.
    fn branch(
        &mut self,
        cond: &Expr,
        symbols: &SymbolTable,
        mut state: Self::State,
    ) -> (Self::State, Self::State) {
        self.eval(cond, symbols, &mut state);
        (state.clone(), state)
    }

    /// A `return` statement; its value has already been evaluated
    fn on_return(
        &mut self,
        value: Option<&Expr>,
        span: Span,
        symbols: &SymbolTable,
        state: Self::State,
    );

    /// Control reaching the closing brace of the body
    fn on_fall_off(&mut self, close: Span, symbols: &SymbolTable, state: Self::State);

    /// Code skipped by parser recovery; whatever it did is unknown
    fn recover(&mut self, _skipped_return: bool, _state: &mut Self::State) {}
}

enum Frame<S> {
    Loop {
        breaks: Option<S>,
        continues: Option<S>,
    },
    Switch {
        entry: Option<S>,
        has_default: bool,
        breaks: Option<S>,
    },
}

/// Run `transfer` over the body of `func`
pub fn walk_function<T: Transfer>(
    transfer: &mut T,
    func: &FuncDecl,
    globals: &Scope,
    interner: &mut DefaultStringInterner,
) {
    let Some(body) = &func.body else {
        return;
    };

    let mut walker = Walker {
        transfer,
        symbols: SymbolTable::new(interner, globals.clone()),
        frames: Vec::new(),
        gotos: HashMap::new(),
    };

    walker.symbols.enter();
    for param in &func.params {
        if let (Some(name), Some(span)) = (&param.name, param.name_span) {
            walker
                .symbols
                .define(Symbol::new(name.clone(), span, SymbolKind::Parameter, param.ty.clone()).local());
        }
    }

    let entry = walker.transfer.entry(func, &walker.symbols);
    let end = walker.block(body, Some(entry));
    if let Some(state) = end {
        walker.transfer.on_fall_off(body.close, &walker.symbols, state);
    }
}

struct Walker<'t, 'i, T: Transfer> {
    transfer: &'t mut T,
    symbols: SymbolTable<'i>,
    frames: Vec<Frame<T::State>>,
    /// States carried by forward `goto`s to labels not yet seen
    gotos: HashMap<String, Option<T::State>>,
}

impl<T: Transfer> Walker<'_, '_, T> {
    fn block(&mut self, block: &Block, state: Option<T::State>) -> Option<T::State> {
        self.symbols.enter();
        let mut state = state;
        for item in &block.items {
            state = match item {
                BlockItem::Declaration(decl) => self.declaration(decl, state),
                BlockItem::Statement(stmt) => self.stmt(stmt, state),
            };
        }
        self.symbols.leave();
        state
    }

    fn declaration(&mut self, decl: &Declaration, state: Option<T::State>) -> Option<T::State> {
        match &decl.kind {
            DeclKind::Variable(var) => self.variable(var, state),
            DeclKind::MultipleVariables(vars) => vars
                .iter()
                .fold(state, |state, var| self.variable(var, state)),
            DeclKind::Error { skipped_return } => state.map(|mut s| {
                self.transfer.recover(*skipped_return, &mut s);
                s
            }),
            _ => {
                self.symbols.declare(decl, true);
                state
            }
        }
    }

    fn variable(&mut self, var: &VarDecl, state: Option<T::State>) -> Option<T::State> {
        self.symbols.define_variable(var, true);
        state.map(|mut s| {
            self.transfer.declare(var, &self.symbols, &mut s);
            s
        })
    }

    fn eval(&mut self, expr: &Expr, state: Option<T::State>) -> Option<T::State> {
        state.map(|mut s| {
            self.transfer.eval(expr, &self.symbols, &mut s);
            s
        })
    }

    fn branch(
        &mut self,
        cond: &Expr,
        state: Option<T::State>,
    ) -> (Option<T::State>, Option<T::State>) {
        match &cond.kind {
            // The right operand runs only where the left one decided nothing
            ExprKind::Binary {
                op: BinaryOp::LogAnd,
                left,
                right,
            } => {
                let (left_true, left_false) = self.branch(left, state);
                let (right_true, right_false) = self.branch(right, left_true);
                return (right_true, join(left_false, right_false));
            }
            ExprKind::Binary {
                op: BinaryOp::LogOr,
                left,
                right,
            } => {
                let (left_true, left_false) = self.branch(left, state);
                let (right_true, right_false) = self.branch(right, left_false);
                return (join(left_true, right_true), right_false);
            }
            _ => {}
        }

        match state {
            Some(s) => {
                let (then_state, else_state) = self.transfer.branch(cond, &self.symbols, s);
                // Constant conditions only ever take one side
                match cond.constant_value() {
                    Some(0) => (None, Some(else_state)),
                    Some(_) => (Some(then_state), None),
                    None => (Some(then_state), Some(else_state)),
                }
            }
            None => (None, None),
        }
    }

    fn stmt(&mut self, stmt: &Stmt, state: Option<T::State>) -> Option<T::State> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                let state = self.eval(expr, state);
                if expr.callee_name().is_some_and(|name| NORETURN_CALLS.contains(&name)) {
                    None
                } else {
                    state
                }
            }
            StmtKind::Empty => state,
            StmtKind::Error { skipped_return } => state.map(|mut s| {
                self.transfer.recover(*skipped_return, &mut s);
                s
            }),
            StmtKind::Block(block) => self.block(block, state),
            StmtKind::Declaration(decl) => self.declaration(decl, state),

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (then_state, else_state) = self.branch(condition, state);
                let then_end = self.stmt(then_branch, then_state);
                let else_end = match else_branch {
                    Some(else_branch) => self.stmt(else_branch, else_state),
                    None => else_state,
                };
                join(then_end, else_end)
            }

            StmtKind::While { condition, body } => {
                let (body_state, exit_state) = self.branch(condition, state);
                let (body_end, breaks) = self.loop_body(body, body_state);
                let exit = match exit_state {
                    Some(_) => join(exit_state, body_end),
                    None => None,
                };
                join(exit, breaks)
            }

            StmtKind::DoWhile { body, condition } => {
                let (body_end, breaks) = self.loop_body(body, state);
                let (_, exit) = self.branch(condition, body_end);
                join(exit, breaks)
            }

            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                self.symbols.enter();
                let state = match init {
                    Some(ForInit::Declaration(decl)) => self.declaration(decl, state),
                    Some(ForInit::Expr(expr)) => self.eval(expr, state),
                    None => state,
                };
                let (body_state, exit_state) = match condition {
                    Some(condition) => self.branch(condition, state),
                    None => (state, None),
                };
                let (body_end, breaks) = self.loop_body(body, body_state);
                let body_end = match update {
                    Some(update) => self.eval(update, body_end),
                    None => body_end,
                };
                let exit = match exit_state {
                    Some(_) => join(exit_state, body_end),
                    None => None,
                };
                self.symbols.leave();
                join(exit, breaks)
            }

            StmtKind::Switch { expr, body } => {
                let entry = self.eval(expr, state);
                self.frames.push(Frame::Switch {
                    entry,
                    has_default: false,
                    breaks: None,
                });
                // Nothing in the body runs before the first label
                let body_end = self.stmt(body, None);
                match self.frames.pop() {
                    Some(Frame::Switch {
                        entry,
                        has_default,
                        breaks,
                    }) => {
                        let skipped = if has_default { None } else { entry };
                        join(join(body_end, breaks), skipped)
                    }
                    _ => body_end,
                }
            }

            StmtKind::Case { value: _, stmt } => {
                let state = join(state, self.switch_entry(false));
                self.stmt(stmt, state)
            }

            StmtKind::Default(stmt) => {
                let state = join(state, self.switch_entry(true));
                self.stmt(stmt, state)
            }

            StmtKind::Break => {
                let target = self.frames.iter_mut().rev().find_map(|frame| match frame {
                    Frame::Loop { breaks, .. } | Frame::Switch { breaks, .. } => Some(breaks),
                });
                if let Some(breaks) = target {
                    *breaks = join(breaks.take(), state);
                }
                None
            }

            StmtKind::Continue => {
                let target = self.frames.iter_mut().rev().find_map(|frame| match frame {
                    Frame::Loop { continues, .. } => Some(continues),
                    Frame::Switch { .. } => None,
                });
                if let Some(continues) = target {
                    *continues = join(continues.take(), state);
                }
                None
            }

            StmtKind::Return(value) => {
                if let Some(mut s) = state {
                    if let Some(value) = value {
                        self.transfer.eval(value, &self.symbols, &mut s);
                    }
                    self.transfer
                        .on_return(value.as_ref(), stmt.span, &self.symbols, s);
                }
                None
            }

            StmtKind::Goto(label) => {
                let pending = self.gotos.entry(label.clone()).or_insert(None);
                *pending = join(pending.take(), state);
                None
            }

            StmtKind::Label { name, stmt } => {
                let arriving = self.gotos.remove(name).flatten();
                let state = join(state, arriving);
                self.stmt(stmt, state)
            }
        }
    }

    /// Walk a loop body, returning the state that flows back to the
    /// condition and the state carried by `break`
    fn loop_body(
        &mut self,
        body: &Stmt,
        state: Option<T::State>,
    ) -> (Option<T::State>, Option<T::State>) {
        self.frames.push(Frame::Loop {
            breaks: None,
            continues: None,
        });
        let end = self.stmt(body, state);
        match self.frames.pop() {
            Some(Frame::Loop { breaks, continues }) => (join(end, continues), breaks),
            _ => (end, None),
        }
    }

    /// State entering a `case` or `default` label of the innermost switch
    fn switch_entry(&mut self, is_default: bool) -> Option<T::State> {
        self.frames.iter_mut().rev().find_map(|frame| match frame {
            Frame::Switch {
                entry, has_default, ..
            } => {
                *has_default |= is_default;
                Some(entry.clone())
            }
            Frame::Loop { .. } => None,
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::c::lexer::tokenize;
    use crate::frontend::c::parser::parse;

    /// Counts how many paths reach each exit
    #[derive(Default)]
    struct PathCounter {
        returns: Vec<u32>,
        fall_off: Option<u32>,
        recovered: bool,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Paths(u32);

    impl Lattice for Paths {
        fn join(self, other: Self) -> Self {
            Paths(self.0 + other.0)
        }
    }

    impl Transfer for PathCounter {
        type State = Paths;

        fn entry(&mut self, _func: &FuncDecl, _symbols: &SymbolTable) -> Paths {
            Paths(1)
        }

        fn declare(&mut self, _var: &VarDecl, _symbols: &SymbolTable, _state: &mut Paths) {}

        fn eval(&mut self, _expr: &Expr, _symbols: &SymbolTable, _state: &mut Paths) {}

        fn on_return(&mut self, _value: Option<&Expr>, span: Span, _symbols: &SymbolTable, state: Paths) {
            self.returns.push(span.line() * 100 + state.0);
        }

        fn on_fall_off(&mut self, _close: Span, _symbols: &SymbolTable, state: Paths) {
            self.fall_off = Some(state.0);
        }

        fn recover(&mut self, _skipped_return: bool, _state: &mut Paths) {
            self.recovered = true;
        }
    }

    fn run(source: &str) -> PathCounter {
        let (tu, _) = parse(tokenize(source));
        let func = tu.functions().next().expect("function");
        let mut counter = PathCounter::default();
        let mut interner = DefaultStringInterner::default();
        walk_function(&mut counter, func, &Scope::new(), &mut interner);
        counter
    }

    #[test]
    fn test_if_without_else_joins_both_paths() {
        let counter = run("int f(int c) { if (c) c = 1; }");
        assert_eq!(counter.fall_off, Some(2));
    }

    #[test]
    fn test_return_on_every_branch_cuts_fall_off() {
        let counter = run("int f(int c) {\nif (c) return 1;\nelse return 2;\n}");
        assert_eq!(counter.returns, vec![201, 301]);
        assert_eq!(counter.fall_off, None);
    }

    #[test]
    fn test_infinite_loop_exits_only_through_break() {
        assert_eq!(run("int f(void) { while (1) { } }").fall_off, None);
        assert_eq!(run("int f(void) { for (;;) { break; } }").fall_off, Some(1));
    }

    #[test]
    fn test_noreturn_call_ends_path() {
        let counter = run("int f(int c) { if (c) exit(1); else abort(); }");
        assert_eq!(counter.fall_off, None);
    }

    #[test]
    fn test_switch_without_default_may_skip_body() {
        let counter = run("int f(int c) { switch (c) { case 1: return 1; } }");
        assert_eq!(counter.fall_off, Some(1));

        let counter = run("int f(int c) { switch (c) { case 1: return 1; default: return 0; } }");
        assert_eq!(counter.fall_off, None);
    }

    #[test]
    fn test_forward_goto_reaches_label() {
        let counter = run("int f(int c) { if (c) goto out; return 1; out: return 0; }");
        assert_eq!(counter.returns.len(), 2);
        assert_eq!(counter.fall_off, None);
    }

    #[test]
    fn test_short_circuit_conditions_split_paths() {
        let counter = run("int f(int a, int b) {\nif (a && b) return 1;\n}");
        assert_eq!(counter.returns, vec![201]);
        assert_eq!(counter.fall_off, Some(2));

        let counter = run("int f(int a, int b) {\nif (a || b) return 1;\n}");
        assert_eq!(counter.returns, vec![202]);
        assert_eq!(counter.fall_off, Some(1));
    }

    #[test]
    fn test_constant_operand_prunes_its_side() {
        let counter = run("int f(int a) {\nif (0 && a) return 1;\n}");
        assert!(counter.returns.is_empty());
        assert_eq!(counter.fall_off, Some(1));
    }

    #[test]
    fn test_recovered_statement_reaches_transfer() {
        let counter = run("int f(void) { 1 +; return 0; }");
        assert!(counter.recovered);
    }
}
