//! Semantic analyzer - runs the enabled checkers over every function

use string_interner::DefaultStringInterner;

use super::flow::walk_function;
use super::leak::{LeakChecker, ResourceTable};
use super::returns::ReturnChecker;
use super::scope::{Scope, SymbolTable};
use super::uninit::UninitChecker;
use crate::common::Diagnostic;
use crate::frontend::c::ast::{DeclKind, FuncDecl, TranslationUnit};

/// Which checkers run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSet {
    pub uninit: bool,
    pub leak: bool,
    pub missing_return: bool,
}

impl Default for CheckSet {
    fn default() -> Self {
        Self::all()
    }
}

impl CheckSet {
    pub fn all() -> Self {
        Self {
            uninit: true,
            leak: true,
            missing_return: true,
        }
    }

    pub fn none() -> Self {
        Self {
            uninit: false,
            leak: false,
            missing_return: false,
        }
    }
}

/// Semantic analyzer for a whole translation unit
#[derive(Debug, Clone, Default)]
pub struct SemanticAnalyzer {
    checks: CheckSet,
    resources: ResourceTable,
}

impl SemanticAnalyzer {
    pub fn new(checks: CheckSet, resources: ResourceTable) -> Self {
        Self { checks, resources }
    }

    /// Analyze a translation unit.
    ///
    /// File-scope names are visible to the functions that follow them.
    /// Each function is checked independently, so a body damaged by a
    /// syntax error does not affect findings in its neighbours.
    pub fn analyze(&self, tu: &TranslationUnit) -> Vec<Diagnostic> {
        let mut interner = DefaultStringInterner::default();
        let mut globals = Scope::new();
        let mut diagnostics = Vec::new();

        for decl in &tu.declarations {
            let mut table = SymbolTable::new(&mut interner, globals);
            table.declare(decl, false);
            globals = table.into_scope();

            if let DeclKind::Function(func) = &decl.kind {
                if func.is_definition() {
                    diagnostics.extend(self.check_function(func, &globals, &mut interner));
                }
            }
        }

        diagnostics
    }

    fn check_function(
        &self,
        func: &FuncDecl,
        globals: &Scope,
        interner: &mut DefaultStringInterner,
    ) -> Vec<Diagnostic> {
        let mut found = Vec::new();

        if self.checks.uninit {
            let mut checker = UninitChecker::new();
            walk_function(&mut checker, func, globals, interner);
            found.extend(checker.into_diagnostics());
        }

        if self.checks.leak {
            let mut checker = LeakChecker::new(&self.resources);
            walk_function(&mut checker, func, globals, interner);
            found.extend(checker.into_diagnostics());
        }

        if self.checks.missing_return && ReturnChecker::applies_to(func) {
            let mut checker = ReturnChecker::new();
            walk_function(&mut checker, func, globals, interner);
            found.extend(checker.into_diagnostics());
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DiagnosticKind;
    use crate::frontend::c::lexer::tokenize;
    use crate::frontend::c::parser::parse;
    use pretty_assertions::assert_eq;

    fn kinds_with(source: &str, checks: CheckSet) -> Vec<DiagnosticKind> {
        let (tu, _) = parse(tokenize(source));
        SemanticAnalyzer::new(checks, ResourceTable::standard())
            .analyze(&tu)
            .iter()
            .map(|d| d.kind)
            .collect()
    }

    fn kinds(source: &str) -> Vec<DiagnosticKind> {
        kinds_with(source, CheckSet::all())
    }

    const DEFECTIVE: &str = "int f(void) { int x; char *p = malloc(1); p[0] = x; }";

    #[test]
    fn test_all_checkers_report() {
        assert_eq!(
            kinds(DEFECTIVE),
            vec![
                DiagnosticKind::UninitializedRead,
                DiagnosticKind::PossibleResourceLeak,
                DiagnosticKind::MissingReturn,
            ]
        );
    }

    #[test]
    fn test_disabled_checkers_stay_silent() {
        assert!(kinds_with(DEFECTIVE, CheckSet::none()).is_empty());

        let checks = CheckSet {
            leak: false,
            ..CheckSet::all()
        };
        assert_eq!(
            kinds_with(DEFECTIVE, checks),
            vec![DiagnosticKind::UninitializedRead, DiagnosticKind::MissingReturn]
        );
    }

    #[test]
    fn test_file_scope_typedef_is_resolved() {
        let source = "typedef unsigned long word;\nint f(void) { word w; return (int)w; }";
        assert_eq!(kinds(source), vec![DiagnosticKind::UninitializedRead]);
    }

    #[test]
    fn test_globals_are_not_tracked() {
        let source = "int counter;\nchar *cache;\nint f(void) { cache = malloc(8); return counter; }";
        assert!(kinds(source).is_empty());
    }

    #[test]
    fn test_syntax_error_does_not_hide_other_functions() {
        let source = "int f(void) { x = ; return 0; }\nint g(void) { }";
        let (tu, parse_errors) = parse(tokenize(source));
        assert_eq!(parse_errors.len(), 1);
        let found = SemanticAnalyzer::default().analyze(&tu);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiagnosticKind::MissingReturn);
        assert_eq!(found[0].span.line(), 2);
    }

    #[test]
    fn test_analysis_is_repeatable() {
        let (tu, _) = parse(tokenize(DEFECTIVE));
        let analyzer = SemanticAnalyzer::default();
        assert_eq!(analyzer.analyze(&tu), analyzer.analyze(&tu));
    }
}
