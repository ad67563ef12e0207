//! C language frontend
//!
//! This frontend handles:
//! - Lexing C source into tokens (directives become opaque tokens)
//! - Parsing tokens into a C AST with error recovery
//! - Semantic analysis (uninitialized reads, leaks, missing returns)

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod sema;

use crate::common::{Diagnostic, aggregate};
use crate::frontend::{AnalysisConfig, Frontend};

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::{Parser, parse};
pub use sema::SemanticAnalyzer;

/// C language frontend
pub struct CFrontend;

impl CFrontend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontend for CFrontend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".c", ".h"]
    }

    fn analyze(&self, name: &str, source: &str, config: &AnalysisConfig) -> Vec<Diagnostic> {
        if config.verbose {
            eprintln!("Checking {}...", name);
        }

        // Phase 1: Lexing (optional token dump)
        if config.dump_tokens {
            eprintln!("=== C Tokens ===");
            eprint!("{}", self.dump_tokens(source));
            eprintln!("=== End Tokens ===\n");
        }

        // Phase 2: Parsing
        if config.verbose {
            eprintln!("Parsing C...");
        }

        let (ast, syntax) = parse(tokenize(source));

        if config.verbose {
            eprintln!(
                "  {} declarations, {} syntax errors",
                ast.declarations.len(),
                syntax.len()
            );
        }

        if config.dump_ast {
            eprintln!("=== C AST ===");
            eprintln!("{:#?}", ast);
            eprintln!("=== End AST ===\n");
        }

        // Phase 3: Semantic Analysis
        if config.verbose {
            eprintln!("Analyzing...");
        }

        let analyzer = SemanticAnalyzer::new(config.checks, config.resources());
        let semantic = analyzer.analyze(&ast);

        if config.verbose {
            eprintln!("  {} semantic findings", semantic.len());
        }

        aggregate(syntax, semantic)
    }

    fn dump_tokens(&self, source: &str) -> String {
        let mut output = String::new();
        for token in Lexer::new(source).with_comments(true) {
            output.push_str(&format!("{:?}\n", token));
        }
        output
    }

    fn dump_ast(&self, source: &str) -> String {
        let (ast, _) = parse(tokenize(source));
        format!("{:#?}", ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DiagnosticKind;

    #[test]
    fn test_analyze_merges_syntax_and_semantic_findings() {
        let source = "int f(void) {\n    int x;\n    g()\n    return x;\n}\n";
        let diagnostics = CFrontend::new().analyze("t.c", source, &AnalysisConfig::default());
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::SyntaxError, DiagnosticKind::UninitializedRead]
        );
        assert_eq!(diagnostics[0].span.line(), 3);
    }

    #[test]
    fn test_dumps_are_not_empty() {
        let frontend = CFrontend::new();
        let tokens = frontend.dump_tokens("int x; // note");
        assert!(tokens.contains("Int"));
        assert!(tokens.contains("LineComment"));
        assert!(frontend.dump_ast("int x;").contains("TranslationUnit"));
    }
}
