//! Frontend trait and implementations
//!
//! A frontend takes source text through lexing, parsing and semantic
//! analysis and returns every finding as an ordered diagnostic list.

pub mod c;

use crate::common::Diagnostic;
use crate::frontend::c::sema::{CheckSet, ResourceTable};

pub use c::CFrontend;

/// Options for one analysis run
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub verbose: bool,
    pub dump_tokens: bool,
    pub dump_ast: bool,
    /// Warnings fail the verdict as well
    pub strict: bool,
    pub checks: CheckSet,
    /// Extra allocation functions released by `free`
    pub allocators: Vec<String>,
    /// Extra release functions for heap allocations
    pub releasers: Vec<String>,
}

impl AnalysisConfig {
    /// Built-in resource families plus the configured extras
    pub fn resources(&self) -> ResourceTable {
        ResourceTable::standard()
            .with_allocators(self.allocators.iter().cloned())
            .with_releasers(self.releasers.iter().cloned())
    }
}

/// Trait for language frontends
pub trait Frontend: Send + Sync {
    /// The name of this frontend (e.g., "c")
    fn name(&self) -> &'static str;

    /// File extensions this frontend handles (e.g., &[".c", ".h"])
    fn extensions(&self) -> &'static [&'static str];

    /// Run the whole frontend over `source`.
    ///
    /// Never fails: syntax and semantic defects are diagnostics, sorted
    /// and deduplicated.
    fn analyze(&self, name: &str, source: &str, config: &AnalysisConfig) -> Vec<Diagnostic>;

    /// Optional: dump tokens for debugging
    fn dump_tokens(&self, source: &str) -> String {
        let _ = source;
        String::new()
    }

    /// Optional: dump AST for debugging
    fn dump_ast(&self, source: &str) -> String {
        let _ = source;
        String::new()
    }
}

/// Registry of available frontends
pub struct FrontendRegistry {
    frontends: Vec<Box<dyn Frontend>>,
}

impl FrontendRegistry {
    pub fn new() -> Self {
        Self {
            frontends: Vec::new(),
        }
    }

    /// A registry holding every built-in frontend
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CFrontend::new()));
        registry
    }

    pub fn register(&mut self, frontend: Box<dyn Frontend>) {
        self.frontends.push(frontend);
    }

    pub fn find_by_extension(&self, ext: &str) -> Option<&dyn Frontend> {
        self.frontends
            .iter()
            .find(|f| f.extensions().contains(&ext))
            .map(|f| f.as_ref())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&dyn Frontend> {
        self.frontends
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// The frontend used when nothing else matches
    pub fn fallback(&self) -> Option<&dyn Frontend> {
        self.find_by_name("c")
    }
}

impl Default for FrontendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
