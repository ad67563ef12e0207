//! Semantic analysis
//!
//! Three independent checkers run over each function body: reads of
//! uninitialized locals, leaked allocations and missing return values.

mod analyzer;
mod flow;
mod leak;
mod returns;
mod scope;
mod uninit;

pub use analyzer::{CheckSet, SemanticAnalyzer};
pub use flow::{Lattice, Transfer, walk_function};
pub use leak::{HandleState, LeakChecker, ResourceFamily, ResourceHandle, ResourceTable};
pub use returns::ReturnChecker;
pub use scope::{Scope, Symbol, SymbolKind, SymbolTable};
pub use uninit::UninitChecker;
