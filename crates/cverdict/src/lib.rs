//! cverdict - static checker that classifies C files as valid or invalid
//!
//! A translation unit flows strictly forward through the pipeline:
//! text → tokens → syntax tree → diagnostics → verdict.
//!
//! ## Architecture
//!
//! - **Frontend** (`frontend/`): C lexer, recovering parser and semantic checkers
//! - **Common** (`common/`): spans, diagnostics, input errors and report rendering
//! - **Verdict** (`verdict`): reduces diagnostics to a pass/fail outcome
//! - **Driver** (`driver/`): input handling and the evaluation pipeline
//! - **Config** (`config`): layered JSON settings files

pub mod common;
pub mod config;
pub mod driver;
pub mod frontend;
pub mod verdict;

// Re-exports for convenience
pub use common::{Diagnostic, DiagnosticKind, DiagnosticReporter, EngineError, EngineResult, Severity, Span};
pub use driver::{Pipeline, evaluate};
pub use frontend::{AnalysisConfig, Frontend, FrontendRegistry};
pub use frontend::c::sema::CheckSet;
pub use verdict::{Outcome, Verdict, classify, classify_with};
