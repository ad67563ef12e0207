//! Common infrastructure shared by every pipeline stage

mod diagnostic;
mod error;
mod report;
mod span;

pub use diagnostic::{aggregate, Diagnostic, DiagnosticKind, Related, Severity};
pub use error::{EngineError, EngineResult};
pub use report::{DiagnosticReporter, ReportFormat};
pub use span::{LineIndex, Position, Span};
