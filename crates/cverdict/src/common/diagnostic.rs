//! Diagnostics and the aggregation step that orders them

use std::collections::HashSet;
use std::fmt;

use super::Span;

/// Diagnostic severity. `Error` sorts before `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The defect taxonomy. The identifiers printed by `Display` are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    SyntaxError,
    UninitializedRead,
    PossibleResourceLeak,
    MissingReturn,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::SyntaxError => "SyntaxError",
            DiagnosticKind::UninitializedRead => "UninitializedRead",
            DiagnosticKind::PossibleResourceLeak => "PossibleResourceLeak",
            DiagnosticKind::MissingReturn => "MissingReturn",
        }
    }

    /// Severity a finding of this kind carries
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::PossibleResourceLeak => Severity::Warning,
            DiagnosticKind::SyntaxError
            | DiagnosticKind::UninitializedRead
            | DiagnosticKind::MissingReturn => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary location attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Related {
    pub span: Span,
    pub message: String,
}

/// One detected defect instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    pub related: Vec<Related>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            message: message.into(),
            span,
            related: Vec::new(),
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::SyntaxError, message, span)
    }

    pub fn uninitialized_read(name: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::UninitializedRead,
            format!("variable '{name}' is read before it is initialized"),
            span,
        )
    }

    pub fn resource_leak(name: &str, acquired_by: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::PossibleResourceLeak,
            format!("resource from '{acquired_by}' bound to '{name}' is never released"),
            span,
        )
    }

    pub fn missing_return(function: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::MissingReturn,
            format!("non-void function '{function}' does not return a value on every path"),
            span,
        )
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(Related {
            span,
            message: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Merge parser and analyzer findings into one ordered sequence.
///
/// Sorted by (line, column), then Error before Warning. Repeats of the same
/// (kind, span) pair, which error recovery can produce, are kept once.
pub fn aggregate(
    parser_diagnostics: Vec<Diagnostic>,
    semantic_diagnostics: Vec<Diagnostic>,
) -> Vec<Diagnostic> {
    let mut all: Vec<Diagnostic> = parser_diagnostics
        .into_iter()
        .chain(semantic_diagnostics)
        .collect();

    all.sort_by(|a, b| {
        (a.span.start.line, a.span.start.column, a.severity, a.kind, a.span.end, &a.message)
            .cmp(&(b.span.start.line, b.span.start.column, b.severity, b.kind, b.span.end, &b.message))
    });

    let mut seen = HashSet::new();
    all.retain(|d| seen.insert((d.kind, d.span)));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;
    use pretty_assertions::assert_eq;

    fn at(line: u32, column: u32) -> Span {
        let offset = (line as usize) * 100 + column as usize;
        Span::new(
            Position::new(line, column, offset),
            Position::new(line, column + 1, offset + 1),
        )
    }

    #[test]
    fn test_aggregate_orders_by_location_then_severity() {
        let parser = vec![Diagnostic::syntax("expected ';'", at(8, 28))];
        let semantic = vec![
            Diagnostic::missing_return("main", at(19, 1)),
            Diagnostic::resource_leak("p", "malloc", at(3, 5)),
            Diagnostic::uninitialized_read("x", at(3, 5)),
        ];

        let kinds: Vec<_> = aggregate(parser, semantic).iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::UninitializedRead,
                DiagnosticKind::PossibleResourceLeak,
                DiagnosticKind::SyntaxError,
                DiagnosticKind::MissingReturn,
            ]
        );
    }

    #[test]
    fn test_aggregate_removes_repeats() {
        let parser = vec![
            Diagnostic::syntax("expected ';'", at(2, 3)),
            Diagnostic::syntax("expected ';' after expression", at(2, 3)),
        ];
        let semantic = vec![Diagnostic::uninitialized_read("x", at(2, 3))];

        let merged = aggregate(parser, semantic);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, DiagnosticKind::SyntaxError);
        assert_eq!(merged[1].kind, DiagnosticKind::UninitializedRead);
    }

    #[test]
    fn test_leak_is_a_warning() {
        let diagnostic = Diagnostic::resource_leak("buf", "malloc", at(1, 1));
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert!(!diagnostic.is_error());
    }
}
