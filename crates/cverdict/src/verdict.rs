//! Pass/fail classification of a translation unit

use std::fmt;

use crate::common::{Diagnostic, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Valid,
    Invalid,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Valid => f.write_str("valid"),
            Outcome::Invalid => f.write_str("invalid"),
        }
    }
}

/// The outcome together with the findings that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Ordered by location, then severity
    pub diagnostics: Vec<Diagnostic>,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        self.outcome == Outcome::Valid
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Invalid exactly when some diagnostic is an error
pub fn classify(diagnostics: Vec<Diagnostic>) -> Verdict {
    classify_with(diagnostics, false)
}

/// Like [`classify`]; in strict mode warnings fail the file too
pub fn classify_with(diagnostics: Vec<Diagnostic>, strict: bool) -> Verdict {
    let failed = if strict {
        !diagnostics.is_empty()
    } else {
        diagnostics.iter().any(Diagnostic::is_error)
    };
    let outcome = if failed {
        Outcome::Invalid
    } else {
        Outcome::Valid
    };
    Verdict {
        outcome,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Span;

    #[test]
    fn test_no_diagnostics_is_valid() {
        let verdict = classify(Vec::new());
        assert!(verdict.is_valid());
        assert_eq!(verdict.outcome.to_string(), "valid");
    }

    #[test]
    fn test_warnings_alone_stay_valid() {
        let leak = Diagnostic::resource_leak("p", "malloc", Span::default());
        let verdict = classify(vec![leak.clone()]);
        assert_eq!(verdict.outcome, Outcome::Valid);
        assert_eq!(verdict.warning_count(), 1);

        assert_eq!(classify_with(vec![leak], true).outcome, Outcome::Invalid);
    }

    #[test]
    fn test_any_error_is_invalid() {
        let verdict = classify(vec![
            Diagnostic::resource_leak("p", "malloc", Span::default()),
            Diagnostic::missing_return("main", Span::default()),
        ]);
        assert_eq!(verdict.outcome, Outcome::Invalid);
        assert_eq!((verdict.error_count(), verdict.warning_count()), (1, 1));
    }
}
