//! Diagnostic rendering

use codespan_reporting::diagnostic::{Diagnostic as CodespanDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;

use super::{Diagnostic, Severity};
use crate::verdict::Verdict;

/// How diagnostics are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One `<path>:<line>:<column>: <severity>: <kind> — <message>` line each
    #[default]
    Text,
    /// Annotated source excerpts
    Rich,
}

/// Renders diagnostics for the files it has been given
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            config: term::Config::default(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    /// Format one diagnostic as a single compiler-style line
    pub fn format_line(path: &str, diagnostic: &Diagnostic) -> String {
        format!(
            "{}:{}:{}: {}: {} — {}",
            path,
            diagnostic.span.line(),
            diagnostic.span.column(),
            diagnostic.severity,
            diagnostic.kind,
            diagnostic.message
        )
    }

    /// Closing line for a file's report
    pub fn format_summary(path: &str, verdict: &Verdict) -> String {
        if verdict.is_valid() {
            format!("{path}: valid")
        } else {
            format!(
                "{}: invalid ({} errors, {} warnings)",
                path,
                verdict.error_count(),
                verdict.warning_count()
            )
        }
    }

    /// Write `verdict` for the file registered as `file_id` in the given format
    pub fn emit(
        &self,
        writer: &mut dyn WriteColor,
        file_id: usize,
        verdict: &Verdict,
        format: ReportFormat,
    ) -> anyhow::Result<()> {
        let path = self.files.get(file_id)?.name().clone();

        for diagnostic in &verdict.diagnostics {
            match format {
                ReportFormat::Text => writeln!(writer, "{}", Self::format_line(&path, diagnostic))?,
                ReportFormat::Rich => {
                    let rendered = self.to_codespan(file_id, diagnostic);
                    term::emit(writer, &self.config, &self.files, &rendered)?;
                }
            }
        }

        writeln!(writer, "{}", Self::format_summary(&path, verdict))?;
        Ok(())
    }

    fn to_codespan(&self, file_id: usize, diagnostic: &Diagnostic) -> CodespanDiagnostic<usize> {
        let base = match diagnostic.severity {
            Severity::Error => CodespanDiagnostic::error(),
            Severity::Warning => CodespanDiagnostic::warning(),
        };

        let mut labels = vec![
            Label::primary(file_id, diagnostic.span.byte_range()).with_message(&diagnostic.message),
        ];
        labels.extend(diagnostic.related.iter().map(|related| {
            Label::secondary(file_id, related.span.byte_range()).with_message(&related.message)
        }));

        base.with_message(diagnostic.kind.as_str())
            .with_code(diagnostic.kind.as_str())
            .with_labels(labels)
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Position, Span};
    use crate::verdict::classify;
    use codespan_reporting::term::termcolor::Buffer;

    fn sample() -> Verdict {
        let span = Span::new(Position::new(2, 12, 25), Position::new(2, 17, 30));
        classify(vec![Diagnostic::uninitialized_read("value", span)])
    }

    #[test]
    fn test_text_line_shape() {
        let verdict = sample();
        let line = DiagnosticReporter::format_line("broken.c", &verdict.diagnostics[0]);
        assert_eq!(
            line,
            "broken.c:2:12: error: UninitializedRead — variable 'value' is read before it is initialized"
        );
    }

    #[test]
    fn test_emit_text_and_rich() {
        let source = "int f(void) {\n    return value;\n}\n";
        let mut reporter = DiagnosticReporter::new();
        let file_id = reporter.add_file("f.c", source);
        let verdict = sample();

        let mut text = Buffer::no_color();
        reporter.emit(&mut text, file_id, &verdict, ReportFormat::Text).unwrap();
        let text = String::from_utf8(text.into_inner()).unwrap();
        assert!(text.ends_with("f.c: invalid (1 errors, 0 warnings)\n"));

        let mut rich = Buffer::no_color();
        reporter.emit(&mut rich, file_id, &verdict, ReportFormat::Rich).unwrap();
        let rich = String::from_utf8(rich.into_inner()).unwrap();
        assert!(rich.contains("UninitializedRead"));
        assert!(rich.contains("return value;"));
    }
}
