use cverdict::common::{DiagnosticReporter, Severity};
use cverdict::{AnalysisConfig, CheckSet, DiagnosticKind, Outcome, Pipeline, evaluate};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

fn fixture_source(relative: &str) -> String {
    std::fs::read_to_string(fixture(relative)).expect("fixture is readable")
}

fn summary(source: &str) -> Vec<(DiagnosticKind, Severity, u32, u32)> {
    evaluate("input.c", source)
        .expect("evaluates")
        .diagnostics
        .iter()
        .map(|d| (d.kind, d.severity, d.span.line(), d.span.column()))
        .collect()
}

#[test]
fn valid_fixture_has_no_findings() {
    let verdict = Pipeline::default()
        .evaluate_file(&fixture("valid/hello.c"))
        .expect("evaluates");
    assert_eq!(verdict.outcome, Outcome::Valid);
    assert!(verdict.diagnostics.is_empty(), "{:?}", verdict.diagnostics);
}

#[test]
fn invalid_fixture_reports_each_defect_once() {
    let verdict = Pipeline::default()
        .evaluate_file(&fixture("invalid/broken.c"))
        .expect("evaluates");
    assert_eq!(verdict.outcome, Outcome::Invalid);

    let found: Vec<_> = verdict
        .diagnostics
        .iter()
        .map(|d| (d.kind, d.severity, d.span.line(), d.span.column()))
        .collect();
    assert_eq!(
        found,
        vec![
            (DiagnosticKind::SyntaxError, Severity::Error, 8, 28),
            (DiagnosticKind::PossibleResourceLeak, Severity::Warning, 11, 21),
            (DiagnosticKind::UninitializedRead, Severity::Error, 16, 27),
            (DiagnosticKind::MissingReturn, Severity::Error, 19, 1),
        ]
    );
    assert_eq!((verdict.error_count(), verdict.warning_count()), (3, 1));

    let leak = &verdict.diagnostics[1];
    assert_eq!(leak.related.len(), 1);
    assert_eq!(leak.related[0].span.line(), 19);
}

#[test]
fn invalid_fixture_text_report() {
    let path = fixture("invalid/broken.c");
    let verdict = Pipeline::default().evaluate_file(&path).expect("evaluates");
    let lines: Vec<_> = verdict
        .diagnostics
        .iter()
        .map(|d| DiagnosticReporter::format_line("broken.c", d))
        .collect();
    assert_eq!(
        lines,
        vec![
            "broken.c:8:28: error: SyntaxError — expected ';' before 'char'",
            "broken.c:11:21: warning: PossibleResourceLeak — resource from 'malloc' bound to 'message' is never released",
            "broken.c:16:27: error: UninitializedRead — variable 'value' is read before it is initialized",
            "broken.c:19:1: error: MissingReturn — non-void function 'main' does not return a value on every path",
        ]
    );
    assert_eq!(
        DiagnosticReporter::format_summary("broken.c", &verdict),
        "broken.c: invalid (3 errors, 1 warnings)"
    );
}

#[test]
fn evaluation_is_idempotent() {
    let source = fixture_source("invalid/broken.c");
    let first = evaluate("broken.c", &source).expect("evaluates");
    let second = evaluate("broken.c", &source).expect("evaluates");
    assert_eq!(first, second);
}

#[test]
fn warning_only_defect_keeps_file_valid() {
    let mut source = fixture_source("valid/hello.c");
    source.push_str("\nvoid scratch(void) {\n    char *tmp = malloc(8);\n}\n");
    let verdict = evaluate("hello.c", &source).expect("evaluates");
    assert_eq!(verdict.outcome, Outcome::Valid);
    assert_eq!(verdict.warning_count(), 1);
}

#[test]
fn error_defect_makes_file_invalid() {
    let mut source = fixture_source("valid/hello.c");
    source.push_str("\nint broken(void) {\n    int n;\n    return n;\n}\n");
    let verdict = evaluate("hello.c", &source).expect("evaluates");
    assert_eq!(verdict.outcome, Outcome::Invalid);
}

#[test]
fn released_allocation_is_not_a_leak() {
    let source = "void f(void) {\n    int *p = calloc(4, sizeof(int));\n    p[0] = 1;\n    free(p);\n}\n";
    assert!(summary(source).is_empty());
}

#[test]
fn assignment_in_one_branch_is_still_uninitialized() {
    let source = "int f(int flag) {\n    int x;\n    if (flag) {\n        x = 1;\n    } else {\n        flag = 2;\n    }\n    return x;\n}\n";
    assert_eq!(
        summary(source),
        vec![(DiagnosticKind::UninitializedRead, Severity::Error, 8, 12)]
    );
}

#[test]
fn syntax_error_is_local_to_its_function() {
    let source = "int first(void) {\n    int a = 1 +;\n    return a;\n}\n\nint second(void) {\n    int b = 2;\n}\n";
    assert_eq!(
        summary(source),
        vec![
            (DiagnosticKind::SyntaxError, Severity::Error, 2, 16),
            (DiagnosticKind::MissingReturn, Severity::Error, 8, 1),
        ]
    );
}

#[test]
fn unknown_library_typedefs_are_valid() {
    let source = "#include <dirent.h>\n\
                  #include <signal.h>\n\
                  #include <time.h>\n\
                  static volatile sig_atomic_t stop;\n\
                  void on_signal(int sig) { stop = sig; }\n\
                  int main(void) {\n    \
                      pid_t pid = fork();\n    \
                      clock_t started = clock();\n    \
                      pthread_t worker;\n    \
                      uint_fast8_t tries = 3;\n    \
                      DIR *dir = opendir(\".\");\n    \
                      if (dir == NULL)\n        \
                          return 1;\n    \
                      closedir(dir);\n    \
                      return pid + (int)started + tries;\n\
                  }\n";
    let verdict = evaluate("typedefs.c", source).expect("evaluates");
    assert_eq!(verdict.outcome, Outcome::Valid);
    assert!(verdict.diagnostics.is_empty(), "{:?}", verdict.diagnostics);
}

#[test]
fn pathological_nesting_is_one_syntax_error() {
    let depth = 50_000;
    let sources = [
        format!("int f(void) {{ {} return 0; {} }}", "{".repeat(depth), "}".repeat(depth)),
        format!("int f(void) {{ return {}1{}; }}", "(".repeat(depth), ")".repeat(depth)),
        format!("int f(int a) {{ return a{}; }}", " * a".repeat(depth)),
    ];
    for source in &sources {
        let kinds: Vec<_> = summary(source).into_iter().map(|(kind, ..)| kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::SyntaxError]);
    }

    let nested = format!("int f(void) {{ {} return 0; {} }}", "{".repeat(100), "}".repeat(100));
    assert!(summary(&nested).is_empty());
}

#[test]
fn disabled_checks_and_strict_mode() {
    let source = fixture_source("invalid/broken.c");
    let config = AnalysisConfig {
        checks: CheckSet::none(),
        ..AnalysisConfig::default()
    };
    let verdict = Pipeline::new(config)
        .evaluate_source("broken.c", &source)
        .expect("evaluates");
    assert_eq!(verdict.diagnostics.len(), 1);
    assert_eq!(verdict.diagnostics[0].kind, DiagnosticKind::SyntaxError);

    let leak_only = "void f(void) { char *p = strdup(\"x\"); }\n";
    let strict = Pipeline::new(AnalysisConfig {
        strict: true,
        ..AnalysisConfig::default()
    });
    assert_eq!(
        strict.evaluate_source("leak.c", leak_only).expect("evaluates").outcome,
        Outcome::Invalid
    );
}

#[test]
fn arbitrary_bytes_never_panic() {
    for source in ["}}}{{{", "int (", "\"unterminated", "/* open", "int main() { return 0", "@#$ int"] {
        let verdict = evaluate("junk.c", source).expect("evaluates");
        assert_eq!(verdict.outcome, Outcome::Invalid, "{source}");
    }
}
