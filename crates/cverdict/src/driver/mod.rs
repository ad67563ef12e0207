//! Evaluation driver: input handling and pipeline orchestration

use std::fs;
use std::path::Path;

use crate::common::{EngineError, EngineResult};
use crate::frontend::{AnalysisConfig, Frontend, FrontendRegistry};
use crate::verdict::{Verdict, classify_with};

/// Runs source text through a frontend and classifies the result
pub struct Pipeline {
    frontends: FrontendRegistry,
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            frontends: FrontendRegistry::with_builtin(),
            config,
        }
    }

    /// Pick a frontend from the file extension, falling back to C
    fn frontend_for(&self, name: &str) -> Option<&dyn Frontend> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        self.frontends
            .find_by_extension(&ext)
            .or_else(|| self.frontends.fallback())
    }

    /// Evaluate in-memory source text. `name` labels the input.
    pub fn evaluate_source(&self, name: &str, source: &str) -> EngineResult<Verdict> {
        if source.trim().is_empty() {
            return Err(EngineError::empty_input(name));
        }

        let frontend = self
            .frontend_for(name)
            .ok_or_else(|| EngineError::no_frontend(name))?;
        let diagnostics = frontend.analyze(name, source, &self.config);

        let verdict = classify_with(diagnostics, self.config.strict);
        if self.config.verbose {
            eprintln!("{}: {}", name, verdict.outcome);
        }
        Ok(verdict)
    }

    /// Read and evaluate a file
    pub fn evaluate_file(&self, path: &Path) -> EngineResult<Verdict> {
        let source = read_source(path)?;
        self.evaluate_source(&path.display().to_string(), &source)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Read a file as UTF-8 text
pub fn read_source(path: &Path) -> EngineResult<String> {
    let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    String::from_utf8(bytes).map_err(|_| EngineError::invalid_utf8(path))
}

/// Evaluate source text with the default configuration
pub fn evaluate(name: &str, source: &str) -> EngineResult<Verdict> {
    Pipeline::default().evaluate_source(name, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Outcome;

    #[test]
    fn test_blank_input_is_an_engine_error() {
        let err = evaluate("blank.c", " \n\t\n").unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput { .. }));
        assert_eq!(err.to_string(), "blank.c is empty");
    }

    #[test]
    fn test_missing_file_is_an_engine_error() {
        let err = Pipeline::default()
            .evaluate_file(Path::new("/nonexistent/input.c"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_unknown_extension_uses_c() {
        let verdict = evaluate("snippet.txt", "int main(void) { return 0; }").unwrap();
        assert_eq!(verdict.outcome, Outcome::Valid);
    }

    #[test]
    fn test_empty_registry_is_an_engine_error() {
        let pipeline = Pipeline {
            frontends: FrontendRegistry::new(),
            config: AnalysisConfig::default(),
        };
        let err = pipeline
            .evaluate_source("main.c", "int main(void) { return 0; }")
            .unwrap_err();
        assert!(matches!(err, EngineError::NoFrontend { .. }));
        assert_eq!(err.to_string(), "no frontend accepts main.c");
    }

    #[test]
    fn test_strict_mode_fails_on_warnings() {
        let source = "void f(void) { char *p = malloc(1); }";
        assert!(evaluate("leak.c", source).unwrap().is_valid());

        let strict = Pipeline::new(AnalysisConfig {
            strict: true,
            ..AnalysisConfig::default()
        });
        assert!(!strict.evaluate_source("leak.c", source).unwrap().is_valid());
    }
}
