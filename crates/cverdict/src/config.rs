//! Layered configuration files
//!
//! Settings come from JSON files, applied in increasing precedence:
//!
//! 1. the user file, `$XDG_CONFIG_HOME/cverdict/config.json` (or
//!    `~/.config/cverdict/config.json`)
//! 2. the project file, `.cverdict.json` in the working directory
//! 3. an explicit `--config` path
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```json
//! {
//!   "strict": true,
//!   "c": { "leak": false, "allocators": ["xmalloc"], "releasers": ["xfree"] }
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::{EngineError, EngineResult};
use crate::frontend::AnalysisConfig;

/// Project file looked up in the working directory
pub const PROJECT_FILE: &str = ".cverdict.json";

/// One configuration file. Absent keys leave the layer below untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub strict: Option<bool>,
    pub verbose: Option<bool>,
    pub c: CSettings,
}

/// C checker settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CSettings {
    pub uninit: Option<bool>,
    pub leak: Option<bool>,
    pub missing_return: Option<bool>,
    /// Extra allocation functions released by `free`
    pub allocators: Vec<String>,
    /// Extra release functions for heap allocations
    pub releasers: Vec<String>,
}

impl ConfigFile {
    /// Parse `text`; `path` only labels errors
    pub fn parse(path: &Path, text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::config(path, e))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::parse(path, &text)
    }

    /// Overlay this layer onto `config`. Flags replace, function lists extend.
    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(strict) = self.strict {
            config.strict = strict;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(uninit) = self.c.uninit {
            config.checks.uninit = uninit;
        }
        if let Some(leak) = self.c.leak {
            config.checks.leak = leak;
        }
        if let Some(missing_return) = self.c.missing_return {
            config.checks.missing_return = missing_return;
        }
        config.allocators.extend(self.c.allocators.iter().cloned());
        config.releasers.extend(self.c.releasers.iter().cloned());
    }
}

/// `cverdict/config.json` under the user's configuration directory
pub fn user_config_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("cverdict").join("config.json"))
}

/// Default-location files that exist, lowest precedence first
pub fn discover(cwd: &Path) -> Vec<PathBuf> {
    let project = cwd.join(PROJECT_FILE);
    user_config_path()
        .into_iter()
        .chain(std::iter::once(project))
        .filter(|path| path.is_file())
        .collect()
}

/// Apply every layer to `base`, returning the result and the files read.
///
/// A discovered file that fails to parse is an error, the same as an
/// explicit one.
pub fn load_layered(
    base: AnalysisConfig,
    cwd: &Path,
    explicit: Option<&Path>,
) -> EngineResult<(AnalysisConfig, Vec<PathBuf>)> {
    let mut paths = discover(cwd);
    paths.extend(explicit.map(Path::to_path_buf));

    let mut config = base;
    for path in &paths {
        ConfigFile::load(path)?.apply(&mut config);
    }
    Ok((config, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_parse_partial_file() {
        let file = ConfigFile::parse(
            Path::new("a.json"),
            r#"{ "strict": true, "c": { "leak": false, "allocators": ["xmalloc"] } }"#,
        )
        .unwrap();
        assert_eq!(file.strict, Some(true));
        assert_eq!(file.verbose, None);
        assert_eq!(file.c.leak, Some(false));
        assert_eq!(file.c.uninit, None);
        assert_eq!(file.c.allocators, vec!["xmalloc".to_string()]);

        assert_eq!(ConfigFile::parse(Path::new("b.json"), "{}").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_unknown_key_is_a_config_error() {
        let err = ConfigFile::parse(Path::new("bad.json"), r#"{ "c": { "check_memory": true } }"#).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
        assert!(err.to_string().starts_with("invalid config file bad.json: unknown field"));
    }

    #[test]
    fn test_apply_overlays_only_present_keys() {
        let mut config = AnalysisConfig {
            strict: true,
            allocators: vec!["pool_get".into()],
            ..AnalysisConfig::default()
        };
        let file = ConfigFile {
            verbose: Some(true),
            c: CSettings {
                missing_return: Some(false),
                allocators: vec!["xmalloc".into()],
                releasers: vec!["xfree".into()],
                ..CSettings::default()
            },
            ..ConfigFile::default()
        };
        file.apply(&mut config);

        assert!(config.strict);
        assert!(config.verbose);
        assert!(config.checks.uninit && config.checks.leak);
        assert!(!config.checks.missing_return);
        assert_eq!(config.allocators, vec!["pool_get".to_string(), "xmalloc".to_string()]);
        assert_eq!(config.releasers, vec!["xfree".to_string()]);
    }

    #[test]
    fn test_explicit_file_overrides_project_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PROJECT_FILE), r#"{ "strict": true, "c": { "leak": false } }"#).unwrap();
        let explicit = dir.path().join("ci.json");
        fs::write(&explicit, r#"{ "strict": false }"#).unwrap();

        let (config, paths) = load_layered(AnalysisConfig::default(), dir.path(), Some(&explicit)).unwrap();
        assert!(!config.strict);
        assert!(!config.checks.leak);
        assert_eq!(paths.last(), Some(&explicit));
        assert!(paths.contains(&dir.path().join(PROJECT_FILE)));
    }

    #[test]
    fn test_missing_explicit_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load_layered(AnalysisConfig::default(), dir.path(), Some(&dir.path().join("none.json")))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
