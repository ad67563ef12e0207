//! Input errors
//!
//! Defects found in the analyzed source are never errors: they travel as
//! [`Diagnostic`](super::Diagnostic) values. `EngineError` covers the cases
//! where there is nothing to analyze at all, or no usable settings to
//! analyze it with.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain an analyzable translation unit
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },

    #[error("{name} is empty")]
    EmptyInput { name: String },

    #[error("no frontend accepts {name}")]
    NoFrontend { name: String },

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    pub fn empty_input(name: impl Into<String>) -> Self {
        Self::EmptyInput { name: name.into() }
    }

    pub fn no_frontend(name: impl Into<String>) -> Self {
        Self::NoFrontend { name: name.into() }
    }

    pub fn config(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
