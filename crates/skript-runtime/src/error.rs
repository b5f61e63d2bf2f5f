//! Error types for loading and running scripts.

use std::fmt;

use thiserror::Error;

/// A structural problem found while turning statements into a trigger.
///
/// Scripts that produce any of these are not installed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub message: String,
    pub line: Option<usize>,
    /// The offending statement as it would be displayed.
    pub statement: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>, line: Option<usize>, statement: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
            statement: statement.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {line}: {})", self.message, self.statement),
            None => write!(f, "{} ({})", self.message, self.statement),
        }
    }
}

impl std::error::Error for LoadError {}

/// Something suspicious that does not stop a script from loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub message: String,
    pub line: Option<usize>,
}

/// Every error collected while loading one script.
#[derive(Debug, Clone, Error)]
#[error("failed to load '{script}': {} error(s)", .errors.len())]
pub struct ScriptLoadError {
    pub script: String,
    pub errors: Vec<LoadError>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to start async worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Load(#[from] ScriptLoadError),

    #[error("runtime has been shut down")]
    Disabled,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
