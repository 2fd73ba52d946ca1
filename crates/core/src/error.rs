use std::io;
use std::path::{Path, PathBuf};

use crate::compile::AssetKind;

/// Errors that can occur during wpbuild operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No build configuration found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("No configuration overlay found for '{name}' (looked for {tried:?})")]
    EnvironmentConfigNotFound { name: String, tried: Vec<PathBuf> },

    #[error("Configuration is missing required field '{0}'")]
    Validation(&'static str),

    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("{kind} compilation failed: {message}")]
    Compile { kind: AssetKind, message: String },

    #[error("Tool '{0}' could not be started: {1}")]
    ToolNotFound(String, #[source] io::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Plugin directory does not exist: {0}")]
    MissingPluginDirectory(PathBuf),

    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn compile(kind: AssetKind, message: impl Into<String>) -> Self {
        Error::Compile {
            kind,
            message: message.into(),
        }
    }

    /// Whether a long-running watch session has to stop on this error.
    /// Compile failures only fail the one rebuild that hit them.
    pub fn is_fatal_for_watch(&self) -> bool {
        !matches!(self, Error::Compile { .. } | Error::ToolNotFound(..))
    }
}

/// Attach a path to a bare `io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

/// Result type alias for wpbuild operations
pub type Result<T> = std::result::Result<T, Error>;
