//! Error types for module loading.
//!
//! Only the seams that can genuinely fail surface an [`Error`]: opening a
//! native module, parsing a manifest, and setting up a file watcher. Symbol
//! resolution never errors; a miss is a cached `None` address.

use std::path::PathBuf;

/// Errors produced while loading and managing native modules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No candidate path could be opened.
    #[error("Module not found: {first} ({tried} candidate(s) tried)")]
    ModuleNotFound {
        /// First candidate path, used in diagnostics.
        first: PathBuf,
        /// Number of candidates attempted.
        tried: usize,
    },

    /// The native loader rejected a path.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Manifest parsing or validation errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File watcher setup errors.
    #[error("Watch error: {0}")]
    Watch(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Watch(e.to_string())
    }
}
