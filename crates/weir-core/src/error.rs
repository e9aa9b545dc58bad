//! Error types for the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from configuration loading, validation, and watching.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading or writing the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The save directory could not be created or made absolute.
    #[error("invalid save_dir {path:?}: {source}")]
    SaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watcher could not be started.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
