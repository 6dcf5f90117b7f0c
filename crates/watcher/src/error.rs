//! Error types for tree watching

use std::path::PathBuf;
use thiserror::Error;
use treewatch_core::RelPath;

/// Boxed error carried by filter and backend failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher is already initialized")]
    AlreadyInitialized,

    #[error("watcher is not initialized")]
    NotInitialized,

    #[error("watcher is already shut down")]
    AlreadyShutDown,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list {}: {source}", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("filter failed for {path}: {source}")]
    Filter {
        path: RelPath,
        #[source]
        source: BoxError,
    },

    #[error("failed to watch {}: {source}", path.display())]
    Backend {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("failed to load ignore rules: {0}")]
    Ignore(String),

    #[error("reconciliation task failed: {0}")]
    TaskFailed(String),
}

impl WatchError {
    /// Whether the reconciliation task must stop on this error
    ///
    /// Watch registration failures (including running out of native watches)
    /// are not retried. Everything else only aborts the current step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Backend { .. })
    }
}
