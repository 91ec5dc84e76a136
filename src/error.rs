//! Typed errors for the indexing core.
//!
//! Per-document and per-query failures are recovered where they happen;
//! only [`RebuildError`] reaches the refresh caller, and even then it is
//! reported as a status message rather than a process exit.

use std::path::PathBuf;

/// A single document could not be read.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct ParseError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("source directory is unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid source glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("rebuild task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for RebuildError {
    fn from(err: sqlx::Error) -> Self {
        RebuildError::Store(StoreError::Database(err))
    }
}
