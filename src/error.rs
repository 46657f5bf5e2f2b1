use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the notebook document.
///
/// These always reach the caller: a mutation that cannot be saved is reported
/// as failed rather than kept in memory.
#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("failed to read notebook at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write notebook at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notebook at {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode notebook: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type NotebookResult<T> = Result<T, NotebookError>;
