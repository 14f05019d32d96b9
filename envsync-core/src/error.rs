//! Error types for sync operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("file {file:?} resolves outside base path {base:?}")]
    PathEscape { base: String, file: String },

    #[error("{label} contains unsafe characters")]
    UnsafeCharacters { label: String },

    #[error("file {file:?} is not in the environment's allow-list")]
    NotAllowed { file: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{command} exited with code {code}: {stderr}")]
    RemoteCommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
