// backupservice/src/errors.rs
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    /// The artifact root could not be created or is not usable. Raised at
    /// construction time; the whole service is disabled when this occurs.
    #[error("backup root unavailable at {path}: {source}")]
    Uninitialized {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external dump/archive/restore binary exited non-zero.
    #[error("{tool} failed with {status}: {stderr}")]
    ToolExecution {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// A required external binary is not installed on this host.
    #[error("{tool} executable not found in PATH")]
    ToolMissing { tool: String },

    /// A job could not be handed to the worker pool after admission.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Remote upload failed. Handled inside the uploader (logged and
    /// swallowed); never surfaces as a task failure.
    #[error("object storage upload failed: {0}")]
    StorageUpload(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task store error: {0}")]
    TaskStore(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackupError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
