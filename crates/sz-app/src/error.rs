//! Error types for the sz-app service layer.

use std::path::PathBuf;

/// Application error shared by every front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Format mismatch in {path}: {reason}")]
    FormatMismatch { path: PathBuf, reason: String },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Tabular codec error in {path}: {message}")]
    Codec { path: PathBuf, message: String },

    #[error("Config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for sz-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<sz_store::StoreError> for AppError {
    fn from(err: sz_store::StoreError) -> Self {
        match err {
            sz_store::StoreError::Unavailable { path, source } => {
                AppError::StoreUnavailable { path, source }
            }
            sz_store::StoreError::Identity(core) => AppError::InvalidIdentity(core.to_string()),
            other => AppError::Store(other.to_string()),
        }
    }
}

impl From<sz_core::CoreError> for AppError {
    fn from(err: sz_core::CoreError) -> Self {
        AppError::InvalidIdentity(err.to_string())
    }
}
