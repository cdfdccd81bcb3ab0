use sz_core::CoreError;
use sz_store::{StoreError, ValidationError};
use thiserror::Error;

pub type RowResult<T> = Result<T, RowError>;

/// Failure scoped to a single row. Never aborts a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Row {row}: invalid {field}: {reason}")]
    Validation {
        row: usize,
        field: String,
        reason: String,
    },

    #[error("Row {row}: invalid identity: {what}")]
    InvalidIdentity { row: usize, what: String },
}

impl RowError {
    pub fn row(&self) -> usize {
        match self {
            RowError::Validation { row, .. } | RowError::InvalidIdentity { row, .. } => *row,
        }
    }

    pub(crate) fn validation(row: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        RowError::Validation {
            row,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn from_core(row: usize, err: CoreError) -> Self {
        RowError::InvalidIdentity {
            row,
            what: err.to_string(),
        }
    }

    /// Attach a row number to a store-level failure.
    ///
    /// Persistence failures are not row-scoped and are returned as-is.
    pub(crate) fn from_store(row: usize, err: StoreError) -> Result<Self, StoreError> {
        match err {
            StoreError::Identity(core) => Ok(RowError::from_core(row, core)),
            StoreError::Validation(ValidationError::InvalidValue { field, value, reason }) => {
                Ok(RowError::validation(row, field, format!("{value}: {reason}")))
            }
            StoreError::Validation(other) => Ok(RowError::validation(row, "record", other.to_string())),
            other => Err(other),
        }
    }
}
