//! sz-store: per-sample-set measurement storage.

pub mod migrate;
pub mod schema;
pub mod store;
pub mod validate;

pub use migrate::{dedupe_identities, migrate_to_latest, LATEST_VERSION};
pub use schema::*;
pub use store::{list_sample_sets, store_path, SampleSetStore};
pub use validate::{
    validate_annotation_patch, validate_centroid_patch, validate_raw_patch, validate_sample_set,
    ValidationError,
};

use std::path::PathBuf;
use sz_core::CoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Identity(#[from] CoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },
}

impl StoreError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Unavailable {
            path: path.into(),
            source,
        }
    }
}
