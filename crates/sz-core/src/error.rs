use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid identity: {what}")]
    InvalidIdentity { what: String },

    #[error("Ambiguous DataID '{data_id}': '_pt' appears {count} times")]
    AmbiguousDataId { data_id: String, count: usize },

    #[error("Cluster id {cluster_id} outside [0, {max}]")]
    ClusterOutOfRange { cluster_id: i64, max: u8 },
}
