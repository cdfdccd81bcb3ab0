//! Shared application service layer for the color-measurement sync engine.
//!
//! Front ends (CLI, grid, plot views) go through this crate for sessions,
//! refresh/commit, projections, and file import/export.

pub mod config;
pub mod error;
pub mod export_service;
pub mod import_service;
pub mod progress;
pub mod projection;
pub mod sample_set_service;
pub mod session;
pub mod tabular;

pub use config::{load_config, save_config, AppConfig, SyncConfig, DATA_DIR_ENV, DEFAULT_DATA_DIR};
pub use error::{AppError, AppResult};
pub use export_service::{build_export_rows, export_file, ExportReport, ExportTemplate};
pub use import_service::{
    import_file, import_file_with_progress, read_external_rows, ExternalRows, ImportOptions,
    ImportReport,
};
pub use progress::{CommitProgress, CommitProgressEvent, CommitStage};
pub use projection::{get_plot3d_dataframe, get_ternary_dataframe};
pub use sample_set_service::{list_sample_sets, open_session, summarize, SampleSetSummary};
pub use session::{
    fingerprint_rows, AutoRefresh, ChangeEvent, ChangeListener, CommitReport, RefreshHandle,
    RefreshKind, SyncSession, DEFAULT_COMMIT_CHUNK,
};
pub use tabular::{detect_file_format, CsvCodec, FileFormat, Grid, TabularReader, TabularWriter};
