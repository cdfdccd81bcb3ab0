//! sz-sheet: the normalized row model and its reconciliation with the store.
//!
//! Contains:
//! - columns (fixed 13-column order, foreign-header aliases)
//! - layout (header row, centroid band, data area; standard and rigid variants)
//! - row (string-celled grid rows and row sets)
//! - classify (positional rows -> typed `Row` variants)
//! - reconcile (typed rows -> store upserts under a merge policy)
//! - vocab (marker and colour names)

pub mod classify;
pub mod columns;
pub mod error;
pub mod layout;
pub mod reconcile;
pub mod row;
pub mod vocab;

pub use classify::{classify_row, AnnotationCells, CentroidFields, DataFields, Row};
pub use columns::{column_names, map_columns, Column, COLUMN_COUNT};
pub use error::{RowError, RowResult};
pub use layout::{
    find_header_row, CentroidBand, SheetLayout, CENTROID_BAND_ROWS, DEFAULT_BUFFER_ROWS,
    RIGID_METADATA_ROWS,
};
pub use reconcile::{
    imported_sample_type, MergeConflict, MergePolicy, Reconciled, Reconciler, RowAction,
};
pub use row::{format_real, GridRow, RowSet};
pub use vocab::{is_known_color, is_known_marker, VALID_COLORS, VALID_MARKERS};
