//! External file import: read, map foreign columns, commit through the session.

use crate::error::{AppError, AppResult};
use crate::progress::CommitProgress;
use crate::session::{CommitReport, SyncSession};
use crate::tabular::{detect_file_format, CsvCodec, FileFormat, Grid, TabularReader};
use std::path::{Path, PathBuf};
use sz_core::{parse_optional_int, parse_optional_real, resolve_ambiguous, MAX_CLUSTER_ID};
use sz_sheet::{
    find_header_row, is_known_color, is_known_marker, map_columns, Column, GridRow, MergePolicy,
    RowSet, SheetLayout, COLUMN_COUNT,
};
use sz_store::{DEFAULT_COLOR, DEFAULT_MARKER};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// `None` uses the session's configured import policy.
    pub policy: Option<MergePolicy>,
    /// Explicit (target column, source header) pairs that beat the alias table.
    pub column_overrides: Vec<(Column, String)>,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub path: PathBuf,
    pub format: FileFormat,
    /// Whether the file already used the 13-column layout.
    pub native_layout: bool,
    pub rows_read: usize,
    pub centroid_rows: usize,
    pub warnings: Vec<String>,
    pub commit: CommitReport,
}

/// Rows read from an external file, ready to commit.
#[derive(Debug, Clone)]
pub struct ExternalRows {
    pub format: FileFormat,
    pub rows: RowSet,
    pub native_layout: bool,
    pub rows_read: usize,
    pub centroid_rows: usize,
    pub warnings: Vec<String>,
}

/// Read an external file into normalized rows without touching the store.
///
/// CSV is read with the built-in codec; other formats need `reader`.
pub fn read_external_rows(
    path: &Path,
    options: &ImportOptions,
    reader: Option<&dyn TabularReader>,
) -> AppResult<ExternalRows> {
    let format = detect_file_format(path);
    let grid = match (format, reader) {
        (_, Some(reader)) => reader.read_sheet(path, options.sheet.as_deref())?,
        (FileFormat::Csv, None) => CsvCodec.read_sheet(path, options.sheet.as_deref())?,
        (other, None) => {
            return Err(AppError::FormatMismatch {
                path: path.to_path_buf(),
                reason: format!("no reader available for {} files", other.label()),
            })
        }
    };

    let loose: Vec<GridRow> = grid
        .iter()
        .map(|cells| GridRow::from_cells(cells.iter().cloned()))
        .collect();
    if let Some(header_row) = find_header_row(&loose) {
        return Ok(native_rows(format, loose, header_row));
    }
    foreign_rows(path, format, &grid, options)
}

fn native_rows(format: FileFormat, rows: Vec<GridRow>, header_row: usize) -> ExternalRows {
    let layout = SheetLayout::for_header_row(header_row);
    let rows = RowSet::new(layout, rows);
    let centroid_rows = (layout.band.start..=layout.band.end)
        .filter(|&i| rows.rows.get(i).is_some_and(|r| !r.is_blank()))
        .count();
    tracing::debug!(header_row, "external file uses the normalized layout");
    ExternalRows {
        format,
        rows_read: rows.populated_data_rows(),
        centroid_rows,
        native_layout: true,
        rows,
        warnings: Vec::new(),
    }
}

fn foreign_rows(
    path: &Path,
    format: FileFormat,
    grid: &Grid,
    options: &ImportOptions,
) -> AppResult<ExternalRows> {
    let Some(header_idx) = grid.iter().position(|r| r.iter().any(|c| !c.trim().is_empty())) else {
        return Err(AppError::FormatMismatch {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    };
    let headers = &grid[header_idx];
    let mapping = map_columns(headers, &options.column_overrides);

    let has_id = mapping[Column::DataId.index()].is_some();
    let has_coords = Column::COORDS.iter().any(|c| mapping[c.index()].is_some());
    if !has_id && !has_coords {
        return Err(AppError::FormatMismatch {
            path: path.to_path_buf(),
            reason: format!(
                "no DataID or coordinate column among [{}]",
                headers.join(", ")
            ),
        });
    }

    let mut warnings = Vec::new();
    let unmapped: Vec<&str> = Column::ALL
        .iter()
        .filter(|c| mapping[c.index()].is_none())
        .map(|c| c.name())
        .collect();
    if !unmapped.is_empty() {
        warnings.push(format!("Unmapped columns will use defaults: {}", unmapped.join(", ")));
    }
    tracing::info!(
        mapped = COLUMN_COUNT - unmapped.len(),
        total = COLUMN_COUNT,
        "column mapping"
    );

    let layout = SheetLayout::standard();
    let mut rows = RowSet::skeleton(layout);
    let mut rows_read = 0usize;
    let mut centroid_rows = 0usize;

    for (offset, source) in grid.iter().enumerate().skip(header_idx + 1) {
        if source.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let mut row = GridRow::blank();
        for column in Column::ALL {
            if let Some(value) = mapping[column.index()].and_then(|i| source.get(i)) {
                row.set(column, value.trim());
            }
        }
        apply_defaults(&mut row);
        resolve_coordinates(&mut row);
        check_vocabulary(&row, offset, &mut warnings);

        if let Some(cluster) = centroid_row_cluster(&row) {
            let target = layout.band.row_for_position(cluster);
            if !rows.rows[target].is_blank() {
                warnings.push(format!(
                    "Row {}: duplicate centroid for cluster {}; later row wins",
                    offset + 1,
                    cluster
                ));
            }
            rows.rows[target] = row;
            centroid_rows += 1;
            continue;
        }

        if row.data_id().is_empty() {
            warnings.push(format!("Row {}: no DataID; skipped", offset + 1));
            continue;
        }
        rows.rows.push(row);
        rows_read += 1;
    }

    Ok(ExternalRows {
        format,
        rows,
        native_layout: false,
        rows_read,
        centroid_rows,
        warnings,
    })
}

fn apply_defaults(row: &mut GridRow) {
    if row.get(Column::Marker).is_empty() {
        row.set(Column::Marker, DEFAULT_MARKER);
    }
    if row.get(Column::Color).is_empty() {
        row.set(Column::Color, DEFAULT_COLOR);
    }
}

/// Foreign coordinates may be raw L*a*b* or already normalized.
fn resolve_coordinates(row: &mut GridRow) {
    let parsed: Vec<Option<f64>> = Column::COORDS
        .iter()
        .map(|c| parse_optional_real(row.get(*c)).ok().flatten())
        .collect();
    if let [Some(x), Some(y), Some(z)] = parsed[..] {
        row.set_coords(resolve_ambiguous(x, y, z));
    }
}

/// A row with no coordinates, a cluster in range and a full centroid.
fn centroid_row_cluster(row: &GridRow) -> Option<usize> {
    if Column::COORDS.iter().any(|c| !row.get(*c).trim().is_empty()) {
        return None;
    }
    let cluster = parse_optional_int(row.get(Column::Cluster)).ok().flatten()?;
    if !(0..=MAX_CLUSTER_ID as i64).contains(&cluster) {
        return None;
    }
    let complete = Column::CENTROID
        .iter()
        .all(|c| matches!(parse_optional_real(row.get(*c)), Ok(Some(_))));
    complete.then_some(cluster as usize)
}

fn check_vocabulary(row: &GridRow, offset: usize, warnings: &mut Vec<String>) {
    let marker = row.get(Column::Marker);
    if !is_known_marker(marker) {
        warnings.push(format!("Row {}: unknown marker '{}'", offset + 1, marker));
    }
    let color = row.get(Column::Color);
    if !is_known_color(color) {
        warnings.push(format!("Row {}: unknown color '{}'", offset + 1, color));
    }
}

/// Read `path` and commit its rows into the session's sample set.
pub fn import_file(
    session: &mut SyncSession,
    path: &Path,
    options: &ImportOptions,
    default_policy: MergePolicy,
    reader: Option<&dyn TabularReader>,
) -> AppResult<ImportReport> {
    import_file_with_progress(session, path, options, default_policy, reader, None)
}

pub fn import_file_with_progress(
    session: &mut SyncSession,
    path: &Path,
    options: &ImportOptions,
    default_policy: MergePolicy,
    reader: Option<&dyn TabularReader>,
    progress: Option<CommitProgress<'_>>,
) -> AppResult<ImportReport> {
    let external = read_external_rows(path, options, reader)?;
    for warning in &external.warnings {
        tracing::warn!(path = %path.display(), "{}", warning);
    }

    let policy = options.policy.unwrap_or(default_policy);
    let commit = session.commit_with(&external.rows, policy, progress)?;
    tracing::info!(
        path = %path.display(),
        format = external.format.label(),
        rows = external.rows_read,
        inserted = commit.inserted,
        updated = commit.updated,
        conflicts = commit.conflicts.len(),
        "import finished"
    );

    Ok(ImportReport {
        path: path.to_path_buf(),
        format: external.format,
        native_layout: external.native_layout,
        rows_read: external.rows_read,
        centroid_rows: external.centroid_rows,
        warnings: external.warnings,
        commit,
    })
}
