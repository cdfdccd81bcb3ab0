//! Export of the normalized-row layout to external files.

use crate::error::{AppError, AppResult};
use crate::projection::get_plot3d_dataframe;
use crate::tabular::{detect_file_format, CsvCodec, FileFormat, Grid, TabularWriter};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use sz_core::Projection;
use sz_sheet::{GridRow, RowSet, SheetLayout};
use sz_store::SampleSetStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportTemplate {
    /// Header on the first row.
    #[default]
    Standard,
    /// Seven metadata rows above the header.
    Rigid,
}

impl ExportTemplate {
    pub fn layout(self) -> SheetLayout {
        match self {
            ExportTemplate::Standard => SheetLayout::standard(),
            ExportTemplate::Rigid => SheetLayout::rigid(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows_written: usize,
    pub data_rows: usize,
}

fn metadata_lines(store: &SampleSetStore, created: DateTime<Utc>) -> Vec<String> {
    vec![
        "Plot_3D Normalized Data".to_string(),
        format!("Sample set: {}", store.name()),
        format!("Created: {}", created.format("%Y-%m-%d %H:%M:%S UTC")),
        "Xnorm = L*/100, Ynorm = (a*+128)/255, Znorm = (b*+128)/255".to_string(),
        "Rows 9-14: cluster centroids 0-5".to_string(),
        "Data from row 15".to_string(),
        String::new(),
    ]
}

/// Export rows: metadata (rigid only), header, centroid band, plotted data.
pub fn build_export_rows(
    store: &SampleSetStore,
    projection: Projection,
    template: ExportTemplate,
    created: DateTime<Utc>,
) -> RowSet {
    let layout = template.layout();
    let mut rows = Vec::with_capacity(layout.reserved_rows() + store.measurement_count());
    if template == ExportTemplate::Rigid {
        rows.extend(metadata_lines(store, created).into_iter().map(GridRow::note));
    }
    rows.push(GridRow::header());
    rows.extend(get_plot3d_dataframe(store, projection, true));
    RowSet::new(layout, rows)
}

/// Write the sample set to `path`. CSV is built in; other formats need `writer`.
pub fn export_file(
    store: &SampleSetStore,
    path: &Path,
    projection: Projection,
    template: ExportTemplate,
    writer: Option<&dyn TabularWriter>,
) -> AppResult<ExportReport> {
    let format = detect_file_format(path);
    let rows = build_export_rows(store, projection, template, Utc::now());
    let grid: Grid = rows.rows.iter().map(|r| r.cells().to_vec()).collect();

    match (format, writer) {
        (_, Some(writer)) => writer.write_grid(path, &grid)?,
        (FileFormat::Csv, None) => CsvCodec.write_grid(path, &grid)?,
        (other, None) => {
            return Err(AppError::FormatMismatch {
                path: path.to_path_buf(),
                reason: format!("no writer available for {} files", other.label()),
            })
        }
    }

    let data_rows = rows.populated_data_rows();
    tracing::info!(path = %path.display(), rows = grid.len(), data_rows, "export finished");
    Ok(ExportReport {
        path: path.to_path_buf(),
        rows_written: grid.len(),
        data_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sz_core::{MeasurementIdentity, SampleSetName};
    use sz_sheet::{classify_row, Column, Row};
    use sz_store::RawPatch;

    fn store() -> SampleSetStore {
        let mut s = SampleSetStore::in_memory(SampleSetName::new("export me").unwrap());
        for (name, point) in [("S1", 1), ("S1", 2)] {
            s.upsert_measurement(
                &MeasurementIdentity::new(name, point).unwrap(),
                &RawPatch::default().with_lab(40.0, 10.0, -10.0),
                None,
            )
            .unwrap();
        }
        s
    }

    #[test]
    fn rigid_layout_rows() {
        let created = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let rows = build_export_rows(&store(), Projection::Lab, ExportTemplate::Rigid, created);
        assert_eq!(rows.rows[0].get(Column::Xnorm), "Plot_3D Normalized Data");
        assert_eq!(rows.rows[1].get(Column::Xnorm), "Sample set: export_me");
        assert_eq!(rows.rows[2].get(Column::Xnorm), "Created: 2025-01-02 03:04:05 UTC");
        assert_eq!(rows.rows[7], GridRow::header());
        assert_eq!(rows.len(), 16);
        assert_eq!(rows.rows[14].data_id(), "S1");
        assert_eq!(rows.rows[15].data_id(), "S1_pt2");

        for (i, row) in rows.rows.iter().enumerate().take(8) {
            assert_eq!(classify_row(row, i, &rows.layout), Row::Header);
        }
    }

    #[test]
    fn standard_layout_matches_detection() {
        let rows = build_export_rows(&store(), Projection::Lab, ExportTemplate::Standard, Utc::now());
        let detected = RowSet::detect(rows.rows.clone()).unwrap();
        assert_eq!(detected.layout, SheetLayout::standard());
        assert_eq!(detected.populated_data_rows(), 2);
    }

    #[test]
    fn unknown_extension_needs_writer() {
        let err = export_file(&store(), Path::new("out.ods"), Projection::Lab, ExportTemplate::Standard, None)
            .unwrap_err();
        assert!(matches!(err, AppError::FormatMismatch { .. }));
    }
}
