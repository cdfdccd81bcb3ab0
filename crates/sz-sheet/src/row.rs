//! String-celled grid rows and row sets as exchanged with views.

use crate::columns::{column_names, Column, COLUMN_COUNT};
use crate::layout::SheetLayout;
use sz_core::{project_sample, NormalizedCoords, Projection, Real};
use sz_store::{CentroidRecord, Measurement};

/// Render a float cell. Shortest round-trip form, so a value read back
/// parses to the same float.
pub fn format_real(v: Real) -> String {
    format!("{}", v)
}

fn format_opt_real(v: Option<Real>) -> String {
    v.map(format_real).unwrap_or_default()
}

/// One sheet row: exactly 13 cells in column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GridRow {
    cells: [String; COLUMN_COUNT],
}

impl GridRow {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn header() -> Self {
        Self {
            cells: column_names().map(str::to_string),
        }
    }

    /// A metadata line: free text in the first cell.
    pub fn note(text: impl Into<String>) -> Self {
        let mut row = Self::blank();
        row.cells[0] = text.into();
        row
    }

    /// Build from loose cells; missing cells are blank, extra cells dropped.
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row = Self::blank();
        for (slot, cell) in row.cells.iter_mut().zip(cells) {
            *slot = cell.into();
        }
        row
    }

    /// Data row for a stored measurement with its current annotations.
    pub fn from_measurement(m: &Measurement, projection: Projection) -> Self {
        let mut row = Self::blank();
        row.set_identity_cells(m, projection);
        let ann = &m.annotations;
        row.set(Column::Cluster, ann.cluster_id.map(|c| c.to_string()).unwrap_or_default());
        row.set(Column::DeltaE, format_opt_real(ann.delta_e));
        row.set(Column::Marker, ann.marker_preference.clone());
        row.set(Column::Color, ann.color_preference.clone());
        row.set(Column::CentroidX, format_opt_real(ann.centroid_x));
        row.set(Column::CentroidY, format_opt_real(ann.centroid_y));
        row.set(Column::CentroidZ, format_opt_real(ann.centroid_z));
        row.set(Column::Sphere, ann.sphere_color.clone().unwrap_or_default());
        row.set(Column::Radius, format_opt_real(ann.sphere_radius));
        row
    }

    /// Default-annotated data row for a measurement new to a view.
    pub fn fresh_for_measurement(m: &Measurement, projection: Projection) -> Self {
        let mut row = Self::blank();
        row.set_identity_cells(m, projection);
        row.set(Column::Marker, m.annotations.marker_preference.clone());
        row.set(Column::Color, m.annotations.color_preference.clone());
        row
    }

    /// Centroid-band row for a stored centroid record.
    pub fn from_centroid(c: &CentroidRecord) -> Self {
        let mut row = Self::blank();
        row.set(Column::Cluster, c.cluster_id.to_string());
        row.set(Column::Marker, c.marker.clone());
        row.set(Column::Color, c.color.clone());
        row.set(Column::CentroidX, format_opt_real(c.centroid_x));
        row.set(Column::CentroidY, format_opt_real(c.centroid_y));
        row.set(Column::CentroidZ, format_opt_real(c.centroid_z));
        row.set(Column::Sphere, c.sphere_color.clone().unwrap_or_default());
        row.set(Column::Radius, format_opt_real(c.sphere_radius));
        row
    }

    /// Overwrite only the coordinate and DataID cells.
    pub fn set_identity_cells(&mut self, m: &Measurement, projection: Projection) {
        self.set_coords(project_sample(m, projection));
        self.set(Column::DataId, m.data_id());
    }

    pub fn set_coords(&mut self, coords: NormalizedCoords) {
        self.set(Column::Xnorm, format_real(coords.x));
        self.set(Column::Ynorm, format_real(coords.y));
        self.set(Column::Znorm, format_real(coords.z));
    }

    pub fn get(&self, column: Column) -> &str {
        &self.cells[column.index()]
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.cells[column.index()] = value.into();
    }

    pub fn cells(&self) -> &[String; COLUMN_COUNT] {
        &self.cells
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    pub fn data_id(&self) -> &str {
        self.get(Column::DataId).trim()
    }
}

/// A full view snapshot: layout plus rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub layout: SheetLayout,
    pub rows: Vec<GridRow>,
}

impl RowSet {
    pub fn new(layout: SheetLayout, rows: Vec<GridRow>) -> Self {
        Self { layout, rows }
    }

    /// Header, blank band, no data rows.
    pub fn skeleton(layout: SheetLayout) -> Self {
        let mut rows = vec![GridRow::blank(); layout.reserved_rows()];
        rows[layout.header_row] = GridRow::header();
        Self { layout, rows }
    }

    /// Take loose rows of unknown layout, detecting the header by content.
    pub fn detect(rows: Vec<GridRow>) -> Option<Self> {
        SheetLayout::detect(&rows).map(|layout| Self { layout, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows from the data area onward, with their absolute indices.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &GridRow)> {
        self.rows
            .iter()
            .enumerate()
            .skip(self.layout.data_start)
    }

    /// Number of data-area rows carrying a DataID.
    pub fn populated_data_rows(&self) -> usize {
        self.data_rows().filter(|(_, r)| !r.data_id().is_empty()).count()
    }

    /// Grow with blank rows up to `len`.
    pub fn pad_to(&mut self, len: usize) {
        if self.rows.len() < len {
            self.rows.resize(len, GridRow::blank());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cells_pads_and_truncates() {
        let short = GridRow::from_cells(["0.5", "0.5"]);
        assert_eq!(short.get(Column::Ynorm), "0.5");
        assert_eq!(short.get(Column::Radius), "");

        let long = GridRow::from_cells((0..20).map(|i| i.to_string()));
        assert_eq!(long.get(Column::Radius), "12");
    }

    #[test]
    fn skeleton_places_header() {
        let set = RowSet::skeleton(SheetLayout::rigid());
        assert_eq!(set.len(), 14);
        assert_eq!(set.rows[7], GridRow::header());
        assert!(set.rows[8].is_blank());
    }

    #[test]
    fn float_cells_round_trip() {
        for v in [0.1, 0.2 + 0.1, 1.0 / 3.0, 0.0, 1.0] {
            assert_eq!(format_real(v).parse::<f64>().unwrap(), v);
        }
    }
}
