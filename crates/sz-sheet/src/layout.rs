//! Row layout of a normalized sheet: header, centroid band, data area.

use crate::columns::Column;
use crate::row::GridRow;
use sz_core::MAX_CLUSTER_ID;

/// Number of reserved centroid rows, one per cluster id.
pub const CENTROID_BAND_ROWS: usize = MAX_CLUSTER_ID as usize + 1;

/// Metadata rows preceding the header in the rigid template.
pub const RIGID_METADATA_ROWS: usize = 7;

/// Blank rows kept after the data area for manual entry.
pub const DEFAULT_BUFFER_ROWS: usize = 10;

/// Inclusive row range reserved for centroid summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentroidBand {
    pub start: usize,
    pub end: usize,
}

impl CentroidBand {
    pub fn starting_at(start: usize) -> Self {
        Self {
            start,
            end: start + CENTROID_BAND_ROWS - 1,
        }
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.start..=self.end).contains(&row)
    }

    /// Position within the band; `None` outside it.
    pub fn position(&self, row: usize) -> Option<usize> {
        self.contains(row).then(|| row - self.start)
    }

    pub fn row_for_position(&self, position: usize) -> usize {
        self.start + position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub header_row: usize,
    pub band: CentroidBand,
    pub data_start: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::standard()
    }
}

impl SheetLayout {
    /// Header at row 0, band 1..=6, data from 7.
    pub fn standard() -> Self {
        Self::for_header_row(0)
    }

    /// Seven metadata rows, header at row 7, band 8..=13, data from 14.
    pub fn rigid() -> Self {
        Self::for_header_row(RIGID_METADATA_ROWS)
    }

    pub fn for_header_row(header_row: usize) -> Self {
        let band = CentroidBand::starting_at(header_row + 1);
        Self {
            header_row,
            band,
            data_start: band.end + 1,
        }
    }

    /// Move the centroid band to a user-chosen row. The data area follows it.
    /// Rows at or above the header cannot host the band.
    pub fn with_centroid_start(self, start: usize) -> Option<Self> {
        if start <= self.header_row {
            return None;
        }
        let band = CentroidBand::starting_at(start);
        Some(Self {
            header_row: self.header_row,
            band,
            data_start: band.end + 1,
        })
    }

    /// Rows before the data area.
    pub fn reserved_rows(&self) -> usize {
        self.data_start
    }

    pub fn is_rigid(&self) -> bool {
        self.header_row == RIGID_METADATA_ROWS
    }

    /// Locate the header row by content and derive the layout from it.
    pub fn detect(rows: &[GridRow]) -> Option<Self> {
        find_header_row(rows).map(Self::for_header_row)
    }
}

/// Index of the first row whose cells are exactly the 13 column names.
pub fn find_header_row(rows: &[GridRow]) -> Option<usize> {
    rows.iter().position(is_header_row)
}

pub fn is_header_row(row: &GridRow) -> bool {
    Column::ALL
        .iter()
        .all(|column| column.matches_header(row.get(*column)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_and_rigid_bands() {
        let standard = SheetLayout::standard();
        assert_eq!(standard.band, CentroidBand { start: 1, end: 6 });
        assert_eq!(standard.data_start, 7);

        let rigid = SheetLayout::rigid();
        assert_eq!(rigid.header_row, 7);
        assert_eq!(rigid.band, CentroidBand { start: 8, end: 13 });
        assert_eq!(rigid.data_start, 14);
        assert!(rigid.is_rigid());
    }

    #[test]
    fn custom_centroid_start_moves_data_area() {
        let layout = SheetLayout::standard().with_centroid_start(10).unwrap();
        assert_eq!(layout.band.position(10), Some(0));
        assert_eq!(layout.band.position(15), Some(5));
        assert_eq!(layout.band.position(16), None);
        assert_eq!(layout.data_start, 16);
        assert!(SheetLayout::standard().with_centroid_start(0).is_none());
    }

    #[test]
    fn header_detected_by_content() {
        let mut rows = vec![GridRow::blank(); 3];
        rows[0].set(Column::Xnorm, "Title");
        rows.push(GridRow::header());
        let layout = SheetLayout::detect(&rows).unwrap();
        assert_eq!(layout.header_row, 3);
        assert_eq!(layout.band.start, 4);
        assert!(SheetLayout::detect(&rows[..3]).is_none());
    }
}
