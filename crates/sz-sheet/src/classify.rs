//! Row classification: turn positional, string-celled rows into typed variants.

use crate::columns::Column;
use crate::error::RowError;
use crate::layout::SheetLayout;
use crate::row::GridRow;
use sz_core::{
    derive_identity_from_data_id, parse_optional_int, parse_optional_real, MeasurementIdentity,
    Real,
};

/// Annotation cells shared by data and centroid rows, parsed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationCells {
    pub cluster: Option<i64>,
    pub delta_e: Option<Real>,
    pub marker: Option<String>,
    pub color: Option<String>,
    pub centroid: [Option<Real>; 3],
    pub sphere_color: Option<String>,
    pub sphere_radius: Option<Real>,
}

impl AnnotationCells {
    pub fn complete_centroid(&self) -> Option<[Real; 3]> {
        match self.centroid {
            [Some(x), Some(y), Some(z)] => Some([x, y, z]),
            _ => None,
        }
    }

    pub fn has_sphere(&self) -> bool {
        self.sphere_color.is_some() || self.sphere_radius.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFields {
    pub row: usize,
    pub data_id: String,
    pub identity: MeasurementIdentity,
    pub coords: [Option<Real>; 3],
    pub annotations: AnnotationCells,
}

impl DataFields {
    pub fn complete_coords(&self) -> Option<[Real; 3]> {
        match self.coords {
            [Some(x), Some(y), Some(z)] => Some([x, y, z]),
            _ => None,
        }
    }

    pub fn has_any_coord(&self) -> bool {
        self.coords.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CentroidFields {
    pub row: usize,
    pub annotations: AnnotationCells,
}

/// What a row means in its sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Header or metadata above it.
    Header,
    CentroidSummary {
        band_position: usize,
        fields: CentroidFields,
    },
    Data(DataFields),
    Skip,
    Invalid(RowError),
}

/// Classify one row by position and content.
///
/// Inside the centroid band a row is a summary only when it carries a full
/// centroid or sphere data. Outside it a parseable DataID makes a data row;
/// a row with no DataID and no coordinates but a cluster and full centroid
/// is a summary placed at its cluster's band position.
pub fn classify_row(row: &GridRow, row_index: usize, layout: &SheetLayout) -> Row {
    if row_index <= layout.header_row {
        return Row::Header;
    }

    if let Some(band_position) = layout.band.position(row_index) {
        let annotations = match parse_annotations(row, row_index) {
            Ok(a) => a,
            Err(err) => return Row::Invalid(err),
        };
        if annotations.complete_centroid().is_some() || annotations.has_sphere() {
            return Row::CentroidSummary {
                band_position,
                fields: CentroidFields {
                    row: row_index,
                    annotations,
                },
            };
        }
        return Row::Skip;
    }

    let data_id = row.data_id();
    if data_id.is_empty() {
        return classify_detached_centroid(row, row_index);
    }

    let identity = match derive_identity_from_data_id(data_id) {
        Ok(identity) => identity,
        Err(err) => return Row::Invalid(RowError::from_core(row_index, err)),
    };

    let parsed = parse_coords(row, row_index)
        .and_then(|coords| parse_annotations(row, row_index).map(|a| (coords, a)));
    match parsed {
        Ok((coords, annotations)) => Row::Data(DataFields {
            row: row_index,
            data_id: data_id.to_string(),
            identity,
            coords,
            annotations,
        }),
        Err(err) => Row::Invalid(err),
    }
}

fn classify_detached_centroid(row: &GridRow, row_index: usize) -> Row {
    if row.is_blank() {
        return Row::Skip;
    }
    let (Ok(coords), Ok(annotations)) = (parse_coords(row, row_index), parse_annotations(row, row_index))
    else {
        return Row::Skip;
    };
    if coords.iter().any(Option::is_some) || annotations.complete_centroid().is_none() {
        return Row::Skip;
    }
    match annotations.cluster {
        Some(cluster) if (0..=sz_core::MAX_CLUSTER_ID as i64).contains(&cluster) => {
            Row::CentroidSummary {
                band_position: cluster as usize,
                fields: CentroidFields {
                    row: row_index,
                    annotations,
                },
            }
        }
        _ => Row::Skip,
    }
}

fn parse_real(row: &GridRow, row_index: usize, column: Column) -> Result<Option<Real>, RowError> {
    parse_optional_real(row.get(column)).map_err(|reason| RowError::validation(row_index, column.name(), reason))
}

fn parse_text(row: &GridRow, column: Column) -> Option<String> {
    let cell = row.get(column).trim();
    (!cell.is_empty() && cell != "None").then(|| cell.to_string())
}

fn parse_coords(row: &GridRow, row_index: usize) -> Result<[Option<Real>; 3], RowError> {
    Ok([
        parse_real(row, row_index, Column::Xnorm)?,
        parse_real(row, row_index, Column::Ynorm)?,
        parse_real(row, row_index, Column::Znorm)?,
    ])
}

fn parse_annotations(row: &GridRow, row_index: usize) -> Result<AnnotationCells, RowError> {
    let cluster = parse_optional_int(row.get(Column::Cluster))
        .map_err(|reason| RowError::validation(row_index, Column::Cluster.name(), reason))?;
    Ok(AnnotationCells {
        cluster,
        delta_e: parse_real(row, row_index, Column::DeltaE)?,
        marker: parse_text(row, Column::Marker),
        color: parse_text(row, Column::Color),
        centroid: [
            parse_real(row, row_index, Column::CentroidX)?,
            parse_real(row, row_index, Column::CentroidY)?,
            parse_real(row, row_index, Column::CentroidZ)?,
        ],
        sphere_color: parse_text(row, Column::Sphere),
        sphere_radius: parse_real(row, row_index, Column::Radius)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(Column, &str)]) -> GridRow {
        let mut row = GridRow::blank();
        for (column, value) in cells {
            row.set(*column, *value);
        }
        row
    }

    #[test]
    fn header_and_metadata_rows() {
        let layout = SheetLayout::rigid();
        assert_eq!(classify_row(&GridRow::note("Title"), 0, &layout), Row::Header);
        assert_eq!(classify_row(&GridRow::header(), 7, &layout), Row::Header);
    }

    #[test]
    fn band_row_needs_centroid_or_sphere() {
        let layout = SheetLayout::standard();
        let bare = row(&[(Column::Cluster, "1")]);
        assert_eq!(classify_row(&bare, 2, &layout), Row::Skip);

        let sphere = row(&[(Column::Sphere, "red")]);
        match classify_row(&sphere, 3, &layout) {
            Row::CentroidSummary { band_position, .. } => assert_eq!(band_position, 2),
            other => panic!("unexpected {other:?}"),
        }

        let centroid = row(&[
            (Column::CentroidX, "0.1"),
            (Column::CentroidY, "0.2"),
            (Column::CentroidZ, "0.3"),
        ]);
        assert!(matches!(
            classify_row(&centroid, 1, &layout),
            Row::CentroidSummary { band_position: 0, .. }
        ));
    }

    #[test]
    fn data_row_outside_band() {
        let layout = SheetLayout::standard();
        let data = row(&[
            (Column::Xnorm, "0.5"),
            (Column::Ynorm, "0.5"),
            (Column::Znorm, "0.5"),
            (Column::DataId, "S10_pt3"),
            (Column::Marker, "*"),
        ]);
        match classify_row(&data, 7, &layout) {
            Row::Data(fields) => {
                assert_eq!(fields.identity, MeasurementIdentity::new("S10", 3).unwrap());
                assert_eq!(fields.complete_coords(), Some([0.5, 0.5, 0.5]));
                assert_eq!(fields.annotations.marker.as_deref(), Some("*"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_and_id_less_rows_skip() {
        let layout = SheetLayout::standard();
        assert_eq!(classify_row(&GridRow::blank(), 9, &layout), Row::Skip);
        let no_id = row(&[(Column::Xnorm, "0.5"), (Column::Marker, ".")]);
        assert_eq!(classify_row(&no_id, 9, &layout), Row::Skip);
    }

    #[test]
    fn malformed_numeric_is_invalid() {
        let layout = SheetLayout::standard();
        let bad = row(&[(Column::DataId, "S1"), (Column::Xnorm, "abc")]);
        match classify_row(&bad, 8, &layout) {
            Row::Invalid(RowError::Validation { row, field, .. }) => {
                assert_eq!(row, 8);
                assert_eq!(field, "Xnorm");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ambiguous_data_id_is_invalid() {
        let layout = SheetLayout::standard();
        let bad = row(&[(Column::DataId, "A_pt2_pt3")]);
        assert!(matches!(
            classify_row(&bad, 8, &layout),
            Row::Invalid(RowError::InvalidIdentity { row: 8, .. })
        ));
    }

    #[test]
    fn detached_centroid_row_uses_cluster_position() {
        let layout = SheetLayout::standard();
        let centroid = row(&[
            (Column::Cluster, "4"),
            (Column::CentroidX, "0.1"),
            (Column::CentroidY, "0.2"),
            (Column::CentroidZ, "0.3"),
        ]);
        assert!(matches!(
            classify_row(&centroid, 30, &layout),
            Row::CentroidSummary { band_position: 4, .. }
        ));
    }
}
