//! Read projections for the plotting views.

use sz_core::{normalize_lab, ClusterId, Projection};
use sz_sheet::{Column, GridRow};
use sz_store::{Measurement, SampleSetStore};

fn plotted(m: &Measurement) -> bool {
    m.annotations.trendline_valid
}

/// Rows for the 3D view: one centroid row per cluster 0-5 (blank when the
/// cluster has no record) followed by every plotted measurement.
pub fn get_plot3d_dataframe(
    store: &SampleSetStore,
    projection: Projection,
    include_centroids: bool,
) -> Vec<GridRow> {
    let mut rows = Vec::with_capacity(store.measurement_count() + 6);
    if include_centroids {
        rows.extend(ClusterId::all().map(|id| {
            store
                .centroid(id)
                .map(GridRow::from_centroid)
                .unwrap_or_default()
        }));
    }
    rows.extend(
        store
            .list_measurements()
            .iter()
            .filter(|m| plotted(m))
            .map(|m| GridRow::from_measurement(m, projection)),
    );
    tracing::debug!(set = %store.name(), rows = rows.len(), "plot3d projection");
    rows
}

/// Rows for the ternary view: plotted measurements through L*a*b* with no
/// centroid cells.
pub fn get_ternary_dataframe(store: &SampleSetStore) -> Vec<GridRow> {
    store
        .list_measurements()
        .iter()
        .filter(|m| plotted(m))
        .map(|m| {
            let mut row = GridRow::from_measurement(m, Projection::Lab);
            row.set_coords(normalize_lab(m.raw.l_value, m.raw.a_value, m.raw.b_value));
            for column in Column::CENTROID {
                row.set(column, "");
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sz_core::{MeasurementIdentity, SampleSetName};
    use sz_store::{AnnotationPatch, CentroidPatch, RawPatch};

    fn store() -> SampleSetStore {
        let mut s = SampleSetStore::in_memory(SampleSetName::new("views").unwrap());
        let raw = RawPatch::default().with_lab(50.0, 0.0, 0.0).with_rgb(255.0, 0.0, 0.0);
        s.upsert_measurement(&MeasurementIdentity::new("A", 1).unwrap(), &raw, None)
            .unwrap();
        let hidden = AnnotationPatch {
            trendline_valid: Some(false),
            ..AnnotationPatch::default()
        };
        s.upsert_measurement(&MeasurementIdentity::new("B", 1).unwrap(), &raw, Some(&hidden))
            .unwrap();
        s.upsert_centroid(
            1,
            &CentroidPatch {
                centroid_x: Some(0.5),
                centroid_y: Some(0.5),
                centroid_z: Some(0.5),
                ..CentroidPatch::default()
            },
        )
        .unwrap();
        s
    }

    #[test]
    fn plot3d_has_band_and_skips_invalid_trendline() {
        let rows = get_plot3d_dataframe(&store(), Projection::Lab, true);
        assert_eq!(rows.len(), 7);
        assert!(rows[0].is_blank());
        assert_eq!(rows[1].get(Column::Cluster), "1");
        assert_eq!(rows[6].data_id(), "A");
        assert_eq!(rows[6].get(Column::Xnorm), "0.5");
    }

    #[test]
    fn rgb_projection_uses_channels() {
        let rows = get_plot3d_dataframe(&store(), Projection::Rgb, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(Column::Xnorm), "1");
        assert_eq!(rows[0].get(Column::Ynorm), "0");
    }

    #[test]
    fn ternary_uses_shared_offset() {
        let rows = get_ternary_dataframe(&store());
        assert_eq!(rows.len(), 1);
        let expected = 128.0 / 255.0;
        assert_eq!(rows[0].get(Column::Ynorm).parse::<f64>().unwrap(), expected);
        assert_eq!(rows[0].get(Column::CentroidX), "");
    }
}
