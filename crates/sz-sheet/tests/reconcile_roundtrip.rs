use proptest::prelude::*;
use sz_core::{normalize_lab, MeasurementIdentity, Projection, SampleSetName};
use sz_sheet::*;
use sz_store::SampleSetStore;

fn data_row(x: f64, y: f64, z: f64, data_id: &str) -> GridRow {
    let mut row = GridRow::blank();
    row.set_coords(sz_core::NormalizedCoords::new(x, y, z));
    row.set(Column::DataId, data_id);
    row
}

#[test]
fn view_row_regenerated_from_store_commits_unchanged() {
    let mut store = SampleSetStore::in_memory(SampleSetName::new("rt").unwrap());
    let layout = SheetLayout::standard();
    let reconciler = Reconciler::default();

    let mut row = data_row(0.5, 0.25, 0.75, "S4_pt2");
    row.set(Column::Cluster, "1");
    row.set(Column::Marker, "^");
    let first = reconciler
        .reconcile(&mut store, &classify_row(&row, layout.data_start, &layout))
        .unwrap()
        .unwrap();
    assert!(matches!(first.action, RowAction::Inserted(_)));

    let identity = MeasurementIdentity::new("S4", 2).unwrap();
    let regenerated = GridRow::from_measurement(store.get(&identity).unwrap(), Projection::Lab);
    assert_eq!(regenerated.get(Column::Marker), "^");
    assert_eq!(regenerated.get(Column::Cluster), "1");

    let second = reconciler
        .reconcile(&mut store, &classify_row(&regenerated, layout.data_start, &layout))
        .unwrap()
        .unwrap();
    assert_eq!(
        second.action,
        RowAction::Updated {
            identity,
            changed: false
        }
    );
}

#[test]
fn invalid_rows_leave_store_untouched() {
    let mut store = SampleSetStore::in_memory(SampleSetName::new("bad").unwrap());
    let layout = SheetLayout::standard();
    let mut row = data_row(0.5, 0.5, 0.5, "S1");
    row.set(Column::DeltaE, "lots");
    let result = Reconciler::default()
        .reconcile(&mut store, &classify_row(&row, 8, &layout))
        .unwrap();
    assert!(matches!(result, Err(RowError::Validation { row: 8, .. })));
    assert_eq!(store.measurement_count(), 0);
}

proptest! {
    #[test]
    fn second_commit_is_a_no_op(l in 0.0f64..=100.0, a in -128.0f64..127.0, b in -128.0f64..127.0) {
        let mut store = SampleSetStore::in_memory(SampleSetName::new("prop").unwrap());
        let layout = SheetLayout::standard();
        let reconciler = Reconciler::default();
        let coords = normalize_lab(l, a, b);
        let row = data_row(coords.x, coords.y, coords.z, "P1");

        reconciler.reconcile(&mut store, &classify_row(&row, 7, &layout)).unwrap().unwrap();
        let snapshot = store.list_measurements().to_vec();

        let identity = MeasurementIdentity::new("P1", 1).unwrap();
        let view = GridRow::from_measurement(store.get(&identity).unwrap(), Projection::Lab);
        let again = reconciler.reconcile(&mut store, &classify_row(&view, 7, &layout)).unwrap().unwrap();

        prop_assert_eq!(again.action, RowAction::Updated { identity, changed: false });
        prop_assert_eq!(store.list_measurements(), snapshot.as_slice());
    }
}
