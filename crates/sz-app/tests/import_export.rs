use std::fs;
use std::path::PathBuf;
use sz_app::*;
use sz_core::{nearly_equal, ClusterId, MeasurementIdentity, SampleSetName, Tolerances};
use sz_sheet::MergePolicy;
use sz_store::{AnnotationPatch, CentroidPatch, RawPatch, SampleSetStore};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn close(a: f64, b: f64) -> bool {
    nearly_equal(a, b, Tolerances::ROUND_TRIP)
}

fn open(dir: &std::path::Path, name: &str) -> SyncSession {
    open_session(dir, name, &SyncConfig::default()).unwrap()
}

#[test]
fn csv_import_into_empty_set() {
    let dir = temp_dir("sz_app_import_empty");
    let csv = dir.join("plot.csv");
    fs::write(&csv, "Xnorm,Ynorm,Znorm,DataID\n0.5,0.5,0.5,A_pt1\n0.2,0.8,0.1,B\n").unwrap();

    let mut session = open(&dir, "imported");
    let report = import_file(
        &mut session,
        &csv,
        &ImportOptions::default(),
        MergePolicy::PreserveExisting,
        None,
    )
    .unwrap();

    assert!(!report.native_layout);
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.commit.inserted, 2);
    assert!(report.commit.errors.is_empty());
    assert!(report.warnings[0].starts_with("Unmapped columns will use defaults:"));

    let reopened = SampleSetStore::open(&dir, &SampleSetName::new("imported").unwrap()).unwrap();
    let a = reopened.get(&MeasurementIdentity::new("A", 1).unwrap()).unwrap();
    assert!(close(a.raw.l_value, 50.0));
    assert!(close(a.raw.a_value, -0.5));
    assert!(close(a.raw.b_value, -0.5));
    assert_eq!(a.annotations.marker_preference, ".");
    assert_eq!(a.annotations.color_preference, "blue");

    let b = reopened.get(&MeasurementIdentity::new("B", 1).unwrap()).unwrap();
    assert!(close(b.raw.l_value, 20.0));
    assert!(close(b.raw.a_value, 76.0));
    assert!(close(b.raw.b_value, -102.5));
    assert_eq!(b.sample_type.as_deref(), Some("imported_plot3d"));
}

#[test]
fn import_never_downgrades_annotations() {
    for policy in [MergePolicy::PreserveExisting, MergePolicy::Overwrite] {
        let dir = temp_dir("sz_app_import_merge");
        let mut session = open(&dir, "merge");
        let id = MeasurementIdentity::new("S7", 1).unwrap();
        let annotations = AnnotationPatch {
            cluster_id: Some(3),
            delta_e: Some(1.2),
            ..AnnotationPatch::default()
        };
        session
            .store_mut()
            .upsert_measurement(
                &id,
                &RawPatch::default().with_lab(42.0, 3.0, -4.0).with_sample_type("circle"),
                Some(&annotations),
            )
            .unwrap();
        session.flush().unwrap();

        let csv = dir.join("coords.csv");
        fs::write(&csv, "DataID,L*,a*,b*\nS7,60,10,-10\n").unwrap();
        let options = ImportOptions {
            policy: Some(policy),
            ..ImportOptions::default()
        };
        let report = import_file(&mut session, &csv, &options, MergePolicy::PreserveExisting, None)
            .unwrap();
        assert_eq!(report.commit.updated, 1, "{:?}", policy);

        let m = session.store().get(&id).unwrap();
        assert_eq!(m.annotations.cluster_id, Some(3), "{:?}", policy);
        assert_eq!(m.annotations.delta_e, Some(1.2), "{:?}", policy);
        assert_eq!(m.raw.l_value, 42.0, "sampled raw values stay put");
    }
}

#[test]
fn preserve_policy_reports_conflicts() {
    let dir = temp_dir("sz_app_import_conflict");
    let mut session = open(&dir, "conflict");
    let id = MeasurementIdentity::new("S8", 2).unwrap();
    let annotations = AnnotationPatch {
        cluster_id: Some(1),
        ..AnnotationPatch::default()
    };
    session
        .store_mut()
        .upsert_measurement(&id, &RawPatch::default().with_lab(42.0, 3.0, -4.0), Some(&annotations))
        .unwrap();

    let csv = dir.join("clusters.csv");
    fs::write(&csv, "ID,Cluster,dE\nS8_pt2,4,0.9\n").unwrap();
    let report = import_file(
        &mut session,
        &csv,
        &ImportOptions::default(),
        MergePolicy::PreserveExisting,
        None,
    )
    .unwrap();

    assert_eq!(report.commit.updated, 1);
    assert_eq!(report.commit.conflicts.len(), 1);
    let conflict = &report.commit.conflicts[0];
    assert_eq!(conflict.field, "Cluster");
    assert_eq!((conflict.stored.as_str(), conflict.incoming.as_str()), ("1", "4"));

    let m = session.store().get(&id).unwrap();
    assert_eq!(m.annotations.cluster_id, Some(1));
    assert_eq!(m.annotations.delta_e, Some(0.9));
}

#[test]
fn export_then_import_round_trip() {
    for template in [ExportTemplate::Standard, ExportTemplate::Rigid] {
        let dir = temp_dir("sz_app_round_trip");
        let mut source = open(&dir, "source");
        let store = source.store_mut();
        store
            .upsert_measurement(
                &MeasurementIdentity::new("S1", 1).unwrap(),
                &RawPatch::default().with_lab(35.5, 12.25, -40.0),
                Some(&AnnotationPatch {
                    cluster_id: Some(1),
                    marker_preference: Some("^".to_string()),
                    ..AnnotationPatch::default()
                }),
            )
            .unwrap();
        store
            .upsert_measurement(
                &MeasurementIdentity::new("S1", 2).unwrap(),
                &RawPatch::default().with_lab(70.0, -20.0, 5.0),
                None,
            )
            .unwrap();
        store
            .upsert_centroid(
                1,
                &CentroidPatch {
                    centroid_x: Some(0.4),
                    centroid_y: Some(0.5),
                    centroid_z: Some(0.3),
                    ..CentroidPatch::default()
                },
            )
            .unwrap();

        let path = dir.join("out.csv");
        let exported =
            export_file(source.store(), &path, source.projection(), template, None).unwrap();
        assert_eq!(exported.data_rows, 2);

        let mut target = open(&dir, "target");
        let report = import_file(
            &mut target,
            &path,
            &ImportOptions::default(),
            MergePolicy::PreserveExisting,
            None,
        )
        .unwrap();
        assert!(report.native_layout, "{:?}", template);
        assert_eq!(report.centroid_rows, 1);
        assert_eq!(report.commit.inserted, 2);
        assert_eq!(report.commit.centroids, 1);

        let copied = target.store().get(&MeasurementIdentity::new("S1", 1).unwrap()).unwrap();
        assert!(close(copied.raw.l_value, 35.5));
        assert!(close(copied.raw.a_value, 12.25));
        assert!(close(copied.raw.b_value, -40.0));
        assert_eq!(copied.annotations.cluster_id, Some(1));
        assert_eq!(copied.annotations.marker_preference, "^");
        let centroid = target.store().centroid(ClusterId::new(1).unwrap()).unwrap();
        assert_eq!(centroid.centroid(), Some([0.4, 0.5, 0.3]));
    }
}

#[test]
fn unsupported_inputs_are_format_mismatches() {
    let dir = temp_dir("sz_app_import_mismatch");
    let mut session = open(&dir, "mismatch");

    let ods = dir.join("sheet.ods");
    fs::write(&ods, "").unwrap();
    let err = import_file(&mut session, &ods, &ImportOptions::default(), MergePolicy::Overwrite, None)
        .unwrap_err();
    assert!(matches!(err, AppError::FormatMismatch { .. }));

    let csv = dir.join("unrelated.csv");
    fs::write(&csv, "Price,Quantity\n1,2\n").unwrap();
    let err = import_file(&mut session, &csv, &ImportOptions::default(), MergePolicy::Overwrite, None)
        .unwrap_err();
    assert!(matches!(err, AppError::FormatMismatch { .. }));
    assert_eq!(session.store().measurement_count(), 0);
}

#[test]
fn sample_sets_are_listed_with_summaries() {
    let dir = temp_dir("sz_app_listing");
    for (name, count) in [("Beta Set", 2u32), ("alpha", 1)] {
        let mut session = open(&dir, name);
        for point in 1..=count {
            session
                .store_mut()
                .upsert_measurement(
                    &MeasurementIdentity::new("S", point).unwrap(),
                    &RawPatch::default().with_lab(50.0, 0.0, 0.0),
                    None,
                )
                .unwrap();
        }
        session.flush().unwrap();
    }

    let summaries = list_sample_sets(&dir).unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Beta_Set", "alpha"]);
    assert_eq!(summaries[0].measurements, 2);
    assert_eq!(summaries[1].centroids, 0);
}

#[test]
fn black_sample_survives_rebuild_and_export() {
    let dir = temp_dir("sz_app_black_sample");
    let csv = dir.join("black.csv");
    fs::write(&csv, "Xnorm,Ynorm,Znorm,DataID\n0,0.5,0.7,K\n").unwrap();

    let mut session = open(&dir, "black");
    let report = import_file(
        &mut session,
        &csv,
        &ImportOptions::default(),
        MergePolicy::PreserveExisting,
        None,
    )
    .unwrap();
    assert_eq!(report.commit.inserted, 1);

    let stored = session
        .store()
        .get(&MeasurementIdentity::new("K", 1).unwrap())
        .unwrap()
        .clone();
    assert_eq!(stored.raw.l_value, 0.0);
    assert!(close(stored.raw.a_value, -0.5));
    assert!(close(stored.raw.b_value, 50.5));

    let coords = |row: &[String]| -> [f64; 3] {
        [row[0].parse().unwrap(), row[1].parse().unwrap(), row[2].parse().unwrap()]
    };

    let rows = session.full_rebuild();
    let (_, row) = rows.data_rows().find(|(_, r)| r.data_id() == "K").unwrap();
    let [x, y, z] = coords(row.cells());
    assert_eq!(x, 0.0);
    assert!(close(y, 0.5));
    assert!(close(z, 0.7));

    let out = dir.join("black_out.csv");
    export_file(session.store(), &out, session.projection(), ExportTemplate::Standard, None)
        .unwrap();
    let grid = CsvCodec.read_sheet(&out, None).unwrap();
    let exported = grid.iter().find(|r| r.get(3).map(String::as_str) == Some("K")).unwrap();
    let [x, y, z] = coords(exported);
    assert_eq!(x, 0.0);
    assert!(close(y, 0.5));
    assert!(close(z, 0.7));
}
