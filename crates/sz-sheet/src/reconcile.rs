//! Row -> store reconciliation.

use crate::classify::{AnnotationCells, CentroidFields, DataFields, Row};
use crate::error::{RowError, RowResult};
use serde::{Deserialize, Serialize};
use sz_core::{
    denormalize_lab, denormalize_rgb, is_valid_data_id, nearly_equal, resolve_ambiguous,
    ClusterId, ColorSample, MeasurementIdentity, NormalizedCoords, Projection, Real, SourceType,
    Tolerances,
};
use sz_store::{
    AnnotationPatch, Annotations, CentroidPatch, RawPatch, SampleSetStore, StoreError,
    UpsertOutcome, DEFAULT_COLOR, DEFAULT_MARKER,
};

/// How supplied annotation cells meet annotations already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Supplied cells replace stored values. Used when committing an edited view.
    #[default]
    Overwrite,
    /// Supplied cells only fill empty stored fields; differing values are
    /// reported as conflicts and the stored value wins.
    PreserveExisting,
}

/// An import value that lost against a stored annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    pub row: usize,
    pub data_id: String,
    pub field: &'static str,
    pub stored: String,
    pub incoming: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowAction {
    Inserted(MeasurementIdentity),
    Updated {
        identity: MeasurementIdentity,
        changed: bool,
    },
    Centroid {
        cluster_id: ClusterId,
        outcome: UpsertOutcome,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub action: RowAction,
    pub conflicts: Vec<MergeConflict>,
}

impl Reconciled {
    fn action(action: RowAction) -> Self {
        Self {
            action,
            conflicts: Vec::new(),
        }
    }
}

/// `sample_type` written on records created from rows.
pub fn imported_sample_type(source: SourceType) -> &'static str {
    match source {
        SourceType::ChannelRgb => "imported_channel_rgb",
        SourceType::ChannelCmy => "imported_channel_cmy",
        SourceType::ColorAnalysis => "imported_plot3d",
    }
}

/// Applies classified rows to one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    pub policy: MergePolicy,
    /// Kind of data new records are created as.
    pub source: SourceType,
    /// Projection the view's coordinates were produced with.
    pub projection: Projection,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(MergePolicy::Overwrite)
    }
}

impl Reconciler {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            source: SourceType::ColorAnalysis,
            projection: Projection::Lab,
        }
    }

    pub fn with_source(mut self, source: SourceType) -> Self {
        self.source = source;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Dispatch a classified row. Header, skip and invalid rows touch nothing.
    ///
    /// The outer error is a persistence failure; the inner one is row-scoped.
    pub fn reconcile(
        &self,
        store: &mut SampleSetStore,
        row: &Row,
    ) -> Result<RowResult<Reconciled>, StoreError> {
        match row {
            Row::Header | Row::Skip => Ok(Ok(Reconciled::action(RowAction::Skipped))),
            Row::Invalid(err) => Ok(Err(err.clone())),
            Row::Data(fields) => self.reconcile_data_row(store, fields),
            Row::CentroidSummary {
                band_position,
                fields,
            } => self.reconcile_centroid_row(store, fields, *band_position),
        }
    }

    pub fn reconcile_data_row(
        &self,
        store: &mut SampleSetStore,
        fields: &DataFields,
    ) -> Result<RowResult<Reconciled>, StoreError> {
        let identity = &fields.identity;
        let Some(existing) = store.get(identity) else {
            return self.reconcile_unknown_row(store, fields);
        };

        let mut raw = RawPatch::default();
        if let Some(coords) = fields.complete_coords() {
            if existing.accepts_coordinate_updates() {
                let use_rgb = existing.uses_channel_path() || self.projection == Projection::Rgb;
                raw = coords_patch(resolve_ambiguous(coords[0], coords[1], coords[2]), use_rgb);
            }
        }

        let (annotations, conflicts) = match self.policy {
            MergePolicy::Overwrite => (overwrite_patch(&fields.annotations), Vec::new()),
            MergePolicy::PreserveExisting => {
                preserve_patch(&existing.annotations, &fields.annotations, fields)
            }
        };

        match store.upsert_measurement(identity, &raw, Some(&annotations)) {
            Ok(UpsertOutcome::Updated { changed }) => {
                tracing::debug!(row = fields.row, data_id = %fields.data_id, changed, "updated from row");
                Ok(Ok(Reconciled {
                    action: RowAction::Updated {
                        identity: identity.clone(),
                        changed,
                    },
                    conflicts,
                }))
            }
            Ok(UpsertOutcome::Inserted) => Ok(Ok(Reconciled {
                action: RowAction::Inserted(identity.clone()),
                conflicts,
            })),
            Err(err) => RowError::from_store(fields.row, err).map(Err),
        }
    }

    fn reconcile_unknown_row(
        &self,
        store: &mut SampleSetStore,
        fields: &DataFields,
    ) -> Result<RowResult<Reconciled>, StoreError> {
        if let Some(coords) = fields.complete_coords() {
            if let Err(err) = validate_new_identity(fields) {
                return Ok(Err(err));
            }
            let normalized = resolve_ambiguous(coords[0], coords[1], coords[2]);
            let use_rgb = self.source.is_channel() || self.projection == Projection::Rgb;
            let raw = coords_patch(normalized, use_rgb)
                .with_position(normalized.x, normalized.y)
                .with_sample_type(imported_sample_type(self.source));
            let annotations = overwrite_patch(&fields.annotations);

            return match store.upsert_measurement(&fields.identity, &raw, Some(&annotations)) {
                Ok(_) => {
                    tracing::debug!(row = fields.row, data_id = %fields.data_id, "inserted from row");
                    Ok(Ok(Reconciled::action(RowAction::Inserted(fields.identity.clone()))))
                }
                Err(err) => RowError::from_store(fields.row, err).map(Err),
            };
        }

        if fields.has_any_coord() {
            return Ok(Err(RowError::validation(
                fields.row,
                "Xnorm/Ynorm/Znorm",
                "all three coordinates are required for a new sample",
            )));
        }

        let ann = &fields.annotations;
        if let (Some(cluster), Some(_)) = (ann.cluster, ann.complete_centroid()) {
            let cluster_id = match ClusterId::new(cluster) {
                Ok(id) => id,
                Err(err) => return Ok(Err(RowError::from_core(fields.row, err))),
            };
            return self.write_centroid(store, fields.row, cluster_id, ann);
        }

        tracing::debug!(row = fields.row, data_id = %fields.data_id, "no stored record and no coordinates; skipped");
        Ok(Ok(Reconciled::action(RowAction::Skipped)))
    }

    /// Explicit in-range cluster cell wins; otherwise the band position.
    pub fn reconcile_centroid_row(
        &self,
        store: &mut SampleSetStore,
        fields: &CentroidFields,
        band_position: usize,
    ) -> Result<RowResult<Reconciled>, StoreError> {
        let explicit = fields
            .annotations
            .cluster
            .and_then(|c| ClusterId::new(c).ok());
        let cluster_id = match explicit {
            Some(id) => id,
            None => match ClusterId::new(band_position as i64) {
                Ok(id) => id,
                Err(err) => return Ok(Err(RowError::from_core(fields.row, err))),
            },
        };
        self.write_centroid(store, fields.row, cluster_id, &fields.annotations)
    }

    fn write_centroid(
        &self,
        store: &mut SampleSetStore,
        row: usize,
        cluster_id: ClusterId,
        ann: &AnnotationCells,
    ) -> Result<RowResult<Reconciled>, StoreError> {
        let patch = CentroidPatch {
            centroid_x: ann.centroid[0],
            centroid_y: ann.centroid[1],
            centroid_z: ann.centroid[2],
            sphere_color: ann.sphere_color.clone(),
            sphere_radius: ann.sphere_radius,
            marker: ann.marker.clone(),
            color: ann.color.clone(),
        };
        match store.upsert_centroid(cluster_id.get().into(), &patch) {
            Ok(outcome) => {
                tracing::debug!(row, %cluster_id, ?outcome, "centroid from row");
                Ok(Ok(Reconciled::action(RowAction::Centroid {
                    cluster_id,
                    outcome,
                })))
            }
            Err(err) => RowError::from_store(row, err).map(Err),
        }
    }
}

/// Checks applied before a brand-new identity is inserted.
fn validate_new_identity(fields: &DataFields) -> RowResult<()> {
    if !is_valid_data_id(&fields.data_id) {
        return Err(RowError::validation(
            fields.row,
            "DataID",
            format!("'{}' must match [A-Za-z0-9_.-]+", fields.data_id),
        ));
    }
    if fields.identity.image_name.trim().is_empty() {
        return Err(RowError::InvalidIdentity {
            row: fields.row,
            what: "image name is empty".to_string(),
        });
    }
    if fields.identity.coordinate_point < 1 {
        return Err(RowError::InvalidIdentity {
            row: fields.row,
            what: format!("coordinate point {} must be >= 1", fields.identity.coordinate_point),
        });
    }
    Ok(())
}

fn coords_patch(coords: NormalizedCoords, use_rgb: bool) -> RawPatch {
    if use_rgb {
        let c = denormalize_rgb(coords);
        RawPatch::default().with_rgb(c.r, c.g, c.b)
    } else {
        let lab = denormalize_lab(coords);
        RawPatch::default().with_lab(lab.l, lab.a, lab.b)
    }
}

fn cluster_value(cells: &AnnotationCells) -> Option<u32> {
    cells.cluster.and_then(|c| u32::try_from(c).ok())
}

fn overwrite_patch(cells: &AnnotationCells) -> AnnotationPatch {
    AnnotationPatch {
        cluster_id: cluster_value(cells),
        delta_e: cells.delta_e,
        centroid_x: cells.centroid[0],
        centroid_y: cells.centroid[1],
        centroid_z: cells.centroid[2],
        sphere_color: cells.sphere_color.clone(),
        sphere_radius: cells.sphere_radius,
        marker_preference: cells.marker.clone(),
        color_preference: cells.color.clone(),
        trendline_valid: None,
    }
}

struct ConflictSink<'a> {
    fields: &'a DataFields,
    conflicts: Vec<MergeConflict>,
}

impl ConflictSink<'_> {
    fn push(&mut self, field: &'static str, stored: String, incoming: String) {
        self.conflicts.push(MergeConflict {
            row: self.fields.row,
            data_id: self.fields.data_id.clone(),
            field,
            stored,
            incoming,
        });
    }

    fn real(&mut self, field: &'static str, stored: Option<Real>, incoming: Option<Real>) -> Option<Real> {
        match (stored, incoming) {
            (None, v) => v,
            (Some(s), Some(v)) if !nearly_equal(s, v, Tolerances::ROUND_TRIP) => {
                self.push(field, s.to_string(), v.to_string());
                None
            }
            _ => None,
        }
    }

    fn text(&mut self, field: &'static str, stored: Option<&str>, incoming: Option<&String>) -> Option<String> {
        match (stored, incoming) {
            (None, v) => v.cloned(),
            (Some(s), Some(v)) if s != v => {
                self.push(field, s.to_string(), v.clone());
                None
            }
            _ => None,
        }
    }
}

/// Fill only what the store lacks. Marker and colour count as unset while
/// they hold their defaults.
fn preserve_patch(
    stored: &Annotations,
    cells: &AnnotationCells,
    fields: &DataFields,
) -> (AnnotationPatch, Vec<MergeConflict>) {
    let mut sink = ConflictSink {
        fields,
        conflicts: Vec::new(),
    };

    let cluster_id = match (stored.cluster_id, cluster_value(cells)) {
        (None, v) => v,
        (Some(s), Some(v)) if s != v => {
            sink.push("Cluster", s.to_string(), v.to_string());
            None
        }
        _ => None,
    };
    let marker_stored = (stored.marker_preference != DEFAULT_MARKER).then_some(stored.marker_preference.as_str());
    let color_stored = (stored.color_preference != DEFAULT_COLOR).then_some(stored.color_preference.as_str());

    let patch = AnnotationPatch {
        cluster_id,
        delta_e: sink.real("DeltaE", stored.delta_e, cells.delta_e),
        centroid_x: sink.real("Centroid_X", stored.centroid_x, cells.centroid[0]),
        centroid_y: sink.real("Centroid_Y", stored.centroid_y, cells.centroid[1]),
        centroid_z: sink.real("Centroid_Z", stored.centroid_z, cells.centroid[2]),
        sphere_color: sink.text("Sphere", stored.sphere_color.as_deref(), cells.sphere_color.as_ref()),
        sphere_radius: sink.real("Radius", stored.sphere_radius, cells.sphere_radius),
        marker_preference: sink.text("Marker", marker_stored, cells.marker.as_ref()),
        color_preference: sink.text("Color", color_stored, cells.color.as_ref()),
        trendline_valid: None,
    };
    (patch, sink.conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_row;
    use crate::columns::Column;
    use crate::layout::SheetLayout;
    use crate::row::GridRow;
    use sz_core::SampleSetName;

    fn store() -> SampleSetStore {
        SampleSetStore::in_memory(SampleSetName::new("reconcile").unwrap())
    }

    fn data_row(cells: &[(Column, &str)]) -> Row {
        let mut row = GridRow::blank();
        for (column, value) in cells {
            row.set(*column, *value);
        }
        classify_row(&row, 7, &SheetLayout::standard())
    }

    fn ok(result: Result<RowResult<Reconciled>, StoreError>) -> Reconciled {
        result.unwrap().unwrap()
    }

    #[test]
    fn new_row_inserts_denormalized_lab() {
        let mut s = store();
        let row = data_row(&[
            (Column::Xnorm, "0.2"),
            (Column::Ynorm, "0.8"),
            (Column::Znorm, "0.1"),
            (Column::DataId, "B"),
        ]);
        let out = ok(Reconciler::default().reconcile(&mut s, &row));
        assert!(matches!(out.action, RowAction::Inserted(_)));

        let m = s.get(&MeasurementIdentity::new("B", 1).unwrap()).unwrap();
        assert!(nearly_equal(m.raw.l_value, 20.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.a_value, 0.8 * 255.0 - 128.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.b_value, 0.1 * 255.0 - 128.0, Tolerances::ROUND_TRIP));
        assert_eq!(m.sample_type.as_deref(), Some("imported_plot3d"));
        assert_eq!(m.position.x, 0.2);
    }

    #[test]
    fn new_row_with_bad_data_id_rejected() {
        let mut s = store();
        let row = data_row(&[
            (Column::Xnorm, "0.5"),
            (Column::Ynorm, "0.5"),
            (Column::Znorm, "0.5"),
            (Column::DataId, "bad id!"),
        ]);
        let err = Reconciler::default().reconcile(&mut s, &row).unwrap().unwrap_err();
        assert!(matches!(err, RowError::Validation { ref field, .. } if field == "DataID"));
        assert_eq!(s.measurement_count(), 0);
    }

    #[test]
    fn annotation_only_row_never_fabricates() {
        let mut s = store();
        let row = data_row(&[(Column::DataId, "ghost"), (Column::Cluster, "2")]);
        let out = ok(Reconciler::default().reconcile(&mut s, &row));
        assert_eq!(out.action, RowAction::Skipped);
        assert_eq!(s.measurement_count(), 0);
    }

    #[test]
    fn sampled_record_keeps_raw_values() {
        let mut s = store();
        let id = MeasurementIdentity::new("S1", 1).unwrap();
        s.upsert_measurement(&id, &RawPatch::default().with_lab(60.0, 5.0, 5.0), None)
            .unwrap();

        let row = data_row(&[
            (Column::Xnorm, "0.1"),
            (Column::Ynorm, "0.1"),
            (Column::Znorm, "0.1"),
            (Column::DataId, "S1"),
            (Column::Marker, "*"),
        ]);
        ok(Reconciler::default().reconcile(&mut s, &row));
        let m = s.get(&id).unwrap();
        assert_eq!(m.raw.l_value, 60.0);
        assert_eq!(m.annotations.marker_preference, "*");
    }

    #[test]
    fn preserve_policy_reports_conflicts() {
        let mut s = store();
        let id = MeasurementIdentity::new("M", 1).unwrap();
        let ann = AnnotationPatch {
            cluster_id: Some(3),
            delta_e: Some(1.2),
            ..AnnotationPatch::default()
        };
        let raw = RawPatch::default()
            .with_lab(10.0, 0.0, 0.0)
            .with_sample_type("imported_plot3d");
        s.upsert_measurement(&id, &raw, Some(&ann)).unwrap();

        let row = data_row(&[
            (Column::Xnorm, "0.5"),
            (Column::Ynorm, "0.5"),
            (Column::Znorm, "0.5"),
            (Column::DataId, "M"),
            (Column::Cluster, "1"),
            (Column::Sphere, "red"),
        ]);
        let out = ok(Reconciler::new(MergePolicy::PreserveExisting).reconcile(&mut s, &row));
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].field, "Cluster");

        let m = s.get(&id).unwrap();
        assert_eq!(m.annotations.cluster_id, Some(3));
        assert_eq!(m.annotations.delta_e, Some(1.2));
        assert_eq!(m.annotations.sphere_color.as_deref(), Some("red"));
        assert!(nearly_equal(m.raw.l_value, 50.0, Tolerances::ROUND_TRIP));
    }

    #[test]
    fn centroid_band_dual_rule() {
        let mut s = store();
        let layout = SheetLayout::standard();
        let mut explicit = GridRow::blank();
        explicit.set(Column::Cluster, "4");
        explicit.set(Column::CentroidX, "0.1");
        explicit.set(Column::CentroidY, "0.2");
        explicit.set(Column::CentroidZ, "0.3");
        let out = ok(Reconciler::default().reconcile(&mut s, &classify_row(&explicit, 1, &layout)));
        assert!(matches!(out.action, RowAction::Centroid { cluster_id, .. } if cluster_id.get() == 4));

        let mut positional = explicit.clone();
        positional.set(Column::Cluster, "");
        let out = ok(Reconciler::default().reconcile(&mut s, &classify_row(&positional, 3, &layout)));
        assert!(matches!(out.action, RowAction::Centroid { cluster_id, .. } if cluster_id.get() == 2));

        let mut out_of_range = explicit.clone();
        out_of_range.set(Column::Cluster, "9");
        let out = ok(Reconciler::default().reconcile(&mut s, &classify_row(&out_of_range, 6, &layout)));
        assert!(matches!(out.action, RowAction::Centroid { cluster_id, .. } if cluster_id.get() == 5));
        assert_eq!(s.list_centroids().len(), 3);
    }

    #[test]
    fn centroid_like_data_row_routes_to_centroid() {
        let mut s = store();
        let row = data_row(&[
            (Column::DataId, "Cluster3"),
            (Column::Cluster, "3"),
            (Column::CentroidX, "0.4"),
            (Column::CentroidY, "0.5"),
            (Column::CentroidZ, "0.6"),
        ]);
        let out = ok(Reconciler::default().reconcile(&mut s, &row));
        assert!(matches!(out.action, RowAction::Centroid { .. }));
        assert_eq!(s.measurement_count(), 0);
        assert_eq!(s.list_centroids()[0].cluster_id.get(), 3);
    }

    #[test]
    fn channel_source_writes_rgb_slots() {
        let mut s = store();
        let row = data_row(&[
            (Column::Xnorm, "1"),
            (Column::Ynorm, "0.5"),
            (Column::Znorm, "0"),
            (Column::DataId, "C1"),
        ]);
        let reconciler = Reconciler::default().with_source(SourceType::ChannelCmy);
        ok(reconciler.reconcile(&mut s, &row));
        let m = s.get(&MeasurementIdentity::new("C1", 1).unwrap()).unwrap();
        assert_eq!(m.raw.l_value, 0.0);
        assert!(nearly_equal(m.raw.rgb_r, 255.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.rgb_g, 127.5, Tolerances::ROUND_TRIP));
        assert_eq!(m.sample_type.as_deref(), Some("imported_channel_cmy"));
    }

    fn coords_row(id: &str, x: &str, y: &str, z: &str) -> Row {
        data_row(&[
            (Column::Xnorm, x),
            (Column::Ynorm, y),
            (Column::Znorm, z),
            (Column::DataId, id),
        ])
    }

    #[test]
    fn raw_lab_cells_on_existing_record_are_normalized() {
        let mut s = store();
        ok(Reconciler::default().reconcile(&mut s, &coords_row("Q", "0.5", "0.5", "0.5")));

        let out = ok(Reconciler::default().reconcile(&mut s, &coords_row("Q", "60", "10", "-20")));
        assert!(matches!(out.action, RowAction::Updated { changed: true, .. }));
        let m = s.get(&MeasurementIdentity::new("Q", 1).unwrap()).unwrap();
        assert!(nearly_equal(m.raw.l_value, 60.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.a_value, 10.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.b_value, -20.0, Tolerances::ROUND_TRIP));
    }

    #[test]
    fn out_of_range_cells_are_clamped_on_update() {
        let mut s = store();
        ok(Reconciler::default().reconcile(&mut s, &coords_row("Q", "0.5", "0.5", "0.5")));
        ok(Reconciler::default().reconcile(&mut s, &coords_row("Q", "250", "300", "-400")));

        let m = s.get(&MeasurementIdentity::new("Q", 1).unwrap()).unwrap();
        assert!((0.0..=100.0).contains(&m.raw.l_value));
        assert!((-128.0..=127.0).contains(&m.raw.a_value));
        assert!((-128.0..=127.0).contains(&m.raw.b_value));
    }

    #[test]
    fn black_imported_record_updates_through_lab() {
        let mut s = store();
        ok(Reconciler::default().reconcile(&mut s, &coords_row("K", "0", "0.5", "0.7")));
        ok(Reconciler::default().reconcile(&mut s, &coords_row("K", "0", "0.4", "0.6")));

        let m = s.get(&MeasurementIdentity::new("K", 1).unwrap()).unwrap();
        assert_eq!(m.raw.l_value, 0.0);
        assert!(nearly_equal(m.raw.a_value, 0.4 * 255.0 - 128.0, Tolerances::ROUND_TRIP));
        assert!(nearly_equal(m.raw.b_value, 0.6 * 255.0 - 128.0, Tolerances::ROUND_TRIP));
        assert_eq!(m.raw.rgb_r, 0.0);
    }
}
