//! Sample-set storage API.

use crate::migrate::{dedupe_identities, migrate_to_latest};
use crate::schema::{
    AnnotationPatch, Annotations, CentroidPatch, CentroidRecord, Measurement, Position, RawColor,
    RawPatch, SampleSetDoc, UpsertOutcome,
};
use crate::validate::{
    validate_annotation_patch, validate_centroid_patch, validate_raw_patch, validate_sample_set,
};
use crate::{StoreError, StoreResult};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use sz_core::{
    nearly_equal, ClusterId, CoreError, MeasurementIdentity, Real, RecordId, SampleSetName,
    Tolerances,
};

/// File extension of a persisted sample set.
pub const STORE_EXTENSION: &str = "json";

pub fn store_path(data_dir: &Path, name: &SampleSetName) -> PathBuf {
    data_dir.join(format!("{}.{}", name.as_str(), STORE_EXTENSION))
}

/// Names of every sample set persisted under `data_dir`, sorted.
pub fn list_sample_sets(data_dir: &Path) -> StoreResult<Vec<SampleSetName>> {
    let mut names = Vec::new();
    if !data_dir.exists() {
        return Ok(names);
    }

    let entries = fs::read_dir(data_dir).map_err(|e| StoreError::unavailable(data_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::unavailable(data_dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(STORE_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            match SampleSetName::new(stem) {
                Ok(name) => names.push(name),
                Err(err) => tracing::warn!(?path, %err, "ignoring unnamed store file"),
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// One open sample set. All reads are served from memory; `flush` persists.
#[derive(Debug)]
pub struct SampleSetStore {
    path: Option<PathBuf>,
    doc: SampleSetDoc,
    index: HashMap<MeasurementIdentity, usize>,
    dirty: bool,
}

impl SampleSetStore {
    /// Open (or lazily create) the sample set stored under `data_dir`.
    pub fn open(data_dir: &Path, name: &SampleSetName) -> StoreResult<Self> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir).map_err(|e| StoreError::unavailable(data_dir, e))?;
        }
        let path = store_path(data_dir, name);

        let mut needs_rewrite = false;
        let doc = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StoreError::unavailable(&path, e))?;
            let doc: SampleSetDoc =
                serde_json::from_str(&content).map_err(|source| StoreError::Json {
                    path: path.clone(),
                    source,
                })?;
            let from_version = doc.version;
            let mut doc = migrate_to_latest(doc)?;
            let removed = dedupe_identities(&mut doc);
            if removed > 0 {
                tracing::warn!(set = %name, removed, "removed duplicate measurements");
            }
            if &doc.name != name {
                tracing::warn!(stored = %doc.name, requested = %name, "store name differs from file name");
                doc.name = name.clone();
            }
            validate_sample_set(&doc)?;
            needs_rewrite = from_version < doc.version || removed > 0;
            tracing::debug!(set = %name, from_version, measurements = doc.measurements.len(), "loaded sample set");
            doc
        } else {
            tracing::info!(set = %name, ?path, "creating new sample set");
            SampleSetDoc::empty(name.clone())
        };

        let mut store = Self::from_doc(Some(path), doc);
        store.dirty = needs_rewrite;
        Ok(store)
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(name: SampleSetName) -> Self {
        Self::from_doc(None, SampleSetDoc::empty(name))
    }

    fn from_doc(path: Option<PathBuf>, mut doc: SampleSetDoc) -> Self {
        let next = doc
            .measurements
            .iter()
            .map(|m| m.id.seq() + 1)
            .max()
            .unwrap_or(0);
        doc.next_seq = doc.next_seq.max(next);

        let mut store = Self {
            path,
            doc,
            index: HashMap::new(),
            dirty: false,
        };
        store.rebuild_index();
        store
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .doc
            .measurements
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.identity(), idx))
            .collect();
    }

    pub fn name(&self) -> &SampleSetName {
        &self.doc.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn doc(&self) -> &SampleSetDoc {
        &self.doc
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist pending changes: write a temp file, then rename over the store.
    pub fn flush(&mut self) -> StoreResult<()> {
        let Some(path) = self.path.clone() else {
            self.dirty = false;
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        validate_sample_set(&self.doc)?;
        let json = serde_json::to_string_pretty(&self.doc).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension(format!("{}.tmp", STORE_EXTENSION));
        fs::write(&tmp, json).map_err(|e| StoreError::unavailable(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::unavailable(&path, e))?;

        self.dirty = false;
        tracing::debug!(set = %self.doc.name, ?path, "flushed sample set");
        Ok(())
    }

    pub fn measurement_count(&self) -> usize {
        self.doc.measurements.len()
    }

    pub fn get(&self, identity: &MeasurementIdentity) -> Option<&Measurement> {
        self.index
            .get(identity)
            .map(|&idx| &self.doc.measurements[idx])
    }

    /// Snapshot in insertion order.
    pub fn list_measurements(&self) -> &[Measurement] {
        &self.doc.measurements
    }

    /// Snapshot in insertion order.
    pub fn list_centroids(&self) -> &[CentroidRecord] {
        &self.doc.centroids
    }

    pub fn centroid(&self, cluster_id: ClusterId) -> Option<&CentroidRecord> {
        self.doc.centroids.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// Insert a new record or patch the existing one with the supplied fields.
    ///
    /// The write is all-or-nothing: patches are validated before anything
    /// is touched.
    pub fn upsert_measurement(
        &mut self,
        identity: &MeasurementIdentity,
        raw: &RawPatch,
        annotations: Option<&AnnotationPatch>,
    ) -> StoreResult<UpsertOutcome> {
        check_identity(identity)?;
        let owner = identity.data_id();
        validate_raw_patch(&owner, raw)?;
        if let Some(patch) = annotations {
            validate_annotation_patch(&owner, patch)?;
        }

        if let Some(&idx) = self.index.get(identity) {
            let record = &mut self.doc.measurements[idx];
            let mut changed = apply_raw_patch(record, raw);
            if let Some(patch) = annotations {
                changed |= apply_annotation_patch(&mut record.annotations, patch);
            }
            if changed {
                record.measurement_date = Utc::now();
                self.dirty = true;
            }
            tracing::debug!(data_id = %owner, changed, "updated measurement");
            return Ok(UpsertOutcome::Updated { changed });
        }

        let mut record = Measurement {
            id: RecordId::from_seq(self.doc.next_seq),
            image_name: identity.image_name.clone(),
            coordinate_point: identity.coordinate_point,
            measurement_date: Utc::now(),
            position: Position::default(),
            raw: RawColor::default(),
            annotations: Annotations::default(),
            sample_type: None,
            sample_size: None,
            sample_anchor: None,
            notes: None,
        };
        apply_raw_patch(&mut record, raw);
        if let Some(patch) = annotations {
            apply_annotation_patch(&mut record.annotations, patch);
        }

        self.doc.next_seq += 1;
        self.index.insert(identity.clone(), self.doc.measurements.len());
        self.doc.measurements.push(record);
        self.dirty = true;
        tracing::debug!(data_id = %owner, "inserted measurement");
        Ok(UpsertOutcome::Inserted)
    }

    /// Patch annotations of an existing record. Returns `false` when the
    /// identity is unknown; never creates a record.
    pub fn update_annotations_only(
        &mut self,
        identity: &MeasurementIdentity,
        patch: &AnnotationPatch,
    ) -> StoreResult<bool> {
        let Some(&idx) = self.index.get(identity) else {
            tracing::debug!(data_id = %identity, "annotation update for unknown identity ignored");
            return Ok(false);
        };
        validate_annotation_patch(&identity.data_id(), patch)?;

        let record = &mut self.doc.measurements[idx];
        if apply_annotation_patch(&mut record.annotations, patch) {
            record.measurement_date = Utc::now();
            self.dirty = true;
        }
        Ok(true)
    }

    /// Insert or patch the centroid record of `cluster_id`.
    pub fn upsert_centroid(
        &mut self,
        cluster_id: i64,
        patch: &CentroidPatch,
    ) -> StoreResult<UpsertOutcome> {
        let cluster_id = ClusterId::new(cluster_id)?;
        validate_centroid_patch(&format!("cluster {}", cluster_id), patch)?;

        if let Some(existing) = self
            .doc
            .centroids
            .iter_mut()
            .find(|c| c.cluster_id == cluster_id)
        {
            let changed = apply_centroid_patch(existing, patch);
            if changed {
                existing.updated = Utc::now();
                self.dirty = true;
            }
            return Ok(UpsertOutcome::Updated { changed });
        }

        let mut record = CentroidRecord {
            cluster_id,
            centroid_x: None,
            centroid_y: None,
            centroid_z: None,
            sphere_color: None,
            sphere_radius: None,
            marker: crate::schema::DEFAULT_MARKER.to_string(),
            color: crate::schema::DEFAULT_COLOR.to_string(),
            updated: Utc::now(),
        };
        apply_centroid_patch(&mut record, patch);
        self.doc.centroids.push(record);
        self.dirty = true;
        tracing::debug!(%cluster_id, "inserted centroid");
        Ok(UpsertOutcome::Inserted)
    }

    /// Null the cluster-analysis fields of every measurement. Returns how many
    /// records held any.
    pub fn clear_annotations(&mut self) -> usize {
        let mut affected = 0;
        for m in &mut self.doc.measurements {
            if m.annotations.clear_cluster_fields() {
                affected += 1;
            }
        }
        if affected > 0 {
            self.dirty = true;
        }
        tracing::info!(set = %self.doc.name, affected, "cleared measurement annotations");
        affected
    }

    pub fn clear_centroids(&mut self) -> usize {
        let removed = self.doc.centroids.len();
        self.doc.centroids.clear();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }
}

fn check_identity(identity: &MeasurementIdentity) -> StoreResult<()> {
    if identity.image_name.trim().is_empty() {
        return Err(CoreError::InvalidIdentity {
            what: "image_name is empty".to_string(),
        }
        .into());
    }
    if identity.coordinate_point < 1 {
        return Err(CoreError::InvalidIdentity {
            what: format!(
                "coordinate_point {} of '{}' must be >= 1",
                identity.coordinate_point, identity.image_name
            ),
        }
        .into());
    }
    Ok(())
}

fn set_real(slot: &mut Real, value: Option<Real>) -> bool {
    match value {
        Some(v) if !nearly_equal(*slot, v, Tolerances::ROUND_TRIP) => {
            *slot = v;
            true
        }
        _ => false,
    }
}

fn set_opt_real(slot: &mut Option<Real>, value: Option<Real>) -> bool {
    match (value, *slot) {
        (Some(v), Some(current)) if nearly_equal(current, v, Tolerances::ROUND_TRIP) => false,
        (Some(v), _) => {
            *slot = Some(v);
            true
        }
        (None, _) => false,
    }
}

fn set_value<T: PartialEq + Clone>(slot: &mut T, value: Option<&T>) -> bool {
    match value {
        Some(v) if slot != v => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

fn set_opt_value<T: PartialEq + Clone>(slot: &mut Option<T>, value: Option<&T>) -> bool {
    match value {
        Some(v) if slot.as_ref() != Some(v) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

fn apply_raw_patch(record: &mut Measurement, patch: &RawPatch) -> bool {
    let mut changed = false;
    changed |= set_real(&mut record.raw.l_value, patch.l_value);
    changed |= set_real(&mut record.raw.a_value, patch.a_value);
    changed |= set_real(&mut record.raw.b_value, patch.b_value);
    changed |= set_real(&mut record.raw.rgb_r, patch.rgb_r);
    changed |= set_real(&mut record.raw.rgb_g, patch.rgb_g);
    changed |= set_real(&mut record.raw.rgb_b, patch.rgb_b);
    changed |= set_real(&mut record.position.x, patch.x_position);
    changed |= set_real(&mut record.position.y, patch.y_position);
    changed |= set_opt_value(&mut record.sample_type, patch.sample_type.as_ref());
    changed |= set_opt_value(&mut record.sample_size, patch.sample_size.as_ref());
    changed |= set_opt_value(&mut record.sample_anchor, patch.sample_anchor.as_ref());
    changed |= set_opt_value(&mut record.notes, patch.notes.as_ref());
    changed
}

fn apply_annotation_patch(ann: &mut Annotations, patch: &AnnotationPatch) -> bool {
    let mut changed = false;
    changed |= set_opt_value(&mut ann.cluster_id, patch.cluster_id.as_ref());
    changed |= set_opt_real(&mut ann.delta_e, patch.delta_e);
    changed |= set_opt_real(&mut ann.centroid_x, patch.centroid_x);
    changed |= set_opt_real(&mut ann.centroid_y, patch.centroid_y);
    changed |= set_opt_real(&mut ann.centroid_z, patch.centroid_z);
    changed |= set_opt_value(&mut ann.sphere_color, patch.sphere_color.as_ref());
    changed |= set_opt_real(&mut ann.sphere_radius, patch.sphere_radius);
    changed |= set_value(&mut ann.marker_preference, patch.marker_preference.as_ref());
    changed |= set_value(&mut ann.color_preference, patch.color_preference.as_ref());
    changed |= set_value(&mut ann.trendline_valid, patch.trendline_valid.as_ref());
    changed
}

fn apply_centroid_patch(record: &mut CentroidRecord, patch: &CentroidPatch) -> bool {
    let mut changed = false;
    changed |= set_opt_real(&mut record.centroid_x, patch.centroid_x);
    changed |= set_opt_real(&mut record.centroid_y, patch.centroid_y);
    changed |= set_opt_real(&mut record.centroid_z, patch.centroid_z);
    changed |= set_opt_value(&mut record.sphere_color, patch.sphere_color.as_ref());
    changed |= set_opt_real(&mut record.sphere_radius, patch.sphere_radius);
    changed |= set_value(&mut record.marker, patch.marker.as_ref());
    changed |= set_value(&mut record.color, patch.color.as_ref());
    changed
}
