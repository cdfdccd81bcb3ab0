//! Schema migration framework.

use crate::schema::{CentroidRecord, Measurement, SampleSetDoc, DEFAULT_COLOR, DEFAULT_MARKER};
use crate::StoreError;
use std::collections::HashMap;
use sz_core::ClusterId;

pub const LATEST_VERSION: u32 = 2;

/// Image name under which legacy documents stored centroid pseudo-measurements.
pub const LEGACY_CENTROID_IMAGE: &str = "CENTROIDS";

pub fn migrate_to_latest(mut doc: SampleSetDoc) -> Result<SampleSetDoc, StoreError> {
    while doc.version < LATEST_VERSION {
        doc = migrate_one_version(doc)?;
    }
    Ok(doc)
}

fn migrate_one_version(doc: SampleSetDoc) -> Result<SampleSetDoc, StoreError> {
    match doc.version {
        0 => migrate_v0_to_v1(doc),
        1 => migrate_v1_to_v2(doc),
        v => Err(StoreError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

fn migrate_v0_to_v1(mut doc: SampleSetDoc) -> Result<SampleSetDoc, StoreError> {
    for m in &mut doc.measurements {
        if m.annotations.marker_preference.trim().is_empty() {
            m.annotations.marker_preference = DEFAULT_MARKER.to_string();
        }
        if m.annotations.color_preference.trim().is_empty() {
            m.annotations.color_preference = DEFAULT_COLOR.to_string();
        }
        if m.annotations.sphere_color.as_deref().is_some_and(|s| s.trim().is_empty()) {
            m.annotations.sphere_color = None;
        }
    }
    doc.version = 1;
    Ok(doc)
}

fn migrate_v1_to_v2(mut doc: SampleSetDoc) -> Result<SampleSetDoc, StoreError> {
    let (legacy, measurements): (Vec<Measurement>, Vec<Measurement>) = doc
        .measurements
        .into_iter()
        .partition(is_legacy_centroid);
    doc.measurements = measurements;

    for m in legacy {
        let raw_cluster = m
            .annotations
            .cluster_id
            .map(i64::from)
            .unwrap_or(m.coordinate_point as i64);
        let cluster_id = match ClusterId::new(raw_cluster) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(%err, "dropping legacy centroid row during migration");
                continue;
            }
        };
        let record = CentroidRecord {
            cluster_id,
            centroid_x: m.annotations.centroid_x,
            centroid_y: m.annotations.centroid_y,
            centroid_z: m.annotations.centroid_z,
            sphere_color: m.annotations.sphere_color.clone(),
            sphere_radius: m.annotations.sphere_radius,
            marker: m.annotations.marker_preference.clone(),
            color: m.annotations.color_preference.clone(),
            updated: m.measurement_date,
        };
        match doc.centroids.iter_mut().find(|c| c.cluster_id == cluster_id) {
            Some(existing) if existing.updated >= record.updated => {}
            Some(existing) => *existing = record,
            None => doc.centroids.push(record),
        }
    }

    doc.version = 2;
    Ok(doc)
}

fn is_legacy_centroid(m: &Measurement) -> bool {
    m.image_name == LEGACY_CENTROID_IMAGE || m.sample_type.as_deref() == Some("centroid")
}

/// Keep only the newest record per identity. Returns how many were removed.
pub fn dedupe_identities(doc: &mut SampleSetDoc) -> usize {
    let mut newest: HashMap<(String, u32), usize> = HashMap::new();
    for (idx, m) in doc.measurements.iter().enumerate() {
        let key = (m.image_name.clone(), m.coordinate_point);
        match newest.get(&key) {
            Some(&kept) if doc.measurements[kept].measurement_date > m.measurement_date => {}
            _ => {
                newest.insert(key, idx);
            }
        }
    }

    let before = doc.measurements.len();
    let mut idx = 0usize;
    doc.measurements.retain(|m| {
        let keep = newest.get(&(m.image_name.clone(), m.coordinate_point)) == Some(&idx);
        idx += 1;
        keep
    });
    before - doc.measurements.len()
}
