//! Sample-set validation logic.

use crate::schema::{AnnotationPatch, CentroidPatch, RawPatch, SampleSetDoc};
use std::collections::HashSet;
use sz_core::Real;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate identity: {identity} in {context}")]
    DuplicateIdentity { identity: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_sample_set(doc: &SampleSetDoc) -> Result<(), ValidationError> {
    if doc.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: doc.version,
        });
    }

    let mut identities = HashSet::new();
    for m in &doc.measurements {
        if m.image_name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("measurement {} image_name", m.id),
                value: m.image_name.clone(),
                reason: "image name must not be empty".to_string(),
            });
        }
        if m.coordinate_point < 1 {
            return Err(ValidationError::InvalidValue {
                field: format!("{} coordinate_point", m.image_name),
                value: m.coordinate_point.to_string(),
                reason: "coordinate point must be >= 1".to_string(),
            });
        }
        if !identities.insert((m.image_name.as_str(), m.coordinate_point)) {
            return Err(ValidationError::DuplicateIdentity {
                identity: m.data_id(),
                context: format!("sample set '{}' measurements", doc.name),
            });
        }

        let raw = &m.raw;
        check_finite(&m.data_id(), "l_value", raw.l_value)?;
        check_finite(&m.data_id(), "a_value", raw.a_value)?;
        check_finite(&m.data_id(), "b_value", raw.b_value)?;
        check_finite(&m.data_id(), "rgb_r", raw.rgb_r)?;
        check_finite(&m.data_id(), "rgb_g", raw.rgb_g)?;
        check_finite(&m.data_id(), "rgb_b", raw.rgb_b)?;
        check_finite(&m.data_id(), "x_position", m.position.x)?;
        check_finite(&m.data_id(), "y_position", m.position.y)?;

        let ann = &m.annotations;
        check_finite_opt(&m.data_id(), "delta_e", ann.delta_e)?;
        check_finite_opt(&m.data_id(), "centroid_x", ann.centroid_x)?;
        check_finite_opt(&m.data_id(), "centroid_y", ann.centroid_y)?;
        check_finite_opt(&m.data_id(), "centroid_z", ann.centroid_z)?;
        check_finite_opt(&m.data_id(), "sphere_radius", ann.sphere_radius)?;
    }

    let mut clusters = HashSet::new();
    for c in &doc.centroids {
        if !clusters.insert(c.cluster_id) {
            return Err(ValidationError::DuplicateIdentity {
                identity: format!("cluster {}", c.cluster_id),
                context: format!("sample set '{}' centroids", doc.name),
            });
        }
        let owner = format!("cluster {}", c.cluster_id);
        check_finite_opt(&owner, "centroid_x", c.centroid_x)?;
        check_finite_opt(&owner, "centroid_y", c.centroid_y)?;
        check_finite_opt(&owner, "centroid_z", c.centroid_z)?;
        check_finite_opt(&owner, "sphere_radius", c.sphere_radius)?;
    }

    Ok(())
}

pub fn validate_raw_patch(owner: &str, patch: &RawPatch) -> Result<(), ValidationError> {
    check_finite_opt(owner, "l_value", patch.l_value)?;
    check_finite_opt(owner, "a_value", patch.a_value)?;
    check_finite_opt(owner, "b_value", patch.b_value)?;
    check_finite_opt(owner, "rgb_r", patch.rgb_r)?;
    check_finite_opt(owner, "rgb_g", patch.rgb_g)?;
    check_finite_opt(owner, "rgb_b", patch.rgb_b)?;
    check_finite_opt(owner, "x_position", patch.x_position)?;
    check_finite_opt(owner, "y_position", patch.y_position)?;
    Ok(())
}

pub fn validate_annotation_patch(owner: &str, patch: &AnnotationPatch) -> Result<(), ValidationError> {
    check_finite_opt(owner, "delta_e", patch.delta_e)?;
    check_finite_opt(owner, "centroid_x", patch.centroid_x)?;
    check_finite_opt(owner, "centroid_y", patch.centroid_y)?;
    check_finite_opt(owner, "centroid_z", patch.centroid_z)?;
    check_finite_opt(owner, "sphere_radius", patch.sphere_radius)?;
    if let Some(radius) = patch.sphere_radius {
        check_non_negative(owner, "sphere_radius", radius)?;
    }
    Ok(())
}

pub fn validate_centroid_patch(owner: &str, patch: &CentroidPatch) -> Result<(), ValidationError> {
    check_finite_opt(owner, "centroid_x", patch.centroid_x)?;
    check_finite_opt(owner, "centroid_y", patch.centroid_y)?;
    check_finite_opt(owner, "centroid_z", patch.centroid_z)?;
    check_finite_opt(owner, "sphere_radius", patch.sphere_radius)?;
    if let Some(radius) = patch.sphere_radius {
        check_non_negative(owner, "sphere_radius", radius)?;
    }
    Ok(())
}

fn check_finite(owner: &str, field: &str, value: Real) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: format!("{} {}", owner, field),
            value: value.to_string(),
            reason: "value must be finite".to_string(),
        })
    }
}

fn check_finite_opt(owner: &str, field: &str, value: Option<Real>) -> Result<(), ValidationError> {
    match value {
        Some(v) => check_finite(owner, field, v),
        None => Ok(()),
    }
}

fn check_non_negative(owner: &str, field: &str, value: Real) -> Result<(), ValidationError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: format!("{} {}", owner, field),
            value: value.to_string(),
            reason: "value must not be negative".to_string(),
        })
    }
}
