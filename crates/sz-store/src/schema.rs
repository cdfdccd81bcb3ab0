//! Sample-set document schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sz_core::{ClusterId, ColorSample, MeasurementIdentity, Real, RecordId, SampleSetName};

pub const DEFAULT_MARKER: &str = ".";
pub const DEFAULT_COLOR: &str = "blue";

/// One persisted sample set: the unit of storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleSetDoc {
    pub version: u32,
    pub name: SampleSetName,
    #[serde(default)]
    pub next_seq: u32,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub centroids: Vec<CentroidRecord>,
}

impl SampleSetDoc {
    pub fn empty(name: SampleSetName) -> Self {
        Self {
            version: crate::migrate::LATEST_VERSION,
            name,
            next_seq: 0,
            measurements: Vec::new(),
            centroids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub id: RecordId,
    pub image_name: String,
    pub coordinate_point: u32,
    pub measurement_date: DateTime<Utc>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub raw: RawColor,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Measurement {
    pub fn identity(&self) -> MeasurementIdentity {
        MeasurementIdentity {
            image_name: self.image_name.clone(),
            coordinate_point: self.coordinate_point,
        }
    }

    pub fn data_id(&self) -> String {
        sz_core::derive_data_id(&self.image_name, self.coordinate_point)
    }

    /// Records created by an external import may have their raw color
    /// overwritten by later imports; sampled records may not.
    pub fn accepts_coordinate_updates(&self) -> bool {
        self.sample_type
            .as_deref()
            .is_some_and(|t| t.starts_with(IMPORTED_SAMPLE_PREFIX))
    }
}

/// `sample_type` prefix marking records that originate from an import.
pub const IMPORTED_SAMPLE_PREFIX: &str = "imported";

impl ColorSample for Measurement {
    fn l_value(&self) -> Real {
        self.raw.l_value
    }

    fn a_value(&self) -> Real {
        self.raw.a_value
    }

    fn b_value(&self) -> Real {
        self.raw.b_value
    }

    fn channels(&self) -> [Real; 3] {
        [self.raw.rgb_r, self.raw.rgb_g, self.raw.rgb_b]
    }

    fn sample_type(&self) -> Option<&str> {
        self.sample_type.as_deref()
    }
}

/// Pixel-space sample position (display only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: Real,
    pub y: Real,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct RawColor {
    pub l_value: Real,
    pub a_value: Real,
    pub b_value: Real,
    pub rgb_r: Real,
    pub rgb_g: Real,
    pub rgb_b: Real,
}

/// Plot3D extended fields. Each is independently updatable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_e: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_x: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_y: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_z: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_radius: Option<Real>,
    #[serde(default = "default_marker")]
    pub marker_preference: String,
    #[serde(default = "default_color")]
    pub color_preference: String,
    #[serde(default = "default_trendline_valid")]
    pub trendline_valid: bool,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            cluster_id: None,
            delta_e: None,
            centroid_x: None,
            centroid_y: None,
            centroid_z: None,
            sphere_color: None,
            sphere_radius: None,
            marker_preference: default_marker(),
            color_preference: default_color(),
            trendline_valid: default_trendline_valid(),
        }
    }
}

impl Annotations {
    /// Null every cluster-analysis field; preferences stay.
    pub fn clear_cluster_fields(&mut self) -> bool {
        let had_any = self.cluster_id.is_some()
            || self.delta_e.is_some()
            || self.centroid_x.is_some()
            || self.centroid_y.is_some()
            || self.centroid_z.is_some()
            || self.sphere_color.is_some()
            || self.sphere_radius.is_some();
        self.cluster_id = None;
        self.delta_e = None;
        self.centroid_x = None;
        self.centroid_y = None;
        self.centroid_z = None;
        self.sphere_color = None;
        self.sphere_radius = None;
        had_any
    }
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_trendline_valid() -> bool {
    true
}

/// Computed K-means cluster centre, stored apart from measurements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentroidRecord {
    pub cluster_id: ClusterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_x: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_y: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid_z: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_radius: Option<Real>,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub updated: DateTime<Utc>,
}

impl CentroidRecord {
    pub fn centroid(&self) -> Option<[Real; 3]> {
        match (self.centroid_x, self.centroid_y, self.centroid_z) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        }
    }
}

/// Partial raw-field write. `None` keeps the stored value (or the default on insert).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPatch {
    pub l_value: Option<Real>,
    pub a_value: Option<Real>,
    pub b_value: Option<Real>,
    pub rgb_r: Option<Real>,
    pub rgb_g: Option<Real>,
    pub rgb_b: Option<Real>,
    pub x_position: Option<Real>,
    pub y_position: Option<Real>,
    pub sample_type: Option<String>,
    pub sample_size: Option<String>,
    pub sample_anchor: Option<String>,
    pub notes: Option<String>,
}

impl RawPatch {
    pub fn is_empty(&self) -> bool {
        *self == RawPatch::default()
    }

    pub fn with_lab(mut self, l: Real, a: Real, b: Real) -> Self {
        self.l_value = Some(l);
        self.a_value = Some(a);
        self.b_value = Some(b);
        self
    }

    pub fn with_rgb(mut self, r: Real, g: Real, b: Real) -> Self {
        self.rgb_r = Some(r);
        self.rgb_g = Some(g);
        self.rgb_b = Some(b);
        self
    }

    pub fn with_position(mut self, x: Real, y: Real) -> Self {
        self.x_position = Some(x);
        self.y_position = Some(y);
        self
    }

    pub fn with_sample_type(mut self, sample_type: impl Into<String>) -> Self {
        self.sample_type = Some(sample_type.into());
        self
    }
}

/// Partial annotation write. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub cluster_id: Option<u32>,
    pub delta_e: Option<Real>,
    pub centroid_x: Option<Real>,
    pub centroid_y: Option<Real>,
    pub centroid_z: Option<Real>,
    pub sphere_color: Option<String>,
    pub sphere_radius: Option<Real>,
    pub marker_preference: Option<String>,
    pub color_preference: Option<String>,
    pub trendline_valid: Option<bool>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        *self == AnnotationPatch::default()
    }
}

/// Partial centroid write. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidPatch {
    pub centroid_x: Option<Real>,
    pub centroid_y: Option<Real>,
    pub centroid_z: Option<Real>,
    pub sphere_color: Option<String>,
    pub sphere_radius: Option<Real>,
    pub marker: Option<String>,
    pub color: Option<String>,
}

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// `changed` is false when every supplied value equalled the stored one.
    Updated { changed: bool },
}

impl UpsertOutcome {
    pub fn is_insert(self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}
