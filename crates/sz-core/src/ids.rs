use core::fmt;
use core::num::NonZeroU32;

use crate::error::{CoreError, CoreResult};

/// Compact, stable identifier for a stored measurement record.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<RecordId>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordId(NonZeroU32);

impl RecordId {
    /// Create a RecordId from a 0-based sequence number by storing seq+1.
    pub fn from_seq(seq: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(seq))
    }

    /// Recover the 0-based sequence number.
    pub fn seq(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.seq())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seq())
    }
}

/// Marker separating image name and coordinate point inside a DataID.
pub const POINT_MARKER: &str = "_pt";

/// Highest cluster id that owns a centroid record.
pub const MAX_CLUSTER_ID: u8 = 5;

/// Natural key of a measurement: image name plus 1-based coordinate point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementIdentity {
    pub image_name: String,
    pub coordinate_point: u32,
}

impl MeasurementIdentity {
    pub fn new(image_name: impl Into<String>, coordinate_point: u32) -> CoreResult<Self> {
        let image_name = image_name.into();
        if image_name.trim().is_empty() {
            return Err(CoreError::InvalidIdentity {
                what: "image_name is empty".to_string(),
            });
        }
        if coordinate_point < 1 {
            return Err(CoreError::InvalidIdentity {
                what: format!(
                    "coordinate_point {} for '{}' must be >= 1",
                    coordinate_point, image_name
                ),
            });
        }
        Ok(Self {
            image_name,
            coordinate_point,
        })
    }

    /// Row key shown to users.
    pub fn data_id(&self) -> String {
        derive_data_id(&self.image_name, self.coordinate_point)
    }
}

impl fmt::Display for MeasurementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pt{}", self.image_name, self.coordinate_point)
    }
}

/// Build the DataID for an identity.
///
/// Point 1 keeps the bare image name unless the name itself already carries
/// the `_pt` marker, in which case the suffix is always written.
pub fn derive_data_id(image_name: &str, coordinate_point: u32) -> String {
    if coordinate_point > 1 || image_name.contains(POINT_MARKER) {
        format!("{}{}{}", image_name, POINT_MARKER, coordinate_point)
    } else {
        image_name.to_string()
    }
}

/// Split a DataID back into its identity.
///
/// With exactly one `_pt` and an integer suffix the string is split there;
/// otherwise the whole string is the image name at point 1. More than one
/// `_pt` is rejected as ambiguous.
pub fn derive_identity_from_data_id(data_id: &str) -> CoreResult<MeasurementIdentity> {
    let data_id = data_id.trim();
    let count = data_id.matches(POINT_MARKER).count();
    if count > 1 {
        return Err(CoreError::AmbiguousDataId {
            data_id: data_id.to_string(),
            count,
        });
    }
    if count == 1 {
        if let Some((image, suffix)) = data_id.split_once(POINT_MARKER) {
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                let point: u32 = suffix.parse().map_err(|_| CoreError::InvalidIdentity {
                    what: format!("coordinate point '{}' in '{}' is too large", suffix, data_id),
                })?;
                return MeasurementIdentity::new(image, point);
            }
        }
    }
    MeasurementIdentity::new(data_id, 1)
}

/// DataID charset check applied before a brand-new identity is inserted.
pub fn is_valid_data_id(data_id: &str) -> bool {
    !data_id.is_empty()
        && data_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// K-means cluster id that owns a centroid record (`0..=5`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "i64"))]
pub struct ClusterId(u8);

impl ClusterId {
    pub fn new(id: i64) -> CoreResult<Self> {
        if (0..=MAX_CLUSTER_ID as i64).contains(&id) {
            Ok(Self(id as u8))
        } else {
            Err(CoreError::ClusterOutOfRange {
                cluster_id: id,
                max: MAX_CLUSTER_ID,
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = ClusterId> {
        (0..=MAX_CLUSTER_ID).map(ClusterId)
    }
}

impl TryFrom<i64> for ClusterId {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        ClusterId::new(value)
    }
}

impl From<ClusterId> for i64 {
    fn from(value: ClusterId) -> Self {
        value.0 as i64
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
