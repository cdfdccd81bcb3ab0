//! Coordinate Normalizer.
//!
//! Every plotting view works in a shared `[0, 1]^3` space. L*a*b* maps as
//! `L/100`, `(a+128)/255`, `(b+128)/255`; RGB and CMY channel data map as
//! `v/255`. One constant set is used for every view, ternary included.

use crate::numeric::{clamp01, Real};

pub const L_MAX: Real = 100.0;
pub const AB_OFFSET: Real = 128.0;
pub const AB_SPAN: Real = 255.0;
pub const CHANNEL_MAX: Real = 255.0;

/// A point in the normalized plotting space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizedCoords {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl NormalizedCoords {
    pub const fn new(x: Real, y: Real, z: Real) -> Self {
        Self { x, y, z }
    }

    pub fn as_array(&self) -> [Real; 3] {
        [self.x, self.y, self.z]
    }

    /// True when all three components already lie in `[0, 1]`.
    pub fn is_unit_cube(&self) -> bool {
        self.as_array().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

/// Raw CIE L*a*b* triple.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    pub l: Real,
    pub a: Real,
    pub b: Real,
}

/// Raw channel triple (RGB, or CMY stored in the same slots).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Channels {
    pub r: Real,
    pub g: Real,
    pub b: Real,
}

pub fn normalize_lab(l: Real, a: Real, b: Real) -> NormalizedCoords {
    NormalizedCoords {
        x: clamp01(l / L_MAX),
        y: clamp01((a + AB_OFFSET) / AB_SPAN),
        z: clamp01((b + AB_OFFSET) / AB_SPAN),
    }
}

/// Exact algebraic inverse of [`normalize_lab`] before clamping.
pub fn denormalize_lab(coords: NormalizedCoords) -> Lab {
    Lab {
        l: coords.x * L_MAX,
        a: coords.y * AB_SPAN - AB_OFFSET,
        b: coords.z * AB_SPAN - AB_OFFSET,
    }
}

pub fn normalize_rgb(r: Real, g: Real, b: Real) -> NormalizedCoords {
    NormalizedCoords {
        x: clamp01(r / CHANNEL_MAX),
        y: clamp01(g / CHANNEL_MAX),
        z: clamp01(b / CHANNEL_MAX),
    }
}

pub fn denormalize_rgb(coords: NormalizedCoords) -> Channels {
    Channels {
        r: coords.x * CHANNEL_MAX,
        g: coords.y * CHANNEL_MAX,
        b: coords.z * CHANNEL_MAX,
    }
}

/// Read a coordinate triple of unknown provenance.
///
/// Heuristic, not a guarantee: if all three values already lie in `[0, 1]`
/// they are taken as normalized, otherwise they are treated as raw L*a*b* and
/// normalized. A genuine raw triple that happens to fall inside the unit cube
/// (e.g. `a* = 0.3`) is misread as normalized.
pub fn resolve_ambiguous(x: Real, y: Real, z: Real) -> NormalizedCoords {
    let candidate = NormalizedCoords::new(x, y, z);
    if candidate.is_unit_cube() {
        candidate
    } else {
        normalize_lab(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{nearly_equal, Tolerances};

    #[test]
    fn lab_midpoint() {
        let lab = denormalize_lab(NormalizedCoords::new(0.5, 0.5, 0.5));
        assert!(nearly_equal(lab.l, 50.0, Tolerances::default()));
        assert!(nearly_equal(lab.a, -0.5, Tolerances::default()));
        assert!(nearly_equal(lab.b, -0.5, Tolerances::default()));
    }

    #[test]
    fn out_of_range_lab_is_clamped() {
        let c = normalize_lab(150.0, -200.0, 300.0);
        assert_eq!(c, NormalizedCoords::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn rgb_scales_by_255() {
        let c = normalize_rgb(255.0, 0.0, 51.0);
        assert_eq!(c.x, 1.0);
        assert_eq!(c.y, 0.0);
        assert!(nearly_equal(c.z, 0.2, Tolerances::default()));
        let back = denormalize_rgb(c);
        assert!(nearly_equal(back.b, 51.0, Tolerances::default()));
    }

    #[test]
    fn ambiguous_unit_values_pass_through() {
        let c = resolve_ambiguous(0.2, 0.8, 0.1);
        assert_eq!(c, NormalizedCoords::new(0.2, 0.8, 0.1));
    }

    #[test]
    fn ambiguous_raw_values_are_normalized() {
        let c = resolve_ambiguous(50.0, 0.0, 0.0);
        assert_eq!(c, normalize_lab(50.0, 0.0, 0.0));
    }
}
