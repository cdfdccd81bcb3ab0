//! Batch classification and per-sample projection into the normalized space.

use crate::normalize::{normalize_lab, normalize_rgb, NormalizedCoords};
use crate::numeric::Real;

/// Number of leading records inspected by [`detect_source_type`].
pub const DETECTION_SAMPLE_SIZE: usize = 10;

/// What kind of measurements a batch holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SourceType {
    ChannelRgb,
    ChannelCmy,
    ColorAnalysis,
}

impl SourceType {
    pub fn is_channel(self) -> bool {
        matches!(self, SourceType::ChannelRgb | SourceType::ChannelCmy)
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceType::ChannelRgb => "channel_rgb",
            SourceType::ChannelCmy => "channel_cmy",
            SourceType::ColorAnalysis => "color_analysis",
        }
    }
}

/// Read access to the color fields a classifier or projection needs.
pub trait ColorSample {
    fn l_value(&self) -> Real;
    fn a_value(&self) -> Real;
    fn b_value(&self) -> Real;
    fn channels(&self) -> [Real; 3];
    fn sample_type(&self) -> Option<&str>;

    /// Channel records carry no L* value or are tagged as channel samples.
    fn is_channel_sample(&self) -> bool {
        self.l_value() == 0.0
            || self
                .sample_type()
                .is_some_and(|t| t.to_ascii_lowercase().contains("channel"))
    }

    /// Whether projection goes through the channel slots. A non-empty
    /// `sample_type` decides on its own; only untagged records fall back to
    /// the zero-L* rule, so a black color-analysis sample keeps its a*/b*.
    fn uses_channel_path(&self) -> bool {
        match self.sample_type().map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => tag.to_ascii_lowercase().contains("channel"),
            None => self.l_value() == 0.0,
        }
    }
}

/// Which raw fields feed the normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Projection {
    #[default]
    Lab,
    Rgb,
}

/// Classify a batch from its first [`DETECTION_SAMPLE_SIZE`] records.
///
/// Channel records win by strict majority; among channel records CMY wins
/// only when CMY-tagged records outnumber RGB-tagged ones. An empty batch is
/// `ColorAnalysis`.
pub fn detect_source_type<S: ColorSample>(samples: &[S]) -> SourceType {
    let mut channel = 0usize;
    let mut color = 0usize;
    let mut rgb = 0usize;
    let mut cmy = 0usize;

    for sample in samples.iter().take(DETECTION_SAMPLE_SIZE) {
        if sample.is_channel_sample() {
            channel += 1;
            let tag = sample.sample_type().unwrap_or("").to_ascii_lowercase();
            if tag.contains("rgb") {
                rgb += 1;
            } else if tag.contains("cmy") {
                cmy += 1;
            }
        } else {
            color += 1;
        }
    }

    if channel > color {
        if cmy > rgb {
            SourceType::ChannelCmy
        } else {
            SourceType::ChannelRgb
        }
    } else {
        SourceType::ColorAnalysis
    }
}

/// Normalized coordinates for one sample.
///
/// Channel samples always go through the channel path; color-analysis
/// samples use L*a*b* unless RGB projection is requested.
pub fn project_sample<S: ColorSample + ?Sized>(sample: &S, projection: Projection) -> NormalizedCoords {
    if sample.uses_channel_path() || projection == Projection::Rgb {
        let [r, g, b] = sample.channels();
        normalize_rgb(r, g, b)
    } else {
        normalize_lab(sample.l_value(), sample.a_value(), sample.b_value())
    }
}
