//! Marker and colour names understood by the plotting views.

pub const VALID_MARKERS: &[&str] = &[".", "o", "*", "^", "<", ">", "v", "s", "D", "+", "x"];

pub const VALID_COLORS: &[&str] = &[
    "red", "blue", "green", "orange", "purple", "yellow", "cyan", "magenta", "brown", "pink",
    "lime", "navy", "teal", "gray",
];

pub fn is_known_marker(marker: &str) -> bool {
    VALID_MARKERS.contains(&marker.trim())
}

pub fn is_known_color(color: &str) -> bool {
    let color = color.trim().to_ascii_lowercase();
    VALID_COLORS.contains(&color.as_str())
}
