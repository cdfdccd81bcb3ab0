//! The fixed 13-column normalized row layout.

use core::fmt;

pub const COLUMN_COUNT: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Xnorm,
    Ynorm,
    Znorm,
    DataId,
    Cluster,
    DeltaE,
    Marker,
    Color,
    CentroidX,
    CentroidY,
    CentroidZ,
    Sphere,
    Radius,
}

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Xnorm,
        Column::Ynorm,
        Column::Znorm,
        Column::DataId,
        Column::Cluster,
        Column::DeltaE,
        Column::Marker,
        Column::Color,
        Column::CentroidX,
        Column::CentroidY,
        Column::CentroidZ,
        Column::Sphere,
        Column::Radius,
    ];

    pub const COORDS: [Column; 3] = [Column::Xnorm, Column::Ynorm, Column::Znorm];
    pub const CENTROID: [Column; 3] = [Column::CentroidX, Column::CentroidY, Column::CentroidZ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Header text as written to sheets and files.
    pub fn name(self) -> &'static str {
        match self {
            Column::Xnorm => "Xnorm",
            Column::Ynorm => "Ynorm",
            Column::Znorm => "Znorm",
            Column::DataId => "DataID",
            Column::Cluster => "Cluster",
            Column::DeltaE => "DeltaE",
            Column::Marker => "Marker",
            Column::Color => "Color",
            Column::CentroidX => "Centroid_X",
            Column::CentroidY => "Centroid_Y",
            Column::CentroidZ => "Centroid_Z",
            Column::Sphere => "Sphere",
            Column::Radius => "Radius",
        }
    }

    /// Column with this header name, ignoring case.
    pub fn from_name(name: &str) -> Option<Column> {
        let name = name.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Names a foreign file may use for this column, matched case-insensitively
    /// in order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Xnorm => &["Xnorm", "X_norm", "X", "L*", "L_star", "Lightness"],
            Column::Ynorm => &["Ynorm", "Y_norm", "Y", "a*", "a_star", "a"],
            Column::Znorm => &["Znorm", "Z_norm", "Z", "b*", "b_star", "b"],
            Column::DataId => &["DataID", "Data_ID", "ID", "Sample_ID", "SampleID", "Name"],
            Column::Cluster => &["Cluster", "Group", "Class", "Category"],
            Column::DeltaE => &["DeltaE", "Delta_E", "∆E", "ΔE", "dE"],
            Column::Marker => &["Marker", "Symbol", "Shape"],
            Column::Color => &["Color", "Colour"],
            Column::CentroidX => &["Centroid_X", "CentroidX", "Cent_X"],
            Column::CentroidY => &["Centroid_Y", "CentroidY", "Cent_Y"],
            Column::CentroidZ => &["Centroid_Z", "CentroidZ", "Cent_Z"],
            Column::Sphere => &["Sphere", "Highlight", "Selection"],
            Column::Radius => &["Radius", "Sphere_Radius"],
        }
    }

    /// Exact header match, as used for header-row detection. The delta-E
    /// column is also recognised by its symbol spellings.
    pub fn matches_header(self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            Column::DeltaE => matches!(cell, "DeltaE" | "∆E" | "ΔE"),
            other => cell == other.name(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header names in column order.
pub fn column_names() -> [&'static str; COLUMN_COUNT] {
    Column::ALL.map(Column::name)
}

/// Map foreign header cells onto the fixed columns.
///
/// Returns, per column, the index of the source column feeding it.
/// `overrides` (target column, source header) take precedence over aliases.
pub fn map_columns(
    headers: &[String],
    overrides: &[(Column, String)],
) -> [Option<usize>; COLUMN_COUNT] {
    let find = |wanted: &str| {
        let wanted = wanted.trim().to_lowercase();
        headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    };

    let mut mapping = [None; COLUMN_COUNT];
    for column in Column::ALL {
        let explicit = overrides
            .iter()
            .filter(|(target, _)| *target == column)
            .find_map(|(_, source)| find(source.as_str()));
        mapping[column.index()] = explicit.or_else(|| column.aliases().iter().find_map(|a| find(*a)));
    }
    mapping
}
