//! Sample-set name standardisation.

use core::fmt;

use crate::error::{CoreError, CoreResult};

/// Standardize a name to underscore-separated `[A-Za-z0-9_]` form.
///
/// `"My Sample Set"` becomes `"My_Sample_Set"`, `"F-137"` becomes `"F_137"`.
pub fn standardize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_underscore = false;
    for c in name.trim().chars() {
        let mapped = if c.is_ascii_alphanumeric() { c } else { '_' };
        if mapped == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

/// Identity of a sample set: its standardized name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SampleSetName(String);

impl SampleSetName {
    pub fn new(raw: &str) -> CoreResult<Self> {
        let standardized = standardize_name(raw);
        if standardized.is_empty() {
            return Err(CoreError::InvalidIdentity {
                what: format!("sample set name '{}' is empty after standardisation", raw),
            });
        }
        Ok(Self(standardized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
