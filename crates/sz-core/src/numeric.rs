use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Tolerance used when comparing a stored raw value with one re-derived
    /// from a normalized coordinate.
    pub const ROUND_TRIP: Tolerances = Tolerances {
        abs: 1e-4,
        rel: 0.0,
    };
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Clip into `[0, 1]`. NaN maps to 0.
#[inline]
pub fn clamp01(v: Real) -> Real {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Parse a spreadsheet cell as a float. Blank cells are `Ok(None)`.
pub fn parse_optional_real(cell: &str) -> Result<Option<Real>, String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "None" {
        return Ok(None);
    }
    let v = trimmed
        .parse::<Real>()
        .map_err(|_| format!("'{trimmed}' is not a number"))?;
    ensure_finite(v, "cell").map(Some).map_err(|e| e.to_string())
}

/// Parse a spreadsheet cell as an integer, accepting float spellings such as `"3.0"`.
pub fn parse_optional_int(cell: &str) -> Result<Option<i64>, String> {
    let Some(v) = parse_optional_real(cell)? else {
        return Ok(None);
    };
    if v.fract() != 0.0 {
        return Err(format!("'{}' is not an integer", cell.trim()));
    }
    Ok(Some(v as i64))
}
