//! Deterministic number formatting for report cells.
//!
//! All rounding is round-half-to-even ("banker's rounding"). None of these
//! functions fail: missing input becomes the caller's missing-value text.

/// Format with a fixed number of decimal places.
///
/// `None` and `NaN` render as `missing`. The value is scaled, rounded half to
/// even, scaled back and printed in plain (non-exponent) notation.
///
/// ```
/// use hydro_report_engine::format::format_fixed;
///
/// assert_eq!(format_fixed(Some(1.5), 0, "***"), "2");
/// assert_eq!(format_fixed(Some(2.5), 0, "***"), "2");
/// assert_eq!(format_fixed(None, 2, "***"), "***");
/// ```
pub fn format_fixed(value: Option<f64>, places: usize, missing: &str) -> String {
    let value = match value {
        Some(v) if !v.is_nan() => v,
        _ => return missing.to_string(),
    };
    if value.is_infinite() {
        return value.to_string();
    }

    let scale = 10f64.powi(places as i32);
    let scaled = value * scale;
    let rounded = if scaled.is_finite() {
        scaled.round_ties_even() / scale
    } else {
        value
    };

    format!("{:.*}", places, normalize_zero(rounded))
}

/// Format to `sig_figs` significant figures.
///
/// Zero renders as `"0"`. The number of decimals shown follows the magnitude
/// of the rounding divisor, so `0.012345` at 3 figures is `"0.0123"` and
/// `1234.5` at 3 figures is `"1230"`. Non-finite values render as Rust prints
/// them.
pub fn format_significant_figures(value: f64, sig_figs: u32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    // f64 carries at most 17 significant digits
    let sig_figs = sig_figs.clamp(1, 17) as i32;
    let magnitude = value.abs();
    let exponent = magnitude.log10().floor() as i32;
    let divisor_exponent = exponent - sig_figs + 1;
    let divisor = 10f64.powi(divisor_exponent);
    let rounded = (magnitude / divisor).round_ties_even() * divisor;
    let decimals = (-divisor_exponent).max(0) as usize;

    let text = format!("{:.*}", decimals, rounded);
    // Sign goes on separately so a value that rounds to zero never shows "-0".
    if value < 0.0 && rounded != 0.0 {
        format!("-{text}")
    } else {
        text
    }
}

/// Format a total, choosing decimals by magnitude.
///
/// | `|value|`      | places |
/// |----------------|--------|
/// | > 9999.5       | 0      |
/// | > 999.5        | 1      |
/// | > 99.5         | 2      |
/// | otherwise      | 3      |
pub fn format_sum(value: Option<f64>, missing: &str) -> String {
    let places = match value {
        Some(v) if v.abs() > 9999.5 => 0,
        Some(v) if v.abs() > 999.5 => 1,
        Some(v) if v.abs() > 99.5 => 2,
        _ => 3,
    };
    format_fixed(value, places, missing)
}

/// Collapse `-0.0` to `0.0`.
fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}
