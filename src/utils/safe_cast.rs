//! Safe casting utilities for screen-space coordinates

use crate::{Error, Result};

/// Safely convert f64 to i32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Clamp and convert f64 to i16 for X11 pointer coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i16_clamp(value: f64, min: i16, max: i16) -> i16 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    value.clamp(f64::from(min), f64::from(max)) as i16
}

/// Largest valid pixel coordinate along an axis of `extent` pixels
#[must_use]
pub fn last_pixel(extent: u16) -> i16 {
    i16::try_from(extent.saturating_sub(1)).unwrap_or(i16::MAX)
}
