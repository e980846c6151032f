//! Optional smoothing of the tracked fingertip.
//!
//! Contour-based fingertips jitter by a few pixels from frame to frame.
//! A filter can be applied to the index tip before it reaches the gesture
//! state machine; the default is no filtering, which keeps pointer motion an
//! exact function of the raw fingertip.

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{
    constants::{DEFAULT_EXPONENTIAL_ALPHA, DEFAULT_MOVING_AVERAGE_WINDOW, EXPONENTIAL_ALPHA_MAX, EXPONENTIAL_ALPHA_MIN},
    geometry::Point2D,
    Error, Result,
};

/// Trait for all fingertip filters
pub trait PointFilter: Send {
    /// Apply filter to a new sample
    fn apply(&mut self, point: Point2D) -> Point2D;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes points through unchanged
pub struct NoFilter;

impl PointFilter for NoFilter {
    fn apply(&mut self, point: Point2D) -> Point2D {
        point
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a filter from a spec such as `none`, `exponential:0.3` or `moving_average:4`
///
/// # Errors
///
/// Returns [`Error::FilterError`] for an unknown name or an invalid parameter
pub fn create_filter(spec: &str) -> Result<Box<dyn PointFilter>> {
    let lowered = spec.to_lowercase();
    let (name, param) = match lowered.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (lowered.as_str(), None),
    };

    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "moving_average" | "movingaverage" => {
            let window = match param {
                Some(p) => p
                    .parse::<usize>()
                    .map_err(|e| Error::FilterError(format!("Invalid window size '{p}': {e}")))?,
                None => DEFAULT_MOVING_AVERAGE_WINDOW,
            };
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        "exponential" => {
            let alpha = match param {
                Some(p) => p
                    .parse::<f64>()
                    .map_err(|e| Error::FilterError(format!("Invalid alpha '{p}': {e}")))?,
                None => DEFAULT_EXPONENTIAL_ALPHA,
            };
            if !(alpha > EXPONENTIAL_ALPHA_MIN && alpha <= EXPONENTIAL_ALPHA_MAX) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        assert_eq!(filter.apply(Point2D::new(10.0, 20.0)), Point2D::new(10.0, 20.0));
    }

    #[test]
    fn test_create_filter() {
        assert!(create_filter("none").is_ok());
        assert_eq!(create_filter("exponential:0.3").unwrap().name(), "ExponentialFilter");
        assert_eq!(create_filter("Moving_Average:4").unwrap().name(), "MovingAverageFilter");
        assert!(create_filter("kalman").is_err());
    }

    #[test]
    fn test_create_filter_rejects_bad_parameters() {
        assert!(matches!(create_filter("moving_average:0"), Err(Error::FilterError(msg)) if msg.contains("Window size")));
        assert!(matches!(create_filter("exponential:2.0"), Err(Error::FilterError(msg)) if msg.contains("Alpha")));
        assert!(create_filter("exponential:-0.1").is_err());
        assert!(create_filter("exponential:abc").is_err());
    }
}
