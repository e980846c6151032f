//! Plain geometric value types shared by the tracking pipeline.
//!
//! All points are camera-pixel coordinates until they are mapped to screen
//! space through a [`Scale`].

use serde::{Deserialize, Serialize};
use std::ops::{Mul, Sub};

/// A point in camera-pixel coordinates (Y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point2D {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<Scale> for Point2D {
    type Output = Self;

    fn mul(self, rhs: Scale) -> Self {
        Self::new(self.x * rhs.sx, self.y * rhs.sy)
    }
}

/// Width and height of a camera frame or a screen, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Componentwise camera-to-screen scale factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    /// Horizontal factor
    pub sx: f64,
    /// Vertical factor
    pub sy: f64,
}

impl Scale {
    /// Create a scale from explicit factors
    #[must_use]
    pub const fn new(sx: f64, sy: f64) -> Self {
        Self { sx, sy }
    }

    /// `screen / camera`, componentwise. Returns `None` for an empty camera resolution.
    #[must_use]
    pub fn between(camera: Resolution, screen: Resolution) -> Option<Self> {
        if camera.is_empty() {
            return None;
        }
        Some(Self {
            sx: f64::from(screen.width) / f64::from(camera.width),
            sy: f64::from(screen.height) / f64::from(camera.height),
        })
    }
}

/// True when every point lies on a single line (or there are fewer than three points)
#[must_use]
pub fn is_collinear(points: &[Point2D]) -> bool {
    let Some((first, rest)) = points.split_first() else {
        return true;
    };
    let Some(second) = rest.iter().find(|p| *p != first) else {
        return true;
    };
    let direction = *second - *first;
    rest.iter().all(|p| {
        let offset = *p - *first;
        (direction.x * offset.y - direction.y * offset.x).abs() < crate::constants::EPSILON
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_between() {
        let scale = Scale::between(Resolution::new(640, 480), Resolution::new(1920, 1080)).unwrap();
        assert_eq!(scale.sx, 3.0);
        assert_eq!(scale.sy, 2.25);
        assert!(Scale::between(Resolution::new(0, 480), Resolution::new(1920, 1080)).is_none());
    }

    #[test]
    fn test_displacement_scaling() {
        let moved = (Point2D::new(110.0, 90.0) - Point2D::new(100.0, 100.0)) * Scale::new(2.0, 1.5);
        assert_eq!(moved, Point2D::new(20.0, -15.0));
    }

    #[test]
    fn test_collinear() {
        let line = [Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0), Point2D::new(5.0, 5.0)];
        assert!(is_collinear(&line));

        let triangle = [Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0), Point2D::new(5.0, 8.0)];
        assert!(!is_collinear(&triangle));

        let repeated = [Point2D::new(3.0, 3.0); 4];
        assert!(is_collinear(&repeated));
        assert!(is_collinear(&[]));
    }
}
