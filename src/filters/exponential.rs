use super::PointFilter;
use crate::geometry::Point2D;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<Point2D>,
}

impl ExponentialFilter {
    /// `alpha` must be in (0, 1]; validated by [`super::create_filter`]
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self { alpha, last: None }
    }
}

impl PointFilter for ExponentialFilter {
    fn apply(&mut self, point: Point2D) -> Point2D {
        let filtered = match self.last {
            Some(last) => Point2D::new(
                self.alpha * point.x + (1.0 - self.alpha) * last.x,
                self.alpha * point.y + (1.0 - self.alpha) * last.y,
            ),
            None => point,
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_filter() {
        let mut filter = ExponentialFilter::new(0.5);

        // First value passes through
        assert_eq!(filter.apply(Point2D::new(10.0, 20.0)), Point2D::new(10.0, 20.0));

        // Second value is smoothed
        assert_eq!(filter.apply(Point2D::new(20.0, 30.0)), Point2D::new(15.0, 25.0));

        filter.reset();
        assert_eq!(filter.apply(Point2D::new(20.0, 30.0)), Point2D::new(20.0, 30.0));
    }

    #[test]
    fn test_alpha_bounds() {
        // High alpha = less smoothing
        let mut filter = ExponentialFilter::new(0.9);
        filter.apply(Point2D::new(10.0, 0.0));
        let p = filter.apply(Point2D::new(20.0, 0.0));
        assert!((p.x - 19.0).abs() < 0.001);

        // Low alpha = more smoothing
        let mut filter = ExponentialFilter::new(0.1);
        filter.apply(Point2D::new(10.0, 0.0));
        let p = filter.apply(Point2D::new(20.0, 0.0));
        assert!((p.x - 11.0).abs() < 0.001);
    }
}
