//! Fingertip and thumb localisation from hull and defect geometry.

use crate::{
    config::HandConfig,
    constants::MIN_HULL_POINTS,
    error::{Error, Result},
    geometry::{is_collinear, Point2D},
    vision::FrameGeometry,
};
use serde::{Deserialize, Serialize};

/// Per-frame hand pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    /// Topmost hull vertex
    pub index_tip: Point2D,
    /// Start point of the selected deep defect, if any
    pub thumb_tip: Option<Point2D>,
    /// True iff at least one defect is deeper than the finger threshold
    pub thumb_extended: bool,
}

/// How the thumb is chosen when several defects qualify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbSelection {
    /// Last qualifying defect in scan order wins
    #[default]
    LastWins,
    /// Deepest qualifying defect wins; ties keep the earlier one
    MaxDepth,
}

/// Stateless extractor of [`HandPose`] values
#[derive(Debug, Clone)]
pub struct HandPoseExtractor {
    min_finger_depth: f64,
    selection: ThumbSelection,
}

impl HandPoseExtractor {
    /// Create an extractor
    #[must_use]
    pub const fn new(min_finger_depth: f64, selection: ThumbSelection) -> Self {
        Self {
            min_finger_depth,
            selection,
        }
    }

    /// Create an extractor from configuration
    #[must_use]
    pub const fn from_config(config: &HandConfig) -> Self {
        Self::new(config.min_finger_depth, config.thumb_selection)
    }

    /// Extract the pose for one frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoseUnavailable`] when the hull has fewer than three
    /// vertices, the contour collapsed to a line, or an index is out of range.
    pub fn extract(&self, geometry: &FrameGeometry) -> Result<HandPose> {
        if geometry.hull.len() < MIN_HULL_POINTS {
            return Err(Error::PoseUnavailable(format!(
                "convex hull has {} points",
                geometry.hull.len()
            )));
        }
        if is_collinear(&geometry.contour) {
            return Err(Error::PoseUnavailable("contour collapsed to a line".to_string()));
        }

        let index_tip = Self::topmost_hull_point(geometry)?;

        let mut thumb: Option<(Point2D, f64)> = None;
        for defect in &geometry.defects {
            let depth = defect.depth_px();
            if depth <= self.min_finger_depth {
                continue;
            }
            let start = contour_point(&geometry.contour, defect.start)?;
            thumb = match (self.selection, thumb) {
                (ThumbSelection::MaxDepth, Some((best, best_depth))) if best_depth >= depth => {
                    Some((best, best_depth))
                }
                _ => Some((start, depth)),
            };
        }

        Ok(HandPose {
            index_tip,
            thumb_tip: thumb.map(|(point, _)| point),
            thumb_extended: thumb.is_some(),
        })
    }

    /// Hull vertex with the smallest Y; the first in hull order wins ties
    fn topmost_hull_point(geometry: &FrameGeometry) -> Result<Point2D> {
        let mut topmost: Option<Point2D> = None;
        for &index in &geometry.hull {
            let point = contour_point(&geometry.contour, index)?;
            if topmost.map_or(true, |best| point.y < best.y) {
                topmost = Some(point);
            }
        }
        topmost.ok_or_else(|| Error::PoseUnavailable("empty hull".to_string()))
    }
}

fn contour_point(contour: &[Point2D], index: usize) -> Result<Point2D> {
    contour.get(index).copied().ok_or_else(|| {
        Error::PoseUnavailable(format!(
            "index {index} outside contour of {} points",
            contour.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ConvexityDefect;

    fn defect(start: usize, depth_px: i32) -> ConvexityDefect {
        ConvexityDefect {
            start,
            end: start + 1,
            far: start + 1,
            depth: depth_px * 256,
        }
    }

    fn hand(defects: Vec<ConvexityDefect>) -> FrameGeometry {
        FrameGeometry {
            contour: vec![
                Point2D::new(100.0, 200.0),
                Point2D::new(120.0, 40.0),
                Point2D::new(140.0, 150.0),
                Point2D::new(180.0, 100.0),
                Point2D::new(200.0, 200.0),
                Point2D::new(60.0, 120.0),
            ],
            hull: vec![0, 1, 3, 4, 5],
            defects,
        }
    }

    #[test]
    fn test_index_tip_is_topmost() {
        let extractor = HandPoseExtractor::new(10.0, ThumbSelection::LastWins);
        let pose = extractor.extract(&hand(Vec::new())).unwrap();
        assert_eq!(pose.index_tip, Point2D::new(120.0, 40.0));
        assert!(!pose.thumb_extended);
        assert!(pose.thumb_tip.is_none());
    }

    #[test]
    fn test_topmost_tie_keeps_first_in_hull_order() {
        let mut geometry = hand(Vec::new());
        geometry.contour[3] = Point2D::new(180.0, 40.0);
        geometry.hull = vec![3, 0, 1, 4];
        let pose = HandPoseExtractor::new(10.0, ThumbSelection::LastWins)
            .extract(&geometry)
            .unwrap();
        assert_eq!(pose.index_tip, Point2D::new(180.0, 40.0));
    }

    #[test]
    fn test_shallow_defects_do_not_extend_thumb() {
        let extractor = HandPoseExtractor::new(10.0, ThumbSelection::LastWins);
        let pose = extractor.extract(&hand(vec![defect(0, 5), defect(3, 10)])).unwrap();
        assert!(!pose.thumb_extended);
    }

    #[test]
    fn test_last_qualifying_defect_wins() {
        let extractor = HandPoseExtractor::new(10.0, ThumbSelection::LastWins);
        let pose = extractor
            .extract(&hand(vec![defect(5, 40), defect(3, 12), defect(0, 2)]))
            .unwrap();
        assert!(pose.thumb_extended);
        assert_eq!(pose.thumb_tip, Some(Point2D::new(180.0, 100.0)));
    }

    #[test]
    fn test_max_depth_selection() {
        let extractor = HandPoseExtractor::new(10.0, ThumbSelection::MaxDepth);
        let pose = extractor
            .extract(&hand(vec![defect(5, 40), defect(3, 12), defect(4, 40)]))
            .unwrap();
        assert_eq!(pose.thumb_tip, Some(Point2D::new(60.0, 120.0)));
    }

    #[test]
    fn test_degenerate_hull_is_unavailable() {
        let mut geometry = hand(Vec::new());
        geometry.hull.truncate(2);
        let result = HandPoseExtractor::new(10.0, ThumbSelection::LastWins).extract(&geometry);
        assert!(matches!(result, Err(Error::PoseUnavailable(_))));
    }

    #[test]
    fn test_collinear_contour_is_unavailable() {
        let geometry = FrameGeometry {
            contour: vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(10.0, 10.0),
                Point2D::new(20.0, 20.0),
            ],
            hull: vec![0, 1, 2],
            defects: Vec::new(),
        };
        let result = HandPoseExtractor::new(10.0, ThumbSelection::LastWins).extract(&geometry);
        assert!(matches!(result, Err(Error::PoseUnavailable(_))));
    }

    #[test]
    fn test_out_of_range_index_is_unavailable() {
        let mut geometry = hand(Vec::new());
        geometry.hull.push(42);
        let result = HandPoseExtractor::new(10.0, ThumbSelection::LastWins).extract(&geometry);
        assert!(matches!(result, Err(Error::PoseUnavailable(_))));
    }
}
