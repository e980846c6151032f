//! Calibration reference capture.
//!
//! A calibration freezes the current fingertip (and thumb, when extended)
//! as the zero point for pointer motion and fixes the camera-to-screen scale.

use crate::{
    error::{Error, Result},
    geometry::{Point2D, Resolution, Scale},
    hand_pose::HandPose,
};
use log::info;

/// Zero point and scale used for all motion until the next calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReference {
    /// Fingertip position at calibration time
    pub index_origin: Point2D,
    /// Thumb position at calibration time, if it was extended
    pub thumb_origin: Option<Point2D>,
    /// Camera frame size
    pub camera_resolution: Resolution,
    /// Screen size
    pub screen_resolution: Resolution,
    /// `screen_resolution / camera_resolution`
    pub scale: Scale,
    /// Whether the reference may be used
    pub calibrated: bool,
}

impl CalibrationReference {
    /// Screen-space displacement of `index_tip` from the origin
    #[must_use]
    pub fn displacement(&self, index_tip: Point2D) -> Point2D {
        (index_tip - self.index_origin) * self.scale
    }
}

/// Owner of the current calibration reference
#[derive(Debug, Default)]
pub struct Calibrator {
    reference: Option<CalibrationReference>,
}

impl Calibrator {
    /// Create an uncalibrated calibrator
    #[must_use]
    pub const fn new() -> Self {
        Self { reference: None }
    }

    /// Build a reference from the current pose
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandDetected`] when no pose is available and
    /// [`Error::InvalidInput`] for an empty resolution.
    pub fn calibrate(
        pose: Option<&HandPose>,
        camera_resolution: Resolution,
        screen_resolution: Resolution,
    ) -> Result<CalibrationReference> {
        let pose = pose.ok_or(Error::NoHandDetected)?;
        if screen_resolution.is_empty() {
            return Err(Error::InvalidInput(format!(
                "screen resolution {}x{} is empty",
                screen_resolution.width, screen_resolution.height
            )));
        }
        let scale = Scale::between(camera_resolution, screen_resolution).ok_or_else(|| {
            Error::InvalidInput(format!(
                "camera resolution {}x{} is empty",
                camera_resolution.width, camera_resolution.height
            ))
        })?;

        Ok(CalibrationReference {
            index_origin: pose.index_tip,
            thumb_origin: if pose.thumb_extended { pose.thumb_tip } else { None },
            camera_resolution,
            screen_resolution,
            scale,
            calibrated: true,
        })
    }

    /// Calibrate and commit, overwriting any previous reference.
    /// On error the previous reference is left untouched.
    ///
    /// # Errors
    ///
    /// See [`Calibrator::calibrate`]
    pub fn recalibrate(
        &mut self,
        pose: Option<&HandPose>,
        camera_resolution: Resolution,
        screen_resolution: Resolution,
    ) -> Result<CalibrationReference> {
        let reference = Self::calibrate(pose, camera_resolution, screen_resolution)?;
        info!(
            "Calibrated at ({:.1}, {:.1}), scale {:.3}x{:.3}",
            reference.index_origin.x, reference.index_origin.y, reference.scale.sx, reference.scale.sy
        );
        self.reference = Some(reference);
        Ok(reference)
    }

    /// Current reference, only while calibrated
    #[must_use]
    pub fn reference(&self) -> Option<&CalibrationReference> {
        self.reference.as_ref().filter(|r| r.calibrated)
    }

    /// Whether a valid reference exists
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.reference().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERA: Resolution = Resolution::new(640, 480);
    const SCREEN: Resolution = Resolution::new(1280, 720);

    fn pose(x: f64, y: f64, thumb: Option<Point2D>) -> HandPose {
        HandPose {
            index_tip: Point2D::new(x, y),
            thumb_tip: thumb,
            thumb_extended: thumb.is_some(),
        }
    }

    #[test]
    fn test_calibrate_freezes_origin_and_scale() {
        let mut calibrator = Calibrator::new();
        assert!(!calibrator.is_calibrated());

        let thumb = Point2D::new(50.0, 150.0);
        let reference = calibrator
            .recalibrate(Some(&pose(100.0, 100.0, Some(thumb))), CAMERA, SCREEN)
            .unwrap();
        assert_eq!(reference.index_origin, Point2D::new(100.0, 100.0));
        assert_eq!(reference.thumb_origin, Some(thumb));
        assert_eq!(reference.scale, Scale::new(2.0, 1.5));
        assert!(calibrator.is_calibrated());
    }

    #[test]
    fn test_retracted_thumb_is_not_frozen() {
        let retracted = HandPose {
            index_tip: Point2D::new(1.0, 2.0),
            thumb_tip: Some(Point2D::new(3.0, 4.0)),
            thumb_extended: false,
        };
        let reference = Calibrator::calibrate(Some(&retracted), CAMERA, SCREEN).unwrap();
        assert!(reference.thumb_origin.is_none());
    }

    #[test]
    fn test_no_hand_keeps_previous_reference() {
        let mut calibrator = Calibrator::new();
        let before = calibrator.recalibrate(Some(&pose(10.0, 20.0, None)), CAMERA, SCREEN).unwrap();

        let result = calibrator.recalibrate(None, CAMERA, SCREEN);
        assert!(matches!(result, Err(Error::NoHandDetected)));
        assert_eq!(calibrator.reference(), Some(&before));
    }

    #[test]
    fn test_recalibration_overwrites() {
        let mut calibrator = Calibrator::new();
        calibrator.recalibrate(Some(&pose(10.0, 20.0, None)), CAMERA, SCREEN).unwrap();
        calibrator.recalibrate(Some(&pose(30.0, 40.0, None)), CAMERA, SCREEN).unwrap();
        assert_eq!(calibrator.reference().unwrap().index_origin, Point2D::new(30.0, 40.0));
    }

    #[test]
    fn test_empty_resolution_rejected() {
        let result = Calibrator::calibrate(Some(&pose(1.0, 1.0, None)), Resolution::new(0, 0), SCREEN);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_displacement() {
        let reference = CalibrationReference {
            index_origin: Point2D::new(100.0, 100.0),
            thumb_origin: None,
            camera_resolution: CAMERA,
            screen_resolution: SCREEN,
            scale: Scale::new(2.0, 1.5),
            calibrated: true,
        };
        assert_eq!(reference.displacement(Point2D::new(110.0, 90.0)), Point2D::new(20.0, -15.0));
    }
}
