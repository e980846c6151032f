//! Camera capture and hand segmentation.
//!
//! The tracking core only consumes [`FrameGeometry`]: the largest hand
//! contour, its convex hull (as indices into the contour) and the convexity
//! defects. Producing those is delegated to `OpenCV` through
//! [`OpencvCamera`] and [`OpencvVision`]; the [`FrameSource`] and
//! [`VisionAdapter`] traits are the seams the capture loop is generic over.

use crate::{
    config::{CaptureConfig, ChannelRange, VisionConfig},
    constants::DEFECT_DEPTH_DIVISOR,
    error::{Error, Result},
    geometry::{Point2D, Resolution},
};
use log::{debug, info, warn};
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vec4i, Vector, BORDER_CONSTANT, BORDER_DEFAULT},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};

/// One convexity defect as reported by the vision library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvexityDefect {
    /// Contour index where the defect starts (on the hull)
    pub start: usize,
    /// Contour index where the defect ends (on the hull)
    pub end: usize,
    /// Contour index of the deepest point
    pub far: usize,
    /// Fixed-point depth, see [`DEFECT_DEPTH_DIVISOR`]
    pub depth: i32,
}

impl ConvexityDefect {
    /// Depth in pixels
    #[must_use]
    pub fn depth_px(&self) -> f64 {
        f64::from(self.depth) / DEFECT_DEPTH_DIVISOR
    }
}

/// Raw geometric primitives extracted from one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameGeometry {
    /// Approximated outline of the largest blob
    pub contour: Vec<Point2D>,
    /// Convex hull as indices into `contour`
    pub hull: Vec<usize>,
    /// Convexity defects of `contour` against `hull`
    pub defects: Vec<ConvexityDefect>,
}

/// Source of camera frames
pub trait FrameSource: Send {
    /// Frame type handed to the vision adapter
    type Frame;

    /// Acquire the capture resource
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraUnavailable`] when the device cannot be opened
    fn open(&mut self) -> Result<()>;

    /// Whether the capture resource is currently held
    fn is_opened(&self) -> bool;

    /// Read the next frame; `Ok(None)` when no frame is ready
    ///
    /// # Errors
    ///
    /// Returns an error when the device closed or the read failed
    fn read(&mut self) -> Result<Option<Self::Frame>>;

    /// Frame size reported by the device, once opened
    fn resolution(&self) -> Option<Resolution>;

    /// Release the capture resource. Releasing a closed source is a no-op.
    fn release(&mut self);
}

/// Turns a frame into hand geometry
pub trait VisionAdapter: Send {
    /// Frame type accepted
    type Frame;

    /// Extract the largest contour with its hull and defects, `Ok(None)` when nothing was segmented
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying vision operations fail
    fn analyze(&mut self, frame: &Self::Frame) -> Result<Option<FrameGeometry>>;

    /// Human readable summary of the active segmentation settings
    fn status(&self) -> String {
        String::new()
    }
}

/// Webcam capture through `OpenCV`
pub struct OpencvCamera {
    index: i32,
    requested: Resolution,
    mirror: bool,
    capture: Option<VideoCapture>,
    resolution: Option<Resolution>,
}

impl OpencvCamera {
    /// Create an unopened camera handle
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            index: config.camera_index,
            requested: Resolution::new(config.frame_width, config.frame_height),
            mirror: config.mirror,
            capture: None,
            resolution: None,
        }
    }
}

impl FrameSource for OpencvCamera {
    type Frame = Mat;

    fn open(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Ok(());
        }

        info!("Opening camera {}", self.index);
        let mut cap = VideoCapture::new(self.index, videoio::CAP_ANY)
            .map_err(|e| Error::CameraUnavailable(format!("camera {}: {e}", self.index)))?;
        if !cap.is_opened()? {
            return Err(Error::CameraUnavailable(format!(
                "failed to open the camera connection (index {})",
                self.index
            )));
        }

        // Low latency: keep only the newest frame buffered
        if let Err(e) = cap.set(CAP_PROP_BUFFERSIZE, 1.0) {
            debug!("Camera ignored buffer size hint: {}", e);
        }
        cap.set(CAP_PROP_FRAME_WIDTH, f64::from(self.requested.width))?;
        cap.set(CAP_PROP_FRAME_HEIGHT, f64::from(self.requested.height))?;

        let width = cap.get(CAP_PROP_FRAME_WIDTH)?;
        let height = cap.get(CAP_PROP_FRAME_HEIGHT)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let actual = Resolution::new(width.max(0.0) as u32, height.max(0.0) as u32);
        self.resolution = Some(if actual.is_empty() { self.requested } else { actual });
        info!("Camera {} opened at {}x{}", self.index, actual.width, actual.height);

        self.capture = Some(cap);
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.capture.is_some()
    }

    fn read(&mut self) -> Result<Option<Mat>> {
        let cap = self
            .capture
            .as_mut()
            .ok_or_else(|| Error::CameraUnavailable("camera is not open".to_string()))?;

        if !cap.is_opened()? {
            return Err(Error::CameraUnavailable(format!("camera {} closed", self.index)));
        }

        let mut frame = Mat::default();
        if !cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        if self.mirror {
            let mut flipped = Mat::default();
            core::flip(&frame, &mut flipped, 1)?;
            frame = flipped;
        }
        Ok(Some(frame))
    }

    fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.capture.take() {
            info!("Releasing camera {}", self.index);
            if let Err(e) = cap.release() {
                warn!("Error while releasing camera {}: {}", self.index, e);
            }
        }
    }
}

impl Drop for OpencvCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// HSV segmentation and contour analysis through `OpenCV`
pub struct OpencvVision {
    config: VisionConfig,
}

impl OpencvVision {
    /// Create an adapter with the given segmentation settings
    #[must_use]
    pub const fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    /// Blur, convert to HSV and keep pixels inside the configured ranges
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` call fails
    pub fn segment(
        &self,
        frame: &Mat,
        hue: ChannelRange,
        saturation: ChannelRange,
        value: ChannelRange,
    ) -> Result<Mat> {
        let mut blurred = Mat::default();
        let ksize = self.config.blur_size.max(1);
        imgproc::blur(frame, &mut blurred, Size::new(ksize, ksize), Point::new(-1, -1), BORDER_DEFAULT)?;

        let mut hsv = Mat::default();
        imgproc::cvt_color(&blurred, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

        let lower = Scalar::new(hue.min, saturation.min, value.min, 0.0);
        let upper = Scalar::new(hue.max, saturation.max, value.max, 0.0);
        let mut mask = Mat::default();
        core::in_range(&hsv, &lower, &upper, &mut mask)?;
        Ok(mask)
    }

    /// Erode with the small kernel, then dilate with the large one
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` call fails
    pub fn morphology(&self, mask: &Mat, erode_iterations: i32, dilate_iterations: i32) -> Result<Mat> {
        let anchor = Point::new(-1, -1);
        let border = imgproc::morphology_default_border_value()?;
        let erode_kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(self.config.erode_kernel, self.config.erode_kernel),
            anchor,
        )?;
        let dilate_kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(self.config.dilate_kernel, self.config.dilate_kernel),
            anchor,
        )?;

        let mut eroded = Mat::default();
        imgproc::erode(mask, &mut eroded, &erode_kernel, anchor, erode_iterations.max(1), BORDER_CONSTANT, border)?;
        let mut dilated = Mat::default();
        imgproc::dilate(&eroded, &mut dilated, &dilate_kernel, anchor, dilate_iterations.max(1), BORDER_CONSTANT, border)?;
        Ok(dilated)
    }

    /// Largest outer contour by bounding-box area, polygon-approximated
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` call fails
    pub fn largest_contour(&self, mask: &Mat) -> Result<Option<Vector<Point>>> {
        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut largest: Option<(i32, Vector<Point>)> = None;
        for contour in contours {
            let area = imgproc::bounding_rect(&contour)?.area();
            if area > 0 && largest.as_ref().map_or(true, |(best, _)| area > *best) {
                largest = Some((area, contour));
            }
        }

        let Some((_, contour)) = largest else {
            return Ok(None);
        };

        let epsilon = self.config.contour_approx_factor * imgproc::arc_length(&contour, false)?;
        let mut approx = Vector::<Point>::new();
        imgproc::approx_poly_dp(&contour, &mut approx, epsilon, true)?;
        Ok(Some(approx))
    }

    /// Convex hull as contour indices
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` call fails
    pub fn convex_hull(&self, contour: &Vector<Point>) -> Result<Vector<i32>> {
        let mut hull = Vector::<i32>::new();
        imgproc::convex_hull(contour, &mut hull, false, false)?;
        Ok(hull)
    }

    /// Convexity defects of a contour against its hull
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` call fails
    pub fn convexity_defects(&self, contour: &Vector<Point>, hull: &Vector<i32>) -> Result<Vec<ConvexityDefect>> {
        // The library rejects hulls that cannot have any defect
        if hull.len() < 3 || contour.len() <= 3 {
            return Ok(Vec::new());
        }

        let mut raw = Vector::<Vec4i>::new();
        imgproc::convexity_defects(contour, hull, &mut raw)?;
        raw.iter()
            .map(|d| {
                Ok(ConvexityDefect {
                    start: to_index(d[0])?,
                    end: to_index(d[1])?,
                    far: to_index(d[2])?,
                    depth: d[3],
                })
            })
            .collect()
    }
}

fn to_index(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidInput(format!("negative contour index {value}")))
}

impl VisionAdapter for OpencvVision {
    type Frame = Mat;

    fn analyze(&mut self, frame: &Mat) -> Result<Option<FrameGeometry>> {
        let mask = self.segment(frame, self.config.hue, self.config.saturation, self.config.value)?;
        let cleaned = self.morphology(&mask, self.config.erode_iterations, self.config.dilate_iterations)?;

        let Some(contour) = self.largest_contour(&cleaned)? else {
            return Ok(None);
        };
        let hull = self.convex_hull(&contour)?;
        let defects = self.convexity_defects(&contour, &hull)?;

        Ok(Some(FrameGeometry {
            contour: contour
                .iter()
                .map(|p| Point2D::new(f64::from(p.x), f64::from(p.y)))
                .collect(),
            hull: hull.iter().map(to_index).collect::<Result<_>>()?,
            defects,
        }))
    }

    fn status(&self) -> String {
        self.config.hsv_summary()
    }
}
