//! Hand gesture mouse library: drive the pointer with a bare hand in front of a webcam.
//!
//! The crate turns webcam frames into mouse input:
//! - `OpenCV` segments the hand by HSV thresholding and finds its contour,
//!   convex hull and convexity defects
//! - the hull gives the index fingertip, a deep defect gives the thumb
//! - a calibration snapshot maps fingertip displacement to screen pixels
//! - a gesture state machine turns thumb and hand visibility into pointer
//!   motion, clicks, right clicks and wheel scrolling
//! - an X11 dispatcher injects the resulting events
//!
//! The processing stages after vision are pure and take explicit
//! timestamps, so they run without a camera or display.
//!
//! # Examples
//!
//! ## Gesture processing without hardware
//!
//! ```
//! use hand_gesture_mouse::{
//!     config::Config,
//!     geometry::{Point2D, Resolution},
//!     session::{CalibrationRequest, GestureSession},
//!     vision::{ConvexityDefect, FrameGeometry},
//! };
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let geometry = FrameGeometry {
//!     contour: vec![
//!         Point2D::new(50.0, 250.0),
//!         Point2D::new(100.0, 100.0),
//!         Point2D::new(150.0, 250.0),
//!         Point2D::new(20.0, 160.0),
//!     ],
//!     hull: vec![0, 1, 2, 3],
//!     defects: vec![ConvexityDefect { start: 3, end: 0, far: 0, depth: 30 * 256 }],
//! };
//! let request = CalibrationRequest {
//!     camera: Resolution::new(640, 480),
//!     screen: Resolution::new(1920, 1080),
//! };
//!
//! let mut session = GestureSession::new(&Config::default(), Instant::now())?;
//! let outcome = session.process_frame(Some(&geometry), Some(request), Instant::now());
//! println!("{} -> {:?}", outcome.state, outcome.commands);
//! # Ok(())
//! # }
//! ```
//!
//! ## Live capture
//!
//! ```no_run
//! use hand_gesture_mouse::{
//!     capture_loop::CaptureLoop,
//!     config::Config,
//!     dispatcher::X11Dispatcher,
//!     vision::{OpencvCamera, OpencvVision},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let camera = OpencvCamera::new(&config.capture);
//! let vision = OpencvVision::new(config.vision.clone());
//! let mut capture = CaptureLoop::new(config, camera, vision, X11Dispatcher::new()?);
//!
//! capture.start()?;
//! capture.request_calibration();
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! capture.stop();
//! # Ok(())
//! # }
//! ```

/// Points, resolutions and scale factors
pub mod geometry;

/// Camera access and hand segmentation
pub mod vision;

/// Fingertip and thumb extraction from hand geometry
pub mod hand_pose;

/// Reference pose capture and camera-to-screen scaling
pub mod calibration;

/// Gesture state machine and click timing
pub mod gesture;

/// Input command injection
pub mod dispatcher;

/// Per-run tracking state
pub mod session;

/// Background capture worker
pub mod capture_loop;

/// Fingertip smoothing filters
pub mod filters;

/// Utility functions for numeric conversions
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
