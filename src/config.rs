//! Configuration management for the hand gesture mouse

use crate::{
    constants::{
        CHANNEL_MAX, DEFAULT_BLUR_SIZE, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_CLICK_MAX_MS,
        DEFAULT_CLICK_MIN_MS, DEFAULT_CONTOUR_APPROX_FACTOR, DEFAULT_DILATE_KERNEL, DEFAULT_ERODE_KERNEL,
        DEFAULT_FRAME_INTERVAL_MS, DEFAULT_MIN_FINGER_DEPTH, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH,
        DEFAULT_SKIN_HUE, DEFAULT_SKIN_SATURATION, DEFAULT_SKIN_VALUE, DEFAULT_STOP_TIMEOUT_MS, HUE_MAX,
    },
    filters::create_filter,
    geometry::Resolution,
    hand_pose::ThumbSelection,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera and loop cadence
    pub capture: CaptureConfig,

    /// Hand segmentation
    pub vision: VisionConfig,

    /// Fingertip and thumb extraction
    pub hand: HandConfig,

    /// Click and drag timing
    pub gesture: GestureConfig,

    /// Fallback screen size
    pub screen: ScreenConfig,

    /// Fingertip smoothing
    pub pointer: PointerConfig,
}

/// Camera and capture loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Webcam index
    pub camera_index: i32,

    /// Tick period in milliseconds
    pub frame_interval_ms: u64,

    /// Requested frame width
    pub frame_width: u32,

    /// Requested frame height
    pub frame_height: u32,

    /// Upper bound on waiting for an in-flight tick when stopping
    pub stop_timeout_ms: u64,

    /// Flip frames horizontally
    pub mirror: bool,
}

/// Inclusive range of one HSV channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl ChannelRange {
    /// Create a range
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// HSV thresholds and morphology
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Hue range (0-180)
    pub hue: ChannelRange,

    /// Saturation range (0-255)
    pub saturation: ChannelRange,

    /// Value range (0-255)
    pub value: ChannelRange,

    /// Box blur kernel size
    pub blur_size: i32,

    /// Erosion passes with the small kernel
    pub erode_iterations: i32,

    /// Dilation passes with the large kernel
    pub dilate_iterations: i32,

    /// Erosion kernel size
    pub erode_kernel: i32,

    /// Dilation kernel size
    pub dilate_kernel: i32,

    /// Polygon approximation tolerance relative to the contour length
    pub contour_approx_factor: f64,
}

/// Pose extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    /// Minimum defect depth (pixels) for an extended thumb
    pub min_finger_depth: f64,

    /// Tie-break when several defects qualify
    pub thumb_selection: ThumbSelection,
}

/// Click and drag timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Holds at or below this are ignored
    pub click_min_ms: u64,

    /// Holds above this become right clicks
    pub click_max_ms: u64,

    /// Holds above this start a drag; absent disables dragging
    pub drag_threshold_ms: Option<u64>,
}

/// Screen size used when the dispatcher cannot report one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

/// Fingertip smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// Filter spec, see [`crate::filters::create_filter`]
    pub filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            frame_width: DEFAULT_CAMERA_WIDTH,
            frame_height: DEFAULT_CAMERA_HEIGHT,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            mirror: false,
        }
    }
}

impl CaptureConfig {
    /// Tick period
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Stop wait bound
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            hue: ChannelRange::new(DEFAULT_SKIN_HUE.0, DEFAULT_SKIN_HUE.1),
            saturation: ChannelRange::new(DEFAULT_SKIN_SATURATION.0, DEFAULT_SKIN_SATURATION.1),
            value: ChannelRange::new(DEFAULT_SKIN_VALUE.0, DEFAULT_SKIN_VALUE.1),
            blur_size: DEFAULT_BLUR_SIZE,
            erode_iterations: 1,
            dilate_iterations: 1,
            erode_kernel: DEFAULT_ERODE_KERNEL,
            dilate_kernel: DEFAULT_DILATE_KERNEL,
            contour_approx_factor: DEFAULT_CONTOUR_APPROX_FACTOR,
        }
    }
}

impl VisionConfig {
    /// Status line describing the active ranges
    #[must_use]
    pub fn hsv_summary(&self) -> String {
        format!(
            "Hue range: {}-{}\tSaturation range: {}-{}\tValue range: {}-{}",
            self.hue.min, self.hue.max, self.saturation.min, self.saturation.max, self.value.min, self.value.max
        )
    }
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            min_finger_depth: DEFAULT_MIN_FINGER_DEPTH,
            thumb_selection: ThumbSelection::LastWins,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            click_min_ms: DEFAULT_CLICK_MIN_MS,
            click_max_ms: DEFAULT_CLICK_MAX_MS,
            drag_threshold_ms: None,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SCREEN_WIDTH,
            height: DEFAULT_SCREEN_HEIGHT,
        }
    }
}

impl ScreenConfig {
    /// As a resolution
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            filter: "none".to_string(),
        }
    }
}

fn check_range(name: &str, range: ChannelRange, max: f64) -> Result<()> {
    if range.min < 0.0 || range.max > max || range.min > range.max {
        return Err(Error::ConfigError(format!(
            "{name} range must satisfy 0 <= min <= max <= {max}, got {}-{}",
            range.min, range.max
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        // Capture
        if self.capture.frame_interval_ms == 0 {
            return Err(Error::ConfigError("Frame interval must be greater than 0".to_string()));
        }
        if self.capture.frame_width == 0 || self.capture.frame_height == 0 {
            return Err(Error::ConfigError("Camera frame size must be non-zero".to_string()));
        }

        // Segmentation
        check_range("Hue", self.vision.hue, HUE_MAX)?;
        check_range("Saturation", self.vision.saturation, CHANNEL_MAX)?;
        check_range("Value", self.vision.value, CHANNEL_MAX)?;
        if self.vision.blur_size <= 0 || self.vision.erode_kernel <= 0 || self.vision.dilate_kernel <= 0 {
            return Err(Error::ConfigError("Blur and morphology kernel sizes must be positive".to_string()));
        }
        if self.vision.erode_iterations < 1 || self.vision.dilate_iterations < 1 {
            return Err(Error::ConfigError("Erode and dilate iterations must be at least 1".to_string()));
        }
        if !(self.vision.contour_approx_factor > 0.0 && self.vision.contour_approx_factor < 1.0) {
            return Err(Error::ConfigError("Contour approximation factor must be in (0, 1)".to_string()));
        }

        // Hand
        if !self.hand.min_finger_depth.is_finite() || self.hand.min_finger_depth < 0.0 {
            return Err(Error::ConfigError("Minimum finger depth must be a non-negative number".to_string()));
        }

        // Gesture timing
        if self.gesture.click_min_ms >= self.gesture.click_max_ms {
            return Err(Error::ConfigError(format!(
                "click_min_ms ({}) must be below click_max_ms ({})",
                self.gesture.click_min_ms, self.gesture.click_max_ms
            )));
        }
        if let Some(drag) = self.gesture.drag_threshold_ms {
            if drag <= self.gesture.click_max_ms {
                return Err(Error::ConfigError(format!(
                    "drag_threshold_ms ({drag}) must exceed click_max_ms ({})",
                    self.gesture.click_max_ms
                )));
            }
        }

        // Screen
        if self.screen.resolution().is_empty() {
            return Err(Error::ConfigError("Screen size must be non-zero".to_string()));
        }

        // Pointer filter
        create_filter(&self.pointer.filter)?;

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Hand Gesture Mouse Configuration

# Camera and loop cadence
capture:
  camera_index: 0
  frame_interval_ms: 33      # ~30 Hz
  frame_width: 640
  frame_height: 480
  stop_timeout_ms: 500
  mirror: false

# Skin segmentation (OpenCV HSV: hue 0-180, saturation/value 0-255).
# Tune these to your skin and lighting; full ranges select the whole frame.
vision:
  hue: { min: 0.0, max: 20.0 }
  saturation: { min: 20.0, max: 255.0 }
  value: { min: 70.0, max: 255.0 }
  blur_size: 20
  erode_iterations: 1
  dilate_iterations: 1
  erode_kernel: 12
  dilate_kernel: 24
  contour_approx_factor: 0.1

# Fingertip and thumb extraction
hand:
  min_finger_depth: 10.0
  thumb_selection: last_wins  # or max_depth

# Click timing (milliseconds)
gesture:
  click_min_ms: 200
  click_max_ms: 2000
  # drag_threshold_ms: 3000   # uncomment to enable drag

# Used when the display size cannot be queried
screen:
  width: 1920
  height: 1080

# Fingertip smoothing: none, exponential[:alpha], moving_average[:window]
pointer:
  filter: "none"
"#;
