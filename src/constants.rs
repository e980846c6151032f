//! Constants used throughout the application

/// Nominal capture period in milliseconds (about 30 Hz)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// Hold durations at or below this are treated as bounce
pub const DEFAULT_CLICK_MIN_MS: u64 = 200;

/// Hold durations above this become a right click
pub const DEFAULT_CLICK_MAX_MS: u64 = 2000;

/// Minimum convexity defect depth (pixels) for a thumb candidate
pub const DEFAULT_MIN_FINGER_DEPTH: f64 = 10.0;

/// OpenCV stores defect depth as fixed point with 8 fractional bits
pub const DEFECT_DEPTH_DIVISOR: f64 = 256.0;

/// Minimum number of hull vertices for a usable hand outline
pub const MIN_HULL_POINTS: usize = 3;

/// Default requested camera resolution
pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;

/// Fallback screen resolution when the display cannot be queried
pub const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1080;

/// Segmentation defaults (OpenCV HSV: H in 0-180, S and V in 0-255)
pub const HUE_MAX: f64 = 180.0;
pub const CHANNEL_MAX: f64 = 255.0;

/// Default skin-tone window; full ranges would select the whole frame
pub const DEFAULT_SKIN_HUE: (f64, f64) = (0.0, 20.0);
pub const DEFAULT_SKIN_SATURATION: (f64, f64) = (20.0, 255.0);
pub const DEFAULT_SKIN_VALUE: (f64, f64) = (70.0, 255.0);
pub const DEFAULT_BLUR_SIZE: i32 = 20;
pub const DEFAULT_ERODE_KERNEL: i32 = 12;
pub const DEFAULT_DILATE_KERNEL: i32 = 24;
pub const DEFAULT_CONTOUR_APPROX_FACTOR: f64 = 0.1;

/// Upper bound on waiting for the worker to finish its in-flight tick
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 500;

/// Pending calibration outcomes kept for the UI context
pub const CALIBRATION_EVENT_CAPACITY: usize = 8;

/// Consecutive failed or empty reads after which the camera counts as lost
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 30;

/// Pending camera faults kept for the UI context
pub const CAMERA_FAULT_CAPACITY: usize = 1;

/// Default window size for the moving average pointer filter
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;

/// Default exponential pointer filter parameter
pub const DEFAULT_EXPONENTIAL_ALPHA: f64 = 0.5;

/// Exponential filter bounds
pub const EXPONENTIAL_ALPHA_MIN: f64 = 0.0;
pub const EXPONENTIAL_ALPHA_MAX: f64 = 1.0;

/// X11 core button numbers
pub const X11_BUTTON_LEFT: u8 = 1;
pub const X11_BUTTON_RIGHT: u8 = 3;
pub const X11_BUTTON_WHEEL_UP: u8 = 4;
pub const X11_BUTTON_WHEEL_DOWN: u8 = 5;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
