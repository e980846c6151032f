//! Error types for the hand gesture mouse library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `X11` window system operation failed
    #[error("X11 error: {0}")]
    X11(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Frame geometry is degenerate; the frame is skipped
    #[error("Hand pose unavailable: {0}")]
    PoseUnavailable(String),

    /// Calibration was requested while no hand was visible
    #[error("No hand detected, calibration not committed")]
    NoHandDetected,

    /// Camera failed to open or closed mid-run
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    /// The OS refused to inject an input event
    #[error("Dispatch failure: {0}")]
    DispatchFailure(String),

    /// Pointer filter initialization error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
