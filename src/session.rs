//! One tracking session: calibration, gesture state and fingertip smoothing.
//!
//! A [`GestureSession`] is created when capture starts, fed one frame per
//! tick, and disposed when capture stops. All mutable tracking state lives
//! here and is owned by the capture worker.

use crate::{
    calibration::{CalibrationReference, Calibrator},
    config::Config,
    dispatcher::ActionCommand,
    error::{Error, Result},
    filters::{create_filter, PointFilter},
    gesture::{ClickThresholds, GestureState, GestureStateMachine},
    geometry::Resolution,
    hand_pose::{HandPose, HandPoseExtractor},
    vision::FrameGeometry,
};
use log::{debug, info, trace, warn};
use std::time::Instant;

/// Result of a calibration request
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// New reference in effect
    Committed(CalibrationReference),
    /// Request refused; the previous reference is unchanged
    Rejected(String),
}

/// Everything one frame produced
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    /// State after this frame
    pub state: GestureState,
    /// Pose, if one could be extracted
    pub pose: Option<HandPose>,
    /// Commands to dispatch, in order
    pub commands: Vec<ActionCommand>,
    /// Set when a calibration request was handled this frame
    pub calibration: Option<CalibrationOutcome>,
}

/// Camera and screen sizes for a calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRequest {
    /// Camera frame size
    pub camera: Resolution,
    /// Screen size
    pub screen: Resolution,
}

/// Tracking state for one capture run
pub struct GestureSession {
    extractor: HandPoseExtractor,
    calibrator: Calibrator,
    machine: GestureStateMachine,
    filter: Box<dyn PointFilter>,
    frames: u64,
}

impl GestureSession {
    /// Create a session from configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the pointer filter spec is invalid
    pub fn new(config: &Config, now: Instant) -> Result<Self> {
        Ok(Self::from_parts(
            HandPoseExtractor::from_config(&config.hand),
            ClickThresholds::from_config(&config.gesture),
            create_filter(&config.pointer.filter)?,
            now,
        ))
    }

    /// Create a session from its components
    #[must_use]
    pub fn from_parts(
        extractor: HandPoseExtractor,
        thresholds: ClickThresholds,
        filter: Box<dyn PointFilter>,
        now: Instant,
    ) -> Self {
        debug!("Gesture session created with {} pointer filter", filter.name());
        Self {
            extractor,
            calibrator: Calibrator::new(),
            machine: GestureStateMachine::new(thresholds, now),
            filter,
            frames: 0,
        }
    }

    /// Extract a pose, treating any extraction failure as "no pose"
    fn extract(&mut self, geometry: Option<&FrameGeometry>) -> Option<HandPose> {
        let geometry = geometry?;
        match self.extractor.extract(geometry) {
            Ok(mut pose) => {
                // Smoothing restarts when the hand comes back
                if self.machine.state() == GestureState::Scroll {
                    self.filter.reset();
                }
                pose.index_tip = self.filter.apply(pose.index_tip);
                Some(pose)
            }
            Err(Error::PoseUnavailable(reason)) => {
                trace!("Frame {}: pose unavailable ({})", self.frames, reason);
                None
            }
            Err(e) => {
                warn!("Frame {}: pose extraction failed: {}", self.frames, e);
                None
            }
        }
    }

    /// Calibrate against `pose`. On failure the previous reference stays in effect.
    ///
    /// Returns the commands needed to release any held drag.
    ///
    /// # Errors
    ///
    /// [`Error::NoHandDetected`] when `pose` is `None`
    pub fn calibrate(
        &mut self,
        pose: Option<&HandPose>,
        request: CalibrationRequest,
    ) -> Result<(CalibrationReference, Vec<ActionCommand>)> {
        let reference = self.calibrator.recalibrate(pose, request.camera, request.screen)?;
        // Forget positions from before the new origin
        self.filter.reset();
        self.filter.apply(reference.index_origin);
        Ok((reference, self.machine.reset().into_iter().collect()))
    }

    /// Process one frame. `calibration` carries a pending calibration request,
    /// applied to this frame's pose before classification.
    pub fn process_frame(
        &mut self,
        geometry: Option<&FrameGeometry>,
        calibration: Option<CalibrationRequest>,
        now: Instant,
    ) -> FrameOutcome {
        self.frames += 1;
        if calibration.is_some() {
            self.filter.reset();
        }
        let pose = self.extract(geometry);
        let mut commands = Vec::new();

        let calibration = calibration.map(|request| match self.calibrate(pose.as_ref(), request) {
            Ok((reference, release)) => {
                commands.extend(release);
                CalibrationOutcome::Committed(reference)
            }
            Err(e) => {
                warn!("Calibration rejected: {}", e);
                CalibrationOutcome::Rejected(e.to_string())
            }
        });

        commands.extend(self.machine.update(pose.as_ref(), self.calibrator.reference(), now));
        for command in &commands {
            trace!("Frame {}: {:?}", self.frames, command);
        }

        FrameOutcome {
            state: self.machine.state(),
            pose,
            commands,
            calibration,
        }
    }

    /// Current gesture state
    #[must_use]
    pub const fn state(&self) -> GestureState {
        self.machine.state()
    }

    /// Current calibration, if any
    #[must_use]
    pub fn calibration(&self) -> Option<&CalibrationReference> {
        self.calibrator.reference()
    }

    /// Frames processed so far
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// End the session, returning commands that release held input
    #[must_use]
    pub fn dispose(mut self) -> Vec<ActionCommand> {
        info!("Gesture session ended after {} frames", self.frames);
        self.machine.reset().into_iter().collect()
    }
}
