//! Gesture classification and click/drag debouncing.
//!
//! Each frame is classified from visibility alone:
//!
//! | Frame                                   | State        |
//! |-----------------------------------------|--------------|
//! | not calibrated                          | Calibration  |
//! | calibrated, no pose                     | Scroll       |
//! | calibrated, thumb retracted             | ClickOrDrag  |
//! | calibrated, thumb extended              | Pointer      |
//!
//! A retracted thumb starts a [`ClickTimer`]; when the thumb comes back the
//! hold duration is turned into a click, a right click, or nothing.

use crate::{
    calibration::CalibrationReference,
    config::GestureConfig,
    dispatcher::ActionCommand,
    geometry::Point2D,
    hand_pose::HandPose,
};
use log::debug;
use std::fmt;
use std::time::{Duration, Instant};

/// Active gesture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    /// Waiting for a calibration reference
    Calibration,
    /// Hand not visible; wheel ticks every frame
    Scroll,
    /// Fingertip drives the pointer
    Pointer,
    /// Thumb retracted; measuring the hold
    ClickOrDrag,
}

impl GestureState {
    /// String representation for logs and status text
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calibration => "calibration",
            Self::Scroll => "scroll",
            Self::Pointer => "pointer",
            Self::ClickOrDrag => "click-or-drag",
        }
    }
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hold timer for one click-or-drag episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTimer {
    /// Monotonic instant the thumb was first seen retracted
    pub press_start: Instant,
    /// Whether a press is pending
    pub press_active: bool,
}

impl ClickTimer {
    /// Start timing at `now`
    #[must_use]
    pub const fn start(now: Instant) -> Self {
        Self {
            press_start: now,
            press_active: true,
        }
    }

    /// Hold duration so far
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.press_start)
    }
}

/// Hold duration boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickThresholds {
    /// Holds at or below this are ignored
    pub click_min: Duration,
    /// Holds above this are right clicks
    pub click_max: Duration,
    /// Holds above this start a drag; `None` disables dragging
    pub drag: Option<Duration>,
}

impl ClickThresholds {
    /// Thresholds from configuration
    #[must_use]
    pub const fn from_config(config: &GestureConfig) -> Self {
        Self {
            click_min: Duration::from_millis(config.click_min_ms),
            click_max: Duration::from_millis(config.click_max_ms),
            drag: match config.drag_threshold_ms {
                Some(ms) => Some(Duration::from_millis(ms)),
                None => None,
            },
        }
    }
}

impl Default for ClickThresholds {
    fn default() -> Self {
        Self::from_config(&GestureConfig::default())
    }
}

/// Classify a completed hold
#[must_use]
pub fn classify_hold(elapsed: Duration, thresholds: &ClickThresholds) -> Option<ActionCommand> {
    if elapsed > thresholds.click_max {
        Some(ActionCommand::RightClick)
    } else if elapsed > thresholds.click_min {
        Some(ActionCommand::Click)
    } else {
        None
    }
}

/// Per-frame gesture classifier
#[derive(Debug)]
pub struct GestureStateMachine {
    thresholds: ClickThresholds,
    state: GestureState,
    entered_at: Instant,
    timer: Option<ClickTimer>,
    dragging: bool,
    last_index: Option<Point2D>,
    scroll_direction: Option<ActionCommand>,
}

impl GestureStateMachine {
    /// Create a machine in the `Calibration` state
    #[must_use]
    pub fn new(thresholds: ClickThresholds, now: Instant) -> Self {
        Self {
            thresholds,
            state: GestureState::Calibration,
            entered_at: now,
            timer: None,
            dragging: false,
            last_index: None,
            scroll_direction: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> GestureState {
        self.state
    }

    /// Instant of the last state change
    #[must_use]
    pub const fn last_transition(&self) -> Instant {
        self.entered_at
    }

    /// Pending hold timer, if any
    #[must_use]
    pub const fn timer(&self) -> Option<&ClickTimer> {
        self.timer.as_ref()
    }

    /// Whether a drag is in progress
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Forget per-episode state, e.g. after recalibration.
    /// Returns `DragEnd` when a drag was held so the button is not left pressed.
    pub fn reset(&mut self) -> Option<ActionCommand> {
        self.last_index = None;
        self.scroll_direction = None;
        self.abandon_hold()
    }

    /// Drop a pending hold without classifying it, releasing a held drag
    fn abandon_hold(&mut self) -> Option<ActionCommand> {
        self.timer = None;
        std::mem::take(&mut self.dragging).then_some(ActionCommand::DragEnd)
    }

    /// Classify one frame and return the commands it produces
    pub fn update(
        &mut self,
        pose: Option<&HandPose>,
        calibration: Option<&CalibrationReference>,
        now: Instant,
    ) -> Vec<ActionCommand> {
        let mut commands = Vec::new();

        let Some(reference) = calibration.filter(|r| r.calibrated) else {
            commands.extend(self.reset());
            self.transition(GestureState::Calibration, now);
            return commands;
        };

        match pose {
            None => {
                // A hold survives a single missing frame, not a scroll episode
                if self.state == GestureState::Scroll && self.timer.is_some() {
                    debug!("Hand lost during hold, discarding it");
                    commands.extend(self.abandon_hold());
                }
                // Direction is fixed when the episode starts
                if self.state != GestureState::Scroll || self.scroll_direction.is_none() {
                    let last_y = self.last_index.unwrap_or(reference.index_origin).y;
                    self.scroll_direction = Some(if last_y > reference.index_origin.y {
                        ActionCommand::ScrollDown
                    } else {
                        ActionCommand::ScrollUp
                    });
                }
                self.transition(GestureState::Scroll, now);
                commands.extend(self.scroll_direction);
            }
            Some(pose) if !pose.thumb_extended => {
                self.transition(GestureState::ClickOrDrag, now);
                self.last_index = Some(pose.index_tip);
                let timer = *self.timer.get_or_insert_with(|| ClickTimer::start(now));

                if self.dragging {
                    commands.push(move_by(reference, pose.index_tip));
                } else if let Some(drag) = self.thresholds.drag {
                    if timer.elapsed(now) > drag {
                        debug!("Hold exceeded {:?}, starting drag", drag);
                        self.dragging = true;
                        commands.push(ActionCommand::DragStart);
                    }
                }
            }
            Some(pose) => {
                self.transition(GestureState::Pointer, now);
                self.last_index = Some(pose.index_tip);

                if let Some(timer) = self.timer.take() {
                    if std::mem::take(&mut self.dragging) {
                        commands.push(ActionCommand::DragEnd);
                    } else {
                        let held = timer.elapsed(now);
                        let action = classify_hold(held, &self.thresholds);
                        debug!("Hold released after {:?}: {:?}", held, action);
                        commands.extend(action);
                    }
                }
                commands.push(move_by(reference, pose.index_tip));
            }
        }

        commands
    }

    fn transition(&mut self, next: GestureState, now: Instant) {
        if self.state != next {
            debug!("Gesture state {} -> {}", self.state, next);
            if self.state == GestureState::Scroll {
                self.scroll_direction = None;
            }
            self.state = next;
            self.entered_at = now;
        }
    }
}

fn move_by(reference: &CalibrationReference, index_tip: Point2D) -> ActionCommand {
    let displacement = reference.displacement(index_tip);
    ActionCommand::MoveBy {
        dx: displacement.x,
        dy: displacement.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Resolution, Scale};

    fn reference() -> CalibrationReference {
        CalibrationReference {
            index_origin: Point2D::new(100.0, 100.0),
            thumb_origin: None,
            camera_resolution: Resolution::new(640, 480),
            screen_resolution: Resolution::new(1280, 720),
            scale: Scale::new(2.0, 1.5),
            calibrated: true,
        }
    }

    fn pose(x: f64, y: f64, thumb_extended: bool) -> HandPose {
        HandPose {
            index_tip: Point2D::new(x, y),
            thumb_tip: thumb_extended.then(|| Point2D::new(x - 40.0, y + 60.0)),
            thumb_extended,
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Hold the thumb retracted for `held`, then release it
    fn hold_and_release(held: Duration) -> Vec<ActionCommand> {
        let t0 = Instant::now();
        let reference = reference();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 100.0, true)), Some(&reference), t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0);
        assert_eq!(machine.state(), GestureState::ClickOrDrag);
        machine.update(Some(&pose(100.0, 100.0, true)), Some(&reference), t0 + held)
    }

    #[test]
    fn test_classify_hold_boundaries() {
        let thresholds = ClickThresholds::default();
        assert_eq!(classify_hold(ms(150), &thresholds), None);
        assert_eq!(classify_hold(ms(200), &thresholds), None);
        assert_eq!(classify_hold(ms(201), &thresholds), Some(ActionCommand::Click));
        assert_eq!(classify_hold(ms(500), &thresholds), Some(ActionCommand::Click));
        assert_eq!(classify_hold(ms(2000), &thresholds), Some(ActionCommand::Click));
        assert_eq!(classify_hold(ms(2001), &thresholds), Some(ActionCommand::RightClick));
        assert_eq!(classify_hold(ms(2500), &thresholds), Some(ActionCommand::RightClick));
    }

    #[test]
    fn test_uncalibrated_stays_in_calibration() {
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        let commands = machine.update(Some(&pose(1.0, 1.0, true)), None, t0);
        assert!(commands.is_empty());
        assert_eq!(machine.state(), GestureState::Calibration);

        let mut stale = reference();
        stale.calibrated = false;
        assert!(machine.update(None, Some(&stale), t0).is_empty());
        assert_eq!(machine.state(), GestureState::Calibration);
    }

    #[test]
    fn test_pointer_moves_by_scaled_displacement() {
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        let commands = machine.update(Some(&pose(110.0, 90.0, true)), Some(&reference()), t0);
        assert_eq!(machine.state(), GestureState::Pointer);
        assert_eq!(commands, vec![ActionCommand::MoveBy { dx: 20.0, dy: -15.0 }]);

        // Continuous: the same displacement is emitted again next frame
        let again = machine.update(Some(&pose(110.0, 90.0, true)), Some(&reference()), t0 + ms(33));
        assert_eq!(again, commands);
    }

    #[test]
    fn test_hold_durations() {
        assert_eq!(hold_and_release(ms(150)), vec![ActionCommand::MoveBy { dx: 0.0, dy: 0.0 }]);
        assert_eq!(
            hold_and_release(ms(500)),
            vec![ActionCommand::Click, ActionCommand::MoveBy { dx: 0.0, dy: 0.0 }]
        );
        assert_eq!(
            hold_and_release(ms(2500))[0],
            ActionCommand::RightClick
        );
        assert_eq!(hold_and_release(ms(200)).len(), 1);
        assert_eq!(hold_and_release(ms(2001))[0], ActionCommand::RightClick);
    }

    #[test]
    fn test_hold_phase_emits_nothing_and_timer_clears() {
        let t0 = Instant::now();
        let reference = reference();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        for i in 0..10 {
            let commands = machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0 + ms(i * 33));
            assert!(commands.is_empty());
        }
        assert_eq!(machine.timer().map(|t| t.press_start), Some(t0));
        machine.update(Some(&pose(100.0, 100.0, true)), Some(&reference), t0 + ms(400));
        assert!(machine.timer().is_none());
    }

    #[test]
    fn test_scroll_direction() {
        let t0 = Instant::now();
        let reference = reference();

        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 80.0, true)), Some(&reference), t0);
        assert_eq!(machine.update(None, Some(&reference), t0), vec![ActionCommand::ScrollUp]);
        assert_eq!(machine.state(), GestureState::Scroll);

        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 120.0, true)), Some(&reference), t0);
        assert_eq!(machine.update(None, Some(&reference), t0), vec![ActionCommand::ScrollDown]);
    }

    #[test]
    fn test_scroll_repeats_every_frame() {
        let t0 = Instant::now();
        let reference = reference();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 150.0, true)), Some(&reference), t0);

        for i in 1..=100 {
            let commands = machine.update(None, Some(&reference), t0 + ms(i * 33));
            assert_eq!(commands, vec![ActionCommand::ScrollDown]);
            assert_eq!(machine.state(), GestureState::Scroll);
        }
        assert_eq!(machine.last_transition(), t0 + ms(33));
    }

    #[test]
    fn test_scroll_without_history_uses_origin() {
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        assert_eq!(machine.update(None, Some(&reference()), t0), vec![ActionCommand::ScrollUp]);
    }

    #[test]
    fn test_hold_survives_single_missing_frame() {
        let reference = reference();
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0);
        machine.update(None, Some(&reference), t0 + Duration::from_millis(100));
        assert!(machine.timer().is_some());

        let commands = machine.update(Some(&pose(100.0, 100.0, true)), Some(&reference), t0 + Duration::from_millis(400));
        assert_eq!(commands[0], ActionCommand::Click);
    }

    #[test]
    fn test_scroll_episode_discards_hold() {
        let reference = reference();
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(ClickThresholds::default(), t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0);

        for frame in 1..=150u64 {
            let now = t0 + Duration::from_millis(100 + frame * 33);
            assert_eq!(machine.update(None, Some(&reference), now), vec![ActionCommand::ScrollUp]);
        }
        assert!(machine.timer().is_none());

        let back = t0 + Duration::from_millis(100 + 151 * 33);
        let commands = machine.update(Some(&pose(100.0, 100.0, true)), Some(&reference), back);
        assert_eq!(commands, vec![ActionCommand::MoveBy { dx: 0.0, dy: 0.0 }]);
    }

    #[test]
    fn test_scroll_episode_releases_drag() {
        let reference = reference();
        let thresholds = ClickThresholds {
            drag: Some(Duration::from_millis(3000)),
            ..ClickThresholds::default()
        };
        let t0 = Instant::now();
        let mut machine = GestureStateMachine::new(thresholds, t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0 + Duration::from_millis(3100));
        assert!(machine.is_dragging());

        machine.update(None, Some(&reference), t0 + Duration::from_millis(3133));
        let commands = machine.update(None, Some(&reference), t0 + Duration::from_millis(3166));
        assert_eq!(commands, vec![ActionCommand::DragEnd, ActionCommand::ScrollUp]);
        assert!(!machine.is_dragging());
    }

    #[test]
    fn test_drag_disabled_by_default() {
        let commands = hold_and_release(ms(10_000));
        assert_eq!(commands[0], ActionCommand::RightClick);
    }

    #[test]
    fn test_drag_extension() {
        let t0 = Instant::now();
        let reference = reference();
        let thresholds = ClickThresholds {
            drag: Some(ms(3000)),
            ..ClickThresholds::default()
        };
        let mut machine = GestureStateMachine::new(thresholds, t0);

        assert!(machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0).is_empty());
        assert!(machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0 + ms(3000)).is_empty());
        assert_eq!(
            machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference), t0 + ms(3001)),
            vec![ActionCommand::DragStart]
        );
        assert!(machine.is_dragging());
        assert_eq!(
            machine.update(Some(&pose(105.0, 100.0, false)), Some(&reference), t0 + ms(3034)),
            vec![ActionCommand::MoveBy { dx: 10.0, dy: 0.0 }]
        );
        assert_eq!(
            machine.update(Some(&pose(105.0, 100.0, true)), Some(&reference), t0 + ms(3067)),
            vec![ActionCommand::DragEnd, ActionCommand::MoveBy { dx: 10.0, dy: 0.0 }]
        );
        assert!(!machine.is_dragging());
    }

    #[test]
    fn test_reset_releases_drag() {
        let t0 = Instant::now();
        let thresholds = ClickThresholds {
            drag: Some(ms(100)),
            ..ClickThresholds::default()
        };
        let mut machine = GestureStateMachine::new(thresholds, t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference()), t0);
        machine.update(Some(&pose(100.0, 100.0, false)), Some(&reference()), t0 + ms(150));
        assert!(machine.is_dragging());
        assert_eq!(machine.reset(), Some(ActionCommand::DragEnd));
        assert_eq!(machine.reset(), None);
    }
}
