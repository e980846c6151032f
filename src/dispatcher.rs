//! Realisation of gesture commands as OS input events.
//!
//! [`ActionCommand`] is the only type crossing from the gesture logic into
//! input injection. On X11 pointer motion is a warp relative to the live
//! cursor position and buttons/wheel ticks go through the XTEST extension.

use crate::{
    constants::{X11_BUTTON_LEFT, X11_BUTTON_RIGHT, X11_BUTTON_WHEEL_DOWN, X11_BUTTON_WHEEL_UP},
    error::{Error, Result},
    geometry::Resolution,
    utils::safe_cast::{f64_to_i16_clamp, f64_to_i32, last_pixel},
};
use log::{debug, info, warn};
use x11rb::{
    connection::Connection,
    protocol::{
        xproto::{ConnectionExt, Screen, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT},
        xtest::ConnectionExt as XtestConnectionExt,
    },
    rust_connection::RustConnection,
};

/// Abstract input command produced by the gesture state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionCommand {
    /// Move the pointer by a screen-space offset
    MoveBy {
        /// Horizontal offset in screen pixels
        dx: f64,
        /// Vertical offset in screen pixels
        dy: f64,
    },
    /// Left button press and release
    Click,
    /// Right button press and release
    RightClick,
    /// One wheel tick up
    ScrollUp,
    /// One wheel tick down
    ScrollDown,
    /// Left button press held for a drag
    DragStart,
    /// Release of a held drag
    DragEnd,
}

impl ActionCommand {
    /// Short name for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MoveBy { .. } => "move-by",
            Self::Click => "click",
            Self::RightClick => "right-click",
            Self::ScrollUp => "scroll-up",
            Self::ScrollDown => "scroll-down",
            Self::DragStart => "drag-start",
            Self::DragEnd => "drag-end",
        }
    }
}

/// Sink for [`ActionCommand`] values
pub trait ActionDispatcher: Send {
    /// Turn one command into input events
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatchFailure`] when the OS refuses the event
    fn dispatch(&mut self, command: ActionCommand) -> Result<()>;

    /// Display size, when the dispatcher knows it
    fn screen_size(&self) -> Option<Resolution> {
        None
    }
}

impl<T: ActionDispatcher + ?Sized> ActionDispatcher for Box<T> {
    fn dispatch(&mut self, command: ActionCommand) -> Result<()> {
        (**self).dispatch(command)
    }

    fn screen_size(&self) -> Option<Resolution> {
        (**self).screen_size()
    }
}

/// Sub-pixel remainder carried between relative moves
#[derive(Debug, Default, Clone, Copy)]
struct Residual {
    x: f64,
    y: f64,
}

impl Residual {
    /// Whole-pixel step for this move, keeping the fraction for the next one
    fn step(&mut self, dx: f64, dy: f64) -> (f64, f64) {
        let total_x = self.x + dx;
        let total_y = self.y + dy;
        let step_x = total_x.trunc();
        let step_y = total_y.trunc();
        self.x = total_x - step_x;
        self.y = total_y - step_y;
        (step_x, step_y)
    }
}

/// Input injection on X11
pub struct X11Dispatcher {
    connection: RustConnection,
    screen: Screen,
    screen_width: u16,
    screen_height: u16,
    xtest: bool,
    residual: Residual,
}

impl X11Dispatcher {
    /// Connect to the X server named by `DISPLAY`
    ///
    /// # Errors
    ///
    /// Returns [`Error::X11`] when the display cannot be reached
    pub fn new() -> Result<Self> {
        info!("Initializing X11 input dispatcher");

        let (connection, screen_num) = RustConnection::connect(None)
            .map_err(|e| Error::X11(format!("Failed to connect to X11: {e}")))?;

        let screen = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::X11("Failed to get screen".to_string()))?
            .clone();

        let xtest = match connection.xtest_get_version(2, 2) {
            Ok(cookie) => cookie.reply().is_ok(),
            Err(_) => false,
        };
        if !xtest {
            warn!("XTEST extension unavailable, clicks and scrolling will fail");
        }

        let screen_width = screen.width_in_pixels;
        let screen_height = screen.height_in_pixels;
        info!("Connected to X11 display, screen: {}x{}", screen_width, screen_height);

        Ok(Self {
            connection,
            screen,
            screen_width,
            screen_height,
            xtest,
            residual: Residual::default(),
        })
    }

    /// Current pointer position
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatchFailure`] if the query fails
    pub fn position(&self) -> Result<(i16, i16)> {
        let reply = self
            .connection
            .query_pointer(self.screen.root)
            .map_err(|e| Error::DispatchFailure(format!("Failed to send query pointer: {e}")))?
            .reply()
            .map_err(|e| Error::DispatchFailure(format!("Failed to query pointer: {e}")))?;

        Ok((reply.root_x, reply.root_y))
    }

    /// Warp the pointer to an absolute position, clamped to the screen
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatchFailure`] if the warp fails
    pub fn set_position(&self, x: i16, y: i16) -> Result<()> {
        let x = x.clamp(0, last_pixel(self.screen_width));
        let y = y.clamp(0, last_pixel(self.screen_height));

        self.connection
            .warp_pointer(x11rb::NONE, self.screen.root, 0, 0, 0, 0, x, y)
            .map_err(|e| Error::DispatchFailure(format!("Failed to warp pointer: {e}")))?;
        self.flush()
    }

    /// Move relative to the live pointer position
    fn move_by(&mut self, dx: f64, dy: f64) -> Result<()> {
        let (step_x, step_y) = self.residual.step(dx, dy);
        if step_x == 0.0 && step_y == 0.0 {
            return Ok(());
        }

        let (x, y) = self.position()?;
        let target_x = f64_to_i32(f64::from(x) + step_x)?;
        let target_y = f64_to_i32(f64::from(y) + step_y)?;
        self.set_position(
            f64_to_i16_clamp(f64::from(target_x), i16::MIN, i16::MAX),
            f64_to_i16_clamp(f64::from(target_y), i16::MIN, i16::MAX),
        )
    }

    fn fake_button(&self, event: u8, button: u8) -> Result<()> {
        if !self.xtest {
            return Err(Error::DispatchFailure("XTEST extension unavailable".to_string()));
        }
        self.connection
            .xtest_fake_input(event, button, x11rb::CURRENT_TIME, self.screen.root, 0, 0, 0)
            .map_err(|e| Error::DispatchFailure(format!("Failed to inject button {button}: {e}")))?;
        Ok(())
    }

    fn press(&self, button: u8) -> Result<()> {
        self.fake_button(BUTTON_PRESS_EVENT, button)?;
        self.flush()
    }

    fn release(&self, button: u8) -> Result<()> {
        self.fake_button(BUTTON_RELEASE_EVENT, button)?;
        self.flush()
    }

    fn click(&self, button: u8) -> Result<()> {
        self.fake_button(BUTTON_PRESS_EVENT, button)?;
        self.fake_button(BUTTON_RELEASE_EVENT, button)?;
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        self.connection
            .flush()
            .map_err(|e| Error::DispatchFailure(format!("Failed to flush connection: {e}")))
    }
}

impl ActionDispatcher for X11Dispatcher {
    fn dispatch(&mut self, command: ActionCommand) -> Result<()> {
        match command {
            ActionCommand::MoveBy { dx, dy } => self.move_by(dx, dy),
            ActionCommand::Click => self.click(X11_BUTTON_LEFT),
            ActionCommand::RightClick => self.click(X11_BUTTON_RIGHT),
            ActionCommand::ScrollUp => self.click(X11_BUTTON_WHEEL_UP),
            ActionCommand::ScrollDown => self.click(X11_BUTTON_WHEEL_DOWN),
            ActionCommand::DragStart => self.press(X11_BUTTON_LEFT),
            ActionCommand::DragEnd => self.release(X11_BUTTON_LEFT),
        }
    }

    fn screen_size(&self) -> Option<Resolution> {
        Some(Resolution::new(
            u32::from(self.screen_width),
            u32::from(self.screen_height),
        ))
    }
}

/// Dispatcher that only logs, for dry runs and headless machines
#[derive(Debug)]
pub struct LogDispatcher {
    screen: Resolution,
    dispatched: u64,
}

impl LogDispatcher {
    /// Create a logging dispatcher reporting the given screen size
    #[must_use]
    pub const fn new(screen: Resolution) -> Self {
        Self { screen, dispatched: 0 }
    }

    /// Number of commands seen so far
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&mut self, command: ActionCommand) -> Result<()> {
        self.dispatched += 1;
        match command {
            ActionCommand::MoveBy { dx, dy } => debug!("[dry-run] move by ({:.1}, {:.1})", dx, dy),
            other => info!("[dry-run] {}", other.as_str()),
        }
        Ok(())
    }

    fn screen_size(&self) -> Option<Resolution> {
        Some(self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residual_carries_fractions() {
        let mut residual = Residual::default();
        assert_eq!(residual.step(0.4, -0.4), (0.0, 0.0));
        assert_eq!(residual.step(0.4, -0.4), (0.0, 0.0));
        let (x, y) = residual.step(0.4, -0.4);
        assert_eq!((x, y), (1.0, -1.0));

        // Over many calls nothing is lost or invented
        let mut residual = Residual::default();
        let mut moved = 0.0;
        for _ in 0..1000 {
            moved += residual.step(0.25, 0.0).0;
        }
        assert_eq!(moved, 250.0);
    }

    #[test]
    fn test_log_dispatcher_counts() {
        let mut dispatcher = LogDispatcher::new(Resolution::new(800, 600));
        dispatcher.dispatch(ActionCommand::Click).unwrap();
        dispatcher.dispatch(ActionCommand::MoveBy { dx: 1.0, dy: 2.0 }).unwrap();
        assert_eq!(dispatcher.dispatched(), 2);
        assert_eq!(dispatcher.screen_size(), Some(Resolution::new(800, 600)));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(ActionCommand::ScrollDown.as_str(), "scroll-down");
        assert_eq!(ActionCommand::MoveBy { dx: 0.0, dy: 0.0 }.as_str(), "move-by");
    }

    #[test]
    #[ignore = "Requires X11 display"]
    fn test_x11_dispatcher_creation() {
        match X11Dispatcher::new() {
            Ok(dispatcher) => assert!(dispatcher.screen_size().is_some()),
            Err(e) => println!("Expected error in headless environment: {e}"),
        }
    }
}
