//! The collaborators the session core drives.
//!
//! The core owns no hardware, protocol or rendering state. Everything it does ends up as a call
//! on one of the traits in here, and everything it reacts to arrives as a
//! [`BackendEvent`](crate::BackendEvent).
use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use perch_geometry::{Point, Rect, Vector};
use perch_input::{
    AxisOrientation, AxisSource, ButtonState, DeviceId, KeyEvent, Keymap, KeymapCompiler,
    Modifiers, RepeatInfo,
};
use perch_scene::{OutputId, Scene, SurfaceId};

/// A display mode of an output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct Mode {
    pub width: i32,
    pub height: i32,
    /// mHz.
    pub refresh: i32,
    #[serde(default)]
    pub preferred: bool,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.refresh / 1000)
    }
}

/// The backend's preferred mode, otherwise the first one it lists.
pub fn select_mode(modes: &[Mode]) -> Option<Mode> {
    modes
        .iter()
        .find(|mode| mode.preferred)
        .or_else(|| modes.first())
        .copied()
}

/// Hardware access: outputs, their layout, and per-device keyboard state.
pub trait Backend {
    /// Prepare the output for rendering with the compositor's renderer and allocator.
    fn init_output_render(&mut self, output: OutputId) -> Result<()>;

    fn output_modes(&self, output: OutputId) -> Vec<Mode>;

    /// Whether the output can only be enabled with an explicitly committed mode.
    fn output_requires_mode(&self, output: OutputId) -> bool;

    /// Enable the output with `mode` and commit.
    fn commit_output_mode(&mut self, output: OutputId, mode: Mode) -> Result<()>;

    /// Place the output in the layout, right of the outputs already in it. Returns the area it
    /// covers in layout coordinates.
    fn add_output_to_layout(&mut self, output: OutputId) -> Rect;

    fn remove_output_from_layout(&mut self, output: OutputId);

    fn set_repeat_info(&mut self, device: DeviceId, repeat: RepeatInfo);

    fn set_keymap(&mut self, device: DeviceId, keymap: &Keymap) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub pointer: bool,
    pub keyboard: bool,
}

/// The seat: routes focus and input to clients.
///
/// The seat owns the current pointer and keyboard focus. Positions passed in are surface-local.
pub trait Seat {
    fn name(&self) -> &str;

    fn set_capabilities(&mut self, capabilities: Capabilities);

    fn pointer_notify_enter(&mut self, surface: SurfaceId, local: Point);
    fn pointer_notify_motion(&mut self, time_msec: u32, local: Point);
    fn pointer_notify_button(&mut self, time_msec: u32, button: u32, state: ButtonState);
    fn pointer_notify_axis(
        &mut self,
        time_msec: u32,
        orientation: AxisOrientation,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    );
    fn pointer_notify_frame(&mut self);
    fn pointer_clear_focus(&mut self);
    fn pointer_focus(&self) -> Option<SurfaceId>;

    /// Make `device` the keyboard whose keymap and state clients see.
    fn set_keyboard(&mut self, device: Option<DeviceId>);
    fn keyboard(&self) -> Option<DeviceId>;

    /// Move keyboard focus to `surface`. `pressed` are the keycodes currently held down.
    fn keyboard_notify_enter(&mut self, surface: SurfaceId, pressed: &[u32]);
    fn keyboard_focus(&self) -> Option<SurfaceId>;
    fn keyboard_notify_key(&mut self, event: &KeyEvent);
    fn keyboard_notify_modifiers(&mut self, modifiers: Modifiers);
}

/// The pointer position in layout coordinates and its image.
pub trait Cursor {
    fn position(&self) -> Point;

    /// Let the cursor follow a pointer device.
    fn attach_device(&mut self, device: DeviceId);

    /// Move by `delta`, constrained to the output layout.
    fn move_by(&mut self, device: DeviceId, delta: Vector);

    /// Warp to a position given in 0..1 of the output layout's extents.
    fn warp_absolute(&mut self, device: DeviceId, normalized: Point);

    /// Show the image `name` of the loaded cursor theme.
    fn set_image(&mut self, name: &str);
}

/// The xdg-shell protocol and the other protocol globals clients need.
pub trait Shell {
    /// Create the compositor, subcompositor, and data device manager globals.
    fn create_interfaces(&mut self) -> Result<()>;

    fn is_toplevel(&self, surface: SurfaceId) -> bool;

    fn set_activated(&mut self, surface: SurfaceId, activated: bool);

    fn set_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool);
}

/// The source of frame presentation timestamps.
pub trait FrameClock {
    fn now(&self) -> Result<Duration>;
}

/// The system's monotonic clock.
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl FrameClock for MonotonicClock {
    fn now(&self) -> Result<Duration> {
        let now = nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)
            .context("clock_gettime(CLOCK_MONOTONIC)")?;
        Ok(Duration::new(now.tv_sec() as u64, now.tv_nsec() as u32))
    }
}

/// Everything a [`Server`](crate::Server) needs, created in dependency order by a platform
/// implementation.
pub struct Platform {
    pub backend: Box<dyn Backend>,
    pub scene: Box<dyn Scene>,
    pub shell: Box<dyn Shell>,
    pub seat: Box<dyn Seat>,
    pub cursor: Box<dyn Cursor>,
    pub keymaps: Box<dyn KeymapCompiler>,
    pub clock: Box<dyn FrameClock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: i32, preferred: bool) -> Mode {
        Mode {
            width,
            height: 600,
            refresh: 59_940,
            preferred,
        }
    }

    #[test]
    fn preferred_mode_wins() {
        let modes = [mode(800, false), mode(1024, true), mode(1280, false)];
        assert_eq!(select_mode(&modes), Some(mode(1024, true)));
    }

    #[test]
    fn first_mode_without_preference() {
        let modes = [mode(800, false), mode(1024, false)];
        assert_eq!(select_mode(&modes), Some(mode(800, false)));
        assert_eq!(select_mode(&[]), None);
    }

    #[test]
    fn mode_display_rounds_refresh_down_to_hz() {
        assert_eq!(mode(800, false).to_string(), "800x600@59");
    }

    #[test]
    fn monotonic_clock_advances() {
        let clock = MonotonicClock;
        let first = clock.now().unwrap();
        let second = clock.now().unwrap();
        assert!(second >= first);
    }
}
