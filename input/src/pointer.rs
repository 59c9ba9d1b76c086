use perch_geometry::{Point, Vector};

use crate::DeviceId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    Pressed,
}

/// Relative motion, a delta in layout-space units.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerMotion {
    pub device: DeviceId,
    pub time_msec: u32,
    pub delta: Vector,
}

/// Absolute motion. Both coordinates are normalized to `0..=1` over the output layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerMotionAbsolute {
    pub device: DeviceId,
    pub time_msec: u32,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerButton {
    pub device: DeviceId,
    pub time_msec: u32,
    /// Linux input event code, e.g. `BTN_LEFT`.
    pub button: u32,
    pub state: ButtonState,
}

pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AxisOrientation {
    Vertical,
    Horizontal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AxisSource {
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerAxis {
    pub device: DeviceId,
    pub time_msec: u32,
    pub orientation: AxisOrientation,
    pub delta: f64,
    pub delta_discrete: i32,
    pub source: AxisSource,
}
