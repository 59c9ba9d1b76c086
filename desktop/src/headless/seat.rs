use std::{cell::RefCell, rc::Rc};

use perch_geometry::Point;
use perch_input::{AxisOrientation, AxisSource, ButtonState, DeviceId, KeyEvent, Modifiers};
use perch_scene::SurfaceId;

use crate::{Capabilities, Seat};

/// What the compositor asked the seat to deliver, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SeatRequest {
    Capabilities(Capabilities),
    PointerEnter {
        surface: SurfaceId,
        local: Point,
    },
    PointerMotion {
        time_msec: u32,
        local: Point,
    },
    PointerButton {
        time_msec: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis {
        time_msec: u32,
        orientation: AxisOrientation,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    },
    PointerFrame,
    PointerClearFocus,
    SetKeyboard(Option<DeviceId>),
    KeyboardEnter {
        surface: SurfaceId,
        pressed: Vec<u32>,
    },
    Key(KeyEvent),
    Modifiers(Modifiers),
}

/// A seat without clients. Records every request and keeps the focus state a real seat would.
#[derive(Debug, Clone)]
pub struct HeadlessSeat {
    name: Rc<str>,
    inner: Rc<RefCell<SeatState>>,
}

#[derive(Debug)]
struct SeatState {
    capabilities: Capabilities,
    pointer_focus: Option<SurfaceId>,
    keyboard_focus: Option<SurfaceId>,
    keyboard: Option<DeviceId>,
    requests: Vec<SeatRequest>,
}

impl HeadlessSeat {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            inner: Rc::new(RefCell::new(SeatState {
                capabilities: Capabilities::default(),
                pointer_focus: None,
                keyboard_focus: None,
                keyboard: None,
                requests: Vec::new(),
            })),
        }
    }

    pub fn requests(&self) -> Vec<SeatRequest> {
        self.inner.borrow().requests.clone()
    }

    /// Return and forget the requests recorded so far.
    pub fn take_requests(&self) -> Vec<SeatRequest> {
        std::mem::take(&mut self.inner.borrow_mut().requests)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.borrow().capabilities
    }

    fn record(&self, request: SeatRequest) {
        self.inner.borrow_mut().requests.push(request);
    }
}

impl Seat for HeadlessSeat {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.inner.borrow_mut().capabilities = capabilities;
        self.record(SeatRequest::Capabilities(capabilities));
    }

    fn pointer_notify_enter(&mut self, surface: SurfaceId, local: Point) {
        self.inner.borrow_mut().pointer_focus = Some(surface);
        self.record(SeatRequest::PointerEnter { surface, local });
    }

    fn pointer_notify_motion(&mut self, time_msec: u32, local: Point) {
        self.record(SeatRequest::PointerMotion { time_msec, local });
    }

    fn pointer_notify_button(&mut self, time_msec: u32, button: u32, state: ButtonState) {
        self.record(SeatRequest::PointerButton {
            time_msec,
            button,
            state,
        });
    }

    fn pointer_notify_axis(
        &mut self,
        time_msec: u32,
        orientation: AxisOrientation,
        delta: f64,
        delta_discrete: i32,
        source: AxisSource,
    ) {
        self.record(SeatRequest::PointerAxis {
            time_msec,
            orientation,
            delta,
            delta_discrete,
            source,
        });
    }

    fn pointer_notify_frame(&mut self) {
        self.record(SeatRequest::PointerFrame);
    }

    fn pointer_clear_focus(&mut self) {
        self.inner.borrow_mut().pointer_focus = None;
        self.record(SeatRequest::PointerClearFocus);
    }

    fn pointer_focus(&self) -> Option<SurfaceId> {
        self.inner.borrow().pointer_focus
    }

    fn set_keyboard(&mut self, device: Option<DeviceId>) {
        let mut state = self.inner.borrow_mut();
        if state.keyboard == device {
            return;
        }
        state.keyboard = device;
        state.requests.push(SeatRequest::SetKeyboard(device));
    }

    fn keyboard(&self) -> Option<DeviceId> {
        self.inner.borrow().keyboard
    }

    fn keyboard_notify_enter(&mut self, surface: SurfaceId, pressed: &[u32]) {
        self.inner.borrow_mut().keyboard_focus = Some(surface);
        self.record(SeatRequest::KeyboardEnter {
            surface,
            pressed: pressed.to_vec(),
        });
    }

    fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.inner.borrow().keyboard_focus
    }

    fn keyboard_notify_key(&mut self, event: &KeyEvent) {
        self.record(SeatRequest::Key(event.clone()));
    }

    fn keyboard_notify_modifiers(&mut self, modifiers: Modifiers) {
        self.record(SeatRequest::Modifiers(modifiers));
    }
}
