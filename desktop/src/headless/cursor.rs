use std::{cell::RefCell, rc::Rc};

use anyhow::{Result, bail};
use log::debug;

use perch_geometry::{Point, Vector};
use perch_input::DeviceId;

use super::OutputLayout;
use crate::Cursor;

/// A cursor that tracks its position on the output layout and remembers the image it shows.
#[derive(Debug, Clone)]
pub struct HeadlessCursor {
    inner: Rc<RefCell<CursorState>>,
    layout: Rc<RefCell<OutputLayout>>,
}

#[derive(Debug)]
struct CursorState {
    position: Point,
    devices: Vec<DeviceId>,
    theme: Option<String>,
    size: u32,
    image: Option<String>,
    /// How many times an image was set.
    image_requests: usize,
}

impl HeadlessCursor {
    /// Create the cursor and load the image theme it draws from.
    pub fn new(layout: Rc<RefCell<OutputLayout>>, theme: Option<&str>, size: u32) -> Result<Self> {
        if size == 0 {
            bail!("Cursor theme {theme:?} can't be loaded at size 0");
        }
        debug!("Loaded cursor theme {theme:?} at size {size}");
        Ok(Self {
            inner: Rc::new(RefCell::new(CursorState {
                position: Point::ZERO,
                devices: Vec::new(),
                theme: theme.map(Into::into),
                size,
                image: None,
                image_requests: 0,
            })),
            layout,
        })
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        self.inner.borrow().devices.clone()
    }

    pub fn theme(&self) -> Option<String> {
        self.inner.borrow().theme.clone()
    }

    pub fn size(&self) -> u32 {
        self.inner.borrow().size
    }

    pub fn image(&self) -> Option<String> {
        self.inner.borrow().image.clone()
    }

    pub fn image_requests(&self) -> usize {
        self.inner.borrow().image_requests
    }

    /// Place the cursor without constraints, e.g. before any output exists.
    pub fn set_position(&self, position: impl Into<Point>) {
        self.inner.borrow_mut().position = position.into();
    }
}

impl Cursor for HeadlessCursor {
    fn position(&self) -> Point {
        self.inner.borrow().position
    }

    fn attach_device(&mut self, device: DeviceId) {
        let mut state = self.inner.borrow_mut();
        if !state.devices.contains(&device) {
            state.devices.push(device);
        }
    }

    fn move_by(&mut self, _device: DeviceId, delta: Vector) {
        let mut state = self.inner.borrow_mut();
        let target = state.position + delta;
        state.position = self.layout.borrow().closest_point(target);
    }

    fn warp_absolute(&mut self, _device: DeviceId, normalized: Point) {
        let layout = self.layout.borrow();
        if layout.is_empty() {
            return;
        }
        let bounds = layout.bounds();
        let size = bounds.size();
        let target = bounds.origin()
            + Point::new(normalized.x * size.width, normalized.y * size.height);
        self.inner.borrow_mut().position = layout.closest_point(target);
    }

    fn set_image(&mut self, name: &str) {
        let mut state = self.inner.borrow_mut();
        state.image = Some(name.into());
        state.image_requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use perch_geometry::Size;
    use perch_scene::OutputId;

    use super::*;

    fn layout() -> Rc<RefCell<OutputLayout>> {
        let layout = Rc::new(RefCell::new(OutputLayout::default()));
        layout
            .borrow_mut()
            .add_auto(OutputId(1), Size::new(100.0, 100.0));
        layout
    }

    #[test]
    fn relative_motion_is_clamped_to_the_layout() {
        let mut cursor = HeadlessCursor::new(layout(), None, 24).unwrap();
        cursor.move_by(DeviceId(1), Point::new(30.0, 40.0));
        assert_eq!(cursor.position(), Point::new(30.0, 40.0));
        cursor.move_by(DeviceId(1), Point::new(500.0, -500.0));
        assert_eq!(cursor.position(), Point::new(99.0, 0.0));
    }

    #[test]
    fn absolute_motion_maps_onto_the_layout() {
        let mut cursor = HeadlessCursor::new(layout(), None, 24).unwrap();
        cursor.warp_absolute(DeviceId(1), Point::new(0.25, 0.5));
        assert_eq!(cursor.position(), Point::new(25.0, 50.0));
    }

    #[test]
    fn absolute_motion_without_outputs_is_ignored() {
        let layout = Rc::new(RefCell::new(OutputLayout::default()));
        let mut cursor = HeadlessCursor::new(layout, None, 24).unwrap();
        cursor.set_position((3.0, 4.0));
        cursor.warp_absolute(DeviceId(1), Point::new(0.5, 0.5));
        assert_eq!(cursor.position(), Point::new(3.0, 4.0));
    }

    #[test]
    fn zero_size_theme_fails_to_load() {
        assert!(HeadlessCursor::new(layout(), Some("default"), 0).is_err());
    }
}
