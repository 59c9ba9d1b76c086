//! Routes cursor input to the seat.
//!
//! Every motion re-hits the scene: the surface under the cursor receives pointer focus and the
//! motion, nothing below the cursor clears pointer focus. Buttons are always forwarded first,
//! focus only changes on a press over a view.
use log::trace;

use perch_input::{ButtonState, PointerAxis, PointerButton, PointerMotion, PointerMotionAbsolute};

use crate::{
    Server,
    hit_tester::{Hit, HitTester, SceneHitTester},
};

impl Server {
    pub(crate) fn hit_test_cursor(&self) -> Hit {
        SceneHitTester::new(self.scene.as_ref(), &self.views).hit_test(self.cursor.position())
    }

    pub(crate) fn on_cursor_motion(&mut self, event: &PointerMotion) {
        self.cursor.move_by(event.device, event.delta);
        self.process_cursor_motion(event.time_msec);
    }

    pub(crate) fn on_cursor_motion_absolute(&mut self, event: &PointerMotionAbsolute) {
        self.cursor.warp_absolute(event.device, event.position);
        self.process_cursor_motion(event.time_msec);
    }

    fn process_cursor_motion(&mut self, time_msec: u32) {
        let hit = self.hit_test_cursor();
        trace!("Cursor at {} over {hit:?}", self.cursor.position());

        if hit.view.is_none() {
            // A client may have left its own image behind.
            self.cursor.set_image(&self.config.cursor.default_image);
        }

        match hit.surface {
            Some(surface) => {
                self.seat.pointer_notify_enter(surface, hit.local);
                self.seat.pointer_notify_motion(time_msec, hit.local);
            }
            None => self.seat.pointer_clear_focus(),
        }
    }

    pub(crate) fn on_cursor_button(&mut self, event: &PointerButton) {
        self.seat
            .pointer_notify_button(event.time_msec, event.button, event.state);

        if event.state != ButtonState::Pressed {
            return;
        }
        if let Hit {
            view: Some(view),
            surface: Some(surface),
            ..
        } = self.hit_test_cursor()
        {
            self.focus_view(view, surface);
        }
    }

    pub(crate) fn on_cursor_axis(&mut self, event: &PointerAxis) {
        self.seat.pointer_notify_axis(
            event.time_msec,
            event.orientation,
            event.delta,
            event.delta_discrete,
            event.source,
        );
    }

    pub(crate) fn on_cursor_frame(&mut self) {
        self.seat.pointer_notify_frame();
    }
}
