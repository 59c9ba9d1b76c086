use log::{debug, info, warn};

use perch_scene::SurfaceId;

use crate::{Server, ViewId};

impl Server {
    /// Raise the view and move keyboard focus to `surface`, which is the view's toplevel or one of
    /// its popups.
    ///
    /// Raising happens every time. Focus and activation are only touched when the keyboard focus
    /// actually changes.
    pub(crate) fn focus_view(&mut self, id: ViewId, surface: SurfaceId) {
        let Some(view) = self.views.get(id) else {
            warn!("Focus request for unknown {id}");
            return;
        };
        if !view.is_mapped() {
            debug!("Not focusing {id}, it is {}", view.state());
            return;
        }
        let toplevel = view.surface();
        let tree = view.tree();

        self.views.link_front(id);
        self.scene.raise_to_top(tree);

        let previous = self.seat.keyboard_focus();
        if previous == Some(surface) {
            return;
        }

        if let Some(previous) = previous
            && previous != toplevel
            && self.shell.is_toplevel(previous)
        {
            self.shell.set_activated(previous, false);
        }
        self.shell.set_activated(toplevel, true);

        let pressed = self.pressed_keys();
        self.seat.keyboard_notify_enter(surface, &pressed);
        info!("Focused {id} ({surface})");
    }
}
