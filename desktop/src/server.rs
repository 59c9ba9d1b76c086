use std::future::Future;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::sync::mpsc::UnboundedReceiver;

use perch_input::KeymapCompiler;
use perch_scene::Scene;
use perch_util::{Subscription, signal::emit};

use crate::{
    Backend, BackendEvent, Config, Cursor, FrameClock, Platform, Seat, Shell,
    events::EventSources, keyboard_registry::KeyboardRegistry, output_registry::OutputRegistry,
    view_manager::ViewRegistry,
};

/// The compositor's session core.
///
/// Owns the registries and the signals of every platform object. Platform events enter through
/// [`Server::dispatch`], which raises the matching signal. Everything runs on one thread, handlers
/// run to completion before the next event is looked at.
pub struct Server {
    pub(crate) config: Config,

    pub(crate) backend: Box<dyn Backend>,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) shell: Box<dyn Shell>,
    pub(crate) seat: Box<dyn Seat>,
    pub(crate) cursor: Box<dyn Cursor>,
    pub(crate) keymaps: Box<dyn KeymapCompiler>,
    pub(crate) clock: Box<dyn FrameClock>,

    pub(crate) sources: EventSources,
    pub(crate) outputs: OutputRegistry,
    pub(crate) keyboards: KeyboardRegistry,
    pub(crate) views: ViewRegistry,

    /// `None` after shutdown.
    listeners: Option<ServerListeners>,
}

/// The server's own subscriptions to the platform-wide signals.
struct ServerListeners {
    new_output: Subscription,
    new_input: Subscription,
    new_xdg_surface: Subscription,
    cursor_motion: Subscription,
    cursor_motion_absolute: Subscription,
    cursor_button: Subscription,
    cursor_axis: Subscription,
    cursor_frame: Subscription,
}

impl ServerListeners {
    fn subscribe(sources: &mut EventSources) -> Self {
        let cursor = &mut sources.cursor;
        Self {
            new_output: sources
                .new_output
                .subscribe(|server: &mut Server, output| server.on_new_output(*output)),
            new_input: sources
                .new_input
                .subscribe(|server: &mut Server, device| server.on_new_input(device)),
            new_xdg_surface: sources
                .new_xdg_surface
                .subscribe(|server: &mut Server, xdg| server.on_new_xdg_surface(xdg)),
            cursor_motion: cursor
                .motion
                .subscribe(|server: &mut Server, event| server.on_cursor_motion(event)),
            cursor_motion_absolute: cursor
                .motion_absolute
                .subscribe(|server: &mut Server, event| server.on_cursor_motion_absolute(event)),
            cursor_button: cursor
                .button
                .subscribe(|server: &mut Server, event| server.on_cursor_button(event)),
            cursor_axis: cursor
                .axis
                .subscribe(|server: &mut Server, event| server.on_cursor_axis(event)),
            cursor_frame: cursor
                .frame
                .subscribe(|server: &mut Server, _| server.on_cursor_frame()),
        }
    }

    fn unsubscribe(self, sources: &mut EventSources) {
        sources.new_output.unsubscribe(self.new_output);
        sources.new_input.unsubscribe(self.new_input);
        sources.new_xdg_surface.unsubscribe(self.new_xdg_surface);
        let cursor = &mut sources.cursor;
        cursor.motion.unsubscribe(self.cursor_motion);
        cursor.motion_absolute.unsubscribe(self.cursor_motion_absolute);
        cursor.button.unsubscribe(self.cursor_button);
        cursor.axis.unsubscribe(self.cursor_axis);
        cursor.frame.unsubscribe(self.cursor_frame);
    }
}

impl Server {
    /// Take over the platform's collaborators, create the protocol interfaces, and start
    /// listening.
    pub fn new(config: Config, platform: Platform) -> Result<Self> {
        let Platform {
            backend,
            scene,
            shell,
            seat,
            cursor,
            keymaps,
            clock,
        } = platform;

        let mut server = Self {
            config,
            backend,
            scene,
            shell,
            seat,
            cursor,
            keymaps,
            clock,
            sources: EventSources::default(),
            outputs: OutputRegistry::default(),
            keyboards: KeyboardRegistry::default(),
            views: ViewRegistry::default(),
            listeners: None,
        };

        server
            .shell
            .create_interfaces()
            .context("Failed to create the protocol interfaces")?;
        server.listeners = Some(ServerListeners::subscribe(&mut server.sources));

        info!("Server ready on {}", server.seat.name());
        Ok(server)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn keyboards(&self) -> &KeyboardRegistry {
        &self.keyboards
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    /// Raise the signal that belongs to the event.
    ///
    /// Objects get their signals when they are announced, before anyone hears about them. A
    /// destroyed object's signals are dropped right after its destroy signal was raised.
    pub fn dispatch(&mut self, event: BackendEvent) {
        use BackendEvent::*;

        let invoked = match &event {
            NewOutput(output) => {
                self.sources.announce_output(*output);
                emit(self, |s| Some(&s.sources.new_output), output)
            }
            OutputFrame(output) => {
                emit(self, |s| s.sources.outputs.get(output).map(|o| &o.frame), &())
            }
            OutputDestroy(output) => {
                let invoked = emit(
                    self,
                    |s| s.sources.outputs.get(output).map(|o| &o.destroy),
                    &(),
                );
                self.sources.retire_output(*output);
                invoked
            }

            NewInput(device) => {
                // Only keyboards raise key and modifier events, but every device can go away.
                self.sources.announce_device(device.id);
                emit(self, |s| Some(&s.sources.new_input), device)
            }
            KeyboardKey(device, key) => {
                emit(self, |s| s.sources.devices.get(device).map(|d| &d.key), key)
            }
            KeyboardModifiers(device, modifiers) => emit(
                self,
                |s| s.sources.devices.get(device).map(|d| &d.modifiers),
                modifiers,
            ),
            InputDestroy(device) => {
                let invoked = emit(
                    self,
                    |s| s.sources.devices.get(device).map(|d| &d.destroy),
                    &(),
                );
                self.sources.retire_device(*device);
                invoked
            }

            NewXdgSurface(xdg) => {
                self.sources.announce_surface(xdg.surface);
                emit(self, |s| Some(&s.sources.new_xdg_surface), xdg)
            }
            SurfaceMap(surface) => {
                emit(self, |s| s.sources.surfaces.get(surface).map(|x| &x.map), &())
            }
            SurfaceUnmap(surface) => {
                emit(self, |s| s.sources.surfaces.get(surface).map(|x| &x.unmap), &())
            }
            SurfaceDestroy(surface) => {
                let invoked = emit(
                    self,
                    |s| s.sources.surfaces.get(surface).map(|x| &x.destroy),
                    &(),
                );
                self.sources.retire_surface(*surface);
                self.release_surface_tree(*surface);
                invoked
            }
            RequestFullscreen(surface, fullscreen) => emit(
                self,
                |s| {
                    s.sources
                        .surfaces
                        .get(surface)
                        .map(|x| &x.request_fullscreen)
                },
                fullscreen,
            ),

            PointerMotion(motion) => emit(self, |s| Some(&s.sources.cursor.motion), motion),
            PointerMotionAbsolute(motion) => {
                emit(self, |s| Some(&s.sources.cursor.motion_absolute), motion)
            }
            PointerButton(button) => emit(self, |s| Some(&s.sources.cursor.button), button),
            PointerAxis(axis) => emit(self, |s| Some(&s.sources.cursor.axis), axis),
            PointerFrame => emit(self, |s| Some(&s.sources.cursor.frame), &()),
        };

        if invoked == 0 {
            debug!("Nobody listens to {event:?}");
        }
    }

    /// Dispatch events until the platform closes the channel or `Ctrl-C` is pressed.
    pub async fn run(self, events: UnboundedReceiver<BackendEvent>) -> Result<()> {
        self.run_until(events, async {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")
        })
        .await
    }

    /// Dispatch events until the platform closes the channel or `shutdown` completes.
    pub async fn run_until(
        mut self,
        mut events: UnboundedReceiver<BackendEvent>,
        shutdown: impl Future<Output = Result<()>>,
    ) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("The platform closed the event channel");
                        break;
                    };
                    self.dispatch(event);
                }
                result = &mut shutdown => {
                    result?;
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Release every view, keyboard, and output, and stop listening.
    ///
    /// Happens on drop, too.
    pub fn shutdown(&mut self) {
        let Some(listeners) = self.listeners.take() else {
            return;
        };
        info!("Shutting down");

        self.release_views();
        self.release_keyboards();
        self.release_outputs();
        listeners.unsubscribe(&mut self.sources);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
