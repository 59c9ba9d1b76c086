//! A platform without hardware or clients.
//!
//! Every collaborator is a cheap handle to shared state. The [`Headless`] instance keeps one set
//! of handles to create outputs, devices and client surfaces (returning the event that announces
//! them), and to observe what the compositor did with them.
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use anyhow::{Context, Result, bail};
use log::info;

use perch_input::{DefaultKeymaps, DeviceId, DeviceKind, InputDevice};
use perch_scene::{OutputId, SceneGraph, SurfaceId};

use crate::{
    BackendEvent, Config, Mode, MonotonicClock, Platform, XdgRole, XdgSurface,
    config::HeadlessConfig,
};

mod backend;
mod cursor;
mod layout;
mod seat;
mod shell;

pub use backend::*;
pub use cursor::*;
pub use layout::*;
pub use seat::*;
pub use shell::*;

pub struct Headless {
    pub backend: HeadlessBackend,
    pub layout: Rc<RefCell<OutputLayout>>,
    pub scene: SceneGraph,
    pub shell: HeadlessShell,
    pub cursor: HeadlessCursor,
    pub seat: HeadlessSeat,
    next_surface: Cell<u32>,
}

impl Headless {
    /// Create the mandatory platform resources in dependency order.
    pub fn create(config: &Config) -> Result<Self> {
        let layout = Rc::new(RefCell::new(OutputLayout::default()));
        let backend = HeadlessBackend::new(layout.clone());
        let scene = SceneGraph::new();
        let shell = HeadlessShell::new();
        let cursor = HeadlessCursor::new(
            layout.clone(),
            config.cursor.theme.as_deref(),
            config.cursor.size,
        )
        .context("Failed to create the cursor")?;
        if config.seat.name.is_empty() {
            bail!("Failed to create the seat: empty name");
        }
        let seat = HeadlessSeat::new(&config.seat.name);

        info!("Headless platform ready with {}", config.seat.name);
        Ok(Self {
            backend,
            layout,
            scene,
            shell,
            cursor,
            seat,
            next_surface: Cell::new(0),
        })
    }

    /// The collaborators for a server.
    pub fn platform(&self) -> Platform {
        Platform {
            backend: Box::new(self.backend.clone()),
            scene: Box::new(self.scene.clone()),
            shell: Box::new(self.shell.clone()),
            seat: Box::new(self.seat.clone()),
            cursor: Box::new(self.cursor.clone()),
            keymaps: Box::new(DefaultKeymaps),
            clock: Box::new(MonotonicClock),
        }
    }

    pub fn new_output(&self, name: &str, modes: Vec<Mode>) -> (OutputId, BackendEvent) {
        let output = self.backend.create_output(name, modes);
        (output, BackendEvent::NewOutput(output))
    }

    pub fn new_keyboard(&self, name: &str) -> (DeviceId, BackendEvent) {
        self.new_device(name, DeviceKind::Keyboard)
    }

    pub fn new_pointer(&self, name: &str) -> (DeviceId, BackendEvent) {
        self.new_device(name, DeviceKind::Pointer)
    }

    pub fn new_device(&self, name: &str, kind: DeviceKind) -> (DeviceId, BackendEvent) {
        let device = self.backend.create_device(name);
        (
            device,
            BackendEvent::NewInput(InputDevice::new(device, kind, name)),
        )
    }

    /// A client surface that took the toplevel role.
    pub fn new_toplevel(&self) -> (SurfaceId, BackendEvent) {
        let surface = self.next_surface();
        self.shell.add_toplevel(surface);
        (
            surface,
            BackendEvent::NewXdgSurface(XdgSurface {
                surface,
                role: XdgRole::Toplevel,
            }),
        )
    }

    pub fn new_popup(&self, parent: SurfaceId) -> (SurfaceId, BackendEvent) {
        let surface = self.next_surface();
        (
            surface,
            BackendEvent::NewXdgSurface(XdgSurface {
                surface,
                role: XdgRole::Popup { parent },
            }),
        )
    }

    pub fn destroy_surface(&self, surface: SurfaceId) -> BackendEvent {
        self.shell.remove_toplevel(surface);
        BackendEvent::SurfaceDestroy(surface)
    }

    /// Announce the configured outputs and devices.
    pub fn startup_events(&self, config: &HeadlessConfig) -> Vec<BackendEvent> {
        let outputs = config
            .outputs
            .iter()
            .map(|output| self.new_output(&output.name, output.modes.clone()).1);
        let keyboards = config
            .keyboards
            .iter()
            .map(|name| self.new_keyboard(name).1);
        let pointers = config.pointers.iter().map(|name| self.new_pointer(name).1);
        outputs.chain(keyboards).chain(pointers).collect()
    }

    fn next_surface(&self) -> SurfaceId {
        let next = self.next_surface.get() + 1;
        self.next_surface.set(next);
        SurfaceId(next)
    }
}
