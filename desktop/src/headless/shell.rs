use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{Result, bail};
use log::debug;

use perch_scene::SurfaceId;

use crate::Shell;

pub const INTERFACES: [&str; 3] = ["wl_compositor", "wl_subcompositor", "wl_data_device_manager"];

/// The xdg-shell state of headless clients.
#[derive(Debug, Clone, Default)]
pub struct HeadlessShell {
    inner: Rc<RefCell<ShellState>>,
}

#[derive(Debug, Default)]
struct ShellState {
    interfaces: Vec<&'static str>,
    interfaces_failure: bool,
    toplevels: HashMap<SurfaceId, Toplevel>,
}

#[derive(Debug, Default)]
struct Toplevel {
    activated: bool,
    /// Every fullscreen state the compositor forwarded, in order.
    fullscreen: Vec<bool>,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a surface with the toplevel role.
    pub fn add_toplevel(&self, surface: SurfaceId) {
        self.inner
            .borrow_mut()
            .toplevels
            .entry(surface)
            .or_default();
    }

    pub fn remove_toplevel(&self, surface: SurfaceId) {
        self.inner.borrow_mut().toplevels.remove(&surface);
    }

    pub fn set_interfaces_failure(&self, failing: bool) {
        self.inner.borrow_mut().interfaces_failure = failing;
    }

    pub fn interfaces(&self) -> Vec<&'static str> {
        self.inner.borrow().interfaces.clone()
    }

    pub fn is_activated(&self, surface: SurfaceId) -> bool {
        self.inner
            .borrow()
            .toplevels
            .get(&surface)
            .is_some_and(|t| t.activated)
    }

    pub fn fullscreen_requests(&self, surface: SurfaceId) -> Vec<bool> {
        self.inner
            .borrow()
            .toplevels
            .get(&surface)
            .map(|t| t.fullscreen.clone())
            .unwrap_or_default()
    }
}

impl Shell for HeadlessShell {
    fn create_interfaces(&mut self) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        for interface in INTERFACES {
            if state.interfaces_failure {
                bail!("Failed to create {interface}");
            }
            if !state.interfaces.contains(&interface) {
                state.interfaces.push(interface);
                debug!("Created global {interface}");
            }
        }
        Ok(())
    }

    fn is_toplevel(&self, surface: SurfaceId) -> bool {
        self.inner.borrow().toplevels.contains_key(&surface)
    }

    fn set_activated(&mut self, surface: SurfaceId, activated: bool) {
        if let Some(toplevel) = self.inner.borrow_mut().toplevels.get_mut(&surface) {
            toplevel.activated = activated;
        }
    }

    fn set_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool) {
        if let Some(toplevel) = self.inner.borrow_mut().toplevels.get_mut(&surface) {
            toplevel.fullscreen.push(fullscreen);
        }
    }
}
