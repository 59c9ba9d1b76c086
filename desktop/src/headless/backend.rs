use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{Result, bail};
use log::debug;

use perch_geometry::{Rect, Size};
use perch_input::{DeviceId, Keymap, RepeatInfo};
use perch_scene::OutputId;

use super::OutputLayout;
use crate::{Backend, Mode};

/// Outputs without a committed mode have this size.
const DEFAULT_OUTPUT_SIZE: Size = Size::new(1280.0, 720.0);

/// A backend without hardware.
///
/// Outputs and devices are created on request. Every clone is a handle to the same state, so the
/// driver of a session can inject failures and observe what the compositor configured.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    inner: Rc<RefCell<BackendState>>,
    layout: Rc<RefCell<OutputLayout>>,
}

#[derive(Debug, Default)]
struct BackendState {
    next_output: u32,
    next_device: u32,
    outputs: HashMap<OutputId, OutputState>,
    devices: HashMap<DeviceId, DeviceState>,
}

#[derive(Debug, Default)]
struct OutputState {
    name: String,
    modes: Vec<Mode>,
    requires_mode: bool,
    render_failure: bool,
    commit_failure: bool,
    committed: Option<Mode>,
}

#[derive(Debug, Default)]
struct DeviceState {
    name: String,
    repeat: Option<RepeatInfo>,
    keymap: Option<Keymap>,
    rejects_keymaps: bool,
}

impl HeadlessBackend {
    pub fn new(layout: Rc<RefCell<OutputLayout>>) -> Self {
        Self {
            inner: Default::default(),
            layout,
        }
    }

    pub fn create_output(&self, name: impl Into<String>, modes: Vec<Mode>) -> OutputId {
        let mut state = self.inner.borrow_mut();
        state.next_output += 1;
        let output = OutputId(state.next_output);
        state.outputs.insert(
            output,
            OutputState {
                name: name.into(),
                modes,
                ..Default::default()
            },
        );
        output
    }

    pub fn create_device(&self, name: impl Into<String>) -> DeviceId {
        let mut state = self.inner.borrow_mut();
        state.next_device += 1;
        let device = DeviceId(state.next_device);
        state.devices.insert(
            device,
            DeviceState {
                name: name.into(),
                ..Default::default()
            },
        );
        device
    }

    pub fn set_requires_mode(&self, output: OutputId, requires_mode: bool) {
        self.with_output(output, |o| o.requires_mode = requires_mode);
    }

    pub fn set_render_failure(&self, output: OutputId, failing: bool) {
        self.with_output(output, |o| o.render_failure = failing);
    }

    pub fn set_commit_failure(&self, output: OutputId, failing: bool) {
        self.with_output(output, |o| o.commit_failure = failing);
    }

    pub fn set_rejects_keymaps(&self, device: DeviceId, rejects: bool) {
        if let Some(device) = self.inner.borrow_mut().devices.get_mut(&device) {
            device.rejects_keymaps = rejects;
        }
    }

    pub fn committed_mode(&self, output: OutputId) -> Option<Mode> {
        self.inner.borrow().outputs.get(&output)?.committed
    }

    pub fn repeat_info(&self, device: DeviceId) -> Option<RepeatInfo> {
        self.inner.borrow().devices.get(&device)?.repeat
    }

    pub fn keymap(&self, device: DeviceId) -> Option<Keymap> {
        self.inner.borrow().devices.get(&device)?.keymap.clone()
    }

    pub fn layout_area(&self, output: OutputId) -> Option<Rect> {
        self.layout.borrow().area(output)
    }

    fn with_output(&self, output: OutputId, f: impl FnOnce(&mut OutputState)) {
        if let Some(state) = self.inner.borrow_mut().outputs.get_mut(&output) {
            f(state);
        }
    }
}

impl Backend for HeadlessBackend {
    fn init_output_render(&mut self, output: OutputId) -> Result<()> {
        let state = self.inner.borrow();
        let Some(state) = state.outputs.get(&output) else {
            bail!("{output} does not exist");
        };
        if state.render_failure {
            bail!("No renderer for {output} ({})", state.name);
        }
        Ok(())
    }

    fn output_modes(&self, output: OutputId) -> Vec<Mode> {
        self.inner
            .borrow()
            .outputs
            .get(&output)
            .map(|o| o.modes.clone())
            .unwrap_or_default()
    }

    fn output_requires_mode(&self, output: OutputId) -> bool {
        self.inner
            .borrow()
            .outputs
            .get(&output)
            .is_some_and(|o| o.requires_mode)
    }

    fn commit_output_mode(&mut self, output: OutputId, mode: Mode) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        let Some(state) = state.outputs.get_mut(&output) else {
            bail!("{output} does not exist");
        };
        if state.commit_failure {
            bail!("{} rejected mode {mode}", state.name);
        }
        state.committed = Some(mode);
        debug!("{} ({output}) enabled with {mode}", state.name);
        Ok(())
    }

    fn add_output_to_layout(&mut self, output: OutputId) -> Rect {
        let size = self
            .committed_mode(output)
            .map(|mode| Size::from((mode.width, mode.height)))
            .unwrap_or(DEFAULT_OUTPUT_SIZE);
        self.layout.borrow_mut().add_auto(output, size)
    }

    fn remove_output_from_layout(&mut self, output: OutputId) {
        self.layout.borrow_mut().remove(output);
    }

    fn set_repeat_info(&mut self, device: DeviceId, repeat: RepeatInfo) {
        if let Some(device) = self.inner.borrow_mut().devices.get_mut(&device) {
            device.repeat = Some(repeat);
        }
    }

    fn set_keymap(&mut self, device: DeviceId, keymap: &Keymap) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        let Some(state) = state.devices.get_mut(&device) else {
            bail!("{device} does not exist");
        };
        if state.rejects_keymaps {
            bail!("{} ({device}) rejected the keymap", state.name);
        }
        state.keymap = Some(keymap.clone());
        Ok(())
    }
}
