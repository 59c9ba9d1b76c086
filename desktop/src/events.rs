//! What the platform reports, and the signals the server raises for it.
//!
//! Each platform object (output, input device, xdg surface) gets its own set of signals when it is
//! announced. Handlers subscribe to them, and hand their subscriptions back before the object is
//! gone.
use std::collections::HashMap;

use derive_more::Display;
use log::warn;

use perch_input::{
    DeviceId, InputDevice, KeyEvent, Modifiers, PointerAxis, PointerButton, PointerMotion,
    PointerMotionAbsolute,
};
use perch_scene::{OutputId, SurfaceId};
use perch_util::Signal;

use crate::Server;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    NewOutput(OutputId),
    OutputFrame(OutputId),
    OutputDestroy(OutputId),

    NewInput(InputDevice),
    KeyboardKey(DeviceId, KeyEvent),
    KeyboardModifiers(DeviceId, Modifiers),
    InputDestroy(DeviceId),

    NewXdgSurface(XdgSurface),
    SurfaceMap(SurfaceId),
    SurfaceUnmap(SurfaceId),
    SurfaceDestroy(SurfaceId),
    /// A toplevel asks to enter (`true`) or leave fullscreen.
    RequestFullscreen(SurfaceId, bool),

    // Aggregated by the cursor from all attached pointer devices.
    PointerMotion(PointerMotion),
    PointerMotionAbsolute(PointerMotionAbsolute),
    PointerButton(PointerButton),
    PointerAxis(PointerAxis),
    PointerFrame,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct XdgSurface {
    pub surface: SurfaceId,
    pub role: XdgRole,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum XdgRole {
    /// A surface whose role was not assigned yet.
    None,
    Toplevel,
    #[display("Popup({parent})")]
    Popup { parent: SurfaceId },
}

pub type ServerSignal<E> = Signal<Server, E>;

#[derive(Debug, Default)]
pub struct EventSources {
    pub new_output: ServerSignal<OutputId>,
    pub new_input: ServerSignal<InputDevice>,
    pub new_xdg_surface: ServerSignal<XdgSurface>,
    pub cursor: CursorSignals,

    pub outputs: HashMap<OutputId, OutputSignals>,
    pub devices: HashMap<DeviceId, DeviceSignals>,
    pub surfaces: HashMap<SurfaceId, SurfaceSignals>,
}

#[derive(Debug, Default)]
pub struct CursorSignals {
    pub motion: ServerSignal<PointerMotion>,
    pub motion_absolute: ServerSignal<PointerMotionAbsolute>,
    pub button: ServerSignal<PointerButton>,
    pub axis: ServerSignal<PointerAxis>,
    pub frame: ServerSignal<()>,
}

#[derive(Debug, Default)]
pub struct OutputSignals {
    pub frame: ServerSignal<()>,
    pub destroy: ServerSignal<()>,
}

#[derive(Debug, Default)]
pub struct DeviceSignals {
    pub key: ServerSignal<KeyEvent>,
    pub modifiers: ServerSignal<Modifiers>,
    pub destroy: ServerSignal<()>,
}

#[derive(Debug, Default)]
pub struct SurfaceSignals {
    pub map: ServerSignal<()>,
    pub unmap: ServerSignal<()>,
    pub destroy: ServerSignal<()>,
    pub request_fullscreen: ServerSignal<bool>,
}

impl OutputSignals {
    fn subscribers(&self) -> usize {
        self.frame.len() + self.destroy.len()
    }
}

impl DeviceSignals {
    fn subscribers(&self) -> usize {
        self.key.len() + self.modifiers.len() + self.destroy.len()
    }
}

impl SurfaceSignals {
    fn subscribers(&self) -> usize {
        self.map.len() + self.unmap.len() + self.destroy.len() + self.request_fullscreen.len()
    }
}

impl EventSources {
    // Announcing an object twice keeps the signals (and the subscriptions) it already has.

    pub fn announce_output(&mut self, output: OutputId) {
        self.outputs.entry(output).or_default();
    }

    pub fn announce_device(&mut self, device: DeviceId) {
        self.devices.entry(device).or_default();
    }

    pub fn announce_surface(&mut self, surface: SurfaceId) {
        self.surfaces.entry(surface).or_default();
    }

    // The platform object is gone after its destroy signal was raised. Subscriptions still
    // attached at this point are leaked: their handlers will never run again.

    pub fn retire_output(&mut self, output: OutputId) {
        if let Some(signals) = self.outputs.remove(&output) {
            report_leaks(&output, signals.subscribers());
        }
    }

    pub fn retire_device(&mut self, device: DeviceId) {
        if let Some(signals) = self.devices.remove(&device) {
            report_leaks(&device, signals.subscribers());
        }
    }

    pub fn retire_surface(&mut self, surface: SurfaceId) {
        if let Some(signals) = self.surfaces.remove(&surface) {
            report_leaks(&surface, signals.subscribers());
        }
    }
}

fn report_leaks(source: &dyn std::fmt::Display, subscribers: usize) {
    if subscribers > 0 {
        warn!("{source} destroyed with {subscribers} subscriptions still attached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcing_twice_keeps_subscriptions() {
        let mut sources = EventSources::default();
        let output = OutputId(1);
        sources.announce_output(output);
        let token = sources.outputs.get_mut(&output).unwrap().frame.subscribe(|_, _| {});
        sources.announce_output(output);

        let signals = sources.outputs.get_mut(&output).unwrap();
        assert_eq!(signals.frame.len(), 1);
        assert!(signals.frame.unsubscribe(token));
    }

    #[test]
    fn retiring_drops_the_signals() {
        let mut sources = EventSources::default();
        let surface = SurfaceId(3);
        sources.announce_surface(surface);
        let token = sources.surfaces.get_mut(&surface).unwrap().map.subscribe(|_, _| {});

        sources.retire_surface(surface);
        assert!(!sources.surfaces.contains_key(&surface));
        // The source is gone, so the leaked token can be dropped without complaint.
        assert!(!token.is_source_alive());
    }

    #[test]
    fn xdg_role_display() {
        assert_eq!(
            XdgRole::Popup {
                parent: SurfaceId(4)
            }
            .to_string(),
            "Popup(surface#4)"
        );
        assert_eq!(XdgRole::Toplevel.to_string(), "Toplevel");
    }
}
