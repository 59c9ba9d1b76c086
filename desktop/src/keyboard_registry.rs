//! Input devices: keyboards get a keymap and repeat settings, pointers drive the cursor.
use std::collections::HashMap;

use anyhow::Context;
use log::{debug, error, info, warn};

use perch_input::{DeviceId, DeviceKind, InputDevice, KeyEvent, Keymap, Modifiers, PressedKeys};
use perch_util::{Id, IdTable, Subscription};

use crate::{Capabilities, Server, events::DeviceSignals};

#[derive(Debug)]
pub struct Keyboard {
    device: DeviceId,
    name: String,
    keymap: Keymap,
    pressed: PressedKeys,
    listeners: KeyboardListeners,
}

impl Keyboard {
    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn pressed(&self) -> &[u32] {
        self.pressed.keycodes()
    }
}

#[derive(Debug)]
struct KeyboardListeners {
    key: Subscription,
    modifiers: Subscription,
    destroy: Subscription,
}

impl KeyboardListeners {
    fn subscribe(signals: &mut DeviceSignals, device: DeviceId) -> Self {
        Self {
            key: signals.key.subscribe(move |server: &mut Server, event| {
                server.on_keyboard_key(device, event)
            }),
            modifiers: signals.modifiers.subscribe(move |server: &mut Server, modifiers| {
                server.on_keyboard_modifiers(device, *modifiers)
            }),
            destroy: signals
                .destroy
                .subscribe(move |server: &mut Server, _| server.on_keyboard_destroy(device)),
        }
    }

    fn unsubscribe(self, signals: Option<&mut DeviceSignals>) {
        if let Some(signals) = signals {
            signals.key.unsubscribe(self.key);
            signals.modifiers.unsubscribe(self.modifiers);
            signals.destroy.unsubscribe(self.destroy);
        }
    }
}

/// All configured keyboards, oldest first.
#[derive(Debug, Default)]
pub struct KeyboardRegistry {
    keyboards: IdTable<Keyboard>,
    order: Vec<Id>,
    index: HashMap<DeviceId, Id>,
}

impl KeyboardRegistry {
    pub fn get(&self, device: DeviceId) -> Option<&Keyboard> {
        self.keyboards.get(*self.index.get(&device)?)
    }

    fn get_mut(&mut self, device: DeviceId) -> Option<&mut Keyboard> {
        self.keyboards.get_mut(*self.index.get(&device)?)
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.index.contains_key(&device)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyboard> {
        self.order.iter().map(|id| &self.keyboards[*id])
    }

    /// The most recently added keyboard.
    pub fn newest(&self) -> Option<&Keyboard> {
        self.order.last().map(|id| &self.keyboards[*id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, keyboard: Keyboard) {
        let device = keyboard.device;
        let id = self.keyboards.insert(keyboard);
        self.order.push(id);
        self.index.insert(device, id);
    }

    fn remove(&mut self, device: DeviceId) -> Option<Keyboard> {
        let id = self.index.remove(&device)?;
        self.order.retain(|k| *k != id);
        self.keyboards.take(id)
    }

    fn devices(&self) -> Vec<DeviceId> {
        self.iter().map(|keyboard| keyboard.device).collect()
    }
}

impl Server {
    pub(crate) fn on_new_input(&mut self, device: &InputDevice) {
        match device.kind {
            DeviceKind::Keyboard => self.on_new_keyboard(device),
            DeviceKind::Pointer => {
                self.cursor.attach_device(device.id);
                info!("Attached pointer {} ({}) to the cursor", device.id, device.name);
            }
            kind => debug!("Ignoring {kind} device {} ({})", device.id, device.name),
        }
        self.update_seat_capabilities();
    }

    fn on_new_keyboard(&mut self, device: &InputDevice) {
        if self.keyboards.contains(device.id) {
            warn!("Keyboard {} announced twice, ignoring", device.id);
            return;
        }

        self.backend
            .set_repeat_info(device.id, self.config.keyboard.repeat_info());

        let keymap = match self
            .keymaps
            .compile(&self.config.keyboard.rules)
            .context("Failed to compile the keymap")
        {
            Ok(keymap) => keymap,
            Err(e) => {
                error!("Abandoning keyboard {} ({}): {e:?}", device.id, device.name);
                return;
            }
        };

        if let Err(e) = self.backend.set_keymap(device.id, &keymap) {
            error!(
                "Failed to assign the keymap to {} ({}), abandoning it: {e:?}",
                device.id, device.name
            );
            return;
        }

        let Some(signals) = self.sources.devices.get_mut(&device.id) else {
            error!("Keyboard {} has no event sources, abandoning it", device.id);
            return;
        };
        let listeners = KeyboardListeners::subscribe(signals, device.id);

        self.keyboards.insert(Keyboard {
            device: device.id,
            name: device.name.clone(),
            keymap,
            pressed: PressedKeys::default(),
            listeners,
        });
        self.seat.set_keyboard(Some(device.id));
        info!("New keyboard {} ({})", device.id, device.name);
    }

    fn on_keyboard_key(&mut self, device: DeviceId, event: &KeyEvent) {
        let Some(keyboard) = self.keyboards.get_mut(device) else {
            warn!("Key event from unknown keyboard {device}");
            return;
        };
        keyboard.pressed.apply(event);
        // The keyboard in use becomes the one clients see.
        self.seat.set_keyboard(Some(device));
        self.seat.keyboard_notify_key(event);
    }

    fn on_keyboard_modifiers(&mut self, device: DeviceId, modifiers: Modifiers) {
        if !self.keyboards.contains(device) {
            warn!("Modifiers from unknown keyboard {device}");
            return;
        }
        self.seat.set_keyboard(Some(device));
        self.seat.keyboard_notify_modifiers(modifiers);
    }

    fn on_keyboard_destroy(&mut self, device: DeviceId) {
        let Some(keyboard) = self.keyboards.remove(device) else {
            warn!("Destroy of unknown keyboard {device}");
            return;
        };
        keyboard
            .listeners
            .unsubscribe(self.sources.devices.get_mut(&device));

        if self.seat.keyboard() == Some(device) {
            let replacement = self.keyboards.newest().map(|keyboard| keyboard.device);
            self.seat.set_keyboard(replacement);
        }
        self.update_seat_capabilities();
        info!("Removed keyboard {device} ({})", keyboard.name);
    }

    /// Keys held down on the keyboard clients currently see.
    pub(crate) fn pressed_keys(&self) -> Vec<u32> {
        self.seat
            .keyboard()
            .and_then(|device| self.keyboards.get(device))
            .map(|keyboard| keyboard.pressed().to_vec())
            .unwrap_or_default()
    }

    fn update_seat_capabilities(&mut self) {
        self.seat.set_capabilities(Capabilities {
            // There is always a cursor, even without pointer devices.
            pointer: true,
            keyboard: !self.keyboards.is_empty(),
        });
    }

    pub(crate) fn release_keyboards(&mut self) {
        for device in self.keyboards.devices() {
            self.on_keyboard_destroy(device);
        }
    }
}
