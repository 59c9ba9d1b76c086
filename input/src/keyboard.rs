use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

/// A key transition. `keycode` is the evdev scancode (without the xkb offset of 8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub time_msec: u32,
    pub keycode: u32,
    pub state: KeyState,
}

/// Serialized xkb modifier state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

/// Key repeat configuration: `rate` repeats per second after `delay`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RepeatInfo {
    pub rate: i32,
    /// Milliseconds.
    pub delay: u32,
}

impl RepeatInfo {
    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay.into())
    }
}

impl Default for RepeatInfo {
    fn default() -> Self {
        Self {
            rate: 25,
            delay: 600,
        }
    }
}

/// The keys a keyboard currently holds down, in press order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressedKeys(Vec<u32>);

impl PressedKeys {
    /// Apply a key transition. Repeated presses and releases of keys that are not down are
    /// ignored.
    pub fn apply(&mut self, event: &KeyEvent) {
        match event.state {
            KeyState::Pressed => {
                if !self.0.contains(&event.keycode) {
                    self.0.push(event.keycode);
                }
            }
            KeyState::Released => self.0.retain(|key| *key != event.keycode),
        }
    }

    pub fn keycodes(&self) -> &[u32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(keycode: u32, state: KeyState) -> KeyEvent {
        KeyEvent {
            time_msec: 0,
            keycode,
            state,
        }
    }

    #[test]
    fn pressed_keys_follow_transitions() {
        let mut keys = PressedKeys::default();
        keys.apply(&key(30, KeyState::Pressed));
        keys.apply(&key(42, KeyState::Pressed));
        keys.apply(&key(30, KeyState::Pressed));
        assert_eq!(keys.keycodes(), [30, 42]);

        keys.apply(&key(30, KeyState::Released));
        keys.apply(&key(99, KeyState::Released));
        assert_eq!(keys.keycodes(), [42]);
    }

    #[test]
    fn default_repeat_is_25_per_second_after_600ms() {
        let repeat = RepeatInfo::default();
        assert_eq!(repeat.rate, 25);
        assert_eq!(repeat.delay_duration(), Duration::from_millis(600));
    }
}
