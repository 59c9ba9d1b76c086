use derive_more::{Display, From};

/// Backend identity of an input device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("device#{_0}")]
pub struct DeviceId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    Touch,
    Tablet,
    TabletPad,
    Switch,
}

/// A device as announced by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDevice {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
}

impl InputDevice {
    pub fn new(id: impl Into<DeviceId>, kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
        }
    }
}
