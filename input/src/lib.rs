//! Input devices and the events they raise, as delivered by the backend.
mod device;
mod keyboard;
mod keymap;
mod pointer;

pub use device::*;
pub use keyboard::*;
pub use keymap::*;
pub use pointer::*;
