//! The session core of a minimal compositor.
//!
//! A [`Server`] tracks outputs, keyboards, and toplevel views, and routes pointer input to the
//! surface below the cursor. It reaches hardware, clients and rendering only through the
//! collaborator traits in [`platform`]. [`headless`] implements them without either.
mod config;
mod event_router;
mod events;
mod focus_manager;
pub mod headless;
mod hit_tester;
mod keyboard_registry;
mod output_registry;
pub mod platform;
mod server;
mod view_manager;


pub use config::*;
pub use events::{BackendEvent, XdgRole, XdgSurface};
pub use hit_tester::{Hit, HitTester};
pub use keyboard_registry::{Keyboard, KeyboardRegistry};
pub use output_registry::{Output, OutputRegistry};
pub use platform::*;
pub use server::Server;
pub use view_manager::{View, ViewId, ViewRegistry, ViewState};
