mod id;
mod id_table;
pub mod signal;

pub use id::*;
pub use id_table::*;
pub use signal::{Signal, Subscription};
