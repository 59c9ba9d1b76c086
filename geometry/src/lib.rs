//! Layout-space and surface-local geometry primitives.

mod point;
mod rect;
mod size;

pub use point::*;
pub use rect::*;
pub use size::*;

pub trait Contains<Other> {
    fn contains(&self, other: Other) -> bool;
}
