//! The scene graph the compositor renders and hit-tests against.
//!
//! [`Scene`] is the contract the session core relies on: surface subtrees, a topmost-node query,
//! stacking, and one render target per attached output. [`SceneGraph`] is an in-memory
//! implementation that keeps geometry and render bookkeeping without drawing anything.
//!
//! Nodes are addressed by [`NodeId`]s. The scene never stores back-references to its owners; an
//! owner that needs to find itself from a node keeps its own side table keyed by the node id.
use std::time::Duration;

use anyhow::Result;
use derive_more::{Display, From};

use perch_geometry::{Point, Rect};
use perch_util::Id;

mod graph;

pub use graph::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[display("node#{_0}")]
pub struct NodeId(Id);

/// A client surface, as identified by the display-protocol layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("surface#{_0}")]
pub struct SurfaceId(pub u32);

/// A display output, as identified by the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("output#{_0}")]
pub struct OutputId(pub u32);

/// The per-output state the scene renders into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[display("render-target#{_0}")]
pub struct RenderTarget(Id);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Tree,
    Rect,
    /// A node that displays a buffer. Buffers that were not submitted by a client surface have no
    /// surface.
    Buffer { surface: Option<SurfaceId> },
}

/// The result of a topmost-node query.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodeHit {
    pub node: NodeId,
    /// The queried position relative to the node's origin. For buffer nodes of a surface this is
    /// the surface-local position.
    pub local: Point,
}

pub trait Scene {
    fn root(&self) -> NodeId;

    /// Create the subtree that displays `surface` (and later its subsurfaces) below `parent`.
    fn create_surface_tree(&mut self, parent: NodeId, surface: SurfaceId) -> Result<NodeId>;

    /// The surface subtree `node` belongs to, if any.
    fn surface_tree_of(&self, node: NodeId) -> Option<NodeId>;

    /// Destroy the node and everything below it.
    fn destroy_node(&mut self, node: NodeId);

    /// Move the node above all its siblings.
    fn raise_to_top(&mut self, node: NodeId);

    /// Disabled nodes and everything below them are neither rendered nor hit.
    fn set_enabled(&mut self, node: NodeId, enabled: bool);

    /// The topmost enabled node that contains the layout-space `position`.
    fn node_at(&self, position: Point) -> Option<NodeHit>;

    fn node_kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Make `output` render the part of the scene covered by `area`.
    fn attach_output(&mut self, output: OutputId, area: Rect) -> RenderTarget;

    fn detach_output(&mut self, output: OutputId);

    /// `None` if the output was never attached.
    fn render_target(&self, output: OutputId) -> Option<RenderTarget>;

    /// Render the damaged parts of the scene and commit them to the output.
    fn commit(&mut self, target: RenderTarget) -> Result<()>;

    /// Tell the surfaces visible on the target that the frame was presented at `timestamp`
    /// (monotonic clock).
    fn send_frame_done(&mut self, target: RenderTarget, timestamp: Duration);
}
