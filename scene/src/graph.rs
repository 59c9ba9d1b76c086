use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Duration};

use anyhow::{Result, anyhow, bail};
use log::{debug, warn};

use perch_geometry::{Contains, Point, Rect, Size};
use perch_util::IdTable;

use crate::{NodeHit, NodeId, NodeKind, OutputId, RenderTarget, Scene, SurfaceId};

/// An in-memory scene graph.
///
/// Cloning creates another handle to the same graph, so that whoever drives the clients (tests, a
/// headless session) can commit surface sizes and move nodes while the compositor owns the scene.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    inner: Rc<RefCell<Graph>>,
}

#[derive(Debug)]
struct Graph {
    nodes: IdTable<Node>,
    root: NodeId,
    /// Sizes of the most recent buffer each surface committed.
    surface_sizes: HashMap<SurfaceId, Size>,
    targets: IdTable<TargetState>,
    outputs: HashMap<OutputId, RenderTarget>,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    /// Bottom to top.
    children: Vec<NodeId>,
    /// Relative to the parent.
    position: Point,
    enabled: bool,
    data: NodeData,
}

#[derive(Debug)]
enum NodeData {
    Tree {
        surface: Option<SurfaceId>,
    },
    Rect {
        size: Size,
    },
    Buffer {
        surface: Option<SurfaceId>,
        size: Size,
        tree: Option<NodeId>,
    },
}

#[derive(Debug)]
struct TargetState {
    output: OutputId,
    area: Rect,
    commits: usize,
    failing: bool,
    frames_done: Vec<Duration>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = IdTable::default();
        let root = NodeId(nodes.insert(Node::new(None, NodeData::Tree { surface: None })));
        Self {
            inner: Rc::new(RefCell::new(Graph {
                nodes,
                root,
                surface_sizes: HashMap::new(),
                targets: IdTable::default(),
                outputs: HashMap::new(),
            })),
        }
    }

    /// A client committed a buffer of `size` for `surface`.
    pub fn commit_surface(&self, surface: SurfaceId, size: impl Into<Size>) {
        let size = size.into();
        let mut graph = self.inner.borrow_mut();
        graph.surface_sizes.insert(surface, size);
        for (_, node) in graph.nodes.iter_mut() {
            if let NodeData::Buffer {
                surface: Some(s),
                size: buffer_size,
                ..
            } = &mut node.data
                && *s == surface
            {
                *buffer_size = size;
            }
        }
    }

    pub fn set_position(&self, node: NodeId, position: impl Into<Point>) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(node.0) {
            node.position = position.into();
        }
    }

    pub fn set_enabled(&self, node: NodeId, enabled: bool) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(node.0) {
            node.enabled = enabled;
        }
    }

    /// Add a solid color rectangle below `parent`.
    pub fn add_rect(&self, parent: NodeId, area: Rect) -> Result<NodeId> {
        self.inner
            .borrow_mut()
            .add_node(parent, area.origin(), NodeData::Rect { size: area.size() })
    }

    /// Add a buffer that no client surface submitted (e.g. a compositor-drawn texture).
    pub fn add_buffer(&self, parent: NodeId, area: Rect) -> Result<NodeId> {
        self.inner.borrow_mut().add_node(
            parent,
            area.origin(),
            NodeData::Buffer {
                surface: None,
                size: area.size(),
                tree: None,
            },
        )
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(node.0)?.parent
    }

    /// Children of `node`, bottom to top.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.inner.borrow().nodes.contains(node.0)
    }

    pub fn commits(&self, output: OutputId) -> usize {
        self.with_target(output, |t| t.commits).unwrap_or_default()
    }

    pub fn frames_done(&self, output: OutputId) -> Vec<Duration> {
        self.with_target(output, |t| t.frames_done.clone())
            .unwrap_or_default()
    }

    /// Make commits to the output's render target fail, like a renderer or backend would when
    /// the output is not able to present.
    pub fn set_commit_failure(&self, output: OutputId, failing: bool) {
        let mut graph = self.inner.borrow_mut();
        if let Some(target) = graph.outputs.get(&output).copied()
            && let Some(state) = graph.targets.get_mut(target.0)
        {
            state.failing = failing;
        }
    }

    fn with_target<R>(&self, output: OutputId, f: impl FnOnce(&TargetState) -> R) -> Option<R> {
        let graph = self.inner.borrow();
        let target = graph.outputs.get(&output)?;
        graph.targets.get(target.0).map(f)
    }
}

impl Scene for SceneGraph {
    fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    fn create_surface_tree(&mut self, parent: NodeId, surface: SurfaceId) -> Result<NodeId> {
        let mut graph = self.inner.borrow_mut();
        let tree = graph.add_node(
            parent,
            Point::ZERO,
            NodeData::Tree {
                surface: Some(surface),
            },
        )?;
        let size = graph
            .surface_sizes
            .get(&surface)
            .copied()
            .unwrap_or_default();
        graph.add_node(
            tree,
            Point::ZERO,
            NodeData::Buffer {
                surface: Some(surface),
                size,
                tree: Some(tree),
            },
        )?;
        debug!("Created {tree} for {surface} below {parent}");
        Ok(tree)
    }

    fn surface_tree_of(&self, node: NodeId) -> Option<NodeId> {
        match self.inner.borrow().nodes.get(node.0)?.data {
            NodeData::Tree { surface: Some(_) } => Some(node),
            NodeData::Buffer { tree, .. } => tree,
            NodeData::Tree { surface: None } | NodeData::Rect { .. } => None,
        }
    }

    fn destroy_node(&mut self, node: NodeId) {
        let mut graph = self.inner.borrow_mut();
        if node == graph.root {
            warn!("Refusing to destroy the scene root");
            return;
        }
        let Some(parent) = graph.nodes.get(node.0).map(|n| n.parent) else {
            return;
        };
        if let Some(parent) = parent
            && let Some(parent) = graph.nodes.get_mut(parent.0)
        {
            parent.children.retain(|child| *child != node);
        }
        graph.remove_recursive(node);
    }

    fn raise_to_top(&mut self, node: NodeId) {
        let mut graph = self.inner.borrow_mut();
        let Some(parent) = graph.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent) = graph.nodes.get_mut(parent.0) {
            parent.children.retain(|child| *child != node);
            parent.children.push(node);
        }
    }

    fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        SceneGraph::set_enabled(self, node, enabled);
    }

    fn node_at(&self, position: Point) -> Option<NodeHit> {
        let graph = self.inner.borrow();
        graph.node_at(graph.root, position)
    }

    fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        Some(match self.inner.borrow().nodes.get(node.0)?.data {
            NodeData::Tree { .. } => NodeKind::Tree,
            NodeData::Rect { .. } => NodeKind::Rect,
            NodeData::Buffer { surface, .. } => NodeKind::Buffer { surface },
        })
    }

    fn attach_output(&mut self, output: OutputId, area: Rect) -> RenderTarget {
        let mut graph = self.inner.borrow_mut();
        if let Some(target) = graph.outputs.get(&output).copied() {
            if let Some(state) = graph.targets.get_mut(target.0) {
                state.area = area;
            }
            return target;
        }
        let target = RenderTarget(graph.targets.insert(TargetState {
            output,
            area,
            commits: 0,
            failing: false,
            frames_done: Vec::new(),
        }));
        graph.outputs.insert(output, target);
        target
    }

    fn detach_output(&mut self, output: OutputId) {
        let mut graph = self.inner.borrow_mut();
        if let Some(target) = graph.outputs.remove(&output) {
            let _ = graph.targets.take(target.0);
        }
    }

    fn render_target(&self, output: OutputId) -> Option<RenderTarget> {
        self.inner.borrow().outputs.get(&output).copied()
    }

    fn commit(&mut self, target: RenderTarget) -> Result<()> {
        let mut graph = self.inner.borrow_mut();
        let state = graph
            .targets
            .get_mut(target.0)
            .ok_or_else(|| anyhow!("{target} does not exist"))?;
        if state.failing {
            bail!("{} rejected the commit of {target}", state.output);
        }
        state.commits += 1;
        Ok(())
    }

    fn send_frame_done(&mut self, target: RenderTarget, timestamp: Duration) {
        if let Some(state) = self.inner.borrow_mut().targets.get_mut(target.0) {
            state.frames_done.push(timestamp);
        }
    }
}

impl Graph {
    fn add_node(&mut self, parent: NodeId, position: Point, data: NodeData) -> Result<NodeId> {
        if !self.nodes.contains(parent.0) {
            bail!("Parent {parent} does not exist");
        }
        let mut new = Node::new(Some(parent), data);
        new.position = position;
        let node = NodeId(self.nodes.insert(new));
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(node);
        }
        Ok(node)
    }

    fn remove_recursive(&mut self, node: NodeId) {
        if let Some(removed) = self.nodes.take(node.0) {
            for child in removed.children {
                self.remove_recursive(child);
            }
        }
    }

    /// `position` is relative to the parent of `node`.
    fn node_at(&self, node: NodeId, position: Point) -> Option<NodeHit> {
        let n = self.nodes.get(node.0)?;
        if !n.enabled {
            return None;
        }
        let local = position - n.position;
        match &n.data {
            NodeData::Tree { .. } => n
                .children
                .iter()
                .rev()
                .find_map(|child| self.node_at(*child, local)),
            NodeData::Rect { size } | NodeData::Buffer { size, .. } => Rect::from_size(*size)
                .contains(local)
                .then_some(NodeHit { node, local }),
        }
    }
}

impl Node {
    fn new(parent: Option<NodeId>, data: NodeData) -> Self {
        Self {
            parent,
            children: Vec::new(),
            position: Point::ZERO,
            enabled: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_at(scene: &mut SceneGraph, surface: u32, origin: (f64, f64)) -> NodeId {
        let root = scene.root();
        let tree = scene
            .create_surface_tree(root, SurfaceId(surface))
            .unwrap();
        scene.commit_surface(SurfaceId(surface), (100.0, 100.0));
        scene.set_position(tree, origin);
        tree
    }

    #[test]
    fn hit_returns_surface_local_position() {
        let mut scene = SceneGraph::new();
        let tree = surface_at(&mut scene, 1, (50.0, 20.0));

        let hit = scene.node_at((60.0, 25.0).into()).unwrap();
        assert_eq!(hit.local, Point::new(10.0, 5.0));
        assert_eq!(
            scene.node_kind(hit.node),
            Some(NodeKind::Buffer {
                surface: Some(SurfaceId(1))
            })
        );
        assert_eq!(scene.surface_tree_of(hit.node), Some(tree));
        assert_eq!(scene.node_at((10.0, 10.0).into()), None);
    }

    #[test]
    fn topmost_sibling_wins_and_raise_reorders() {
        let mut scene = SceneGraph::new();
        let first = surface_at(&mut scene, 1, (0.0, 0.0));
        let second = surface_at(&mut scene, 2, (50.0, 50.0));

        let hit = scene.node_at((75.0, 75.0).into()).unwrap();
        assert_eq!(scene.surface_tree_of(hit.node), Some(second));

        scene.raise_to_top(first);
        let hit = scene.node_at((75.0, 75.0).into()).unwrap();
        assert_eq!(scene.surface_tree_of(hit.node), Some(first));
    }

    #[test]
    fn uncommitted_surface_is_not_hit() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        scene.create_surface_tree(root, SurfaceId(3)).unwrap();
        assert_eq!(scene.node_at((0.0, 0.0).into()), None);
    }

    #[test]
    fn nested_tree_hits_use_accumulated_offsets() {
        let mut scene = SceneGraph::new();
        let parent = surface_at(&mut scene, 1, (100.0, 100.0));
        let popup = scene.create_surface_tree(parent, SurfaceId(2)).unwrap();
        scene.commit_surface(SurfaceId(2), (20.0, 20.0));
        scene.set_position(popup, (10.0, 10.0));

        let hit = scene.node_at((115.0, 115.0).into()).unwrap();
        assert_eq!(scene.surface_tree_of(hit.node), Some(popup));
        assert_eq!(hit.local, Point::new(5.0, 5.0));
    }

    #[test]
    fn destroy_removes_subtree() {
        let mut scene = SceneGraph::new();
        let parent = surface_at(&mut scene, 1, (0.0, 0.0));
        let popup = scene.create_surface_tree(parent, SurfaceId(2)).unwrap();

        scene.destroy_node(parent);
        assert!(!scene.contains_node(parent));
        assert!(!scene.contains_node(popup));
        assert!(scene.children(scene.root()).is_empty());
        assert_eq!(scene.node_at((5.0, 5.0).into()), None);
    }

    #[test]
    fn disabled_nodes_are_skipped() {
        let mut scene = SceneGraph::new();
        let tree = surface_at(&mut scene, 1, (0.0, 0.0));
        scene.set_enabled(tree, false);
        assert_eq!(scene.node_at((5.0, 5.0).into()), None);
    }

    #[test]
    fn render_targets_follow_attachment() {
        let mut scene = SceneGraph::new();
        let output = OutputId(7);
        assert_eq!(scene.render_target(output), None);

        let target = scene.attach_output(output, Rect::from_size((1920.0, 1080.0)));
        assert_eq!(scene.render_target(output), Some(target));
        assert_eq!(scene.attach_output(output, Rect::ZERO), target);

        scene.commit(target).unwrap();
        scene.send_frame_done(target, Duration::from_millis(16));
        assert_eq!(scene.commits(output), 1);
        assert_eq!(scene.frames_done(output), [Duration::from_millis(16)]);

        scene.set_commit_failure(output, true);
        assert!(scene.commit(target).is_err());

        scene.detach_output(output);
        assert_eq!(scene.render_target(output), None);
        assert!(scene.commit(target).is_err());
    }
}
