//! Toplevel views, their lifecycle, and the popups attached to them.
//!
//! A view is created for every new toplevel and lives until its surface is destroyed. Only mapped
//! views are in the stacking order, which lists them most recently focused first.
use std::collections::HashMap;

use derive_more::Display;
use log::{debug, error, info, warn};

use perch_scene::{NodeId, SurfaceId};
use perch_util::{Id, IdTable, Subscription};

use crate::{Server, XdgRole, XdgSurface, events::SurfaceSignals};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[display("view#{_0}")]
pub struct ViewId(Id);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum ViewState {
    Created,
    Mapped,
    Unmapped,
}

#[derive(Debug)]
pub struct View {
    surface: SurfaceId,
    /// The view's subtree in the scene.
    tree: NodeId,
    state: ViewState,
    listeners: ViewListeners,
}

impl View {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn tree(&self) -> NodeId {
        self.tree
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_mapped(&self) -> bool {
        self.state == ViewState::Mapped
    }
}

#[derive(Debug)]
struct ViewListeners {
    map: Subscription,
    unmap: Subscription,
    destroy: Subscription,
    request_fullscreen: Subscription,
}

impl ViewListeners {
    fn subscribe(signals: &mut SurfaceSignals, surface: SurfaceId) -> Self {
        Self {
            map: signals
                .map
                .subscribe(move |server: &mut Server, _| server.on_view_map(surface)),
            unmap: signals
                .unmap
                .subscribe(move |server: &mut Server, _| server.on_view_unmap(surface)),
            destroy: signals
                .destroy
                .subscribe(move |server: &mut Server, _| server.on_view_destroy(surface)),
            request_fullscreen: signals.request_fullscreen.subscribe(
                move |server: &mut Server, fullscreen| {
                    server.on_view_request_fullscreen(surface, *fullscreen)
                },
            ),
        }
    }

    fn unsubscribe(self, signals: Option<&mut SurfaceSignals>) {
        if let Some(signals) = signals {
            signals.map.unsubscribe(self.map);
            signals.unmap.unsubscribe(self.unmap);
            signals.destroy.unsubscribe(self.destroy);
            signals.request_fullscreen.unsubscribe(self.request_fullscreen);
        }
    }
}

/// The scene subtree of an xdg surface, view or popup.
#[derive(Debug, Copy, Clone)]
struct SurfaceTree {
    node: NodeId,
    /// The surface this one is nested in, for popups.
    parent: Option<SurfaceId>,
    /// The view the subtree belongs to.
    owner: Option<ViewId>,
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: IdTable<View>,
    /// Mapped views, front is top.
    stack: Vec<ViewId>,
    by_surface: HashMap<SurfaceId, ViewId>,

    // The scene never points back at us. These side tables answer "which view is this node" and
    // "where do children of this surface go".
    owners: HashMap<NodeId, ViewId>,
    trees: HashMap<SurfaceId, SurfaceTree>,
}

impl ViewRegistry {
    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(id.0)
    }

    fn get_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.get_mut(id.0)
    }

    pub fn find(&self, surface: SurfaceId) -> Option<ViewId> {
        self.by_surface.get(&surface).copied()
    }

    /// Every view, mapped or not.
    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &View)> {
        self.views.iter().map(|(id, view)| (ViewId(id), view))
    }

    /// Mapped views, top to bottom.
    pub fn stack(&self) -> &[ViewId] {
        &self.stack
    }

    pub fn is_linked(&self, id: ViewId) -> bool {
        self.stack.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The view a scene subtree belongs to.
    pub fn owner_of(&self, tree: NodeId) -> Option<ViewId> {
        self.owners.get(&tree).copied()
    }

    fn insert(&mut self, view: View) -> ViewId {
        let surface = view.surface;
        let tree = view.tree;
        let id = ViewId(self.views.insert(view));
        self.by_surface.insert(surface, id);
        self.record_tree(
            surface,
            SurfaceTree {
                node: tree,
                parent: None,
                owner: Some(id),
            },
        );
        id
    }

    /// Remove the view from the registry, including the stacking order. Its scene subtree stays
    /// recorded until the surface is released.
    fn remove(&mut self, id: ViewId) -> Option<View> {
        let view = self.views.take(id.0)?;
        self.unlink(id);
        self.by_surface.remove(&view.surface);
        Some(view)
    }

    /// Move the view to the top of the stacking order, linking it if it was not.
    pub(crate) fn link_front(&mut self, id: ViewId) {
        self.unlink(id);
        self.stack.insert(0, id);
    }

    fn unlink(&mut self, id: ViewId) -> bool {
        let len = self.stack.len();
        self.stack.retain(|linked| *linked != id);
        self.stack.len() != len
    }

    fn record_tree(&mut self, surface: SurfaceId, tree: SurfaceTree) {
        if let Some(owner) = tree.owner {
            self.owners.insert(tree.node, owner);
        }
        self.trees.insert(surface, tree);
    }

    /// Forget the subtree of `surface` and those of all surfaces nested in it. Returns the
    /// subtree's node. Nested subtrees are part of it in the scene.
    fn forget_tree(&mut self, surface: SurfaceId) -> Option<NodeId> {
        let tree = self.trees.remove(&surface)?;
        self.owners.remove(&tree.node);
        let nested: Vec<SurfaceId> = self
            .trees
            .iter()
            .filter(|(_, t)| t.parent == Some(surface))
            .map(|(s, _)| *s)
            .collect();
        for surface in nested {
            self.forget_tree(surface);
        }
        Some(tree.node)
    }

    fn surfaces(&self) -> Vec<SurfaceId> {
        self.views.iter().map(|(_, view)| view.surface).collect()
    }
}

impl Server {
    pub(crate) fn on_new_xdg_surface(&mut self, xdg: &XdgSurface) {
        match xdg.role {
            XdgRole::Toplevel => self.create_view(xdg.surface),
            XdgRole::Popup { parent } => self.attach_popup(xdg.surface, parent),
            XdgRole::None => {
                error!("{} has no xdg role, ignoring it", xdg.surface);
            }
        }
    }

    fn create_view(&mut self, surface: SurfaceId) {
        if self.views.find(surface).is_some() {
            warn!("Toplevel {surface} announced twice, ignoring");
            return;
        }

        let root = self.scene.root();
        let tree = match self.scene.create_surface_tree(root, surface) {
            Ok(tree) => tree,
            Err(e) => {
                error!("Failed to create the scene tree of {surface}, abandoning it: {e:?}");
                return;
            }
        };
        // Not visible before the client maps it.
        self.scene.set_enabled(tree, false);

        let Some(signals) = self.sources.surfaces.get_mut(&surface) else {
            error!("{surface} has no event sources, abandoning it");
            self.scene.destroy_node(tree);
            return;
        };
        let listeners = ViewListeners::subscribe(signals, surface);

        let id = self.views.insert(View {
            surface,
            tree,
            state: ViewState::Created,
            listeners,
        });
        info!("New {id} for toplevel {surface}");
    }

    fn attach_popup(&mut self, surface: SurfaceId, parent: SurfaceId) {
        let Some(parent_tree) = self.views.trees.get(&parent).copied() else {
            error!("Parent {parent} of popup {surface} has no scene tree, ignoring the popup");
            return;
        };
        let node = match self.scene.create_surface_tree(parent_tree.node, surface) {
            Ok(node) => node,
            Err(e) => {
                error!("Failed to create the scene tree of popup {surface}: {e:?}");
                return;
            }
        };
        self.views.record_tree(
            surface,
            SurfaceTree {
                node,
                parent: Some(parent),
                owner: parent_tree.owner,
            },
        );
        debug!("Attached popup {surface} to {parent}");
    }

    fn on_view_map(&mut self, surface: SurfaceId) {
        let Some(id) = self.views.find(surface) else {
            warn!("Map of unknown toplevel {surface}");
            return;
        };
        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        view.state = ViewState::Mapped;
        let tree = view.tree;
        self.scene.set_enabled(tree, true);
        self.views.link_front(id);
        info!("Mapped {id}");

        self.focus_view(id, surface);
    }

    fn on_view_unmap(&mut self, surface: SurfaceId) {
        let Some(id) = self.views.find(surface) else {
            warn!("Unmap of unknown toplevel {surface}");
            return;
        };
        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        view.state = ViewState::Unmapped;
        let tree = view.tree;
        self.scene.set_enabled(tree, false);
        if !self.views.unlink(id) {
            debug!("{id} was not in the stacking order");
        }
        info!("Unmapped {id}");
    }

    fn on_view_destroy(&mut self, surface: SurfaceId) {
        let Some(id) = self.views.find(surface) else {
            warn!("Destroy of unknown toplevel {surface}");
            return;
        };
        let Some(view) = self.views.remove(id) else {
            return;
        };
        view.listeners
            .unsubscribe(self.sources.surfaces.get_mut(&surface));
        info!("Destroyed {id}");
    }

    /// Forward the request. Views have no fullscreen state of their own.
    fn on_view_request_fullscreen(&mut self, surface: SurfaceId, fullscreen: bool) {
        debug!("{surface} requests fullscreen: {fullscreen}");
        self.shell.set_fullscreen(surface, fullscreen);
    }

    /// Drop the scene subtree of a destroyed xdg surface, including nested popups.
    pub(crate) fn release_surface_tree(&mut self, surface: SurfaceId) {
        if let Some(node) = self.views.forget_tree(surface) {
            self.scene.destroy_node(node);
        }
    }

    pub(crate) fn release_views(&mut self) {
        for surface in self.views.surfaces() {
            self.on_view_destroy(surface);
            self.release_surface_tree(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use perch_geometry::Rect;
    use perch_scene::{Scene, SceneGraph};

    // Views are only constructed by the server. The registry's bookkeeping is tested with views
    // whose listeners come from throwaway signals.
    fn view(surface: u32, node: NodeId) -> (View, SurfaceSignals) {
        let mut signals = SurfaceSignals::default();
        let surface = SurfaceId(surface);
        let listeners = ViewListeners::subscribe(&mut signals, surface);
        (
            View {
                surface,
                tree: node,
                state: ViewState::Created,
                listeners,
            },
            signals,
        )
    }

    fn nodes(count: usize) -> Vec<NodeId> {
        let scene = SceneGraph::new();
        let root = scene.root();
        (0..count)
            .map(|_| scene.add_rect(root, Rect::ZERO).unwrap())
            .collect()
    }

    #[test]
    fn stacking_order_is_front_first() {
        let nodes = nodes(3);
        let mut registry = ViewRegistry::default();
        let mut signals = Vec::new();
        let ids: Vec<ViewId> = (0..3)
            .map(|i| {
                let (view, s) = view(i, nodes[i as usize]);
                signals.push(s);
                registry.insert(view)
            })
            .collect();

        registry.link_front(ids[0]);
        registry.link_front(ids[1]);
        registry.link_front(ids[2]);
        assert_eq!(registry.stack(), [ids[2], ids[1], ids[0]]);

        registry.link_front(ids[0]);
        assert_eq!(registry.stack(), [ids[0], ids[2], ids[1]]);

        assert!(registry.unlink(ids[2]));
        assert!(!registry.unlink(ids[2]));
        assert_eq!(registry.stack(), [ids[0], ids[1]]);

        for (id, mut s) in ids.into_iter().zip(signals) {
            let view = registry.remove(id).unwrap();
            view.listeners.unsubscribe(Some(&mut s));
        }
        assert!(registry.stack().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn nested_trees_are_forgotten_with_their_parent() {
        let nodes = nodes(3);
        let mut registry = ViewRegistry::default();
        let (view, mut signals) = view(1, nodes[0]);
        let id = registry.insert(view);
        registry.record_tree(
            SurfaceId(2),
            SurfaceTree {
                node: nodes[1],
                parent: Some(SurfaceId(1)),
                owner: Some(id),
            },
        );
        registry.record_tree(
            SurfaceId(3),
            SurfaceTree {
                node: nodes[2],
                parent: Some(SurfaceId(2)),
                owner: Some(id),
            },
        );
        assert_eq!(registry.owner_of(nodes[2]), Some(id));

        assert_eq!(registry.forget_tree(SurfaceId(1)), Some(nodes[0]));
        assert!(registry.trees.is_empty());
        assert!(registry.owners.is_empty());

        let view = registry.remove(id).unwrap();
        view.listeners.unsubscribe(Some(&mut signals));
    }
}
