use log::debug;

use perch_geometry::Point;
use perch_scene::{NodeKind, Scene, SurfaceId};

use crate::{ViewId, view_manager::ViewRegistry};

/// What is below a layout position.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Hit {
    /// The view the hit surface belongs to. `None` for surfaces that are not part of a view.
    pub view: Option<ViewId>,
    pub surface: Option<SurfaceId>,
    /// Surface-local position.
    pub local: Point,
}

pub trait HitTester {
    fn hit_test(&self, position: Point) -> Hit;
}

/// Hit tests the scene and resolves surface subtrees to views through the registry's side table.
pub(crate) struct SceneHitTester<'a> {
    scene: &'a dyn Scene,
    views: &'a ViewRegistry,
}

impl<'a> SceneHitTester<'a> {
    pub fn new(scene: &'a dyn Scene, views: &'a ViewRegistry) -> Self {
        Self { scene, views }
    }
}

impl HitTester for SceneHitTester<'_> {
    fn hit_test(&self, position: Point) -> Hit {
        let Some(node_hit) = self.scene.node_at(position) else {
            return Hit::default();
        };

        // Only client buffers count. Decorations and compositor-drawn buffers are not a target.
        let Some(NodeKind::Buffer {
            surface: Some(surface),
        }) = self.scene.node_kind(node_hit.node)
        else {
            return Hit::default();
        };

        let view = self
            .scene
            .surface_tree_of(node_hit.node)
            .and_then(|tree| self.views.owner_of(tree));
        if view.is_none() {
            debug!("{surface} at {position} does not belong to a view");
        }

        Hit {
            view,
            surface: Some(surface),
            local: node_hit.local,
        }
    }
}
