//! Scene data (spec.md §3.4): an immutable template shared by every
//! instance (`SceneInfo`) plus the mutable per-instance state that actually
//! gets drawn (`Scene`).

pub mod hierarchy;
pub mod render_object_set;
pub mod view;
pub mod visibility;

pub use hierarchy::{Hierarchy, HierarchyNode, NodeKind};
pub use render_object_set::{RenderObjectSet, MAX_BUCKETS_PER_SET};
pub use view::{SceneView, ViewInfo, VisibilityFlags};
pub use visibility::{PersistentVisibility, SceneMultiviewVisibility, MAX_VIEWS};

use std::sync::Arc;

use crate::cull::BoundingSphere;

/// Everything about a scene that is shared, read-only, and identical across
/// every instance drawn from it: bounding geometry, per-object meshlet
/// counts, and the node hierarchy (spec.md §3.4).
#[derive(Clone, Default)]
pub struct SceneInfo {
    pub bounding_spheres: Vec<BoundingSphere>,
    pub meshlet_counts: Vec<u32>,
    pub hierarchy: Hierarchy,
}

impl SceneInfo {
    pub fn new(bounding_spheres: Vec<BoundingSphere>, meshlet_counts: Vec<u32>, hierarchy: Hierarchy) -> Self {
        assert_eq!(
            bounding_spheres.len(),
            meshlet_counts.len(),
            "bounding_spheres and meshlet_counts must describe the same render objects"
        );
        SceneInfo { bounding_spheres, meshlet_counts, hierarchy }
    }

    pub fn render_object_count(&self) -> usize {
        self.bounding_spheres.len()
    }
}

/// A mutable, drawable instance of a [`SceneInfo`] template, carrying the
/// render-object-set buckets used to filter which objects each pass draws.
#[derive(Clone)]
pub struct Scene {
    pub info: Arc<SceneInfo>,
    pub render_object_sets: Vec<RenderObjectSet>,
}

impl Scene {
    pub fn new(info: Arc<SceneInfo>) -> Self {
        Scene { info, render_object_sets: Vec::new() }
    }

    pub fn add_render_object_set(&mut self, set: RenderObjectSet) -> usize {
        let index = self.render_object_sets.len();
        self.render_object_sets.push(set);
        index
    }

    pub fn render_object_set(&self, index: usize) -> &RenderObjectSet {
        &self.render_object_sets[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm as glm;

    fn sphere(x: f32) -> BoundingSphere {
        BoundingSphere { center: glm::vec3(x, 0.0, 0.0), radius: 1.0 }
    }

    #[test]
    #[should_panic(expected = "same render objects")]
    fn mismatched_sphere_and_meshlet_count_lengths_panics() {
        SceneInfo::new(vec![sphere(0.0), sphere(1.0)], vec![1], Hierarchy::new());
    }

    #[test]
    fn render_object_count_matches_bounding_sphere_count() {
        let info = SceneInfo::new(vec![sphere(0.0), sphere(1.0), sphere(2.0)], vec![1, 2, 1], Hierarchy::new());
        assert_eq!(info.render_object_count(), 3);
    }

    #[test]
    fn scene_tracks_render_object_sets_added_to_it() {
        let info = Arc::new(SceneInfo::new(vec![sphere(0.0)], vec![1], Hierarchy::new()));
        let mut scene = Scene::new(info);
        let index = scene.add_render_object_set(RenderObjectSet::new("opaque"));
        assert_eq!(scene.render_object_set(index).name, "opaque");
    }
}
