//! Visibility/culling pipeline (spec.md §4.3): wires together render-object
//! cull, meshlet cull, and the triangle cull-draw loop, and drives the
//! reocclusion sub-phase that repeats steps 1-4 against the current frame's
//! Hi-Z.
//!
//! Individual compute/rasterization dispatches are out of scope for host
//! testing (spec.md's device abstraction models GPU work as opaque), so
//! each stage is expressed as a plain function over CPU-visible inputs;
//! `run_view_pipeline` is the one place that sequences them the way the
//! graph's passes would.

pub mod meshlet;
pub mod render_object;
pub mod triangle;

pub use meshlet::{cull_meshlets, MeshletInfo};
pub use render_object::{cull_render_objects, popcount, sphere_intersects_frustum, BoundingSphere, Frustum};
pub use triangle::{run_triangle_cull_draw_loop, BatchIteration, BatchSlot};

use crate::scene::view::SceneView;
use crate::scene::visibility::PersistentVisibility;

/// Output of one render-object-cull + meshlet-cull pass (spec.md §4.3 steps
/// 1-2) for a single view.
#[derive(Clone)]
pub struct CullResults {
    pub render_object_visible: Vec<u64>,
    pub visible_meshlets: Vec<u32>,
    pub meshlet_count: u32,
}

/// Runs render-object cull then meshlet cull for one view (spec.md §4.3
/// steps 1-2). `occlusion_test` stands in for a Hi-Z-backed screen-space
/// depth comparison; pass `None` for views without `OCCLUSION_CULL`.
pub fn cull_view<F>(
    view: &SceneView,
    spheres: &[BoundingSphere],
    meshlets: &[MeshletInfo],
    occlusion_test: Option<F>,
) -> CullResults
where
    F: Fn(&BoundingSphere) -> bool,
{
    let render_object_visible = cull_render_objects(spheres, &view.camera.view_proj, occlusion_test);
    let frustum = Frustum::from_view_proj(&view.camera.view_proj);
    let (visible_meshlets, meshlet_count) =
        cull_meshlets(meshlets, &render_object_visible, &frustum, view.camera.position);
    CullResults { render_object_visible, visible_meshlets, meshlet_count }
}

fn bitset_from_indices(indices: &[u32], len_hint: usize) -> Vec<u64> {
    let mut bits = vec![0u64; (len_hint / 64 + 1).max(1)];
    for &i in indices {
        let i = i as usize;
        if i / 64 >= bits.len() {
            bits.resize(i / 64 + 1, 0);
        }
        bits[i / 64] |= 1 << (i % 64);
    }
    bits
}

/// Runs the full per-view pipeline (spec.md §4.3 steps 1-5): a first cull
/// pass against the previous frame's Hi-Z, then (when the view requests
/// `OCCLUSION_CULL`) a reocclusion pass against the current frame's Hi-Z,
/// merging in any objects that became visible late in the frame without
/// ever discarding what the first pass already found. `persistent` is
/// updated in place with the merged visibility (spec.md §3.5 invariant 5).
pub fn run_view_pipeline<F1, F2>(
    view: &SceneView,
    spheres: &[BoundingSphere],
    meshlets: &[MeshletInfo],
    persistent: &mut PersistentVisibility,
    previous_hiz_occlusion_test: Option<F1>,
    current_hiz_occlusion_test: Option<F2>,
) -> (CullResults, CullResults)
where
    F1: Fn(&BoundingSphere) -> bool,
    F2: Fn(&BoundingSphere) -> bool,
{
    let first_pass = cull_view(view, spheres, meshlets, previous_hiz_occlusion_test);

    let reocclusion = if view.is_occlusion_cull() {
        cull_view(view, spheres, meshlets, current_hiz_occlusion_test)
    } else {
        first_pass.clone()
    };

    let merged_object_bits: Vec<u64> = first_pass
        .render_object_visible
        .iter()
        .zip(reocclusion.render_object_visible.iter())
        .map(|(a, b)| a | b)
        .collect();
    persistent.set_object_bits(merged_object_bits);

    let merged_meshlet_indices: Vec<u32> = {
        let mut all = first_pass.visible_meshlets.clone();
        all.extend(reocclusion.visible_meshlets.iter().copied());
        all.sort_unstable();
        all.dedup();
        all
    };
    persistent.set_meshlet_bits(bitset_from_indices(&merged_meshlet_indices, meshlets.len()));

    (first_pass, reocclusion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::view::{ViewInfo, VisibilityFlags};
    use nalgebra_glm as glm;

    fn view(flags: VisibilityFlags) -> SceneView {
        SceneView {
            camera: ViewInfo { view_proj: glm::Mat4::identity(), position: glm::vec3(0.0, 0.0, -5.0) },
            resolution: (1920, 1080),
            flags,
        }
    }

    fn sphere_at(x: f32) -> BoundingSphere {
        BoundingSphere { center: glm::vec3(x, 0.0, 0.0), radius: 0.1 }
    }

    fn front_facing_meshlet(render_object_index: u32, center: f32) -> MeshletInfo {
        MeshletInfo {
            render_object_index,
            bounding_sphere: sphere_at(center),
            cone_axis: glm::vec3(0.0, 0.0, 1.0),
            cone_cutoff: -1.0,
            triangle_count: 32,
        }
    }

    #[test]
    fn shadow_view_ignores_occlusion_cull() {
        // Concrete scenario 5 (spec.md §8): "shadow-view ignores
        // OcclusionCull" — ObjectOnly-frustum-culled results, an occlusion
        // predicate that would hide everything must never run.
        let shadow_view = view(VisibilityFlags::empty());
        let spheres = vec![sphere_at(0.0)];
        let meshlets = vec![front_facing_meshlet(0, 0.0)];
        let mut persistent = PersistentVisibility::with_object_count(1);

        let reject_everything = |_: &BoundingSphere| false;
        let (first, reocclusion) =
            run_view_pipeline(&shadow_view, &spheres, &meshlets, &mut persistent, Some(reject_everything), None::<fn(&BoundingSphere) -> bool>);

        assert_eq!(popcount(&first.render_object_visible), 1);
        assert_eq!(reocclusion.meshlet_count, first.meshlet_count);
        assert!(persistent.get_object(0));
    }

    #[test]
    fn reocclusion_adds_objects_without_dropping_first_pass_visibility() {
        let primary = view(VisibilityFlags::OCCLUSION_CULL | VisibilityFlags::IS_PRIMARY);
        let spheres = vec![sphere_at(0.0), sphere_at(0.5)];
        let meshlets = vec![front_facing_meshlet(0, 0.0), front_facing_meshlet(1, 0.5)];
        let mut persistent = PersistentVisibility::with_object_count(2);

        // Previous Hi-Z hides object 1; current Hi-Z (post step-4 depth)
        // reveals it.
        let previous_hiz = |s: &BoundingSphere| s.center.x < 0.25;
        let current_hiz = |_: &BoundingSphere| true;

        run_view_pipeline(&primary, &spheres, &meshlets, &mut persistent, Some(previous_hiz), Some(current_hiz));

        assert!(persistent.get_object(0));
        assert!(persistent.get_object(1));
    }
}
