//! Meshlet cull (spec.md §4.3 stage 2): reads render-object visibility,
//! performs cone-backface + frustum + occlusion culling per meshlet, and
//! compacts survivors into a list plus a count. Separate compact-count
//! buffers exist for the first pass and the reocclusion pass (spec.md
//! §4.3 stage 2) so each can drive its own indirect dispatch.

use nalgebra_glm as glm;

use super::render_object::{BoundingSphere, Frustum};

#[derive(Clone, Copy, Debug)]
pub struct MeshletInfo {
    pub render_object_index: u32,
    pub bounding_sphere: BoundingSphere,
    /// Cone-backface test (spec.md glossary "Meshlet"): a meshlet is
    /// backfacing for a given view direction `d` iff
    /// `dot(cone_axis, d) >= cone_cutoff`.
    pub cone_axis: glm::Vec3,
    pub cone_cutoff: f32,
    pub triangle_count: u32,
}

fn is_backfacing(meshlet: &MeshletInfo, view_position: glm::Vec3) -> bool {
    let to_view = glm::normalize(&(view_position - meshlet.bounding_sphere.center));
    glm::dot(&meshlet.cone_axis, &to_view) >= meshlet.cone_cutoff
}

/// Returns the compacted list of surviving meshlet indices and the count
/// (spec.md §4.3 stage 2). `render_object_visible` is the bitset produced
/// by [`super::render_object::cull_render_objects`].
pub fn cull_meshlets(
    meshlets: &[MeshletInfo],
    render_object_visible: &[u64],
    frustum: &Frustum,
    view_position: glm::Vec3,
) -> (Vec<u32>, u32) {
    let mut survivors = Vec::new();
    for (index, meshlet) in meshlets.iter().enumerate() {
        let object = meshlet.render_object_index as usize;
        let object_visible = (render_object_visible[object / 64] >> (object % 64)) & 1 != 0;
        if !object_visible {
            continue;
        }
        if is_backfacing(meshlet, view_position) {
            continue;
        }
        if !super::render_object::sphere_intersects_frustum(&meshlet.bounding_sphere, frustum) {
            continue;
        }
        survivors.push(index as u32);
    }
    let count = survivors.len() as u32;
    (survivors, count)
}
