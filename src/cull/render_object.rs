//! Render-object cull (spec.md §4.3 stage 1): frustum test against a
//! per-object bounding sphere, plus an optional occlusion predicate fed by
//! the previous frame's Hi-Z pyramid.

use nalgebra_glm as glm;

#[derive(Clone, Copy, Debug)]
pub struct BoundingSphere {
    pub center: glm::Vec3,
    pub radius: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: glm::Vec3,
    pub d: f32,
}

impl Plane {
    fn signed_distance(&self, point: glm::Vec3) -> f32 {
        glm::dot(&self.normal, &point) + self.d
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

fn row(m: &glm::Mat4, i: usize) -> glm::Vec4 {
    glm::vec4(m[(i, 0)], m[(i, 1)], m[(i, 2)], m[(i, 3)])
}

fn normalize_plane(v: glm::Vec4) -> Plane {
    let normal = glm::vec3(v.x, v.y, v.z);
    let len = glm::length(&normal);
    Plane {
        normal: normal / len,
        d: v.w / len,
    }
}

impl Frustum {
    /// Gribb-Hartmann plane extraction from a combined view-projection
    /// matrix; works for both perspective and orthographic projections.
    pub fn from_view_proj(m: &glm::Mat4) -> Self {
        let r0 = row(m, 0);
        let r1 = row(m, 1);
        let r2 = row(m, 2);
        let r3 = row(m, 3);
        Frustum {
            planes: [
                normalize_plane(r3 + r0), // left
                normalize_plane(r3 - r0), // right
                normalize_plane(r3 + r1), // bottom
                normalize_plane(r3 - r1), // top
                normalize_plane(r2),      // near
                normalize_plane(r3 - r2), // far
            ],
        }
    }
}

/// Frustum/sphere test using the `<=` (inclusive) boundary convention
/// decided in SPEC_FULL.md §9: a sphere exactly touching a plane counts as
/// visible.
pub fn sphere_intersects_frustum(sphere: &BoundingSphere, frustum: &Frustum) -> bool {
    frustum.planes.iter().all(|p| p.signed_distance(sphere.center) >= -sphere.radius)
}

/// Render-object cull over every object in a `SceneInfo`, writing one bit
/// per object into a packed `Vec<u64>` bitset (spec.md §4.3 stage 1).
/// `occlusion_test` is `None` for views without `OcclusionCull` (spec.md
/// §8 concrete scenario 5: "shadow-view ignores OcclusionCull"); when
/// present it stands in for a Hi-Z-backed screen-space depth comparison.
pub fn cull_render_objects<F>(spheres: &[BoundingSphere], view_proj: &glm::Mat4, occlusion_test: Option<F>) -> Vec<u64>
where
    F: Fn(&BoundingSphere) -> bool,
{
    let frustum = Frustum::from_view_proj(view_proj);
    let mut bits = vec![0u64; (spheres.len() + 63) / 64];
    for (i, sphere) in spheres.iter().enumerate() {
        let visible =
            sphere_intersects_frustum(sphere, &frustum) && occlusion_test.as_ref().map_or(true, |f| f(sphere));
        if visible {
            bits[i / 64] |= 1 << (i % 64);
        }
    }
    bits
}

pub fn popcount(bits: &[u64]) -> u32 {
    bits.iter().map(|w| w.count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_frustum() -> Frustum {
        Frustum::from_view_proj(&glm::Mat4::identity())
    }

    #[test]
    fn sphere_at_origin_is_inside_identity_frustum() {
        let sphere = BoundingSphere {
            center: glm::vec3(0.0, 0.0, 0.0),
            radius: 0.1,
        };
        assert!(sphere_intersects_frustum(&sphere, &identity_frustum()));
    }

    #[test]
    fn sphere_exactly_touching_plane_is_kept_visible() {
        // Inclusive (`<=`) boundary decision (SPEC_FULL.md §9): center is
        // 1.0 beyond the right plane (x = 1), touching it exactly with a
        // radius of 1.0.
        let sphere = BoundingSphere {
            center: glm::vec3(2.0, 0.0, 0.0),
            radius: 1.0,
        };
        assert!(sphere_intersects_frustum(&sphere, &identity_frustum()));
    }

    #[test]
    fn sphere_fully_outside_is_culled() {
        let sphere = BoundingSphere {
            center: glm::vec3(5.0, 0.0, 0.0),
            radius: 0.5,
        };
        assert!(!sphere_intersects_frustum(&sphere, &identity_frustum()));
    }

    #[test]
    fn cull_render_objects_popcount_matches_frustum_intersection_count() {
        // Concrete scenario 5 (spec.md §8), frustum half only.
        let spheres: Vec<BoundingSphere> = (0..200)
            .map(|i| BoundingSphere {
                center: glm::vec3((i as f32 / 40.0) - 1.0, 0.0, 0.0),
                radius: 0.01,
            })
            .collect();
        let expected = spheres
            .iter()
            .filter(|s| sphere_intersects_frustum(s, &identity_frustum()))
            .count() as u32;

        let bits = cull_render_objects::<fn(&BoundingSphere) -> bool>(&spheres, &glm::Mat4::identity(), None);
        assert_eq!(popcount(&bits), expected);
    }

    #[test]
    fn occlusion_test_is_skipped_entirely_when_not_requested() {
        let spheres = vec![BoundingSphere {
            center: glm::vec3(0.0, 0.0, 0.0),
            radius: 0.1,
        }];
        // Even a predicate that would cull everything must never run.
        let bits = cull_render_objects(&spheres, &glm::Mat4::identity(), None::<fn(&BoundingSphere) -> bool>);
        assert_eq!(popcount(&bits), 1);
    }
}
