//! A view onto the scene (spec.md §3.4): camera + resolution + visibility
//! flags that gate occlusion culling and primary/shadow treatment.

use bitflags::bitflags;
use nalgebra_glm as glm;

bitflags! {
    pub struct VisibilityFlags: u32 {
        const CLAMP_DEPTH = 1 << 0;
        const OCCLUSION_CULL = 1 << 1;
        const IS_PRIMARY = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ViewInfo {
    pub view_proj: glm::Mat4,
    pub position: glm::Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct SceneView {
    pub camera: ViewInfo,
    pub resolution: (u32, u32),
    pub flags: VisibilityFlags,
}

impl SceneView {
    pub fn is_occlusion_cull(&self) -> bool {
        self.flags.contains(VisibilityFlags::OCCLUSION_CULL)
    }

    pub fn is_primary(&self) -> bool {
        self.flags.contains(VisibilityFlags::IS_PRIMARY)
    }
}
