//! Per-view persistent visibility (spec.md §3.4, §3.5 invariant 5):
//! render-object and meshlet visibility bits that survive across frames and
//! are only ever updated by cull/reocclude passes of their own view.

use crate::error::GraphError;

use super::view::SceneView;

pub const MAX_VIEWS: usize = 64;

#[derive(Default, Clone)]
pub struct PersistentVisibility {
    render_object_bits: Vec<u64>,
    meshlet_bits: Vec<u64>,
}

impl PersistentVisibility {
    pub fn with_object_count(object_count: usize) -> Self {
        PersistentVisibility {
            render_object_bits: vec![0u64; (object_count + 63) / 64],
            meshlet_bits: Vec::new(),
        }
    }

    pub fn set_object(&mut self, index: usize, visible: bool) {
        let (word, bit) = (index / 64, index % 64);
        if visible {
            self.render_object_bits[word] |= 1 << bit;
        } else {
            self.render_object_bits[word] &= !(1 << bit);
        }
    }

    pub fn get_object(&self, index: usize) -> bool {
        (self.render_object_bits[index / 64] >> (index % 64)) & 1 != 0
    }

    pub fn object_bits(&self) -> &[u64] {
        &self.render_object_bits
    }

    pub fn set_object_bits(&mut self, bits: Vec<u64>) {
        self.render_object_bits = bits;
    }

    pub fn object_popcount(&self) -> u32 {
        self.render_object_bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn set_meshlet_bits(&mut self, bits: Vec<u64>) {
        self.meshlet_bits = bits;
    }

    pub fn meshlet_bits(&self) -> &[u64] {
        &self.meshlet_bits
    }
}

/// Up to [`MAX_VIEWS`] views, each with its own persistent visibility state
/// (spec.md §3.4).
#[derive(Default)]
pub struct SceneMultiviewVisibility {
    views: Vec<SceneView>,
    visibility: Vec<PersistentVisibility>,
}

impl SceneMultiviewVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_view(&mut self, view: SceneView, object_count: usize) -> Result<usize, GraphError> {
        if self.views.len() >= MAX_VIEWS {
            return Err(GraphError::Unsupported("MAX_VIEWS already attached"));
        }
        let index = self.views.len();
        self.views.push(view);
        self.visibility.push(PersistentVisibility::with_object_count(object_count));
        Ok(index)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn view(&self, index: usize) -> &SceneView {
        &self.views[index]
    }

    pub fn visibility(&self, index: usize) -> &PersistentVisibility {
        &self.visibility[index]
    }

    pub fn visibility_mut(&mut self, index: usize) -> &mut PersistentVisibility {
        &mut self.visibility[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::view::{ViewInfo, VisibilityFlags};
    use nalgebra_glm as glm;

    fn dummy_view(flags: VisibilityFlags) -> SceneView {
        SceneView {
            camera: ViewInfo {
                view_proj: glm::Mat4::identity(),
                position: glm::vec3(0.0, 0.0, 0.0),
            },
            resolution: (1920, 1080),
            flags,
        }
    }

    #[test]
    fn attaching_past_max_views_is_rejected() {
        let mut mv = SceneMultiviewVisibility::new();
        for _ in 0..MAX_VIEWS {
            mv.attach_view(dummy_view(VisibilityFlags::IS_PRIMARY), 0).unwrap();
        }
        let err = mv.attach_view(dummy_view(VisibilityFlags::empty()), 0).unwrap_err();
        assert!(matches!(err, GraphError::Unsupported(_)));
    }

    #[test]
    fn object_popcount_reflects_set_bits() {
        let mut vis = PersistentVisibility::with_object_count(130);
        vis.set_object(0, true);
        vis.set_object(64, true);
        vis.set_object(129, true);
        assert_eq!(vis.object_popcount(), 3);
        vis.set_object(64, false);
        assert_eq!(vis.object_popcount(), 2);
    }
}
