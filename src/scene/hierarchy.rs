//! Flat scene hierarchy (spec.md §3.4): local transform + type tag + parent
//! index per node, walked bottom-up to resolve world transforms.

use nalgebra_glm as glm;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Mesh,
    Light,
    Dummy,
}

#[derive(Clone)]
pub struct HierarchyNode {
    pub local_transform: glm::Mat4,
    pub kind: NodeKind,
    pub parent: Option<u32>,
}

/// A flat array of nodes; `parent` indices are expected to precede their
/// children (spec.md §3.4 "hierarchy nodes"), though `world_transform`
/// walks the chain explicitly rather than assuming it.
#[derive(Default, Clone)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Hierarchy::default()
    }

    pub fn push(&mut self, node: HierarchyNode) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: u32) -> &HierarchyNode {
        &self.nodes[index as usize]
    }

    /// Root-to-leaf product of local transforms along the parent chain.
    pub fn world_transform(&self, index: u32) -> glm::Mat4 {
        let mut chain = vec![index];
        let mut cursor = self.nodes[index as usize].parent;
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.nodes[parent as usize].parent;
        }
        chain
            .iter()
            .rev()
            .fold(glm::Mat4::identity(), |acc, &i| acc * self.nodes[i as usize].local_transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_transform_composes_along_parent_chain() {
        let mut h = Hierarchy::new();
        let root = h.push(HierarchyNode {
            local_transform: glm::translation(&glm::vec3(1.0, 0.0, 0.0)),
            kind: NodeKind::Dummy,
            parent: None,
        });
        let child = h.push(HierarchyNode {
            local_transform: glm::translation(&glm::vec3(0.0, 2.0, 0.0)),
            kind: NodeKind::Mesh,
            parent: Some(root),
        });

        let world = h.world_transform(child);
        let origin = glm::vec4(0.0, 0.0, 0.0, 1.0);
        let transformed = world * origin;
        assert_eq!((transformed.x, transformed.y, transformed.z), (1.0, 2.0, 0.0));
    }

    #[test]
    fn root_node_world_transform_equals_local_transform() {
        let mut h = Hierarchy::new();
        let local = glm::translation(&glm::vec3(3.0, 4.0, 5.0));
        let root = h.push(HierarchyNode {
            local_transform: local,
            kind: NodeKind::Dummy,
            parent: None,
        });
        assert_eq!(h.world_transform(root), local);
    }
}
