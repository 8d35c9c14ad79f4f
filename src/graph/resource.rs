//! Virtual resources (spec.md §3.3).
//!
//! A [`VirtualResourceRecord`] tracks one logical resource across its
//! whole lifetime inside a single graph compilation: its description, its
//! accumulated access timeline (used by `compile` for barrier synthesis),
//! and whatever physical object it ends up bound to.

use ash::vk;

use crate::device::{BufferDesc, BufferHandle, ImageDesc, ImageHandle};
use crate::handle::VirtualResourceId;

use super::access::AccessIntent;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
}

#[derive(Clone, Debug)]
pub enum ResourceDescription {
    Buffer(BufferDesc),
    Image(ImageDesc),
}

/// An opaque handle to a resource *version*: returned by `create`/`import`
/// and rebound by every `write` (spec.md §3.1 — version bumps on write).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Resource {
    pub(crate) id: VirtualResourceId,
}

impl Resource {
    pub fn name_id(&self) -> u32 {
        self.id.id
    }

    pub fn version(&self) -> u16 {
        self.id.version
    }
}

/// One `(pass, resource)` access, recorded at setup time (spec.md §3.3).
#[derive(Clone, Copy, Debug)]
pub struct AccessRecord {
    pub pass: usize,
    pub version: u16,
    pub stage_mask: vk::PipelineStageFlags,
    pub access_mask: vk::AccessFlags,
    pub layout: Option<vk::ImageLayout>,
    pub intent: AccessIntent,
}

pub struct VirtualResourceRecord {
    pub name: String,
    pub kind: ResourceKind,
    pub description: ResourceDescription,
    pub imported: bool,
    pub exported: bool,
    pub current_version: u16,
    /// Index of the pass that last wrote the current version, if any.
    pub last_writer_pass: Option<usize>,
    pub reader_passes: Vec<usize>,
    /// `writers[v - 1]` is the pass that produced version `v`.
    pub writers: Vec<usize>,
    pub accesses: Vec<AccessRecord>,
    pub imported_buffer: Option<BufferHandle>,
    pub imported_image: Option<ImageHandle>,
    pub physical_buffer: Option<BufferHandle>,
    pub physical_image: Option<ImageHandle>,
    /// Filled in by `compile`'s lifetime analysis: `[first_pass, last_pass]`.
    pub lifetime: Option<(usize, usize)>,
}

impl VirtualResourceRecord {
    pub fn new(name: String, kind: ResourceKind, description: ResourceDescription) -> Self {
        VirtualResourceRecord {
            name,
            kind,
            description,
            imported: false,
            exported: false,
            current_version: 0,
            last_writer_pass: None,
            reader_passes: Vec::new(),
            writers: Vec::new(),
            accesses: Vec::new(),
            imported_buffer: None,
            imported_image: None,
            physical_buffer: None,
            physical_image: None,
            lifetime: None,
        }
    }

    pub fn is_written(&self) -> bool {
        self.imported || self.last_writer_pass.is_some()
    }
}
