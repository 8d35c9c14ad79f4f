//! Pass declaration (spec.md §3.3, §4.1 "Inside *setup*").
//!
//! `PassBuilder` is the only thing a pass's `setup` closure sees: it
//! records every access immediately (so the graph has a full picture
//! before `compile()` ever runs) and hands back opaque [`Resource`]
//! handles. The boxed `execute` closure that actually records commands is
//! assembled by [`super::Graph::add_pass`], not here.

use crate::device::{BufferDesc, BufferHandle, ImageDesc, ImageHandle};
use crate::handle::VirtualResourceId;

use super::access::{resolve, AccessIntent, ResourceAccessFlags};
use super::resource::{AccessRecord, Resource, ResourceDescription, ResourceKind, VirtualResourceRecord};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassKind {
    Rasterization,
    Compute,
    Transfer,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderTargetBinding {
    pub resource: Resource,
    pub load: LoadOp,
    pub store: StoreOp,
    pub clear_color: Option<[f32; 4]>,
}

pub struct UploadEntry {
    pub resource: Resource,
    pub data: Vec<u8>,
    pub dst_offset: u64,
}

/// Handed to a pass's `setup` closure. Every method records an access or a
/// resource immediately; none of it is deferred to execute time.
pub struct PassBuilder<'g> {
    pass_index: usize,
    resources: &'g mut Vec<VirtualResourceRecord>,
    pub(crate) reads: Vec<Resource>,
    pub(crate) writes: Vec<Resource>,
    pub(crate) creates: Vec<Resource>,
    pub(crate) render_targets: Vec<RenderTargetBinding>,
    pub(crate) depth_stencil_target: Option<RenderTargetBinding>,
    pub(crate) uploads: Vec<UploadEntry>,
    pub(crate) has_side_effect: bool,
}

impl<'g> PassBuilder<'g> {
    pub(crate) fn new(pass_index: usize, resources: &'g mut Vec<VirtualResourceRecord>) -> Self {
        PassBuilder {
            pass_index,
            resources,
            reads: Vec::new(),
            writes: Vec::new(),
            creates: Vec::new(),
            render_targets: Vec::new(),
            depth_stencil_target: None,
            uploads: Vec::new(),
            has_side_effect: false,
        }
    }

    pub fn create_buffer(&mut self, name: impl Into<String>, desc: BufferDesc) -> Resource {
        let record = VirtualResourceRecord::new(name.into(), ResourceKind::Buffer, ResourceDescription::Buffer(desc));
        let id = self.push_record(record);
        let resource = Resource { id };
        self.creates.push(resource);
        resource
    }

    pub fn create_image(&mut self, name: impl Into<String>, desc: ImageDesc) -> Resource {
        let record = VirtualResourceRecord::new(name.into(), ResourceKind::Image, ResourceDescription::Image(desc));
        let id = self.push_record(record);
        let resource = Resource { id };
        self.creates.push(resource);
        resource
    }

    pub fn import_buffer(&mut self, name: impl Into<String>, handle: BufferHandle, desc: BufferDesc) -> Resource {
        let mut record =
            VirtualResourceRecord::new(name.into(), ResourceKind::Buffer, ResourceDescription::Buffer(desc));
        record.imported = true;
        record.imported_buffer = Some(handle);
        record.physical_buffer = Some(handle);
        let id = self.push_record(record);
        let resource = Resource { id };
        self.creates.push(resource);
        resource
    }

    pub fn import_image(&mut self, name: impl Into<String>, handle: ImageHandle, desc: ImageDesc) -> Resource {
        let mut record =
            VirtualResourceRecord::new(name.into(), ResourceKind::Image, ResourceDescription::Image(desc));
        record.imported = true;
        record.imported_image = Some(handle);
        record.physical_image = Some(handle);
        let id = self.push_record(record);
        let resource = Resource { id };
        self.creates.push(resource);
        resource
    }

    fn push_record(&mut self, record: VirtualResourceRecord) -> VirtualResourceId {
        let index = self.resources.len() as u32;
        self.resources.push(record);
        VirtualResourceId { id: index, version: 0 }
    }

    fn record_for(&self, resource: Resource) -> &VirtualResourceRecord {
        &self.resources[resource.id.id as usize]
    }

    pub fn read(&mut self, resource: Resource, flags: ResourceAccessFlags) -> Resource {
        let is_image = self.record_for(resource).kind == ResourceKind::Image;
        let resolved = resolve(flags, AccessIntent::Read, is_image);
        let record = &mut self.resources[resource.id.id as usize];
        record.accesses.push(AccessRecord {
            pass: self.pass_index,
            version: resource.id.version,
            stage_mask: resolved.stage_mask,
            access_mask: resolved.access_mask,
            layout: resolved.layout,
            intent: AccessIntent::Read,
        });
        record.reader_passes.push(self.pass_index);
        self.reads.push(resource);
        resource
    }

    /// Bumps the resource to a new version and records the write access,
    /// per spec.md §3.1 ("write declaration bumps version").
    pub fn write(&mut self, resource: Resource, flags: ResourceAccessFlags) -> Resource {
        let is_image = self.record_for(resource).kind == ResourceKind::Image;
        let resolved = resolve(flags, AccessIntent::Write, is_image);
        let record = &mut self.resources[resource.id.id as usize];
        record.current_version += 1;
        record.last_writer_pass = Some(self.pass_index);
        record.writers.push(self.pass_index);
        let new_resource = Resource {
            id: VirtualResourceId {
                id: resource.id.id,
                version: record.current_version,
            },
        };
        record.accesses.push(AccessRecord {
            pass: self.pass_index,
            version: new_resource.id.version,
            stage_mask: resolved.stage_mask,
            access_mask: resolved.access_mask,
            layout: resolved.layout,
            intent: AccessIntent::Write,
        });
        self.writes.push(new_resource);
        new_resource
    }

    pub fn render_target(&mut self, resource: Resource, load: LoadOp, store: StoreOp, clear_color: Option<[f32; 4]>) -> Resource {
        let written = self.write(resource, ResourceAccessFlags::PIXEL | ResourceAccessFlags::RENDER_TARGET);
        self.render_targets.push(RenderTargetBinding {
            resource: written,
            load,
            store,
            clear_color,
        });
        written
    }

    pub fn depth_stencil_target(&mut self, resource: Resource, load: LoadOp, store: StoreOp) -> Resource {
        let written = self.write(resource, ResourceAccessFlags::PIXEL | ResourceAccessFlags::DEPTH_STENCIL);
        self.depth_stencil_target = Some(RenderTargetBinding {
            resource: written,
            load,
            store,
            clear_color: None,
        });
        written
    }

    /// Enqueues a host→device copy to run at execution time, drained
    /// through the resource uploader right before this pass's `execute`.
    pub fn upload(&mut self, resource: Resource, data: Vec<u8>, dst_offset: u64) -> Resource {
        let written = self.write(resource, ResourceAccessFlags::COPY | ResourceAccessFlags::UPLOAD);
        self.uploads.push(UploadEntry {
            resource: written,
            data,
            dst_offset,
        });
        written
    }

    /// Pins this pass into the schedule even if nothing reads its outputs
    /// (spec.md §4.1's reachability pruning would otherwise drop it).
    pub fn has_side_effect(&mut self) {
        self.has_side_effect = true;
    }

    pub fn kind(&self) -> PassKind {
        if !self.render_targets.is_empty() || self.depth_stencil_target.is_some() {
            PassKind::Rasterization
        } else {
            PassKind::Compute
        }
    }
}

pub(crate) struct PassRecord {
    pub name: String,
    pub name_hash: u64,
    pub kind: PassKind,
    pub reads: Vec<Resource>,
    pub writes: Vec<Resource>,
    pub creates: Vec<Resource>,
    pub render_targets: Vec<RenderTargetBinding>,
    pub depth_stencil_target: Option<RenderTargetBinding>,
    pub uploads: Vec<UploadEntry>,
    pub has_side_effect: bool,
    pub execute: Option<super::ExecuteFn>,
}
