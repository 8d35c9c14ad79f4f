//! Access-flag taxonomy (spec.md §4.1).
//!
//! `ResourceAccessFlags` packs a stage axis and a usage axis into one
//! bitset; [`resolve`] maps a flag combination (plus read/write intent) to
//! the concrete `(stage_mask, access_mask, layout)` the barrier synthesis
//! in [`super::compile`] actually needs.

use ash::vk;
use bitflags::bitflags;

bitflags! {
    pub struct ResourceAccessFlags: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const COMPUTE = 1 << 2;
        const COPY = 1 << 3;
        const INDIRECT_STAGE = 1 << 4;
        const HOST = 1 << 5;

        const UNIFORM = 1 << 8;
        const STORAGE = 1 << 9;
        const SAMPLED = 1 << 10;
        const INDEX = 1 << 11;
        const ATTRIBUTE = 1 << 12;
        const INDIRECT = 1 << 13;
        const RENDER_TARGET = 1 << 14;
        const DEPTH_STENCIL = 1 << 15;
        const UPLOAD = 1 << 16;
        const READBACK = 1 << 17;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessIntent {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedAccess {
    pub stage_mask: vk::PipelineStageFlags,
    pub access_mask: vk::AccessFlags,
    /// `None` for buffers; always `Some` for images.
    pub layout: Option<vk::ImageLayout>,
}

/// Maps a flag combination + read/write intent to the stage/access/layout
/// triple the barrier synthesis compares between consecutive accesses.
/// Multiple stage or usage bits in one call combine with OR, matching
/// spec.md's "all of these" wording.
pub fn resolve(flags: ResourceAccessFlags, intent: AccessIntent, is_image: bool) -> ResolvedAccess {
    let mut stage_mask = vk::PipelineStageFlags::empty();
    if flags.contains(ResourceAccessFlags::VERTEX) {
        stage_mask |= vk::PipelineStageFlags::VERTEX_SHADER;
    }
    if flags.contains(ResourceAccessFlags::PIXEL) {
        stage_mask |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if flags.contains(ResourceAccessFlags::COMPUTE) {
        stage_mask |= vk::PipelineStageFlags::COMPUTE_SHADER;
    }
    if flags.contains(ResourceAccessFlags::COPY) {
        stage_mask |= vk::PipelineStageFlags::TRANSFER;
    }
    if flags.contains(ResourceAccessFlags::INDIRECT_STAGE) || flags.contains(ResourceAccessFlags::INDIRECT) {
        stage_mask |= vk::PipelineStageFlags::DRAW_INDIRECT;
    }
    if flags.contains(ResourceAccessFlags::HOST) {
        stage_mask |= vk::PipelineStageFlags::HOST;
    }
    if flags.contains(ResourceAccessFlags::RENDER_TARGET) {
        stage_mask |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    }
    if flags.contains(ResourceAccessFlags::DEPTH_STENCIL) {
        stage_mask |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    }
    if stage_mask.is_empty() {
        stage_mask = vk::PipelineStageFlags::TOP_OF_PIPE;
    }

    let read = intent == AccessIntent::Read;
    let mut access_mask = vk::AccessFlags::empty();
    if flags.contains(ResourceAccessFlags::UNIFORM) {
        access_mask |= vk::AccessFlags::UNIFORM_READ;
    }
    if flags.contains(ResourceAccessFlags::STORAGE) {
        access_mask |= if read {
            vk::AccessFlags::SHADER_READ
        } else {
            vk::AccessFlags::SHADER_WRITE
        };
    }
    if flags.contains(ResourceAccessFlags::SAMPLED) {
        access_mask |= vk::AccessFlags::SHADER_READ;
    }
    if flags.contains(ResourceAccessFlags::INDEX) {
        access_mask |= vk::AccessFlags::INDEX_READ;
    }
    if flags.contains(ResourceAccessFlags::ATTRIBUTE) {
        access_mask |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if flags.contains(ResourceAccessFlags::INDIRECT) {
        access_mask |= vk::AccessFlags::INDIRECT_COMMAND_READ;
    }
    if flags.contains(ResourceAccessFlags::RENDER_TARGET) {
        access_mask |= if read {
            vk::AccessFlags::COLOR_ATTACHMENT_READ
        } else {
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        };
    }
    if flags.contains(ResourceAccessFlags::DEPTH_STENCIL) {
        access_mask |= if read {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
        } else {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        };
    }
    if flags.contains(ResourceAccessFlags::UPLOAD) {
        access_mask |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if flags.contains(ResourceAccessFlags::READBACK) {
        access_mask |= vk::AccessFlags::TRANSFER_READ;
    }

    let layout = if is_image {
        Some(if flags.contains(ResourceAccessFlags::RENDER_TARGET) {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        } else if flags.contains(ResourceAccessFlags::DEPTH_STENCIL) {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        } else if flags.contains(ResourceAccessFlags::SAMPLED) {
            vk::ImageLayout::READ_ONLY_OPTIMAL
        } else if flags.contains(ResourceAccessFlags::STORAGE) {
            vk::ImageLayout::GENERAL
        } else if flags.contains(ResourceAccessFlags::UPLOAD) {
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        } else if flags.contains(ResourceAccessFlags::READBACK) {
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        } else {
            vk::ImageLayout::GENERAL
        })
    } else {
        None
    };

    ResolvedAccess {
        stage_mask,
        access_mask,
        layout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_storage_write_then_pixel_sampled_read_matches_scenario_one() {
        let write = resolve(
            ResourceAccessFlags::COMPUTE | ResourceAccessFlags::STORAGE,
            AccessIntent::Write,
            true,
        );
        assert_eq!(write.stage_mask, vk::PipelineStageFlags::COMPUTE_SHADER);
        assert_eq!(write.layout, Some(vk::ImageLayout::GENERAL));

        let read = resolve(
            ResourceAccessFlags::PIXEL | ResourceAccessFlags::SAMPLED,
            AccessIntent::Read,
            true,
        );
        assert_eq!(read.stage_mask, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(read.layout, Some(vk::ImageLayout::READ_ONLY_OPTIMAL));
    }

    #[test]
    fn buffer_access_has_no_layout() {
        let r = resolve(ResourceAccessFlags::COMPUTE | ResourceAccessFlags::STORAGE, AccessIntent::Read, false);
        assert_eq!(r.layout, None);
    }
}
