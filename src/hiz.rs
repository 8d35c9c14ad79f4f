//! Hi-Z depth pyramid (spec.md §4.2): two parallel min/max reductions of a
//! view's depth buffer, exported from the graph so next frame's cull passes
//! can read it as "previous Hi-Z".

use ash::vk;

use crate::device::{Device, ImageDesc, ImageHandle, ImageKind, ImageUsage};
use crate::error::GraphError;
use crate::graph::{Graph, PassKind, Resource, ResourceAccessFlags};

pub const MAX_MIP_COUNT: u32 = 16;

/// Mip count for a pyramid over a `max(width, height)` source extent
/// (SPEC_FULL.md §9): `⌊log₂ max(w,h)⌋ + 1`, capped at [`MAX_MIP_COUNT`] and
/// floored at 1 so a 1×1 input still produces exactly one mip.
pub fn mip_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    let levels = (31 - largest.leading_zeros()) + 1;
    levels.clamp(1, MAX_MIP_COUNT)
}

/// Largest power of two ≤ `extent` (spec.md §4.2 "base extent").
fn largest_power_of_two_le(extent: u32) -> u32 {
    if extent == 0 {
        1
    } else {
        1 << (31 - extent.leading_zeros())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReductionKind {
    Min,
    Max,
}

/// One pyramid's handle plus the dimensions it was built at.
#[derive(Clone, Copy, Debug)]
pub struct HiZPyramid {
    pub image: ImageHandle,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub kind: ReductionKind,
}

fn pyramid_desc(width: u32, height: u32) -> ImageDesc {
    ImageDesc {
        width,
        height,
        depth_or_layers: 1,
        mip_count: mip_count(width, height),
        format: vk::Format::R32_SFLOAT,
        kind: ImageKind::D2,
        usage: ImageUsage::STORAGE | ImageUsage::SAMPLED,
    }
}

/// Builds the Min pyramid (always) and, when `build_max` is set, the Max
/// pyramid, over a depth buffer of `source_width` x `source_height`
/// (spec.md §4.2). Both outputs are created directly on the device rather
/// than through the graph's virtual-resource allocator, since a Hi-Z
/// pyramid must survive into next frame (the graph's transient resources
/// are only guaranteed for the frame that created them); the caller is
/// responsible for importing them into the graph that builds this frame's
/// pyramid and for exporting that import so it is not destroyed at
/// frame-end (spec.md §3.5 invariant 4).
pub fn create_pyramids(
    device: &mut impl Device,
    source_width: u32,
    source_height: u32,
    build_max: bool,
) -> Result<(HiZPyramid, Option<HiZPyramid>), GraphError> {
    let width = largest_power_of_two_le(source_width);
    let height = largest_power_of_two_le(source_height);

    let min_image = device.create_image(pyramid_desc(width, height))?;
    let min = HiZPyramid { image: min_image, width, height, mip_count: mip_count(width, height), kind: ReductionKind::Min };

    let max = if build_max {
        let max_image = device.create_image(pyramid_desc(width, height))?;
        Some(HiZPyramid { image: max_image, width, height, mip_count: mip_count(width, height), kind: ReductionKind::Max })
    } else {
        None
    };

    Ok((min, max))
}

/// Mip levels reduced by one compute dispatch (spec.md §4.2 "reduces up to
/// 6 mip levels per invocation using LDS sharing").
pub const MIPS_PER_DISPATCH: u32 = 6;

/// Number of dispatches needed to reduce a pyramid with `mip_count` levels,
/// given the first level reads the source depth directly and is itself
/// produced by the first dispatch.
pub fn dispatch_count(mip_count: u32) -> u32 {
    mip_count.div_ceil(MIPS_PER_DISPATCH)
}

/// Registers one compute pass per reduction dispatch on `graph`, importing
/// `pyramid.image` as a storage target on the first dispatch and chaining
/// each subsequent dispatch off the previous one's write (spec.md §4.2:
/// "the first level reads the source depth... subsequent levels read the
/// previous level"). The final write is [`Graph::mark_exported`]'d so next
/// frame's cull passes can read it as "previous Hi-Z" (spec.md §4.2). The
/// actual LDS-reduction shader dispatch is out of scope for this host model.
pub fn add_reduction_passes(graph: &mut Graph, source_depth: Resource, pyramid: &HiZPyramid) -> Resource {
    let dispatches = dispatch_count(pyramid.mip_count);
    let desc = pyramid_desc(pyramid.width, pyramid.height);
    let pyramid_name = format!("hiz_pyramid_{:?}", pyramid.kind);
    let image = pyramid.image;

    let mut current: Option<Resource> = None;
    for level in 0..dispatches {
        let pass_name = format!("hiz_reduce_{:?}_{}", pyramid.kind, level);
        let prev = current;
        let desc = desc.clone();
        let pyramid_name = pyramid_name.clone();
        let mut written = None;
        graph.add_pass(
            pass_name,
            |builder| {
                let target = match prev {
                    Some(p) => {
                        builder.read(p, ResourceAccessFlags::COMPUTE | ResourceAccessFlags::SAMPLED);
                        p
                    }
                    None => {
                        builder.read(source_depth, ResourceAccessFlags::COMPUTE | ResourceAccessFlags::SAMPLED);
                        builder.import_image(pyramid_name, image, desc)
                    }
                };
                let out = builder.write(target, ResourceAccessFlags::COMPUTE | ResourceAccessFlags::STORAGE);
                assert_eq!(builder.kind(), PassKind::Compute);
                written = Some(out);
            },
            move |_out, _cmd, _ctx, _resources| {
                // LDS min/max reduction shader dispatch: out of scope here.
            },
        );
        current = written;
    }

    let result = current.expect("dispatch_count is always >= 1");
    graph.mark_exported(result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_by_one_input_produces_exactly_one_mip() {
        assert_eq!(mip_count(1, 1), 1);
    }

    #[test]
    fn mip_count_matches_stated_formula_plus_one() {
        assert_eq!(mip_count(1024, 1024), 11); // floor(log2(1024)) + 1 = 10 + 1
        assert_eq!(mip_count(1920, 1080), 11); // floor(log2(1920)) + 1 = 10 + 1
    }

    #[test]
    fn mip_count_is_capped_at_max_mip_count() {
        assert_eq!(mip_count(1 << 20, 1 << 20), MAX_MIP_COUNT);
    }

    #[test]
    fn base_extent_is_largest_power_of_two_not_exceeding_source() {
        assert_eq!(largest_power_of_two_le(1920), 1024);
        assert_eq!(largest_power_of_two_le(1024), 1024);
        assert_eq!(largest_power_of_two_le(1), 1);
    }

    #[test]
    fn dispatch_count_covers_all_mips_in_groups_of_six() {
        assert_eq!(dispatch_count(1), 1);
        assert_eq!(dispatch_count(6), 1);
        assert_eq!(dispatch_count(7), 2);
        assert_eq!(dispatch_count(16), 3);
    }

    #[test]
    fn create_pyramids_without_max_returns_only_min() {
        let mut device = crate::device::mock::MockDevice::new();
        let (min, max) = create_pyramids(&mut device, 1920, 1080, false).unwrap();
        assert_eq!(min.kind, ReductionKind::Min);
        assert_eq!(min.width, 1024);
        assert_eq!(min.height, 1024);
        assert!(max.is_none());
    }

    #[test]
    fn reduction_passes_chain_through_mip_levels_and_export_the_result() {
        use crate::graph::{Graph, ResourceAccessFlags};

        let mut device = crate::device::mock::MockDevice::new();
        let mut graph = Graph::new();

        let mut source_depth = None;
        graph.add_pass(
            "depth_prepass",
            |builder| {
                let res = builder.create_image(
                    "depth",
                    ImageDesc {
                        width: 1920,
                        height: 1080,
                        depth_or_layers: 1,
                        mip_count: 1,
                        format: vk::Format::D32_SFLOAT,
                        kind: ImageKind::D2,
                        usage: ImageUsage::DEPTH_STENCIL | ImageUsage::SAMPLED,
                    },
                );
                source_depth =
                    Some(builder.write(res, ResourceAccessFlags::PIXEL | ResourceAccessFlags::DEPTH_STENCIL));
            },
            |_, _, _, _| {},
        );
        let source_depth = source_depth.unwrap();

        let (min, _max) = create_pyramids(&mut device, 1920, 1080, false).unwrap();
        let dispatches = dispatch_count(min.mip_count);
        let result = add_reduction_passes(&mut graph, source_depth, &min);

        // Every dispatch wrote the same virtual resource, once each.
        assert_eq!(result.version() as u32, dispatches);

        // An exported resource with no reader still survives compilation
        // (spec.md §4.2: the pyramid is exported for next frame).
        graph.compile(&mut device).unwrap();
    }

    #[test]
    fn create_pyramids_with_max_returns_both() {
        let mut device = crate::device::mock::MockDevice::new();
        let (_min, max) = create_pyramids(&mut device, 1, 1, true).unwrap();
        let max = max.unwrap();
        assert_eq!(max.kind, ReductionKind::Max);
        assert_eq!(max.mip_count, 1);
    }
}
