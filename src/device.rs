//! Abstract device surface (spec.md §6.1).
//!
//! The concrete GPU API — instance/physical-device/surface bring-up,
//! queue selection, swapchain creation — is explicitly out of scope; this
//! module only states the operations the render graph and scene manager
//! assume are atomic and synchronous on the CPU side, as a trait. `ash`
//! supplies the stage/access/layout/format vocabulary so the graph's
//! barrier tables (see `graph::access`) speak the same types a real
//! implementation would.

use ash::vk;
use bitflags::bitflags;

use crate::error::GraphError;
use crate::handle::GenerationalResourceHandle;

macro_rules! object_handle {
    ($marker:ident, $alias:ident) => {
        #[derive(Debug)]
        pub struct $marker;
        pub type $alias = GenerationalResourceHandle<$marker>;
    };
}

object_handle!(BufferMarker, BufferHandle);
object_handle!(ImageMarker, ImageHandle);
object_handle!(SamplerMarker, SamplerHandle);
object_handle!(DescriptorSetLayoutMarker, DescriptorSetLayoutHandle);
object_handle!(DescriptorSetMarker, DescriptorSetHandle);
object_handle!(DescriptorAllocatorMarker, DescriptorAllocatorHandle);
object_handle!(DescriptorArenaAllocatorMarker, DescriptorArenaAllocatorHandle);
object_handle!(PipelineLayoutMarker, PipelineLayoutHandle);
object_handle!(PipelineMarker, PipelineHandle);
object_handle!(FenceMarker, FenceHandle);
object_handle!(SemaphoreMarker, SemaphoreHandle);
object_handle!(TimelineSemaphoreMarker, TimelineSemaphoreHandle);
object_handle!(SplitBarrierMarker, SplitBarrierHandle);
object_handle!(RenderingInfoMarker, RenderingInfoHandle);
object_handle!(DependencyInfoMarker, DependencyInfoHandle);
object_handle!(CommandPoolMarker, CommandPoolHandle);
object_handle!(CommandBufferMarker, CommandBufferHandle);

bitflags! {
    /// Usage combinations for `Buffer` (spec.md §3.2).
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDIRECT = 1 << 4;
        const SOURCE = 1 << 5;
        const DESTINATION = 1 << 6;
        const MAPPABLE = 1 << 7;
        const MAPPABLE_RANDOM_ACCESS = 1 << 8;
        const DEVICE_ADDRESS = 1 << 9;
        const CONDITIONAL = 1 << 10;
    }
}

bitflags! {
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageKind {
    D2,
    D3,
    Cubemap,
    D2Array,
}

#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub size_bytes: u64,
    pub usage: BufferUsage,
    pub persistent_mapping: bool,
}

#[derive(Clone, Debug)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
    pub mip_count: u32,
    pub format: vk::Format,
    pub kind: ImageKind,
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Structural compatibility check used by the render graph's aliasing
    /// pass (spec.md §3.5 invariant 4): same extent/format/flags.
    pub fn aliasing_compatible(&self, other: &ImageDesc) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth_or_layers == other.depth_or_layers
            && self.format == other.format
            && self.kind == other.kind
            && self.usage == other.usage
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReductionMode {
    WeightedAverage,
    Min,
    Max,
}

/// Cached by structural equality (spec.md §3.2), so it derives `Eq`/`Hash`
/// rather than using floats directly; LOD bounds are stored as bit patterns.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub address_mode: AddressMode,
    pub reduction_mode: ReductionMode,
    pub min_lod_bits: u32,
    pub max_lod_bits: u32,
    pub anisotropy_bits: u32,
    pub compare_enable: bool,
    pub border_color_bits: u32,
}

impl SamplerDesc {
    pub fn with_lod(mut self, min_lod: f32, max_lod: f32) -> Self {
        self.min_lod_bits = min_lod.to_bits();
        self.max_lod_bits = max_lod.to_bits();
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
    Sampler,
    CombinedImageSampler,
}

#[derive(Clone, Debug)]
pub struct DescriptorBindingDesc {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBindingDesc>,
}

/// What `update_descriptors` writes into a binding slot.
pub enum DescriptorResource {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    Image {
        image: ImageHandle,
        layout: vk::ImageLayout,
    },
    Sampler(SamplerHandle),
}

/// Result of `buffer_arena_suballocate` (spec.md §6.1).
#[derive(Clone, Copy, Debug)]
pub struct BufferSubresource {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Whether a descriptor-set allocator grows a pool of fixed-size pools, or
/// bump-allocates within one descriptor buffer (spec.md §3.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DescriptorAllocatorKind {
    Pooled,
    Arena { gpu_resident: bool },
}

/// The atomic, synchronous-on-the-CPU-side operations a GPU API layer must
/// provide (spec.md §6.1). Implementations own the concrete handle storage;
/// this crate only ever calls through the trait.
pub trait Device {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<BufferHandle, GraphError>;
    fn destroy_buffer(&mut self, handle: BufferHandle);

    fn create_image(&mut self, desc: ImageDesc) -> Result<ImageHandle, GraphError>;
    fn destroy_image(&mut self, handle: ImageHandle);

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle, GraphError>;
    fn destroy_sampler(&mut self, handle: SamplerHandle);

    fn create_descriptor_set_layout(
        &mut self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<DescriptorSetLayoutHandle, GraphError>;
    fn destroy_descriptor_set_layout(&mut self, handle: DescriptorSetLayoutHandle);

    fn create_descriptor_allocator(
        &mut self,
        kind: DescriptorAllocatorKind,
    ) -> Result<DescriptorAllocatorHandle, GraphError>;
    fn destroy_descriptor_allocator(&mut self, handle: DescriptorAllocatorHandle);

    fn create_descriptor_arena_allocator(
        &mut self,
        gpu_resident: bool,
    ) -> Result<DescriptorArenaAllocatorHandle, GraphError>;
    fn destroy_descriptor_arena_allocator(&mut self, handle: DescriptorArenaAllocatorHandle);

    fn create_descriptor_set(
        &mut self,
        allocator: DescriptorAllocatorHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, GraphError>;
    fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle);

    fn create_pipeline_layout(&mut self) -> Result<PipelineLayoutHandle, GraphError>;
    fn destroy_pipeline_layout(&mut self, handle: PipelineLayoutHandle);

    fn create_pipeline(
        &mut self,
        layout: PipelineLayoutHandle,
    ) -> Result<PipelineHandle, GraphError>;
    fn destroy_pipeline(&mut self, handle: PipelineHandle);

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, GraphError>;
    fn destroy_fence(&mut self, handle: FenceHandle);

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, GraphError>;
    fn destroy_semaphore(&mut self, handle: SemaphoreHandle);

    fn create_timeline_semaphore(
        &mut self,
        initial_value: u64,
    ) -> Result<TimelineSemaphoreHandle, GraphError>;
    fn destroy_timeline_semaphore(&mut self, handle: TimelineSemaphoreHandle);

    fn create_split_barrier(&mut self) -> Result<SplitBarrierHandle, GraphError>;
    fn destroy_split_barrier(&mut self, handle: SplitBarrierHandle);

    fn create_rendering_info(&mut self) -> Result<RenderingInfoHandle, GraphError>;
    fn destroy_rendering_info(&mut self, handle: RenderingInfoHandle);

    fn create_dependency_info(&mut self) -> Result<DependencyInfoHandle, GraphError>;
    fn destroy_dependency_info(&mut self, handle: DependencyInfoHandle);

    fn create_command_pool(&mut self) -> Result<CommandPoolHandle, GraphError>;
    fn destroy_command_pool(&mut self, handle: CommandPoolHandle);

    fn create_command_buffer(
        &mut self,
        pool: CommandPoolHandle,
    ) -> Result<CommandBufferHandle, GraphError>;
    fn destroy_command_buffer(&mut self, handle: CommandBufferHandle);

    /// Allocates new storage, copies old content, enqueues old for
    /// destruction; `cmd` is the command buffer the copy is recorded into.
    fn resize_buffer(
        &mut self,
        b: BufferHandle,
        new_size: u64,
        cmd: CommandBufferHandle,
    ) -> Result<BufferHandle, GraphError>;

    fn buffer_arena_suballocate(
        &mut self,
        arena: BufferHandle,
        size: u64,
        align: u64,
    ) -> Result<BufferSubresource, GraphError>;

    /// Safe to call only while `set` is not referenced by a pending GPU
    /// submission (spec.md §6.1).
    fn update_descriptors(
        &mut self,
        set: DescriptorSetHandle,
        slot: u32,
        resource: DescriptorResource,
        array_index: Option<u32>,
    ) -> Result<(), GraphError>;

    /// Valid only for `Mappable` usage; the returned pointer's lifetime
    /// ends at the next submit.
    fn map_buffer(&mut self, b: BufferHandle) -> Result<*mut u8, GraphError>;
    fn unmap_buffer(&mut self, b: BufferHandle);

    fn fence_wait(&mut self, fence: FenceHandle, timeout_ms: u64) -> Result<(), GraphError>;
    fn fence_reset(&mut self, fence: FenceHandle);
}

/// Everything recorded into an active command list (spec.md §6.1 `cmd.*`).
/// Split out from [`Device`] because passes only ever see the command
/// buffer, never the owning device.
pub trait CommandEncoder {
    fn barrier(&mut self, dependency_info: DependencyInfoHandle);
    fn begin_rendering(&mut self, rendering_info: RenderingInfoHandle);
    fn end_rendering(&mut self);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn draw_indirect(&mut self, buffer: BufferHandle, offset: u64, draw_count: u32, stride: u32);
    fn draw_indexed_indirect(&mut self, buffer: BufferHandle, offset: u64, draw_count: u32, stride: u32);
    fn draw_indexed_indirect_count(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        count_buffer: BufferHandle,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    );
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);
    fn dispatch_indirect(&mut self, buffer: BufferHandle, offset: u64);
    fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopyRegion]);
    fn copy_image(&mut self, src: ImageHandle, dst: ImageHandle);
    fn blit_image(&mut self, src: ImageHandle, dst: ImageHandle);
    fn push_constants(&mut self, layout: PipelineLayoutHandle, data: &[u8]);
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);
    fn bind_descriptors(&mut self, layout: PipelineLayoutHandle, first_set: u32, sets: &[DescriptorSetHandle]);
    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64);
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(BufferHandle, u64)]);
    fn set_viewport(&mut self, width: f32, height: f32);
    fn set_scissor(&mut self, width: u32, height: u32);
}

#[derive(Clone, Copy, Debug)]
pub struct BufferCopyRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}
