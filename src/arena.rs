//! Buffer arena + bump suballocator (spec.md §2 component F).
//!
//! Grounded on the teacher's `src/frame/alloc.rs` physical-allocation
//! sketch and `original_source`'s `DeviceFreelist::Resize` 1.5x growth
//! policy: a single growable backing buffer handed out to callers as
//! linear subregions, growing (and copying old content forward via
//! `resize_buffer`) when it runs out of room rather than failing outright.

use crate::device::{BufferDesc, BufferHandle, BufferSubresource, BufferUsage, CommandBufferHandle, Device};
use crate::error::GraphError;

const GROWTH_FACTOR: f64 = 1.5;

/// A single virtual-memory-backed arena. Subregions are bump-allocated and
/// never individually freed; the whole arena is reset (or dropped) at once
/// by its owner (typically once per `Scene` geometry stream).
pub struct BufferArena {
    buffer: BufferHandle,
    capacity: u64,
    cursor: u64,
    usage: BufferUsage,
}

impl BufferArena {
    pub fn new(device: &mut impl Device, initial_capacity: u64, usage: BufferUsage) -> Result<Self, GraphError> {
        let buffer = device.create_buffer(BufferDesc {
            size_bytes: initial_capacity,
            usage,
            persistent_mapping: false,
        })?;
        Ok(BufferArena {
            buffer,
            capacity: initial_capacity,
            cursor: 0,
            usage,
        })
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.cursor
    }

    /// Bump-allocates `size` bytes aligned to `align`; grows the backing
    /// buffer by `GROWTH_FACTOR` (at least enough to fit the request) when
    /// the arena is out of room, copying old content via `resize_buffer`.
    pub fn suballocate(
        &mut self,
        device: &mut impl Device,
        cmd: CommandBufferHandle,
        size: u64,
        align: u64,
    ) -> Result<BufferSubresource, GraphError> {
        let offset = align_up(self.cursor, align);
        if offset + size > self.capacity {
            self.grow(device, cmd, offset + size)?;
        }
        self.cursor = offset + size;
        Ok(BufferSubresource {
            buffer: self.buffer,
            offset,
            size,
        })
    }

    fn grow(&mut self, device: &mut impl Device, cmd: CommandBufferHandle, required: u64) -> Result<(), GraphError> {
        let mut new_capacity = ((self.capacity as f64) * GROWTH_FACTOR).ceil() as u64;
        if new_capacity < required {
            new_capacity = required;
        }
        self.buffer = device.resize_buffer(self.buffer, new_capacity, cmd)?;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Rewinds the bump cursor to zero without touching the backing
    /// buffer; used between frames for arenas scoped to one frame's
    /// descriptor/vertex scratch space.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;

    #[test]
    fn suballocate_respects_alignment() {
        let mut dev = MockDevice::new();
        let mut arena = BufferArena::new(&mut dev, 256, BufferUsage::STORAGE).unwrap();
        let cmd_pool = dev.create_command_pool().unwrap();
        let cmd = dev.create_command_buffer(cmd_pool).unwrap();

        let a = arena.suballocate(&mut dev, cmd, 3, 16).unwrap();
        assert_eq!(a.offset, 0);
        let b = arena.suballocate(&mut dev, cmd, 5, 16).unwrap();
        assert_eq!(b.offset, 16);
    }

    #[test]
    fn suballocate_grows_arena_when_exhausted() {
        let mut dev = MockDevice::new();
        let mut arena = BufferArena::new(&mut dev, 16, BufferUsage::STORAGE).unwrap();
        let cmd_pool = dev.create_command_pool().unwrap();
        let cmd = dev.create_command_buffer(cmd_pool).unwrap();

        let original_buffer = arena.buffer();
        let big = arena.suballocate(&mut dev, cmd, 64, 8).unwrap();
        assert!(arena.capacity() >= 64);
        assert_ne!(arena.buffer(), original_buffer);
        assert_eq!(big.offset, 0);
    }
}
