//! Bindless texture descriptor ring (spec.md §4.6, component E).
//!
//! No close teacher analogue exists for this one (the teacher never got
//! far enough to need a bindless array), so the ring follows spec.md
//! directly: fixed capacity, head/tail indices, oldest-slot-overwritten
//! semantics once full, with a reserved prefix of named default textures.

use crate::device::ImageHandle;
use crate::error::GraphError;

/// Default textures reserved at the front of every ring, in this order.
pub const DEFAULT_TEXTURES: &[&str] = &[
    "White", "Black", "Red", "Green", "Blue", "Cyan", "Yellow", "Magenta", "NormalMap",
];

#[derive(Clone, Copy, Debug)]
struct Slot {
    texture: Option<ImageHandle>,
}

/// A fixed-capacity ring of texture descriptor slots. `add` never fails:
/// once full, it silently evicts the oldest live slot and returns its
/// index; callers holding that old index are expected to tolerate the
/// resulting visual stall for one frame.
pub struct BindlessRing {
    slots: Vec<Slot>,
    capacity: u32,
    head: u32,
    tail: u32,
    len: u32,
}

impl BindlessRing {
    /// `capacity` must be large enough to hold `DEFAULT_TEXTURES` plus at
    /// least one material texture; the reserved prefix is pre-filled with
    /// `None` placeholders the caller is expected to `add` immediately.
    pub fn new(capacity: u32) -> Self {
        BindlessRing {
            slots: vec![Slot { texture: None }; capacity as usize],
            capacity,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes `texture` at `tail`, bumps `tail`. Evicts the slot at `head`
    /// first if the ring is already full.
    pub fn add(&mut self, texture: ImageHandle) -> u32 {
        if self.len == self.capacity {
            self.head = (self.head + 1) % self.capacity;
            self.len -= 1;
        }
        let slot = self.tail;
        self.slots[slot as usize] = Slot {
            texture: Some(texture),
        };
        self.tail = (self.tail + 1) % self.capacity;
        self.len += 1;
        slot
    }

    pub fn get(&self, slot: u32) -> Result<ImageHandle, GraphError> {
        self.slots
            .get(slot as usize)
            .and_then(|s| s.texture)
            .ok_or(GraphError::Unsupported("bindless slot is empty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;
    use crate::device::{Device, ImageDesc, ImageKind, ImageUsage};
    use ash::vk;

    fn make_texture(dev: &mut MockDevice) -> ImageHandle {
        dev.create_image(ImageDesc {
            width: 4,
            height: 4,
            depth_or_layers: 1,
            mip_count: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            kind: ImageKind::D2,
            usage: ImageUsage::SAMPLED,
        })
        .unwrap()
    }

    #[test]
    fn overflow_overwrites_oldest_slot() {
        // Concrete scenario 3 in spec.md §8: capacity 4, pre-filled 0..3,
        // add(X) -> slot 0, add(Y) -> slot 1.
        let mut dev = MockDevice::new();
        let mut ring = BindlessRing::new(4);
        for _ in 0..4 {
            let t = make_texture(&mut dev);
            ring.add(t);
        }
        let x = make_texture(&mut dev);
        let slot_x = ring.add(x);
        assert_eq!(slot_x, 0);

        let y = make_texture(&mut dev);
        let slot_y = ring.add(y);
        assert_eq!(slot_y, 1);
        assert_eq!(ring.get(slot_y).unwrap(), y);
    }

    #[test]
    fn distinct_adds_yield_distinct_slots_with_correct_readback() {
        let mut dev = MockDevice::new();
        let mut ring = BindlessRing::new(8);
        let t1 = make_texture(&mut dev);
        let t2 = make_texture(&mut dev);
        ring.add(t1);
        let slot = ring.add(t2);
        ring.add(t2);
        assert_ne!(slot, ring.len() - 1);
        assert_eq!(ring.get(slot).unwrap(), t2);
    }
}
