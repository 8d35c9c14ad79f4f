//! Triangle cull-draw loop (spec.md §4.3 stage 4, component J): a host-side
//! state machine over two rotating batch slots, pipelined so cull of batch
//! *i+1* overlaps draw of batch *i* behind a split barrier.
//!
//! The iteration count is read back from the GPU (spec.md §6.2 "suspension
//! points"); here it is simply passed in by the caller, since host/device
//! readback itself is out of scope. Each stage is a callback so the loop's
//! control flow — batch rotation, clear-vs-load on the first iteration, the
//! zero-iteration boundary case — is exercised without a real encoder.

pub const MAX_BATCHES: usize = 2;
pub const MAX_TRIANGLES_PER_BATCH: u32 = 128_000;
pub const MAX_INDICES: u32 = MAX_TRIANGLES_PER_BATCH * 3;
pub const TRIANGLES_PER_MESHLET: u32 = 64;
pub const COMMANDS_PER_BATCH: u32 = MAX_TRIANGLES_PER_BATCH / TRIANGLES_PER_MESHLET;
pub const MAX_COMMANDS: u32 = MAX_TRIANGLES_PER_BATCH / TRIANGLES_PER_MESHLET;

use crate::graph::{LoadOp, StoreOp};

/// Which rotating batch slot (spec.md `MAX_BATCHES = 2`) an iteration uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchSlot(pub usize);

/// One iteration of the loop, as handed to the `cull`/`prepare_draw`/`draw`
/// callbacks.
#[derive(Clone, Copy, Debug)]
pub struct BatchIteration {
    pub slot: BatchSlot,
    pub iteration_index: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

/// Runs the loop for `meshlet_count` surviving meshlets (the count read back
/// from [`super::meshlet::cull_meshlets`] / GPU equivalent), driving `cull`,
/// `prepare_draw` and `draw` once per iteration across [`MAX_BATCHES`]
/// rotating slots.
///
/// Boundary (spec.md §8): a zero count still runs the zero-iteration path —
/// `cull`/`prepare_draw`/`draw` are never invoked — but the caller is
/// expected to have already issued the render target clear outside this
/// loop when the pass's load-op is `Clear`, matching "loop with iteration
/// count 0 still issues a clear of the render targets... and emits zero draw
/// calls".
pub fn run_triangle_cull_draw_loop<Cull, PrepareDraw, Draw>(
    meshlet_count: u32,
    mut cull: Cull,
    mut prepare_draw: PrepareDraw,
    mut draw: Draw,
) where
    Cull: FnMut(BatchIteration),
    PrepareDraw: FnMut(BatchIteration),
    Draw: FnMut(BatchIteration),
{
    let iterations = meshlet_count.div_ceil(COMMANDS_PER_BATCH);
    for i in 0..iterations {
        let iteration = BatchIteration {
            slot: BatchSlot((i as usize) % MAX_BATCHES),
            iteration_index: i,
            load_op: if i == 0 { LoadOp::Clear } else { LoadOp::Load },
            store_op: StoreOp::Store,
        };
        cull(iteration);
        prepare_draw(iteration);
        draw(iteration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn zero_meshlets_runs_zero_iterations() {
        let calls = RefCell::new(0u32);
        run_triangle_cull_draw_loop(
            0,
            |_| *calls.borrow_mut() += 1,
            |_| *calls.borrow_mut() += 1,
            |_| *calls.borrow_mut() += 1,
        );
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn first_iteration_clears_and_later_iterations_load() {
        let load_ops = RefCell::new(Vec::new());
        run_triangle_cull_draw_loop(
            COMMANDS_PER_BATCH * 3,
            |iter| load_ops.borrow_mut().push(iter.load_op),
            |_| {},
            |_| {},
        );
        let load_ops = load_ops.into_inner();
        assert_eq!(load_ops.len(), 3);
        assert_eq!(load_ops[0], LoadOp::Clear);
        assert_eq!(load_ops[1], LoadOp::Load);
        assert_eq!(load_ops[2], LoadOp::Load);
    }

    #[test]
    fn batches_rotate_across_max_batches_slots() {
        let slots = RefCell::new(Vec::new());
        run_triangle_cull_draw_loop(
            COMMANDS_PER_BATCH * 5,
            |iter| slots.borrow_mut().push(iter.slot),
            |_| {},
            |_| {},
        );
        let slots = slots.into_inner();
        assert_eq!(slots, vec![BatchSlot(0), BatchSlot(1), BatchSlot(0), BatchSlot(1), BatchSlot(0)]);
    }

    #[test]
    fn partial_final_batch_still_runs_one_full_iteration() {
        let mut iterations = 0;
        run_triangle_cull_draw_loop(COMMANDS_PER_BATCH + 1, |_| iterations += 1, |_| {}, |_| {});
        assert_eq!(iterations, 2);
    }
}
