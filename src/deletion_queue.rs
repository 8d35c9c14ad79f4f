//! Per-frame deferred destruction (spec.md §4.4, component C).
//!
//! Destructor closures are tagged with the frame number they were enqueued
//! on and drained `BUFFERED_FRAMES` frames later, once the device has
//! confirmed the corresponding fence signaled — grounded on the teacher's
//! `FrameBoundObject`/`WaitList` in `src/sync.rs`, generalized from a
//! single-typed wait list to an arbitrary closure queue.

use std::collections::VecDeque;

/// How many frames may be in flight at once; also the delay between an
/// enqueue and its drain.
pub const BUFFERED_FRAMES: u64 = 2;

type Destructor = Box<dyn FnOnce() + 'static>;

struct Entry {
    frame_number: u64,
    destructor: Destructor,
}

/// A FIFO of destructor closures, one queue shared across all frame slots.
/// `enqueue` never blocks; `flush` is the only place destructors run.
#[derive(Default)]
pub struct DeletionQueue {
    entries: VecDeque<Entry>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        DeletionQueue {
            entries: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, frame_number: u64, destructor: impl FnOnce() + 'static) {
        self.entries.push_back(Entry {
            frame_number,
            destructor: Box::new(destructor),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains everything tagged `<= current_frame - BUFFERED_FRAMES`,
    /// executing each frame's batch in reverse insertion order so dependent
    /// objects (e.g. an image view) are destroyed before what they depend
    /// on.
    pub fn flush(&mut self, current_frame: u64) {
        let threshold = current_frame.saturating_sub(BUFFERED_FRAMES);
        self.flush_until(threshold);
    }

    fn flush_until(&mut self, threshold: u64) {
        let mut due: Vec<Entry> = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop_front() {
            if entry.frame_number <= threshold {
                due.push(entry);
            } else {
                remaining.push_back(entry);
            }
        }
        self.entries = remaining;

        // Group by frame_number, then run each frame's group back-to-front.
        let mut start = 0;
        while start < due.len() {
            let frame = due[start].frame_number;
            let mut end = start;
            while end < due.len() && due[end].frame_number == frame {
                end += 1;
            }
            for entry in due.drain(start..end).rev() {
                (entry.destructor)();
            }
            due.truncate(start);
            start = due.len();
        }
    }

    /// Called on `GraphError::DeviceLost`: there will be no more fence
    /// signals to wait on, so every outstanding entry runs now.
    pub fn flush_all(&mut self) {
        self.flush_until(u64::MAX);
    }
}
