//! Error kinds for the render-graph core (spec.md §7).
//!
//! Nothing in this crate unwinds on a recoverable path: every fallible
//! operation returns a `Result<_, GraphError>`. Device-lost and other
//! out-of-band failures are expected to propagate from the `Device`
//! implementation as [`GraphError::DeviceLost`]; the core's only
//! responsibility on that path is flushing the deletion queue (see
//! [`crate::deletion_queue::DeletionQueue::flush_all`]).

use thiserror::Error;

use crate::handle::{GenerationalResourceHandle, RawHandleId};

/// Everything that can go wrong inside the core, with the recovery each kind
/// implies (see spec.md §7 for the authoritative table).
#[derive(Debug, Error)]
pub enum GraphError {
    /// A generational handle no longer matches the slot it names. The
    /// operation is a silent no-op; this variant exists for callers that
    /// want to observe it.
    #[error("stale handle: {id:?} (requested generation {requested}, current {current})")]
    StaleHandle {
        id: RawHandleId,
        requested: u8,
        current: u8,
    },

    /// `compile()` found a cycle reaching back to the offending pass. The
    /// pass is skipped for this frame; other passes still execute.
    #[error("cycle detected in render graph at pass {pass_name}")]
    GraphCompileCycle { pass_name: String },

    /// A pass reads a virtual resource with no prior writer and no import.
    #[error("pass {pass_name} reads resource {resource_name} before it is written")]
    GraphReadOfUnwritten {
        pass_name: String,
        resource_name: String,
    },

    /// A descriptor pool, staging allocation, or arena ran out of room and
    /// the one-shot regrowth also failed.
    #[error("resource exhausted: {kind} (after growth attempt)")]
    ResourceExhausted { kind: &'static str },

    /// A fence wait exceeded its deadline. The graph does not retry; the
    /// caller decides whether to treat this as fatal.
    #[error("timed out waiting on fence after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// The descriptor type a pass declared does not match what the baked
    /// shader asset expects. Fatal: the whole frame is aborted.
    #[error("shader binding mismatch: binding {binding} expected {expected}, got {got}")]
    ShaderBindingMismatch {
        binding: u32,
        expected: &'static str,
        got: &'static str,
    },

    /// A request the core deliberately does not support (e.g. aliasing a
    /// cubemap). Non-fatal: the resource is pinned instead.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Propagated from the device: the GPU context is gone. The only
    /// remaining responsibility is flushing in-flight deletion-queue
    /// entries.
    #[error("device lost")]
    DeviceLost,
}

impl GraphError {
    pub fn stale_handle<T>(handle: GenerationalResourceHandle<T>, current_generation: u8) -> Self {
        GraphError::StaleHandle {
            id: handle.raw_id(),
            requested: handle.generation(),
            current: current_generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_non_empty() {
        let e = GraphError::Unsupported("cubemap aliasing");
        assert!(!format!("{e}").is_empty());
    }
}
