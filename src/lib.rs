//! Render-graph and GPU visibility/culling core.
//!
//! Owns the per-frame DAG of GPU passes, the allocation and barrier
//! synthesis that makes it executable, the hierarchical cull pipeline that
//! feeds its indirect draws, and the small set of resource-lifetime
//! utilities (deletion queue, uploader, bindless ring, buffer arena) that
//! the graph and the scene manager both depend on.
//!
//! Asset loading, the windowing/swapchain presentation loop, material math,
//! and the concrete GPU API are all external collaborators; see spec.md and
//! SPEC_FULL.md §1 for the exact boundary.

#[macro_use]
extern crate log;

pub mod arena;
pub mod asset;
pub mod bindless;
pub mod cull;
pub mod deletion_queue;
pub mod device;
pub mod error;
pub mod graph;
pub mod handle;
pub mod hiz;
pub mod scene;
pub mod uploader;

pub use error::GraphError;
