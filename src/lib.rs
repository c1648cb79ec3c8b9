//! Resource-lifecycle and scheduling core of a real-time video compositing
//! engine.
//!
//! Three concerns, reconciled:
//! - GPU object creation is expensive, so objects are pooled and cached
//!   ([`pool`], [`render::config_cache`]).
//! - CPU and GPU run asynchronously, so staged uploads and render targets are
//!   gated by completion signals ([`render::upload`], [`render::target`]).
//! - Different parts of the dataflow graph update at independent rates with
//!   deterministic within-wake ordering ([`schedule`]).
//!
//! The graphics API is consumed through the [`gpu::GpuBackend`] seam; the
//! dataflow graph through the [`graph`] pad traits. Neither is implemented
//! here beyond the headless [`gpu::NullBackend`].

pub mod errors;
pub mod gpu;
pub mod graph;
pub mod pool;
pub mod render;
pub mod schedule;

pub use errors::{Result, VidmixError};
pub use gpu::{
    CompletionSignal, FrameDescriptor, GpuBackend, HostVisible, ImageLayout, NullBackend,
    PlaneDescriptor, QueueKind, RenderConfigDescriptor,
};
pub use graph::{ProducerPad, SourcePad};
pub use pool::{MultiKeyPool, Pool};
pub use render::{
    ConfigCache, StagedFrame, StagedLease, TargetFrame, TargetLease, TargetPool, Uploader,
};
pub use schedule::{Scheduler, TimeSnapshot, Updatable};
