//! GPU-side frame resources.
//!
//! Pooled, reuse-gated resources for producing and consuming video frames:
//! - ConfigCache: structurally keyed cache of shared render configurations
//! - StagedFrame / Uploader: host→device transfer resources
//! - TargetFrame / TargetPool: pooled render destinations

pub mod config_cache;
pub mod target;
pub mod upload;

pub use config_cache::ConfigCache;
pub use target::{TargetFrame, TargetLease, TargetPool};
pub use upload::{StagedFrame, StagedLease, Uploader};
