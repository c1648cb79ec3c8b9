//! Graphics-API collaborator interface.
//!
//! The core never talks to a device directly: everything it needs —
//! allocations, command recording, submission, completion signaling, render
//! configuration objects — is consumed through the [`GpuBackend`] trait.
//! Queue families, image layout transitions and cross-queue ownership
//! transfer are named explicitly because the staged-upload path must record
//! them (see [`crate::render::upload`]).
//!
//! - [`GpuBackend`]: the backend seam, one associated type per opaque object.
//! - [`CompletionSignal`]: device-side completion, polled or waited on.
//! - [`descriptor`]: the structural shape vocabulary (plane/frame/config).
//! - [`null`]: an inspectable software backend for headless hosts and tests.

pub mod descriptor;
pub mod null;

use std::time::Duration;

use crate::errors::Result;

pub use descriptor::{FrameDescriptor, PlaneDescriptor, RenderConfigDescriptor};
pub use null::{NullBackend, NullOp, NullStats};

// ============================================================================
// Enums
// ============================================================================

/// Image layouts the upload and render paths transition through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined; cheapest source state for a full overwrite.
    Undefined,
    /// Readable by transfer operations.
    TransferSrc,
    /// Writable by transfer operations.
    TransferDst,
    /// Sampleable from shaders.
    ShaderRead,
    /// Writable as a color render target.
    ColorTarget,
}

/// Which device queue a command sequence is recorded for and submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// The dedicated transfer/copy queue.
    Transfer,
    /// The graphics/render queue.
    Graphics,
}

// ============================================================================
// Capability traits
// ============================================================================

/// A synchronization primitive set by the device when submitted work
/// finishes.
pub trait CompletionSignal: Send + Sync {
    /// Blocks until the signal is observed, up to `timeout`.
    ///
    /// - `Some(Duration::ZERO)` performs a non-blocking poll.
    /// - `None` blocks indefinitely.
    ///
    /// Returns `Ok(true)` once signaled, `Ok(false)` if the bounded wait ran
    /// out of time.
    fn wait(&self, timeout: Option<Duration>) -> Result<bool>;

    /// Returns the signal to the unsignaled state.
    fn reset(&self) -> Result<()>;

    /// Non-blocking poll.
    fn is_signaled(&self) -> Result<bool> {
        self.wait(Some(Duration::ZERO))
    }
}

/// Host-visible mapped memory the caller writes raw pixel data into.
pub trait HostVisible {
    /// The mapped byte region.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Size of the mapped region in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Backend
// ============================================================================

/// The narrow interface the core consumes from the graphics API.
///
/// Every associated type is opaque to the core; the backend decides what a
/// command sequence or a render configuration actually is. Recording methods
/// take `&mut Commands` so a backend can translate them one-to-one into its
/// native command buffer.
pub trait GpuBackend: Send + Sync + 'static {
    /// Host-visible staging allocation for one plane.
    type StagingImage: HostVisible + Send;
    /// Device-local image for one plane.
    type DeviceImage: Send + Sync;
    /// Completion signal for one submission.
    type Signal: CompletionSignal;
    /// A recordable, submittable command sequence.
    type Commands: Send;
    /// A compatible render/pipeline configuration object, shared across all
    /// resources of one structural shape.
    type RenderConfig: Send + Sync;

    /// Queue family index of the transfer queue.
    fn transfer_queue_family(&self) -> u32;

    /// Queue family index of the graphics queue.
    fn graphics_queue_family(&self) -> u32;

    // --- Creation ---

    fn create_staging_image(&self, plane: &PlaneDescriptor) -> Result<Self::StagingImage>;

    fn create_device_image(
        &self,
        plane: &PlaneDescriptor,
        usage: wgpu::TextureUsages,
    ) -> Result<Self::DeviceImage>;

    fn create_signal(&self) -> Result<Self::Signal>;

    fn create_commands(&self, queue: QueueKind) -> Result<Self::Commands>;

    /// Derives a compatible render configuration from a structural
    /// descriptor, or fails with
    /// [`VidmixError::UnsupportedConfig`](crate::VidmixError::UnsupportedConfig).
    fn create_render_config(&self, desc: &RenderConfigDescriptor) -> Result<Self::RenderConfig>;

    // --- Host memory ---

    /// Flushes host caches so writes to `image`'s mapped memory become
    /// visible to the device.
    fn flush_staging(&self, image: &Self::StagingImage) -> Result<()>;

    // --- Recording ---

    /// Resets `commands` and opens it for recording.
    fn begin_commands(&self, commands: &mut Self::Commands) -> Result<()>;

    /// Records a layout transition on a staging image.
    fn transition_staging(
        &self,
        commands: &mut Self::Commands,
        image: &Self::StagingImage,
        to: ImageLayout,
    );

    /// Records a layout transition on a device image, transferring queue
    /// ownership from `src_family` to `dst_family` when they differ.
    fn transition_device(
        &self,
        commands: &mut Self::Commands,
        image: &Self::DeviceImage,
        from: ImageLayout,
        to: ImageLayout,
        src_family: u32,
        dst_family: u32,
    );

    /// Records a full-plane copy from staging to device memory.
    fn copy_staging_to_device(
        &self,
        commands: &mut Self::Commands,
        src: &Self::StagingImage,
        dst: &Self::DeviceImage,
        plane: &PlaneDescriptor,
    );

    // --- Submission ---

    /// Submits `commands` to `queue`, arranging for `signal` to be set when
    /// the work finishes. There is no retry: a failed submission is fatal to
    /// the current operation and surfaces to the caller.
    fn submit(
        &self,
        commands: &mut Self::Commands,
        queue: QueueKind,
        signal: &Self::Signal,
    ) -> Result<()>;
}
