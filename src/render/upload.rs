//! Staged CPU→GPU frame transfer.
//!
//! A [`StagedFrame`] pairs one host-visible staging allocation per plane with
//! a device-local destination of matching shape, plus a single completion
//! signal. The caller writes raw pixel data into the mapped plane regions,
//! then [`flush`](StagedFrame::flush) submits the copy to the transfer queue.
//!
//! The recorded copy sequence is three-phase per plane: staging to
//! transfer-source layout, destination to transfer-destination layout, copy,
//! then destination to shader-read layout with an explicit queue-ownership
//! hand-off. The hand-off is mandatory whenever transfer and graphics queue
//! families differ — omitting it is undefined behavior on hardware with
//! non-unified queues.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use log::error;
use smallvec::SmallVec;

use crate::errors::{Result, VidmixError};
use crate::gpu::{
    CompletionSignal, FrameDescriptor, GpuBackend, HostVisible, ImageLayout, PlaneDescriptor,
    QueueKind,
};
use crate::pool::{DEFAULT_MAX_SPARE, Pool};
use crate::render::ConfigCache;

// ============================================================================
// StagedFrame
// ============================================================================

struct StagedPlane<B: GpuBackend> {
    staging: B::StagingImage,
    device: B::DeviceImage,
    descriptor: PlaneDescriptor,
}

/// A host-writable staging frame paired with its device-local destination.
///
/// Lifecycle: idle → in-flight on [`flush`](Self::flush), in-flight → idle
/// once [`wait_completion`](Self::wait_completion) observes the signal. The
/// staging memory must not be written while in flight; the accessors enforce
/// this.
pub struct StagedFrame<B: GpuBackend> {
    backend: Arc<B>,
    descriptor: FrameDescriptor,
    planes: SmallVec<[StagedPlane<B>; 4]>,
    commands: B::Commands,
    signal: B::Signal,
    in_flight: bool,
}

impl<B: GpuBackend> StagedFrame<B> {
    fn create(backend: &Arc<B>, descriptor: &FrameDescriptor) -> Result<Self> {
        let mut planes = SmallVec::new();
        for plane in &descriptor.planes {
            let staging = backend.create_staging_image(plane)?;
            let device = backend.create_device_image(
                plane,
                wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            )?;
            planes.push(StagedPlane {
                staging,
                device,
                descriptor: *plane,
            });
        }
        let commands = backend.create_commands(QueueKind::Transfer)?;
        let signal = backend.create_signal()?;
        Ok(Self {
            backend: Arc::clone(backend),
            descriptor: descriptor.clone(),
            planes,
            commands,
            signal,
            in_flight: false,
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Mapped host-visible bytes of one plane, for the caller to write pixel
    /// data into directly.
    pub fn plane_bytes_mut(&mut self, plane: usize) -> Result<&mut [u8]> {
        if self.in_flight {
            return Err(VidmixError::ResourceInFlight(
                "staging memory is owned by the device until the upload completes",
            ));
        }
        let count = self.planes.len();
        self.planes
            .get_mut(plane)
            .map(|p| p.staging.bytes_mut())
            .ok_or(VidmixError::PlaneIndexOutOfBounds { plane, count })
    }

    /// The device-local destination image of one plane, for downstream
    /// binding.
    pub fn device_image(&self, plane: usize) -> Result<&B::DeviceImage> {
        self.planes
            .get(plane)
            .map(|p| &p.device)
            .ok_or(VidmixError::PlaneIndexOutOfBounds {
                plane,
                count: self.planes.len(),
            })
    }

    /// Submits the staged contents to the device.
    ///
    /// Flushes host caches, resets the completion signal, records the
    /// three-phase copy sequence for every plane and submits it to the
    /// transfer queue. A failed submission is fatal to this operation and
    /// surfaces as an error; the frame stays idle and consistent.
    pub fn flush(&mut self) -> Result<()> {
        if self.in_flight {
            return Err(VidmixError::ResourceInFlight(
                "staged frame already submitted",
            ));
        }

        for plane in &self.planes {
            self.backend.flush_staging(&plane.staging)?;
        }
        self.signal.reset()?;

        let transfer = self.backend.transfer_queue_family();
        let graphics = self.backend.graphics_queue_family();

        self.backend.begin_commands(&mut self.commands)?;
        for plane in &self.planes {
            self.backend
                .transition_staging(&mut self.commands, &plane.staging, ImageLayout::TransferSrc);
            self.backend.transition_device(
                &mut self.commands,
                &plane.device,
                ImageLayout::Undefined,
                ImageLayout::TransferDst,
                transfer,
                transfer,
            );
            self.backend.copy_staging_to_device(
                &mut self.commands,
                &plane.staging,
                &plane.device,
                &plane.descriptor,
            );
            // Ownership moves to the graphics family here when the queue
            // families differ.
            self.backend.transition_device(
                &mut self.commands,
                &plane.device,
                ImageLayout::TransferDst,
                ImageLayout::ShaderRead,
                transfer,
                graphics,
            );
        }

        self.backend
            .submit(&mut self.commands, QueueKind::Transfer, &self.signal)?;
        self.in_flight = true;
        Ok(())
    }

    /// Waits for the in-flight upload, up to `timeout`.
    ///
    /// `Some(Duration::ZERO)` polls, `None` blocks indefinitely. Returns
    /// `Ok(true)` once the frame is idle again.
    pub fn wait_completion(&mut self, timeout: Option<Duration>) -> Result<bool> {
        if !self.in_flight {
            return Ok(true);
        }
        let signaled = self.signal.wait(timeout)?;
        if signaled {
            self.in_flight = false;
        }
        Ok(signaled)
    }
}

// ============================================================================
// Uploader
// ============================================================================

/// Pool-backed factory for [`StagedFrame`]s of one fixed frame shape.
///
/// Constructed once per [`FrameDescriptor`]; every acquired frame has waited
/// out any stale in-flight work before it is handed to the caller, so the
/// caller never writes into memory the device might still be reading.
pub struct Uploader<B: GpuBackend> {
    backend: Arc<B>,
    descriptor: FrameDescriptor,
    pool: Arc<Pool<StagedFrame<B>>>,
    config_cache: Arc<ConfigCache<B>>,
}

impl<B: GpuBackend> Uploader<B> {
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        descriptor: FrameDescriptor,
        config_cache: Arc<ConfigCache<B>>,
    ) -> Self {
        Self {
            backend,
            descriptor,
            pool: Arc::new(Pool::new(DEFAULT_MAX_SPARE)),
            config_cache,
        }
    }

    /// Acquires a staged frame ready for writing, reusing a pooled instance
    /// when one exists.
    pub fn acquire_frame(&self) -> Result<StagedLease<B>> {
        let mut frame = self
            .pool
            .acquire(|| StagedFrame::create(&self.backend, &self.descriptor))?;
        // Stale in-flight state from the previous user of this slot.
        frame.wait_completion(None)?;
        Ok(StagedLease {
            frame: Some(frame),
            pool: Arc::clone(&self.pool),
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    /// The configuration cache shared with the render-target side.
    #[must_use]
    pub fn config_cache(&self) -> &Arc<ConfigCache<B>> {
        &self.config_cache
    }

    pub fn set_max_spare(&self, max_spare: usize) {
        self.pool.set_max_spare(max_spare);
    }

    #[must_use]
    pub fn spare_count(&self) -> usize {
        self.pool.spare_count()
    }
}

// ============================================================================
// Lease
// ============================================================================

/// Owned access to a pooled [`StagedFrame`]; returns it to the pool on drop,
/// waiting out any work still in flight first.
pub struct StagedLease<B: GpuBackend> {
    frame: Option<StagedFrame<B>>,
    pool: Arc<Pool<StagedFrame<B>>>,
}

impl<B: GpuBackend> Deref for StagedLease<B> {
    type Target = StagedFrame<B>;

    fn deref(&self) -> &Self::Target {
        self.frame.as_ref().expect("lease holds a frame until drop")
    }
}

impl<B: GpuBackend> DerefMut for StagedLease<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame.as_mut().expect("lease holds a frame until drop")
    }
}

impl<B: GpuBackend> Drop for StagedLease<B> {
    fn drop(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            if frame.is_in_flight() {
                if let Err(e) = frame.wait_completion(None) {
                    error!("upload completion wait failed on release: {e}");
                }
            }
            self.pool.release(frame);
        }
    }
}
