//! Pooled render targets.
//!
//! A [`TargetFrame`] is a render destination drawn from a pool, bound to a
//! cached compatible render configuration and gated for reuse by a completion
//! signal. All frames from one [`TargetPool`] share the same shape by
//! construction, so the configuration is resolved once through the shared
//! [`ConfigCache`] when the pool is built.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use log::error;
use smallvec::SmallVec;

use crate::errors::{Result, VidmixError};
use crate::gpu::{CompletionSignal, GpuBackend, PlaneDescriptor, QueueKind, RenderConfigDescriptor};
use crate::pool::{DEFAULT_MAX_SPARE, Pool};
use crate::render::ConfigCache;

// ============================================================================
// TargetFrame
// ============================================================================

/// A device-local render destination with its completion signal and a
/// back-reference to the cached configuration it is compatible with.
///
/// State machine: `Idle -> (draw) -> InFlight -> (signal observed) -> Idle`.
/// There is no cancellation; an in-flight render always completes.
pub struct TargetFrame<B: GpuBackend> {
    backend: Arc<B>,
    color_images: SmallVec<[B::DeviceImage; 4]>,
    aux_image: Option<B::DeviceImage>,
    signal: B::Signal,
    render_config: Arc<B::RenderConfig>,
    in_flight: bool,
}

impl<B: GpuBackend> TargetFrame<B> {
    fn create(
        backend: &Arc<B>,
        width: u32,
        height: u32,
        descriptor: &RenderConfigDescriptor,
        render_config: &Arc<B::RenderConfig>,
    ) -> Result<Self> {
        let mut color_images = SmallVec::new();
        for format in &descriptor.color_formats {
            let plane = PlaneDescriptor::new(width, height, *format);
            color_images.push(backend.create_device_image(
                &plane,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )?);
        }
        let aux_image = match descriptor.aux_format {
            Some(format) => Some(backend.create_device_image(
                &PlaneDescriptor::new(width, height, format),
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )?),
            None => None,
        };
        let signal = backend.create_signal()?;
        Ok(Self {
            backend: Arc::clone(backend),
            color_images,
            aux_image,
            signal,
            render_config: Arc::clone(render_config),
            in_flight: false,
        })
    }

    /// Submits a recorded command sequence drawing into this target.
    ///
    /// Blocks first until any previous draw on this instance has completed —
    /// a new draw never stomps on a still-in-flight one — then resets the
    /// completion signal and submits to the graphics queue.
    pub fn draw(&mut self, commands: &mut B::Commands) -> Result<()> {
        self.wait_completion(None)?;
        self.signal.reset()?;
        self.backend
            .submit(commands, QueueKind::Graphics, &self.signal)?;
        self.in_flight = true;
        Ok(())
    }

    /// Waits for the in-flight draw, up to `timeout`.
    ///
    /// `Some(Duration::ZERO)` polls, `None` blocks indefinitely. Observing
    /// the signal is the only transition out of the in-flight state.
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

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// The shared configuration this target renders through.
    #[must_use]
    pub fn render_config(&self) -> &Arc<B::RenderConfig> {
        &self.render_config
    }

    pub fn color_image(&self, index: usize) -> Result<&B::DeviceImage> {
        self.color_images
            .get(index)
            .ok_or(VidmixError::PlaneIndexOutOfBounds {
                plane: index,
                count: self.color_images.len(),
            })
    }

    #[must_use]
    pub fn aux_image(&self) -> Option<&B::DeviceImage> {
        self.aux_image.as_ref()
    }
}

// ============================================================================
// TargetPool
// ============================================================================

/// Pool-backed factory for [`TargetFrame`]s of one extent and configuration.
///
/// Resolves its render configuration through the [`ConfigCache`] at
/// construction time — an unsupported descriptor fails here, before any
/// resource is pooled against it.
pub struct TargetPool<B: GpuBackend> {
    backend: Arc<B>,
    width: u32,
    height: u32,
    descriptor: RenderConfigDescriptor,
    render_config: Arc<B::RenderConfig>,
    pool: Arc<Pool<TargetFrame<B>>>,
}

impl<B: GpuBackend> TargetPool<B> {
    pub fn new(
        backend: Arc<B>,
        width: u32,
        height: u32,
        descriptor: RenderConfigDescriptor,
        config_cache: &ConfigCache<B>,
    ) -> Result<Self> {
        let render_config = config_cache.get_or_create(&descriptor)?;
        Ok(Self {
            backend,
            width,
            height,
            descriptor,
            render_config,
            pool: Arc::new(Pool::new(DEFAULT_MAX_SPARE)),
        })
    }

    /// Acquires a target ready to draw into, reusing a pooled instance when
    /// one exists. Symmetric to the uploader: waits out any render still in
    /// flight on the pooled instance before handing it over.
    pub fn acquire_frame(&self) -> Result<TargetLease<B>> {
        let mut frame = self.pool.acquire(|| {
            TargetFrame::create(
                &self.backend,
                self.width,
                self.height,
                &self.descriptor,
                &self.render_config,
            )
        })?;
        frame.wait_completion(None)?;
        Ok(TargetLease {
            frame: Some(frame),
            pool: Arc::clone(&self.pool),
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &RenderConfigDescriptor {
        &self.descriptor
    }

    /// The configuration shared by every frame this pool produces.
    #[must_use]
    pub fn render_config(&self) -> &Arc<B::RenderConfig> {
        &self.render_config
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

/// Owned access to a pooled [`TargetFrame`]; waits out any in-flight render
/// before returning the frame to its pool on drop, so a resource is never
/// re-pooled while the device may still write to it.
pub struct TargetLease<B: GpuBackend> {
    frame: Option<TargetFrame<B>>,
    pool: Arc<Pool<TargetFrame<B>>>,
}

impl<B: GpuBackend> Deref for TargetLease<B> {
    type Target = TargetFrame<B>;

    fn deref(&self) -> &Self::Target {
        self.frame.as_ref().expect("lease holds a frame until drop")
    }
}

impl<B: GpuBackend> DerefMut for TargetLease<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame.as_mut().expect("lease holds a frame until drop")
    }
}

impl<B: GpuBackend> Drop for TargetLease<B> {
    fn drop(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            if frame.is_in_flight() {
                if let Err(e) = frame.wait_completion(None) {
                    error!("render completion wait failed on release: {e}");
                }
            }
            self.pool.release(frame);
        }
    }
}
