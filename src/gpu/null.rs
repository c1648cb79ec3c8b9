//! Software backend with no device behind it.
//!
//! Commands are recorded as inspectable ops and "executed" at submit time
//! (copies actually move bytes, transitions actually update the tracked
//! layout), so headless hosts and tests observe the same resource lifecycle a
//! real device would produce. Completion signaling is either immediate
//! (`auto-complete`, the default) or deferred until the host calls
//! [`NullBackend::complete_pending`], which is how tests exercise the
//! in-flight window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{
    CompletionSignal, GpuBackend, HostVisible, ImageLayout, PlaneDescriptor, QueueKind,
    RenderConfigDescriptor,
};
use crate::errors::{Result, VidmixError};

// ============================================================================
// Completion signal
// ============================================================================

struct SignalState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl SignalState {
    fn set(&self) {
        *self.signaled.lock() = true;
        self.cond.notify_all();
    }
}

/// Completion signal backed by a mutex/condvar pair.
pub struct NullSignal {
    state: Arc<SignalState>,
}

impl CompletionSignal for NullSignal {
    fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let mut signaled = self.state.signaled.lock();
        match timeout {
            Some(limit) if limit.is_zero() => Ok(*signaled),
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while !*signaled {
                    if self
                        .state
                        .cond
                        .wait_until(&mut signaled, deadline)
                        .timed_out()
                    {
                        return Ok(*signaled);
                    }
                }
                Ok(true)
            }
            None => {
                while !*signaled {
                    self.state.cond.wait(&mut signaled);
                }
                Ok(true)
            }
        }
    }

    fn reset(&self) -> Result<()> {
        *self.state.signaled.lock() = false;
        Ok(())
    }
}

// ============================================================================
// Images
// ============================================================================

/// Host-visible staging plane: a plain byte buffer.
pub struct NullStagingImage {
    bytes: Vec<u8>,
}

impl HostVisible for NullStagingImage {
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Device-local plane with tracked contents and layout.
pub struct NullDeviceImage {
    descriptor: PlaneDescriptor,
    usage: wgpu::TextureUsages,
    contents: Arc<Mutex<Vec<u8>>>,
    layout: Arc<Mutex<ImageLayout>>,
}

impl NullDeviceImage {
    #[must_use]
    pub fn descriptor(&self) -> &PlaneDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn usage(&self) -> wgpu::TextureUsages {
        self.usage
    }

    /// Snapshot of the image contents as of the last executed submission.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.contents.lock().clone()
    }

    /// Layout as of the last executed submission.
    #[must_use]
    pub fn layout(&self) -> ImageLayout {
        *self.layout.lock()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A recorded operation, as reported by [`NullBackend::last_submission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NullOp {
    StagingTransition {
        to: ImageLayout,
    },
    DeviceTransition {
        from: ImageLayout,
        to: ImageLayout,
        src_family: u32,
        dst_family: u32,
    },
    Copy {
        bytes: usize,
    },
}

enum RecordedOp {
    StagingTransition {
        to: ImageLayout,
    },
    DeviceTransition {
        layout: Arc<Mutex<ImageLayout>>,
        from: ImageLayout,
        to: ImageLayout,
        src_family: u32,
        dst_family: u32,
    },
    Copy {
        data: Vec<u8>,
        dst: Arc<Mutex<Vec<u8>>>,
    },
}

impl RecordedOp {
    fn describe(&self) -> NullOp {
        match self {
            Self::StagingTransition { to } => NullOp::StagingTransition { to: *to },
            Self::DeviceTransition {
                from,
                to,
                src_family,
                dst_family,
                ..
            } => NullOp::DeviceTransition {
                from: *from,
                to: *to,
                src_family: *src_family,
                dst_family: *dst_family,
            },
            Self::Copy { data, .. } => NullOp::Copy { bytes: data.len() },
        }
    }

    fn execute(self) {
        match self {
            Self::StagingTransition { .. } => {}
            Self::DeviceTransition { layout, to, .. } => {
                *layout.lock() = to;
            }
            Self::Copy { data, dst } => {
                *dst.lock() = data;
            }
        }
    }
}

/// Command sequence recorded against the [`NullBackend`].
pub struct NullCommands {
    queue: QueueKind,
    ops: Vec<RecordedOp>,
}

// ============================================================================
// Backend
// ============================================================================

/// Creation/submission counters, for saturation assertions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats {
    pub staging_images: u64,
    pub device_images: u64,
    pub signals: u64,
    pub render_configs: u64,
    pub submissions: u64,
}

struct NullState {
    pending: Vec<Arc<SignalState>>,
    last_submission: Vec<NullOp>,
    stats: NullStats,
    fail_allocations: bool,
}

/// Render configuration object: just the descriptor it was derived from.
pub struct NullRenderConfig {
    pub descriptor: RenderConfigDescriptor,
}

/// The software [`GpuBackend`].
pub struct NullBackend {
    transfer_family: u32,
    graphics_family: u32,
    auto_complete: bool,
    state: Mutex<NullState>,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NullBackend {
    /// Backend with unified transfer/graphics queues and auto-completing
    /// submissions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queues(0, 0)
    }

    /// Backend with distinct queue family indices, so the upload path records
    /// cross-queue ownership transfers.
    #[must_use]
    pub fn with_queues(transfer_family: u32, graphics_family: u32) -> Self {
        Self {
            transfer_family,
            graphics_family,
            auto_complete: true,
            state: Mutex::new(NullState {
                pending: Vec::new(),
                last_submission: Vec::new(),
                stats: NullStats::default(),
                fail_allocations: false,
            }),
        }
    }

    /// Switches to manual completion: submissions stay in flight until
    /// [`complete_pending`](Self::complete_pending) is called.
    #[must_use]
    pub fn manual_completion(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    /// Signals every submission still in flight. Returns how many were
    /// completed.
    pub fn complete_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.state.lock().pending);
        let count = pending.len();
        for signal in pending {
            signal.set();
        }
        count
    }

    /// When set, creation calls fail with
    /// [`VidmixError::AllocationFailed`] until cleared.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    #[must_use]
    pub fn stats(&self) -> NullStats {
        self.state.lock().stats
    }

    /// Ops executed by the most recent submission, in recording order.
    #[must_use]
    pub fn last_submission(&self) -> Vec<NullOp> {
        self.state.lock().last_submission.clone()
    }

    fn check_allocations(&self) -> Result<()> {
        if self.state.lock().fail_allocations {
            return Err(VidmixError::AllocationFailed(
                "simulated allocation failure".into(),
            ));
        }
        Ok(())
    }
}

impl GpuBackend for NullBackend {
    type StagingImage = NullStagingImage;
    type DeviceImage = NullDeviceImage;
    type Signal = NullSignal;
    type Commands = NullCommands;
    type RenderConfig = NullRenderConfig;

    fn transfer_queue_family(&self) -> u32 {
        self.transfer_family
    }

    fn graphics_queue_family(&self) -> u32 {
        self.graphics_family
    }

    fn create_staging_image(&self, plane: &PlaneDescriptor) -> Result<Self::StagingImage> {
        self.check_allocations()?;
        self.state.lock().stats.staging_images += 1;
        Ok(NullStagingImage {
            bytes: vec![0; plane.byte_len()],
        })
    }

    fn create_device_image(
        &self,
        plane: &PlaneDescriptor,
        usage: wgpu::TextureUsages,
    ) -> Result<Self::DeviceImage> {
        self.check_allocations()?;
        self.state.lock().stats.device_images += 1;
        Ok(NullDeviceImage {
            descriptor: *plane,
            usage,
            contents: Arc::new(Mutex::new(vec![0; plane.byte_len()])),
            layout: Arc::new(Mutex::new(ImageLayout::Undefined)),
        })
    }

    fn create_signal(&self) -> Result<Self::Signal> {
        self.state.lock().stats.signals += 1;
        Ok(NullSignal {
            state: Arc::new(SignalState {
                signaled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        })
    }

    fn create_commands(&self, queue: QueueKind) -> Result<Self::Commands> {
        Ok(NullCommands {
            queue,
            ops: Vec::new(),
        })
    }

    fn create_render_config(&self, desc: &RenderConfigDescriptor) -> Result<Self::RenderConfig> {
        if desc.color_formats.is_empty() {
            return Err(VidmixError::UnsupportedConfig(
                "descriptor has no color planes".into(),
            ));
        }
        self.state.lock().stats.render_configs += 1;
        Ok(NullRenderConfig {
            descriptor: desc.clone(),
        })
    }

    fn flush_staging(&self, _image: &Self::StagingImage) -> Result<()> {
        Ok(())
    }

    fn begin_commands(&self, commands: &mut Self::Commands) -> Result<()> {
        commands.ops.clear();
        Ok(())
    }

    fn transition_staging(
        &self,
        commands: &mut Self::Commands,
        _image: &Self::StagingImage,
        to: ImageLayout,
    ) {
        commands.ops.push(RecordedOp::StagingTransition { to });
    }

    fn transition_device(
        &self,
        commands: &mut Self::Commands,
        image: &Self::DeviceImage,
        from: ImageLayout,
        to: ImageLayout,
        src_family: u32,
        dst_family: u32,
    ) {
        commands.ops.push(RecordedOp::DeviceTransition {
            layout: Arc::clone(&image.layout),
            from,
            to,
            src_family,
            dst_family,
        });
    }

    fn copy_staging_to_device(
        &self,
        commands: &mut Self::Commands,
        src: &Self::StagingImage,
        dst: &Self::DeviceImage,
        _plane: &PlaneDescriptor,
    ) {
        commands.ops.push(RecordedOp::Copy {
            data: src.bytes.clone(),
            dst: Arc::clone(&dst.contents),
        });
    }

    fn submit(
        &self,
        commands: &mut Self::Commands,
        queue: QueueKind,
        signal: &Self::Signal,
    ) -> Result<()> {
        if commands.queue != queue {
            return Err(VidmixError::SubmissionFailed(format!(
                "command sequence recorded for {:?} submitted to {:?}",
                commands.queue, queue
            )));
        }

        let ops = std::mem::take(&mut commands.ops);
        let described: Vec<NullOp> = ops.iter().map(RecordedOp::describe).collect();
        for op in ops {
            op.execute();
        }

        {
            let mut state = self.state.lock();
            state.last_submission = described;
            state.stats.submissions += 1;
            if !self.auto_complete {
                state.pending.push(Arc::clone(&signal.state));
            }
        }
        if self.auto_complete {
            signal.state.set();
        }
        Ok(())
    }
}
