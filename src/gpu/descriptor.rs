//! Structural descriptors: the format/shape parameters that decide whether
//! two resources can share pooled instances or one cached render
//! configuration.

use std::hash::{Hash, Hasher};

use smallvec::{SmallVec, smallvec};
use xxhash_rust::xxh3::Xxh3;

use super::ImageLayout;

/// Bytes per texel for the formats the compositor feeds through its planes.
fn texel_size(format: wgpu::TextureFormat) -> usize {
    use wgpu::TextureFormat as F;
    match format {
        F::R8Unorm | F::R8Snorm | F::R8Uint | F::R8Sint => 1,
        F::Rg8Unorm | F::Rg8Snorm | F::R16Float | F::R16Uint | F::R16Sint => 2,
        F::Rgba8Unorm
        | F::Rgba8UnormSrgb
        | F::Bgra8Unorm
        | F::Bgra8UnormSrgb
        | F::Rg16Float
        | F::R32Float
        | F::R32Uint => 4,
        F::Rgba16Float | F::Rg32Float => 8,
        F::Rgba32Float => 16,
        _ => 4,
    }
}

// ============================================================================
// Plane / Frame descriptors
// ============================================================================

/// Shape of a single plane of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl PlaneDescriptor {
    #[must_use]
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Size of a tightly packed host copy of this plane.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * texel_size(self.format)
    }

    /// Bytes per row of a tightly packed host copy.
    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * texel_size(self.format)
    }
}

/// Full frame shape: the per-plane layout an [`Uploader`] is constructed for.
///
/// [`Uploader`]: crate::render::Uploader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameDescriptor {
    pub planes: SmallVec<[PlaneDescriptor; 4]>,
}

impl FrameDescriptor {
    #[must_use]
    pub fn new(planes: impl IntoIterator<Item = PlaneDescriptor>) -> Self {
        Self {
            planes: planes.into_iter().collect(),
        }
    }

    /// Single-plane packed RGBA frame.
    #[must_use]
    pub fn rgba(width: u32, height: u32) -> Self {
        Self {
            planes: smallvec![PlaneDescriptor::new(
                width,
                height,
                wgpu::TextureFormat::Rgba8Unorm
            )],
        }
    }

    /// Two-plane NV12-style frame: full-resolution luma plus half-resolution
    /// interleaved chroma.
    #[must_use]
    pub fn nv12(width: u32, height: u32) -> Self {
        Self {
            planes: smallvec![
                PlaneDescriptor::new(width, height, wgpu::TextureFormat::R8Unorm),
                PlaneDescriptor::new(
                    width.div_ceil(2),
                    height.div_ceil(2),
                    wgpu::TextureFormat::Rg8Unorm
                ),
            ],
        }
    }

    /// Three-plane 4:2:0 planar YUV frame.
    #[must_use]
    pub fn planar_yuv420(width: u32, height: u32) -> Self {
        let chroma_w = width.div_ceil(2);
        let chroma_h = height.div_ceil(2);
        Self {
            planes: smallvec![
                PlaneDescriptor::new(width, height, wgpu::TextureFormat::R8Unorm),
                PlaneDescriptor::new(chroma_w, chroma_h, wgpu::TextureFormat::R8Unorm),
                PlaneDescriptor::new(chroma_w, chroma_h, wgpu::TextureFormat::R8Unorm),
            ],
        }
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Per-plane formats, in plane order.
    #[must_use]
    pub fn color_formats(&self) -> SmallVec<[wgpu::TextureFormat; 4]> {
        self.planes.iter().map(|p| p.format).collect()
    }
}

// ============================================================================
// Render configuration descriptor
// ============================================================================

/// The structural parameters that determine render-configuration
/// compatibility.
///
/// Participating fields, exactly: the per-plane color format list (count and
/// values), the auxiliary-surface format, and the final layout/usage intent.
/// Deliberately excluded: image extent (configurations are compatible across
/// sizes of the same shape) and debug labels.
///
/// [`hash64`](Self::hash64) is an index accelerator only — the configuration
/// cache always compares descriptors field-for-field before reusing an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderConfigDescriptor {
    /// One output format per pixel plane.
    pub color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    /// Auxiliary surface (depth/alpha scratch), if the pass uses one.
    pub aux_format: Option<wgpu::TextureFormat>,
    /// Layout the outputs are left in for the downstream consumer.
    pub final_layout: ImageLayout,
}

impl RenderConfigDescriptor {
    /// Single-target configuration left in shader-readable layout.
    #[must_use]
    pub fn single(format: wgpu::TextureFormat) -> Self {
        Self {
            color_formats: smallvec![format],
            aux_format: None,
            final_layout: ImageLayout::ShaderRead,
        }
    }

    /// 64-bit structural hash folding all participating fields.
    #[must_use]
    pub fn hash64(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
