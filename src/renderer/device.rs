//! Render Device Seam
//!
//! The pipeline records work against [`RenderDevice`] and never touches a
//! graphics API itself. A device owns render targets (addressed by
//! [`TargetId`]) and executes four kinds of commands:
//!
//! - **Mesh draws** rasterize a submesh into a target ([`MeshDraw`]).
//! - **Fullscreen draws** run a screen-space program, optionally blended and
//!   depth tested ([`FullscreenDraw`]).
//! - **Compute dispatches** run image kernels over work groups
//!   ([`ComputeDispatch`]).
//! - **Memory barriers** make prior compute writes visible to later reads.
//!
//! Programs are a closed enum: each variant names exactly the images and
//! uniform blocks its shader binds, so a device cannot be handed a
//! half-bound draw.

use bitflags::bitflags;
use glam::Mat4;
use slotmap::new_key_type;
use smallvec::SmallVec;

use super::uniforms::{
    AmbientUniforms, BloomUniforms, CameraUniforms, CascadeUniforms, DirectionalUniforms, LightShaftUniforms,
    ModelUniforms, OutlineUniforms, PointUniforms, PostProcessUniforms,
};
use crate::resources::{MaterialHandle, MeshHandle, TextureHandle};
use crate::scene::{HillaireSky, SkyModel};

new_key_type! {
    /// A render target owned by a [`RenderDevice`].
    pub struct TargetId;
}

// ============================================================================
// Targets
// ============================================================================

/// Extent of mip `level` for a base dimension: `ceil(base / 2^level)`, min 1.
#[inline]
#[must_use]
pub fn mip_extent(base: u32, level: u32) -> u32 {
    base.div_ceil(1u32 << level.min(31)).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub color: SmallVec<[wgpu::TextureFormat; 4]>,
    pub depth: Option<wgpu::TextureFormat>,
}

impl TargetDesc {
    #[must_use]
    pub fn new(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
            mip_levels: 1,
            color: SmallVec::new(),
            depth: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, format: wgpu::TextureFormat) -> Self {
        self.color.push(format);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth = Some(format);
        self
    }

    #[must_use]
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Complete,
    Incomplete(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u8),
    Depth,
}

/// One mip of one attachment of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub target: TargetId,
    pub attachment: Attachment,
    pub mip: u32,
}

impl ImageRef {
    #[must_use]
    pub fn color(target: TargetId, index: u8) -> Self {
        Self {
            target,
            attachment: Attachment::Color(index),
            mip: 0,
        }
    }

    #[must_use]
    pub fn depth(target: TargetId) -> Self {
        Self {
            target,
            attachment: Attachment::Depth,
            mip: 0,
        }
    }

    #[must_use]
    pub fn mip(self, mip: u32) -> Self {
        Self { mip, ..self }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshProgram {
    /// Writes surface attributes into the G-buffer attachments.
    GBuffer { material: MaterialHandle },
    /// Writes light-space depth into a cascade target.
    ShadowCaster,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshDraw<'a> {
    pub target: TargetId,
    pub program: MeshProgram,
    pub mesh: MeshHandle,
    pub view_projection: Mat4,
    pub model: ModelUniforms,
    /// Bone palette for skinned meshes.
    pub bones: Option<&'a [Mat4]>,
}

/// Cascaded shadow inputs bound by shadowed lighting programs.
#[derive(Debug, Clone, Copy)]
pub struct ShadowBinding<'a> {
    pub cascades: &'a CascadeUniforms,
    /// One target per cascade, `cascades.count()` long.
    pub maps: &'a [TargetId],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
pub enum FullscreenProgram<'a> {
    Ambient {
        gbuffer: TargetId,
        camera: &'a CameraUniforms,
        irradiance: TextureHandle,
        prefiltered: TextureHandle,
        brdf_lut: TextureHandle,
        uniforms: AmbientUniforms,
    },
    Directional {
        gbuffer: TargetId,
        camera: &'a CameraUniforms,
        light: DirectionalUniforms,
        shadows: Option<ShadowBinding<'a>>,
        light_shafts: Option<ImageRef>,
    },
    Point {
        gbuffer: TargetId,
        camera: &'a CameraUniforms,
        light: PointUniforms,
    },
    AerialPerspective {
        depth: ImageRef,
        camera: &'a CameraUniforms,
        sky: &'a HillaireSky,
    },
    Sky {
        camera: &'a CameraUniforms,
        sky: &'a SkyModel,
    },
    ShadowBlur {
        source: ImageRef,
        axis: BlurAxis,
    },
    Composite {
        lighting: ImageRef,
        editor: ImageRef,
        bloom: Option<ImageRef>,
        uniforms: PostProcessUniforms,
    },
    Grid {
        depth: ImageRef,
        camera: &'a CameraUniforms,
    },
    Outline {
        editor: ImageRef,
        uniforms: OutlineUniforms,
    },
}

impl FullscreenProgram<'_> {
    /// Short program name, as it would appear in a GPU capture.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ambient { .. } => "ambient",
            Self::Directional { .. } => "directional",
            Self::Point { .. } => "point",
            Self::AerialPerspective { .. } => "aerial_perspective",
            Self::Sky { .. } => "sky",
            Self::ShadowBlur { .. } => "shadow_blur",
            Self::Composite { .. } => "composite",
            Self::Grid { .. } => "grid",
            Self::Outline { .. } => "outline",
        }
    }

    /// Images sampled by the program.
    #[must_use]
    pub fn reads(&self) -> SmallVec<[ImageRef; 8]> {
        let gbuffer_images = |gbuffer: TargetId| {
            (0..4u8)
                .map(move |i| ImageRef::color(gbuffer, i))
                .chain(std::iter::once(ImageRef::depth(gbuffer)))
        };

        let mut out = SmallVec::new();
        match *self {
            Self::Ambient { gbuffer, .. } | Self::Point { gbuffer, .. } => out.extend(gbuffer_images(gbuffer)),
            Self::Directional {
                gbuffer,
                shadows,
                light_shafts,
                ..
            } => {
                out.extend(gbuffer_images(gbuffer));
                if let Some(shadows) = shadows {
                    out.extend(shadows.maps.iter().map(|&t| ImageRef::color(t, 0)));
                }
                out.extend(light_shafts);
            }
            Self::AerialPerspective { depth, .. } | Self::Grid { depth, .. } => out.push(depth),
            Self::Sky { .. } => {}
            Self::ShadowBlur { source, .. } => out.push(source),
            Self::Composite {
                lighting,
                editor,
                bloom,
                ..
            } => {
                out.push(lighting);
                out.push(editor);
                out.extend(bloom);
            }
            Self::Outline { editor, .. } => out.push(editor),
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FullscreenDraw<'a> {
    pub target: TargetId,
    /// `None` replaces the destination.
    pub blend: Option<wgpu::BlendState>,
    /// `None` disables depth testing.
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub program: FullscreenProgram<'a>,
}

/// One-one additive blending used by the light and overlay subpasses.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

#[derive(Debug, Clone, Copy)]
pub enum ComputeProgram<'a> {
    BloomPrefilter {
        source: ImageRef,
        dest: ImageRef,
        uniforms: BloomUniforms,
    },
    BloomDownsample {
        source: ImageRef,
        dest: ImageRef,
    },
    BloomUpsample {
        source: ImageRef,
        dest: ImageRef,
        uniforms: BloomUniforms,
    },
    /// `dest = current + tent(previous)`, `previous` one mip coarser.
    BloomUpsampleBlend {
        previous: ImageRef,
        current: ImageRef,
        dest: ImageRef,
        uniforms: BloomUniforms,
    },
    LightShafts {
        depth: ImageRef,
        dest: ImageRef,
        camera: &'a CameraUniforms,
        light: DirectionalUniforms,
        shadows: ShadowBinding<'a>,
        uniforms: LightShaftUniforms,
    },
    BilateralBlur {
        source: ImageRef,
        depth: ImageRef,
        dest: ImageRef,
    },
}

impl ComputeProgram<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BloomPrefilter { .. } => "bloom_prefilter",
            Self::BloomDownsample { .. } => "bloom_downsample",
            Self::BloomUpsample { .. } => "bloom_upsample",
            Self::BloomUpsampleBlend { .. } => "bloom_upsample_blend",
            Self::LightShafts { .. } => "light_shafts",
            Self::BilateralBlur { .. } => "bilateral_blur",
        }
    }

    /// Images sampled by the kernel.
    #[must_use]
    pub fn reads(&self) -> SmallVec<[ImageRef; 4]> {
        let mut out = SmallVec::new();
        match *self {
            Self::BloomPrefilter { source, .. }
            | Self::BloomDownsample { source, .. }
            | Self::BloomUpsample { source, .. } => out.push(source),
            Self::BloomUpsampleBlend { previous, current, .. } => {
                out.push(previous);
                out.push(current);
            }
            Self::LightShafts { depth, shadows, .. } => {
                out.push(depth);
                out.extend(shadows.maps.iter().map(|&t| ImageRef::color(t, 0)));
            }
            Self::BilateralBlur { source, depth, .. } => {
                out.push(source);
                out.push(depth);
            }
        }
        out
    }

    /// Storage image written by the kernel.
    #[must_use]
    pub fn writes(&self) -> ImageRef {
        match *self {
            Self::BloomPrefilter { dest, .. }
            | Self::BloomDownsample { dest, .. }
            | Self::BloomUpsample { dest, .. }
            | Self::BloomUpsampleBlend { dest, .. }
            | Self::LightShafts { dest, .. }
            | Self::BilateralBlur { dest, .. } => dest,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComputeDispatch<'a> {
    pub program: ComputeProgram<'a>,
    pub groups: [u32; 3],
}

impl<'a> ComputeDispatch<'a> {
    /// Dispatch covering a `width x height` image with square groups.
    #[must_use]
    pub fn covering(program: ComputeProgram<'a>, width: u32, height: u32, group_size: u32) -> Self {
        Self {
            program,
            groups: [width.div_ceil(group_size), height.div_ceil(group_size), 1],
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryBarrier: u32 {
        /// Storage image writes become visible to image loads.
        const SHADER_IMAGE_ACCESS = 1 << 0;
        /// Storage image writes become visible to sampled reads.
        const TEXTURE_FETCH = 1 << 1;
        /// Writes become visible to framebuffer attachments.
        const FRAMEBUFFER = 1 << 2;
        const ALL = Self::SHADER_IMAGE_ACCESS.bits()
            | Self::TEXTURE_FETCH.bits()
            | Self::FRAMEBUFFER.bits();
    }
}

// ============================================================================
// RenderDevice
// ============================================================================

/// A command sink able to execute the pipeline's draws and dispatches.
///
/// Commands execute in submission order. Compute writes are only guaranteed
/// visible to later commands after a [`MemoryBarrier`].
pub trait RenderDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> TargetId;

    /// Reallocates every attachment; contents become undefined.
    fn resize_target(&mut self, id: TargetId, width: u32, height: u32);

    fn destroy_target(&mut self, id: TargetId);

    fn target_status(&self, id: TargetId) -> TargetStatus;

    /// Size of mip `mip`, or `None` when the target or mip does not exist.
    fn target_extent(&self, id: TargetId, mip: u32) -> Option<(u32, u32)>;

    /// Clears every colour attachment's mip 0, and depth when requested.
    fn clear(&mut self, id: TargetId, color: [f32; 4], depth: Option<f32>);

    /// Copies depth from `source` to `dest`; sizes must match.
    fn blit_depth(&mut self, source: TargetId, dest: TargetId);

    fn draw_mesh(&mut self, draw: &MeshDraw<'_>);

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>);

    fn dispatch(&mut self, dispatch: &ComputeDispatch<'_>);

    fn memory_barrier(&mut self, barrier: MemoryBarrier);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_rounds_up() {
        assert_eq!(mip_extent(101, 0), 101);
        assert_eq!(mip_extent(101, 1), 51);
        assert_eq!(mip_extent(101, 2), 26);
        assert_eq!(mip_extent(1, 5), 1);
    }

    #[test]
    fn covering_dispatch_rounds_groups_up() {
        let d = ComputeDispatch::covering(
            ComputeProgram::BloomDownsample {
                source: ImageRef::color(TargetId::default(), 0),
                dest: ImageRef::color(TargetId::default(), 0).mip(1),
            },
            65,
            32,
            32,
        );
        assert_eq!(d.groups, [3, 1, 1]);
    }
}
