//! Frame Targets
//!
//! All screen-sized and shadow render targets used by the pipeline. Targets
//! are created once and resized only at `begin` boundaries; a zero-sized
//! request is a caller bug and is rejected with
//! [`RenderError::ZeroSizedTarget`].
//!
//! # G-buffer Layout
//!
//! | Attachment | Format          | Contents                          |
//! |------------|-----------------|-----------------------------------|
//! | Color 0    | `Rgba16Float`   | world normal (xyz), roughness (w) |
//! | Color 1    | `Rgba16Float`   | albedo (rgb), metallic (a)        |
//! | Color 2    | `Rgba16Float`   | emissive (rgb), occlusion (a)     |
//! | Color 3    | `Rgba16Float`   | selection mask (x), id + 1 (y)    |
//! | Depth      | `Depth32Float`  | scene depth                       |

use smallvec::SmallVec;

use super::device::{RenderDevice, TargetDesc, TargetId, TargetStatus, mip_extent};
use super::settings::{MAX_BLOOM_MIPS, MAX_CASCADES, RendererSettings, ShadowSettings};
use crate::errors::{RenderError, Result};

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Light-space depth and depth squared.
pub const SHADOW_MOMENTS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Float;

/// G-buffer colour attachment indices.
pub mod gbuffer {
    pub const NORMAL: u8 = 0;
    pub const ALBEDO: u8 = 1;
    pub const EMISSIVE: u8 = 2;
    pub const EDITOR: u8 = 3;
}

/// Light-shaft target attachments.
pub mod light_shaft {
    /// Raw ray-marched scattering.
    pub const SCATTERING: u8 = 0;
    /// Bilaterally filtered result sampled by the lighting pass.
    pub const FILTERED: u8 = 1;
}

fn ensure_non_zero(label: &'static str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::ZeroSizedTarget { label, width, height });
    }
    Ok(())
}

// ============================================================================
// Bloom chain
// ============================================================================

/// Three mip chains at half the frame size: downsample, blur buffer and
/// upsample.
#[derive(Debug, Clone)]
pub struct BloomChain {
    pub downsample: TargetId,
    pub buffer: TargetId,
    pub upsample: TargetId,
    width: u32,
    height: u32,
    mip_count: u32,
}

impl BloomChain {
    /// Mips that fit a `width x height` base, capped at `requested`.
    #[must_use]
    pub fn mip_count_for(width: u32, height: u32, requested: u32) -> u32 {
        let possible = width.max(height).max(1).ilog2() + 1;
        requested.clamp(1, MAX_BLOOM_MIPS).min(possible)
    }

    fn create<D: RenderDevice>(device: &mut D, frame_width: u32, frame_height: u32, requested: u32) -> Self {
        let width = frame_width.div_ceil(2);
        let height = frame_height.div_ceil(2);
        let mip_count = Self::mip_count_for(width, height, requested);

        let desc = |label| {
            TargetDesc::new(label, width, height)
                .with_color(HDR_FORMAT)
                .with_mips(mip_count)
        };
        let chain = Self {
            downsample: device.create_target(&desc("Bloom Downsample")),
            buffer: device.create_target(&desc("Bloom Buffer")),
            upsample: device.create_target(&desc("Bloom Upsample")),
            width,
            height,
            mip_count,
        };
        log::debug!("Bloom chain allocated: {width}x{height}, {mip_count} mips");
        chain
    }

    fn destroy<D: RenderDevice>(&self, device: &mut D) {
        device.destroy_target(self.downsample);
        device.destroy_target(self.buffer);
        device.destroy_target(self.upsample);
    }

    #[inline]
    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// `ceil(base / 2^level)` in each dimension.
    #[inline]
    #[must_use]
    pub fn mip_size(&self, level: u32) -> (u32, u32) {
        (mip_extent(self.width, level), mip_extent(self.height, level))
    }
}

// ============================================================================
// FrameTargets
// ============================================================================

#[derive(Debug)]
pub struct FrameTargets {
    width: u32,
    height: u32,
    pub gbuffer: TargetId,
    pub lighting: TargetId,
    pub cascades: SmallVec<[TargetId; MAX_CASCADES]>,
    /// Scratch target for the separable cascade blur.
    pub shadow_effects: TargetId,
    cascade_resolution: u32,
    pub bloom: BloomChain,
    /// Half-resolution light-shaft buffers.
    pub light_shafts: TargetId,
}

impl FrameTargets {
    pub fn new<D: RenderDevice>(device: &mut D, width: u32, height: u32, settings: &RendererSettings) -> Result<Self> {
        ensure_non_zero("Frame", width, height)?;
        ensure_non_zero("Shadow Cascade", settings.shadows.resolution, settings.shadows.resolution)?;

        let gbuffer = device.create_target(
            &TargetDesc::new("G-Buffer", width, height)
                .with_color(HDR_FORMAT)
                .with_color(HDR_FORMAT)
                .with_color(HDR_FORMAT)
                .with_color(HDR_FORMAT)
                .with_depth(DEPTH_FORMAT),
        );
        let lighting = device.create_target(
            &TargetDesc::new("Lighting", width, height)
                .with_color(HDR_FORMAT)
                .with_depth(DEPTH_FORMAT),
        );
        let (half_w, half_h) = (width.div_ceil(2), height.div_ceil(2));
        let light_shafts = device.create_target(
            &TargetDesc::new("Light Shafts", half_w, half_h)
                .with_color(HDR_FORMAT)
                .with_color(HDR_FORMAT),
        );
        let bloom = BloomChain::create(device, width, height, settings.bloom.mip_count);

        let mut targets = Self {
            width,
            height,
            gbuffer,
            lighting,
            cascades: SmallVec::new(),
            shadow_effects: TargetId::default(),
            cascade_resolution: 0,
            bloom,
            light_shafts,
        };
        targets.shadow_effects = device.create_target(&Self::cascade_desc("Shadow Effects", 1));
        targets.allocate_cascades(device, &settings.shadows)?;
        log::debug!("Frame targets allocated: {width}x{height}");
        targets.validate(device);
        Ok(targets)
    }

    fn cascade_desc(label: &'static str, resolution: u32) -> TargetDesc {
        TargetDesc::new(label, resolution, resolution)
            .with_color(SHADOW_MOMENTS_FORMAT)
            .with_depth(DEPTH_FORMAT)
    }

    /// (Re)creates the cascade targets for `shadows`. No-op when unchanged.
    pub fn allocate_cascades<D: RenderDevice>(&mut self, device: &mut D, shadows: &ShadowSettings) -> Result<()> {
        ensure_non_zero("Shadow Cascade", shadows.resolution, shadows.resolution)?;
        let count = (shadows.cascade_count as usize).clamp(1, MAX_CASCADES);
        if count == self.cascades.len() && shadows.resolution == self.cascade_resolution {
            return Ok(());
        }

        for id in self.cascades.drain(..) {
            device.destroy_target(id);
        }
        for _ in 0..count {
            let id = device.create_target(&Self::cascade_desc("Shadow Cascade", shadows.resolution));
            self.cascades.push(id);
        }
        device.resize_target(self.shadow_effects, shadows.resolution, shadows.resolution);
        self.cascade_resolution = shadows.resolution;
        log::debug!("Shadow cascades allocated: {count} x {}^2", shadows.resolution);
        Ok(())
    }

    /// Resizes screen-sized targets. Returns whether anything changed.
    pub fn resize<D: RenderDevice>(&mut self, device: &mut D, width: u32, height: u32, bloom_mips: u32) -> Result<bool> {
        ensure_non_zero("Frame", width, height)?;

        let bloom_changed = BloomChain::mip_count_for(width.div_ceil(2), height.div_ceil(2), bloom_mips)
            != self.bloom.mip_count;
        if width == self.width && height == self.height && !bloom_changed {
            return Ok(false);
        }

        device.resize_target(self.gbuffer, width, height);
        device.resize_target(self.lighting, width, height);
        device.resize_target(self.light_shafts, width.div_ceil(2), height.div_ceil(2));
        self.bloom.destroy(device);
        self.bloom = BloomChain::create(device, width, height, bloom_mips);
        self.width = width;
        self.height = height;

        log::debug!("Frame targets resized: {width}x{height}");
        self.validate(device);
        Ok(true)
    }

    /// Logs every incomplete target and returns how many there were.
    pub fn validate<D: RenderDevice>(&self, device: &D) -> usize {
        let mut incomplete = 0;
        for (label, id) in self.labelled() {
            if let TargetStatus::Incomplete(reason) = device.target_status(id) {
                log::warn!("Render target '{label}' is incomplete: {reason}");
                incomplete += 1;
            }
        }
        incomplete
    }

    fn labelled(&self) -> impl Iterator<Item = (&'static str, TargetId)> + '_ {
        [
            ("G-Buffer", self.gbuffer),
            ("Lighting", self.lighting),
            ("Shadow Effects", self.shadow_effects),
            ("Light Shafts", self.light_shafts),
            ("Bloom Downsample", self.bloom.downsample),
            ("Bloom Buffer", self.bloom.buffer),
            ("Bloom Upsample", self.bloom.upsample),
        ]
        .into_iter()
        .chain(self.cascades.iter().map(|&id| ("Shadow Cascade", id)))
    }

    pub fn destroy<D: RenderDevice>(self, device: &mut D) {
        for (_, id) in self.labelled() {
            device.destroy_target(id);
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn cascade_resolution(&self) -> u32 {
        self.cascade_resolution
    }
}
