//! Attachment storage for the software device.
//!
//! Texels are stored at the precision of their format: 16-bit float formats
//! as `half::f16`, 32-bit formats as `f32`, LDR formats as 8-bit unorm. Every
//! read widens to `Vec4` so kernels work in one type.

use glam::{Vec2, Vec4};
use half::f16;

use crate::renderer::device::mip_extent;

#[derive(Debug, Clone)]
enum Storage {
    Half(Vec<[f16; 4]>),
    Float(Vec<Vec4>),
    Unorm(Vec<[u8; 4]>),
}

fn storage_for(format: wgpu::TextureFormat, len: usize) -> Storage {
    use wgpu::TextureFormat as F;
    match format {
        F::Rgba16Float | F::Rg16Float | F::R16Float => Storage::Half(vec![[f16::ZERO; 4]; len]),
        F::Rgba8Unorm | F::Rgba8UnormSrgb | F::Bgra8Unorm | F::Bgra8UnormSrgb => Storage::Unorm(vec![[0; 4]; len]),
        _ => Storage::Float(vec![Vec4::ZERO; len]),
    }
}

/// Number of meaningful channels; the rest read back as `(0, 0, 0, 1)`.
fn channel_count(format: wgpu::TextureFormat) -> usize {
    use wgpu::TextureFormat as F;
    match format {
        F::R16Float | F::R32Float | F::Depth32Float | F::Depth24Plus | F::Depth16Unorm => 1,
        F::Rg16Float | F::Rg32Float => 2,
        _ => 4,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Level {
    pub width: u32,
    pub height: u32,
    channels: usize,
    data: Storage,
}

impl Level {
    fn new(format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: channel_count(format),
            data: storage_for(format, (width * height) as usize),
        }
    }

    #[cfg(test)]
    pub(crate) fn filled(format: wgpu::TextureFormat, width: u32, height: u32, value: Vec4) -> Self {
        let mut level = Self::new(format, width, height);
        level.fill(value);
        level
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    fn mask(&self, v: Vec4) -> Vec4 {
        match self.channels {
            1 => Vec4::new(v.x, 0.0, 0.0, 1.0),
            2 => Vec4::new(v.x, v.y, 0.0, 1.0),
            _ => v,
        }
    }

    #[must_use]
    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        let i = self.index(x.min(self.width - 1), y.min(self.height - 1));
        match &self.data {
            Storage::Half(d) => Vec4::from_array(d[i].map(f16::to_f32)),
            Storage::Float(d) => d[i],
            Storage::Unorm(d) => Vec4::from_array(d[i].map(|c| f32::from(c) / 255.0)),
        }
    }

    /// Clamp-to-edge load for signed coordinates.
    #[must_use]
    pub fn load_clamped(&self, x: i64, y: i64) -> Vec4 {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.load(cx, cy)
    }

    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        let v = self.mask(value);
        match &mut self.data {
            Storage::Half(d) => d[i] = v.to_array().map(f16::from_f32),
            Storage::Float(d) => d[i] = v,
            Storage::Unorm(d) => d[i] = v.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8),
        }
    }

    pub fn fill(&mut self, value: Vec4) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.store(x, y, value);
            }
        }
    }

    /// Texel nearest to `uv` in `[0, 1]^2`.
    #[must_use]
    pub fn sample_nearest(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.width as f32).floor() as i64;
        let y = (uv.y * self.height as f32).floor() as i64;
        self.load_clamped(x, y)
    }

    /// Bilinear, clamp-to-edge sample at `uv`.
    #[must_use]
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec4 {
        let px = uv.x * self.width as f32 - 0.5;
        let py = uv.y * self.height as f32 - 0.5;
        let (x0, y0) = (px.floor(), py.floor());
        let (fx, fy) = (px - x0, py - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.load_clamped(x0, y0);
        let b = self.load_clamped(x0 + 1, y0);
        let c = self.load_clamped(x0, y0 + 1);
        let d = self.load_clamped(x0 + 1, y0 + 1);
        a.lerp(b, fx).lerp(c.lerp(d, fx), fy)
    }

    #[inline]
    #[must_use]
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    /// Center of texel `(x, y)` in uv space.
    #[inline]
    #[must_use]
    pub fn uv_of(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new((x as f32 + 0.5) / self.width as f32, (y as f32 + 0.5) / self.height as f32)
    }
}

/// One attachment with its full mip chain.
#[derive(Debug, Clone)]
pub(crate) struct SoftImage {
    pub format: wgpu::TextureFormat,
    levels: Vec<Level>,
}

impl SoftImage {
    pub fn new(format: wgpu::TextureFormat, width: u32, height: u32, mips: u32) -> Self {
        let levels = (0..mips.max(1))
            .map(|mip| Level::new(format, mip_extent(width, mip), mip_extent(height, mip)))
            .collect();
        Self { format, levels }
    }

    #[inline]
    pub fn level(&self, mip: u32) -> Option<&Level> {
        self.levels.get(mip as usize)
    }

    #[inline]
    pub fn level_mut(&mut self, mip: u32) -> Option<&mut Level> {
        self.levels.get_mut(mip as usize)
    }

    #[inline]
    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }
}
