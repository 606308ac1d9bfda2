//! GPU uniform blocks.
//!
//! Every block is `#[repr(C)]` and `Pod` so a device can upload it verbatim.
//! Vectors are padded to 16 bytes to match std140 layout.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec4};

use super::settings::MAX_CASCADES;
use crate::scene::Camera;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    /// Camera position (xyz), near plane (w).
    pub position_near: Vec4,
    /// View direction (xyz), far plane (w).
    pub front_far: Vec4,
}

impl From<&Camera> for CameraUniforms {
    fn from(camera: &Camera) -> Self {
        Self {
            view: camera.view,
            projection: camera.projection,
            view_projection: camera.view_projection,
            inverse_view_projection: camera.inverse_view_projection,
            position_near: camera.position.extend(camera.near),
            front_far: camera.front.extend(camera.far),
        }
    }
}

/// Per-draw state for the geometry and shadow passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ModelUniforms {
    pub model: Mat4,
    /// Selection mask (x) and entity id + 1 (y). Zero id means "no entity".
    pub selection: Vec4,
}

impl ModelUniforms {
    #[must_use]
    pub fn new(model: Mat4, id: u32, selected: bool) -> Self {
        let mask = if selected { 1.0 } else { 0.0 };
        Self {
            model,
            selection: Vec4::new(mask, id as f32 + 1.0, 0.0, 0.0),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct AmbientUniforms {
    /// Screen width (x), height (y), environment intensity (z).
    pub size_intensity: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DirectionalUniforms {
    /// Colour (rgb), intensity (a).
    pub color_intensity: Vec4,
    /// World-space travel direction (xyz).
    pub direction: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PointUniforms {
    pub color_intensity: Vec4,
    /// World position (xyz), radius (w).
    pub position_radius: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CascadeUniforms {
    pub view_projection: [Mat4; MAX_CASCADES],
    /// Far split distance of each cascade in view depth.
    pub splits: Vec4,
    /// Cascade count (x), resolution (y), quality (z: 0 hard, 1 blurred).
    pub params: UVec4,
    /// Depth bias (x).
    pub bias: Vec4,
}

impl CascadeUniforms {
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.params.x as usize
    }

    #[inline]
    #[must_use]
    pub fn is_blurred(&self) -> bool {
        self.params.z == 1
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightShaftUniforms {
    /// Mie scattering (rgb), intensity (a).
    pub mie_scattering_intensity: Vec4,
    /// Mie absorption (rgb), density (a).
    pub mie_absorption_density: Vec4,
    /// Sample count (x).
    pub params: UVec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BloomUniforms {
    /// `(threshold, threshold - knee, 2 * knee, 0.25 / knee)`.
    pub curve: Vec4,
    /// Upsample filter radius (x).
    pub radius: Vec4,
}

/// Bit positions in [`PostProcessUniforms::flags`].
pub mod post_flags {
    pub const BLOOM: u32 = 1 << 0;
    pub const FXAA: u32 = 1 << 1;
    pub const LIGHT_SHAFTS: u32 = 1 << 2;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PostProcessUniforms {
    /// Camera position (xyz), screen width (w).
    pub data0: Vec4,
    /// Screen height (x), gamma (y), bloom intensity (z).
    pub data1: Vec4,
    /// Tone mapping mode (x), enable bits (y).
    pub flags: UVec4,
}

impl PostProcessUniforms {
    #[inline]
    #[must_use]
    pub fn has(&self, flag: u32) -> bool {
        self.flags.y & flag != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct OutlineUniforms {
    pub color: Vec4,
}
