//! Cascade Shadow Calculator
//!
//! Pure math that partitions the camera frustum along view depth and fits an
//! orthographic light volume around each slice. Nothing here touches a
//! device, so every step is unit-testable.
//!
//! # Steps
//!
//! 1. Blend logarithmic and uniform split schemes ([`split_fractions`]).
//! 2. Accumulate the world bounds of every shadow caster ([`caster_bounds`]).
//! 3. Slice the camera frustum and wrap each slice in a sphere
//!    ([`slice_corners`], [`bounding_sphere`]).
//! 4. Fit a light view/ortho projection around the sphere, pulled back far
//!    enough to keep off-screen casters ([`fit_cascade`]).
//! 5. Snap the projection to the shadow-map texel grid ([`snap_to_texels`]).
//! 6. Build a culling frustum per cascade.

use glam::{Mat4, UVec4, Vec3, Vec4};
use smallvec::SmallVec;

use crate::renderer::frame::RenderQueues;
use crate::renderer::settings::{MAX_CASCADES, RendererSettings, ShadowQuality};
use crate::renderer::uniforms::CascadeUniforms;
use crate::resources::{AxisAlignedBox, Model};
use crate::scene::{Camera, DirectionalLightRecord, Frustum};

/// Depth slack in front of and behind each cascade volume.
const DEPTH_PADDING: f32 = 15.0;

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Clone)]
pub struct Cascade {
    pub index: usize,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Far end of this cascade in view depth.
    pub split_far: f32,
    /// Volume used to cull this cascade's casters.
    pub frustum: Frustum,
}

/// Cascades for the primary directional light of one frame.
#[derive(Debug, Clone)]
pub struct CascadeSet {
    cascades: SmallVec<[Cascade; MAX_CASCADES]>,
    light: DirectionalLightRecord,
    resolution: u32,
}

impl CascadeSet {
    #[inline]
    #[must_use]
    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// The light driving the cascades.
    #[inline]
    #[must_use]
    pub fn light(&self) -> &DirectionalLightRecord {
        &self.light
    }

    #[inline]
    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[must_use]
    pub fn uniforms(&self, settings: &RendererSettings) -> CascadeUniforms {
        let mut u = CascadeUniforms::default();
        let mut splits = [f32::MAX; MAX_CASCADES];
        for c in &self.cascades {
            u.view_projection[c.index] = c.view_projection;
            splits[c.index] = c.split_far;
        }
        u.splits = Vec4::from_array(splits);
        let quality = match settings.shadows.quality {
            ShadowQuality::Hard => 0,
            ShadowQuality::Blurred => 1,
        };
        u.params = UVec4::new(self.cascades.len() as u32, self.resolution, quality, 0);
        u.bias = Vec4::new(settings.shadows.depth_bias, 0.0, 0.0, 0.0);
        u
    }
}

// ============================================================================
// Split computation
// ============================================================================

/// Split positions as fractions of `far - near`, one per cascade.
///
/// `split_i = λ·log_i + (1 − λ)·uniform_i`, normalized into `[0, 1]`.
/// Entries past `count` are `1.0`.
#[must_use]
pub fn split_fractions(count: usize, near: f32, far: f32, lambda: f32) -> [f32; MAX_CASCADES] {
    let mut out = [1.0; MAX_CASCADES];
    let n = count.clamp(1, MAX_CASCADES);
    let range = far - near;
    let ratio = far / near;

    for (i, slot) in out.iter_mut().take(n).enumerate() {
        let p = (i + 1) as f32 / n as f32;
        let log = near * ratio.powf(p);
        let uniform = near + range * p;
        let d = lambda * (log - uniform) + uniform;
        *slot = ((d - near) / range).clamp(0.0, 1.0);
    }
    out[n - 1] = 1.0;
    out
}

/// Far split distances in view depth, `near + fraction * (far - near)`.
#[must_use]
pub fn split_distances(count: usize, near: f32, far: f32, lambda: f32) -> [f32; MAX_CASCADES] {
    split_fractions(count, near, far, lambda).map(|f| near + f * (far - near))
}

// ============================================================================
// Scene extents
// ============================================================================

fn model_bounds(model: &Model, transform: &Mat4) -> AxisAlignedBox {
    model.bounds().transformed(transform)
}

/// World-space bounds of every queued shadow caster, visible or not.
#[must_use]
pub fn caster_bounds(queues: &RenderQueues) -> AxisAlignedBox {
    let statics = queues
        .static_shadow()
        .iter()
        .map(|s| model_bounds(&s.model, &s.transform));
    let skinned = queues
        .skinned_shadow()
        .iter()
        .map(|s| model_bounds(&s.model, &s.transform));
    statics
        .chain(skinned)
        .fold(AxisAlignedBox::EMPTY, |acc, b| acc.union(&b))
}

// ============================================================================
// Slice fitting
// ============================================================================

/// World-space corners of the camera frustum between two split fractions.
///
/// Corners follow the same order as [`Frustum::corners`].
#[must_use]
pub fn slice_corners(camera: &Camera, near_fraction: f32, far_fraction: f32) -> [Vec3; 8] {
    let frustum = Frustum::from_view_projection(&camera.view_projection, camera.front);
    let full = frustum.corners();
    let mut out = [Vec3::ZERO; 8];
    for j in 0..4 {
        let ray = full[j + 4] - full[j];
        out[j] = full[j] + ray * near_fraction;
        out[j + 4] = full[j] + ray * far_fraction;
    }
    out
}

/// Corner-average center and a whole-unit radius enclosing all corners.
///
/// Rounding the radius up keeps the cascade size fixed while the camera
/// rotates, which keeps texel snapping stable.
#[must_use]
pub fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let radius = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0_f32, f32::max)
        .ceil()
        .max(1.0);
    (center, radius)
}

fn light_up(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
}

/// Light view and orthographic projection around one cascade sphere.
///
/// The eye sits on the light side of `center`, pulled back by the sphere
/// radius or by `scene_reach` when casters extend further than the slice.
#[must_use]
pub fn fit_cascade(direction: Vec3, center: Vec3, radius: f32, scene_reach: f32) -> (Mat4, Mat4) {
    let to_light = -direction.normalize_or(Vec3::NEG_Y);
    let pull_back = radius.max(scene_reach);
    let eye = center + to_light * pull_back;
    let view = Mat4::look_at_rh(eye, center, light_up(to_light));
    let projection = Mat4::orthographic_rh(
        -radius,
        radius,
        -radius,
        radius,
        -DEPTH_PADDING,
        2.0 * pull_back + DEPTH_PADDING,
    );
    (view, projection)
}

/// Shifts `projection` so the world origin lands exactly on a texel.
///
/// Whole-texel movement of the light volume keeps shadow edges from
/// shimmering as the camera translates.
#[must_use]
pub fn snap_to_texels(projection: Mat4, view: Mat4, resolution: u32) -> Mat4 {
    let half = resolution as f32 * 0.5;
    let origin = (projection * view) * Vec4::W;
    let scaled = origin * half;
    let rounded = scaled.round();
    let mut offset = (rounded - scaled) / half;
    offset.z = 0.0;
    offset.w = 0.0;

    let mut snapped = projection;
    snapped.w_axis += offset;
    snapped
}

/// Selects the directional light that drives the cascades.
///
/// Several primary shadow-casting lights resolve last-wins.
#[must_use]
pub fn primary_light(lights: &[DirectionalLightRecord]) -> Option<&DirectionalLightRecord> {
    let mut candidates = lights.iter().filter(|l| l.drives_cascades());
    let first = candidates.next()?;
    let mut last = first;
    let mut count = 1;
    for light in candidates {
        last = light;
        count += 1;
    }
    if count > 1 {
        log::warn!("{count} primary shadow-casting directional lights queued; using the last one");
    }
    Some(last)
}

// ============================================================================
// Entry point
// ============================================================================

/// Computes this frame's cascades, or `None` without a primary shadow light.
#[must_use]
pub fn compute(camera: &Camera, queues: &RenderQueues, settings: &RendererSettings) -> Option<CascadeSet> {
    let light = *primary_light(queues.directional())?;
    let count = settings.cascade_count();
    let resolution = settings.shadows.resolution;
    let fractions = split_fractions(count, camera.near, camera.far, settings.shadows.lambda);
    let scene = caster_bounds(queues);

    let mut cascades: SmallVec<[Cascade; MAX_CASCADES]> = SmallVec::new();
    let mut previous = 0.0;
    for (index, &fraction) in fractions.iter().take(count).enumerate() {
        let corners = slice_corners(camera, previous, fraction);
        let (center, radius) = bounding_sphere(&corners);

        let scene_reach = if scene.is_empty() {
            0.0
        } else {
            scene
                .corners()
                .iter()
                .map(|c| c.distance(center))
                .fold(0.0_f32, f32::max)
        };

        let (view, projection) = fit_cascade(light.direction, center, radius, scene_reach);
        let projection = snap_to_texels(projection, view, resolution);
        let view_projection = projection * view;

        cascades.push(Cascade {
            index,
            view,
            projection,
            view_projection,
            split_far: camera.near + fraction * (camera.far - camera.near),
            frustum: Frustum::from_view_projection(&view_projection, light.direction),
        });
        previous = fraction;
    }

    let splits: SmallVec<[f32; MAX_CASCADES]> = cascades.iter().map(|c| c.split_far).collect();
    log::debug!("Cascades: splits {splits:?}");

    Some(CascadeSet {
        cascades,
        light,
        resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_lambda_gives_even_splits() {
        let f = split_fractions(4, 1.0, 101.0, 0.0);
        for (i, v) in f.iter().enumerate() {
            assert!((v - (i + 1) as f32 / 4.0).abs() < 1e-5);
        }
    }

    #[test]
    fn last_split_reaches_far() {
        let d = split_distances(3, 0.1, 500.0, 0.9);
        assert!((d[2] - 500.0).abs() < 1e-3);
    }

    #[test]
    fn sphere_radius_is_whole_units() {
        let mut corners = [Vec3::ZERO; 8];
        corners[0] = Vec3::new(0.6, 0.0, 0.0);
        let (_, r) = bounding_sphere(&corners);
        assert_eq!(r, 1.0);
    }
}
