use glam::{Mat4, Vec3};

use super::frustum::Frustum;
use crate::errors::{RenderError, Result};

/// Camera snapshot taken at `begin` and held for the whole frame.
///
/// The projection follows the wgpu convention (`Mat4::perspective_rh`, depth
/// in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub position: Vec3,
    /// Unit vector the camera looks along.
    pub front: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    #[must_use]
    pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        let world = view.inverse();
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            position: world.w_axis.truncate(),
            front: (-world.z_axis.truncate()).normalize_or(Vec3::NEG_Z),
            near,
            far,
        }
    }

    /// Perspective camera at `eye` looking at `target`.
    #[must_use]
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let projection = Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far);
        Self::new(view, projection, near, far)
    }

    /// Checks the clip range and matrices a frame depends on. Cascade splits
    /// take `ln(far / near)`, so `near` must be strictly positive.
    pub fn validate(&self) -> Result<()> {
        let range_ok = self.near.is_finite() && self.far.is_finite() && self.near > 0.0 && self.far > self.near;
        if !range_ok || !self.view_projection.is_finite() || !self.inverse_view_projection.is_finite() {
            return Err(RenderError::InvalidCamera {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection, self.front)
    }

    /// Positive distance of `point` along the view axis.
    #[inline]
    #[must_use]
    pub fn view_depth(&self, point: Vec3) -> f32 {
        -self.view.transform_point3(point).z
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.1, 100.0)
    }
}
