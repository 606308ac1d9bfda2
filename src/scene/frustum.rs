//! Frustum & Culling
//!
//! A [`Frustum`] is a closed convex hexahedron described by its 8 corners and
//! 6 inward-facing planes. The same construction is used for camera volumes,
//! shadow-cascade volumes and (transformed) bounding boxes, so the culling
//! test in [`intersects`] can compare any two of them corner against plane.
//!
//! # Corner Order
//!
//! Corners follow NDC order: indices `0..4` lie on the near face at
//! `(+x,+y) (-x,+y) (+x,-y) (-x,-y)`, indices `4..8` repeat the pattern on
//! the far face. wgpu clip space is used throughout: near at `z = 0`, far at
//! `z = 1`.

use glam::{Mat4, Vec3};

use crate::resources::AxisAlignedBox;

/// Thickness given to flat boxes so their side planes stay well defined.
const MIN_BOX_EXTENT: f32 = 1e-4;

const NDC_XY: [(f32, f32); 4] = [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)];

// ============================================================================
// Plane
// ============================================================================

/// An oriented plane: `dot(normal, p) - d` is the signed distance of `p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
    /// Any point on the plane.
    pub point: Vec3,
}

impl Plane {
    #[must_use]
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            d: normal.dot(point),
            point,
        }
    }

    #[inline]
    #[must_use]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }

    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
            point: self.point,
        }
    }
}

// ============================================================================
// Frustum
// ============================================================================

/// Indices into [`Frustum::planes`].
pub mod plane_index {
    pub const NEAR: usize = 0;
    pub const FAR: usize = 1;
    pub const LEFT: usize = 2;
    pub const RIGHT: usize = 3;
    pub const BOTTOM: usize = 4;
    pub const TOP: usize = 5;
}

/// Immutable view volume; rebuilt every frame for the camera and once per
/// shadow cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    corners: [Vec3; 8],
    planes: [Plane; 6],
    min: Vec3,
    max: Vec3,
    center: Vec3,
    radius: f32,
}

impl Frustum {
    /// Builds the world-space frustum of `view_projection`.
    ///
    /// `view_direction` is the direction the volume looks along; it orients
    /// the near and far planes.
    #[must_use]
    pub fn from_view_projection(view_projection: &Mat4, view_direction: Vec3) -> Self {
        let inverse = view_projection.inverse();
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let (x, y) = NDC_XY[i % 4];
            let z = if i < 4 { 0.0 } else { 1.0 };
            *corner = inverse.project_point3(Vec3::new(x, y, z));
        }
        Self::from_corners(corners, Some(view_direction))
    }

    /// Builds the hexahedron of a (possibly transformed) axis-aligned box.
    #[must_use]
    pub fn from_box(min: Vec3, max: Vec3, transform: Option<&Mat4>) -> Self {
        let center = (min + max) * 0.5;
        let half = ((max - min) * 0.5).max(Vec3::splat(MIN_BOX_EXTENT));
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let (x, y) = NDC_XY[i % 4];
            let z = if i < 4 { -1.0 } else { 1.0 };
            let local = center + half * Vec3::new(x, y, z);
            *corner = transform.map_or(local, |m| m.transform_point3(local));
        }
        Self::from_corners(corners, None)
    }

    /// Shared builder for camera, cascade and box volumes.
    ///
    /// Every plane is flipped, if needed, so the corner centroid lies on its
    /// positive side.
    #[must_use]
    pub fn from_corners(corners: [Vec3; 8], view_direction: Option<Vec3>) -> Self {
        let c = &corners;
        let (near_normal, far_normal) = match view_direction {
            Some(dir) => (dir, -dir),
            None => {
                let n = (c[1] - c[0]).cross(c[2] - c[0]);
                (n, -n)
            }
        };

        let raw = [
            Plane::from_point_normal(c[0], near_normal),
            Plane::from_point_normal(c[4], far_normal),
            Plane::from_point_normal(c[1], (c[3] - c[1]).cross(c[5] - c[1])),
            Plane::from_point_normal(c[0], (c[4] - c[0]).cross(c[2] - c[0])),
            Plane::from_point_normal(c[2], (c[6] - c[2]).cross(c[3] - c[2])),
            Plane::from_point_normal(c[0], (c[1] - c[0]).cross(c[4] - c[0])),
        ];

        let bounds = AxisAlignedBox::from_points(corners);
        let center = corners.iter().copied().sum::<Vec3>() / 8.0;
        let planes = raw.map(|p| {
            if p.signed_distance(center) < 0.0 {
                p.flipped()
            } else {
                p
            }
        });
        let radius = corners
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);

        Self {
            corners,
            planes,
            min: bounds.min(),
            max: bounds.max(),
            center,
            radius,
        }
    }

    #[inline]
    #[must_use]
    pub fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.min
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.max
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Radius of the sphere around [`Self::center`] enclosing every corner.
    #[inline]
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.radius
    }

    /// True when `p` is on the inner side of all six planes.
    #[must_use]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    #[must_use]
    pub fn intersects_box(&self, bounds: &AxisAlignedBox, transform: Option<&Mat4>) -> bool {
        !bounds.is_empty() && intersects(self, bounds.min(), bounds.max(), transform)
    }
}

/// Corner-based frustum / box overlap test.
///
/// Returns true when any box corner lies inside the frustum, or any frustum
/// corner lies inside the box. This is a conservative heuristic rather than
/// an exact separating-axis test: a large box that straddles the frustum
/// without either volume containing a corner of the other is rejected.
#[must_use]
pub fn intersects(frustum: &Frustum, min: Vec3, max: Vec3, transform: Option<&Mat4>) -> bool {
    let hull = Frustum::from_box(min, max, transform);

    if hull.corners.iter().any(|&c| frustum.contains_point(c)) {
        return true;
    }

    frustum.corners.iter().any(|&c| hull.contains_point(c))
}
