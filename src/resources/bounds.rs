use glam::{Mat4, Vec3};

/// Axis-aligned bounding box stored as center + half extents.
///
/// Used for culling against a [`Frustum`](crate::scene::Frustum) and for
/// accumulating scene extents during cascade fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBox {
    pub center: Vec3,
    pub extents: Vec3,
}

impl AxisAlignedBox {
    /// An inverted box that any `union` replaces.
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        extents: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(center: Vec3, extents: Vec3) -> Self {
        Self {
            center,
            extents: extents.abs(),
        }
    }

    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    /// Smallest box containing every point, or [`Self::EMPTY`] for no points.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for p in points {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if any {
            Self::from_min_max(min, max)
        } else {
            Self::EMPTY
        }
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extents.min_element() < 0.0
    }

    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min(), self.max());
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    /// World-space box enclosing this box after `matrix` is applied.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(self.corners().map(|c| matrix.transform_point3(c)))
    }
}

impl Default for AxisAlignedBox {
    fn default() -> Self {
        Self::EMPTY
    }
}
