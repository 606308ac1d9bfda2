use glam::{Mat3, Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, in the owning entity's local space.
    pub direction: Vec3,
    /// Drives the cascade system. Only one directional light is honoured per
    /// frame; when several are flagged the last submitted wins.
    pub primary: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            primary: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub radius: f32,
    /// Cone angles in radians.
    pub inner_cone: f32,
    pub outer_cone: f32,
}

// High-level abstraction: light component owned by a scene entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
    pub cast_shadows: bool,
}

impl Light {
    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32, direction: Vec3) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Directional(DirectionalLight {
                direction,
                primary: true,
            }),
            cast_shadows: true,
        }
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Point(PointLight {
                position: Vec3::ZERO,
                radius,
            }),
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn new_spot(color: Vec3, intensity: f32, radius: f32, inner_cone: f32, outer_cone: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Spot(SpotLight {
                position: Vec3::ZERO,
                direction: Vec3::NEG_Y,
                radius,
                inner_cone,
                outer_cone,
            }),
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        if let LightKind::Directional(dir) = &mut self.kind {
            dir.primary = primary;
        }
        self
    }
}

// ============================================================================
// World-space records
// ============================================================================

/// Directional light after submission; `direction` is world space, unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightRecord {
    pub color: Vec3,
    pub intensity: f32,
    pub direction: Vec3,
    pub cast_shadows: bool,
    pub primary: bool,
}

impl DirectionalLightRecord {
    /// True when this light takes the cascaded-shadow path.
    #[inline]
    #[must_use]
    pub fn drives_cascades(&self) -> bool {
        self.cast_shadows && self.primary
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightRecord {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLightRecord {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub direction: Vec3,
    pub radius: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,
}

/// Directions transform with the inverse transpose so non-uniform scale
/// keeps them perpendicular to the surfaces they were authored against.
pub(crate) fn transform_direction(transform: &Mat4, direction: Vec3, fallback: Vec3) -> Vec3 {
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();
    (normal_matrix * direction).normalize_or(fallback)
}

impl DirectionalLight {
    #[must_use]
    pub fn to_world(&self, light: &Light, transform: &Mat4) -> DirectionalLightRecord {
        DirectionalLightRecord {
            color: light.color,
            intensity: light.intensity,
            direction: transform_direction(transform, self.direction, Vec3::NEG_Y),
            cast_shadows: light.cast_shadows,
            primary: self.primary,
        }
    }
}

impl PointLight {
    #[must_use]
    pub fn to_world(&self, light: &Light, transform: &Mat4) -> PointLightRecord {
        PointLightRecord {
            color: light.color,
            intensity: light.intensity,
            position: transform.transform_point3(self.position),
            radius: self.radius,
        }
    }
}

impl SpotLight {
    #[must_use]
    pub fn to_world(&self, light: &Light, transform: &Mat4) -> SpotLightRecord {
        SpotLightRecord {
            color: light.color,
            intensity: light.intensity,
            position: transform.transform_point3(self.position),
            direction: transform_direction(transform, self.direction, Vec3::NEG_Y),
            radius: self.radius,
            inner_cone: self.inner_cone,
            outer_cone: self.outer_cone,
        }
    }
}
