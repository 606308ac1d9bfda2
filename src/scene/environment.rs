//! Environment - IBL inputs and the sky model drawn behind the scene.

use glam::Vec3;

use crate::resources::TextureHandle;

/// Image-based lighting inputs plus the sky.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Diffuse irradiance map.
    pub irradiance: TextureHandle,
    /// Roughness-prefiltered specular map.
    pub prefiltered: TextureHandle,
    /// Split-sum BRDF lookup table.
    pub brdf_lut: TextureHandle,
    /// Scales the whole ambient contribution.
    pub intensity: f32,
    pub sky: SkyModel,
}

impl Environment {
    #[must_use]
    pub fn new(irradiance: TextureHandle, prefiltered: TextureHandle, brdf_lut: TextureHandle, sky: SkyModel) -> Self {
        Self {
            irradiance,
            prefiltered,
            brdf_lut,
            intensity: 1.0,
            sky,
        }
    }

    #[must_use]
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity.max(0.0);
        self
    }
}

/// The closed set of sky models, each carrying its own parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyModel {
    /// Static cubemap.
    Skybox { texture: TextureHandle },
    /// Analytic daylight model.
    Preetham(PreethamSky),
    /// Physically based atmosphere with aerial perspective.
    Hillaire(HillaireSky),
}

impl SkyModel {
    #[inline]
    #[must_use]
    pub fn supports_aerial_perspective(&self) -> bool {
        matches!(self, Self::Hillaire(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreethamSky {
    /// Unit vector pointing towards the sun.
    pub sun_direction: Vec3,
    pub turbidity: f32,
    pub ground_albedo: Vec3,
}

impl Default for PreethamSky {
    fn default() -> Self {
        Self {
            sun_direction: Vec3::new(0.0, 0.5, -1.0).normalize(),
            turbidity: 2.0,
            ground_albedo: Vec3::splat(0.3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HillaireSky {
    /// Unit vector pointing towards the sun.
    pub sun_direction: Vec3,
    pub sun_illuminance: Vec3,
    /// Per-kilometre Rayleigh scattering coefficients.
    pub rayleigh_scattering: Vec3,
    pub mie_scattering: f32,
    pub ground_radius_km: f32,
    pub atmosphere_radius_km: f32,
    /// World units per kilometre of atmosphere, for aerial perspective.
    pub units_per_km: f32,
}

impl Default for HillaireSky {
    fn default() -> Self {
        Self {
            sun_direction: Vec3::new(0.0, 0.5, -1.0).normalize(),
            sun_illuminance: Vec3::ONE,
            rayleigh_scattering: Vec3::new(5.802e-3, 13.558e-3, 33.1e-3),
            mie_scattering: 3.996e-3,
            ground_radius_km: 6360.0,
            atmosphere_radius_km: 6460.0,
            units_per_km: 1000.0,
        }
    }
}
