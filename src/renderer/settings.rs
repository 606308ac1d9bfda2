//! Renderer Settings
//!
//! [`RendererSettings`] is the whole configuration surface of the pipeline.
//! It is plain data with serde support so editors can persist it next to a
//! scene, and every instance is validated before the renderer accepts it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prism::renderer::{RendererSettings, ShadowQuality};
//!
//! let mut settings = RendererSettings::default();
//! settings.shadows.quality = ShadowQuality::Blurred;
//! settings.bloom.set_threshold(1.5);
//!
//! let from_disk = RendererSettings::from_json(r#"{ "frustum_cull": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{RenderError, Result};

/// Upper bound on shadow cascades; cascade arrays are sized by it.
pub const MAX_CASCADES: usize = 4;

/// Upper bound on bloom mip levels.
pub const MAX_BLOOM_MIPS: u32 = 7;

// ---------------------------------------------------------------------------
// Shadows
// ---------------------------------------------------------------------------

/// Shadow filtering quality.
///
/// | Quality   | Cascade colour          | Lighting lookup          |
/// |-----------|-------------------------|--------------------------|
/// | `Hard`    | written, not filtered   | depth compare            |
/// | `Blurred` | 2-pass separable blur   | variance (Chebyshev)     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowQuality {
    #[default]
    Hard,
    Blurred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub quality: ShadowQuality,
    /// Number of cascades, `1..=MAX_CASCADES`.
    pub cascade_count: u32,
    /// Square resolution of every cascade target.
    pub resolution: u32,
    /// Blend between uniform (`0.0`) and logarithmic (`1.0`) splits.
    pub lambda: f32,
    /// Light-space depth bias applied by hard shadow lookups.
    pub depth_bias: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            quality: ShadowQuality::Hard,
            cascade_count: MAX_CASCADES as u32,
            resolution: 2048,
            lambda: 0.75,
            depth_bias: 0.002,
        }
    }
}

// ---------------------------------------------------------------------------
// Bloom
// ---------------------------------------------------------------------------

/// Bloom configuration.
///
/// The prefilter uses a quadratic soft knee around `threshold`; `radius`
/// widens the upsample tent filter and `intensity` scales the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    pub threshold: f32,
    pub knee: f32,
    pub radius: f32,
    pub intensity: f32,
    /// Requested mip count; the frame may use fewer for small targets.
    pub mip_count: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            knee: 1.0,
            radius: 1.0,
            intensity: 1.0,
            mip_count: MAX_BLOOM_MIPS,
        }
    }
}

impl BloomSettings {
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    /// The knee must stay positive; the prefilter divides by it.
    pub fn set_knee(&mut self, knee: f32) {
        self.knee = knee.max(1e-4);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(1e-4);
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
    }

    pub fn set_mip_count(&mut self, mips: u32) {
        self.mip_count = mips.clamp(1, MAX_BLOOM_MIPS);
    }

    /// Prefilter curve `(threshold, threshold - knee, 2 * knee, 0.25 / knee)`.
    #[inline]
    #[must_use]
    pub fn curve(&self) -> [f32; 4] {
        [
            self.threshold,
            self.threshold - self.knee,
            2.0 * self.knee,
            0.25 / self.knee,
        ]
    }
}

// ---------------------------------------------------------------------------
// Light shafts
// ---------------------------------------------------------------------------

/// Screen-space light shafts for the primary directional light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightShaftSettings {
    pub enabled: bool,
    /// Mie scattering coefficients (per 100 world units).
    pub mie_scattering: [f32; 3],
    pub intensity: f32,
    /// Mie absorption coefficients (per 100 world units).
    pub mie_absorption: [f32; 3],
    pub density: f32,
    /// Ray-march steps per half-resolution pixel.
    pub sample_count: u32,
}

impl Default for LightShaftSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mie_scattering: [4.0, 4.0, 4.0],
            intensity: 1.0,
            mie_absorption: [4.4, 4.4, 4.4],
            density: 0.1,
            sample_count: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Post processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneMappingMode {
    /// Clamp only.
    Linear,
    Reinhard,
    /// ACES filmic fit (Narkowicz).
    #[default]
    AcesFilmic,
}

impl ToneMappingMode {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::Reinhard => 1,
            Self::AcesFilmic => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    pub fxaa: bool,
    pub gamma: f32,
    pub tone_mapping: ToneMappingMode,
    /// Overlay the editor reference grid.
    pub draw_grid: bool,
    pub outline_color: [f32; 3],
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            fxaa: true,
            gamma: 2.2,
            tone_mapping: ToneMappingMode::default(),
            draw_grid: false,
            outline_color: [1.0, 0.5, 0.0],
        }
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// When false every submission is accepted, visible or not.
    pub frustum_cull: bool,
    pub shadows: ShadowSettings,
    pub bloom: BloomSettings,
    pub light_shafts: LightShaftSettings,
    pub post: PostProcessSettings,
    /// Apply aerial perspective when the sky model supports it.
    pub aerial_perspective: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frustum_cull: true,
            shadows: ShadowSettings::default(),
            bloom: BloomSettings::default(),
            light_shafts: LightShaftSettings::default(),
            post: PostProcessSettings::default(),
            aerial_perspective: true,
        }
    }
}

/// Finite and above zero; rejects `NaN`.
fn is_positive(x: f32) -> bool {
    x.is_finite() && x > 0.0
}

fn is_non_negative(x: f32) -> bool {
    x.is_finite() && x >= 0.0
}

impl RendererSettings {
    /// Parses and validates settings from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RenderError::InvalidSettings(msg));

        let shadows = &self.shadows;
        if shadows.cascade_count == 0 || shadows.cascade_count as usize > MAX_CASCADES {
            return invalid(format!(
                "cascade_count must be in 1..={MAX_CASCADES}, got {}",
                shadows.cascade_count
            ));
        }
        if shadows.resolution == 0 {
            return invalid("shadow resolution must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&shadows.lambda) {
            return invalid(format!("cascade lambda must be in [0, 1], got {}", shadows.lambda));
        }

        let bloom = &self.bloom;
        if bloom.mip_count == 0 || bloom.mip_count > MAX_BLOOM_MIPS {
            return invalid(format!(
                "bloom mip_count must be in 1..={MAX_BLOOM_MIPS}, got {}",
                bloom.mip_count
            ));
        }
        if !is_positive(bloom.knee) || !is_positive(bloom.radius) {
            return invalid(format!(
                "bloom knee and radius must be positive, got {} and {}",
                bloom.knee, bloom.radius
            ));
        }
        if !is_non_negative(bloom.threshold) || !is_non_negative(bloom.intensity) {
            return invalid(format!(
                "bloom threshold and intensity must be non-negative, got {} and {}",
                bloom.threshold, bloom.intensity
            ));
        }

        if !is_positive(self.post.gamma) {
            return invalid(format!("gamma must be positive, got {}", self.post.gamma));
        }
        if self.light_shafts.enabled && self.light_shafts.sample_count == 0 {
            return invalid("light shafts need at least one sample".into());
        }
        Ok(())
    }

    /// Cascade count as a `usize`, clamped into `1..=MAX_CASCADES`.
    #[inline]
    #[must_use]
    pub fn cascade_count(&self) -> usize {
        (self.shadows.cascade_count as usize).clamp(1, MAX_CASCADES)
    }
}
