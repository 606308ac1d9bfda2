//! Deferred Renderer
//!
//! [`Renderer`] is the explicit context object for the pipeline. It owns the
//! device, the frame targets, the per-frame queues and the statistics; the
//! caller owns the renderer. One frame is one `begin` / `submit*` / `end`
//! bracket:
//!
//! ```text
//! begin ─▶ submit… ─▶ end: geometry ─▶ cascades ─▶ shadow ─▶ lighting ─▶ bloom ─▶ post
//! ```
//!
//! Resizing happens only inside `begin`. Once `end` starts, the frame runs to
//! completion: problems local to one submission are logged and skipped.
//!
//! ```rust,ignore
//! let mut renderer = Renderer::new(device, 1280, 720, RendererSettings::default())?;
//! renderer.begin(1280, 720, &camera)?;
//! renderer.submit_static(&model, &materials, transform, entity_id, selected);
//! renderer.submit_light(&sun, &sun_transform);
//! renderer.end(front_buffer)?;
//! println!("{} draw calls", renderer.stats().draw_calls);
//! ```

pub mod device;
pub mod frame;
pub mod passes;
pub mod settings;
pub mod stats;
pub mod targets;
pub mod uniforms;

use std::sync::Arc;

use glam::Mat4;

pub use device::{RenderDevice, TargetDesc, TargetId, TargetStatus};
pub use frame::{FrameState, RenderQueues, SkinnedSubmission, StaticSubmission};
pub use settings::{
    BloomSettings, LightShaftSettings, MAX_BLOOM_MIPS, MAX_CASCADES, PostProcessSettings, RendererSettings,
    ShadowQuality, ShadowSettings, ToneMappingMode,
};
pub use stats::RendererStatistics;
pub use targets::FrameTargets;

use crate::errors::{RenderError, Result};
use crate::resources::{AnimationPose, MaterialTable, Model};
use crate::scene::{Camera, Environment, Light};
use stats::StageTimer;
use uniforms::CameraUniforms;

pub struct Renderer<D: RenderDevice> {
    device: D,
    settings: RendererSettings,
    targets: FrameTargets,
    frame: FrameState,
    stats: RendererStatistics,
    environment: Option<Environment>,
}

impl<D: RenderDevice> Renderer<D> {
    /// Validates `settings` and allocates every frame target on `device`.
    pub fn new(mut device: D, width: u32, height: u32, settings: RendererSettings) -> Result<Self> {
        settings.validate()?;
        let targets = FrameTargets::new(&mut device, width, height, &settings)?;
        log::info!("Deferred renderer created at {width}x{height}");
        Ok(Self {
            device,
            settings,
            targets,
            frame: FrameState::default(),
            stats: RendererStatistics::default(),
            environment: None,
        })
    }

    /// Releases the frame targets and hands the device back.
    pub fn destroy(self) -> D {
        let Self {
            mut device, targets, ..
        } = self;
        targets.destroy(&mut device);
        device
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Replaces the settings between frames, reallocating cascades if needed.
    /// Bloom mip changes take effect at the next `begin`.
    pub fn set_settings(&mut self, settings: RendererSettings) -> Result<()> {
        if self.frame.is_in_frame() {
            return Err(RenderError::FrameInProgress);
        }
        settings.validate()?;
        self.targets.allocate_cascades(&mut self.device, &settings.shadows)?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_environment(&mut self, environment: Option<Environment>) {
        self.environment = environment;
    }

    #[inline]
    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    // ========================================================================
    // Frame lifecycle
    // ========================================================================

    /// Opens a frame: resizes targets if needed, resets statistics and
    /// queues, and snapshots `camera`.
    pub fn begin(&mut self, width: u32, height: u32, camera: &Camera) -> Result<()> {
        if self.frame.is_in_frame() {
            return Err(RenderError::FrameInProgress);
        }
        camera.validate()?;
        self.targets
            .resize(&mut self.device, width, height, self.settings.bloom.mip_count)?;
        self.stats.reset();
        self.frame.begin(camera);
        Ok(())
    }

    /// Queues a static renderable. Returns whether it passed camera culling.
    pub fn submit_static(
        &mut self,
        model: &Arc<Model>,
        materials: &Arc<MaterialTable>,
        transform: Mat4,
        id: u32,
        selected: bool,
    ) -> bool {
        if !self.frame.is_in_frame() {
            log::warn!("submit_static called outside begin/end; ignored");
            return false;
        }
        self.frame.submit_static(
            StaticSubmission {
                model: Arc::clone(model),
                materials: Arc::clone(materials),
                transform,
                id,
                selected,
            },
            self.settings.frustum_cull,
        )
    }

    /// Queues an animated renderable. Returns whether it passed camera culling.
    pub fn submit_skinned(
        &mut self,
        model: &Arc<Model>,
        pose: AnimationPose,
        materials: &Arc<MaterialTable>,
        transform: Mat4,
        id: u32,
        selected: bool,
    ) -> bool {
        if !self.frame.is_in_frame() {
            log::warn!("submit_skinned called outside begin/end; ignored");
            return false;
        }
        self.frame.submit_skinned(
            SkinnedSubmission {
                model: Arc::clone(model),
                materials: Arc::clone(materials),
                pose,
                transform,
                id,
                selected,
            },
            self.settings.frustum_cull,
        )
    }

    pub fn submit_light(&mut self, light: &Light, transform: &Mat4) {
        if !self.frame.is_in_frame() {
            log::warn!("submit_light called outside begin/end; ignored");
            return;
        }
        self.frame.submit_light(light, transform, &mut self.stats);
    }

    /// Runs every stage and composites into `front_buffer`.
    ///
    /// All queues are empty when this returns, whatever the outcome.
    pub fn end(&mut self, front_buffer: TargetId) -> Result<()> {
        if !self.frame.is_in_frame() {
            return Err(RenderError::FrameNotBegun);
        }
        if self.device.target_extent(front_buffer, 0).is_none() {
            self.frame.end();
            return Err(RenderError::UnknownTarget);
        }

        let camera = CameraUniforms::from(self.frame.camera());

        let timer = StageTimer::start();
        let geometry = passes::geometry::run(
            &mut self.device,
            &self.targets,
            &self.frame,
            &self.settings,
            &mut self.stats,
        );
        self.frame.draw_outline = geometry.draw_outline;
        self.stats.geometry_ms = timer.elapsed_ms();

        let timer = StageTimer::start();
        let cascades = passes::cascades::compute(self.frame.camera(), self.frame.queues(), &self.settings);
        let shadows = passes::shadow::run(
            &mut self.device,
            &self.targets,
            cascades.as_ref(),
            &mut self.frame.queues,
            &self.settings,
            &mut self.stats,
        );
        self.stats.shadow_ms = timer.elapsed_ms();

        let timer = StageTimer::start();
        let lighting = passes::lighting::run(
            &mut self.device,
            &self.targets,
            &camera,
            &geometry,
            shadows.as_ref(),
            self.environment.as_ref(),
            &mut self.frame.queues,
            &self.settings,
        );
        self.stats.lighting_ms = timer.elapsed_ms();

        let timer = StageTimer::start();
        let bloom = passes::bloom::run(&mut self.device, &self.targets.bloom, &lighting, &self.settings.bloom);
        passes::post_process::run(
            &mut self.device,
            front_buffer,
            &camera,
            self.targets.size(),
            &geometry,
            &lighting,
            bloom.as_ref(),
            &self.settings,
        );
        self.stats.post_ms = timer.elapsed_ms();

        self.frame.end();
        self.stats.frame_index += 1;
        log::trace!(
            "Frame {}: {} draws, {} dir / {} point / {} spot lights, {:.2} ms",
            self.stats.frame_index,
            self.stats.draw_calls,
            self.stats.directional_lights,
            self.stats.point_lights,
            self.stats.spot_lights,
            self.stats.total_ms()
        );
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Statistics of the current (or most recent) frame.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &RendererStatistics {
        &self.stats
    }

    #[inline]
    #[must_use]
    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
