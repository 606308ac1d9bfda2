//! Frame State & Render Queues
//!
//! [`FrameState`] holds everything that lives for exactly one
//! `begin`/`end` bracket: the camera snapshot, its frustum and the typed
//! submission queues. Queues are plain `Vec`s reused across frames; `clear()`
//! keeps their capacity so steady-state frames do not allocate.
//!
//! Camera culling happens as work is submitted. Every renderable is also
//! queued for shadows regardless of visibility, since an object outside the
//! view can still cast a shadow into it.

use std::sync::Arc;

use glam::Mat4;

use super::stats::RendererStatistics;
use crate::resources::{AnimationPose, MaterialTable, Model};
use crate::scene::{
    Camera, DirectionalLightRecord, Frustum, Light, LightKind, PointLightRecord, SpotLightRecord, intersects,
};

const INITIAL_QUEUE_CAPACITY: usize = 64;

// ============================================================================
// Submissions
// ============================================================================

#[derive(Debug, Clone)]
pub struct StaticSubmission {
    pub model: Arc<Model>,
    pub materials: Arc<MaterialTable>,
    pub transform: Mat4,
    /// Entity id stamped into the editor attachment as `id + 1`.
    pub id: u32,
    /// Request a selection outline around this renderable.
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct SkinnedSubmission {
    pub model: Arc<Model>,
    pub materials: Arc<MaterialTable>,
    pub pose: AnimationPose,
    pub transform: Mat4,
    pub id: u32,
    pub selected: bool,
}

// ============================================================================
// RenderQueues
// ============================================================================

#[derive(Debug, Default)]
pub struct RenderQueues {
    pub(crate) statics: Vec<StaticSubmission>,
    pub(crate) skinned: Vec<SkinnedSubmission>,
    pub(crate) static_shadow: Vec<StaticSubmission>,
    pub(crate) skinned_shadow: Vec<SkinnedSubmission>,
    pub(crate) directional: Vec<DirectionalLightRecord>,
    pub(crate) point: Vec<PointLightRecord>,
    pub(crate) spot: Vec<SpotLightRecord>,
}

impl RenderQueues {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            statics: Vec::with_capacity(capacity),
            skinned: Vec::with_capacity(capacity),
            static_shadow: Vec::with_capacity(capacity),
            skinned_shadow: Vec::with_capacity(capacity),
            directional: Vec::with_capacity(4),
            point: Vec::with_capacity(capacity),
            spot: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.statics.clear();
        self.skinned.clear();
        self.static_shadow.clear();
        self.skinned_shadow.clear();
        self.directional.clear();
        self.point.clear();
        self.spot.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statics.is_empty()
            && self.skinned.is_empty()
            && self.static_shadow.is_empty()
            && self.skinned_shadow.is_empty()
            && self.directional.is_empty()
            && self.point.is_empty()
            && self.spot.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn statics(&self) -> &[StaticSubmission] {
        &self.statics
    }

    #[inline]
    #[must_use]
    pub fn skinned(&self) -> &[SkinnedSubmission] {
        &self.skinned
    }

    #[inline]
    #[must_use]
    pub fn static_shadow(&self) -> &[StaticSubmission] {
        &self.static_shadow
    }

    #[inline]
    #[must_use]
    pub fn skinned_shadow(&self) -> &[SkinnedSubmission] {
        &self.skinned_shadow
    }

    #[inline]
    #[must_use]
    pub fn directional(&self) -> &[DirectionalLightRecord] {
        &self.directional
    }

    #[inline]
    #[must_use]
    pub fn point(&self) -> &[PointLightRecord] {
        &self.point
    }

    #[inline]
    #[must_use]
    pub fn spot(&self) -> &[SpotLightRecord] {
        &self.spot
    }
}

// ============================================================================
// FrameState
// ============================================================================

#[derive(Debug)]
pub struct FrameState {
    pub(crate) camera: Camera,
    pub(crate) frustum: Frustum,
    pub(crate) queues: RenderQueues,
    pub(crate) draw_outline: bool,
    pub(crate) in_frame: bool,
}

impl Default for FrameState {
    fn default() -> Self {
        let camera = Camera::default();
        Self {
            frustum: camera.frustum(),
            camera,
            queues: RenderQueues::with_capacity(INITIAL_QUEUE_CAPACITY),
            draw_outline: false,
            in_frame: false,
        }
    }
}

impl FrameState {
    /// Snapshots the camera and resets every per-frame container.
    pub fn begin(&mut self, camera: &Camera) {
        self.camera = *camera;
        self.frustum = camera.frustum();
        self.draw_outline = false;
        self.queues.clear();
        self.in_frame = true;
    }

    /// Drains whatever the passes left behind.
    pub fn end(&mut self) {
        self.queues.clear();
        self.in_frame = false;
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[inline]
    #[must_use]
    pub fn queues(&self) -> &RenderQueues {
        &self.queues
    }

    #[inline]
    #[must_use]
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Whether a renderable at `transform` survives camera culling.
    ///
    /// Models without bounds are let through; the geometry pass skips them.
    fn is_visible(&self, model: &Model, transform: &Mat4, frustum_cull: bool) -> bool {
        let bounds = model.bounds();
        if !frustum_cull || bounds.is_empty() {
            return true;
        }
        intersects(&self.frustum, bounds.min(), bounds.max(), Some(transform))
    }

    /// Queues a static renderable. Returns whether it passed camera culling.
    pub fn submit_static(&mut self, submission: StaticSubmission, frustum_cull: bool) -> bool {
        let visible = self.is_visible(&submission.model, &submission.transform, frustum_cull);
        if visible {
            self.queues.statics.push(submission.clone());
        }
        self.queues.static_shadow.push(submission);
        visible
    }

    /// Queues an animated renderable. Returns whether it passed camera culling.
    pub fn submit_skinned(&mut self, submission: SkinnedSubmission, frustum_cull: bool) -> bool {
        let visible = self.is_visible(&submission.model, &submission.transform, frustum_cull);
        if visible {
            self.queues.skinned.push(submission.clone());
        }
        self.queues.skinned_shadow.push(submission);
        visible
    }

    /// Transforms `light` into world space and queues it by kind.
    pub fn submit_light(&mut self, light: &Light, transform: &Mat4, stats: &mut RendererStatistics) {
        match &light.kind {
            LightKind::Directional(dir) => {
                self.queues.directional.push(dir.to_world(light, transform));
                stats.directional_lights += 1;
            }
            LightKind::Point(point) => {
                self.queues.point.push(point.to_world(light, transform));
                stats.point_lights += 1;
            }
            LightKind::Spot(spot) => {
                self.queues.spot.push(spot.to_world(light, transform));
                stats.spot_lights += 1;
            }
        }
    }
}
