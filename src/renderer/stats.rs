use std::time::Instant;

use serde::Serialize;

/// Per-frame counters. Reset at `begin`, finalized at `end`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RendererStatistics {
    /// Geometry-pass draws (one per visible submesh).
    pub draw_calls: u32,
    pub vertices: u64,
    pub triangles: u64,
    /// Caster draws summed over all cascades.
    pub shadow_draw_calls: u32,

    pub directional_lights: u32,
    pub point_lights: u32,
    pub spot_lights: u32,

    pub geometry_ms: f32,
    pub shadow_ms: f32,
    pub lighting_ms: f32,
    pub post_ms: f32,

    /// Number of completed frames since the renderer was created.
    pub frame_index: u64,
}

impl RendererStatistics {
    /// Clears everything except the running frame index.
    pub fn reset(&mut self) {
        *self = Self {
            frame_index: self.frame_index,
            ..Self::default()
        };
    }

    #[must_use]
    pub fn total_ms(&self) -> f32 {
        self.geometry_ms + self.shadow_ms + self.lighting_ms + self.post_ms
    }
}

/// Wall-clock stage timer.
pub(crate) struct StageTimer(Instant);

impl StageTimer {
    pub(crate) fn start() -> Self {
        Self(Instant::now())
    }

    pub(crate) fn elapsed_ms(&self) -> f32 {
        self.0.elapsed().as_secs_f32() * 1000.0
    }
}
