//! Geometry Pass
//!
//! Rasterizes every camera-visible submission into the G-buffer. Culling is
//! refined per submesh here: a large model that survived the whole-object
//! test at submission may still have most of its parts off screen.

use glam::Mat4;

use crate::renderer::device::{MeshDraw, MeshProgram, RenderDevice, TargetId};
use crate::renderer::frame::FrameState;
use crate::renderer::settings::RendererSettings;
use crate::renderer::stats::RendererStatistics;
use crate::renderer::targets::FrameTargets;
use crate::renderer::uniforms::ModelUniforms;
use crate::resources::{MaterialTable, Model, Submesh};
use crate::scene::Frustum;

/// What later stages need from the geometry pass.
#[derive(Debug, Clone, Copy)]
pub struct GeometryOutput {
    pub gbuffer: TargetId,
    /// Any drawn submesh asked for a selection outline.
    pub draw_outline: bool,
}

struct DrawContext<'a, D: RenderDevice> {
    device: &'a mut D,
    target: TargetId,
    frustum: &'a Frustum,
    view_projection: Mat4,
    frustum_cull: bool,
    stats: &'a mut RendererStatistics,
    draw_outline: bool,
}

impl<D: RenderDevice> DrawContext<'_, D> {
    fn draw_model(
        &mut self,
        model: &Model,
        materials: &MaterialTable,
        world_of: impl Fn(&Submesh) -> Mat4,
        bones: Option<&[Mat4]>,
        id: u32,
        selected: bool,
    ) {
        for submesh in model.submeshes() {
            let world = world_of(submesh);
            if self.frustum_cull && !self.frustum.intersects_box(&submesh.bounds, Some(&world)) {
                continue;
            }
            let Some(material) = materials.get(&submesh.name) else {
                log::debug!("Submesh '{}' has no material; skipped", submesh.name);
                continue;
            };

            self.device.draw_mesh(&MeshDraw {
                target: self.target,
                program: MeshProgram::GBuffer { material },
                mesh: submesh.mesh,
                view_projection: self.view_projection,
                model: ModelUniforms::new(world, id, selected),
                bones,
            });

            self.stats.draw_calls += 1;
            self.stats.vertices += u64::from(submesh.vertex_count);
            self.stats.triangles += u64::from(submesh.index_count / 3);
            self.draw_outline |= selected;
        }
    }
}

pub fn run<D: RenderDevice>(
    device: &mut D,
    targets: &FrameTargets,
    frame: &FrameState,
    settings: &RendererSettings,
    stats: &mut RendererStatistics,
) -> GeometryOutput {
    device.clear(targets.gbuffer, [0.0; 4], Some(1.0));

    let mut ctx = DrawContext {
        device,
        target: targets.gbuffer,
        frustum: frame.frustum(),
        view_projection: frame.camera().view_projection,
        frustum_cull: settings.frustum_cull,
        stats,
        draw_outline: false,
    };

    let queues = frame.queues();
    for s in queues.statics() {
        ctx.draw_model(
            &s.model,
            &s.materials,
            |sub| s.transform * sub.transform,
            None,
            s.id,
            s.selected,
        );
    }

    for s in queues.skinned() {
        ctx.draw_model(
            &s.model,
            &s.materials,
            |sub| s.transform * s.pose.submesh_transform(sub),
            s.pose.bones(),
            s.id,
            s.selected,
        );
    }

    GeometryOutput {
        gbuffer: targets.gbuffer,
        draw_outline: ctx.draw_outline,
    }
}
