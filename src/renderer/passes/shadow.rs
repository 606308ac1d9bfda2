//! Shadow Pass
//!
//! Renders the shadow-queue casters into each cascade, static then skinned,
//! culled against that cascade's light volume. With
//! [`ShadowQuality::Blurred`] the moments are then filtered by a separable
//! blur that bounces through the shared `shadow_effects` target.
//!
//! The shadow queues are drained here whether or not cascades exist.

use glam::Mat4;

use super::cascades::{Cascade, CascadeSet};
use crate::renderer::device::{
    BlurAxis, FullscreenDraw, FullscreenProgram, ImageRef, MeshDraw, MeshProgram, RenderDevice, ShadowBinding,
    TargetId,
};
use crate::renderer::frame::RenderQueues;
use crate::renderer::settings::{RendererSettings, ShadowQuality};
use crate::renderer::stats::RendererStatistics;
use crate::renderer::targets::FrameTargets;
use crate::renderer::uniforms::{CascadeUniforms, ModelUniforms};
use crate::resources::{Model, Submesh};

/// Cascade maps ready for sampling by the lighting pass.
#[derive(Debug)]
pub struct ShadowMaps<'a> {
    pub cascades: &'a CascadeSet,
    pub uniforms: CascadeUniforms,
    pub maps: &'a [TargetId],
}

impl ShadowMaps<'_> {
    #[must_use]
    pub fn binding(&self) -> ShadowBinding<'_> {
        ShadowBinding {
            cascades: &self.uniforms,
            maps: self.maps,
        }
    }
}

fn draw_casters<D: RenderDevice>(
    device: &mut D,
    target: TargetId,
    cascade: &Cascade,
    model: &Model,
    world_of: impl Fn(&Submesh) -> Mat4,
    bones: Option<&[Mat4]>,
    frustum_cull: bool,
    stats: &mut RendererStatistics,
) {
    for submesh in model.submeshes() {
        let world = world_of(submesh);
        if frustum_cull && !cascade.frustum.intersects_box(&submesh.bounds, Some(&world)) {
            continue;
        }
        device.draw_mesh(&MeshDraw {
            target,
            program: MeshProgram::ShadowCaster,
            mesh: submesh.mesh,
            view_projection: cascade.view_projection,
            model: ModelUniforms::new(world, 0, false),
            bones,
        });
        stats.shadow_draw_calls += 1;
    }
}

fn blur<D: RenderDevice>(device: &mut D, cascade_target: TargetId, scratch: TargetId) {
    device.draw_fullscreen(&FullscreenDraw {
        target: scratch,
        blend: None,
        depth_compare: None,
        program: FullscreenProgram::ShadowBlur {
            source: ImageRef::color(cascade_target, 0),
            axis: BlurAxis::Horizontal,
        },
    });
    device.draw_fullscreen(&FullscreenDraw {
        target: cascade_target,
        blend: None,
        depth_compare: None,
        program: FullscreenProgram::ShadowBlur {
            source: ImageRef::color(scratch, 0),
            axis: BlurAxis::Vertical,
        },
    });
}

pub fn run<'a, D: RenderDevice>(
    device: &mut D,
    targets: &'a FrameTargets,
    cascades: Option<&'a CascadeSet>,
    queues: &mut RenderQueues,
    settings: &RendererSettings,
    stats: &mut RendererStatistics,
) -> Option<ShadowMaps<'a>> {
    let Some(set) = cascades else {
        queues.static_shadow.clear();
        queues.skinned_shadow.clear();
        return None;
    };

    let frustum_cull = settings.frustum_cull;
    for (cascade, &target) in set.cascades().iter().zip(targets.cascades.iter()) {
        // Moments of the far plane: depth 1, depth^2 1.
        device.clear(target, [1.0, 1.0, 0.0, 0.0], Some(1.0));

        for s in queues.static_shadow() {
            draw_casters(
                device,
                target,
                cascade,
                &s.model,
                |sub| s.transform * sub.transform,
                None,
                frustum_cull,
                stats,
            );
        }
        for s in queues.skinned_shadow() {
            draw_casters(
                device,
                target,
                cascade,
                &s.model,
                |sub| s.transform * s.pose.submesh_transform(sub),
                s.pose.bones(),
                frustum_cull,
                stats,
            );
        }

        if settings.shadows.quality == ShadowQuality::Blurred {
            blur(device, target, targets.shadow_effects);
        }
    }

    queues.static_shadow.clear();
    queues.skinned_shadow.clear();

    let count = set.cascades().len().min(targets.cascades.len());
    Some(ShadowMaps {
        cascades: set,
        uniforms: set.uniforms(settings),
        maps: &targets.cascades[..count],
    })
}
