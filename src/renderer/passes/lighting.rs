//! Lighting Pass
//!
//! Accumulates lighting into the HDR buffer in three subpasses:
//!
//! 1. ambient / IBL, blending disabled (it initializes the buffer);
//! 2. one additive draw per directional light, the primary shadow caster
//!    sampling the cascades (and light shafts when enabled);
//! 3. one additive draw per point light.
//!
//! Then aerial perspective (Hillaire sky only) and finally the sky itself,
//! depth tested with `LessEqual` against the G-buffer depth so it only shows
//! where no geometry was drawn. Every light queue is drained on the way out;
//! spot lights are counted at submission but have no subpass of their own.

use glam::{UVec4, Vec3, Vec4};

use super::geometry::GeometryOutput;
use super::shadow::ShadowMaps;
use crate::renderer::device::{
    ADDITIVE_BLEND, ComputeDispatch, ComputeProgram, FullscreenDraw, FullscreenProgram, ImageRef, MemoryBarrier,
    RenderDevice, TargetId,
};
use crate::renderer::frame::RenderQueues;
use crate::renderer::settings::{LightShaftSettings, RendererSettings};
use crate::renderer::targets::{FrameTargets, light_shaft};
use crate::renderer::uniforms::{
    AmbientUniforms, CameraUniforms, DirectionalUniforms, LightShaftUniforms, PointUniforms,
};
use crate::scene::{DirectionalLightRecord, Environment, SkyModel};

/// Work-group edge for the light-shaft kernels.
pub const LIGHT_SHAFT_GROUP_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct LightingOutput {
    /// HDR colour, mip 0 of the lighting target.
    pub hdr: ImageRef,
    pub target: TargetId,
    /// Light shafts were composited this frame.
    pub light_shafts: bool,
}

fn light_shaft_uniforms(settings: &LightShaftSettings) -> LightShaftUniforms {
    LightShaftUniforms {
        mie_scattering_intensity: Vec3::from_array(settings.mie_scattering).extend(settings.intensity),
        mie_absorption_density: Vec3::from_array(settings.mie_absorption).extend(settings.density),
        params: UVec4::new(settings.sample_count, 0, 0, 0),
    }
}

fn directional_uniforms(light: &DirectionalLightRecord) -> DirectionalUniforms {
    DirectionalUniforms {
        color_intensity: light.color.extend(light.intensity),
        direction: light.direction.extend(0.0),
    }
}

/// Ray-marches scattering at half resolution, then filters it edge-aware.
fn dispatch_light_shafts<D: RenderDevice>(
    device: &mut D,
    targets: &FrameTargets,
    geometry: &GeometryOutput,
    camera: &CameraUniforms,
    light: DirectionalUniforms,
    shadows: &ShadowMaps<'_>,
    settings: &LightShaftSettings,
) -> ImageRef {
    let (width, height) = targets.size();
    let (half_w, half_h) = (width.div_ceil(2), height.div_ceil(2));
    let depth = ImageRef::depth(geometry.gbuffer);
    let raw = ImageRef::color(targets.light_shafts, light_shaft::SCATTERING);
    let filtered = ImageRef::color(targets.light_shafts, light_shaft::FILTERED);

    device.dispatch(&ComputeDispatch::covering(
        ComputeProgram::LightShafts {
            depth,
            dest: raw,
            camera,
            light,
            shadows: shadows.binding(),
            uniforms: light_shaft_uniforms(settings),
        },
        half_w,
        half_h,
        LIGHT_SHAFT_GROUP_SIZE,
    ));
    device.memory_barrier(MemoryBarrier::SHADER_IMAGE_ACCESS);

    device.dispatch(&ComputeDispatch::covering(
        ComputeProgram::BilateralBlur {
            source: raw,
            depth,
            dest: filtered,
        },
        half_w,
        half_h,
        LIGHT_SHAFT_GROUP_SIZE,
    ));
    device.memory_barrier(MemoryBarrier::SHADER_IMAGE_ACCESS | MemoryBarrier::TEXTURE_FETCH);
    filtered
}

pub fn run<D: RenderDevice>(
    device: &mut D,
    targets: &FrameTargets,
    camera: &CameraUniforms,
    geometry: &GeometryOutput,
    shadows: Option<&ShadowMaps<'_>>,
    environment: Option<&Environment>,
    queues: &mut RenderQueues,
    settings: &RendererSettings,
) -> LightingOutput {
    let target = targets.lighting;
    let gbuffer = geometry.gbuffer;
    let (width, height) = targets.size();
    device.clear(target, [0.0; 4], Some(1.0));

    // Ambient / IBL
    if let Some(env) = environment {
        device.draw_fullscreen(&FullscreenDraw {
            target,
            blend: None,
            depth_compare: None,
            program: FullscreenProgram::Ambient {
                gbuffer,
                camera,
                irradiance: env.irradiance,
                prefiltered: env.prefiltered,
                brdf_lut: env.brdf_lut,
                uniforms: AmbientUniforms {
                    size_intensity: Vec4::new(width as f32, height as f32, env.intensity, 0.0),
                },
            },
        });
    } else {
        log::trace!("No environment bound; ambient subpass skipped");
    }

    // Directional lights
    let mut light_shafts = false;
    for light in queues.directional() {
        let uniforms = directional_uniforms(light);
        let shadowed = shadows.filter(|_| light.drives_cascades());

        let shafts = match shadowed {
            Some(maps) if settings.light_shafts.enabled => {
                light_shafts = true;
                Some(dispatch_light_shafts(
                    device,
                    targets,
                    geometry,
                    camera,
                    uniforms,
                    maps,
                    &settings.light_shafts,
                ))
            }
            _ => None,
        };

        device.draw_fullscreen(&FullscreenDraw {
            target,
            blend: Some(ADDITIVE_BLEND),
            depth_compare: None,
            program: FullscreenProgram::Directional {
                gbuffer,
                camera,
                light: uniforms,
                shadows: shadowed.map(ShadowMaps::binding),
                light_shafts: shafts,
            },
        });
    }

    // Point lights
    for light in queues.point() {
        device.draw_fullscreen(&FullscreenDraw {
            target,
            blend: Some(ADDITIVE_BLEND),
            depth_compare: None,
            program: FullscreenProgram::Point {
                gbuffer,
                camera,
                light: PointUniforms {
                    color_intensity: light.color.extend(light.intensity),
                    position_radius: light.position.extend(light.radius),
                },
            },
        });
    }

    queues.directional.clear();
    queues.point.clear();
    queues.spot.clear();

    if let Some(env) = environment {
        if let SkyModel::Hillaire(sky) = &env.sky
            && settings.aerial_perspective
        {
            device.draw_fullscreen(&FullscreenDraw {
                target,
                blend: Some(ADDITIVE_BLEND),
                depth_compare: None,
                program: FullscreenProgram::AerialPerspective {
                    depth: ImageRef::depth(gbuffer),
                    camera,
                    sky,
                },
            });
        }

        device.blit_depth(gbuffer, target);
        device.draw_fullscreen(&FullscreenDraw {
            target,
            blend: None,
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            program: FullscreenProgram::Sky { camera, sky: &env.sky },
        });
    }

    LightingOutput {
        hdr: ImageRef::color(target, 0),
        target,
        light_shafts,
    }
}
