//! Post-Process Compositor
//!
//! One fullscreen draw resolves the HDR lighting buffer (plus bloom) into the
//! caller's front buffer with tone mapping, gamma and optional FXAA. Two
//! additive overlays may follow: the editor grid and the selection outline.

use glam::{UVec4, Vec3, Vec4};

use super::bloom::BloomOutput;
use super::geometry::GeometryOutput;
use super::lighting::LightingOutput;
use crate::renderer::device::{ADDITIVE_BLEND, FullscreenDraw, FullscreenProgram, ImageRef, RenderDevice, TargetId};
use crate::renderer::settings::RendererSettings;
use crate::renderer::targets::gbuffer;
use crate::renderer::uniforms::{CameraUniforms, OutlineUniforms, PostProcessUniforms, post_flags};

#[must_use]
pub fn composite_uniforms(
    camera: &CameraUniforms,
    size: (u32, u32),
    lighting: &LightingOutput,
    bloom: Option<&BloomOutput>,
    settings: &RendererSettings,
) -> PostProcessUniforms {
    let mut flags = 0;
    if bloom.is_some() {
        flags |= post_flags::BLOOM;
    }
    if settings.post.fxaa {
        flags |= post_flags::FXAA;
    }
    if lighting.light_shafts {
        flags |= post_flags::LIGHT_SHAFTS;
    }

    PostProcessUniforms {
        data0: camera.position_near.truncate().extend(size.0 as f32),
        data1: Vec4::new(
            size.1 as f32,
            settings.post.gamma,
            bloom.map_or(0.0, |b| b.intensity),
            0.0,
        ),
        flags: UVec4::new(settings.post.tone_mapping.as_u32(), flags, 0, 0),
    }
}

pub fn run<D: RenderDevice>(
    device: &mut D,
    front_buffer: TargetId,
    camera: &CameraUniforms,
    size: (u32, u32),
    geometry: &GeometryOutput,
    lighting: &LightingOutput,
    bloom: Option<&BloomOutput>,
    settings: &RendererSettings,
) {
    let editor = ImageRef::color(geometry.gbuffer, gbuffer::EDITOR);

    device.draw_fullscreen(&FullscreenDraw {
        target: front_buffer,
        blend: None,
        depth_compare: None,
        program: FullscreenProgram::Composite {
            lighting: lighting.hdr,
            editor,
            bloom: bloom.map(|b| b.image),
            uniforms: composite_uniforms(camera, size, lighting, bloom, settings),
        },
    });

    if settings.post.draw_grid {
        device.draw_fullscreen(&FullscreenDraw {
            target: front_buffer,
            blend: Some(ADDITIVE_BLEND),
            depth_compare: None,
            program: FullscreenProgram::Grid {
                depth: ImageRef::depth(geometry.gbuffer),
                camera,
            },
        });
    }

    if geometry.draw_outline {
        device.draw_fullscreen(&FullscreenDraw {
            target: front_buffer,
            blend: Some(ADDITIVE_BLEND),
            depth_compare: None,
            program: FullscreenProgram::Outline {
                editor,
                uniforms: OutlineUniforms {
                    color: Vec3::from_array(settings.post.outline_color).extend(1.0),
                },
            },
        });
    }
}
