//! Compute kernels.
//!
//! Every kernel evaluates its whole destination level and returns the texels
//! row-major; the device writes them back.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use super::Resources;
use super::image::Level;
use super::shading::{henyey_greenstein, shadow_visibility, world_position};
use crate::renderer::device::ComputeProgram;

const MIE_ANISOTROPY: f32 = 0.7;

fn each_texel(dest: &Level, mut f: impl FnMut(Vec2, u32, u32) -> Vec4) -> Vec<Vec4> {
    let mut out = Vec::with_capacity((dest.width * dest.height) as usize);
    for y in 0..dest.height {
        for x in 0..dest.width {
            out.push(f(dest.uv_of(x, y), x, y));
        }
    }
    out
}

/// 13-tap box-weighted downsample of `source` around `uv`.
fn downsample_13(source: &Level, uv: Vec2) -> Vec4 {
    let t = source.texel_size();
    let s = |dx: f32, dy: f32| source.sample_bilinear(uv + Vec2::new(dx, dy) * t);

    let center = s(0.0, 0.0);
    let corners = s(-2.0, -2.0) + s(2.0, -2.0) + s(-2.0, 2.0) + s(2.0, 2.0);
    let edges = s(0.0, -2.0) + s(-2.0, 0.0) + s(2.0, 0.0) + s(0.0, 2.0);
    let inner = s(-1.0, -1.0) + s(1.0, -1.0) + s(-1.0, 1.0) + s(1.0, 1.0);
    center * 0.125 + corners * 0.03125 + edges * 0.0625 + inner * 0.125
}

/// 3x3 tent filter; `radius` scales the tap spacing in source texels.
fn tent_9(source: &Level, uv: Vec2, radius: f32) -> Vec4 {
    let t = source.texel_size() * radius;
    let s = |dx: f32, dy: f32| source.sample_bilinear(uv + Vec2::new(dx, dy) * t);

    let mut sum = s(0.0, 0.0) * 4.0;
    sum += (s(-1.0, 0.0) + s(1.0, 0.0) + s(0.0, -1.0) + s(0.0, 1.0)) * 2.0;
    sum += s(-1.0, -1.0) + s(1.0, -1.0) + s(-1.0, 1.0) + s(1.0, 1.0);
    sum / 16.0
}

/// Soft-knee threshold. `curve = (threshold, threshold - knee, 2 * knee, 0.25 / knee)`.
pub(crate) fn quadratic_threshold(color: Vec3, curve: Vec4) -> Vec3 {
    let brightness = color.max_element();
    let soft = (brightness - curve.y).clamp(0.0, curve.z);
    let soft = curve.w * soft * soft;
    let contribution = soft.max(brightness - curve.x) / brightness.max(1e-4);
    color * contribution.max(0.0)
}

pub(crate) fn run(resources: &Resources, program: &ComputeProgram<'_>) -> Option<Vec<Vec4>> {
    let dest = resources.level(program.writes())?;

    let texels = match *program {
        ComputeProgram::BloomPrefilter { source, uniforms, .. } => {
            let src = resources.level(source)?;
            each_texel(dest, |uv, _, _| {
                let color = downsample_13(src, uv).xyz().max(Vec3::ZERO);
                quadratic_threshold(color, uniforms.curve).extend(1.0)
            })
        }

        ComputeProgram::BloomDownsample { source, .. } => {
            let src = resources.level(source)?;
            each_texel(dest, |uv, _, _| downsample_13(src, uv))
        }

        ComputeProgram::BloomUpsample { source, uniforms, .. } => {
            let src = resources.level(source)?;
            each_texel(dest, |uv, _, _| tent_9(src, uv, uniforms.radius.x))
        }

        ComputeProgram::BloomUpsampleBlend {
            previous,
            current,
            uniforms,
            ..
        } => {
            let coarse = resources.level(previous)?;
            let fine = resources.level(current)?;
            each_texel(dest, |uv, x, y| {
                (fine.load(x, y) + tent_9(coarse, uv, uniforms.radius.x)).xyz().extend(1.0)
            })
        }

        ComputeProgram::LightShafts {
            depth,
            camera,
            light,
            shadows,
            uniforms,
            ..
        } => {
            let depth = resources.level(depth)?;
            let eye = camera.position_near.xyz();
            let radiance = light.color_intensity.xyz() * light.color_intensity.w;
            let density = uniforms.mie_absorption_density.w;
            let scattering = uniforms.mie_scattering_intensity.xyz() * density;
            let extinction = scattering + uniforms.mie_absorption_density.xyz() * density;
            let intensity = uniforms.mie_scattering_intensity.w;
            let samples = uniforms.params.x.max(1);
            let to_light = -light.direction.xyz().normalize_or_zero();

            each_texel(dest, |uv, _, _| {
                let end = world_position(camera, uv, depth.sample_nearest(uv).x);
                let ray = end - eye;
                let length = ray.length();
                if length <= 1e-6 {
                    return Vec4::ZERO;
                }
                let dir = ray / length;
                let step = length / samples as f32;
                let phase = henyey_greenstein(dir.dot(to_light), MIE_ANISOTROPY);

                let mut transmittance = Vec3::ONE;
                let mut inscatter = Vec3::ZERO;
                for i in 0..samples {
                    let p = eye + dir * ((i as f32 + 0.5) * step);
                    let lit = shadow_visibility(resources, &shadows, camera, p);
                    let step_transmittance = (-extinction * step).exp();
                    inscatter += transmittance * scattering * lit * phase * step;
                    transmittance *= step_transmittance;
                }
                (inscatter * radiance * intensity).extend(1.0)
            })
        }

        ComputeProgram::BilateralBlur { source, depth, .. } => {
            let src = resources.level(source)?;
            let depth = resources.level(depth)?;
            let texel = src.texel_size();
            each_texel(dest, |uv, _, _| {
                let center_depth = depth.sample_nearest(uv).x;
                let mut sum = Vec4::ZERO;
                let mut weight = 0.0f32;
                for dy in -2..=2i32 {
                    for dx in -2..=2i32 {
                        let offset = Vec2::new(dx as f32, dy as f32);
                        let tap = uv + offset * texel;
                        let spatial = (-offset.length_squared() / 4.5).exp();
                        let dz = (depth.sample_nearest(tap).x - center_depth) / 0.01;
                        let w = spatial * (-dz * dz).exp();
                        sum += src.sample_nearest(tap) * w;
                        weight += w;
                    }
                }
                sum / weight.max(1e-6)
            })
        }
    };
    Some(texels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_removes_dim_color() {
        // threshold 1, knee 0.5
        let curve = Vec4::new(1.0, 0.5, 1.0, 0.5);
        assert_eq!(quadratic_threshold(Vec3::splat(0.25), curve), Vec3::ZERO);
        let bright = quadratic_threshold(Vec3::splat(4.0), curve);
        assert!((bright.x - 3.0).abs() < 1e-5, "linear region keeps brightness - threshold");
    }

    #[test]
    fn downsample_preserves_constant_images() {
        let level = Level::filled(wgpu::TextureFormat::Rgba32Float, 8, 8, Vec4::splat(2.0));
        let v = downsample_13(&level, Vec2::splat(0.5));
        assert!((v - Vec4::splat(2.0)).abs().max_element() < 1e-5);
        let t = tent_9(&level, Vec2::splat(0.5), 1.0);
        assert!((t - Vec4::splat(2.0)).abs().max_element() < 1e-5);
    }
}
