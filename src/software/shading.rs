//! Fullscreen programs.
//!
//! Each program produces one optional colour per destination pixel; `None`
//! discards the fragment. Blending and depth testing are applied by the
//! device afterwards.

use std::f32::consts::PI;

use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use super::Resources;
use super::image::Level;
use crate::renderer::device::{BlurAxis, FullscreenProgram, ImageRef, ShadowBinding, TargetId};
use crate::renderer::targets::gbuffer;
use crate::renderer::uniforms::{CameraUniforms, post_flags};
use crate::scene::{HillaireSky, PreethamSky, SkyModel};

/// Depth of every fullscreen fragment: the far plane.
pub(crate) const FULLSCREEN_DEPTH: f32 = 1.0;

const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);
const BLUR_WEIGHTS: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

// ============================================================================
// Helpers
// ============================================================================

fn per_pixel(width: u32, height: u32, mut f: impl FnMut(Vec2, u32, u32) -> Option<Vec4>) -> Vec<Option<Vec4>> {
    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let uv = Vec2::new((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32);
            out.push(f(uv, x, y));
        }
    }
    out
}

/// World position of `uv` at NDC `depth`.
pub(crate) fn world_position(camera: &CameraUniforms, uv: Vec2, depth: f32) -> Vec3 {
    let ndc = Vec3::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth);
    camera.inverse_view_projection.project_point3(ndc)
}

fn view_ray(camera: &CameraUniforms, uv: Vec2) -> Vec3 {
    (world_position(camera, uv, 1.0) - camera.position_near.xyz()).normalize_or_zero()
}

struct Surface {
    position: Vec3,
    normal: Vec3,
    albedo: Vec3,
    metallic: f32,
    emissive: Vec3,
    occlusion: f32,
}

struct GBuffer<'a> {
    normal: &'a Level,
    albedo: &'a Level,
    emissive: &'a Level,
    depth: &'a Level,
}

impl<'a> GBuffer<'a> {
    fn bind(resources: &'a Resources, target: TargetId) -> Option<Self> {
        Some(Self {
            normal: resources.level(ImageRef::color(target, gbuffer::NORMAL))?,
            albedo: resources.level(ImageRef::color(target, gbuffer::ALBEDO))?,
            emissive: resources.level(ImageRef::color(target, gbuffer::EMISSIVE))?,
            depth: resources.level(ImageRef::depth(target))?,
        })
    }

    /// `None` where no geometry was drawn.
    fn surface(&self, camera: &CameraUniforms, uv: Vec2) -> Option<Surface> {
        let depth = self.depth.sample_nearest(uv).x;
        if depth >= 1.0 {
            return None;
        }
        let n = self.normal.sample_nearest(uv);
        let a = self.albedo.sample_nearest(uv);
        let e = self.emissive.sample_nearest(uv);
        Some(Surface {
            position: world_position(camera, uv, depth),
            normal: n.xyz().normalize_or_zero(),
            albedo: a.xyz(),
            metallic: a.w,
            emissive: e.xyz(),
            occlusion: e.w,
        })
    }
}

// ============================================================================
// Shadows
// ============================================================================

/// Fraction of light reaching `position`: 1 lit, 0 fully shadowed.
///
/// Beyond the last cascade, or outside its map, everything is lit.
pub(crate) fn shadow_visibility(
    resources: &Resources,
    shadows: &ShadowBinding<'_>,
    camera: &CameraUniforms,
    position: Vec3,
) -> f32 {
    let cascades = shadows.cascades;
    let count = cascades.count().min(shadows.maps.len());
    let view_depth = -camera.view.transform_point3(position).z;
    let splits = cascades.splits.to_array();
    let Some(index) = (0..count).find(|&i| view_depth <= splits[i]) else {
        return 1.0;
    };
    let Some(map) = resources.level(ImageRef::color(shadows.maps[index], 0)) else {
        return 1.0;
    };

    let ndc = cascades.view_projection[index].project_point3(position);
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) || ndc.z > 1.0 {
        return 1.0;
    }

    let moments = map.sample_nearest(uv);
    if cascades.is_blurred() {
        chebyshev(moments.xy(), ndc.z)
    } else if ndc.z - cascades.bias.x > moments.x {
        0.0
    } else {
        1.0
    }
}

/// Variance shadow upper bound with light-bleeding reduction.
fn chebyshev(moments: Vec2, depth: f32) -> f32 {
    if depth <= moments.x {
        return 1.0;
    }
    let variance = (moments.y - moments.x * moments.x).max(1e-5);
    let d = depth - moments.x;
    let p = variance / (variance + d * d);
    ((p - 0.2) / 0.8).clamp(0.0, 1.0)
}

// ============================================================================
// Sky
// ============================================================================

fn rayleigh_phase(mu: f32) -> f32 {
    3.0 / (16.0 * PI) * (1.0 + mu * mu)
}

pub(crate) fn henyey_greenstein(mu: f32, g: f32) -> f32 {
    let denom = (1.0 + g * g - 2.0 * g * mu).max(1e-4);
    (1.0 - g * g) / (4.0 * PI * denom * denom.sqrt())
}

/// Single scattering along `length_km` of atmosphere in `dir`.
fn hillaire_inscatter(sky: &HillaireSky, dir: Vec3, length_km: f32) -> Vec3 {
    let mu = dir.dot(sky.sun_direction.normalize_or_zero());
    let scattering = sky.rayleigh_scattering * rayleigh_phase(mu) + Vec3::splat(sky.mie_scattering * henyey_greenstein(mu, 0.8));
    let extinction = sky.rayleigh_scattering + Vec3::splat(sky.mie_scattering);
    let transmittance = (-extinction * length_km).exp();
    sky.sun_illuminance * scattering / extinction.max(Vec3::splat(1e-6)) * (Vec3::ONE - transmittance) * 4.0 * PI
}

/// Distance from the ground to the top of the atmosphere along `dir`.
fn atmosphere_path_km(sky: &HillaireSky, dir: Vec3) -> f32 {
    let r = sky.ground_radius_km;
    let top = sky.atmosphere_radius_km;
    let mu = dir.y.max(0.0);
    -r * mu + (r * r * mu * mu - r * r + top * top).max(0.0).sqrt()
}

fn preetham(sky: &PreethamSky, dir: Vec3) -> Vec3 {
    let sun = sky.sun_direction.normalize_or_zero();
    let haze = (sky.turbidity - 1.0).max(0.0) * 0.1;
    let zenith = Vec3::new(0.25, 0.45, 0.9).lerp(Vec3::splat(0.7), haze.min(1.0));
    let horizon = Vec3::new(0.8, 0.85, 0.95);

    if dir.y < 0.0 {
        return sky.ground_albedo * horizon * sun.y.max(0.0);
    }
    let gradient = horizon.lerp(zenith, dir.y.sqrt());
    let glow = henyey_greenstein(dir.dot(sun), 0.76) * (1.0 + haze);
    gradient * (0.5 + 0.5 * sun.y.max(0.0)) + Vec3::splat(glow * 0.05)
}

fn sky_radiance(resources: &Resources, sky: &SkyModel, dir: Vec3) -> Vec3 {
    match sky {
        SkyModel::Skybox { texture } => resources.texture(*texture).xyz(),
        SkyModel::Preetham(p) => preetham(p, dir),
        SkyModel::Hillaire(h) => hillaire_inscatter(h, dir, atmosphere_path_km(h, dir)),
    }
}

// ============================================================================
// Post-process
// ============================================================================

fn tone_map(mode: u32, c: Vec3) -> Vec3 {
    match mode {
        0 => c,
        1 => c / (Vec3::ONE + c),
        _ => (c * (2.51 * c + 0.03)) / (c * (2.43 * c + 0.59) + 0.14),
    }
}

/// Edge-directed blend between each pixel and its strongest neighbour.
fn fxaa(image: &[Vec3], width: u32, height: u32) -> Vec<Vec3> {
    let at = |x: i64, y: i64| {
        let cx = x.clamp(0, i64::from(width) - 1) as usize;
        let cy = y.clamp(0, i64::from(height) - 1) as usize;
        image[cy * width as usize + cx]
    };
    let mut out = Vec::with_capacity(image.len());
    for y in 0..i64::from(height) {
        for x in 0..i64::from(width) {
            let c = at(x, y);
            let (n, s, e, w) = (at(x, y - 1), at(x, y + 1), at(x + 1, y), at(x - 1, y));
            let [lc, ln, ls, le, lw] = [c, n, s, e, w].map(|v| v.dot(LUMA));
            let max = lc.max(ln).max(ls).max(le).max(lw);
            let range = max - lc.min(ln).min(ls).min(le).min(lw);
            if range < (0.125 * max).max(0.0312) {
                out.push(c);
                continue;
            }

            let average = (ln + ls + le + lw) * 0.25;
            let t = ((average - lc).abs() / range).clamp(0.0, 1.0);
            let amount = t * t * (3.0 - 2.0 * t) * 0.75;

            let vertical_edge = (ln + ls - 2.0 * lc).abs() >= (le + lw - 2.0 * lc).abs();
            let neighbour = if vertical_edge {
                if (ln - lc).abs() >= (ls - lc).abs() { n } else { s }
            } else if (le - lc).abs() >= (lw - lc).abs() {
                e
            } else {
                w
            };
            out.push(c.lerp(neighbour, amount * 0.5));
        }
    }
    out
}

// ============================================================================
// Programs
// ============================================================================

pub(crate) fn shade(resources: &Resources, program: &FullscreenProgram<'_>, width: u32, height: u32) -> Vec<Option<Vec4>> {
    let discard_all = || vec![None; (width * height) as usize];

    match *program {
        FullscreenProgram::Ambient {
            gbuffer,
            camera,
            irradiance,
            prefiltered,
            brdf_lut,
            uniforms,
        } => {
            let Some(g) = GBuffer::bind(resources, gbuffer) else {
                return discard_all();
            };
            let irradiance = resources.texture(irradiance).xyz();
            let prefiltered = resources.texture(prefiltered).xyz();
            let brdf = resources.texture(brdf_lut).xy();
            let intensity = uniforms.size_intensity.z;

            per_pixel(width, height, |uv, _, _| {
                let Some(s) = g.surface(camera, uv) else {
                    return Some(Vec4::new(0.0, 0.0, 0.0, 1.0));
                };
                let f0 = Vec3::splat(0.04).lerp(s.albedo, s.metallic);
                let diffuse = s.albedo * (1.0 - s.metallic) * irradiance;
                let specular = prefiltered * (f0 * brdf.x + brdf.y);
                let color = (diffuse + specular) * s.occlusion * intensity + s.emissive;
                Some(color.extend(1.0))
            })
        }

        FullscreenProgram::Directional {
            gbuffer,
            camera,
            light,
            shadows,
            light_shafts,
        } => {
            let Some(g) = GBuffer::bind(resources, gbuffer) else {
                return discard_all();
            };
            let shafts = light_shafts.and_then(|image| resources.level(image));
            let radiance = light.color_intensity.xyz() * light.color_intensity.w;
            let to_light = -light.direction.xyz().normalize_or_zero();

            per_pixel(width, height, |uv, _, _| {
                let scattered = shafts.map_or(Vec3::ZERO, |s| s.sample_bilinear(uv).xyz());
                let Some(s) = g.surface(camera, uv) else {
                    return shafts.map(|_| scattered.extend(0.0));
                };
                let n_dot_l = s.normal.dot(to_light).max(0.0);
                let visibility = match &shadows {
                    Some(binding) if n_dot_l > 0.0 => shadow_visibility(resources, binding, camera, s.position),
                    _ => 1.0,
                };
                Some((s.albedo * radiance * n_dot_l * visibility + scattered).extend(0.0))
            })
        }

        FullscreenProgram::Point { gbuffer, camera, light } => {
            let Some(g) = GBuffer::bind(resources, gbuffer) else {
                return discard_all();
            };
            let radiance = light.color_intensity.xyz() * light.color_intensity.w;
            let center = light.position_radius.xyz();
            let radius = light.position_radius.w.max(1e-4);

            per_pixel(width, height, |uv, _, _| {
                let s = g.surface(camera, uv)?;
                let to_light = center - s.position;
                let distance = to_light.length();
                if distance >= radius {
                    return None;
                }
                let window = (1.0 - (distance / radius).powi(4)).clamp(0.0, 1.0);
                let falloff = window * window / (distance * distance + 1.0);
                let n_dot_l = s.normal.dot(to_light / distance.max(1e-6)).max(0.0);
                Some((s.albedo * radiance * n_dot_l * falloff).extend(0.0))
            })
        }

        FullscreenProgram::AerialPerspective { depth, camera, sky } => {
            let Some(depth) = resources.level(depth) else {
                return discard_all();
            };
            per_pixel(width, height, |uv, _, _| {
                let d = depth.sample_nearest(uv).x;
                if d >= 1.0 {
                    return None;
                }
                let offset = world_position(camera, uv, d) - camera.position_near.xyz();
                let km = offset.length() / sky.units_per_km.max(1e-6);
                let dir = offset.normalize_or_zero();
                Some(hillaire_inscatter(sky, dir, km).extend(0.0))
            })
        }

        FullscreenProgram::Sky { camera, sky } => per_pixel(width, height, |uv, _, _| {
            Some(sky_radiance(resources, sky, view_ray(camera, uv)).extend(1.0))
        }),

        FullscreenProgram::ShadowBlur { source, axis } => {
            let Some(src) = resources.level(source) else {
                return discard_all();
            };
            per_pixel(width, height, |uv, _, _| {
                let texel = src.texel_size();
                let step = match axis {
                    BlurAxis::Horizontal => Vec2::new(texel.x, 0.0),
                    BlurAxis::Vertical => Vec2::new(0.0, texel.y),
                };
                let sum = BLUR_WEIGHTS
                    .iter()
                    .enumerate()
                    .map(|(i, &w)| src.sample_nearest(uv + step * (i as f32 - 2.0)) * w)
                    .sum::<Vec4>();
                Some(sum)
            })
        }

        FullscreenProgram::Composite {
            lighting,
            bloom,
            uniforms,
            ..
        } => {
            let Some(hdr) = resources.level(lighting) else {
                return discard_all();
            };
            let bloom = bloom
                .filter(|_| uniforms.has(post_flags::BLOOM))
                .and_then(|image| resources.level(image));
            let bloom_intensity = uniforms.data1.z;
            let gamma = uniforms.data1.y.max(1e-4);
            let mode = uniforms.flags.x;

            let mapped: Vec<Vec3> = per_pixel(width, height, |uv, _, _| {
                let mut c = hdr.sample_bilinear(uv).xyz();
                if let Some(b) = bloom {
                    c += b.sample_bilinear(uv).xyz() * bloom_intensity;
                }
                let ldr = tone_map(mode, c.max(Vec3::ZERO)).clamp(Vec3::ZERO, Vec3::ONE);
                Some(ldr.powf(1.0 / gamma).extend(1.0))
            })
            .into_iter()
            .map(|c| c.unwrap_or(Vec4::ZERO).xyz())
            .collect();

            let resolved = if uniforms.has(post_flags::FXAA) {
                fxaa(&mapped, width, height)
            } else {
                mapped
            };
            resolved.into_iter().map(|c| Some(c.extend(1.0))).collect()
        }

        FullscreenProgram::Grid { depth, camera } => {
            let Some(depth) = resources.level(depth) else {
                return discard_all();
            };
            let eye = camera.position_near.xyz();
            let far = camera.front_far.w.max(1e-4);

            per_pixel(width, height, |uv, _, _| {
                let dir = view_ray(camera, uv);
                if dir.y.abs() < 1e-6 {
                    return None;
                }
                let t = -eye.y / dir.y;
                if t <= 0.0 || t >= far {
                    return None;
                }
                let scene = depth.sample_nearest(uv).x;
                if scene < 1.0 && (world_position(camera, uv, scene) - eye).length() < t {
                    return None;
                }

                let hit = eye + dir * t;
                let cell = hit.xz() - hit.xz().round();
                let line = cell.x.abs().min(cell.y.abs());
                if line > 0.02 {
                    return None;
                }
                let fade = 1.0 - t / far;
                Some(Vec4::new(0.35, 0.35, 0.35, 1.0) * fade)
            })
        }

        FullscreenProgram::Outline { editor, uniforms } => {
            let Some(mask) = resources.level(editor) else {
                return discard_all();
            };
            let texel = mask.texel_size();
            per_pixel(width, height, |uv, _, _| {
                if mask.sample_nearest(uv).x > 0.5 {
                    return None;
                }
                let touches_selection = (-2..=2i32).any(|dy| {
                    (-2..=2i32).any(|dx| {
                        let offset = Vec2::new(dx as f32, dy as f32) * texel;
                        mask.sample_nearest(uv + offset).x > 0.5
                    })
                });
                touches_selection.then_some(uniforms.color)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_is_one_in_front_of_occluder() {
        assert_eq!(chebyshev(Vec2::new(0.5, 0.25), 0.4), 1.0);
        assert!(chebyshev(Vec2::new(0.5, 0.25), 0.9) < 0.1);
    }

    #[test]
    fn tone_mappers_stay_in_range() {
        for mode in 0..3 {
            let c = tone_map(mode, Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE);
            assert!(c.x > 0.0 && c.x <= 1.0);
        }
        assert_eq!(tone_map(0, Vec3::splat(0.5)), Vec3::splat(0.5));
        assert_eq!(tone_map(1, Vec3::ONE), Vec3::splat(0.5));
    }

    #[test]
    fn fxaa_leaves_flat_images_untouched() {
        let image = vec![Vec3::splat(0.3); 16];
        assert_eq!(fxaa(&image, 4, 4), image);
    }

    #[test]
    fn fxaa_softens_a_hard_edge() {
        let mut image = vec![Vec3::ZERO; 16];
        for y in 0..4 {
            image[y * 4 + 2] = Vec3::ONE;
            image[y * 4 + 3] = Vec3::ONE;
        }
        let out = fxaa(&image, 4, 4);
        assert!(out[1].x > 0.0, "dark side of the edge should pick up light");
    }

    #[test]
    fn upward_path_is_atmosphere_thickness() {
        let sky = HillaireSky::default();
        let path = atmosphere_path_km(&sky, Vec3::Y);
        assert!((path - 100.0).abs() < 1e-2);
    }
}
