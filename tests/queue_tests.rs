//! Render Queue Tests
//!
//! Tests for:
//! - Queue population by submission kind
//! - Light counting and world-space light records
//! - Queues draining at `end`, whatever was submitted
//! - Submissions outside a frame

use std::sync::Arc;

use glam::{Mat4, Vec3};

use prism::renderer::device::{RenderDevice, TargetDesc, TargetId};
use prism::renderer::{Renderer, RendererSettings};
use prism::resources::{AnimationPose, MaterialTable, Model, Submesh, create_box};
use prism::scene::{Camera, Light};
use prism::software::{MaterialParams, SoftwareDevice};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

struct Fixture {
    renderer: Renderer<SoftwareDevice>,
    front: TargetId,
    model: Arc<Model>,
    materials: Arc<MaterialTable>,
}

fn fixture() -> anyhow::Result<Fixture> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut settings = RendererSettings::default();
    settings.shadows.cascade_count = 1;
    settings.shadows.resolution = 32;
    settings.bloom.enabled = false;

    let mut device = SoftwareDevice::new();
    let data = create_box(1.0, 1.0, 1.0).with_single_joint(0);
    let mesh = device.upload_mesh(data.clone());
    let material = device.upload_material(MaterialParams::default());
    let model = Arc::new(Model::new(vec![Submesh::new("body", mesh, &data)]));
    let materials = Arc::new(MaterialTable::new().with("body", material));

    let mut renderer = Renderer::new(device, 16, 16, settings)?;
    let front = renderer
        .device_mut()
        .create_target(&TargetDesc::new("Front", 16, 16).with_color(wgpu::TextureFormat::Rgba8Unorm));
    Ok(Fixture {
        renderer,
        front,
        model,
        materials,
    })
}

fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.1, 50.0)
}

fn pose() -> AnimationPose {
    AnimationPose::Skinned(Arc::from([Mat4::IDENTITY]))
}

// ============================================================================
// Population
// ============================================================================

#[test]
fn submissions_land_in_typed_queues() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;
    r.submit_static(&f.model, &f.materials, Mat4::IDENTITY, 1, false);
    r.submit_static(&f.model, &f.materials, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)), 2, true);
    r.submit_skinned(&f.model, pose(), &f.materials, Mat4::IDENTITY, 3, false);

    let q = r.frame().queues();
    assert_eq!(q.statics().len(), 2);
    assert_eq!(q.skinned().len(), 1);
    assert_eq!(q.static_shadow().len(), 2);
    assert_eq!(q.skinned_shadow().len(), 1);
    assert_eq!(q.statics()[1].id, 2);
    assert!(q.statics()[1].selected);

    r.end(f.front)?;
    Ok(())
}

#[test]
fn lights_are_counted_and_transformed() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;

    let rotate = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
    r.submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y), &rotate);
    let moved = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    r.submit_light(&Light::new_point(Vec3::ONE, 5.0, 4.0), &moved);
    r.submit_light(&Light::new_point(Vec3::ONE, 5.0, 4.0), &Mat4::IDENTITY);
    r.submit_light(&Light::new_spot(Vec3::ONE, 1.0, 3.0, 0.2, 0.4), &moved);

    let q = r.frame().queues();
    assert_eq!(q.directional().len(), 1);
    assert_eq!(q.point().len(), 2);
    assert_eq!(q.spot().len(), 1);

    // -Y rotated a quarter turn about Z points along +X.
    let dir = q.directional()[0].direction;
    assert!(approx(dir.x, 1.0) && approx(dir.y, 0.0), "direction {dir}");
    assert!(approx(dir.length(), 1.0));
    assert_eq!(q.point()[0].position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(q.spot()[0].position, Vec3::new(1.0, 2.0, 3.0));

    let stats = r.stats();
    assert_eq!(stats.directional_lights, 1);
    assert_eq!(stats.point_lights, 2);
    assert_eq!(stats.spot_lights, 1);

    r.end(f.front)?;
    Ok(())
}

#[test]
fn non_uniform_scale_keeps_direction_unit_length() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;
    let scale = Mat4::from_scale(Vec3::new(4.0, 0.5, 1.0));
    r.submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::new(1.0, -1.0, 0.0)), &scale);
    let dir = r.frame().queues().directional()[0].direction;
    assert!(approx(dir.length(), 1.0));
    r.end(f.front)?;
    Ok(())
}

// ============================================================================
// Draining
// ============================================================================

#[test]
fn queues_are_empty_after_end() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;

    for frame in 0..4u32 {
        r.begin(16, 16, &camera())?;
        for i in 0..frame * 3 {
            let offset = Mat4::from_translation(Vec3::new(i as f32 * 3.0 - 4.0, 0.0, -(i as f32)));
            r.submit_static(&f.model, &f.materials, offset, i, i % 2 == 0);
            if i % 3 == 0 {
                r.submit_skinned(&f.model, pose(), &f.materials, offset, i, false);
            }
        }
        for i in 0..frame {
            r.submit_light(&Light::new_point(Vec3::ONE, 1.0, 2.0), &Mat4::from_translation(Vec3::splat(i as f32)));
            r.submit_light(&Light::new_spot(Vec3::ONE, 1.0, 2.0, 0.1, 0.3), &Mat4::IDENTITY);
        }
        if frame % 2 == 1 {
            r.submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y), &Mat4::IDENTITY);
        }
        r.end(f.front)?;

        assert!(r.frame().queues().is_empty(), "frame {frame} left work queued");
        assert!(!r.frame().is_in_frame());
    }
    Ok(())
}

#[test]
fn spot_lights_are_drained_without_shading() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;
    r.submit_light(&Light::new_spot(Vec3::ONE, 10.0, 5.0, 0.2, 0.4), &Mat4::IDENTITY);
    r.end(f.front)?;

    assert_eq!(r.stats().spot_lights, 1);
    assert!(r.frame().queues().spot().is_empty());
    Ok(())
}

#[test]
fn failed_end_still_drains() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;
    r.submit_static(&f.model, &f.materials, Mat4::IDENTITY, 0, false);
    r.submit_light(&Light::new_point(Vec3::ONE, 1.0, 2.0), &Mat4::IDENTITY);

    assert!(r.end(TargetId::default()).is_err());
    assert!(r.frame().queues().is_empty());
    Ok(())
}

// ============================================================================
// Outside a frame
// ============================================================================

#[test]
fn submissions_outside_a_frame_are_ignored() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;

    assert!(!r.submit_static(&f.model, &f.materials, Mat4::IDENTITY, 0, false));
    assert!(!r.submit_skinned(&f.model, pose(), &f.materials, Mat4::IDENTITY, 0, false));
    r.submit_light(&Light::new_point(Vec3::ONE, 1.0, 2.0), &Mat4::IDENTITY);

    assert!(r.frame().queues().is_empty());
    assert_eq!(r.stats().point_lights, 0);

    // The next frame starts clean.
    r.begin(16, 16, &camera())?;
    assert!(r.frame().queues().is_empty());
    r.end(f.front)?;
    assert_eq!(r.stats().draw_calls, 0);
    Ok(())
}

#[test]
fn begin_resets_statistics_but_keeps_frame_index() -> anyhow::Result<()> {
    let mut f = fixture()?;
    let r = &mut f.renderer;
    r.begin(16, 16, &camera())?;
    r.submit_static(&f.model, &f.materials, Mat4::IDENTITY, 0, false);
    r.submit_light(&Light::new_point(Vec3::ONE, 1.0, 2.0), &Mat4::IDENTITY);
    r.end(f.front)?;
    assert_eq!(r.stats().draw_calls, 1);
    assert_eq!(r.stats().point_lights, 1);

    r.begin(16, 16, &camera())?;
    assert_eq!(r.stats().draw_calls, 0);
    assert_eq!(r.stats().point_lights, 0);
    assert_eq!(r.stats().frame_index, 1);
    r.end(f.front)?;
    assert_eq!(r.stats().frame_index, 2);
    Ok(())
}
