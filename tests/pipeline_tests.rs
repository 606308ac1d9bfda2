//! End-to-End Pipeline Tests
//!
//! Drives `Renderer<SoftwareDevice>` through whole frames:
//! - Ambient-only output matches the analytic IBL result
//! - Cascaded shadows darken an occluded receiver
//! - Stage ordering, lifecycle errors and statistics
//! - Editor overlays (grid, selection outline)

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use prism::renderer::device::{ImageRef, MeshProgram, RenderDevice, TargetDesc, TargetId};
use prism::renderer::targets::gbuffer;
use prism::renderer::{RendererSettings, ShadowQuality, ToneMappingMode};
use prism::resources::{AnimationPose, MaterialTable, Model, Submesh, create_box};
use prism::scene::{Camera, Environment, Light, SkyModel};
use prism::software::{DeviceCommand, MaterialParams, SoftwareDevice};
use prism::{RenderError, Renderer};

const WIDTH: u32 = 48;
const HEIGHT: u32 = 48;
const TOLERANCE: f32 = 2e-3;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn approx_vec(a: Vec4, b: Vec4) -> bool {
    (a - b).abs().max_element() < TOLERANCE
}

/// Linear tone mapping, gamma 1, no FXAA, no bloom: the front buffer holds
/// the HDR result clamped to `[0, 1]`.
fn deterministic_settings() -> RendererSettings {
    let mut settings = RendererSettings::default();
    settings.shadows.cascade_count = 1;
    settings.shadows.resolution = 256;
    settings.shadows.quality = ShadowQuality::Hard;
    settings.bloom.enabled = false;
    settings.post.fxaa = false;
    settings.post.gamma = 1.0;
    settings.post.tone_mapping = ToneMappingMode::Linear;
    settings
}

struct Fixture {
    renderer: Renderer<SoftwareDevice>,
    front: TargetId,
    cube: Arc<Model>,
    materials: Arc<MaterialTable>,
}

impl Fixture {
    fn new(settings: RendererSettings, albedo: Vec3) -> anyhow::Result<Self> {
        let mut device = SoftwareDevice::new();
        let data = create_box(2.0, 2.0, 2.0);
        let mesh = device.upload_mesh(data.clone());
        let material = device.upload_material(MaterialParams::default().with_albedo(albedo));

        let mut renderer = Renderer::new(device, WIDTH, HEIGHT, settings)?;
        let front = renderer.device_mut().create_target(
            &TargetDesc::new("Front Buffer", WIDTH, HEIGHT).with_color(wgpu::TextureFormat::Rgba16Float),
        );

        Ok(Self {
            renderer,
            front,
            cube: Arc::new(Model::new(vec![Submesh::new("cube", mesh, &data)])),
            materials: Arc::new(MaterialTable::new().with("cube", material)),
        })
    }

    fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.renderer
            .device()
            .read_pixel(ImageRef::color(self.front, 0), x, y)
            .unwrap_or(Vec4::splat(f32::NAN))
    }

    fn commands(&self) -> &[DeviceCommand] {
        self.renderer.device().commands()
    }
}

fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 0.0, 6.0), Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.1, 100.0)
}

/// Screen pixel covering world point `p`.
fn pixel_of(camera: &Camera, p: Vec3) -> (u32, u32) {
    let ndc = camera.view_projection.project_point3(p);
    let x = ((ndc.x * 0.5 + 0.5) * WIDTH as f32) as u32;
    let y = ((0.5 - ndc.y * 0.5) * HEIGHT as f32) as u32;
    (x, y)
}

fn position_of(commands: &[DeviceCommand], pred: impl Fn(&DeviceCommand) -> bool) -> Option<usize> {
    commands.iter().position(pred)
}

fn is_fullscreen(command: &DeviceCommand, name: &str) -> bool {
    matches!(command, DeviceCommand::DrawFullscreen { program, .. } if *program == name)
}

// ============================================================================
// Ambient-only scenario
// ============================================================================

#[test]
fn ambient_only_frame_matches_ibl_contribution() -> anyhow::Result<()> {
    init_logger();
    let albedo = Vec3::new(0.5, 0.25, 1.0);
    let mut f = Fixture::new(deterministic_settings(), albedo)?;

    let device = f.renderer.device_mut();
    let irradiance = device.upload_texture(Vec4::ONE);
    let prefiltered = device.upload_texture(Vec4::ZERO);
    let brdf = device.upload_texture(Vec4::new(1.0, 0.0, 0.0, 0.0));
    let sky = device.upload_texture(Vec4::ZERO);
    f.renderer.set_environment(Some(
        Environment::new(irradiance, prefiltered, brdf, SkyModel::Skybox { texture: sky }).with_intensity(0.8),
    ));

    let cam = camera();
    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    assert!(f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 7, false));
    f.renderer.end(f.front)?;

    let stats = f.renderer.stats();
    assert_eq!(stats.draw_calls, 1, "one visible submesh, one draw");
    assert_eq!(stats.directional_lights, 0);
    assert_eq!(stats.point_lights, 0);
    assert_eq!(stats.vertices, 24);
    assert_eq!(stats.triangles, 12);

    let (cx, cy) = pixel_of(&cam, Vec3::new(0.0, 0.0, 1.0));
    let expected = (albedo * 0.8).extend(1.0);
    let center = f.pixel(cx, cy);
    assert!(approx_vec(center, expected), "ambient-only colour: expected {expected}, got {center}");

    let background = f.pixel(0, 0);
    assert!(approx_vec(background, Vec4::new(0.0, 0.0, 0.0, 1.0)), "black skybox behind the cube, got {background}");
    Ok(())
}

#[test]
fn emissive_surfaces_add_to_ambient() -> anyhow::Result<()> {
    init_logger();
    let mut f = Fixture::new(deterministic_settings(), Vec3::ZERO)?;
    let data = create_box(2.0, 2.0, 2.0);
    let device = f.renderer.device_mut();
    let mesh = device.upload_mesh(data.clone());
    let glow = device.upload_material(MaterialParams::default().with_albedo(Vec3::ZERO).with_emissive(Vec3::new(0.3, 0.0, 0.0)));
    let black = device.upload_texture(Vec4::ZERO);
    f.renderer
        .set_environment(Some(Environment::new(black, black, black, SkyModel::Skybox { texture: black })));

    let model = Arc::new(Model::new(vec![Submesh::new("glow", mesh, &data)]));
    let materials = Arc::new(MaterialTable::new().with("glow", glow));

    let cam = camera();
    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer.submit_static(&model, &materials, Mat4::IDENTITY, 0, false);
    f.renderer.end(f.front)?;

    let (cx, cy) = pixel_of(&cam, Vec3::new(0.0, 0.0, 1.0));
    assert!(approx_vec(f.pixel(cx, cy), Vec4::new(0.3, 0.0, 0.0, 1.0)));
    Ok(())
}

// ============================================================================
// Shadowed scenario
// ============================================================================

fn render_shadow_scene(cast_shadows: bool) -> anyhow::Result<Vec4> {
    init_logger();
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;

    let floor_data = create_box(10.0, 0.2, 10.0);
    let blocker_data = create_box(1.0, 1.0, 1.0);
    let device = f.renderer.device_mut();
    let floor_mesh = device.upload_mesh(floor_data.clone());
    let blocker_mesh = device.upload_mesh(blocker_data.clone());
    let white = device.upload_material(MaterialParams::default());

    let floor = Arc::new(Model::new(vec![Submesh::new("floor", floor_mesh, &floor_data)]));
    let blocker = Arc::new(Model::new(vec![Submesh::new("blocker", blocker_mesh, &blocker_data)]));
    let materials = Arc::new(MaterialTable::new().with("floor", white).with("blocker", white));

    let cam = Camera::look_at(Vec3::new(0.0, 8.0, 4.0), Vec3::new(0.0, -1.0, 0.0), Vec3::Y, 60.0, 1.0, 0.1, 30.0);
    let sun = Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y).with_shadows(cast_shadows);

    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer
        .submit_static(&floor, &materials, Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)), 1, false);
    f.renderer
        .submit_static(&blocker, &materials, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)), 2, false);
    f.renderer.submit_light(&sun, &Mat4::IDENTITY);
    f.renderer.end(f.front)?;

    assert_eq!(f.renderer.stats().directional_lights, 1);
    if cast_shadows {
        assert!(f.renderer.stats().shadow_draw_calls >= 2, "both casters rendered into the cascade");
    } else {
        assert_eq!(f.renderer.stats().shadow_draw_calls, 0, "no cascades without a shadow light");
    }

    let (x, y) = pixel_of(&cam, Vec3::new(0.0, -0.9, 0.0));
    Ok(f.pixel(x, y))
}

#[test]
fn occluded_receiver_is_darker_with_shadows() -> anyhow::Result<()> {
    let lit = render_shadow_scene(false)?;
    let shadowed = render_shadow_scene(true)?;
    assert!(lit.x > 0.9, "unshadowed floor faces the light, got {lit}");
    assert!(
        shadowed.x < lit.x * 0.5,
        "floor under the blocker must be darker: shadowed {shadowed}, lit {lit}"
    );
    Ok(())
}

#[test]
fn blurred_shadows_still_darken_receiver() -> anyhow::Result<()> {
    init_logger();
    let mut settings = deterministic_settings();
    settings.shadows.quality = ShadowQuality::Blurred;
    let mut f = Fixture::new(settings, Vec3::ONE)?;

    let floor_data = create_box(10.0, 0.2, 10.0);
    let blocker_data = create_box(2.0, 1.0, 2.0);
    let device = f.renderer.device_mut();
    let floor_mesh = device.upload_mesh(floor_data.clone());
    let blocker_mesh = device.upload_mesh(blocker_data.clone());
    let white = device.upload_material(MaterialParams::default());
    let floor = Arc::new(Model::new(vec![Submesh::new("floor", floor_mesh, &floor_data)]));
    let blocker = Arc::new(Model::new(vec![Submesh::new("blocker", blocker_mesh, &blocker_data)]));
    let materials = Arc::new(MaterialTable::new().with("floor", white).with("blocker", white));

    let cam = Camera::look_at(Vec3::new(0.0, 8.0, 4.0), Vec3::new(0.0, -1.0, 0.0), Vec3::Y, 60.0, 1.0, 0.1, 30.0);
    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer
        .submit_static(&floor, &materials, Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)), 1, false);
    f.renderer
        .submit_static(&blocker, &materials, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)), 2, false);
    f.renderer
        .submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y), &Mat4::IDENTITY);
    f.renderer.end(f.front)?;

    let blurs = f.commands().iter().filter(|c| is_fullscreen(c, "shadow_blur")).count();
    assert_eq!(blurs, 2, "one horizontal and one vertical pass per cascade");

    let (x, y) = pixel_of(&cam, Vec3::new(0.0, -0.9, 0.0));
    assert!(f.pixel(x, y).x < 0.5, "variance shadow darkens the receiver");
    Ok(())
}

// ============================================================================
// Stage ordering
// ============================================================================

#[test]
fn stages_run_in_pipeline_order() -> anyhow::Result<()> {
    init_logger();
    let mut settings = deterministic_settings();
    settings.bloom.enabled = true;
    settings.bloom.mip_count = 3;
    let mut f = Fixture::new(settings, Vec3::ONE)?;
    let black = f.renderer.device_mut().upload_texture(Vec4::ZERO);
    f.renderer
        .set_environment(Some(Environment::new(black, black, black, SkyModel::Skybox { texture: black })));
    f.renderer.device_mut().clear_commands();

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer
        .submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::new(-1.0, -1.0, -1.0)), &Mat4::IDENTITY);
    f.renderer.submit_light(&Light::new_point(Vec3::ONE, 2.0, 5.0), &Mat4::from_translation(Vec3::Z * 2.0));
    f.renderer.end(f.front)?;

    let gbuffer = f.renderer.targets().gbuffer;
    let cmds = f.commands();
    let find = |pred: &dyn Fn(&DeviceCommand) -> bool| position_of(cmds, pred).expect("command issued");

    let geometry = find(&|c| {
        matches!(c, DeviceCommand::DrawMesh { target, program: MeshProgram::GBuffer { .. }, .. } if *target == gbuffer)
    });
    let shadow = find(&|c| matches!(c, DeviceCommand::DrawMesh { program: MeshProgram::ShadowCaster, .. }));
    let ambient = find(&|c| is_fullscreen(c, "ambient"));
    let directional = find(&|c| is_fullscreen(c, "directional"));
    let point = find(&|c| is_fullscreen(c, "point"));
    let blit = find(&|c| matches!(c, DeviceCommand::BlitDepth { .. }));
    let sky = find(&|c| is_fullscreen(c, "sky"));
    let prefilter = find(&|c| matches!(c, DeviceCommand::Dispatch { program: "bloom_prefilter", .. }));
    let composite = find(&|c| is_fullscreen(c, "composite"));

    assert!(geometry < shadow, "geometry before shadows");
    assert!(shadow < ambient, "shadows before lighting");
    assert!(ambient < directional && directional < point, "ambient, directional, point");
    assert!(point < blit && blit < sky, "sky drawn after the depth blit");
    assert!(sky < prefilter && prefilter < composite, "bloom between lighting and composite");

    assert!(
        matches!(cmds[ambient], DeviceCommand::DrawFullscreen { blended: false, .. }),
        "ambient initializes the lighting buffer"
    );
    assert!(matches!(cmds[directional], DeviceCommand::DrawFullscreen { blended: true, .. }));
    assert!(matches!(cmds[point], DeviceCommand::DrawFullscreen { blended: true, .. }));
    assert!(matches!(cmds[sky], DeviceCommand::DrawFullscreen { depth_tested: true, .. }));
    assert!(f.renderer.device().hazards().is_empty(), "every compute read follows a barrier");
    Ok(())
}

#[test]
fn light_shafts_run_between_shadow_and_directional_draw() -> anyhow::Result<()> {
    init_logger();
    let mut settings = deterministic_settings();
    settings.light_shafts.enabled = true;
    settings.light_shafts.sample_count = 4;
    let mut f = Fixture::new(settings, Vec3::ONE)?;

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer
        .submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::new(0.3, -1.0, 0.2)), &Mat4::IDENTITY);
    f.renderer.end(f.front)?;

    let cmds = f.commands();
    let march = position_of(cmds, |c| matches!(c, DeviceCommand::Dispatch { program: "light_shafts", .. }));
    let blur = position_of(cmds, |c| matches!(c, DeviceCommand::Dispatch { program: "bilateral_blur", .. }));
    let directional = position_of(cmds, |c| is_fullscreen(c, "directional"));
    let (Some(march), Some(blur), Some(directional)) = (march, blur, directional) else {
        panic!("light-shaft dispatches missing from {cmds:?}");
    };
    assert!(march < blur && blur < directional);
    assert!(matches!(cmds[march + 1], DeviceCommand::Barrier(_)), "barrier after the ray march");
    assert!(matches!(cmds[blur + 1], DeviceCommand::Barrier(_)), "barrier after the blur");
    if let DeviceCommand::Dispatch { groups, .. } = &cmds[march] {
        assert_eq!(*groups, [3, 3, 1], "half-resolution 24x24 in 8x8 groups");
    }
    assert!(f.renderer.device().hazards().is_empty());
    Ok(())
}

#[test]
fn non_primary_light_takes_unshadowed_path() -> anyhow::Result<()> {
    init_logger();
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer.submit_light(
        &Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y).with_primary(false),
        &Mat4::IDENTITY,
    );
    f.renderer.end(f.front)?;

    assert_eq!(f.renderer.stats().directional_lights, 1);
    assert_eq!(f.renderer.stats().shadow_draw_calls, 0, "no cascades were computed");
    assert!(f.commands().iter().any(|c| is_fullscreen(c, "directional")));
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn end_without_begin_is_an_error() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    assert!(matches!(f.renderer.end(f.front), Err(RenderError::FrameNotBegun)));
    Ok(())
}

#[test]
fn begin_twice_is_an_error() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    assert!(matches!(
        f.renderer.begin(WIDTH, HEIGHT, &camera()),
        Err(RenderError::FrameInProgress)
    ));
    assert!(matches!(
        f.renderer.set_settings(deterministic_settings()),
        Err(RenderError::FrameInProgress)
    ));
    Ok(())
}

#[test]
fn unknown_front_buffer_is_rejected_and_frame_closed() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let stale = f.renderer.device_mut().create_target(&TargetDesc::new("Stale", 4, 4).with_color(wgpu::TextureFormat::Rgba8Unorm));
    f.renderer.device_mut().destroy_target(stale);

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    assert!(matches!(f.renderer.end(stale), Err(RenderError::UnknownTarget)));
    assert!(!f.renderer.frame().is_in_frame());
    assert!(f.renderer.frame().queues().is_empty(), "queues drained even on error");
    Ok(())
}

#[test]
fn invalid_camera_is_rejected_at_begin() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let eye = Vec3::new(0.0, 0.0, 6.0);
    let cameras = [
        ("zero near", Camera::look_at(eye, Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.0, 100.0)),
        ("far before near", Camera::look_at(eye, Vec3::ZERO, Vec3::Y, 60.0, 1.0, 10.0, 5.0)),
        ("NaN far", Camera::look_at(eye, Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.1, f32::NAN)),
    ];
    for (name, cam) in cameras {
        assert!(
            matches!(f.renderer.begin(WIDTH, HEIGHT, &cam), Err(RenderError::InvalidCamera { .. })),
            "{name} should be rejected"
        );
        assert!(!f.renderer.frame().is_in_frame(), "{name} must not open a frame");
    }

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.end(f.front)?;
    assert_eq!(f.renderer.stats().frame_index, 1);
    Ok(())
}

#[test]
fn zero_sized_frame_is_rejected() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let err = f.renderer.begin(0, HEIGHT, &camera());
    assert!(matches!(err, Err(RenderError::ZeroSizedTarget { width: 0, .. })));
    assert!(Renderer::new(SoftwareDevice::new(), 16, 0, RendererSettings::default()).is_err());
    Ok(())
}

#[test]
fn frame_index_counts_completed_frames() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    for _ in 0..3 {
        f.renderer.begin(WIDTH, HEIGHT, &camera())?;
        f.renderer.end(f.front)?;
    }
    assert_eq!(f.renderer.stats().frame_index, 3);
    Ok(())
}

#[test]
fn resize_happens_at_begin() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    f.renderer.begin(32, 16, &camera())?;
    f.renderer.end(f.front)?;
    assert_eq!(f.renderer.targets().size(), (32, 16));
    let gbuffer = f.renderer.targets().gbuffer;
    assert_eq!(f.renderer.device().target_extent(gbuffer, 0), Some((32, 16)));
    Ok(())
}

#[test]
fn destroy_releases_every_target() -> anyhow::Result<()> {
    let f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let gbuffer = f.renderer.targets().gbuffer;
    let device = f.renderer.destroy();
    assert_eq!(device.target_extent(gbuffer, 0), None);
    assert!(device.target_extent(f.front, 0).is_some(), "caller-owned targets survive");
    Ok(())
}

// ============================================================================
// Statistics & materials
// ============================================================================

#[test]
fn draw_calls_count_visible_submeshes_only() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let data = create_box(1.0, 1.0, 1.0);
    let device = f.renderer.device_mut();
    let mesh = device.upload_mesh(data.clone());
    let material = device.upload_material(MaterialParams::default());

    let parts = vec![
        Submesh::new("left", mesh, &data).with_transform(Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))),
        Submesh::new("right", mesh, &data).with_transform(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
        // Far behind the camera.
        Submesh::new("behind", mesh, &data).with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0))),
    ];
    let model = Arc::new(Model::new(parts));
    let materials = Arc::new(
        MaterialTable::new()
            .with("left", material)
            .with("right", material)
            .with("behind", material),
    );

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    assert!(f.renderer.submit_static(&model, &materials, Mat4::IDENTITY, 0, false));
    f.renderer.submit_static(&model, &materials, Mat4::from_translation(Vec3::Y * 0.5), 1, false);
    f.renderer.end(f.front)?;

    assert_eq!(f.renderer.stats().draw_calls, 4, "2 submissions x 2 visible submeshes");
    let drawn = f
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DrawMesh { program: MeshProgram::GBuffer { .. }, .. }))
        .count();
    assert_eq!(drawn, 4);
    Ok(())
}

#[test]
fn submesh_without_material_is_skipped() -> anyhow::Result<()> {
    init_logger();
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let no_materials = Arc::new(MaterialTable::new());
    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    assert!(f.renderer.submit_static(&f.cube, &no_materials, Mat4::IDENTITY, 0, false));
    f.renderer.end(f.front)?;
    assert_eq!(f.renderer.stats().draw_calls, 0);
    assert_eq!(f.renderer.stats().frame_index, 1, "the frame still completes");
    Ok(())
}

#[test]
fn skinned_submissions_draw_with_bone_palette() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let data = create_box(1.0, 1.0, 1.0).with_single_joint(0);
    let device = f.renderer.device_mut();
    let mesh = device.upload_mesh(data.clone());
    let material = device.upload_material(MaterialParams::default());
    let model = Arc::new(Model::new(vec![Submesh::new("arm", mesh, &data)]));
    let materials = Arc::new(MaterialTable::new().with("arm", material));
    let pose = AnimationPose::Skinned(Arc::from(vec![Mat4::from_rotation_y(0.5)]));

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    assert!(f.renderer.submit_skinned(&model, pose, &materials, Mat4::IDENTITY, 3, false));
    f.renderer
        .submit_light(&Light::new_directional(Vec3::ONE, 1.0, Vec3::NEG_Y), &Mat4::IDENTITY);
    f.renderer.end(f.front)?;

    assert_eq!(f.renderer.stats().draw_calls, 1);
    let skinned_draws = f
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DrawMesh { skinned: true, .. }))
        .count();
    assert_eq!(skinned_draws, 2, "geometry draw plus one cascade");
    Ok(())
}

#[test]
fn rigid_pose_moves_submesh_out_of_view() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let nodes = [("cube".to_string(), Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)))]
        .into_iter()
        .collect();
    let pose = AnimationPose::Rigid(Arc::new(nodes));

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_skinned(&f.cube, pose, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer.end(f.front)?;
    assert_eq!(f.renderer.stats().draw_calls, 0, "animated node sits behind the camera");
    Ok(())
}

// ============================================================================
// Overlays
// ============================================================================

#[test]
fn outline_drawn_only_for_selected_submissions() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;

    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer.end(f.front)?;
    assert!(!f.commands().iter().any(|c| is_fullscreen(c, "outline")));

    f.renderer.device_mut().clear_commands();
    f.renderer.begin(WIDTH, HEIGHT, &camera())?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, true);
    f.renderer.end(f.front)?;
    assert!(f.commands().iter().any(|c| is_fullscreen(c, "outline")));

    // Pixels just outside the cube silhouette take the outline colour.
    let cam = camera();
    let (edge_x, edge_y) = pixel_of(&cam, Vec3::new(1.0, 0.0, 1.0));
    let outside = f.pixel(edge_x + 1, edge_y);
    let color = f.renderer.settings().post.outline_color;
    assert!(outside.x >= color[0] - TOLERANCE, "outline colour added next to the selection, got {outside}");
    Ok(())
}

fn editor_texel(f: &Fixture, x: u32, y: u32) -> Vec4 {
    let gbuffer_target = f.renderer.targets().gbuffer;
    f.renderer
        .device()
        .read_pixel(ImageRef::color(gbuffer_target, gbuffer::EDITOR), x, y)
        .unwrap_or(Vec4::splat(f32::NAN))
}

#[test]
fn editor_attachment_stores_selection_and_id() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let cam = camera();
    let (x, y) = pixel_of(&cam, Vec3::new(0.0, 0.0, 1.0));

    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 7, true);
    f.renderer.end(f.front)?;
    assert_eq!(editor_texel(&f, x, y), Vec4::new(1.0, 8.0, 0.0, 0.0), "mask 1, id + 1");
    assert_eq!(editor_texel(&f, 0, 0), Vec4::ZERO, "background has no entity");

    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, 0, false);
    f.renderer.end(f.front)?;
    assert_eq!(editor_texel(&f, x, y), Vec4::new(0.0, 1.0, 0.0, 0.0), "id 0 is distinct from no entity");
    Ok(())
}

#[test]
fn largest_entity_id_renders_and_stays_selectable() -> anyhow::Result<()> {
    let mut f = Fixture::new(deterministic_settings(), Vec3::ONE)?;
    let cam = camera();
    let (x, y) = pixel_of(&cam, Vec3::new(0.0, 0.0, 1.0));

    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer.submit_static(&f.cube, &f.materials, Mat4::IDENTITY, u32::MAX, true);
    f.renderer.end(f.front)?;

    let texel = editor_texel(&f, x, y);
    assert_eq!(texel.x, 1.0);
    assert!(texel.y > 0.0, "id must not wrap to the empty id, got {texel}");
    assert!(f.commands().iter().any(|c| is_fullscreen(c, "outline")));
    Ok(())
}

#[test]
fn grid_overlay_follows_setting() -> anyhow::Result<()> {
    let mut settings = deterministic_settings();
    settings.post.draw_grid = true;
    let mut f = Fixture::new(settings, Vec3::ONE)?;
    let cam = Camera::look_at(Vec3::new(0.0, 3.0, 6.0), Vec3::ZERO, Vec3::Y, 60.0, 1.0, 0.1, 100.0);

    f.renderer.begin(WIDTH, HEIGHT, &cam)?;
    f.renderer.end(f.front)?;
    let cmds = f.commands();
    let composite = position_of(cmds, |c| is_fullscreen(c, "composite"));
    let grid = position_of(cmds, |c| is_fullscreen(c, "grid"));
    assert!(matches!((composite, grid), (Some(c), Some(g)) if c < g), "grid drawn over the composite");
    Ok(())
}
