//! Software Render Device
//!
//! [`SoftwareDevice`] executes the pipeline's commands on the CPU. It is a
//! reference implementation of [`RenderDevice`]: slow, but every draw and
//! dispatch produces real pixels that tests can read back with
//! [`SoftwareDevice::read_pixel`].
//!
//! Besides pixels it records:
//!
//! - a command trace ([`SoftwareDevice::commands`]) for checking stage order;
//! - read-after-write hazards ([`SoftwareDevice::hazards`]): an image written
//!   by a compute dispatch and read again before a [`MemoryBarrier`] that
//!   makes the write visible to that kind of read.
//!
//! Textures are single constant texels, enough for IBL and skybox inputs.

mod compute;
mod image;
mod raster;
mod shading;

use glam::{Vec3, Vec4};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::renderer::device::{
    Attachment, ComputeDispatch, FullscreenDraw, ImageRef, MemoryBarrier, MeshDraw, MeshProgram, RenderDevice,
    TargetDesc, TargetId, TargetStatus, mip_extent,
};
use crate::resources::{MaterialHandle, MeshData, MeshHandle, TextureHandle};
use image::{Level, SoftImage};

/// Surface parameters written into the G-buffer by a mesh draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub occlusion: f32,
    pub emissive: Vec3,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            metallic: 0.0,
            roughness: 0.5,
            occlusion: 1.0,
            emissive: Vec3::ZERO,
        }
    }
}

impl MaterialParams {
    #[must_use]
    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    #[must_use]
    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }
}

/// One entry of the command trace.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateTarget { id: TargetId, label: &'static str },
    ResizeTarget { id: TargetId, width: u32, height: u32 },
    DestroyTarget { id: TargetId },
    Clear { target: TargetId },
    BlitDepth { source: TargetId, dest: TargetId },
    DrawMesh { target: TargetId, program: MeshProgram, mesh: MeshHandle, skinned: bool },
    DrawFullscreen { target: TargetId, program: &'static str, blended: bool, depth_tested: bool },
    Dispatch { program: &'static str, dest: ImageRef, groups: [u32; 3] },
    Barrier(MemoryBarrier),
}

/// A read of `image` by `program` before the compute write to it was made
/// visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
    pub program: &'static str,
    pub image: ImageRef,
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug)]
pub(crate) struct SoftTarget {
    pub desc: TargetDesc,
    pub color: SmallVec<[SoftImage; 4]>,
    pub depth: Option<SoftImage>,
}

impl SoftTarget {
    fn allocate(desc: TargetDesc) -> Self {
        let color = desc
            .color
            .iter()
            .map(|&format| SoftImage::new(format, desc.width, desc.height, desc.mip_levels))
            .collect();
        let depth = desc.depth.map(|format| SoftImage::new(format, desc.width, desc.height, 1));
        Self { desc, color, depth }
    }

    fn image(&self, attachment: Attachment) -> Option<&SoftImage> {
        match attachment {
            Attachment::Color(i) => self.color.get(usize::from(i)),
            Attachment::Depth => self.depth.as_ref(),
        }
    }

    fn image_mut(&mut self, attachment: Attachment) -> Option<&mut SoftImage> {
        match attachment {
            Attachment::Color(i) => self.color.get_mut(usize::from(i)),
            Attachment::Depth => self.depth.as_mut(),
        }
    }

    /// Size of colour (or depth) mip 0.
    fn extent(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }
}

/// Everything a program may read.
#[derive(Debug, Default)]
pub(crate) struct Resources {
    pub targets: SlotMap<TargetId, SoftTarget>,
    pub meshes: SlotMap<MeshHandle, MeshData>,
    pub materials: SlotMap<MaterialHandle, MaterialParams>,
    pub textures: SlotMap<TextureHandle, Vec4>,
}

impl Resources {
    pub fn level(&self, image: ImageRef) -> Option<&Level> {
        self.targets.get(image.target)?.image(image.attachment)?.level(image.mip)
    }

    /// Constant value of `texture`; unknown handles read as black.
    pub fn texture(&self, texture: TextureHandle) -> Vec4 {
        self.textures.get(texture).copied().unwrap_or(Vec4::ZERO)
    }
}

#[allow(clippy::float_cmp)]
fn compare(function: wgpu::CompareFunction, fragment: f32, stored: f32) -> bool {
    use wgpu::CompareFunction as C;
    match function {
        C::Never => false,
        C::Less => fragment < stored,
        C::Equal => fragment == stored,
        C::LessEqual => fragment <= stored,
        C::Greater => fragment > stored,
        C::NotEqual => fragment != stored,
        C::GreaterEqual => fragment >= stored,
        _ => true,
    }
}

fn blend_factor(factor: wgpu::BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    use wgpu::BlendFactor as F;
    match factor {
        F::Zero => Vec4::ZERO,
        F::Src => src,
        F::OneMinusSrc => Vec4::ONE - src,
        F::SrcAlpha => Vec4::splat(src.w),
        F::OneMinusSrcAlpha => Vec4::splat(1.0 - src.w),
        F::Dst => dst,
        F::OneMinusDst => Vec4::ONE - dst,
        F::DstAlpha => Vec4::splat(dst.w),
        F::OneMinusDstAlpha => Vec4::splat(1.0 - dst.w),
        _ => Vec4::ONE,
    }
}

fn blend_component(component: wgpu::BlendComponent, src: Vec4, dst: Vec4) -> Vec4 {
    use wgpu::BlendOperation as Op;
    let s = src * blend_factor(component.src_factor, src, dst);
    let d = dst * blend_factor(component.dst_factor, src, dst);
    match component.operation {
        Op::Add => s + d,
        Op::Subtract => s - d,
        Op::ReverseSubtract => d - s,
        Op::Min => src.min(dst),
        _ => src.max(dst),
    }
}

fn blend(state: wgpu::BlendState, src: Vec4, dst: Vec4) -> Vec4 {
    let color = blend_component(state.color, src, dst);
    let alpha = blend_component(state.alpha, src, dst);
    color.truncate().extend(alpha.w)
}

// ============================================================================
// SoftwareDevice
// ============================================================================

#[derive(Debug, Default)]
pub struct SoftwareDevice {
    resources: Resources,
    commands: Vec<DeviceCommand>,
    /// Compute-written images and the barrier bits issued since the write.
    pending: FxHashMap<ImageRef, MemoryBarrier>,
    hazards: Vec<Hazard>,
}

impl SoftwareDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_mesh(&mut self, mesh: MeshData) -> MeshHandle {
        self.resources.meshes.insert(mesh)
    }

    pub fn upload_material(&mut self, material: MaterialParams) -> MaterialHandle {
        self.resources.materials.insert(material)
    }

    /// A texture whose every texel is `value`.
    pub fn upload_texture(&mut self, value: Vec4) -> TextureHandle {
        self.resources.textures.insert(value)
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    #[inline]
    #[must_use]
    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    #[must_use]
    pub fn target_desc(&self, id: TargetId) -> Option<&TargetDesc> {
        self.resources.targets.get(id).map(|t| &t.desc)
    }

    /// Reads back one texel; `None` when the image or texel does not exist.
    #[must_use]
    pub fn read_pixel(&self, image: ImageRef, x: u32, y: u32) -> Option<Vec4> {
        let level = self.resources.level(image)?;
        (x < level.width && y < level.height).then(|| level.load(x, y))
    }

    fn check_reads(&mut self, program: &'static str, reads: &[ImageRef], needs: MemoryBarrier) {
        for &image in reads {
            if let Some(visible) = self.pending.get(&image)
                && !visible.contains(needs)
            {
                log::warn!("{program} reads {image:?} before a memory barrier");
                self.hazards.push(Hazard { program, image });
            }
        }
    }

    fn level_mut(&mut self, image: ImageRef) -> Option<&mut Level> {
        self.resources
            .targets
            .get_mut(image.target)?
            .image_mut(image.attachment)?
            .level_mut(image.mip)
    }
}

impl RenderDevice for SoftwareDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> TargetId {
        let id = self.resources.targets.insert(SoftTarget::allocate(desc.clone()));
        self.commands.push(DeviceCommand::CreateTarget { id, label: desc.label });
        id
    }

    fn resize_target(&mut self, id: TargetId, width: u32, height: u32) {
        let Some(target) = self.resources.targets.get_mut(id) else {
            return;
        };
        let mut desc = target.desc.clone();
        desc.width = width;
        desc.height = height;
        *target = SoftTarget::allocate(desc);
        self.pending.retain(|image, _| image.target != id);
        self.commands.push(DeviceCommand::ResizeTarget { id, width, height });
    }

    fn destroy_target(&mut self, id: TargetId) {
        if self.resources.targets.remove(id).is_some() {
            self.pending.retain(|image, _| image.target != id);
            self.commands.push(DeviceCommand::DestroyTarget { id });
        }
    }

    fn target_status(&self, id: TargetId) -> TargetStatus {
        match self.resources.targets.get(id) {
            None => TargetStatus::Incomplete("target does not exist"),
            Some(t) if t.color.is_empty() && t.depth.is_none() => TargetStatus::Incomplete("no attachments"),
            Some(t) if t.desc.width == 0 || t.desc.height == 0 => TargetStatus::Incomplete("zero-sized attachment"),
            Some(_) => TargetStatus::Complete,
        }
    }

    fn target_extent(&self, id: TargetId, mip: u32) -> Option<(u32, u32)> {
        let target = self.resources.targets.get(id)?;
        (mip < target.desc.mip_levels)
            .then(|| (mip_extent(target.desc.width, mip), mip_extent(target.desc.height, mip)))
    }

    fn clear(&mut self, id: TargetId, color: [f32; 4], depth: Option<f32>) {
        let Some(target) = self.resources.targets.get_mut(id) else {
            return;
        };
        let value = Vec4::from_array(color);
        for image in &mut target.color {
            if let Some(level) = image.level_mut(0) {
                level.fill(value);
            }
        }
        if let (Some(d), Some(image)) = (depth, target.depth.as_mut())
            && let Some(level) = image.level_mut(0)
        {
            level.fill(Vec4::splat(d));
        }
        self.commands.push(DeviceCommand::Clear { target: id });
    }

    fn blit_depth(&mut self, source: TargetId, dest: TargetId) {
        let Some(depth) = self.resources.level(ImageRef::depth(source)).cloned() else {
            return;
        };
        match self.level_mut(ImageRef::depth(dest)) {
            Some(level) if level.width == depth.width && level.height == depth.height => *level = depth,
            Some(_) => log::warn!("blit_depth: size mismatch between {source:?} and {dest:?}"),
            None => return,
        }
        self.commands.push(DeviceCommand::BlitDepth { source, dest });
    }

    fn draw_mesh(&mut self, draw: &MeshDraw<'_>) {
        self.commands.push(DeviceCommand::DrawMesh {
            target: draw.target,
            program: draw.program,
            mesh: draw.mesh,
            skinned: draw.bones.is_some(),
        });

        let resources = &self.resources;
        let (Some(mesh), Some(target)) = (resources.meshes.get(draw.mesh), resources.targets.get(draw.target)) else {
            log::debug!("draw_mesh: unknown mesh or target; skipped");
            return;
        };
        let material = match draw.program {
            MeshProgram::GBuffer { material } => match resources.materials.get(material) {
                Some(m) => Some(*m),
                None => {
                    log::debug!("draw_mesh: unknown material; skipped");
                    return;
                }
            },
            MeshProgram::ShadowCaster => None,
        };

        let (width, height) = target.extent();
        let mut fragments = Vec::new();
        raster::rasterize(
            mesh,
            &draw.model.model,
            &draw.view_projection,
            draw.bones,
            width,
            height,
            |f| fragments.push(f),
        );

        let Some(target) = self.resources.targets.get_mut(draw.target) else {
            return;
        };
        for f in fragments {
            if let Some(depth) = target.depth.as_mut().and_then(|d| d.level_mut(0)) {
                if f.depth >= depth.load(f.x, f.y).x {
                    continue;
                }
                depth.store(f.x, f.y, Vec4::splat(f.depth));
            }

            let outputs: SmallVec<[Vec4; 4]> = match material {
                Some(m) => SmallVec::from_buf([
                    f.normal.extend(m.roughness),
                    m.albedo.extend(m.metallic),
                    m.emissive.extend(m.occlusion),
                    draw.model.selection,
                ]),
                None => SmallVec::from_slice(&[Vec4::new(f.depth, f.depth * f.depth, 0.0, 0.0)]),
            };
            for (image, value) in target.color.iter_mut().zip(outputs) {
                if let Some(level) = image.level_mut(0) {
                    level.store(f.x, f.y, value);
                }
            }
        }
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) {
        let name = draw.program.name();
        self.commands.push(DeviceCommand::DrawFullscreen {
            target: draw.target,
            program: name,
            blended: draw.blend.is_some(),
            depth_tested: draw.depth_compare.is_some(),
        });
        self.check_reads(name, &draw.program.reads(), MemoryBarrier::TEXTURE_FETCH);

        let Some((width, height)) = self.resources.targets.get(draw.target).map(SoftTarget::extent) else {
            return;
        };
        let shaded = shading::shade(&self.resources, &draw.program, width, height);

        let Some(target) = self.resources.targets.get_mut(draw.target) else {
            return;
        };
        let depth = target.depth.as_ref().and_then(|d| d.level(0)).cloned();
        let Some(color) = target.color.first_mut().and_then(|c| c.level_mut(0)) else {
            return;
        };
        for y in 0..height {
            for x in 0..width {
                let Some(src) = shaded[(y * width + x) as usize] else {
                    continue;
                };
                if let (Some(function), Some(depth)) = (draw.depth_compare, depth.as_ref())
                    && !compare(function, shading::FULLSCREEN_DEPTH, depth.load(x, y).x)
                {
                    continue;
                }
                let value = match draw.blend {
                    Some(state) => blend(state, src, color.load(x, y)),
                    None => src,
                };
                color.store(x, y, value);
            }
        }
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch<'_>) {
        let program = &dispatch.program;
        let dest = program.writes();
        self.commands.push(DeviceCommand::Dispatch {
            program: program.name(),
            dest,
            groups: dispatch.groups,
        });
        self.check_reads(program.name(), &program.reads(), MemoryBarrier::SHADER_IMAGE_ACCESS);

        if dispatch.groups.contains(&0) {
            return;
        }
        let Some(texels) = compute::run(&self.resources, program) else {
            log::debug!("{}: missing input or output image; skipped", program.name());
            return;
        };
        if let Some(level) = self.level_mut(dest) {
            let width = level.width;
            for (i, value) in texels.into_iter().enumerate() {
                let i = i as u32;
                level.store(i % width, i / width, value);
            }
        }
        self.pending.insert(dest, MemoryBarrier::empty());
    }

    fn memory_barrier(&mut self, barrier: MemoryBarrier) {
        self.commands.push(DeviceCommand::Barrier(barrier));
        for visible in self.pending.values_mut() {
            *visible |= barrier;
        }
        self.pending
            .retain(|_, visible| !visible.contains(MemoryBarrier::SHADER_IMAGE_ACCESS | MemoryBarrier::TEXTURE_FETCH));
    }
}
