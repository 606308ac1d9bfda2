//! Renderable descriptions handed over by the asset collaborator.
//!
//! The renderer never owns geometry or materials. It sees opaque slotmap
//! handles plus the little metadata culling and statistics need: per-submesh
//! bounds, bind transforms and vertex/index counts.

use std::sync::Arc;

use glam::Mat4;
use rustc_hash::FxHashMap;
use slotmap::new_key_type;

use super::bounds::AxisAlignedBox;
use super::mesh::MeshData;

new_key_type! {
    /// Geometry uploaded to a render device.
    pub struct MeshHandle;
    /// Material parameters uploaded to a render device.
    pub struct MaterialHandle;
    /// Environment or sky texture uploaded to a render device.
    pub struct TextureHandle;
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone)]
pub struct Submesh {
    /// Key into the [`MaterialTable`] and into rigid animation poses.
    pub name: String,
    pub mesh: MeshHandle,
    /// Local bounds, before `transform`.
    pub bounds: AxisAlignedBox,
    /// Bind transform relative to the model root.
    pub transform: Mat4,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl Submesh {
    #[must_use]
    pub fn new(name: impl Into<String>, mesh: MeshHandle, data: &MeshData) -> Self {
        Self {
            name: name.into(),
            mesh,
            bounds: data.bounds(),
            transform: Mat4::IDENTITY,
            vertex_count: data.vertex_count(),
            index_count: data.index_count(),
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// A set of submeshes sharing one world transform.
#[derive(Debug, Clone, Default)]
pub struct Model {
    submeshes: Vec<Submesh>,
    bounds: AxisAlignedBox,
}

impl Model {
    #[must_use]
    pub fn new(submeshes: Vec<Submesh>) -> Self {
        let bounds = submeshes
            .iter()
            .fold(AxisAlignedBox::EMPTY, |acc, s| acc.union(&s.bounds.transformed(&s.transform)));
        Self { submeshes, bounds }
    }

    #[inline]
    #[must_use]
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Union of all submesh bounds in model space.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> &AxisAlignedBox {
        &self.bounds
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Per-model lookup from submesh name to material.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    entries: FxHashMap<String, MaterialHandle>,
}

impl MaterialTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, submesh: impl Into<String>, material: MaterialHandle) {
        self.entries.insert(submesh.into(), material);
    }

    #[must_use]
    pub fn with(mut self, submesh: impl Into<String>, material: MaterialHandle) -> Self {
        self.insert(submesh, material);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, submesh: &str) -> Option<MaterialHandle> {
        self.entries.get(submesh).copied()
    }
}

// ============================================================================
// Animation
// ============================================================================

/// Current pose of an animated model, owned by the animation collaborator.
#[derive(Debug, Clone)]
pub enum AnimationPose {
    /// Bone palette indexed by the mesh joint attributes.
    Skinned(Arc<[Mat4]>),
    /// Animated node transforms for unskinned models, keyed by submesh name.
    Rigid(Arc<FxHashMap<String, Mat4>>),
}

impl AnimationPose {
    /// Model-space transform for `submesh` under this pose.
    ///
    /// Skinned geometry is already posed by the bone palette, so only the
    /// entity transform applies. Rigid poses fall back to the bind transform
    /// for submeshes without an animated node.
    #[must_use]
    pub fn submesh_transform(&self, submesh: &Submesh) -> Mat4 {
        match self {
            Self::Skinned(_) => Mat4::IDENTITY,
            Self::Rigid(nodes) => nodes.get(&submesh.name).copied().unwrap_or(submesh.transform),
        }
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> Option<&[Mat4]> {
        match self {
            Self::Skinned(bones) => Some(bones),
            Self::Rigid(_) => None,
        }
    }
}
