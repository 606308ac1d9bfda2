use glam::{Vec3, Vec4};

use super::bounds::AxisAlignedBox;

/// CPU-side triangle mesh as produced by the asset collaborator.
///
/// Skinned meshes carry four joint indices and weights per vertex, indexing
/// the bone palette supplied by the animation collaborator.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<Vec4>>,
}

impl MeshData {
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    #[must_use]
    pub fn bounds(&self) -> AxisAlignedBox {
        AxisAlignedBox::from_points(self.positions.iter().copied())
    }

    #[inline]
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.joints.is_some() && self.weights.is_some()
    }

    /// Binds every vertex fully to `joint`.
    #[must_use]
    pub fn with_single_joint(mut self, joint: u16) -> Self {
        let n = self.positions.len();
        self.joints = Some(vec![[joint, 0, 0, 0]; n]);
        self.weights = Some(vec![Vec4::X; n]);
        self
    }
}

/// Axis-aligned box centered at the origin, 24 vertices (4 per face).
#[must_use]
pub fn create_box(width: f32, height: f32, depth: f32) -> MeshData {
    let w = width / 2.0;
    let h = height / 2.0;
    let d = depth / 2.0;

    let faces: [(Vec3, [[f32; 3]; 4]); 6] = [
        // Front (+Z)
        (Vec3::Z, [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]]),
        // Back (-Z)
        (Vec3::NEG_Z, [[-w, -h, -d], [-w, h, -d], [w, h, -d], [w, -h, -d]]),
        // Top (+Y)
        (Vec3::Y, [[-w, h, -d], [-w, h, d], [w, h, d], [w, h, -d]]),
        // Bottom (-Y)
        (Vec3::NEG_Y, [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]]),
        // Right (+X)
        (Vec3::X, [[w, -h, -d], [w, h, -d], [w, h, d], [w, -h, d]]),
        // Left (-X)
        (Vec3::NEG_X, [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]]),
    ];

    let mut mesh = MeshData::default();
    for (normal, quad) in faces {
        for p in quad {
            mesh.positions.push(Vec3::from_array(p));
            mesh.normals.push(normal);
        }
    }

    // Counter-clockwise: 0, 1, 2,  0, 2, 3
    mesh.indices = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect();
    mesh
}
