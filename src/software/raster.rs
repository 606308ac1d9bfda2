//! Triangle rasterization for mesh draws.
//!
//! Pixel-center sampling, both windings accepted (no face culling), no near
//! clipping: triangles with a vertex behind the eye are dropped. Depth is
//! interpolated linearly in screen space; attributes perspective-correctly.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::resources::MeshData;

/// A covered pixel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    pub x: u32,
    pub y: u32,
    /// NDC depth in `[0, 1]`.
    pub depth: f32,
    /// World-space unit normal.
    pub normal: Vec3,
}

struct ClipVertex {
    clip: Vec4,
    normal: Vec3,
}

/// Linear blend skinning matrix for vertex `i`, identity when unskinned.
fn skin_matrix(mesh: &MeshData, bones: Option<&[Mat4]>, i: usize) -> Mat4 {
    let (Some(bones), Some(joints), Some(weights)) = (bones, &mesh.joints, &mesh.weights) else {
        return Mat4::IDENTITY;
    };
    let (Some(joint), Some(weight)) = (joints.get(i), weights.get(i)) else {
        return Mat4::IDENTITY;
    };

    let mut skin = Mat4::ZERO;
    let mut total = 0.0;
    for (k, &j) in joint.iter().enumerate() {
        let w = weight[k];
        if w <= 0.0 {
            continue;
        }
        if let Some(bone) = bones.get(usize::from(j)) {
            skin += *bone * w;
            total += w;
        }
    }
    if total <= 0.0 { Mat4::IDENTITY } else { skin * (1.0 / total) }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Calls `emit` for every pixel of a `width x height` target covered by `mesh`.
pub(crate) fn rasterize(
    mesh: &MeshData,
    model: &Mat4,
    view_projection: &Mat4,
    bones: Option<&[Mat4]>,
    width: u32,
    height: u32,
    mut emit: impl FnMut(Fragment),
) {
    let vertices: Vec<ClipVertex> = mesh
        .positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let world_matrix = *model * skin_matrix(mesh, bones, i);
            let world = world_matrix.transform_point3(p);
            let normal_matrix = Mat3::from_mat4(world_matrix).inverse().transpose();
            let n = mesh.normals.get(i).copied().unwrap_or(Vec3::Y);
            ClipVertex {
                clip: *view_projection * world.extend(1.0),
                normal: (normal_matrix * n).normalize_or_zero(),
            }
        })
        .collect();

    let (w, h) = (width as f32, height as f32);
    for tri in mesh.indices.chunks_exact(3) {
        let Some(v) = [tri[0], tri[1], tri[2]]
            .into_iter()
            .map(|i| vertices.get(i as usize))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        if v.iter().any(|vert| vert.clip.w <= 1e-6) {
            continue;
        }

        let inv_w = [1.0 / v[0].clip.w, 1.0 / v[1].clip.w, 1.0 / v[2].clip.w];
        let ndc: [Vec3; 3] = [0, 1, 2].map(|k| v[k].clip.truncate() * inv_w[k]);
        let screen: [Vec2; 3] = ndc.map(|n| Vec2::new((n.x * 0.5 + 0.5) * w, (0.5 - n.y * 0.5) * h));

        let area = edge(screen[0], screen[1], screen[2]);
        if area.abs() < 1e-12 {
            continue;
        }

        let min = screen[0].min(screen[1]).min(screen[2]).max(Vec2::ZERO);
        let max = screen[0].max(screen[1]).max(screen[2]).min(Vec2::new(w, h));
        if min.x >= max.x || min.y >= max.y {
            continue;
        }

        let (x0, x1) = (min.x.floor() as u32, (max.x.ceil() as u32).min(width));
        let (y0, y1) = (min.y.floor() as u32, (max.y.ceil() as u32).min(height));
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(screen[1], screen[2], p) / area;
                let b1 = edge(screen[2], screen[0], p) / area;
                let b2 = edge(screen[0], screen[1], p) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let depth = b0 * ndc[0].z + b1 * ndc[1].z + b2 * ndc[2].z;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }

                let pw = [b0 * inv_w[0], b1 * inv_w[1], b2 * inv_w[2]];
                let sum = pw[0] + pw[1] + pw[2];
                let normal = (v[0].normal * pw[0] + v[1].normal * pw[1] + v[2].normal * pw[2]) / sum;

                emit(Fragment {
                    x,
                    y,
                    depth,
                    normal: normal.normalize_or_zero(),
                });
            }
        }
    }
}
