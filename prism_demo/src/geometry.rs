//! Procedural meshes for the demo scene

use std::f32::consts::TAU;

use prism_engine::foundation::math::Vec3;
use prism_engine::render::backends::vulkan::{MeshData, Vertex};

/// Radius and height pairs from the rim down to the base at y = 0 (-Y is up)
const VASE_PROFILE: [(f32, f32); 9] = [
    (0.10, -0.85),
    (0.12, -0.75),
    (0.09, -0.65),
    (0.12, -0.50),
    (0.20, -0.40),
    (0.24, -0.27),
    (0.22, -0.13),
    (0.15, -0.03),
    (0.10, 0.00),
];

/// Whether adjacent faces share normals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// One normal per face
    Flat,
    /// Normals follow the profile
    Smooth,
}

/// A vase made by revolving a fixed profile
pub fn vase(segments: u32, shading: Shading, color: [f32; 3]) -> MeshData {
    lathe(&VASE_PROFILE, segments, shading, color)
}

/// Revolve `profile` around the Y axis
pub fn lathe(profile: &[(f32, f32)], segments: u32, shading: Shading, color: [f32; 3]) -> MeshData {
    let segments = segments.max(3);
    let rows = profile.len();
    if rows < 2 {
        return MeshData::new(Vec::new(), Vec::new());
    }

    let point = |row: usize, segment: u32| -> Vec3 {
        let (radius, y) = profile[row];
        let angle = TAU * segment as f32 / segments as f32;
        Vec3::new(radius * angle.cos(), y, radius * angle.sin())
    };
    let uv = |row: usize, segment: u32| [segment as f32 / segments as f32, row as f32 / (rows - 1) as f32];

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    match shading {
        Shading::Smooth => {
            for row in 0..rows {
                let (dr, dy) = profile_slope(profile, row);
                for segment in 0..=segments {
                    let p = point(row, segment);
                    let angle = TAU * segment as f32 / segments as f32;
                    let normal = Vec3::new(dy * angle.cos(), -dr, dy * angle.sin()).normalize();
                    vertices.push(vertex(p, color, normal, uv(row, segment)));
                }
            }
            let stride = segments + 1;
            for row in 0..rows as u32 - 1 {
                for segment in 0..segments {
                    let a = row * stride + segment;
                    let b = a + stride;
                    indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
                }
            }
        }
        Shading::Flat => {
            for row in 0..rows - 1 {
                for segment in 0..segments {
                    let corners = [
                        (row, segment),
                        (row + 1, segment),
                        (row, segment + 1),
                        (row + 1, segment + 1),
                    ];
                    let [p0, p1, p2, _] = corners.map(|(r, s)| point(r, s));
                    let normal = face_normal(p0, p1, p2);
                    let base = vertices.len() as u32;
                    for (r, s) in corners {
                        vertices.push(vertex(point(r, s), color, normal, uv(r, s)));
                    }
                    indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
                }
            }
        }
    }

    MeshData::new(vertices, indices)
}

/// Unit cube centred on the origin with one color per face
pub fn cube() -> MeshData {
    // (normal, tangent u, tangent v, color)
    let faces: [([f32; 3], [f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.9, 0.9, 0.9]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.8, 0.8, 0.1]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.9, 0.6, 0.1]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.8, 0.1, 0.1]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.1, 0.8]),
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.8, 0.1]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v, color) in faces {
        let n = Vec3::from(normal);
        let (u, v) = (Vec3::from(u), Vec3::from(v));
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            let p = (n + u * su + v * sv) * 0.5;
            vertices.push(vertex(p, color, n, [(su + 1.0) * 0.5, (sv + 1.0) * 0.5]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    MeshData::new(vertices, indices)
}

/// Square in the XZ plane facing up (-Y)
pub fn floor_quad() -> MeshData {
    let normal = Vec3::new(0.0, -1.0, 0.0);
    let color = [0.8, 0.8, 0.8];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];
    let vertices = corners
        .iter()
        .map(|&(x, z)| vertex(Vec3::new(x, 0.0, z), color, normal, [(x + 1.0) * 0.5, (z + 1.0) * 0.5]))
        .collect();
    MeshData::new(vertices, vec![0, 1, 2, 2, 1, 3])
}

fn vertex(position: Vec3, color: [f32; 3], normal: Vec3, uv: [f32; 2]) -> Vertex {
    Vertex {
        position: position.into(),
        color,
        normal: normal.into(),
        uv,
    }
}

fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let normal = (b - a).cross(&(c - a));
    let length = normal.norm();
    if length > f32::EPSILON {
        normal / length
    } else {
        Vec3::new(0.0, -1.0, 0.0)
    }
}

fn profile_slope(profile: &[(f32, f32)], row: usize) -> (f32, f32) {
    let prev = profile[row.saturating_sub(1)];
    let next = profile[(row + 1).min(profile.len() - 1)];
    let (dr, dy) = (next.0 - prev.0, next.1 - prev.1);
    // Outward radial component must stay positive
    if dy < 0.0 {
        (-dr, -dy)
    } else {
        (dr, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_meshes_are_valid() {
        for mesh in [
            vase(16, Shading::Smooth, [1.0; 3]),
            vase(16, Shading::Flat, [1.0; 3]),
            cube(),
            floor_quad(),
        ] {
            assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn test_cube_counts_and_unit_normals() {
        let mesh = cube();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for v in &mesh.vertices {
            let n = Vec3::from(v.normal);
            assert!((n.norm() - 1.0).abs() < 1e-6);
            assert!(v.position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn test_smooth_lathe_normals_point_outward() {
        let mesh = vase(8, Shading::Smooth, [1.0; 3]);
        let rows = VASE_PROFILE.len();
        assert_eq!(mesh.vertices.len(), rows * 9);
        for v in &mesh.vertices {
            let radial = Vec3::new(v.position[0], 0.0, v.position[2]);
            let normal = Vec3::from(v.normal);
            assert!(radial.dot(&normal) >= -1e-6);
        }
    }

    #[test]
    fn test_degenerate_profile_gives_empty_mesh() {
        let mesh = lathe(&[(1.0, 0.0)], 8, Shading::Flat, [1.0; 3]);
        assert!(mesh.vertices.is_empty());
        assert!(mesh.validate().is_err());
    }
}
