// src/geometry.rs
// CPU-side mesh data and the procedural volume shells the fire and ash shaders draw on.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Interleaved vertex shared by loaded and generated meshes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Bake `matrix` into positions and normals.
    pub fn apply_matrix(&mut self, matrix: Mat4) {
        let normal_matrix = matrix.inverse().transpose();
        for v in &mut self.vertices {
            v.position = matrix.transform_point3(Vec3::from(v.position)).to_array();
            v.normal = normal_matrix
                .transform_vector3(Vec3::from(v.normal))
                .normalize_or_zero()
                .to_array();
        }
    }

    /// Axis-aligned bounds `(min, max)`, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from(self.vertices.first()?.position);
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            let p = Vec3::from(v.position);
            (lo.min(p), hi.max(p))
        }))
    }
}

/// Open tapered cylinder spanning `theta_length` radians, centred on the origin along Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderShell {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub radial_segments: u32,
    pub height_segments: u32,
    pub theta_start: f32,
    pub theta_length: f32,
}

impl CylinderShell {
    /// `(radial + 1) × (height + 1)` vertices, two triangles per quad, no caps.
    /// `u` runs along the arc, `v` is 1 at the top edge and 0 at the bottom.
    pub fn build(&self) -> MeshData {
        let radial = self.radial_segments.max(1);
        let rows = self.height_segments.max(1);
        let half_height = self.height * 0.5;
        // a flat shell gets horizontal normals
        let slope = if self.height.abs() > f32::EPSILON {
            (self.radius_bottom - self.radius_top) / self.height
        } else {
            0.0
        };

        let mut vertices = Vec::with_capacity(((radial + 1) * (rows + 1)) as usize);
        for y in 0..=rows {
            let v = y as f32 / rows as f32;
            let radius = v * (self.radius_bottom - self.radius_top) + self.radius_top;
            for x in 0..=radial {
                let u = x as f32 / radial as f32;
                let theta = u * self.theta_length + self.theta_start;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let normal = Vec3::new(sin_theta, slope, cos_theta).normalize();
                vertices.push(Vertex {
                    position: [radius * sin_theta, -v * self.height + half_height, radius * cos_theta],
                    normal: normal.to_array(),
                    uv: [u, 1.0 - v],
                });
            }
        }

        let stride = radial + 1;
        let mut indices = Vec::with_capacity((radial * rows * 6) as usize);
        for x in 0..radial {
            for y in 0..rows {
                let a = y * stride + x;
                let b = (y + 1) * stride + x;
                let c = (y + 1) * stride + x + 1;
                let d = y * stride + x + 1;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        MeshData { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn half_shell() -> CylinderShell {
        CylinderShell {
            radius_top: 0.03,
            radius_bottom: 0.2,
            height: 0.35,
            radial_segments: 15,
            height_segments: 15,
            theta_start: -FRAC_PI_2,
            theta_length: PI,
        }
    }

    #[test]
    fn vertex_and_index_counts() {
        let mesh = half_shell().build();
        assert_eq!(mesh.vertices.len(), 16 * 16);
        assert_eq!(mesh.indices.len(), 15 * 15 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn shell_is_open_on_the_back_half() {
        let mesh = half_shell().build();
        // theta in [-pi/2, pi/2] puts every vertex at z >= 0
        assert!(mesh.vertices.iter().all(|v| v.position[2] >= -1e-6));
        let (lo, hi) = mesh.bounds().unwrap();
        assert!((lo.y + 0.175).abs() < 1e-6);
        assert!((hi.y - 0.175).abs() < 1e-6);
        assert!((hi.x - 0.2).abs() < 1e-5);
    }

    #[test]
    fn translation_shifts_the_base() {
        let mut mesh = half_shell().build();
        mesh.apply_matrix(Mat4::from_translation(Vec3::new(0.0, 0.1, 0.0)));
        let (lo, hi) = mesh.bounds().unwrap();
        assert!((lo.y + 0.075).abs() < 1e-6);
        assert!((hi.y - 0.275).abs() < 1e-6);
        // normals untouched by a pure translation
        let n = Vec3::from(mesh.vertices[0].normal);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_height_shell_has_finite_normals() {
        let mesh = CylinderShell { height: 0.0, ..half_shell() }.build();
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.normal.iter().all(|c| c.is_finite()) && v.position.iter().all(|c| c.is_finite())));
        assert!(mesh.vertices.iter().all(|v| v.normal[1] == 0.0));
    }

    #[test]
    fn straight_cylinder_normals_are_horizontal() {
        let mesh = CylinderShell { radius_top: 0.15, radius_bottom: 0.15, height: 0.4, ..half_shell() }
            .build();
        assert!(mesh.vertices.iter().all(|v| v.normal[1].abs() < 1e-6));
        assert_eq!(mesh.vertices[0].uv, [0.0, 1.0]);
    }
}
