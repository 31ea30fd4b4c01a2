//! CPU-side mesh geometry.

use cgmath::{InnerSpace, Matrix, SquareMatrix, Transform as _};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    // xyz tangent, w handedness of the bitangent
    pub tangent: [f32; 4],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// A `width` x `height` plane in the XY plane facing +Z, centred on the origin.
    /// UVs run from (0, 0) at the top left to (1, 1) at the bottom right.
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        let corner = |x: f32, y: f32, u: f32, v: f32| ModelVertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coords: [u, v],
            tangent: [1.0, 0.0, 0.0, 1.0],
        };
        Self {
            vertices: vec![
                corner(-hw, hh, 0.0, 0.0),
                corner(-hw, -hh, 0.0, 1.0),
                corner(hw, -hh, 1.0, 1.0),
                corner(hw, hh, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Bakes `matrix` into positions, normals and tangents.
    pub fn apply_matrix(&mut self, matrix: cgmath::Matrix4<f32>) -> &mut Self {
        let normal_matrix = matrix
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(cgmath::Matrix4::identity);
        for vertex in &mut self.vertices {
            let position = matrix.transform_point(vertex.position.into());
            vertex.position = position.into();
            let normal = normal_matrix.transform_vector(vertex.normal.into());
            vertex.normal = normal.normalize().into();
            let tangent = cgmath::Vector3::new(vertex.tangent[0], vertex.tangent[1], vertex.tangent[2]);
            let tangent = matrix.transform_vector(tangent).normalize();
            vertex.tangent = [tangent.x, tangent.y, tangent.z, vertex.tangent[3]];
        }
        self
    }

    pub fn rotate_x(&mut self, angle: cgmath::Rad<f32>) -> &mut Self {
        self.apply_matrix(cgmath::Matrix4::from_angle_x(angle))
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.apply_matrix(cgmath::Matrix4::from_translation(cgmath::Vector3::new(x, y, z)))
    }

    /// Generates per-vertex tangents from positions and UVs, averaging over
    /// adjacent triangles. Used when a glTF primitive ships without tangents.
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        let mut bitangents = tangents.clone();
        for c in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
            let (v0, v1, v2) = (self.vertices[i0], self.vertices[i1], self.vertices[i2]);
            let pos0: cgmath::Vector3<f32> = v0.position.into();
            let delta_pos1 = cgmath::Vector3::from(v1.position) - pos0;
            let delta_pos2 = cgmath::Vector3::from(v2.position) - pos0;
            let uv0: cgmath::Vector2<f32> = v0.tex_coords.into();
            let delta_uv1 = cgmath::Vector2::from(v1.tex_coords) - uv0;
            let delta_uv2 = cgmath::Vector2::from(v2.tex_coords) - uv0;
            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
            let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * r;
            for i in [i0, i1, i2] {
                tangents[i] += tangent;
                bitangents[i] += bitangent;
            }
        }
        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            let normal: cgmath::Vector3<f32> = vertex.normal.into();
            let t = tangents[i];
            if t.magnitude2() < f32::EPSILON {
                vertex.tangent = [1.0, 0.0, 0.0, 1.0];
                continue;
            }
            // Gram-Schmidt against the normal
            let t = (t - normal * normal.dot(t)).normalize();
            let handedness = if normal.cross(t).dot(bitangents[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            vertex.tangent = [t.x, t.y, t.z, handedness];
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Rad;

    use super::*;

    #[test]
    fn ground_plane_lies_flat_at_offset() {
        let mut plane = Geometry::plane(10.0, 10.0);
        plane
            .rotate_x(Rad(-std::f32::consts::FRAC_PI_2))
            .translate(0.0, -1.0, 0.0);
        for vertex in &plane.vertices {
            assert!((vertex.position[1] + 1.0).abs() < 1e-5);
            assert!((vertex.normal[1] - 1.0).abs() < 1e-5);
            assert!(vertex.position[0].abs() <= 5.0 + 1e-5);
        }
    }

    #[test]
    fn tangents_follow_u_direction() {
        let mut plane = Geometry::plane(2.0, 2.0);
        plane.vertices.iter_mut().for_each(|v| v.tangent = [0.0; 4]);
        plane.compute_tangents();
        for vertex in &plane.vertices {
            assert!((vertex.tangent[0] - 1.0).abs() < 1e-5);
            assert_eq!(vertex.tangent[3].abs(), 1.0);
        }
    }
}
