//! Node transforms.
//!
//! A [`Transform`] is the local position, rotation and scale of a scene node
//! relative to its parent. World matrices are the product of the local
//! matrices from the root downwards; position, rotation and scale are not
//! closed under that product once a parent scales non-uniformly.

use cgmath::{Matrix, One, SquareMatrix};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// The identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position(position: cgmath::Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<gltf::scene::Transform> for Transform {
    fn from(transform: gltf::scene::Transform) -> Self {
        let (translation, rotation, scale) = transform.decomposed();
        Self {
            position: translation.into(),
            // glTF stores quaternions as [x, y, z, w]
            rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        }
    }
}

/**
 * Matrices as the shaders see them: the world matrix and the inverse-transpose
 * used for normals (padded to a mat4 for uniform alignment).
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl ObjectUniform {
    pub fn from_world(world: cgmath::Matrix4<f32>) -> Self {
        let normal = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(cgmath::Matrix4::identity);
        Self {
            model: world.into(),
            normal: normal.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Point3, Rotation3, Transform as _, Vector3};

    use super::*;

    #[test]
    fn matrix_scales_then_rotates_then_translates() {
        let transform = Transform {
            position: Vector3::new(1.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::from_angle_y(Deg(90.0)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let moved = transform.to_matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        // (1,0,0) scaled by 2 and rotated 90° around y lands on (0,0,-2)
        assert!((moved.x - 1.0).abs() < 1e-5);
        assert!(moved.y.abs() < 1e-5);
        assert!((moved.z + 2.0).abs() < 1e-5);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let world = Transform {
            scale: Vector3::new(4.0, 1.0, 1.0),
            ..Transform::new()
        }
        .to_matrix();
        let uniform = ObjectUniform::from_world(world);
        assert_eq!(uniform.normal[0][0], 0.25);
        assert_eq!(uniform.normal[1][1], 1.0);
    }
}
