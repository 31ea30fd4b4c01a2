use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};

use crate::config::CameraConfig;

/// wgpu clip space has z in [0, 1]; cgmath produces OpenGL's [-1, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A perspective camera looking from `position` at `target`.
///
/// Changing `aspect`, `fovy`, `near` or `far` has no effect on
/// [`projection`](Self::projection) until
/// [`update_projection_matrix`](Self::update_projection_matrix) is called.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: cgmath::Deg<f32>,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4<f32>,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, width: u32, height: u32) -> Self {
        let mut camera = Self {
            position: config.position,
            target: config.target,
            up: Vector3::unit_y(),
            fovy: cgmath::Deg(config.fovy_degrees),
            aspect: aspect_ratio(width, height),
            near: config.near,
            far: config.far,
            projection: Matrix4::identity(),
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view()
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    // rotation-only inverse, for turning clip positions into view directions
    inv_view_proj_dir: [[f32; 4]; 4],
    position: [f32; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Matrix4::identity().into(),
            inv_view_proj_dir: Matrix4::identity().into(),
            position: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        self.view_proj = camera.view_projection().into();
        let mut rotation = camera.view();
        rotation.w = cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        self.inv_view_proj_dir = (camera.projection() * rotation)
            .invert()
            .unwrap_or_else(Matrix4::identity)
            .into();
        self.position = camera.position.to_homogeneous().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{EuclideanSpace, Transform};

    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(&CameraConfig::default(), 800, 600)
    }

    #[test]
    fn starts_from_the_configured_viewpoint() {
        let camera = camera();
        assert_eq!(camera.position, Point3::new(5.0, 5.0, 5.0));
        assert_eq!(camera.target, Point3::origin());
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn target_projects_to_the_screen_centre() {
        let camera = camera();
        let clip = camera.view_projection().transform_point(camera.target);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn projection_changes_only_on_update() {
        let mut camera = camera();
        let before = camera.projection();
        camera.aspect = 2.0;
        assert_eq!(camera.projection(), before);
        camera.update_projection_matrix();
        assert_ne!(camera.projection(), before);
    }
}
