//! Orbit camera controls.
//!
//! Left drag orbits around the target, right drag pans, the wheel dollies in
//! and out. Input accumulates between frames and is applied by
//! [`OrbitControls::update`].

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::camera::PerspectiveCamera;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle limits in radians, 0 looking straight down.
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    drag: Drag,
    cursor: Option<(f64, f64)>,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
}

impl OrbitControls {
    pub fn new(target: Point3<f32>) -> Self {
        Self {
            target,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            drag: Drag::None,
            cursor: None,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    /// Feeds a window event. Returns whether the controls consumed it.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &PerspectiveCamera, viewport_height: u32) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Drag::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => Drag::Pan,
                    (ElementState::Released, _) => Drag::None,
                    _ => return false,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace((position.x, position.y));
                let Some((x, y)) = previous else {
                    return false;
                };
                let (dx, dy) = ((position.x - x) as f32, (position.y - y) as f32);
                match self.drag {
                    Drag::Rotate => self.rotate_pixels(dx, dy, viewport_height),
                    Drag::Pan => self.pan_pixels(dx, dy, viewport_height, camera),
                    Drag::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 100.0) as f32,
                };
                self.dolly(steps);
                true
            }
            _ => false,
        }
    }

    /// A drag across the full viewport height turns the camera by one full revolution.
    pub fn rotate_pixels(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.delta_theta -= 2.0 * PI * dx / height * self.rotate_speed;
        self.delta_phi -= 2.0 * PI * dy / height * self.rotate_speed;
    }

    /// Moves the target so that the point under the cursor follows it.
    pub fn pan_pixels(&mut self, dx: f32, dy: f32, viewport_height: u32, camera: &PerspectiveCamera) {
        let offset = camera.position - self.target;
        let visible_half_height = offset.magnitude() * (cgmath::Rad::from(camera.fovy).0 / 2.0).tan();
        let per_pixel = 2.0 * visible_half_height / viewport_height.max(1) as f32 * self.pan_speed;

        let forward = -offset.normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);
        self.pan_offset += right * (-dx * per_pixel) + up * (dy * per_pixel);
    }

    /// Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        self.scale *= 0.95f32.powf(self.zoom_speed * steps);
    }

    /// Applies accumulated input to `camera`. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let idle = self.delta_theta == 0.0
            && self.delta_phi == 0.0
            && self.scale == 1.0
            && self.pan_offset.magnitude2() == 0.0;
        if idle {
            return false;
        }

        let offset = camera.position - self.target;
        let radius = offset.magnitude();
        let theta = offset.x.atan2(offset.z) + self.delta_theta;
        let phi = (offset.y / radius.max(EPS)).clamp(-1.0, 1.0).acos() + self.delta_phi;
        let phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset;
        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;

        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        true
    }
}

#[cfg(test)]
mod tests {
    use cgmath::MetricSpace;

    use super::*;
    use crate::config::CameraConfig;

    fn setup() -> (OrbitControls, PerspectiveCamera) {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 800, 600);
        (OrbitControls::new(camera.target), camera)
    }

    #[test]
    fn idle_controls_leave_the_camera_alone() {
        let (mut controls, mut camera) = setup();
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn rotation_keeps_the_distance() {
        let (mut controls, mut camera) = setup();
        let before = camera.position.distance(camera.target);
        controls.rotate_pixels(120.0, 40.0, 600);
        assert!(controls.update(&mut camera));
        assert!((camera.position.distance(camera.target) - before).abs() < 1e-4);
        assert_ne!(camera.position, Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn dolly_moves_towards_the_target() {
        let (mut controls, mut camera) = setup();
        let before = camera.position.distance(camera.target);
        controls.dolly(2.0);
        controls.update(&mut camera);
        let after = camera.position.distance(camera.target);
        assert!((after - before * 0.95f32.powi(2)).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let (mut controls, mut camera) = setup();
        controls.rotate_pixels(0.0, 10_000.0, 600);
        controls.update(&mut camera);
        assert!(camera.position.y > 0.0);
        assert!(camera.position.x.abs() + camera.position.z.abs() > 0.0);
    }

    #[test]
    fn panning_moves_target_and_camera_together() {
        let (mut controls, mut camera) = setup();
        let offset = camera.position - camera.target;
        controls.pan_pixels(50.0, 0.0, 600, &camera);
        controls.update(&mut camera);
        assert_ne!(camera.target, Point3::new(0.0, 0.0, 0.0));
        let moved = camera.position - camera.target;
        assert!((moved - offset).magnitude() < 1e-4);
    }
}
