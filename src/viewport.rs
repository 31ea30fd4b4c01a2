//! Keeps camera, renderer and post-processing in step with the window size.

use crate::camera::PerspectiveCamera;

/// Something that owns pixel-sized resources.
pub trait Resizable {
    fn resize(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResizeHandler {
    last: Option<(u32, u32)>,
}

impl ResizeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new drawable size. Zero sizes (minimised windows) are ignored
    /// so that the three never disagree. Returns whether anything changed.
    pub fn resize(
        &mut self,
        camera: &mut PerspectiveCamera,
        renderer: &mut dyn Resizable,
        composer: &mut dyn Resizable,
        width: u32,
        height: u32,
    ) -> bool {
        if width == 0 || height == 0 {
            log::debug!("ignoring resize to {width}x{height}");
            return false;
        }
        camera.aspect = width as f32 / height as f32;
        camera.update_projection_matrix();
        renderer.resize(width, height);
        composer.resize(width, height);
        self.last = Some((width, height));
        true
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    #[derive(Default)]
    struct Target(u32, u32);

    impl Resizable for Target {
        fn resize(&mut self, width: u32, height: u32) {
            *self = Target(width, height);
        }

        fn size(&self) -> (u32, u32) {
            (self.0, self.1)
        }
    }

    #[test]
    fn resize_updates_all_three() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 800, 600);
        let (mut renderer, mut composer) = (Target::default(), Target::default());
        assert!(ResizeHandler::new().resize(&mut camera, &mut renderer, &mut composer, 1280, 720));
        assert_eq!(camera.aspect, 1280.0 / 720.0);
        assert_eq!(renderer.size(), (1280, 720));
        assert_eq!(composer.size(), (1280, 720));
    }

    #[test]
    fn zero_sizes_are_ignored() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 800, 600);
        let (mut renderer, mut composer) = (Target(800, 600), Target(800, 600));
        let mut handler = ResizeHandler::new();
        assert!(!handler.resize(&mut camera, &mut renderer, &mut composer, 0, 600));
        assert!(!handler.resize(&mut camera, &mut renderer, &mut composer, 800, 0));
        assert_eq!(camera.aspect, 800.0 / 600.0);
        assert_eq!(renderer.size(), (800, 600));
        assert_eq!(handler.last_size(), None);
    }
}
