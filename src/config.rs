//! Viewer configuration.
//!
//! Every constant the viewer relies on lives in [`ViewerConfig`]. The defaults
//! reproduce the stock scene (Suzanne on a checkered ground under an HDR sky);
//! builder-style setters allow overriding single values.

use cgmath::Point3;

/// Tone mapping operator applied when shading lit surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToneMapping {
    None,
    AcesFilmic,
}

impl ToneMapping {
    pub(crate) fn shader_id(self) -> f32 {
        match self {
            ToneMapping::None => 0.0,
            ToneMapping::AcesFilmic => 1.0,
        }
    }
}

/// Perspective camera setup.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 50.0,
            near: 1.0 / 32.0,
            far: 2000.0,
            position: Point3::new(5.0, 5.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

/// Screen-space ambient occlusion parameters.
///
/// `min_distance` and `max_distance` are expressed in normalized
/// near/far depth, `kernel_radius` in scene units.
#[derive(Clone, Debug)]
pub struct SsaoConfig {
    pub kernel_radius: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub kernel_size: usize,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_radius: 0.2,
            min_distance: 0.000034,
            max_distance: 0.1,
            kernel_size: 32,
        }
    }
}

/// A bounded numeric control as shown in the control panel.
#[derive(Clone, Debug)]
pub struct ControlRange {
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// Ground plane geometry and its two controls.
#[derive(Clone, Debug)]
pub struct GroundConfig {
    pub width: f32,
    pub depth: f32,
    pub base_offset: f32,
    pub color: u32,
    pub environment_intensity: f32,
    pub uv_scale: ControlRange,
    pub offset_y: ControlRange,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            width: 10.0,
            depth: 10.0,
            base_offset: -1.0,
            color: 0xaaaaaa,
            environment_intensity: 1.0,
            uv_scale: ControlRange {
                initial: 6.0,
                min: 1.0,
                max: 32.0,
                step: 1.0,
            },
            offset_y: ControlRange {
                initial: 0.0,
                min: -1.0,
                max: 1.0,
                step: 0.01,
            },
        }
    }
}

/// Environment map prefiltering parameters.
#[derive(Clone, Debug)]
pub struct EnvironmentConfig {
    pub face_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            face_size: 128,
            mip_levels: 6,
            sample_count: 32,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// Directory (native) or path below the page origin (web) that asset paths are relative to.
    pub asset_root: String,
    pub environment_map: String,
    pub model: String,
    /// Id of the canvas element the viewer attaches to on the web.
    pub canvas_id: String,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub clear_colour: wgpu::Color,
    pub camera: CameraConfig,
    pub ssao: SsaoConfig,
    pub ground: GroundConfig,
    pub environment: EnvironmentConfig,
    /// How often the performance overlay text is refreshed.
    pub stats_interval_millis: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: "res".to_string(),
            environment_map: "bg.hdr".to_string(),
            model: "Suzanne.glb".to_string(),
            canvas_id: "canvas".to_string(),
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 0.8,
            clear_colour: wgpu::Color::BLACK,
            camera: CameraConfig::default(),
            ssao: SsaoConfig::default(),
            ground: GroundConfig::default(),
            environment: EnvironmentConfig::default(),
            stats_interval_millis: 500,
        }
    }
}

impl ViewerConfig {
    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_environment_map(mut self, path: impl Into<String>) -> Self {
        self.environment_map = path.into();
        self
    }

    pub fn with_model(mut self, path: impl Into<String>) -> Self {
        self.model = path.into();
        self
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_tone_mapping(mut self, tone_mapping: ToneMapping) -> Self {
        self.tone_mapping = tone_mapping;
        self
    }

    pub fn with_ssao(mut self, ssao: SsaoConfig) -> Self {
        self.ssao = ssao;
        self
    }

    /// Overrides asset paths from `SCENE_VIEWER_ENV_MAP`, `SCENE_VIEWER_MODEL` and
    /// `SCENE_VIEWER_ASSET_ROOT` when they are set.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = std::env::var("SCENE_VIEWER_ASSET_ROOT") {
            config.asset_root = root;
        }
        if let Ok(env_map) = std::env::var("SCENE_VIEWER_ENV_MAP") {
            config.environment_map = env_map;
        }
        if let Ok(model) = std::env::var("SCENE_VIEWER_MODEL") {
            config.model = model;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_scene() {
        let config = ViewerConfig::default();
        assert_eq!(config.environment_map, "bg.hdr");
        assert_eq!(config.model, "Suzanne.glb");
        assert_eq!(config.exposure, 0.8);
        assert_eq!(config.tone_mapping, ToneMapping::AcesFilmic);
        assert_eq!(config.ssao.kernel_radius, 0.2);
        assert_eq!(config.ssao.min_distance, 0.000034);
        assert_eq!(config.camera.fovy_degrees, 50.0);
        assert_eq!(config.camera.near, 0.03125);
        assert_eq!(config.ground.uv_scale.initial, 6.0);
        assert_eq!(config.ground.offset_y.step, 0.01);
    }

    #[test]
    fn builders_override_single_values() {
        let config = ViewerConfig::default()
            .with_model("Box.glb")
            .with_exposure(1.5)
            .with_tone_mapping(ToneMapping::None);
        assert_eq!(config.model, "Box.glb");
        assert_eq!(config.exposure, 1.5);
        assert_eq!(config.tone_mapping, ToneMapping::None);
        assert_eq!(config.environment_map, "bg.hdr");
    }
}
