//! scene-viewer
//!
//! A small cross-platform scene viewer: a glTF model and a checkered ground
//! plane lit by a prefiltered HDR environment, with screen-space ambient
//! occlusion, orbit controls and a panel of live parameters. Runs natively
//! and in the browser (WebGL 2).
//!
//! High-level modules
//! - `app`: winit event loop glue and the [`run`] entry point
//! - `assembler`: loads the assets and builds the scene and its controls
//! - `camera` and `controls`: perspective camera and orbit controls
//! - `context`: window surface, device and queue
//! - `data_structures`: scene graph, geometry, transforms and textures
//! - `gui`: the control panel and its keyboard and DOM front-ends
//! - `ibl`: PMREM prefiltering of environment maps
//! - `material`: standard, basic and node-graph materials
//! - `pipelines`: WGSL shaders and render pipelines
//! - `postprocessing`: effect composer and the SSAO pass
//! - `render_loop`, `sync` and `stats`: the per-frame sequence
//! - `resources`: HDR and glTF loading
//!

pub mod app;
pub mod assembler;
pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod error;
pub mod gui;
pub mod ibl;
pub mod material;
pub mod mipmap;
pub mod pipelines;
pub mod postprocessing;
pub mod render_loop;
pub mod renderer;
pub mod resources;
pub mod stats;
pub mod sync;
pub mod viewer;
pub mod viewport;

pub use app::run;
pub use config::ViewerConfig;
pub use error::{SetupError, SetupResult};
pub use viewer::Viewer;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
