#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    scene_viewer::run(scene_viewer::ViewerConfig::from_env())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
