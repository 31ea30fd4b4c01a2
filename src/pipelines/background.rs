use crate::{
    data_structures::texture::Texture,
    pipelines::{
        COMMON_WGSL,
        basic::{DepthMode, mk_pipeline_layout, mk_render_pipeline},
    },
};

/// Skybox drawn from the sharpest level of the prefiltered environment map.
pub fn mk_background_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = mk_pipeline_layout(device, "Background Pipeline Layout", &[globals_layout]);
    let source = [COMMON_WGSL, include_str!("background.wgsl")].join("\n");
    mk_render_pipeline(
        device,
        "Background Pipeline",
        &layout,
        color_format,
        None,
        Some((Texture::DEPTH_FORMAT, DepthMode::BACKGROUND)),
        None,
        &[],
        wgpu::ShaderModuleDescriptor {
            label: Some("Background Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        },
    )
}
