use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        texture::Texture,
    },
    pipelines::{
        COMMON_WGSL, MESH_WGSL,
        basic::{DepthMode, mk_pipeline_layout, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry},
    },
};

/// Group 2 of the standard shader: material uniform, base colour,
/// metallic-roughness and normal maps, one sampler.
pub fn mk_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let map = |binding| {
        texture_entry(
            binding,
            wgpu::TextureViewDimension::D2,
            wgpu::TextureSampleType::Float { filterable: true },
        )
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
            map(1),
            map(2),
            map(3),
            sampler_entry(4),
        ],
        label: Some("standard_material_bind_group_layout"),
    })
}

/// Draws both standard and unlit materials; the uniform's unlit flag picks the path.
pub fn mk_standard_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    object_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = mk_pipeline_layout(
        device,
        "Standard Pipeline Layout",
        &[globals_layout, object_layout, material_layout],
    );
    let source = [COMMON_WGSL, MESH_WGSL, include_str!("standard.wgsl")].join("\n");
    mk_render_pipeline(
        device,
        "Standard Pipeline",
        &layout,
        color_format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some((Texture::DEPTH_FORMAT, DepthMode::OPAQUE)),
        Some(wgpu::Face::Back),
        &[ModelVertex::desc()],
        wgpu::ShaderModuleDescriptor {
            label: Some("Standard Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        },
    )
}
