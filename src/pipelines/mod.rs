//! Render pipelines of the viewer.
//!
//! Scene pipelines share bind group 0 (camera, tone mapping globals and the
//! environment cube map, see [`mk_globals_layout`]) and bind group 1 (the
//! per-object matrices, see [`mk_object_layout`]). Group 2 is material
//! specific.

pub mod background;
pub mod basic;
pub mod ground;
pub mod standard;

use basic::{sampler_entry, texture_entry, uniform_entry};

pub const COMMON_WGSL: &str = include_str!("common.wgsl");
pub const MESH_WGSL: &str = include_str!("mesh.wgsl");

pub fn mk_globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            texture_entry(
                2,
                wgpu::TextureViewDimension::Cube,
                wgpu::TextureSampleType::Float { filterable: true },
            ),
            sampler_entry(3),
        ],
        label: Some("globals_bind_group_layout"),
    })
}

pub fn mk_object_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        label: Some("object_bind_group_layout"),
    })
}
