use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        texture::Texture,
    },
    material::NodeMaterial,
    pipelines::{
        COMMON_WGSL, MESH_WGSL,
        basic::{DepthMode, mk_pipeline_layout, mk_render_pipeline, uniform_entry},
    },
};

/// Group 2 of a node material: the packed values of its uniforms.
pub fn mk_node_params_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        label: Some("node_params_bind_group_layout"),
    })
}

/// Full shader source for `material`: shared bindings, the generated node
/// functions and the node-material fragment stage.
pub fn node_shader_source(material: &NodeMaterial) -> anyhow::Result<String> {
    let nodes = material
        .to_wgsl()
        .map_err(|err| anyhow::anyhow!("node material {}: {err}", material.name))?;
    Ok([COMMON_WGSL, MESH_WGSL, &nodes, include_str!("ground.wgsl")].join("\n"))
}

/// Every node material gets its own pipeline since its shader is generated.
pub fn mk_node_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    object_layout: &wgpu::BindGroupLayout,
    params_layout: &wgpu::BindGroupLayout,
    material: &NodeMaterial,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let source = node_shader_source(material)?;
    log::debug!("generated shader for node material {}:\n{source}", material.name);
    let layout = mk_pipeline_layout(
        device,
        "Node Material Pipeline Layout",
        &[globals_layout, object_layout, params_layout],
    );
    Ok(mk_render_pipeline(
        device,
        &format!("Node Material Pipeline ({})", material.name),
        &layout,
        color_format,
        None,
        Some((Texture::DEPTH_FORMAT, DepthMode::OPAQUE)),
        Some(wgpu::Face::Back),
        &[ModelVertex::desc()],
        wgpu::ShaderModuleDescriptor {
            label: Some("Node Material Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ShaderNode, Uniform};

    #[test]
    fn generated_source_defines_every_node_function_once() {
        let uv_scale = Uniform::new(6.0);
        let material = NodeMaterial {
            roughness: ShaderNode::checker(ShaderNode::multiply(ShaderNode::Uv, ShaderNode::uniform(&uv_scale))),
            ..NodeMaterial::default()
        };
        let source = node_shader_source(&material).unwrap();
        for function in ["node_color", "node_roughness", "node_metalness", "node_environment"] {
            assert_eq!(source.matches(&format!("fn {function}(")).count(), 1, "{function}");
        }
        assert_eq!(source.matches("fn node_checker(").count(), 1);
        assert_eq!(source.matches("struct NodeInputs").count(), 1);
        assert!(source.contains("@group(2) @binding(0) var<uniform> node_params"));
    }

    #[test]
    fn ill_typed_materials_are_rejected() {
        let material = NodeMaterial {
            roughness: ShaderNode::Uv,
            ..NodeMaterial::default()
        };
        assert!(node_shader_source(&material).is_err());
    }
}
