use std::sync::Arc;

use image::RgbaImage;

/// Physically based metallic-roughness material, as decoded from glTF.
#[derive(Clone, Debug)]
pub struct StandardMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Arc<RgbaImage>>,
    pub metallic: f32,
    pub roughness: f32,
    /// glTF layout: roughness in G, metallic in B.
    pub metallic_roughness_texture: Option<Arc<RgbaImage>>,
    pub normal_texture: Option<Arc<RgbaImage>>,
    pub emissive: [f32; 3],
    /// Full mip chain of the metallic-roughness texture with normal-map variance folded into
    /// the roughness channel. Level 0 is the original image. `None` until the mipmapper ran.
    pub roughness_mipmaps: Option<Vec<RgbaImage>>,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic: 1.0,
            roughness: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            emissive: [0.0; 3],
            roughness_mipmaps: None,
        }
    }
}

/// Unlit material: the colour is written as-is.
#[derive(Clone, Debug)]
pub struct BasicMaterial {
    pub name: String,
    pub color: [f32; 4],
    pub texture: Option<Arc<RgbaImage>>,
}

impl Default for BasicMaterial {
    fn default() -> Self {
        Self {
            name: "basic".to_string(),
            color: [1.0; 4],
            texture: None,
        }
    }
}

/// Material parameters as laid out in the standard shader's uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 4],
    // x: metallic, y: roughness, z: unlit, w: has normal map
    params: [f32; 4],
}

impl From<&StandardMaterial> for MaterialUniform {
    fn from(material: &StandardMaterial) -> Self {
        let [r, g, b] = material.emissive;
        Self {
            base_color: material.base_color,
            emissive: [r, g, b, 0.0],
            params: [
                material.metallic,
                material.roughness,
                0.0,
                if material.normal_texture.is_some() { 1.0 } else { 0.0 },
            ],
        }
    }
}

impl From<&BasicMaterial> for MaterialUniform {
    fn from(material: &BasicMaterial) -> Self {
        Self {
            base_color: material.color,
            emissive: [0.0; 4],
            params: [0.0, 1.0, 1.0, 0.0],
        }
    }
}
