//! Materials attached to meshes.
//!
//! The set of material kinds is closed: glTF PBR materials decode to
//! [`StandardMaterial`], unlit ones to [`BasicMaterial`], and procedural
//! surfaces are described by a [`NodeMaterial`] expression graph.

pub mod node;
pub mod standard;

pub use node::{NodeMaterial, ShaderNode, Uniform};
pub use standard::{BasicMaterial, StandardMaterial};

#[derive(Clone, Debug)]
pub enum Material {
    Standard(StandardMaterial),
    Basic(BasicMaterial),
    Node(NodeMaterial),
}

impl Material {
    pub fn is_standard(&self) -> bool {
        matches!(self, Material::Standard(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Material::Standard(_) => "standard",
            Material::Basic(_) => "basic",
            Material::Node(_) => "node",
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Standard(StandardMaterial::default())
    }
}
