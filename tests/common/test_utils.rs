use std::{cell::RefCell, sync::Arc};

use image::{Rgba, RgbaImage};
use scene_viewer::{
    assembler::AssetSource,
    config::{EnvironmentConfig, ViewerConfig},
    data_structures::{
        geometry::Geometry,
        scene_graph::{Node, SceneFragment},
    },
    material::{BasicMaterial, Material, StandardMaterial},
    resources::hdr::HdrImage,
};

/// In-memory assets. Records the order in which they were requested.
pub(crate) struct FakeAssets {
    pub(crate) fail_environment: bool,
    pub(crate) fail_model: bool,
    pub(crate) requests: RefCell<Vec<String>>,
}

impl FakeAssets {
    pub(crate) fn new() -> Self {
        Self {
            fail_environment: false,
            fail_model: false,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl AssetSource for FakeAssets {
    async fn load_environment(&self, path: &str) -> anyhow::Result<HdrImage> {
        self.requests.borrow_mut().push(path.to_string());
        if self.fail_environment {
            anyhow::bail!("404 Not Found");
        }
        HdrImage::new(4, 2, vec![[0.5, 0.6, 0.7]; 8])
    }

    async fn load_model(&self, path: &str) -> anyhow::Result<SceneFragment> {
        self.requests.borrow_mut().push(path.to_string());
        if self.fail_model {
            anyhow::bail!("truncated GLB");
        }
        Ok(model())
    }
}

/// Two top-level meshes, the first with a nested child.
///
/// ```text
/// model
/// ├── body (standard, 4x4 metallic-roughness map)
/// │   └── eye (standard, no maps)
/// └── label (basic)
/// ```
pub(crate) fn model() -> SceneFragment {
    let mut body = Node::mesh(
        "body",
        Geometry::plane(1.0, 1.0),
        Material::Standard(StandardMaterial {
            name: "body".to_string(),
            metallic_roughness_texture: Some(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 128, 0, 255])))),
            ..Default::default()
        }),
    );
    body.add_child(Node::mesh(
        "eye",
        Geometry::plane(0.1, 0.1),
        Material::Standard(StandardMaterial::default()),
    ));
    let label = Node::mesh(
        "label",
        Geometry::plane(1.0, 0.2),
        Material::Basic(BasicMaterial {
            texture: Some(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))),
            ..Default::default()
        }),
    );

    let mut root = Node::group("model.glb");
    root.add_child(body);
    root.add_child(label);
    SceneFragment::new(root)
}

/// The stock configuration with a small environment so that prefiltering stays fast.
pub(crate) fn test_config() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.environment = EnvironmentConfig {
        face_size: 8,
        mip_levels: 3,
        sample_count: 4,
    };
    config
}

/// Builds a binary glTF from a JSON document and its binary chunk.
pub(crate) fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

/// One triangle in the XY plane, counter-clockwise seen from +Z.
pub(crate) fn triangle_positions() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// A document with one buffer, one position accessor and whatever meshes,
/// materials and extensions the caller adds.
pub(crate) fn triangle_document(meshes: &str, materials: &str, extensions: &str) -> String {
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  {extensions}
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "name": "triangle", "mesh": 0 }}],
  "meshes": {meshes},
  "materials": {materials},
  "buffers": [{{ "byteLength": 36 }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "accessors": [{{
    "bufferView": 0,
    "componentType": 5126,
    "count": 3,
    "type": "VEC3",
    "min": [0.0, 0.0, 0.0],
    "max": [1.0, 1.0, 0.0]
  }}]
}}"#
    )
}
