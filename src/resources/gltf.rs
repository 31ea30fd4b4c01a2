//! glTF 2.0 model loading.
//!
//! Decodes `.glb` and `.gltf` files into a [`SceneFragment`]: a root group
//! holding the nodes of the file's default scene with their meshes and
//! materials. Geometry and textures stay on the CPU; the renderer uploads
//! them when the nodes are first drawn.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, anyhow, bail, ensure};
use image::RgbaImage;

use super::{load_binary, sibling_path};
use crate::{
    data_structures::{
        geometry::{Geometry, ModelVertex},
        scene_graph::{Node, SceneFragment},
        transform::Transform,
    },
    material::{BasicMaterial, Material, StandardMaterial},
};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Loads `file_name` below `asset_root`, together with any buffers and images
/// it references by relative URI.
pub async fn load_gltf(asset_root: &str, file_name: &str) -> anyhow::Result<SceneFragment> {
    let bytes = load_binary(asset_root, file_name).await?;
    let gltf = parse(&bytes).with_context(|| format!("parsing {file_name}"))?;

    let mut external = HashMap::new();
    for uri in external_uris(&gltf)? {
        let path = sibling_path(file_name, uri);
        let data = load_binary(asset_root, &path).await?;
        external.insert(uri.to_string(), data);
    }
    decode(&gltf, file_name, &external)
}

/// Decodes a self-contained model (a `.glb`, or a `.gltf` without external
/// references) from memory.
pub fn from_slice(bytes: &[u8], name: &str) -> anyhow::Result<SceneFragment> {
    let gltf = parse(bytes).with_context(|| format!("parsing {name}"))?;
    decode(&gltf, name, &HashMap::new())
}

fn parse(bytes: &[u8]) -> anyhow::Result<gltf::Gltf> {
    let gltf = gltf::Gltf::from_slice(bytes)?;
    if gltf.extensions_required().any(|ext| ext == DRACO_EXTENSION) {
        bail!("Draco compressed meshes ({DRACO_EXTENSION}) are not supported");
    }
    Ok(gltf)
}

fn external_uris(gltf: &gltf::Gltf) -> anyhow::Result<Vec<&str>> {
    let buffers = gltf.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) => Some(uri),
        gltf::buffer::Source::Bin => None,
    });
    let images = gltf.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri),
        gltf::image::Source::View { .. } => None,
    });
    let mut uris = Vec::new();
    for uri in buffers.chain(images) {
        ensure!(!uri.starts_with("data:"), "embedded data URIs are not supported");
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }
    Ok(uris)
}

fn decode(gltf: &gltf::Gltf, name: &str, external: &HashMap<String, Vec<u8>>) -> anyhow::Result<SceneFragment> {
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf.blob.clone().context("GLB binary chunk is missing")?,
            gltf::buffer::Source::Uri(uri) => external
                .get(uri)
                .cloned()
                .with_context(|| format!("buffer {uri} was not loaded"))?,
        };
        ensure!(
            data.len() >= buffer.length(),
            "buffer {} holds {} bytes, expected {}",
            buffer.index(),
            data.len(),
            buffer.length()
        );
        buffers.push(data);
    }

    let mut images = ImageCache {
        buffers: &buffers,
        external,
        decoded: HashMap::new(),
    };
    let materials = gltf
        .materials()
        .map(|material| convert_material(&material, &mut images))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .context("file contains no scene")?;

    let mut root = Node::group(name);
    for node in scene.nodes() {
        root.add_child(convert_node(&node, &buffers, &materials)?);
    }
    Ok(SceneFragment::new(root))
}

struct ImageCache<'a> {
    buffers: &'a [Vec<u8>],
    external: &'a HashMap<String, Vec<u8>>,
    decoded: HashMap<usize, Arc<RgbaImage>>,
}

impl ImageCache<'_> {
    fn get(&mut self, texture: gltf::Texture) -> anyhow::Result<Arc<RgbaImage>> {
        let image = texture.source();
        if let Some(decoded) = self.decoded.get(&image.index()) {
            return Ok(decoded.clone());
        }

        let (bytes, mime_type) = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &self.buffers[view.buffer().index()];
                let range = view.offset()..view.offset() + view.length();
                let bytes = buffer
                    .get(range)
                    .with_context(|| format!("image {} lies outside its buffer", image.index()))?;
                (bytes, Some(mime_type))
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let bytes = self
                    .external
                    .get(uri)
                    .with_context(|| format!("image {uri} was not loaded"))?;
                (bytes.as_slice(), mime_type)
            }
        };

        let format = mime_type.and_then(image::ImageFormat::from_mime_type);
        let decoded = match format {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .with_context(|| format!("decoding image {}", image.index()))?;
        let decoded = Arc::new(decoded.to_rgba8());
        self.decoded.insert(image.index(), decoded.clone());
        Ok(decoded)
    }
}

fn convert_material(material: &gltf::Material, images: &mut ImageCache) -> anyhow::Result<Material> {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material {}", material.index().unwrap_or_default()));
    let pbr = material.pbr_metallic_roughness();
    let base_color_texture = pbr
        .base_color_texture()
        .map(|info| images.get(info.texture()))
        .transpose()?;

    if material.unlit() {
        return Ok(Material::Basic(BasicMaterial {
            name,
            color: pbr.base_color_factor(),
            texture: base_color_texture,
        }));
    }

    Ok(Material::Standard(StandardMaterial {
        name,
        base_color: pbr.base_color_factor(),
        base_color_texture,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|info| images.get(info.texture()))
            .transpose()?,
        normal_texture: material
            .normal_texture()
            .map(|normal| images.get(normal.texture()))
            .transpose()?,
        emissive: material.emissive_factor(),
        roughness_mipmaps: None,
    }))
}

fn convert_node(node: &gltf::Node, buffers: &[Vec<u8>], materials: &[Material]) -> anyhow::Result<Node> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));

    let mut converted = match node.mesh() {
        Some(mesh) => {
            let mut primitives = Vec::new();
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!(
                        "skipping primitive {} of {name}: {:?} is not supported",
                        primitive.index(),
                        primitive.mode()
                    );
                    continue;
                }
                let geometry = read_geometry(&primitive, buffers)
                    .with_context(|| format!("reading primitive {} of {name}", primitive.index()))?;
                let material = primitive
                    .material()
                    .index()
                    .and_then(|index| materials.get(index).cloned())
                    .unwrap_or_default();
                primitives.push((geometry, material));
            }

            if primitives.len() == 1 {
                let (geometry, material) = primitives.remove(0);
                Node::mesh(name, geometry, material)
            } else {
                let mut group = Node::group(name.clone());
                for (i, (geometry, material)) in primitives.into_iter().enumerate() {
                    group.add_child(Node::mesh(format!("{name} #{i}"), geometry, material));
                }
                group
            }
        }
        None => Node::group(name),
    }
    .with_transform(Transform::from(node.transform()));

    for child in node.children() {
        converted.add_child(convert_node(&child, buffers, materials)?);
    }
    Ok(converted)
}

fn read_geometry(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> anyhow::Result<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("primitive has no positions"))?
        .collect();

    let mut vertices: Vec<ModelVertex> = positions
        .iter()
        .map(|&position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    ensure!(
        indices.iter().all(|&i| (i as usize) < vertices.len()),
        "index out of range"
    );

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices.iter_mut().zip(normals).for_each(|(v, n)| v.normal = n);
            true
        }
        None => false,
    };
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(v, uv)| v.tex_coords = uv);
    }
    let has_tangents = match reader.read_tangents() {
        Some(tangents) => {
            vertices.iter_mut().zip(tangents).for_each(|(v, t)| v.tangent = t);
            true
        }
        None => false,
    };

    let mut geometry = Geometry { vertices, indices };
    if !has_normals {
        compute_normals(&mut geometry);
    }
    if !has_tangents {
        geometry.compute_tangents();
    }
    Ok(geometry)
}

/// Area-weighted smooth normals.
fn compute_normals(geometry: &mut Geometry) {
    use cgmath::{InnerSpace, Vector3};

    let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); geometry.vertices.len()];
    for tri in geometry.indices.chunks_exact(3) {
        let p = |i: u32| Vector3::from(geometry.vertices[i as usize].position);
        let face = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
        for &i in tri {
            normals[i as usize] += face;
        }
    }
    for (vertex, normal) in geometry.vertices.iter_mut().zip(normals) {
        vertex.normal = if normal.magnitude2() > 0.0 {
            normal.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}
