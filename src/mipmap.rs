//! Roughness mipmapping.
//!
//! Plain box-filtered mip levels make shiny, bumpy surfaces sparkle at a
//! distance: the normal-map detail averages away but the roughness stays the
//! same. [`RoughnessMipmapper`] folds the variance of the averaged normals
//! into the roughness channel of every level (Toksvig's approximation), so
//! lower mips look rougher instead of smoother.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::{
    data_structures::scene_graph::Node,
    material::{Material, StandardMaterial},
};

pub trait MipmapGenerator {
    /// Regenerates the roughness mip chain of `material`. Returns whether it did.
    fn generate_mipmaps(&mut self, material: &mut StandardMaterial) -> bool;
}

/// Runs `generator` on every standard material below `root`, in pre-order.
/// Other material kinds are left untouched. Returns the number of materials
/// that received a new mip chain.
pub fn generate_roughness_mipmaps(root: &mut Node, generator: &mut dyn MipmapGenerator) -> usize {
    let mut generated = 0;
    root.traverse_mut(&mut |node| {
        if let Some(mesh) = node.as_mesh_mut() {
            if let Material::Standard(material) = &mut mesh.material {
                if generator.generate_mipmaps(material) {
                    generated += 1;
                }
            }
        }
    });
    generated
}

#[derive(Debug, Default)]
pub struct RoughnessMipmapper;

impl RoughnessMipmapper {
    pub fn new() -> Self {
        Self
    }
}

impl MipmapGenerator for RoughnessMipmapper {
    fn generate_mipmaps(&mut self, material: &mut StandardMaterial) -> bool {
        if material.roughness_mipmaps.is_some() {
            return false;
        }
        let (roughness_map, normal_map) = match (
            material.metallic_roughness_texture.as_deref(),
            material.normal_texture.as_deref(),
        ) {
            (None, None) => return false,
            (roughness, normal) => (roughness, normal),
        };

        let size = roughness_map
            .iter()
            .chain(normal_map.iter())
            .map(|image| image.width().max(image.height()))
            .max()
            .unwrap_or(1);
        if !size.is_power_of_two() {
            log::warn!(
                "skipping roughness mipmaps for {}: size {size} is not a power of two",
                material.name
            );
            return false;
        }

        // without a map, the material factor becomes a uniform map and the factor 1
        let base = match roughness_map {
            Some(image) => resample(image, size),
            None => {
                let g = (material.roughness.clamp(0.0, 1.0) * 255.0).round() as u8;
                let b = (material.metallic.clamp(0.0, 1.0) * 255.0).round() as u8;
                material.roughness = 1.0;
                material.metallic = 1.0;
                RgbaImage::from_pixel(size, size, Rgba([0, g, b, 255]))
            }
        };
        let normals = match normal_map {
            Some(image) => decode_normals(&resample(image, size)),
            None => vec![[0.0, 0.0, 1.0]; (size * size) as usize],
        };

        let chain = build_chain(base, normals, size);
        if material.metallic_roughness_texture.is_none() {
            material.metallic_roughness_texture = chain.first().cloned().map(Arc::new);
        }
        material.roughness_mipmaps = Some(chain);
        true
    }
}

fn build_chain(base: RgbaImage, normals: Vec<[f32; 3]>, size: u32) -> Vec<RgbaImage> {
    let mut chain = vec![base.clone()];
    let mut channels: Vec<[f32; 4]> = base.pixels().map(|p| p.0.map(|c| c as f32 / 255.0)).collect();
    let mut normals = normals;
    let mut level_size = size;

    while level_size > 1 {
        let next = level_size / 2;
        channels = downsample(&channels, level_size);
        normals = downsample(&normals, level_size);
        level_size = next;

        let mut image = RgbaImage::new(level_size, level_size);
        for (i, pixel) in image.pixels_mut().enumerate() {
            let [r, g, b, a] = channels[i];
            let roughness = (g * g + toksvig_variance(normals[i])).sqrt().min(1.0);
            *pixel = Rgba([r, roughness, b, a].map(|c| (c * 255.0).round() as u8));
        }
        chain.push(image);
    }
    chain
}

/// Variance of the normal distribution implied by the length of an averaged unit normal.
fn toksvig_variance(n: [f32; 3]) -> f32 {
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt().clamp(1e-4, 1.0);
    (1.0 - len) / len
}

/// 2x2 box filter of a square `size` x `size` grid.
fn downsample<const N: usize>(texels: &[[f32; N]], size: u32) -> Vec<[f32; N]> {
    let half = size / 2;
    let mut out = Vec::with_capacity((half * half) as usize);
    for y in 0..half {
        for x in 0..half {
            let at = |dx: u32, dy: u32| texels[((2 * y + dy) * size + 2 * x + dx) as usize];
            let quad = [at(0, 0), at(1, 0), at(0, 1), at(1, 1)];
            out.push(std::array::from_fn(|c| quad.iter().map(|t| t[c]).sum::<f32>() / 4.0));
        }
    }
    out
}

fn resample(image: &RgbaImage, size: u32) -> RgbaImage {
    if image.dimensions() == (size, size) {
        return image.clone();
    }
    image::imageops::resize(image, size, size, image::imageops::FilterType::Nearest)
}

fn decode_normals(image: &RgbaImage) -> Vec<[f32; 3]> {
    image
        .pixels()
        .map(|p| {
            let n = [0, 1, 2].map(|c| p.0[c] as f32 / 255.0 * 2.0 - 1.0);
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt().max(1e-6);
            n.map(|c| c / len)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::geometry::Geometry,
        material::{BasicMaterial, NodeMaterial},
    };

    fn checker_normals(size: u32) -> RgbaImage {
        // alternating tilted normals that cancel out when averaged
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([218, 128, 218, 255])
            } else {
                Rgba([37, 128, 218, 255])
            }
        })
    }

    fn bumpy_material() -> StandardMaterial {
        StandardMaterial {
            roughness: 1.0,
            metallic_roughness_texture: Some(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 25, 0, 255])))),
            normal_texture: Some(Arc::new(checker_normals(4))),
            ..StandardMaterial::default()
        }
    }

    #[test]
    fn variance_makes_lower_levels_rougher() {
        let mut material = bumpy_material();
        assert!(RoughnessMipmapper::new().generate_mipmaps(&mut material));
        let chain = material.roughness_mipmaps.unwrap();
        let sizes: Vec<_> = chain.iter().map(|level| level.width()).collect();
        assert_eq!(sizes, [4, 2, 1]);
        assert_eq!(chain[0].get_pixel(0, 0).0[1], 25);
        assert!(chain[1].get_pixel(0, 0).0[1] > 25);
    }

    #[test]
    fn flat_normals_keep_roughness() {
        let mut material = StandardMaterial {
            metallic_roughness_texture: Some(Arc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 100, 50, 255])))),
            ..StandardMaterial::default()
        };
        RoughnessMipmapper::new().generate_mipmaps(&mut material);
        let chain = material.roughness_mipmaps.unwrap();
        assert_eq!(chain[2].get_pixel(0, 0).0, [0, 100, 50, 255]);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut material = bumpy_material();
        let mut mipmapper = RoughnessMipmapper::new();
        assert!(mipmapper.generate_mipmaps(&mut material));
        assert!(!mipmapper.generate_mipmaps(&mut material));
    }

    #[test]
    fn npot_textures_are_skipped() {
        let mut material = StandardMaterial {
            normal_texture: Some(Arc::new(checker_normals(3))),
            ..StandardMaterial::default()
        };
        assert!(!RoughnessMipmapper::new().generate_mipmaps(&mut material));
        assert!(material.roughness_mipmaps.is_none());
    }

    #[test]
    fn only_standard_materials_are_visited() {
        struct Counting(Vec<String>);
        impl MipmapGenerator for Counting {
            fn generate_mipmaps(&mut self, material: &mut StandardMaterial) -> bool {
                self.0.push(material.name.clone());
                true
            }
        }

        let mut root = Node::group("root");
        let standard = StandardMaterial {
            name: "standard".to_string(),
            ..StandardMaterial::default()
        };
        root.add_child(Node::mesh("a", Geometry::default(), Material::Standard(standard)));
        root.add_child(Node::mesh("b", Geometry::default(), Material::Basic(BasicMaterial::default())));
        root.add_child(Node::mesh("c", Geometry::default(), Material::Node(NodeMaterial::default())));

        let mut counting = Counting(Vec::new());
        assert_eq!(generate_roughness_mipmaps(&mut root, &mut counting), 1);
        assert_eq!(counting.0, ["standard"]);
    }
}
