//! Prefiltered mipmapped radiance environment maps.
//!
//! [`PmremGenerator`] turns an equirectangular panorama into a cube map whose
//! mip levels hold the environment convolved with a GGX lobe of increasing
//! roughness: level 0 is a mirror reflection, the last level is fully rough.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3};

use crate::{
    config::EnvironmentConfig,
    material::node::{SlotSampler, TextureSlot},
    resources::hdr::HdrImage,
};

/// One mip level: six square faces, +X, -X, +Y, -Y, +Z, -Z, stored back to back.
#[derive(Clone, Debug)]
pub struct CubeLevel {
    pub size: u32,
    pub texels: Vec<[f32; 3]>,
}

impl CubeLevel {
    fn face(&self, face: usize) -> &[[f32; 3]] {
        let len = (self.size * self.size) as usize;
        &self.texels[face * len..(face + 1) * len]
    }

    /// Nearest-texel lookup in a world direction.
    pub fn sample(&self, direction: Vector3<f32>) -> [f32; 3] {
        let (face, u, v) = direction_to_face(direction);
        let size = self.size as f32;
        let x = ((u * 0.5 + 0.5) * size).clamp(0.0, size - 1.0) as u32;
        let y = ((v * 0.5 + 0.5) * size).clamp(0.0, size - 1.0) as u32;
        self.face(face)[(y * self.size + x) as usize]
    }
}

/// A prefiltered environment cube map, shared by the scene background and
/// every material reflecting it.
#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    levels: Vec<CubeLevel>,
}

impl EnvironmentMap {
    pub fn face_size(&self) -> u32 {
        self.levels.first().map_or(0, |level| level.size)
    }

    pub fn levels(&self) -> &[CubeLevel] {
        &self.levels
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Samples the level matching `roughness`, blending between neighbouring levels.
    pub fn sample(&self, direction: Vector3<f32>, roughness: f32) -> [f32; 3] {
        let max_level = self.levels.len().saturating_sub(1);
        let lod = roughness.clamp(0.0, 1.0) * max_level as f32;
        let (lower, t) = (lod.floor() as usize, lod.fract());
        let a = self.levels[lower].sample(direction);
        if t == 0.0 || lower == max_level {
            return a;
        }
        let b = self.levels[lower + 1].sample(direction);
        std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
    }

    /// Every level packed as RGB9E5, ready for upload.
    pub fn to_rgb9e5_levels(&self) -> Vec<Vec<u32>> {
        self.levels
            .iter()
            .map(|level| level.texels.iter().map(|&rgb| pack_rgb9e5(rgb)).collect())
            .collect()
    }
}

impl SlotSampler for EnvironmentMap {
    fn sample(&self, slot: TextureSlot, direction: [f32; 3], roughness: f32) -> [f32; 3] {
        match slot {
            TextureSlot::Environment => EnvironmentMap::sample(self, direction.into(), roughness),
        }
    }
}

/// Derives [`EnvironmentMap`]s. Consumed by [`PmremGenerator::from_equirect`]
/// so that it cannot outlive the one derivation it is needed for.
pub struct PmremGenerator {
    face_size: u32,
    mip_levels: u32,
    sample_count: u32,
}

impl PmremGenerator {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            face_size: config.face_size.max(1),
            mip_levels: config.mip_levels.clamp(1, config.face_size.max(1).ilog2() + 1),
            sample_count: config.sample_count.max(1),
        }
    }

    pub fn from_equirect(self, image: &HdrImage) -> EnvironmentMap {
        let base = self.project(image);
        let mut levels = Vec::with_capacity(self.mip_levels as usize);
        levels.push(base);
        for mip in 1..self.mip_levels {
            let roughness = mip as f32 / (self.mip_levels - 1) as f32;
            let source = &levels[mip as usize - 1];
            let level = self.convolve(source, (self.face_size >> mip).max(1), roughness);
            levels.push(level);
        }
        log::debug!(
            "prefiltered {}x{} panorama into {} cube levels",
            image.width,
            image.height,
            levels.len()
        );
        EnvironmentMap { levels }
    }

    fn project(&self, image: &HdrImage) -> CubeLevel {
        let size = self.face_size;
        let mut texels = Vec::with_capacity((size * size * 6) as usize);
        for face in 0..6 {
            for y in 0..size {
                for x in 0..size {
                    texels.push(image.sample_direction(texel_to_direction(face, x, y, size)));
                }
            }
        }
        CubeLevel { size, texels }
    }

    fn convolve(&self, source: &CubeLevel, size: u32, roughness: f32) -> CubeLevel {
        let alpha = roughness * roughness;
        let mut texels = Vec::with_capacity((size * size * 6) as usize);
        for face in 0..6 {
            for y in 0..size {
                for x in 0..size {
                    let n = texel_to_direction(face, x, y, size).normalize();
                    texels.push(self.importance_sample(source, n, alpha));
                }
            }
        }
        CubeLevel { size, texels }
    }

    /// GGX importance sampling with view = normal = reflection direction.
    fn importance_sample(&self, source: &CubeLevel, n: Vector3<f32>, alpha: f32) -> [f32; 3] {
        let up = if n.y.abs() < 0.999 {
            Vector3::unit_y()
        } else {
            Vector3::unit_x()
        };
        let tangent = up.cross(n).normalize();
        let bitangent = n.cross(tangent);

        let mut total = [0.0f32; 3];
        let mut weight = 0.0;
        for i in 0..self.sample_count {
            let [xi0, xi1] = hammersley(i, self.sample_count);
            let a2 = alpha * alpha;
            let phi = 2.0 * PI * xi0;
            let cos_theta = ((1.0 - xi1) / (1.0 + (a2 - 1.0) * xi1)).sqrt();
            let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
            let h = (tangent * (phi.cos() * sin_theta) + bitangent * (phi.sin() * sin_theta) + n * cos_theta)
                .normalize();
            let l = (h * (2.0 * n.dot(h)) - n).normalize();
            let n_dot_l = n.dot(l);
            if n_dot_l > 0.0 {
                let sample = source.sample(l);
                for c in 0..3 {
                    total[c] += sample[c] * n_dot_l;
                }
                weight += n_dot_l;
            }
        }
        if weight > 0.0 {
            total.map(|c| c / weight)
        } else {
            source.sample(n)
        }
    }
}

/// Direction through the centre of texel (`x`, `y`) of a cube face.
pub fn texel_to_direction(face: usize, x: u32, y: u32, size: u32) -> Vector3<f32> {
    let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
    let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
    match face {
        0 => Vector3::new(1.0, -v, -u),
        1 => Vector3::new(-1.0, -v, u),
        2 => Vector3::new(u, 1.0, v),
        3 => Vector3::new(u, -1.0, -v),
        4 => Vector3::new(u, -v, 1.0),
        _ => Vector3::new(-u, -v, -1.0),
    }
}

/// Inverse of [`texel_to_direction`]: the face and its [-1, 1] coordinates.
pub fn direction_to_face(d: Vector3<f32>) -> (usize, f32, f32) {
    let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());
    if ax >= ay && ax >= az {
        if d.x > 0.0 {
            (0, -d.z / ax, -d.y / ax)
        } else {
            (1, d.z / ax, -d.y / ax)
        }
    } else if ay >= az {
        if d.y > 0.0 {
            (2, d.x / ay, d.z / ay)
        } else {
            (3, d.x / ay, -d.z / ay)
        }
    } else if d.z > 0.0 {
        (4, d.x / az, -d.y / az)
    } else {
        (5, -d.x / az, -d.y / az)
    }
}

fn hammersley(i: u32, n: u32) -> [f32; 2] {
    [i as f32 / n as f32, i.reverse_bits() as f32 * 2.328_306_4e-10]
}

/// Packs linear RGB into the RGB9E5 shared-exponent format.
pub fn pack_rgb9e5([r, g, b]: [f32; 3]) -> u32 {
    const MANTISSA_BITS: i32 = 9;
    const BIAS: i32 = 15;
    const MAX: f32 = 65408.0;

    let clamp = |c: f32| if c.is_nan() { 0.0 } else { c.clamp(0.0, MAX) };
    let (r, g, b) = (clamp(r), clamp(g), clamp(b));
    let max = r.max(g).max(b);
    let mut exponent = if max > 0.0 {
        (max.log2().floor() as i32).max(-BIAS - 1) + 1 + BIAS
    } else {
        0
    };
    let mut denom = 2f32.powi(exponent - BIAS - MANTISSA_BITS);
    if (max / denom + 0.5).floor() as u32 == 1 << MANTISSA_BITS {
        denom *= 2.0;
        exponent += 1;
    }
    let mantissa = |c: f32| ((c / denom + 0.5).floor() as u32).min(511);
    mantissa(r) | mantissa(g) << 9 | mantissa(b) << 18 | (exponent as u32) << 27
}

pub fn unpack_rgb9e5(packed: u32) -> [f32; 3] {
    let exponent = (packed >> 27) as i32;
    let scale = 2f32.powi(exponent - 15 - 9);
    [
        (packed & 0x1ff) as f32 * scale,
        ((packed >> 9) & 0x1ff) as f32 * scale,
        ((packed >> 18) & 0x1ff) as f32 * scale,
    ]
}
