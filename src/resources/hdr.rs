//! Radiance RGBE (`.hdr`) panoramas.

use std::f32::consts::PI;

use anyhow::Context as _;
use cgmath::{InnerSpace, Vector3};

use super::load_binary;

/// An equirectangular HDR image in linear RGB.
#[derive(Clone, Debug)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<[f32; 3]>,
}

impl HdrImage {
    pub fn new(width: u32, height: u32, data: Vec<[f32; 3]>) -> anyhow::Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "empty HDR image");
        anyhow::ensure!(
            data.len() == (width * height) as usize,
            "HDR image has {} pixels, expected {}x{}",
            data.len(),
            width,
            height
        );
        Ok(Self { width, height, data })
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
            .context("decoding Radiance HDR")?;
        let rgb = image.into_rgb32f();
        let (width, height) = rgb.dimensions();
        let data = rgb.pixels().map(|pixel| pixel.0).collect();
        Self::new(width, height, data)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        self.data[(y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize]
    }

    /// Bilinear sample; `u` wraps around horizontally, `v` is clamped.
    pub fn sample_uv(&self, u: f32, v: f32) -> [f32; 3] {
        let x = u.rem_euclid(1.0) * self.width as f32 - 0.5;
        let y = (v.clamp(0.0, 1.0) * self.height as f32 - 0.5).max(0.0);
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let wrap = |x: f32| (x as i64).rem_euclid(self.width as i64) as u32;
        let (x0i, x1i) = (wrap(x0), wrap(x0 + 1.0));
        let (y0i, y1i) = (y0 as u32, y0 as u32 + 1);

        let c00 = self.pixel(x0i, y0i);
        let c10 = self.pixel(x1i, y0i);
        let c01 = self.pixel(x0i, y1i);
        let c11 = self.pixel(x1i, y1i);
        std::array::from_fn(|i| {
            let top = c00[i] + (c10[i] - c00[i]) * fx;
            let bottom = c01[i] + (c11[i] - c01[i]) * fx;
            top + (bottom - top) * fy
        })
    }

    /// Packs the pixels into Radiance shared-exponent bytes, row by row.
    pub fn to_rgbe8(&self) -> Vec<[u8; 4]> {
        self.data.iter().map(|&rgb| pack_rgbe8(rgb)).collect()
    }

    /// Samples the panorama in a world direction (+Y up, the seam at -X).
    pub fn sample_direction(&self, direction: Vector3<f32>) -> [f32; 3] {
        let (u, v) = direction_to_uv(direction);
        self.sample_uv(u, v)
    }
}

/// Radiance RGBE: three 8-bit mantissas sharing the exponent of the largest
/// channel, biased by 128. Near-black and negative values pack to zero.
pub fn pack_rgbe8([r, g, b]: [f32; 3]) -> [u8; 4] {
    let max = r.max(g).max(b);
    if max < 1e-32 {
        return [0; 4];
    }
    let exponent = (max.log2().floor() as i32 + 1).clamp(-127, 127);
    let scale = ((8 - exponent) as f32).exp2();
    let mantissa = |c: f32| (c.max(0.0) * scale) as u8;
    [mantissa(r), mantissa(g), mantissa(b), (exponent + 128) as u8]
}

/// Maps a direction onto equirectangular coordinates, v = 0 at the top row.
pub fn direction_to_uv(direction: Vector3<f32>) -> (f32, f32) {
    let d = direction.normalize();
    let u = 0.5 + d.z.atan2(d.x) / (2.0 * PI);
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
    (u, v)
}

/// Loads and decodes an equirectangular panorama.
pub async fn load_equirect(asset_root: &str, file_name: &str) -> anyhow::Result<HdrImage> {
    let bytes = load_binary(asset_root, file_name).await?;
    HdrImage::from_bytes(&bytes).with_context(|| format!("decoding {file_name}"))
}
