//! Screen-space ambient occlusion.
//!
//! Three stages, each a full-screen triangle:
//!
//! 1. estimation: every pixel's view-space position is reconstructed from the
//!    depth buffer with the inverse projection; a hemisphere of kernel samples
//!    around its normal, rotated per pixel by a tiled 4x4 noise texture, is
//!    compared against the depth buffer;
//! 2. a 4x4 box blur that removes the noise pattern;
//! 3. composite: the blurred occlusion multiplied into the beauty render, or
//!    one of the intermediate buffers depending on [`SsaoOutput`].

use cgmath::{InnerSpace, SquareMatrix, Vector3};
use image::{Rgba, RgbaImage};
use wgpu::util::DeviceExt;

use crate::{
    config::SsaoConfig,
    data_structures::texture::Texture,
    pipelines::basic::{mk_fullscreen_pipeline, mk_pipeline_layout, texture_entry, uniform_entry},
    postprocessing::pass::{Pass, PassInputs, run_fullscreen},
};

pub const MAX_KERNEL_SIZE: usize = 32;
pub const NOISE_SIZE: u32 = 4;

/// What the pass writes to its output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SsaoOutput {
    /// Beauty render darkened by the blurred occlusion.
    #[default]
    Default,
    /// Raw occlusion estimate.
    Ssao,
    /// Blurred occlusion.
    Blur,
    /// Beauty render without occlusion.
    Beauty,
    /// Linear depth.
    Depth,
}

impl SsaoOutput {
    fn shader_id(self) -> f32 {
        match self {
            SsaoOutput::Default => 0.0,
            SsaoOutput::Ssao => 1.0,
            SsaoOutput::Blur => 2.0,
            SsaoOutput::Beauty => 3.0,
            SsaoOutput::Depth => 4.0,
        }
    }
}

/// xorshift32, enough for sample placement.
struct SampleRng(u32);

impl SampleRng {
    fn next(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 8) as f32 / (1u32 << 24) as f32
    }
}

/// Sample offsets in the +Z hemisphere of unit radius, denser near the centre.
pub fn generate_kernel(size: usize) -> Vec<[f32; 4]> {
    let mut rng = SampleRng(0x9e37_79b9);
    (0..size.min(MAX_KERNEL_SIZE))
        .map(|i| {
            let mut sample = Vector3::new(rng.next() * 2.0 - 1.0, rng.next() * 2.0 - 1.0, rng.next());
            if sample.magnitude2() < 1e-8 {
                sample = Vector3::unit_z();
            }
            let t = i as f32 / size as f32;
            let scale = 0.1 + 0.9 * t * t;
            let sample = sample.normalize() * scale;
            [sample.x, sample.y, sample.z, 0.0]
        })
        .collect()
}

/// 4x4 random rotation vectors around Z, packed into 0..255.
pub fn generate_noise() -> RgbaImage {
    let mut rng = SampleRng(0x85eb_ca6b);
    RgbaImage::from_fn(NOISE_SIZE, NOISE_SIZE, |_, _| {
        let x = rng.next();
        let y = rng.next();
        Rgba([(x * 255.0) as u8, (y * 255.0) as u8, 128, 255])
    })
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SsaoUniform {
    projection: [[f32; 4]; 4],
    inv_projection: [[f32; 4]; 4],
    kernel: [[f32; 4]; MAX_KERNEL_SIZE],
    // x: kernel radius, y: min distance, z: max distance, w: kernel size
    settings: [f32; 4],
    // xy: resolution, z: near, w: far
    view: [f32; 4],
    // x: output mode
    output: [f32; 4],
}

pub struct SsaoPass {
    pub output: SsaoOutput,
    pub enabled: bool,
    pub config: SsaoConfig,
    device: wgpu::Device,
    kernel: Vec<[f32; 4]>,
    noise: Texture,
    uniform_buffer: wgpu::Buffer,
    ssao_target: Texture,
    blur_target: Texture,
    ssao_layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    ssao_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    size: (u32, u32),
}

impl SsaoPass {
    /// Occlusion is kept in an 8-bit target; the composite writes `output_format`.
    const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &SsaoConfig,
    ) -> anyhow::Result<Self> {
        let kernel = generate_kernel(config.kernel_size);
        let noise = Texture::from_image(device, queue, &generate_noise(), "ssao_noise", false)?;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("SSAO Uniform Buffer"),
            contents: bytemuck::bytes_of(&SsaoUniform {
                projection: cgmath::Matrix4::identity().into(),
                inv_projection: cgmath::Matrix4::identity().into(),
                kernel: [[0.0; 4]; MAX_KERNEL_SIZE],
                settings: [0.0; 4],
                view: [1.0, 1.0, 1.0, 1.0],
                output: [0.0; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let float_texture = |binding| {
            texture_entry(
                binding,
                wgpu::TextureViewDimension::D2,
                wgpu::TextureSampleType::Float { filterable: false },
            )
        };
        let depth_texture = |binding| {
            texture_entry(binding, wgpu::TextureViewDimension::D2, wgpu::TextureSampleType::Depth)
        };
        let uniform = uniform_entry(0, wgpu::ShaderStages::FRAGMENT);

        let ssao_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform, depth_texture(1), float_texture(2)],
            label: Some("ssao_bind_group_layout"),
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform, float_texture(1)],
            label: Some("ssao_blur_bind_group_layout"),
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform, float_texture(1), float_texture(2), float_texture(3), depth_texture(4)],
            label: Some("ssao_composite_bind_group_layout"),
        });

        let ssao_pipeline = mk_fullscreen_pipeline(
            device,
            "SSAO Pipeline",
            &mk_pipeline_layout(device, "SSAO Pipeline Layout", &[&ssao_layout]),
            Self::AO_FORMAT,
            &[include_str!("ssao_common.wgsl"), include_str!("ssao.wgsl")].join("\n"),
        );
        let blur_pipeline = mk_fullscreen_pipeline(
            device,
            "SSAO Blur Pipeline",
            &mk_pipeline_layout(device, "SSAO Blur Pipeline Layout", &[&blur_layout]),
            Self::AO_FORMAT,
            &[include_str!("ssao_common.wgsl"), include_str!("blur.wgsl")].join("\n"),
        );
        let composite_pipeline = mk_fullscreen_pipeline(
            device,
            "SSAO Composite Pipeline",
            &mk_pipeline_layout(device, "SSAO Composite Pipeline Layout", &[&composite_layout]),
            output_format,
            &[include_str!("ssao_common.wgsl"), include_str!("composite.wgsl")].join("\n"),
        );

        let size = [width.max(1), height.max(1)];
        Ok(Self {
            output: SsaoOutput::Default,
            enabled: true,
            config: config.clone(),
            device: device.clone(),
            kernel,
            noise,
            uniform_buffer,
            ssao_target: Texture::create_render_target(device, size, Self::AO_FORMAT, "ssao"),
            blur_target: Texture::create_render_target(device, size, Self::AO_FORMAT, "ssao_blur"),
            ssao_layout,
            blur_layout,
            composite_layout,
            ssao_pipeline,
            blur_pipeline,
            composite_pipeline,
            size: (width, height),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    fn uniform(&self, inputs: &PassInputs) -> SsaoUniform {
        let camera = inputs.camera;
        let projection = camera.projection();
        let mut kernel = [[0.0; 4]; MAX_KERNEL_SIZE];
        for (slot, sample) in kernel.iter_mut().zip(&self.kernel) {
            *slot = *sample;
        }
        let [width, height] = inputs.depth.size();
        SsaoUniform {
            projection: projection.into(),
            inv_projection: projection.invert().unwrap_or_else(cgmath::Matrix4::identity).into(),
            kernel,
            settings: [
                self.config.kernel_radius,
                self.config.min_distance,
                self.config.max_distance,
                self.kernel.len() as f32,
            ],
            view: [width as f32, height as f32, camera.near, camera.far],
            output: [self.output.shader_id(), 0.0, 0.0, 0.0],
        }
    }

    fn bind_group(&self, label: &str, layout: &wgpu::BindGroupLayout, views: &[&wgpu::TextureView]) -> wgpu::BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.uniform_buffer.as_entire_binding(),
        }];
        entries.extend(views.iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &entries,
            label: Some(label),
        })
    }
}

impl Pass for SsaoPass {
    fn name(&self) -> &str {
        "ssao"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_size(&mut self, width: u32, height: u32) {
        let size = [width.max(1), height.max(1)];
        self.ssao_target = Texture::create_render_target(&self.device, size, Self::AO_FORMAT, "ssao");
        self.blur_target = Texture::create_render_target(&self.device, size, Self::AO_FORMAT, "ssao_blur");
        self.size = (width, height);
    }

    fn target_size(&self) -> Option<[u32; 2]> {
        Some(self.ssao_target.size())
    }

    fn render(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &PassInputs,
        output: &wgpu::TextureView,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniform(inputs)));

        let ssao = self.bind_group("ssao_bind_group", &self.ssao_layout, &[&inputs.depth.view, &self.noise.view]);
        run_fullscreen(encoder, "SSAO Pass", &self.ssao_pipeline, &ssao, &self.ssao_target.view);

        let blur = self.bind_group("ssao_blur_bind_group", &self.blur_layout, &[&self.ssao_target.view]);
        run_fullscreen(encoder, "SSAO Blur Pass", &self.blur_pipeline, &blur, &self.blur_target.view);

        let composite = self.bind_group(
            "ssao_composite_bind_group",
            &self.composite_layout,
            &[
                &inputs.color.view,
                &self.ssao_target.view,
                &self.blur_target.view,
                &inputs.depth.view,
            ],
        );
        run_fullscreen(encoder, "SSAO Composite Pass", &self.composite_pipeline, &composite, output);
    }
}
