use crate::{
    camera::PerspectiveCamera,
    data_structures::texture::Texture,
    pipelines::basic::{mk_fullscreen_pipeline, mk_pipeline_layout, texture_entry},
};

/// What a pass may read: the previous pass's colour (the scene's beauty
/// render for the first pass), the scene depth and the camera it was drawn with.
pub struct PassInputs<'a> {
    pub color: &'a Texture,
    pub depth: &'a Texture,
    pub camera: &'a PerspectiveCamera,
}

/// One full-screen stage of the effect composer.
pub trait Pass {
    fn name(&self) -> &str;

    fn enabled(&self) -> bool {
        true
    }

    /// Recreates per-size resources.
    fn set_size(&mut self, width: u32, height: u32);

    /// Size of the pass's own render targets, if it keeps any.
    fn target_size(&self) -> Option<[u32; 2]> {
        None
    }

    fn render(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &PassInputs,
        output: &wgpu::TextureView,
    );
}

pub(crate) fn unfilterable_texture_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[texture_entry(
            0,
            wgpu::TextureViewDimension::D2,
            wgpu::TextureSampleType::Float { filterable: false },
        )],
        label: Some(label),
    })
}

pub(crate) fn run_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    output: &wgpu::TextureView,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: output,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(0, bind_group, &[]);
    render_pass.draw(0..3, 0..1);
}

/// Writes its input unchanged. Used when no other pass is enabled.
pub struct CopyPass {
    device: wgpu::Device,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
}

impl CopyPass {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Self {
        let layout = unfilterable_texture_layout(device, "copy_bind_group_layout");
        let pipeline_layout = mk_pipeline_layout(device, "Copy Pipeline Layout", &[&layout]);
        let pipeline = mk_fullscreen_pipeline(
            device,
            "Copy Pipeline",
            &pipeline_layout,
            output_format,
            include_str!("copy.wgsl"),
        );
        Self {
            device: device.clone(),
            layout,
            pipeline,
        }
    }
}

impl Pass for CopyPass {
    fn name(&self) -> &str {
        "copy"
    }

    fn set_size(&mut self, _width: u32, _height: u32) {}

    fn render(
        &mut self,
        _queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &PassInputs,
        output: &wgpu::TextureView,
    ) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&inputs.color.view),
            }],
            label: Some("copy_bind_group"),
        });
        run_fullscreen(encoder, "Copy Pass", &self.pipeline, &bind_group, output);
    }
}
