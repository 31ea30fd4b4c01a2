//! Needs a GPU adapter; run with `--features integration-tests`.
#![cfg(feature = "integration-tests")]

use scene_viewer::{
    assembler::ground_material,
    camera::PerspectiveCamera,
    config::{CameraConfig, SsaoConfig, ViewerConfig},
    data_structures::texture::Texture,
    material::Uniform,
    pipelines::{self, background, ground, standard},
    postprocessing::{Pass, PassInputs, SsaoOutput, SsaoPass},
};

use crate::common::gpu::{headless_device, read_back, wait};

mod common;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const SIZE: u32 = 64;

#[tokio::test]
async fn scene_pipelines_compile() {
    let (device, _queue) = headless_device().await;
    let globals = pipelines::mk_globals_layout(&device);
    let object = pipelines::mk_object_layout(&device);

    let material = standard::mk_material_layout(&device);
    standard::mk_standard_pipeline(&device, FORMAT, &globals, &object, &material);
    background::mk_background_pipeline(&device, FORMAT, &globals);

    let params = ground::mk_node_params_layout(&device);
    let ground_material = ground_material(&ViewerConfig::default(), &Uniform::new(6.0));
    ground::mk_node_pipeline(&device, FORMAT, &globals, &object, &params, &ground_material).unwrap();

    wait(&device);
}

#[tokio::test]
async fn ssao_pass_renders_every_output_mode() {
    let (device, queue) = headless_device().await;
    let mut pass = SsaoPass::new(&device, &queue, FORMAT, SIZE, SIZE, &SsaoConfig::default()).unwrap();
    let beauty = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "beauty");
    let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], "depth");
    let output = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "output");
    let camera = PerspectiveCamera::new(&CameraConfig::default(), SIZE, SIZE);

    for mode in [
        SsaoOutput::Default,
        SsaoOutput::Ssao,
        SsaoOutput::Blur,
        SsaoOutput::Beauty,
        SsaoOutput::Depth,
    ] {
        pass.output = mode;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let inputs = PassInputs {
            color: &beauty,
            depth: &depth,
            camera: &camera,
        };
        pass.render(&queue, &mut encoder, &inputs, &output.view);
        queue.submit(std::iter::once(encoder.finish()));
        wait(&device);
    }
}

/// Clears `beauty` to `colour` and `depth` to the far plane.
fn clear_inputs(device: &wgpu::Device, queue: &wgpu::Queue, beauty: &Texture, depth: &Texture, colour: wgpu::Color) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("clear inputs"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &beauty.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(colour),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    queue.submit(std::iter::once(encoder.finish()));
}

#[tokio::test]
async fn empty_depth_leaves_beauty_unoccluded() {
    let (device, queue) = headless_device().await;
    let mut pass = SsaoPass::new(&device, &queue, FORMAT, SIZE, SIZE, &SsaoConfig::default()).unwrap();
    let beauty = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "beauty");
    let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], "depth");
    let output = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "output");
    let camera = PerspectiveCamera::new(&CameraConfig::default(), SIZE, SIZE);
    clear_inputs(&device, &queue, &beauty, &depth, wgpu::Color::RED);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let inputs = PassInputs {
        color: &beauty,
        depth: &depth,
        camera: &camera,
    };
    pass.render(&queue, &mut encoder, &inputs, &output.view);
    queue.submit(std::iter::once(encoder.finish()));

    let pixels = read_back(&device, &queue, &output);
    for (i, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_eq!(pixel, [255, 0, 0, 255], "pixel {} is occluded", i);
    }
}
