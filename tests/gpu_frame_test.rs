//! Whole frames through the scene renderer and the effect composer.
//! Needs a GPU adapter; run with `--features integration-tests`.
#![cfg(feature = "integration-tests")]

use cgmath::{Point3, Vector3};
use scene_viewer::{
    camera::PerspectiveCamera,
    config::{CameraConfig, SsaoConfig, ToneMapping},
    data_structures::{
        geometry::Geometry,
        scene_graph::{Node, Scene},
        texture::Texture,
        transform::Transform,
    },
    material::Material,
    postprocessing::{EffectComposer, SsaoOutput, SsaoPass},
    renderer::{SceneRenderer, Shading},
    viewport::Resizable,
};

use crate::common::gpu::{headless_device, pixel_at, read_back};

mod common;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const SIZE: u32 = 64;

const SHADING: Shading = Shading {
    tone_mapping: ToneMapping::None,
    exposure: 1.0,
};

fn camera_looking_down_z() -> PerspectiveCamera {
    let config = CameraConfig {
        fovy_degrees: 50.0,
        near: 0.1,
        far: 10.0,
        position: Point3::new(0.0, 0.0, 0.0),
        target: Point3::new(0.0, 0.0, -1.0),
    };
    PerspectiveCamera::new(&config, SIZE, SIZE)
}

fn plane(name: &str, size: f32, position: Vector3<f32>) -> Node {
    Node::mesh(name, Geometry::plane(size, size), Material::default())
        .with_transform(Transform::from_position(position))
}

#[tokio::test]
async fn failed_mesh_upload_does_not_hide_the_rest_of_the_scene() {
    let (device, queue) = headless_device().await;
    let mut renderer = SceneRenderer::new(&device, &queue, FORMAT).unwrap();
    let camera = camera_looking_down_z();

    let mut scene = Scene::new();
    // no triangles, so it cannot be uploaded
    scene.add(Node::mesh("broken", Geometry::default(), Material::default()));
    let floor = scene.add(plane("floor", 4.0, Vector3::new(0.0, 0.0, -3.0)));

    renderer.prepare(&device, &queue, SHADING, &scene, &camera).unwrap();
    assert_eq!(renderer.uploaded_meshes(), 1);
    assert_eq!(renderer.failed_meshes(), 1);
    assert_eq!(renderer.draw_list(), [floor]);

    renderer.prepare(&device, &queue, SHADING, &scene, &camera).unwrap();
    assert_eq!(renderer.uploaded_meshes(), 1);
    assert_eq!(renderer.failed_meshes(), 1);
    assert_eq!(renderer.draw_list(), [floor]);
}

#[tokio::test]
async fn resized_composer_renders_at_the_new_size() {
    let (device, queue) = headless_device().await;
    let mut renderer = SceneRenderer::new(&device, &queue, FORMAT).unwrap();
    let camera = camera_looking_down_z();
    let mut composer = EffectComposer::new(&device, FORMAT, SIZE / 2, SIZE / 2);
    let ssao = SsaoPass::new(&device, &queue, FORMAT, SIZE / 2, SIZE / 2, &SsaoConfig::default()).unwrap();
    composer.add_pass(Box::new(ssao));

    composer.resize(SIZE, SIZE);

    assert_eq!(composer.size(), (SIZE, SIZE));
    assert_eq!(composer.beauty().size(), [SIZE, SIZE]);
    assert_eq!(composer.depth().size(), [SIZE, SIZE]);
    assert_eq!(composer.passes()[0].target_size(), Some([SIZE, SIZE]));

    // nothing in the scene: the clear colour comes through unoccluded
    renderer.prepare(&device, &queue, SHADING, &Scene::new(), &camera).unwrap();
    let output = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "output");
    composer.render_to(&device, &queue, &renderer, &camera, wgpu::Color::BLUE, &output.view);

    let pixels = read_back(&device, &queue, &output);
    for (i, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_eq!(pixel, [0, 0, 255, 255], "pixel {}", i);
    }
}

#[tokio::test]
async fn depth_step_occludes_the_far_side_of_the_edge() {
    let (device, queue) = headless_device().await;
    let mut renderer = SceneRenderer::new(&device, &queue, FORMAT).unwrap();
    let camera = camera_looking_down_z();

    // a wall covering the left half of the view half a unit in front of a backdrop
    let mut scene = Scene::new();
    scene.add(plane("backdrop", 10.0, Vector3::new(0.0, 0.0, -3.0)));
    scene.add(plane("wall", 4.0, Vector3::new(-2.0, 0.0, -2.5)));
    renderer.prepare(&device, &queue, SHADING, &scene, &camera).unwrap();

    let config = SsaoConfig {
        kernel_radius: 0.6,
        min_distance: 0.0001,
        max_distance: 0.1,
        kernel_size: 32,
    };
    let mut ssao = SsaoPass::new(&device, &queue, FORMAT, SIZE, SIZE, &config).unwrap();
    ssao.output = SsaoOutput::Ssao;
    let mut composer = EffectComposer::new(&device, FORMAT, SIZE, SIZE);
    composer.add_pass(Box::new(ssao));

    let output = Texture::create_render_target(&device, [SIZE, SIZE], FORMAT, "output");
    composer.render_to(&device, &queue, &renderer, &camera, wgpu::Color::BLACK, &output.view);
    let pixels = read_back(&device, &queue, &output);

    // the wall edge sits between columns 31 and 32
    let beside_the_wall = pixel_at(&pixels, SIZE, 33, SIZE / 2);
    let out_of_reach = pixel_at(&pixels, SIZE, 60, SIZE / 2);
    assert!(beside_the_wall[0] < 255, "no occlusion next to the wall: {:?}", beside_the_wall);
    assert_eq!(out_of_reach[0], 255);
}
