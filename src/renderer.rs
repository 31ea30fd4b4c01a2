//! Draws the scene graph.
//!
//! Geometry, materials and the environment map live on the CPU in the scene
//! graph. [`SceneRenderer::prepare`] uploads whatever it has not seen yet
//! (keyed by [`NodeId`]), refreshes per-frame uniforms and builds the draw
//! list; [`SceneRenderer::render`] records the scene pass.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use wgpu::util::DeviceExt;

use crate::{
    camera::{CameraUniform, PerspectiveCamera},
    config::ToneMapping,
    data_structures::{
        geometry::Geometry,
        scene_graph::{Mesh, NodeId, Scene},
        texture::{self, Texture},
        transform::ObjectUniform,
    },
    ibl::EnvironmentMap,
    material::{Material, NodeMaterial, standard::MaterialUniform},
    pipelines::{
        self, background::mk_background_pipeline, ground::mk_node_params_layout, ground::mk_node_pipeline,
        standard::mk_material_layout, standard::mk_standard_pipeline,
    },
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalsUniform {
    // x: exposure, y: tone mapping operator, z: last environment mip, w: environment intensity
    params: [f32; 4],
}

/// Output settings the scene shaders read every frame.
#[derive(Clone, Copy, Debug)]
pub struct Shading {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
}

enum GpuMaterial {
    Standard {
        bind_group: wgpu::BindGroup,
    },
    Node {
        params_buffer: wgpu::Buffer,
        bind_group: wgpu::BindGroup,
        pipeline: wgpu::RenderPipeline,
    },
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    material: GpuMaterial,
}

struct UploadedEnvironment {
    source: Arc<EnvironmentMap>,
    // kept alive for the bind group
    _cube: Texture,
}

pub struct SceneRenderer {
    format: wgpu::TextureFormat,
    globals_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    node_params_layout: wgpu::BindGroupLayout,
    standard_pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    env_sampler: wgpu::Sampler,
    material_sampler: wgpu::Sampler,
    environment: Option<UploadedEnvironment>,
    white: Texture,
    flat_normal: Texture,
    meshes: HashMap<NodeId, GpuMesh>,
    // meshes that could not be uploaded; not retried while they stay in the scene
    failed: HashSet<NodeId>,
    draw_list: Vec<NodeId>,
    draw_background: bool,
}

impl SceneRenderer {
    /// `format` is the colour format of the beauty target the scene is drawn into.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> anyhow::Result<Self> {

        let globals_layout = pipelines::mk_globals_layout(device);
        let object_layout = pipelines::mk_object_layout(device);
        let material_layout = mk_material_layout(device);
        let node_params_layout = mk_node_params_layout(device);

        let standard_pipeline =
            mk_standard_pipeline(device, format, &globals_layout, &object_layout, &material_layout);
        let background_pipeline = mk_background_pipeline(device, format, &globals_layout);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Buffer"),
            contents: bytemuck::cast_slice(&[GlobalsUniform { params: [1.0, 0.0, 0.0, 0.0] }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("environment_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        // black until the scene has an environment
        let placeholder = Texture::cube_rgb9e5(device, queue, 1, &[vec![0; 6]], "placeholder_environment")?;
        let globals_bind_group = mk_globals_bind_group(
            device,
            &globals_layout,
            &camera_buffer,
            &globals_buffer,
            &placeholder,
            &env_sampler,
        );

        Ok(Self {
            format,
            white: Texture::solid(device, queue, [255, 255, 255, 255], "white")?,
            flat_normal: Texture::solid(device, queue, [128, 128, 255, 255], "flat_normal")?,
            material_sampler: texture::create_default_sampler(device),
            globals_layout,
            object_layout,
            material_layout,
            node_params_layout,
            standard_pipeline,
            background_pipeline,
            camera_uniform,
            camera_buffer,
            globals_buffer,
            globals_bind_group,
            env_sampler,
            environment: None,
            meshes: HashMap::new(),
            failed: HashSet::new(),
            draw_list: Vec::new(),
            draw_background: false,
        })
    }

    /// Number of meshes currently resident on the GPU.
    pub fn uploaded_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Number of meshes in the scene that could not be uploaded.
    pub fn failed_meshes(&self) -> usize {
        self.failed.len()
    }

    /// Ids of the meshes drawn by the next [`SceneRenderer::render`], in draw order.
    pub fn draw_list(&self) -> &[NodeId] {
        &self.draw_list
    }

    /// Brings GPU state in line with `scene` and `camera`.
    ///
    /// Meshes are uploaded the first time their node is seen and released once
    /// the node leaves the scene. A mesh that fails to upload is logged once and
    /// left out of the draw list; the rest of the scene still draws. Transforms
    /// and node-material uniforms are rewritten every frame.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shading: Shading,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> anyhow::Result<()> {
        self.camera_uniform.update_view_proj(camera);
        queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));

        self.update_environment(device, queue, scene.environment.as_ref())?;
        let globals = GlobalsUniform {
            params: [
                shading.exposure,
                shading.tone_mapping.shader_id(),
                self.environment
                    .as_ref()
                    .map_or(0.0, |env| env.source.mip_count().saturating_sub(1) as f32),
                if self.environment.is_some() { 1.0 } else { 0.0 },
            ],
        };
        queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[globals]));
        self.draw_background = scene.background.is_some() && self.environment.is_some();

        let mut seen = HashSet::new();
        self.draw_list.clear();
        scene.visit_world(&mut |node, world| {
            let Some(mesh) = node.as_mesh() else {
                return;
            };
            let id = node.id();
            seen.insert(id);
            if self.failed.contains(&id) {
                return;
            }
            if !self.meshes.contains_key(&id) {
                match self.upload_mesh(device, queue, &node.name, mesh) {
                    Ok(gpu) => {
                        log::debug!("uploaded mesh {} ({} indices)", node.name, gpu.num_indices);
                        self.meshes.insert(id, gpu);
                    }
                    Err(err) => {
                        log::error!("Skipping mesh {}: {err:#}", node.name);
                        self.failed.insert(id);
                        return;
                    }
                }
            }
            if let Some(gpu) = self.meshes.get(&id) {
                let object = ObjectUniform::from_world(*world);
                queue
                    .write_buffer(&gpu.object_buffer, 0, bytemuck::cast_slice(&[object]));
                if let (GpuMaterial::Node { params_buffer, .. }, Material::Node(material)) =
                    (&gpu.material, &mesh.material)
                {
                    queue
                        .write_buffer(params_buffer, 0, bytemuck::cast_slice(&material.uniform_data()));
                }
            }
            self.draw_list.push(id);
        });
        self.meshes.retain(|id, _| seen.contains(id));
        self.failed.retain(|id| seen.contains(id));
        Ok(())
    }

    /// Records the scene pass into `color` and `depth`.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_colour: wgpu::Color,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
        if self.draw_background {
            render_pass.set_pipeline(&self.background_pipeline);
            render_pass.draw(0..3, 0..1);
        }

        for id in &self.draw_list {
            let Some(mesh) = self.meshes.get(id) else {
                continue;
            };
            match &mesh.material {
                GpuMaterial::Standard { bind_group } => {
                    render_pass.set_pipeline(&self.standard_pipeline);
                    render_pass.set_bind_group(2, bind_group, &[]);
                }
                GpuMaterial::Node {
                    bind_group, pipeline, ..
                } => {
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(2, bind_group, &[]);
                }
            }
            render_pass.set_bind_group(1, &mesh.object_bind_group, &[]);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
        }
    }

    fn update_environment(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        environment: Option<&Arc<EnvironmentMap>>) -> anyhow::Result<()> {
        let current = self.environment.as_ref().map(|env| &env.source);
        let changed = match (current, environment) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if !changed {
            return Ok(());
        }

        let cube = match environment {
            Some(env) => Texture::cube_rgb9e5(
                device,
                queue,
                env.face_size(),
                &env.to_rgb9e5_levels(),
                "environment",
            )?,
            None => Texture::cube_rgb9e5(device, queue, 1, &[vec![0; 6]], "placeholder_environment")?,
        };
        self.globals_bind_group = mk_globals_bind_group(
            device,
            &self.globals_layout,
            &self.camera_buffer,
            &self.globals_buffer,
            &cube,
            &self.env_sampler,
        );
        self.environment = environment.map(|source| UploadedEnvironment {
            source: source.clone(),
            _cube: cube,
        });
        Ok(())
    }

    fn upload_mesh(&self, device: &wgpu::Device, queue: &wgpu::Queue, name: &str, mesh: &Mesh) -> anyhow::Result<GpuMesh> {
        let (vertex_buffer, index_buffer) = upload_geometry(device, name, &mesh.geometry)?;
        let object_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Object Buffer")),
            contents: bytemuck::cast_slice(&[ObjectUniform::from_world(cgmath::SquareMatrix::identity())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
            label: Some("object_bind_group"),
        });

        let material = match &mesh.material {
            Material::Node(material) => self.upload_node_material(device, material)?,
            Material::Standard(_) | Material::Basic(_) => self.upload_standard_material(device, queue, name, &mesh.material)?,
        };

        Ok(GpuMesh {
            vertex_buffer,
            index_buffer,
            num_indices: mesh.geometry.indices.len() as u32,
            object_buffer,
            object_bind_group,
            material,
        })
    }

    fn upload_standard_material(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        material: &Material,
    ) -> anyhow::Result<GpuMaterial> {
        let (uniform, base_color, metallic_roughness, normal) = match material {
            Material::Standard(standard) => {
                let metallic_roughness = match (&standard.roughness_mipmaps, &standard.metallic_roughness_texture) {
                    (Some(chain), _) => Some(Texture::from_mip_chain(
                        device,
                        queue,
                        chain,
                        &format!("{name} metallic roughness"),
                        false,
                    )?),
                    (None, Some(image)) => Some(Texture::from_image(
                        device,
                        queue,
                        image,
                        &format!("{name} metallic roughness"),
                        false,
                    )?),
                    (None, None) => None,
                };
                let base_color = standard
                    .base_color_texture
                    .as_ref()
                    .map(|image| Texture::from_image(device, queue, image, &format!("{name} base colour"), true))
                    .transpose()?;
                let normal = standard
                    .normal_texture
                    .as_ref()
                    .map(|image| Texture::from_image(device, queue, image, &format!("{name} normal"), false))
                    .transpose()?;
                (MaterialUniform::from(standard), base_color, metallic_roughness, normal)
            }
            Material::Basic(basic) => {
                let base_color = basic
                    .texture
                    .as_ref()
                    .map(|image| Texture::from_image(device, queue, image, &format!("{name} colour"), true))
                    .transpose()?;
                (MaterialUniform::from(basic), base_color, None, None)
            }
            Material::Node(_) => anyhow::bail!("{name}: node materials have no standard bindings"),
        };

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Material Buffer")),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base_color.as_ref().unwrap_or(&self.white).view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        &metallic_roughness.as_ref().unwrap_or(&self.white).view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.as_ref().unwrap_or(&self.flat_normal).view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
            label: Some("standard_material_bind_group"),
        });
        Ok(GpuMaterial::Standard { bind_group })
    }

    fn upload_node_material(&self, device: &wgpu::Device, material: &NodeMaterial) -> anyhow::Result<GpuMaterial> {
        let pipeline = mk_node_pipeline(
            device,
            self.format,
            &self.globals_layout,
            &self.object_layout,
            &self.node_params_layout,
            material,
        )?;
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Node Params", material.name)),
            contents: bytemuck::cast_slice(&material.uniform_data()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.node_params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
            label: Some("node_params_bind_group"),
        });
        Ok(GpuMaterial::Node {
            params_buffer,
            bind_group,
            pipeline,
        })
    }
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("format", &self.format)
            .field("meshes", &self.meshes.len())
            .field("draw_list", &self.draw_list)
            .field("draw_background", &self.draw_background)
            .finish()
    }
}

fn upload_geometry(device: &wgpu::Device, name: &str, geometry: &Geometry) -> anyhow::Result<(wgpu::Buffer, wgpu::Buffer)> {
    anyhow::ensure!(
        !geometry.vertices.is_empty() && !geometry.indices.is_empty(),
        "mesh {name} has no triangles"
    );
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{name} Vertex Buffer")),
        contents: bytemuck::cast_slice(&geometry.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{name} Index Buffer")),
        contents: bytemuck::cast_slice(&geometry.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    Ok((vertex_buffer, index_buffer))
}

fn mk_globals_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    camera_buffer: &wgpu::Buffer,
    globals_buffer: &wgpu::Buffer,
    cube: &Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: globals_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&cube.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("globals_bind_group"),
    })
}
