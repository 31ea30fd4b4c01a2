//! Builds the viewer's scene: environment, model and the checkered ground.
//!
//! Assets arrive through an [`AssetSource`] so the assembly order and the
//! scene it produces can be exercised without a file system or a GPU.

use std::sync::Arc;

use cgmath::Rad;

use crate::{
    config::ViewerConfig,
    data_structures::{
        geometry::Geometry,
        scene_graph::{Node, NodeId, SceneFragment, SharedScene},
        transform::Transform,
    },
    error::{SetupError, SetupResult},
    gui::{self, ControlId, SharedPanel},
    ibl::PmremGenerator,
    material::{Material, NodeMaterial, ShaderNode, Uniform},
    mipmap::{RoughnessMipmapper, generate_roughness_mipmaps},
    resources::{self, hdr::HdrImage},
    sync::SyncRegistry,
};

pub const UV_SCALE_LABEL: &str = "uv scale";
pub const GROUND_Y_LABEL: &str = "ground y";

#[allow(async_fn_in_trait)]
pub trait AssetSource {
    async fn load_environment(&self, path: &str) -> anyhow::Result<HdrImage>;
    async fn load_model(&self, path: &str) -> anyhow::Result<SceneFragment>;
}

/// Assets read from disk natively, or fetched from the page origin on the web.
#[derive(Debug, Clone)]
pub struct FileAssets {
    asset_root: String,
}

impl FileAssets {
    pub fn new(asset_root: impl Into<String>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }
}

impl AssetSource for FileAssets {
    async fn load_environment(&self, path: &str) -> anyhow::Result<HdrImage> {
        resources::hdr::load_equirect(&self.asset_root, path).await
    }

    async fn load_model(&self, path: &str) -> anyhow::Result<SceneFragment> {
        resources::gltf::load_gltf(&self.asset_root, path).await
    }
}

/// Handles to the ground plane and its two controls.
#[derive(Debug, Clone)]
pub struct Ground {
    pub node: NodeId,
    pub uv_scale: Uniform,
    pub uv_scale_control: ControlId,
    pub offset_y_control: ControlId,
}

/// Loads the environment map and the model into `scene`, adds the ground
/// plane and registers its controls.
///
/// Loads run one after another, environment first. A failed load returns
/// before the scene receives any node.
pub async fn assemble(
    assets: &impl AssetSource,
    config: &ViewerConfig,
    scene: &SharedScene,
    panel: &SharedPanel,
    syncs: &mut SyncRegistry,
) -> SetupResult<Ground> {
    let equirect = assets
        .load_environment(&config.environment_map)
        .await
        .map_err(|err| SetupError::asset(&config.environment_map, err))?;
    let environment = Arc::new(PmremGenerator::new(&config.environment).from_equirect(&equirect));
    drop(equirect);
    log::info!(
        "environment map {} ready ({} levels, {}px faces)",
        config.environment_map,
        environment.mip_count(),
        environment.face_size()
    );
    {
        let mut scene = scene.borrow_mut();
        scene.background = Some(environment.clone());
        scene.environment = Some(environment);
    }

    let mut fragment = assets
        .load_model(&config.model)
        .await
        .map_err(|err| SetupError::asset(&config.model, err))?;
    let mipmapped = generate_roughness_mipmaps(&mut fragment.root, &mut RoughnessMipmapper::new());
    log::info!(
        "model {} loaded: {} meshes, {} roughness mip chains",
        config.model,
        fragment.mesh_count(),
        mipmapped
    );
    {
        let mut scene = scene.borrow_mut();
        for child in fragment.root.take_children() {
            scene.add(child);
        }
    }

    let ground = add_ground(config, scene, panel);
    syncs.register(gui::flush_callback(panel));
    Ok(ground)
}

/// Checkered roughness tiling `uv scale` times across the surface, plus a
/// dimmed environment reflection.
pub fn ground_material(config: &ViewerConfig, uv_scale: &Uniform) -> NodeMaterial {
    let ground = &config.ground;
    NodeMaterial {
        name: "ground".to_string(),
        color: ShaderNode::color_hex(ground.color),
        roughness: ShaderNode::checker(ShaderNode::multiply(ShaderNode::Uv, ShaderNode::uniform(uv_scale))),
        metalness: ShaderNode::scalar(0.0),
        environment: Some(ShaderNode::multiply(
            ShaderNode::environment(ShaderNode::ReflectVector),
            ShaderNode::scalar(ground.environment_intensity),
        )),
    }
}

/// A 10 x 10 plane one unit below the origin, lifted by the `ground y`
/// control.
fn add_ground(config: &ViewerConfig, scene: &SharedScene, panel: &SharedPanel) -> Ground {
    let ground = &config.ground;
    let mut geometry = Geometry::plane(ground.width, ground.depth);
    geometry
        .rotate_x(Rad(-std::f32::consts::FRAC_PI_2))
        .translate(0.0, ground.base_offset, 0.0);

    let uv_scale = Uniform::new(ground.uv_scale.initial);
    let material = ground_material(config, &uv_scale);
    let mut transform = Transform::new();
    transform.position.y = ground.offset_y.initial;
    let node = Node::mesh("ground", geometry, Material::Node(material)).with_transform(transform);
    let node = scene.borrow_mut().add(node);

    let mut panel = panel.borrow_mut();
    let uv_scale_control = {
        let uniform = uv_scale.clone();
        let range = &ground.uv_scale;
        panel.add(UV_SCALE_LABEL, range.initial, range.min, range.max, range.step, move |value| {
            uniform.set(value)
        })
    };
    let offset_y_control = {
        let scene = scene.clone();
        let range = &ground.offset_y;
        panel.add(GROUND_Y_LABEL, range.initial, range.min, range.max, range.step, move |value| {
            if let Some(ground) = scene.borrow_mut().find_mut(node) {
                ground.transform.position.y = value;
            }
        })
    };

    Ground {
        node,
        uv_scale,
        uv_scale_control,
        offset_y_control,
    }
}
