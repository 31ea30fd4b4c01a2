//! One viewing session: the GPU context, the assembled scene and everything
//! that draws it.

use std::{sync::Arc, time::Duration};

use winit::{event::WindowEvent, window::Window};

use crate::{
    assembler::{self, FileAssets, Ground},
    camera::PerspectiveCamera,
    config::ViewerConfig,
    context::Context,
    controls::OrbitControls,
    data_structures::scene_graph::{Scene, SharedScene},
    error::{SetupError, SetupResult},
    gui::{ControlPanel, SharedPanel, keyboard::KeyboardControls},
    postprocessing::{EffectComposer, SsaoPass},
    render_loop::{FrameRenderer, LoopState, RenderLoop},
    renderer::SceneRenderer,
    stats::Stats,
    sync::SyncRegistry,
    viewport::{ResizeHandler, Resizable},
};

pub struct Viewer {
    ctx: Context,
    scene: SharedScene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    panel: SharedPanel,
    keyboard: KeyboardControls,
    renderer: SceneRenderer,
    composer: EffectComposer,
    resize: ResizeHandler,
    render_loop: RenderLoop,
    ground: Ground,
}

impl Viewer {
    /// Sets up the context, loads the assets and builds the post-processing
    /// chain. Any failure ends the session before the first frame.
    pub async fn new(window: Arc<Window>, config: &ViewerConfig) -> SetupResult<Self> {
        let ctx = Context::new(window.clone(), config).await?;

        let scene = Scene::new().into_shared();
        let panel = ControlPanel::new().into_shared();
        let mut syncs = SyncRegistry::new();
        let assets = FileAssets::new(config.asset_root.clone());
        let ground = assembler::assemble(&assets, config, &scene, &panel, &mut syncs).await?;

        let (width, height) = ctx.size();
        let camera = PerspectiveCamera::new(&config.camera, width, height);
        let controls = OrbitControls::new(config.camera.target);
        let renderer = SceneRenderer::new(&ctx.device, &ctx.queue, ctx.format()).map_err(SetupError::Resources)?;

        let mut composer = EffectComposer::new(&ctx.device, ctx.format(), width, height);
        let ssao = SsaoPass::new(&ctx.device, &ctx.queue, ctx.format(), width, height, &config.ssao)
            .map_err(SetupError::Resources)?;
        composer.add_pass(Box::new(ssao));

        let stats = Stats::new(Duration::from_millis(config.stats_interval_millis));
        #[cfg(not(target_arch = "wasm32"))]
        let stats = stats.with_overlay(Box::new(crate::stats::TitleOverlay::new(
            window,
            "scene-viewer",
            panel.clone(),
        )));
        #[cfg(target_arch = "wasm32")]
        let stats = {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or(SetupError::MissingElement("document"))?;
            crate::gui::web::mount(&document, &panel).map_err(|_| SetupError::MissingElement("body"))?;
            let overlay =
                crate::stats::DomOverlay::mount(&document).map_err(|_| SetupError::MissingElement("body"))?;
            stats.with_overlay(Box::new(overlay))
        };

        log::info!(
            "viewer ready: {}x{}, {} controls, {} sync callbacks",
            width,
            height,
            panel.borrow().len(),
            syncs.len()
        );

        Ok(Self {
            ctx,
            scene,
            camera,
            controls,
            panel,
            keyboard: KeyboardControls::new(),
            renderer,
            composer,
            resize: ResizeHandler::new(),
            render_loop: RenderLoop::new(syncs, stats),
            ground,
        })
    }

    pub fn window(&self) -> &Window {
        &self.ctx.window
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    pub fn panel(&self) -> &SharedPanel {
        &self.panel
    }

    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    pub fn composer_mut(&mut self) -> &mut EffectComposer {
        &mut self.composer
    }

    pub fn state(&self) -> LoopState {
        self.render_loop.state()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        self.resize
            .resize(&mut self.camera, &mut self.ctx, &mut self.composer, width, height)
    }

    /// Keys go to the control panel first; everything it does not consume
    /// reaches the orbit controls.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.keyboard.set_shift(modifiers.state().shift_key());
                false
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.keyboard.handle_key(&mut self.panel.borrow_mut(), event)
            }
            _ => self
                .controls
                .handle_event(event, &self.camera, self.ctx.config.height),
        }
    }

    /// Runs one iteration of the render loop.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let mut frame = Frame {
            ctx: &self.ctx,
            scene: &self.scene,
            camera: &mut self.camera,
            controls: &mut self.controls,
            renderer: &mut self.renderer,
            composer: &mut self.composer,
        };
        self.render_loop.tick(self.ctx.window.as_ref(), &mut frame)
    }

    pub fn stop(&mut self) {
        self.render_loop.stop();
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("size", &self.ctx.size())
            .field("state", &self.render_loop.state())
            .field("renderer", &self.renderer)
            .field("composer", &self.composer)
            .finish()
    }
}

struct Frame<'a> {
    ctx: &'a Context,
    scene: &'a SharedScene,
    camera: &'a mut PerspectiveCamera,
    controls: &'a mut OrbitControls,
    renderer: &'a mut SceneRenderer,
    composer: &'a mut EffectComposer,
}

impl FrameRenderer for Frame<'_> {
    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }
        self.controls.update(self.camera);
        if let Err(e) = self.renderer.prepare(
            &self.ctx.device,
            &self.ctx.queue,
            self.ctx.shading(),
            &self.scene.borrow(),
            self.camera,
        ) {
            log::error!("Unable to prepare the scene: {:#}", e);
        }
        self.composer.render(self.ctx, self.renderer, self.camera)
    }
}
