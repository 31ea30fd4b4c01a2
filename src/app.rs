//! Event loop glue: creates the window, drives setup to completion on the
//! current platform and forwards window events to the [`Viewer`].

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{config::ViewerConfig, error::SetupError, viewer::Viewer};

/// Setup finishes asynchronously on the web and reports back through the
/// event loop.
pub enum ViewerEvent {
    Initialized(Box<Viewer>),
    Failed(SetupError),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    viewer: Option<Viewer>,
    started: bool,
}

impl App {
    pub fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            config,
            viewer: None,
            started: false,
        })
    }

    fn window_attributes(&self) -> Result<winit::window::WindowAttributes, SetupError> {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("scene-viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(&self.config.canvas_id))
                .ok_or(SetupError::MissingElement("canvas"))?;
            window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
        }

        Ok(window_attributes)
    }

    fn start(&mut self, viewer: Viewer) {
        let size = viewer.window().inner_size();
        let mut viewer = viewer;
        viewer.resize(size.width, size.height);
        viewer.window().request_redraw();
        self.viewer = Some(viewer);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SetupError) {
        log::error!("Viewer setup failed: {}", err);
        #[cfg(target_arch = "wasm32")]
        if err.is_capability_failure() {
            show_fallback_message(&err);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        let window = match self
            .window_attributes()
            .and_then(|attributes| event_loop.create_window(attributes).map_err(SetupError::from))
        {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err),
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let config = self.config.clone();
            match self.async_runtime.block_on(Viewer::new(window, &config)) {
                Ok(viewer) => self.start(viewer),
                Err(err) => self.fail(event_loop, err),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match Viewer::new(window, &config).await {
                    Ok(viewer) => ViewerEvent::Initialized(Box::new(viewer)),
                    Err(err) => ViewerEvent::Failed(err),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("event loop closed before setup finished");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(viewer) => self.start(*viewer),
            ViewerEvent::Failed(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let viewer = match &mut self.viewer {
            Some(viewer) => viewer,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                viewer.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                viewer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => match viewer.frame() {
                Ok(()) => {}
                // Reconfigure the surface if it's lost or outdated
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let size = viewer.window().inner_size();
                    viewer.resize(size.width, size.height);
                }
                Err(e) => {
                    log::error!("Unable to render {}", e);
                }
            },
            other => {
                viewer.handle_window_event(&other);
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn show_fallback_message(err: &SetupError) {
    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    let Some(body) = document.body() else {
        return;
    };
    if let Ok(message) = document.create_element("div") {
        message.set_id("webgl-error");
        message.set_text_content(Some(&format!(
            "This page needs WebGL 2, which your browser or graphics card does not provide ({}).",
            err
        )));
        let _ = message.set_attribute(
            "style",
            "position:absolute;top:40%;width:100%;text-align:center;font:16px sans-serif;color:#c00",
        );
        let _ = body.append_child(&message);
    }
}

/// Starts the logger and runs the viewer until its window is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }

    log::info!(
        "{} {} loading {} under {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.model,
        config.environment_map
    );

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
