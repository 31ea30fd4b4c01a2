use crate::{
    camera::PerspectiveCamera,
    context::Context,
    data_structures::texture::Texture,
    postprocessing::pass::{CopyPass, Pass, PassInputs},
    renderer::SceneRenderer,
    viewport::Resizable,
};

/// Renders the scene into an off-screen beauty target and runs the enabled
/// passes over it in order; the last one writes to the surface.
pub struct EffectComposer {
    device: wgpu::Device,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    beauty: Texture,
    depth: Texture,
    swap: [Texture; 2],
    passes: Vec<Box<dyn Pass>>,
    copy: CopyPass,
}

impl EffectComposer {
    /// `format` is the renderer's output format so that colour encoding is the
    /// same with and without post-processing.
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let (beauty, depth, swap) = create_targets(device, format, width, height);
        Self {
            device: device.clone(),
            format,
            size: (width, height),
            beauty,
            depth,
            swap,
            passes: Vec::new(),
            copy: CopyPass::new(device, format),
        }
    }

    pub fn add_pass(&mut self, mut pass: Box<dyn Pass>) {
        pass.set_size(self.size.0, self.size.1);
        self.passes.push(pass);
    }

    pub fn passes(&self) -> &[Box<dyn Pass>] {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut [Box<dyn Pass>] {
        &mut self.passes
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        let (beauty, depth, swap) = create_targets(&self.device, self.format, width, height);
        self.beauty = beauty;
        self.depth = depth;
        self.swap = swap;
        self.size = (width, height);
        for pass in &mut self.passes {
            pass.set_size(width, height);
        }
    }

    /// Produces one composed frame on the surface.
    pub fn render(
        &mut self,
        ctx: &Context,
        renderer: &SceneRenderer,
        camera: &PerspectiveCamera,
    ) -> Result<(), wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to(&ctx.device, &ctx.queue, renderer, camera, ctx.clear_colour, &view);
        output.present();
        Ok(())
    }

    /// Draws the scene and runs the passes into `view`, which must have the
    /// composer's format and size.
    pub fn render_to(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        renderer: &SceneRenderer,
        camera: &PerspectiveCamera,
        clear_colour: wgpu::Color,
        view: &wgpu::TextureView,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        renderer.render(&mut encoder, &self.beauty.view, &self.depth.view, clear_colour);

        let enabled = self.passes.iter().filter(|pass| pass.enabled()).count();
        if enabled == 0 {
            let inputs = PassInputs {
                color: &self.beauty,
                depth: &self.depth,
                camera,
            };
            self.copy.render(queue, &mut encoder, &inputs, view);
        } else {
            let mut read = &self.beauty;
            for (n, pass) in self.passes.iter_mut().filter(|pass| pass.enabled()).enumerate() {
                let last = n + 1 == enabled;
                let target = &self.swap[n % 2];
                let inputs = PassInputs {
                    color: read,
                    depth: &self.depth,
                    camera,
                };
                pass.render(queue, &mut encoder, &inputs, if last { view } else { &target.view });
                read = target;
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn beauty(&self) -> &Texture {
        &self.beauty
    }

    pub fn depth(&self) -> &Texture {
        &self.depth
    }
}

impl Resizable for EffectComposer {
    fn resize(&mut self, width: u32, height: u32) {
        self.set_size(width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl std::fmt::Debug for EffectComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectComposer")
            .field("format", &self.format)
            .field("size", &self.size)
            .field("passes", &self.passes.iter().map(|pass| pass.name()).collect::<Vec<_>>())
            .finish()
    }
}

fn create_targets(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> (Texture, Texture, [Texture; 2]) {
    let size = [width.max(1), height.max(1)];
    (
        Texture::create_render_target(device, size, format, "beauty"),
        Texture::create_depth_texture(device, size, "depth_texture"),
        [
            Texture::create_render_target(device, size, format, "composer_swap_a"),
            Texture::create_render_target(device, size, format, "composer_swap_b"),
        ],
    )
}
