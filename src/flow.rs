//! Flow control and application event loop.
//!
//! A "flow" is one demo: it loads its programs and models, reacts to input
//! and records its draws each frame through a [`WgpuApi`]. [`run`] owns the
//! window, the GPU context and the event loop.
//!
//! # Lifecycle
//!
//! 1. The [`FlowConstructor`] runs once the window exists and loads assets asynchronously
//! 2. [`GraphicsFlow::on_init`] uploads meshes and creates GPU resources
//! 3. Window and device events are forwarded; an [`Out::Exit`] ends the loop
//! 4. Every frame: [`GraphicsFlow::on_render`], [`WgpuApi::submit`], present, sleep
//! 5. [`GraphicsFlow::on_exit`] releases what `on_init` created

use std::{fmt::Debug, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{config::DemoConfig, context::Context, render::WgpuApi};

/// Returned from event hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Out {
    /// Close the window and leave the event loop.
    Exit,
    #[default]
    Empty,
}

/// What a constructor gets to load assets with. Cheap to clone: the device
/// and queue are reference counted.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    pub framebuffer_size: (u32, u32),
    pub config: DemoConfig,
}

pub trait GraphicsFlow {
    /// Upload meshes and create GPU resources. Called once before the first frame.
    fn on_init(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()>;

    /// The framebuffer changed size; the context is already reconfigured.
    fn on_resize(&mut self, _ctx: &Context, _api: &mut WgpuApi) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent) -> Out;

    fn on_device_events(&mut self, ctx: &Context, event: &DeviceEvent) -> Out;

    /// Record this frame's draws.
    fn on_render(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()>;

    fn on_exit(&mut self, api: &mut WgpuApi);
}

impl Debug for dyn GraphicsFlow + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

pub type FlowFuture = Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow>>>>>;

/// Asynchronously builds the flow once the window and device exist.
pub type FlowConstructor = Box<dyn FnOnce(InitContext) -> FlowFuture>;

#[derive(Debug)]
struct AppState {
    ctx: Context,
    api: WgpuApi,
    flow: Box<dyn GraphicsFlow>,
}

impl AppState {
    fn render(&mut self, frame_delay: Duration) -> anyhow::Result<()> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.ctx.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.ctx.window.inner_size();
                self.resize(size)?;
                return Ok(());
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.flow.on_render(&self.ctx, &mut self.api)?;
        self.api.submit(
            &view,
            &self.ctx.depth_texture.view,
            self.ctx.surface_format(),
        );
        output.present();

        std::thread::sleep(frame_delay);
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> anyhow::Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        self.ctx.resize(size.width, size.height);
        self.flow.on_resize(&self.ctx, &mut self.api)
    }
}

struct App {
    async_runtime: tokio::runtime::Runtime,
    config: DemoConfig,
    constructor: Option<FlowConstructor>,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
    frames: u32,
    last_report: Instant,
}

impl App {
    fn new(config: DemoConfig, constructor: FlowConstructor) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            constructor: Some(constructor),
            state: None,
            error: None,
            frames: 0,
            last_report: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let mut ctx = self.async_runtime.block_on(Context::new(window))?;
        let size = ctx.window.inner_size();
        ctx.resize(size.width, size.height);

        let mut api = WgpuApi::new(&ctx.device, &ctx.queue);
        let init = InitContext {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            surface_format: ctx.surface_format(),
            framebuffer_size: ctx.framebuffer_size(),
            config: self.config.clone(),
        };
        let constructor = self
            .constructor
            .take()
            .ok_or_else(|| anyhow::anyhow!("the flow was already constructed"))?;
        let mut flow = self.async_runtime.block_on(constructor(init))?;
        flow.on_init(&ctx, &mut api)?;
        log::info!("{} initialised", self.config.title);
        Ok(AppState { ctx, api, flow })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                state.ctx.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn device_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let Out::Exit = state.flow.on_device_events(&state.ctx, &event) {
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        if let Out::Exit = state.flow.on_window_events(&state.ctx, &event) {
            event_loop.exit();
            return;
        }

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::RedrawRequested => {
                let result = state.render(self.config.frame_delay);
                self.frames += 1;
                let elapsed = self.last_report.elapsed();
                if elapsed >= Duration::from_secs(5) {
                    log::debug!(
                        "{:.1} frames per second",
                        self.frames as f64 / elapsed.as_secs_f64()
                    );
                    self.frames = 0;
                    self.last_report = Instant::now();
                }
                result
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &mut self.state {
            state.flow.on_exit(&mut state.api);
            log::info!("{} finished", self.config.title);
        }
    }
}

/// Opens the window and runs `constructor`'s flow until it exits.
///
/// Setup and render failures are logged and returned, so `main` can turn
/// them into a non-zero exit code.
pub fn run(config: DemoConfig, constructor: FlowConstructor) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, constructor)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
