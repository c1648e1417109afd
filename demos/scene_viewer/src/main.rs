//! Renders an OBJ or glTF scene graph with a fly camera.
//!
//! `scene_viewer [MODEL]`; defaults to `sampleModels/sphere.obj`.
//! J/K spin every node, WASD moves, the mouse looks around, Escape quits.

use std::process::ExitCode;

use flow_demos::{
    camera::{Camera, CursorTracker},
    cgmath::Vector3,
    config::DemoConfig,
    context::Context,
    data_structures::{
        scene_graph::{Scene, Spin, render_root},
        texture::Texture,
    },
    flow::{self, FlowFuture, GraphicsFlow, InitContext, Out},
    gpu::{GraphicsApi, UniformLocation},
    pipelines::{ShaderProgram, basic::scene_viewer_program},
    render::{GpuMesh, WgpuApi},
    resources, wgpu,
    winit::{
        event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
        keyboard::{KeyCode, PhysicalKey},
    },
};

const DEFAULT_MODEL: &str = "sampleModels/sphere.obj";

#[derive(Clone, Copy, Debug, Default)]
struct Locations {
    model: Option<UniformLocation>,
    view: Option<UniformLocation>,
    proj: Option<UniformLocation>,
}

struct SceneViewer {
    scene: Scene,
    program: ShaderProgram,
    meshes: Vec<GpuMesh>,
    locations: Locations,
    camera: Camera,
    cursor: CursorTracker,
    clear_colour: wgpu::Color,
}

impl SceneViewer {
    async fn new(init: InitContext) -> anyhow::Result<Self> {
        let path = init
            .config
            .model_path(std::env::args().skip(1), DEFAULT_MODEL);
        let scene = resources::load_scene(&path)?;
        let program = ShaderProgram::load(
            &init.device,
            &init.config.asset_root,
            &scene_viewer_program(),
            &[init.surface_format],
            Some(Texture::DEPTH_FORMAT),
        )
        .await?;
        Ok(Self {
            scene,
            program,
            meshes: Vec::new(),
            locations: Locations::default(),
            camera: Camera::default(),
            cursor: CursorTracker::default(),
            clear_colour: init.config.clear_colour,
        })
    }
}

impl GraphicsFlow for SceneViewer {
    fn on_init(&mut self, _ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        self.meshes = self.scene.upload(api);
        self.locations = Locations {
            model: api.uniform_location(&self.program, "modelMat"),
            view: api.uniform_location(&self.program, "viewMat"),
            proj: api.uniform_location(&self.program, "projMat"),
        };
        log::debug!("uniform locations: {:?}", self.locations);
        Ok(())
    }

    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent) -> Out {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if *code == KeyCode::Escape {
                    return Out::Exit;
                }
                if self.camera.handle_key(*code) {
                    log::debug!(
                        "eye {:?}, look at {:?}, spin {:?}",
                        self.camera.eye,
                        self.camera.look_at,
                        self.camera.rot_angle
                    );
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(delta) = self.cursor.moved(*position) {
                    self.camera.mouse_look(delta, ctx.framebuffer_size());
                }
            }
            WindowEvent::CursorLeft { .. } => self.cursor.reset(),
            _ => {}
        }
        Out::Empty
    }

    fn on_device_events(&mut self, _ctx: &Context, _event: &DeviceEvent) -> Out {
        Out::Empty
    }

    fn on_render(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        api.bind_target(None);
        api.clear(self.clear_colour);
        api.use_program(Some(&self.program));
        if let Some(view) = self.locations.view {
            api.set_uniform_mat4(view, &self.camera.view_matrix());
        }
        if let Some(proj) = self.locations.proj {
            api.set_uniform_mat4(proj, &self.camera.projection(ctx.framebuffer_size()));
        }
        let spin = Spin::new(Vector3::unit_z(), self.camera.rot_angle);
        render_root(api, &self.scene, self.locations.model, &self.meshes, &spin);
        api.use_program(None);
        Ok(())
    }

    fn on_exit(&mut self, api: &mut WgpuApi) {
        for mesh in self.meshes.drain(..) {
            api.destroy_mesh(mesh);
        }
    }
}

fn main() -> ExitCode {
    let config = DemoConfig::new("Scene viewer").with_clear_colour(wgpu::Color {
        r: 0.25,
        g: 0.0,
        b: 0.25,
        a: 1.0,
    });
    let constructor = Box::new(|init: InitContext| -> FlowFuture {
        Box::pin(async move {
            let flow: Box<dyn GraphicsFlow> = Box::new(SceneViewer::new(init).await?);
            Ok(flow)
        })
    });
    match flow::run(config, constructor) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
