//! Forward shading of a cylinder, a quad and a pentagon lit by one point light.
//!
//! Q/E rotate, F/G and R/T scale, WASD translate, Space resets the cylinder.
//! Dragging the mouse spins it about Y, or about X with the left button held.

use std::process::ExitCode;

use flow_demos::{
    camera::{CursorTracker, ModelControls, aspect, normal_matrix, perspective},
    cgmath::{Deg, Matrix4, Point3, Vector3, Vector4},
    config::DemoConfig,
    context::Context,
    data_structures::{
        mesh::{Mesh, compute_all_normals},
        texture::Texture,
    },
    flow::{self, FlowFuture, GraphicsFlow, InitContext, Out},
    gpu::{GraphicsApi, UniformLocation},
    pipelines::{
        ShaderProgram,
        forward::lit_program,
        light::{LightTable, PointLight},
    },
    render::{GpuMesh, WgpuApi},
    wgpu,
    winit::{
        event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent},
        keyboard::{KeyCode, PhysicalKey},
    },
};

const ZNEAR: f32 = 0.1;
const ZFAR: f32 = 1000.0;
const CLEAR: wgpu::Color = wgpu::Color {
    r: 1.0,
    g: 1.0,
    b: 0.0,
    a: 1.0,
};

#[derive(Clone, Copy, Debug, Default)]
struct Locations {
    model: Option<UniformLocation>,
    view: Option<UniformLocation>,
    proj: Option<UniformLocation>,
    normal: Option<UniformLocation>,
    diffuse: Option<UniformLocation>,
    normal_map: Option<UniformLocation>,
}

/// A mesh drawn with a fixed placement next to the cylinder.
struct Prop {
    mesh: GpuMesh,
    model: Matrix4<f32>,
}

struct Forward {
    program: ShaderProgram,
    diffuse: Texture,
    normal_map: Texture,
    light: PointLight,
    light_table: LightTable,
    locations: Locations,
    cylinder: Option<GpuMesh>,
    props: Vec<Prop>,
    controls: ModelControls,
    cursor: CursorTracker,
}

impl Forward {
    async fn new(init: InitContext) -> anyhow::Result<Self> {
        let program = ShaderProgram::load(
            &init.device,
            &init.config.asset_root,
            &lit_program(),
            &[init.surface_format],
            Some(Texture::DEPTH_FORMAT),
        )
        .await?;
        Ok(Self {
            program,
            diffuse: Texture::create_default_diffuse(&init.device, &init.queue),
            normal_map: Texture::create_default_normal_map(&init.device, &init.queue),
            light: PointLight {
                position: Vector4::new(0.0, 20.0, 0.0, 1.0),
                ..Default::default()
            },
            light_table: LightTable::default(),
            locations: Locations::default(),
            cylinder: None,
            props: Vec::new(),
            controls: ModelControls::default(),
            cursor: CursorTracker::default(),
        })
    }

    fn upload_flat(api: &mut WgpuApi, mut mesh: Mesh, model: Matrix4<f32>) -> Prop {
        compute_all_normals(&mut mesh);
        Prop {
            mesh: api.create_mesh(&mesh),
            model,
        }
    }

    fn set_model(&self, api: &mut WgpuApi, model: &Matrix4<f32>, view: &Matrix4<f32>) {
        if let Some(location) = self.locations.model {
            api.set_uniform_mat4(location, model);
        }
        if let Some(location) = self.locations.normal {
            api.set_uniform_mat3(location, &normal_matrix(&(view * model)));
        }
    }
}

impl GraphicsFlow for Forward {
    fn on_init(&mut self, _ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        self.cylinder = Some(api.create_mesh(&Mesh::cylinder(7.0, 2.0, 36)));
        self.props = vec![
            Self::upload_flat(
                api,
                Mesh::quad(),
                Matrix4::from_translation(Vector3::new(-1.5, 3.0, 0.0)) * Matrix4::from_scale(2.0),
            ),
            Self::upload_flat(
                api,
                Mesh::pentagon(),
                Matrix4::from_translation(Vector3::new(1.5, 3.0, 0.0)) * Matrix4::from_scale(2.0),
            ),
        ];

        self.locations = Locations {
            model: api.uniform_location(&self.program, "modelMat"),
            view: api.uniform_location(&self.program, "viewMat"),
            proj: api.uniform_location(&self.program, "projMat"),
            normal: api.uniform_location(&self.program, "normalMat"),
            diffuse: api.uniform_location(&self.program, "diffuseTexture"),
            normal_map: api.uniform_location(&self.program, "normalTexture"),
        };
        log::debug!("uniform locations: {:?}", self.locations);
        self.light_table = LightTable::resolve(api, &self.program, 1);
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
                self.controls.handle_key(*code);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.controls.set_left_button(state.is_pressed()),
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(delta) = self.cursor.moved(*position) {
                    self.controls.handle_mouse(delta, ctx.framebuffer_size());
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
        let Some(cylinder) = self.cylinder.as_ref() else {
            return Ok(());
        };

        let view = Matrix4::look_at_rh(
            Point3::new(4.0, 4.0, 4.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );
        let proj = perspective(Deg(90.0), aspect(ctx.framebuffer_size()), ZNEAR, ZFAR);

        api.bind_target(None);
        api.clear(CLEAR);
        api.use_program(Some(&self.program));
        let l = self.locations;
        for (location, value) in [(l.view, &view), (l.proj, &proj)] {
            if let Some(location) = location {
                api.set_uniform_mat4(location, value);
            }
        }
        self.light_table
            .upload(api, std::slice::from_ref(&self.light), &view);
        api.bind_texture(0, Some(&self.diffuse));
        if let Some(location) = l.diffuse {
            api.set_uniform_sampler(location, 0);
        }
        api.bind_texture(1, Some(&self.normal_map));
        if let Some(location) = l.normal_map {
            api.set_uniform_sampler(location, 1);
        }

        self.set_model(api, &self.controls.model(), &view);
        api.draw_mesh(cylinder);
        for prop in &self.props {
            self.set_model(api, &prop.model, &view);
            api.draw_mesh(&prop.mesh);
        }
        api.use_program(None);
        Ok(())
    }

    fn on_exit(&mut self, api: &mut WgpuApi) {
        let props = self.props.drain(..).map(|prop| prop.mesh);
        for mesh in self.cylinder.take().into_iter().chain(props) {
            api.destroy_mesh(mesh);
        }
        log::info!("final model transform: {}", self.controls.description());
    }
}

fn main() -> ExitCode {
    let config = DemoConfig::new("Forward shading");
    let constructor = Box::new(|init: InitContext| -> FlowFuture {
        Box::pin(async move {
            let flow: Box<dyn GraphicsFlow> = Box::new(Forward::new(init).await?);
            Ok(flow)
        })
    });
    match flow::run(config, constructor) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
