//! Deferred shading of a cylinder lit by a ring of point lights.
//!
//! Q/E rotate, F/G and R/T scale, WASD translate, Space resets. Dragging the
//! mouse spins the model about Y, or about X with the left button held.

use std::process::ExitCode;

use flow_demos::{
    camera::{CursorTracker, ModelControls, aspect, normal_matrix, perspective},
    cgmath::{Deg, Matrix4, Point3, Vector3},
    context::Context,
    config::DemoConfig,
    data_structures::{mesh::Mesh, texture::Texture},
    flow::{self, FlowFuture, GraphicsFlow, InitContext, Out},
    gbuffer::{DEFERRED_LAYOUT, GBuffer},
    gpu::{GraphicsApi, UniformLocation},
    pipelines::{
        ShaderProgram,
        deferred::{MAX_LIGHTS, geometry_program, lighting_program},
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

#[derive(Clone, Copy, Debug, Default)]
struct GeoLocations {
    model: Option<UniformLocation>,
    view: Option<UniformLocation>,
    proj: Option<UniformLocation>,
    normal: Option<UniformLocation>,
    diffuse: Option<UniformLocation>,
    normal_map: Option<UniformLocation>,
}

struct Deferred {
    geo: ShaderProgram,
    light: ShaderProgram,
    diffuse: Texture,
    normal_map: Texture,
    lights: Vec<PointLight>,
    light_table: LightTable,
    locations: GeoLocations,
    cylinder: Option<GpuMesh>,
    quad: Option<GpuMesh>,
    gbuffer: Option<GBuffer<WgpuApi>>,
    controls: ModelControls,
    cursor: CursorTracker,
}

impl Deferred {
    async fn new(init: InitContext) -> anyhow::Result<Self> {
        let root = &init.config.asset_root;
        let gbuffer_formats: Vec<_> = DEFERRED_LAYOUT.iter().map(|a| a.desc.format).collect();
        let geo_desc = geometry_program();
        let light_desc = lighting_program();
        let light_formats = [init.surface_format];
        let (geo, light) = futures::try_join!(
            ShaderProgram::load(
                &init.device,
                root,
                &geo_desc,
                &gbuffer_formats,
                Some(Texture::DEPTH_STENCIL_FORMAT),
            ),
            ShaderProgram::load(
                &init.device,
                root,
                &light_desc,
                &light_formats,
                Some(Texture::DEPTH_FORMAT),
            ),
        )?;

        Ok(Self {
            geo,
            light,
            diffuse: Texture::create_default_diffuse(&init.device, &init.queue),
            normal_map: Texture::create_default_normal_map(&init.device, &init.queue),
            lights: PointLight::ring(MAX_LIGHTS, 4.0, 0.1),
            light_table: LightTable::default(),
            locations: GeoLocations::default(),
            cylinder: None,
            quad: None,
            gbuffer: None,
            controls: ModelControls::default(),
            cursor: CursorTracker::default(),
        })
    }

    fn recreate_gbuffer(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        if let Some(old) = self.gbuffer.take() {
            old.destroy(api);
        }
        let (width, height) = ctx.framebuffer_size();
        self.gbuffer = Some(GBuffer::create(
            api,
            width,
            height,
            &self.light,
            &DEFERRED_LAYOUT,
        )?);
        Ok(())
    }
}

impl GraphicsFlow for Deferred {
    fn on_init(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        self.cylinder = Some(api.create_mesh(&Mesh::cylinder(7.0, 2.0, 36)));
        self.quad = Some(api.create_mesh(&Mesh::screen_quad(1.0)));

        self.locations = GeoLocations {
            model: api.uniform_location(&self.geo, "modelMat"),
            view: api.uniform_location(&self.geo, "viewMat"),
            proj: api.uniform_location(&self.geo, "projMat"),
            normal: api.uniform_location(&self.geo, "normalMat"),
            diffuse: api.uniform_location(&self.geo, "diffuseTexture"),
            normal_map: api.uniform_location(&self.geo, "normalTexture"),
        };
        log::debug!("geometry locations: {:?}", self.locations);
        self.light_table = LightTable::resolve(api, &self.light, self.lights.len());

        self.recreate_gbuffer(ctx, api)
    }

    fn on_resize(&mut self, ctx: &Context, api: &mut WgpuApi) -> anyhow::Result<()> {
        self.recreate_gbuffer(ctx, api)
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
        let (Some(gbuffer), Some(cylinder), Some(quad)) =
            (self.gbuffer.as_mut(), self.cylinder.as_ref(), self.quad.as_ref())
        else {
            return Ok(());
        };

        let model = self.controls.model();
        let view = Matrix4::look_at_rh(
            Point3::new(0.0, 7.0, 7.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        );
        let proj = perspective(Deg(90.0), aspect(ctx.framebuffer_size()), ZNEAR, ZFAR);

        gbuffer.begin_geometry_pass(api)?;
        api.clear(wgpu::Color::BLACK);
        api.use_program(Some(&self.geo));
        let l = self.locations;
        for (location, value) in [(l.model, &model), (l.view, &view), (l.proj, &proj)] {
            if let Some(location) = location {
                api.set_uniform_mat4(location, value);
            }
        }
        if let Some(location) = l.normal {
            api.set_uniform_mat3(location, &normal_matrix(&(view * model)));
        }
        api.bind_texture(0, Some(&self.diffuse));
        if let Some(location) = l.diffuse {
            api.set_uniform_sampler(location, 0);
        }
        api.bind_texture(1, Some(&self.normal_map));
        if let Some(location) = l.normal_map {
            api.set_uniform_sampler(location, 1);
        }
        api.draw_mesh(cylinder);
        gbuffer.end_geometry_pass(api)?;

        api.use_program(Some(&self.light));
        gbuffer.begin_lighting_pass(api)?;
        api.clear(wgpu::Color::BLUE);
        self.light_table.upload(api, &self.lights, &view);
        api.draw_mesh(quad);
        gbuffer.end_lighting_pass(api)?;
        api.use_program(None);
        Ok(())
    }

    fn on_exit(&mut self, api: &mut WgpuApi) {
        if let Some(gbuffer) = self.gbuffer.take() {
            gbuffer.destroy(api);
        }
        for mesh in [self.cylinder.take(), self.quad.take()].into_iter().flatten() {
            api.destroy_mesh(mesh);
        }
        log::info!("final model transform: {}", self.controls.description());
    }
}

fn main() -> ExitCode {
    let config = DemoConfig::new("Deferred shading");
    let constructor = Box::new(|init: InitContext| -> FlowFuture {
        Box::pin(async move {
            let flow: Box<dyn GraphicsFlow> = Box::new(Deferred::new(init).await?);
            Ok(flow)
        })
    });
    match flow::run(config, constructor) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
