//! Needs a GPU adapter; run with `--features integration-tests`.

#![cfg(feature = "integration-tests")]

mod common;

use std::path::{Path, PathBuf};

use cgmath::{Matrix4, SquareMatrix};
use common::test_utils::temp_dir;
use flow_demos::{
    data_structures::{mesh::Mesh, texture::Texture},
    gbuffer::{DEFERRED_LAYOUT, GBuffer, GBufferAttachment, GBufferError},
    gpu::{AttachmentDesc, GraphicsApi, TargetStatus},
    pipelines::{
        ProgramDesc, ShaderError, ShaderProgram, ShaderStage, UniformTable,
        basic::scene_viewer_program,
        deferred::{geometry_program, lighting_program},
        forward::lit_program,
    },
    render::WgpuApi,
};

const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

async fn device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .expect("no adapter");
    adapter
        .request_device(&wgpu::DeviceDescriptor::default())
        .await
        .expect("no device")
}

fn root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn gbuffer_formats() -> Vec<wgpu::TextureFormat> {
    DEFERRED_LAYOUT.iter().map(|a| a.desc.format).collect()
}

const FLAT_VS: &str = "
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
";

const FLAT_FS: &str = "
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
";

/// Writes `shaders/<program>/Test.{vs,fs}.wgsl` under a fresh asset root.
fn write_program(program: &'static str, vs: &str, fs: &str) -> (PathBuf, ProgramDesc) {
    let root = temp_dir(&format!("shaders-{}", program.to_lowercase()));
    let dir = root.join("shaders").join(program);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("Test.vs.wgsl"), vs).unwrap();
    std::fs::write(dir.join("Test.fs.wgsl"), fs).unwrap();
    let desc = ProgramDesc {
        program,
        stage: "Test",
        uniforms: UniformTable::new(),
    };
    (root, desc)
}

fn color_attachment(format: wgpu::TextureFormat) -> AttachmentDesc {
    AttachmentDesc {
        format,
        filter: wgpu::FilterMode::Nearest,
    }
}

#[tokio::test]
async fn bundled_programs_compile_and_link() {
    let (device, _queue) = device().await;

    ShaderProgram::load(
        &device,
        root(),
        &scene_viewer_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("scene viewer program");
    ShaderProgram::load(
        &device,
        root(),
        &geometry_program(),
        &gbuffer_formats(),
        Some(Texture::DEPTH_STENCIL_FORMAT),
    )
    .await
    .expect("geometry program");
    ShaderProgram::load(
        &device,
        root(),
        &lighting_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("lighting program");
    ShaderProgram::load(
        &device,
        root(),
        &lit_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("forward program");
}

#[tokio::test]
async fn linking_keeps_the_pipeline_for_its_formats() {
    let (device, _queue) = device().await;
    let program = ShaderProgram::load(
        &device,
        root(),
        &scene_viewer_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("scene viewer program");

    assert!(program.is_linked_for(&[FRAME_FORMAT], Some(Texture::DEPTH_FORMAT)));
    assert!(!program.is_linked_for(&[FRAME_FORMAT], None));
    assert!(!program.is_linked_for(&gbuffer_formats(), Some(Texture::DEPTH_STENCIL_FORMAT)));
}

#[tokio::test]
async fn malformed_vertex_shader_is_a_compile_error() {
    let (device, _queue) = device().await;
    let (root, desc) = write_program("Malformed", "@vertex fn vs_main( -> {", FLAT_FS);

    let err = ShaderProgram::load(&device, &root, &desc, &[FRAME_FORMAT], None)
        .await
        .expect_err("does not compile");
    match err {
        ShaderError::Compile { stage, path, log } => {
            assert_eq!(stage, ShaderStage::Vertex);
            assert!(path.ends_with("shaders/Malformed/Test.vs.wgsl"), "{}", path.display());
            assert!(!log.is_empty());
        }
        other => panic!("expected a compile error, got {other}"),
    }
}

#[tokio::test]
async fn uniform_block_larger_than_its_table_fails_to_link() {
    let (device, _queue) = device().await;
    let vs = "
struct Uniforms {
    modelMat: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.modelMat * vec4<f32>(position, 1.0);
}
";
    let (root, mut desc) = write_program("OversizedBlock", vs, FLAT_FS);
    // 16 bytes declared, 64 read by the shader
    desc.uniforms = UniformTable::new().vec4("tint");

    let err = ShaderProgram::load(&device, &root, &desc, &[FRAME_FORMAT], None)
        .await
        .expect_err("block does not fit");
    match err {
        ShaderError::Link { program, log } => {
            assert_eq!(program, "OversizedBlock/Test");
            assert!(!log.is_empty());
        }
        other => panic!("expected a link error, got {other}"),
    }
}

#[tokio::test]
async fn fragment_inputs_without_vertex_outputs_fail_to_link() {
    let (device, _queue) = device().await;
    let fs = "
@fragment
fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
";
    let (root, desc) = write_program("MissingVarying", FLAT_VS, fs);

    let err = ShaderProgram::load(&device, &root, &desc, &[FRAME_FORMAT], None)
        .await
        .expect_err("stages do not fit together");
    assert!(matches!(err, ShaderError::Link { .. }), "{err}");
}

#[tokio::test]
async fn missing_shader_is_a_read_error() {
    let (device, _queue) = device().await;
    let desc = ProgramDesc {
        program: "Nowhere",
        stage: "Nothing",
        uniforms: UniformTable::new(),
    };

    let err = ShaderProgram::load(&device, root(), &desc, &[FRAME_FORMAT], None)
        .await
        .expect_err("no such file");
    assert!(matches!(err, ShaderError::Read { .. }));
}

#[tokio::test]
async fn deferred_frame_replays_without_validation_errors() {
    let (device, queue) = device().await;
    let geo = ShaderProgram::load(
        &device,
        root(),
        &geometry_program(),
        &gbuffer_formats(),
        Some(Texture::DEPTH_STENCIL_FORMAT),
    )
    .await
    .expect("geometry program");
    let light = ShaderProgram::load(
        &device,
        root(),
        &lighting_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("lighting program");

    let mut api = WgpuApi::new(&device, &queue);
    let mut gbuffer =
        GBuffer::create(&mut api, 64, 64, &light, &DEFERRED_LAYOUT).expect("complete G-buffer");
    let cylinder = api.create_mesh(&Mesh::cylinder(7.0, 2.0, 36));
    let quad = api.create_mesh(&Mesh::screen_quad(1.0));

    let frame = Texture::create_color_attachment(
        &device,
        [64, 64],
        &flow_demos::gpu::AttachmentDesc {
            format: FRAME_FORMAT,
            filter: wgpu::FilterMode::Nearest,
        },
        "frame",
    );
    assert!(frame.renderable);
    let depth = Texture::create_depth_texture(&device, [64, 64], Texture::DEPTH_FORMAT, "depth");

    gbuffer.begin_geometry_pass(&mut api).expect("geometry");
    api.clear(wgpu::Color::BLACK);
    api.use_program(Some(&geo));
    if let Some(location) = api.uniform_location(&geo, "modelMat") {
        api.set_uniform_mat4(location, &Matrix4::identity());
    }
    api.draw_mesh(&cylinder);
    gbuffer.end_geometry_pass(&mut api).expect("geometry done");

    api.use_program(Some(&light));
    gbuffer.begin_lighting_pass(&mut api).expect("lighting");
    api.clear(wgpu::Color::BLUE);
    api.draw_mesh(&quad);
    gbuffer.end_lighting_pass(&mut api).expect("idle");
    assert_eq!(api.recorded_draws(), 2);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    api.submit(&frame.view, &depth.view, FRAME_FORMAT);
    let error = device.pop_error_scope().await;
    assert!(error.is_none(), "validation error: {error:?}");
    assert_eq!(api.recorded_draws(), 0);

    gbuffer.destroy(&mut api);
}

async fn viewer_setup() -> (wgpu::Device, WgpuApi, ShaderProgram) {
    let (device, queue) = device().await;
    let program = ShaderProgram::load(
        &device,
        root(),
        &scene_viewer_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("scene viewer program");
    let api = WgpuApi::new(&device, &queue);
    (device, api, program)
}

#[tokio::test]
async fn clear_drops_the_draws_of_its_pass() {
    let (_device, mut api, program) = viewer_setup().await;
    let quad = api.create_mesh(&Mesh::quad());

    api.bind_target(None);
    api.use_program(Some(&program));
    api.draw_mesh(&quad);
    api.draw_mesh(&quad);
    assert_eq!(api.recorded_draws(), 2);

    api.clear(wgpu::Color::BLACK);
    assert_eq!(api.recorded_draws(), 0);

    api.draw_mesh(&quad);
    assert_eq!(api.recorded_draws(), 1);
    assert_eq!(api.recorded_passes(), 1);
}

#[tokio::test]
async fn binding_another_target_starts_a_pass() {
    let (device, mut api, program) = viewer_setup().await;
    let quad = api.create_mesh(&Mesh::quad());
    let mut target = api.create_target(32, 32);
    let _color = api.attach_color(&mut target, 0, &color_attachment(FRAME_FORMAT));
    api.attach_depth_stencil(&mut target);
    api.set_draw_buffers(&mut target, 1);
    assert_eq!(api.target_status(&target), TargetStatus::Complete);

    api.use_program(Some(&program));
    api.bind_target(None);
    api.draw_mesh(&quad);
    api.bind_target(Some(&target));
    api.clear(wgpu::Color::BLACK);
    api.draw_mesh(&quad);
    // rebinding the same target keeps recording into its pass
    api.bind_target(Some(&target));
    api.draw_mesh(&quad);
    api.bind_target(None);
    api.draw_mesh(&quad);
    assert_eq!(api.recorded_passes(), 3);
    assert_eq!(api.recorded_draws(), 4);

    let frame = Texture::create_color_attachment(
        &device,
        [32, 32],
        &color_attachment(FRAME_FORMAT),
        "frame",
    );
    let depth = Texture::create_depth_texture(&device, [32, 32], Texture::DEPTH_FORMAT, "depth");
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    api.submit(&frame.view, &depth.view, FRAME_FORMAT);
    let error = device.pop_error_scope().await;
    assert!(error.is_none(), "validation error: {error:?}");
    assert_eq!(api.recorded_passes(), 0);

    api.destroy_target(target);
}

#[tokio::test]
async fn unbound_units_fall_back_to_one_white_pixel() {
    let (device, queue) = device().await;
    let mut api = WgpuApi::new(&device, &queue);

    let fallback = api.bound_texture(3);
    assert_eq!(fallback.size(), (1, 1));
    assert_eq!(fallback.format(), wgpu::TextureFormat::Rgba8Unorm);

    let red = Texture::solid(
        &device,
        &queue,
        4,
        4,
        [255, 0, 0, 255],
        wgpu::TextureFormat::Rgba8Unorm,
        "red",
    );
    api.bind_texture(3, Some(&red));
    assert_eq!(api.bound_texture(3).size(), (4, 4));
    assert_eq!(api.bound_texture(2).size(), (1, 1));

    api.bind_texture(3, None);
    assert_eq!(api.bound_texture(3).size(), (1, 1));

    api.bind_texture(1, Some(&red));
    api.destroy_texture(red);
    assert_eq!(api.bound_texture(1).size(), (1, 1));
}

#[tokio::test]
async fn target_status_reports_each_incompleteness() {
    let (device, queue) = device().await;
    let mut api = WgpuApi::new(&device, &queue);
    let half = color_attachment(wgpu::TextureFormat::Rgba16Float);

    let empty = api.create_target(16, 16);
    assert_eq!(api.target_status(&empty), TargetStatus::MissingAttachment);

    let mut target = api.create_target(16, 16);
    for slot in 0..3 {
        api.attach_color(&mut target, slot, &half);
    }
    api.attach_depth_stencil(&mut target);
    api.set_draw_buffers(&mut target, 2);
    assert_eq!(api.target_status(&target), TargetStatus::DrawBufferMismatch);
    api.set_draw_buffers(&mut target, 3);
    assert_eq!(api.target_status(&target), TargetStatus::Complete);

    let mut gap = api.create_target(16, 16);
    api.attach_color(&mut gap, 1, &half);
    api.set_draw_buffers(&mut gap, 2);
    assert_eq!(api.target_status(&gap), TargetStatus::IncompleteAttachment(0));

    let mut shared_exponent = api.create_target(16, 16);
    api.attach_color(
        &mut shared_exponent,
        0,
        &color_attachment(wgpu::TextureFormat::Rgb9e5Ufloat),
    );
    api.set_draw_buffers(&mut shared_exponent, 1);
    assert_eq!(
        api.target_status(&shared_exponent),
        TargetStatus::IncompleteAttachment(0)
    );

    let limit = device.limits().max_color_attachments;
    let mut crowded = api.create_target(16, 16);
    api.attach_color(&mut crowded, limit, &half);
    api.set_draw_buffers(&mut crowded, limit + 1);
    assert_eq!(api.target_status(&crowded), TargetStatus::TooManyAttachments);
}

#[tokio::test]
async fn unrenderable_gbuffer_layout_is_rejected() {
    let (device, queue) = device().await;
    let light = ShaderProgram::load(
        &device,
        root(),
        &lighting_program(),
        &[FRAME_FORMAT],
        Some(Texture::DEPTH_FORMAT),
    )
    .await
    .expect("lighting program");
    let mut api = WgpuApi::new(&device, &queue);

    let mut layout = DEFERRED_LAYOUT;
    layout[1] = GBufferAttachment {
        name: "gNormal",
        desc: color_attachment(wgpu::TextureFormat::Rgb9e5Ufloat),
    };
    let result = GBuffer::create(&mut api, 64, 64, &light, &layout);
    assert!(matches!(
        result,
        Err(GBufferError::Incomplete(TargetStatus::IncompleteAttachment(1)))
    ));
}
