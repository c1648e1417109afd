#![allow(dead_code)]

use cgmath::{Matrix3, Matrix4, Vector4};
use flow_demos::{
    data_structures::mesh::Mesh,
    gpu::{AttachmentDesc, GraphicsApi, TargetStatus, UniformLocation},
};

pub const EPSILON: f32 = 1e-5;

/// One recorded call against [`RecordingApi`]. Meshes, textures and targets
/// are identified by the id the recorder handed out.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateMesh(usize),
    DestroyMesh(usize),
    UseProgram(Option<String>),
    SetMat4(UniformLocation, Matrix4<f32>),
    SetMat3(UniformLocation, Matrix3<f32>),
    SetVec4(UniformLocation, Vector4<f32>),
    SetSampler(UniformLocation, u32),
    BindTexture(u32, Option<usize>),
    Clear,
    Draw(usize),
    CreateTarget(usize, u32, u32),
    AttachColor { target: usize, slot: u32, texture: usize },
    AttachDepthStencil(usize),
    SetDrawBuffers(usize, u32),
    BindTarget(Option<usize>),
    DestroyTarget(usize),
    DestroyTexture(usize),
}

/// Uniform locations are the positions in `uniforms`.
#[derive(Clone, Debug, PartialEq)]
pub struct FakeProgram {
    pub name: String,
    pub uniforms: Vec<String>,
}

impl FakeProgram {
    pub fn new(name: &str, uniforms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            uniforms: uniforms.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeMesh(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeTexture(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeTarget {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<u32>,
    pub depth: bool,
    pub draw_buffers: u32,
}

/// A [`GraphicsApi`] that only records what it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingApi {
    pub calls: Vec<Call>,
    /// Reports every target as incomplete.
    pub force_incomplete: bool,
    next_id: usize,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    pub fn draws(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn mat4_uploads(&self, location: UniformLocation) -> Vec<Matrix4<f32>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetMat4(l, m) if *l == location => Some(*m),
                _ => None,
            })
            .collect()
    }

    pub fn vec4_uploads(&self, location: UniformLocation) -> Vec<Vector4<f32>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetVec4(l, v) if *l == location => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl GraphicsApi for RecordingApi {
    type Program = FakeProgram;
    type Mesh = FakeMesh;
    type Texture = FakeTexture;
    type Target = FakeTarget;

    fn create_mesh(&mut self, _mesh: &Mesh) -> FakeMesh {
        let id = self.next_id();
        self.calls.push(Call::CreateMesh(id));
        FakeMesh(id)
    }

    fn destroy_mesh(&mut self, mesh: FakeMesh) {
        self.calls.push(Call::DestroyMesh(mesh.0));
    }

    fn uniform_location(&self, program: &FakeProgram, name: &str) -> Option<UniformLocation> {
        program
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn use_program(&mut self, program: Option<&FakeProgram>) {
        self.calls
            .push(Call::UseProgram(program.map(|p| p.name.clone())));
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Matrix4<f32>) {
        self.calls.push(Call::SetMat4(location, *value));
    }

    fn set_uniform_mat3(&mut self, location: UniformLocation, value: &Matrix3<f32>) {
        self.calls.push(Call::SetMat3(location, *value));
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: &Vector4<f32>) {
        self.calls.push(Call::SetVec4(location, *value));
    }

    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        self.calls.push(Call::SetSampler(location, unit));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&FakeTexture>) {
        self.calls.push(Call::BindTexture(unit, texture.map(|t| t.0)));
    }

    fn clear(&mut self, _color: wgpu::Color) {
        self.calls.push(Call::Clear);
    }

    fn draw_mesh(&mut self, mesh: &FakeMesh) {
        self.calls.push(Call::Draw(mesh.0));
    }

    fn create_target(&mut self, width: u32, height: u32) -> FakeTarget {
        let id = self.next_id();
        self.calls.push(Call::CreateTarget(id, width, height));
        FakeTarget {
            id,
            width,
            height,
            colors: Vec::new(),
            depth: false,
            draw_buffers: 0,
        }
    }

    fn attach_color(
        &mut self,
        target: &mut FakeTarget,
        slot: u32,
        _desc: &AttachmentDesc,
    ) -> FakeTexture {
        let texture = self.next_id();
        target.colors.push(slot);
        self.calls.push(Call::AttachColor {
            target: target.id,
            slot,
            texture,
        });
        FakeTexture(texture)
    }

    fn attach_depth_stencil(&mut self, target: &mut FakeTarget) {
        target.depth = true;
        self.calls.push(Call::AttachDepthStencil(target.id));
    }

    fn set_draw_buffers(&mut self, target: &mut FakeTarget, count: u32) {
        target.draw_buffers = count;
        self.calls.push(Call::SetDrawBuffers(target.id, count));
    }

    fn target_status(&self, target: &FakeTarget) -> TargetStatus {
        if self.force_incomplete {
            TargetStatus::IncompleteAttachment(0)
        } else if target.colors.is_empty() && !target.depth {
            TargetStatus::MissingAttachment
        } else if target.colors.len() as u32 != target.draw_buffers {
            TargetStatus::DrawBufferMismatch
        } else {
            TargetStatus::Complete
        }
    }

    fn bind_target(&mut self, target: Option<&FakeTarget>) {
        self.calls.push(Call::BindTarget(target.map(|t| t.id)));
    }

    fn destroy_target(&mut self, target: FakeTarget) {
        self.calls.push(Call::DestroyTarget(target.id));
    }

    fn destroy_texture(&mut self, texture: FakeTexture) {
        self.calls.push(Call::DestroyTexture(texture.0));
    }
}

pub fn assert_mat4_near(actual: &Matrix4<f32>, expected: &Matrix4<f32>) {
    let a: [[f32; 4]; 4] = (*actual).into();
    let e: [[f32; 4]; 4] = (*expected).into();
    for (col_a, col_e) in a.iter().zip(e.iter()) {
        for (x, y) in col_a.iter().zip(col_e.iter()) {
            assert!(
                (x - y).abs() < 1e-4,
                "matrices differ:\n{:?}\n{:?}",
                a,
                e
            );
        }
    }
}

pub fn assert_near(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "{} is not close to {}",
        actual,
        expected
    );
}

/// Fresh directory under the system temp dir for file based tests.
pub fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("flow-demos-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).expect("cannot create temp dir");
    dir
}
