//! Immediate-mode recording on top of wgpu.
//!
//! [`WgpuApi`] implements [`GraphicsApi`] by recording every draw together
//! with a snapshot of the uniform block and bound textures it would have seen
//! in an immediate-mode API. [`WgpuApi::submit`] replays the frame: it packs
//! all uniform snapshots into one dynamic-offset buffer, builds the render
//! pipelines each (program, target formats) pair needs and encodes one render
//! pass per bound target.
//!
//! # Key types
//!
//! - [`WgpuApi`] is the recorder and the owner of the shared GPU state
//! - [`GpuMesh`] is an uploaded vertex + index buffer pair
//! - [`RenderTarget`] is an offscreen target (colour attachments + depth-stencil)

use std::{
    collections::HashMap,
    iter,
    sync::atomic::{AtomicUsize, Ordering},
};

use cgmath::{Matrix3, Matrix4, Vector4};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{mesh::Mesh, texture::Texture},
    gpu::{
        AttachmentDesc, AttachmentShape, GraphicsApi, TargetShape, TargetStatus, UniformLocation,
    },
    pipelines::{ShaderProgram, UniformKind, UniformSlot},
};

static NEXT_TARGET_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

#[derive(Debug)]
pub struct RenderTarget {
    id: usize,
    width: u32,
    height: u32,
    colors: Vec<Option<Texture>>,
    depth: Option<Texture>,
    draw_buffers: u32,
}

impl RenderTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn shape(&self) -> TargetShape {
        TargetShape {
            size: (self.width, self.height),
            colors: self
                .colors
                .iter()
                .map(|color| {
                    color.as_ref().map(|texture| AttachmentShape {
                        renderable: texture.renderable,
                        size: texture.size(),
                    })
                })
                .collect(),
            depth: self.depth.as_ref().map(Texture::size),
            draw_buffers: self.draw_buffers,
        }
    }
}

#[derive(Clone, Debug)]
struct Attachment {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

/// What a pass renders into, captured when the target is bound.
#[derive(Clone, Debug)]
enum PassTarget {
    Frame,
    Offscreen {
        id: usize,
        colors: Vec<Attachment>,
        depth: Option<Attachment>,
    },
}

impl PassTarget {
    fn same_as(&self, other: &PassTarget) -> bool {
        match (self, other) {
            (PassTarget::Frame, PassTarget::Frame) => true,
            (PassTarget::Offscreen { id: a, .. }, PassTarget::Offscreen { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
struct DrawRecord {
    program: ShaderProgram,
    mesh: GpuMesh,
    uniforms: Vec<u8>,
    textures: Vec<(wgpu::TextureView, wgpu::Sampler)>,
}

#[derive(Debug)]
struct PassRecord {
    target: PassTarget,
    clear: Option<wgpu::Color>,
    draws: Vec<DrawRecord>,
}

/// Uniform values and sampler units a program keeps between draws.
#[derive(Debug)]
struct ProgramState {
    block: Vec<u8>,
    sampler_units: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: usize,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
}

pub struct WgpuApi {
    device: wgpu::Device,
    queue: wgpu::Queue,
    current_program: Option<ShaderProgram>,
    program_states: HashMap<usize, ProgramState>,
    texture_units: HashMap<u32, Texture>,
    fallback: Texture,
    bound: PassTarget,
    passes: Vec<PassRecord>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
}

impl std::fmt::Debug for WgpuApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuApi")
            .field("passes", &self.passes.len())
            .field("recorded_draws", &self.recorded_draws())
            .field("pipelines", &self.pipelines.len())
            .finish_non_exhaustive()
    }
}

impl WgpuApi {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let fallback = Texture::solid(
            device,
            queue,
            1,
            1,
            [255, 255, 255, 255],
            wgpu::TextureFormat::Rgba8Unorm,
            "unbound texture unit",
        );
        Self {
            device: device.clone(),
            queue: queue.clone(),
            current_program: None,
            program_states: HashMap::new(),
            texture_units: HashMap::new(),
            fallback,
            bound: PassTarget::Frame,
            passes: Vec::new(),
            pipelines: HashMap::new(),
            uniform_buffer: mk_uniform_buffer(device, 4096),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of draws recorded since the last submit.
    pub fn recorded_draws(&self) -> usize {
        self.passes.iter().map(|pass| pass.draws.len()).sum()
    }

    /// Number of render passes recorded since the last submit.
    pub fn recorded_passes(&self) -> usize {
        self.passes.len()
    }

    /// The texture a sampler reading from `unit` would see: the bound one or
    /// the 1x1 white fallback.
    pub fn bound_texture(&self, unit: u32) -> &Texture {
        self.texture_units.get(&unit).unwrap_or(&self.fallback)
    }

    fn current_pass(&mut self) -> &mut PassRecord {
        let needs_pass = self
            .passes
            .last()
            .is_none_or(|pass| !pass.target.same_as(&self.bound));
        if needs_pass {
            self.passes.push(PassRecord {
                target: self.bound.clone(),
                clear: None,
                draws: Vec::new(),
            });
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    /// Writes `bytes` at the value uniform `location` of the current program.
    fn write_value(&mut self, location: UniformLocation, kind: UniformKind, bytes: &[u8]) {
        let Some(program) = &self.current_program else {
            log::warn!("uniform {:?} set without a program in use", location);
            return;
        };
        match program.uniforms().slot(location) {
            Some(UniformSlot::Value { offset, kind: k }) if k == kind => {
                let state = self
                    .program_states
                    .entry(program.id())
                    .or_insert_with(|| new_program_state(program));
                let offset = offset as usize;
                state.block[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
            slot => log::warn!(
                "program {} has no {:?} uniform at {:?} (found {:?})",
                program.name(),
                kind,
                location,
                slot
            ),
        }
    }

    /// Replays everything recorded since the last submit.
    ///
    /// `frame` is the window's colour target with format `frame_format`,
    /// `frame_depth` its depth buffer in [`Texture::DEPTH_FORMAT`].
    pub fn submit(
        &mut self,
        frame: &wgpu::TextureView,
        frame_depth: &wgpu::TextureView,
        frame_format: wgpu::TextureFormat,
    ) {
        let passes = std::mem::take(&mut self.passes);
        if passes.is_empty() {
            return;
        }

        let alignment = self.device.limits().min_uniform_buffer_offset_alignment as u64;
        let mut staging: Vec<u8> = Vec::new();
        let mut offsets: Vec<Vec<u32>> = Vec::with_capacity(passes.len());
        for pass in &passes {
            let mut pass_offsets = Vec::with_capacity(pass.draws.len());
            for draw in &pass.draws {
                let offset = (staging.len() as u64).next_multiple_of(alignment);
                staging.resize(offset as usize, 0);
                staging.extend_from_slice(&draw.uniforms);
                pass_offsets.push(offset as u32);
            }
            offsets.push(pass_offsets);
        }
        if staging.len() as u64 > self.uniform_buffer.size() {
            let size = (staging.len() as u64).next_power_of_two();
            log::debug!("growing uniform buffer to {} bytes", size);
            self.uniform_buffer = mk_uniform_buffer(&self.device, size);
        }
        if !staging.is_empty() {
            self.queue.write_buffer(&self.uniform_buffer, 0, &staging);
        }

        let mut uniform_groups: HashMap<usize, wgpu::BindGroup> = HashMap::new();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        for (pass, pass_offsets) in passes.iter().zip(&offsets) {
            let (colors, depth) = match &pass.target {
                PassTarget::Frame => (
                    vec![Attachment {
                        view: frame.clone(),
                        format: frame_format,
                    }],
                    Some(Attachment {
                        view: frame_depth.clone(),
                        format: Texture::DEPTH_FORMAT,
                    }),
                ),
                PassTarget::Offscreen { colors, depth, .. } => (colors.clone(), depth.clone()),
            };
            let key_colors: Vec<_> = colors.iter().map(|a| a.format).collect();
            let key_depth = depth.as_ref().map(|a| a.format);

            let mut prepared = Vec::with_capacity(pass.draws.len());
            for draw in &pass.draws {
                let pipeline = self
                    .pipelines
                    .entry(PipelineKey {
                        program: draw.program.id(),
                        colors: key_colors.clone(),
                        depth: key_depth,
                    })
                    .or_insert_with(|| draw.program.pipeline(&self.device, &key_colors, key_depth))
                    .clone();
                let uniforms = uniform_groups
                    .entry(draw.program.id())
                    .or_insert_with(|| {
                        mk_uniform_bind_group(&self.device, &draw.program, &self.uniform_buffer)
                    })
                    .clone();
                let textures = draw.program.texture_layout.as_ref().map(|layout| {
                    mk_texture_bind_group(&self.device, layout, &draw.textures)
                });
                prepared.push((pipeline, uniforms, textures));
            }

            let load = match pass.clear {
                Some(color) => wgpu::LoadOp::Clear(color),
                None => wgpu::LoadOp::Load,
            };
            let color_attachments: Vec<_> = colors
                .iter()
                .map(|attachment| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &attachment.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })
                })
                .collect();
            let depth_stencil_attachment =
                depth
                    .as_ref()
                    .map(|attachment| wgpu::RenderPassDepthStencilAttachment {
                        view: &attachment.view,
                        depth_ops: Some(wgpu::Operations {
                            load: match pass.clear {
                                Some(_) => wgpu::LoadOp::Clear(1.0),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: attachment.format.has_stencil_aspect().then(|| {
                            wgpu::Operations {
                                load: match pass.clear {
                                    Some(_) => wgpu::LoadOp::Clear(0),
                                    None => wgpu::LoadOp::Load,
                                },
                                store: wgpu::StoreOp::Store,
                            }
                        }),
                    });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            for ((draw, (pipeline, uniforms, textures)), offset) in
                pass.draws.iter().zip(&prepared).zip(pass_offsets)
            {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, uniforms, &[*offset]);
                if let Some(textures) = textures {
                    render_pass.set_bind_group(1, textures, &[]);
                }
                render_pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.mesh.num_elements, 0, 0..1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
    }
}

fn new_program_state(program: &ShaderProgram) -> ProgramState {
    ProgramState {
        block: vec![0; program.uniforms().block_size() as usize],
        sampler_units: vec![0; program.uniforms().sampler_count() as usize],
    }
}

fn mk_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Uniform Buffer"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn mk_uniform_bind_group(
    device: &wgpu::Device,
    program: &ShaderProgram,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &program.uniform_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(program.uniforms().block_size() as u64),
            }),
        }],
        label: Some("uniform_bind_group"),
    })
}

fn mk_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    textures: &[(wgpu::TextureView, wgpu::Sampler)],
) -> wgpu::BindGroup {
    let entries: Vec<_> = textures
        .iter()
        .enumerate()
        .flat_map(|(j, (view, sampler))| {
            let j = j as u32;
            [
                wgpu::BindGroupEntry {
                    binding: 2 * j,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2 * j + 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ]
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &entries,
        label: Some("texture_bind_group"),
    })
}

impl GraphicsApi for WgpuApi {
    type Program = ShaderProgram;
    type Mesh = GpuMesh;
    type Texture = Texture;
    type Target = RenderTarget;

    fn create_mesh(&mut self, mesh: &Mesh) -> GpuMesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            num_elements: mesh.indices.len() as u32,
        }
    }

    fn destroy_mesh(&mut self, mesh: GpuMesh) {
        // buffers still referenced by recorded draws live until the submit
        drop(mesh);
    }

    fn uniform_location(&self, program: &ShaderProgram, name: &str) -> Option<UniformLocation> {
        program.uniforms().location(name)
    }

    fn use_program(&mut self, program: Option<&ShaderProgram>) {
        if let Some(program) = program {
            self.program_states
                .entry(program.id())
                .or_insert_with(|| new_program_state(program));
        }
        self.current_program = program.cloned();
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Matrix4<f32>) {
        let raw: [[f32; 4]; 4] = (*value).into();
        self.write_value(location, UniformKind::Mat4, bytemuck::cast_slice(&raw));
    }

    fn set_uniform_mat3(&mut self, location: UniformLocation, value: &Matrix3<f32>) {
        let raw: [[f32; 4]; 3] = [
            value.x.extend(0.0).into(),
            value.y.extend(0.0).into(),
            value.z.extend(0.0).into(),
        ];
        self.write_value(location, UniformKind::Mat3, bytemuck::cast_slice(&raw));
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: &Vector4<f32>) {
        let raw: [f32; 4] = (*value).into();
        self.write_value(location, UniformKind::Vec4, bytemuck::cast_slice(&raw));
    }

    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        let Some(program) = &self.current_program else {
            log::warn!("sampler {:?} set without a program in use", location);
            return;
        };
        match program.uniforms().slot(location) {
            Some(UniformSlot::Sampler(index)) => {
                let state = self
                    .program_states
                    .entry(program.id())
                    .or_insert_with(|| new_program_state(program));
                state.sampler_units[index as usize] = unit;
            }
            slot => log::warn!(
                "program {} has no sampler at {:?} (found {:?})",
                program.name(),
                location,
                slot
            ),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&Texture>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit, texture.clone());
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    fn clear(&mut self, color: wgpu::Color) {
        let pass = self.current_pass();
        // whatever was drawn so far would be overwritten
        pass.draws.clear();
        pass.clear = Some(color);
    }

    fn draw_mesh(&mut self, mesh: &GpuMesh) {
        let Some(program) = self.current_program.clone() else {
            log::warn!("draw without a program in use");
            return;
        };
        let state = self
            .program_states
            .entry(program.id())
            .or_insert_with(|| new_program_state(&program));
        let uniforms = state.block.clone();
        let textures = state
            .sampler_units
            .iter()
            .map(|unit| {
                let texture = self.texture_units.get(unit).unwrap_or(&self.fallback);
                (texture.view.clone(), texture.sampler.clone())
            })
            .collect();
        let record = DrawRecord {
            program,
            mesh: mesh.clone(),
            uniforms,
            textures,
        };
        self.current_pass().draws.push(record);
    }

    fn create_target(&mut self, width: u32, height: u32) -> RenderTarget {
        RenderTarget {
            id: NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            colors: Vec::new(),
            depth: None,
            draw_buffers: 0,
        }
    }

    fn attach_color(&mut self, target: &mut RenderTarget, slot: u32, desc: &AttachmentDesc) -> Texture {
        let texture = Texture::create_color_attachment(
            &self.device,
            [target.width, target.height],
            desc,
            &format!("color attachment {slot}"),
        );
        let slot = slot as usize;
        if target.colors.len() <= slot {
            target.colors.resize(slot + 1, None);
        }
        target.colors[slot] = Some(texture.clone());
        texture
    }

    fn attach_depth_stencil(&mut self, target: &mut RenderTarget) {
        target.depth = Some(Texture::create_depth_texture(
            &self.device,
            [target.width, target.height],
            Texture::DEPTH_STENCIL_FORMAT,
            "depth stencil attachment",
        ));
    }

    fn set_draw_buffers(&mut self, target: &mut RenderTarget, count: u32) {
        target.draw_buffers = count;
    }

    fn target_status(&self, target: &RenderTarget) -> TargetStatus {
        target
            .shape()
            .status(self.device.limits().max_color_attachments)
    }

    fn bind_target(&mut self, target: Option<&RenderTarget>) {
        self.bound = match target {
            None => PassTarget::Frame,
            Some(target) => PassTarget::Offscreen {
                id: target.id,
                colors: target
                    .colors
                    .iter()
                    .take(target.draw_buffers as usize)
                    .flatten()
                    .map(|texture| Attachment {
                        view: texture.view.clone(),
                        format: texture.format(),
                    })
                    .collect(),
                depth: target.depth.as_ref().map(|texture| Attachment {
                    view: texture.view.clone(),
                    format: texture.format(),
                }),
            },
        };
    }

    fn destroy_target(&mut self, target: RenderTarget) {
        log::debug!("releasing render target {}", target.id);
        if matches!(self.bound, PassTarget::Offscreen { id, .. } if id == target.id) {
            self.bound = PassTarget::Frame;
        }
    }

    fn destroy_texture(&mut self, texture: Texture) {
        self.texture_units
            .retain(|_, bound| bound.texture != texture.texture);
    }
}
