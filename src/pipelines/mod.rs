//! Shader programs and their uniform tables.
//!
//! A program is a vertex/fragment WGSL pair loaded from
//! `shaders/<Program>/<Stage>.{vs,fs}.wgsl`. Its value uniforms live in one
//! uniform block at `@group(0) @binding(0)`; every sampler uniform `j` is a
//! texture at `@group(1) @binding(2j)` plus a sampler at `@binding(2j + 1)`.
//! A uniform's location is its index in the [`UniformTable`].

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{data_structures::mesh::Vertex, gpu::UniformLocation};

pub mod basic;
pub mod deferred;
pub mod forward;
pub mod light;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn extension(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs.wgsl",
            ShaderStage::Fragment => "fs.wgsl",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("cannot read shader {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader {path} failed to compile:\n{log}")]
    Compile {
        stage: ShaderStage,
        path: PathBuf,
        log: String,
    },
    #[error("program {program} failed to link:\n{log}")]
    Link { program: String, log: String },
}

/// Type of a value uniform. Sizes and alignments follow WGSL uniform layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    /// Three columns, each padded to a vec4.
    Mat3,
    Vec4,
}

impl UniformKind {
    pub fn size(&self) -> u32 {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Mat3 => 48,
            UniformKind::Vec4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformSlot {
    Value { offset: u32, kind: UniformKind },
    /// Index of the sampler among the program's samplers.
    Sampler(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformEntry {
    pub name: String,
    pub slot: UniformSlot,
}

/// Ordered uniform declarations of one program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformTable {
    entries: Vec<UniformEntry>,
    block_size: u32,
    sampler_count: u32,
}

impl UniformTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn value(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        // every supported kind is 16-byte aligned
        let offset = self.block_size.next_multiple_of(16);
        self.block_size = offset + kind.size();
        self.entries.push(UniformEntry {
            name: name.into(),
            slot: UniformSlot::Value { offset, kind },
        });
        self
    }

    pub fn mat4(self, name: impl Into<String>) -> Self {
        self.value(name, UniformKind::Mat4)
    }

    pub fn mat3(self, name: impl Into<String>) -> Self {
        self.value(name, UniformKind::Mat3)
    }

    pub fn vec4(self, name: impl Into<String>) -> Self {
        self.value(name, UniformKind::Vec4)
    }

    /// `array<Struct, len>`: declares `name[i].field` for every element and
    /// field, in memory order.
    pub fn struct_array(mut self, name: &str, len: u32, fields: &[(&str, UniformKind)]) -> Self {
        for i in 0..len {
            for (field, kind) in fields {
                self = self.value(format!("{name}[{i}].{field}"), *kind);
            }
        }
        self
    }

    pub fn sampler(mut self, name: impl Into<String>) -> Self {
        self.entries.push(UniformEntry {
            name: name.into(),
            slot: UniformSlot::Sampler(self.sampler_count),
        });
        self.sampler_count += 1;
        self
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(|index| UniformLocation(index as u32))
    }

    pub fn slot(&self, location: UniformLocation) -> Option<UniformSlot> {
        self.entries.get(location.0 as usize).map(|entry| entry.slot)
    }

    pub fn entries(&self) -> &[UniformEntry] {
        &self.entries
    }

    /// Size of the uniform block, rounded up to 16 bytes and never empty.
    pub fn block_size(&self) -> u32 {
        self.block_size.next_multiple_of(16).max(16)
    }

    pub fn sampler_count(&self) -> u32 {
        self.sampler_count
    }
}

/// What to load for a program: its directory and stage file stem under
/// `shaders/`, plus the uniforms the WGSL declares.
#[derive(Clone, Debug)]
pub struct ProgramDesc {
    pub program: &'static str,
    pub stage: &'static str,
    pub uniforms: UniformTable,
}

impl ProgramDesc {
    pub fn name(&self) -> String {
        format!("{}/{}", self.program, self.stage)
    }

    pub fn path(&self, root: &Path, stage: ShaderStage) -> PathBuf {
        root.join("shaders")
            .join(self.program)
            .join(format!("{}.{}", self.stage, stage.extension()))
    }
}

static NEXT_PROGRAM_ID: AtomicUsize = AtomicUsize::new(0);

/// The pipeline built while linking, kept for the formats it was built for.
#[derive(Debug)]
struct LinkedPipeline {
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    pipeline: wgpu::RenderPipeline,
}

/// A compiled and linked program.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    id: usize,
    name: String,
    uniforms: Arc<UniformTable>,
    linked: Arc<LinkedPipeline>,
    pub(crate) vertex: wgpu::ShaderModule,
    pub(crate) fragment: wgpu::ShaderModule,
    pub(crate) layout: wgpu::PipelineLayout,
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pub(crate) texture_layout: Option<wgpu::BindGroupLayout>,
}

impl ShaderProgram {
    /// Reads, compiles and links a program.
    ///
    /// Linking builds a pipeline for `color_formats`/`depth_format`, which is
    /// where wgpu checks that the stages fit together and match the layout.
    /// That pipeline is kept and reused by the first submit that renders
    /// into the same formats.
    pub async fn load(
        device: &wgpu::Device,
        root: &Path,
        desc: &ProgramDesc,
        color_formats: &[wgpu::TextureFormat],
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Result<Self, ShaderError> {
        let name = desc.name();
        let vertex = compile(device, desc, root, ShaderStage::Vertex).await?;
        let fragment = compile(device, desc, root, ShaderStage::Fragment).await?;

        let uniform_layout = uniform_layout(device, &desc.uniforms);
        let texture_layout = texture_layout(device, &desc.uniforms);
        let mut groups = vec![&uniform_layout];
        groups.extend(texture_layout.as_ref());
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&name),
            bind_group_layouts: &groups,
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = basic::mk_render_pipeline(
            device,
            &layout,
            &vertex,
            &fragment,
            color_formats,
            depth_format,
            &[Vertex::desc()],
        );
        if let Some(err) = device.pop_error_scope().await {
            return Err(ShaderError::Link {
                program: name,
                log: err.to_string(),
            });
        }
        log::info!("linked program {}", name);

        Ok(Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            name,
            uniforms: Arc::new(desc.uniforms.clone()),
            linked: Arc::new(LinkedPipeline {
                colors: color_formats.to_vec(),
                depth: depth_format,
                pipeline,
            }),
            vertex,
            fragment,
            layout,
            uniform_layout,
            texture_layout,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    /// Whether linking already built the pipeline for these target formats.
    pub fn is_linked_for(
        &self,
        color_formats: &[wgpu::TextureFormat],
        depth_format: Option<wgpu::TextureFormat>,
    ) -> bool {
        self.linked.colors == color_formats && self.linked.depth == depth_format
    }

    /// The pipeline for these target formats, reusing the linked one when
    /// the formats match.
    pub(crate) fn pipeline(
        &self,
        device: &wgpu::Device,
        color_formats: &[wgpu::TextureFormat],
        depth_format: Option<wgpu::TextureFormat>,
    ) -> wgpu::RenderPipeline {
        if self.is_linked_for(color_formats, depth_format) {
            return self.linked.pipeline.clone();
        }
        log::debug!(
            "building pipeline for {} ({:?}, {:?})",
            self.name,
            color_formats,
            depth_format
        );
        basic::mk_render_pipeline(
            device,
            &self.layout,
            &self.vertex,
            &self.fragment,
            color_formats,
            depth_format,
            &[Vertex::desc()],
        )
    }
}

async fn compile(
    device: &wgpu::Device,
    desc: &ProgramDesc,
    root: &Path,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let path = desc.path(root, stage);
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ShaderError::Read {
            path: path.clone(),
            source,
        })?;
    log::debug!("{} {} shader source:\n{}", desc.name(), stage, source);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} {}", desc.name(), stage)),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match device.pop_error_scope().await {
        Some(err) => Err(ShaderError::Compile {
            stage,
            path,
            log: err.to_string(),
        }),
        None => Ok(module),
    }
}

fn uniform_layout(device: &wgpu::Device, uniforms: &UniformTable) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(uniforms.block_size() as u64),
            },
            count: None,
        }],
        label: Some("uniform_bind_group_layout"),
    })
}

fn texture_layout(device: &wgpu::Device, uniforms: &UniformTable) -> Option<wgpu::BindGroupLayout> {
    if uniforms.sampler_count() == 0 {
        return None;
    }
    let entries: Vec<_> = (0..uniforms.sampler_count())
        .flat_map(|j| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * j,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * j + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();
    Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("texture_bind_group_layout"),
    }))
}
