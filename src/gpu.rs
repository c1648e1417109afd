//! The immediate-mode graphics interface the demos are written against.
//!
//! Scene traversal and the G-buffer only ever talk to a [`GraphicsApi`]. The
//! real implementation is [`crate::render::WgpuApi`], which records the calls
//! and replays them through wgpu once per frame; tests plug in a recorder
//! that only logs the calls.

use cgmath::{Matrix3, Matrix4, Vector4};

use crate::data_structures::mesh::Mesh;

/// Resolved location of a uniform inside a program's uniform table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Format and sampling filter of one colour attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
}

/// Outcome of the offscreen target completeness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetStatus {
    Complete,
    /// Neither a colour nor a depth attachment is present.
    MissingAttachment,
    /// The colour attachment in this slot cannot be rendered to.
    IncompleteAttachment(u32),
    /// The draw buffer count differs from the number of colour attachments.
    DrawBufferMismatch,
    TooManyAttachments,
    SizeMismatch,
}

impl TargetStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, TargetStatus::Complete)
    }
}

/// A colour attachment as the completeness check sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentShape {
    pub renderable: bool,
    pub size: (u32, u32),
}

/// Everything the completeness check looks at, independent of the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetShape {
    pub size: (u32, u32),
    /// Colour slots in order; `None` for a slot nothing was attached to.
    pub colors: Vec<Option<AttachmentShape>>,
    pub depth: Option<(u32, u32)>,
    pub draw_buffers: u32,
}

impl TargetShape {
    /// Checks, in order: some attachment exists, the colour slots fit the
    /// device, every slot holds a renderable attachment, the draw buffers
    /// cover exactly the colour slots and every attachment has the target's
    /// size (zero dimensions count as 1).
    pub fn status(&self, max_color_attachments: u32) -> TargetStatus {
        let attached = self.colors.iter().flatten().count();
        if attached == 0 && self.depth.is_none() {
            return TargetStatus::MissingAttachment;
        }
        if self.colors.len() > max_color_attachments as usize {
            return TargetStatus::TooManyAttachments;
        }
        for (slot, color) in self.colors.iter().enumerate() {
            match color {
                Some(attachment) if attachment.renderable => {}
                _ => return TargetStatus::IncompleteAttachment(slot as u32),
            }
        }
        if self.draw_buffers as usize != self.colors.len() {
            return TargetStatus::DrawBufferMismatch;
        }
        let size = (self.size.0.max(1), self.size.1.max(1));
        let sizes_match = self
            .colors
            .iter()
            .flatten()
            .map(|attachment| attachment.size)
            .chain(self.depth)
            .all(|s| s == size);
        if !sizes_match {
            return TargetStatus::SizeMismatch;
        }
        TargetStatus::Complete
    }
}

pub trait GraphicsApi {
    type Program;
    type Mesh;
    type Texture;
    type Target;

    fn create_mesh(&mut self, mesh: &Mesh) -> Self::Mesh;
    fn destroy_mesh(&mut self, mesh: Self::Mesh);

    /// `None` when the program has no uniform of that name.
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: Option<&Self::Program>);

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Matrix4<f32>);
    fn set_uniform_mat3(&mut self, location: UniformLocation, value: &Matrix3<f32>);
    fn set_uniform_vec4(&mut self, location: UniformLocation, value: &Vector4<f32>);
    /// Points a sampler uniform at a texture unit.
    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32);
    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>);

    /// Clears the currently bound target.
    fn clear(&mut self, color: wgpu::Color);
    fn draw_mesh(&mut self, mesh: &Self::Mesh);

    fn create_target(&mut self, width: u32, height: u32) -> Self::Target;
    fn attach_color(
        &mut self,
        target: &mut Self::Target,
        slot: u32,
        desc: &AttachmentDesc,
    ) -> Self::Texture;
    fn attach_depth_stencil(&mut self, target: &mut Self::Target);
    fn set_draw_buffers(&mut self, target: &mut Self::Target, count: u32);
    fn target_status(&self, target: &Self::Target) -> TargetStatus;
    /// `None` binds the window's framebuffer.
    fn bind_target(&mut self, target: Option<&Self::Target>);
    fn destroy_target(&mut self, target: Self::Target);
    fn destroy_texture(&mut self, texture: Self::Texture);
}
