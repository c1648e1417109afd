//! Deferred-shading G-buffer.
//!
//! A multi-attachment offscreen target: one colour attachment per entry of
//! the layout plus a depth-stencil attachment. The geometry pass renders into
//! it, the lighting pass reads the attachments back through texture units
//! `0..k`, one per resolved sampler location of the lighting program.

use std::fmt;

use crate::gpu::{AttachmentDesc, GraphicsApi, TargetStatus, UniformLocation};

/// A named colour attachment; the name is the lighting program's sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBufferAttachment {
    pub name: &'static str,
    pub desc: AttachmentDesc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GBufferState {
    Idle,
    Geometry,
    GeometryDone,
    Lighting,
}

impl fmt::Display for GBufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GBufferError {
    #[error("G-buffer target is incomplete: {0:?}")]
    Incomplete(TargetStatus),
    #[error("cannot {action} while the G-buffer is in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: GBufferState,
    },
}

/// Position and normal in half floats, albedo with specular in alpha.
pub const DEFERRED_LAYOUT: [GBufferAttachment; 3] = [
    GBufferAttachment {
        name: "gPosition",
        desc: AttachmentDesc {
            format: wgpu::TextureFormat::Rgba16Float,
            filter: wgpu::FilterMode::Nearest,
        },
    },
    GBufferAttachment {
        name: "gNormal",
        desc: AttachmentDesc {
            format: wgpu::TextureFormat::Rgba16Float,
            filter: wgpu::FilterMode::Nearest,
        },
    },
    GBufferAttachment {
        name: "gAlbedoSpec",
        desc: AttachmentDesc {
            format: wgpu::TextureFormat::Rgba8Unorm,
            filter: wgpu::FilterMode::Nearest,
        },
    },
];

pub struct GBuffer<G: GraphicsApi> {
    target: G::Target,
    textures: Vec<G::Texture>,
    locations: Vec<Option<UniformLocation>>,
    size: (u32, u32),
    state: GBufferState,
}

impl<G: GraphicsApi> GBuffer<G> {
    /// Builds the target and resolves the sampler locations.
    ///
    /// On an incomplete target every resource created so far is released
    /// before the error is returned.
    pub fn create(
        api: &mut G,
        width: u32,
        height: u32,
        lighting_program: &G::Program,
        attachments: &[GBufferAttachment],
    ) -> Result<Self, GBufferError> {
        let mut target = api.create_target(width, height);
        let mut textures = Vec::with_capacity(attachments.len());
        let mut locations = Vec::with_capacity(attachments.len());

        for (slot, attachment) in attachments.iter().enumerate() {
            textures.push(api.attach_color(&mut target, slot as u32, &attachment.desc));
            let location = api.uniform_location(lighting_program, attachment.name);
            log::debug!("{} location: {:?}", attachment.name, location);
            if location.is_none() {
                log::warn!("lighting program has no sampler {}", attachment.name);
            }
            locations.push(location);
        }
        api.set_draw_buffers(&mut target, attachments.len() as u32);
        api.attach_depth_stencil(&mut target);

        let status = api.target_status(&target);
        if !status.is_complete() {
            log::error!("G-buffer {}x{} is incomplete: {:?}", width, height, status);
            for texture in textures {
                api.destroy_texture(texture);
            }
            api.destroy_target(target);
            return Err(GBufferError::Incomplete(status));
        }

        log::info!(
            "created {}x{} G-buffer with {} colour attachments",
            width,
            height,
            textures.len()
        );
        Ok(Self {
            target,
            textures,
            locations,
            size: (width, height),
            state: GBufferState::Idle,
        })
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[GBufferState],
        to: GBufferState,
    ) -> Result<(), GBufferError> {
        if !from.contains(&self.state) {
            return Err(GBufferError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn begin_geometry_pass(&mut self, api: &mut G) -> Result<(), GBufferError> {
        self.transition(
            "begin the geometry pass",
            &[GBufferState::Idle, GBufferState::GeometryDone],
            GBufferState::Geometry,
        )?;
        api.bind_target(Some(&self.target));
        Ok(())
    }

    pub fn end_geometry_pass(&mut self, api: &mut G) -> Result<(), GBufferError> {
        self.transition(
            "end the geometry pass",
            &[GBufferState::Geometry],
            GBufferState::GeometryDone,
        )?;
        api.bind_target(None);
        Ok(())
    }

    /// Binds attachment `i` to texture unit `i` and points sampler location
    /// `i` at it. Expects the lighting program to be in use.
    pub fn begin_lighting_pass(&mut self, api: &mut G) -> Result<(), GBufferError> {
        self.transition(
            "begin the lighting pass",
            &[GBufferState::GeometryDone],
            GBufferState::Lighting,
        )?;
        for (unit, (texture, location)) in self.textures.iter().zip(&self.locations).enumerate() {
            api.bind_texture(unit as u32, Some(texture));
            if let Some(location) = location {
                api.set_uniform_sampler(*location, unit as u32);
            }
        }
        Ok(())
    }

    pub fn end_lighting_pass(&mut self, api: &mut G) -> Result<(), GBufferError> {
        self.transition(
            "end the lighting pass",
            &[GBufferState::Lighting],
            GBufferState::Idle,
        )?;
        for unit in 0..self.textures.len() {
            api.bind_texture(unit as u32, None);
        }
        Ok(())
    }

    pub fn destroy(self, api: &mut G) {
        api.destroy_target(self.target);
        for texture in self.textures {
            api.destroy_texture(texture);
        }
    }

    pub fn textures(&self) -> &[G::Texture] {
        &self.textures
    }

    pub fn locations(&self) -> &[Option<UniformLocation>] {
        &self.locations
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn state(&self) -> GBufferState {
        self.state
    }
}
