//! The two programs of deferred shading.

use crate::pipelines::{ProgramDesc, UniformKind, UniformTable};

/// Upper bound on lights the lighting shader declares.
pub const MAX_LIGHTS: u32 = 10;

/// Geometry pass: writes position, normal and albedo/specular in view space.
pub fn geometry_program() -> ProgramDesc {
    ProgramDesc {
        program: "Deferred",
        stage: "Geo",
        uniforms: UniformTable::new()
            .mat4("modelMat")
            .mat4("viewMat")
            .mat4("projMat")
            .mat3("normalMat")
            .sampler("diffuseTexture")
            .sampler("normalTexture"),
    }
}

/// Lighting pass: shades a full-screen quad from the G-buffer textures.
pub fn lighting_program() -> ProgramDesc {
    ProgramDesc {
        program: "Deferred",
        stage: "Light",
        uniforms: UniformTable::new()
            .struct_array(
                "lights",
                MAX_LIGHTS,
                &[("pos", UniformKind::Vec4), ("color", UniformKind::Vec4)],
            )
            .sampler("gPosition")
            .sampler("gNormal")
            .sampler("gAlbedoSpec"),
    }
}
