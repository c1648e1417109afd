//! Forward shading with one point light.

use crate::pipelines::{ProgramDesc, UniformTable};

/// Normal-mapped Blinn-Phong lit by `light`, given in view space.
pub fn lit_program() -> ProgramDesc {
    ProgramDesc {
        program: "Forward",
        stage: "Lit",
        uniforms: UniformTable::new()
            .mat4("modelMat")
            .mat4("viewMat")
            .mat4("projMat")
            .mat3("normalMat")
            .vec4("light.pos")
            .vec4("light.color")
            .sampler("diffuseTexture")
            .sampler("normalTexture"),
    }
}
