use cgmath::{Deg, Matrix4, Vector4};

use crate::gpu::{GraphicsApi, UniformLocation};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    /// Homogeneous world position.
    pub position: Vector4<f32>,
    pub color: Vector4<f32>,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vector4::new(0.0, 0.0, 0.0, 1.0),
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

impl PointLight {
    /// `count` white lights evenly spaced on a horizontal circle.
    pub fn ring(count: u32, radius: f32, height: f32) -> Vec<PointLight> {
        let inc = Deg(360.0 / count.max(1) as f32);
        (0..count)
            .map(|i| {
                let angle = inc * i as f32;
                let light = PointLight {
                    position: Vector4::new(
                        radius * cgmath::Angle::sin(angle),
                        height,
                        radius * cgmath::Angle::cos(angle),
                        1.0,
                    ),
                    ..Default::default()
                };
                log::debug!("light {i}: {:?}", light.position);
                light
            })
            .collect()
    }
}

/// Uniform locations of each light, resolved once after linking.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightTable {
    slots: Vec<(Option<UniformLocation>, Option<UniformLocation>)>,
}

impl LightTable {
    /// Resolves `lights[i].pos` / `lights[i].color` for `count` lights. A
    /// single light may instead be declared as `light.pos` / `light.color`.
    pub fn resolve<G: GraphicsApi>(api: &G, program: &G::Program, count: usize) -> Self {
        let slots = (0..count)
            .map(|i| {
                let mut pos = api.uniform_location(program, &format!("lights[{i}].pos"));
                let mut color = api.uniform_location(program, &format!("lights[{i}].color"));
                if count == 1 && pos.is_none() && color.is_none() {
                    pos = api.uniform_location(program, "light.pos");
                    color = api.uniform_location(program, "light.color");
                }
                log::debug!("light {i} locations: pos {:?}, color {:?}", pos, color);
                (pos, color)
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Uploads view-space positions and colours. Lights beyond the resolved
    /// count are ignored.
    pub fn upload<G: GraphicsApi>(&self, api: &mut G, lights: &[PointLight], view: &Matrix4<f32>) {
        for ((pos, color), light) in self.slots.iter().zip(lights) {
            if let Some(pos) = pos {
                api.set_uniform_vec4(*pos, &(view * light.position));
            }
            if let Some(color) = color {
                api.set_uniform_vec4(*color, &light.color);
            }
        }
    }
}
