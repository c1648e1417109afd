//! CPU-side mesh data and the procedural generators used by the demos.
//!
//! A [`Mesh`] is created once (generated or imported) and never changes after
//! it has been uploaded with [`crate::gpu::GraphicsApi::create_mesh`].

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

/// Vertex layout shared by every program: position, colour, normal,
/// texcoord and tangent at shader locations 0..4.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self {
            position,
            color,
            ..Default::default()
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 7]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 10]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: [1.0; 4],
            normal: [0.0; 3],
            texcoord: [0.0; 2],
            tangent: [1.0, 0.0, 0.0],
        }
    }
}

/// Vertices plus triangle indices (three per face).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// A 1x1 quad in the xy-plane with red, green, blue and white corners.
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex::new([-0.5, 0.5, 0.0], [1.0, 0.0, 0.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 1.0, 0.0, 1.0]),
            Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.0], [1.0, 1.0, 1.0, 1.0]),
        ];
        let indices = vec![0, 3, 1, 0, 2, 3];
        Self { vertices, indices }
    }

    /// The quad with an extra magenta vertex sticking out to the right.
    pub fn pentagon() -> Self {
        let mut mesh = Self::quad();
        mesh.vertices
            .push(Vertex::new([0.9, 0.0, 0.0], [1.0, 0.0, 1.0, 1.0]));
        mesh.indices.extend_from_slice(&[1, 3, 4]);
        mesh
    }

    /// Full-screen quad for the lighting pass. `scale` 1.0 covers all of NDC.
    pub fn screen_quad(scale: f32) -> Self {
        let corner = |x: f32, y: f32, color: [f32; 4]| {
            let normal = Vector3::new(x, y, 1.0).normalize();
            Vertex {
                position: [x * scale, y * scale, 0.0],
                color,
                normal: normal.into(),
                texcoord: [(x + 1.0) * 0.5, (y + 1.0) * 0.5],
                ..Default::default()
            }
        };
        let vertices = vec![
            corner(-1.0, -1.0, [0.0, 1.0, 0.0, 1.0]),
            corner(1.0, -1.0, [0.5, 0.5, 0.0, 1.0]),
            corner(-1.0, 1.0, [0.0, 1.0, 1.0, 1.0]),
            corner(1.0, 1.0, [0.0, 0.0, 1.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 1, 3, 2];
        Self { vertices, indices }
    }

    /// Open cylinder along the x axis with `face_cnt` side faces.
    ///
    /// Produces `2 * face_cnt` vertices and `2 * face_cnt` triangles; the
    /// last ring wraps around to the first one.
    pub fn cylinder(length: f32, radius: f32, face_cnt: u32) -> Self {
        let mut mesh = Mesh::default();
        if face_cnt == 0 {
            return mesh;
        }
        let angle_inc = (360.0 / face_cnt as f64).to_radians();
        let half_len = length as f64 / 2.0;

        for i in 0..face_cnt {
            let angle = angle_inc * i as f64;
            let z = (radius as f64 * angle.cos()) as f32;
            let y = (radius as f64 * angle.sin()) as f32;
            let v = 2.0 * i as f32 / face_cnt as f32;

            let mut left = Vertex::new([-half_len as f32, y, z], [1.0, 0.0, 0.0, 1.0]);
            left.texcoord = [0.0, v];
            let mut right = Vertex::new([half_len as f32, y, z], [1.0, 1.0, 0.0, 1.0]);
            right.texcoord = [2.0, v];

            mesh.vertices.push(left);
            mesh.vertices.push(right);
        }

        let vcnt = mesh.vertices.len() as u32;
        for i in 0..face_cnt {
            let k = i * 2;
            mesh.indices
                .extend_from_slice(&[k, k + 1, (k + 2) % vcnt]);
            mesh.indices
                .extend_from_slice(&[k + 1, (k + 3) % vcnt, (k + 2) % vcnt]);
        }

        compute_all_normals(&mut mesh);
        mesh
    }
}

/// Unit normal of the triangle `a, b, c` (counter-clockwise front face).
pub fn compute_normal(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> Vector3<f32> {
    (b - a).cross(c - a).normalize()
}

/// Smooth vertex normals: the normalized sum of the face normals of every
/// triangle a vertex belongs to.
pub fn compute_all_normals(mesh: &mut Mesh) {
    let mut sums = vec![Vector3::<f32>::zero(); mesh.vertices.len()];

    for c in mesh.indices.chunks_exact(3) {
        let a: Vector3<f32> = mesh.vertices[c[0] as usize].position.into();
        let b: Vector3<f32> = mesh.vertices[c[1] as usize].position.into();
        let d: Vector3<f32> = mesh.vertices[c[2] as usize].position.into();
        let n = compute_normal(a, b, d);
        // degenerate faces would poison the sum
        if !n.x.is_finite() || !n.y.is_finite() || !n.z.is_finite() {
            continue;
        }
        sums[c[0] as usize] += n;
        sums[c[1] as usize] += n;
        sums[c[2] as usize] += n;
    }

    for (vertex, sum) in mesh.vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}

/// Per-vertex tangents for normal mapping, averaged over adjacent triangles.
///
/// Vertices whose triangles have degenerate texture coordinates keep their
/// previous tangent.
pub fn compute_tangents(mesh: &mut Mesh) {
    let mut sums = vec![Vector3::<f32>::zero(); mesh.vertices.len()];
    let mut triangles_included = vec![0u32; mesh.vertices.len()];

    for c in mesh.indices.chunks_exact(3) {
        let v0 = mesh.vertices[c[0] as usize];
        let v1 = mesh.vertices[c[1] as usize];
        let v2 = mesh.vertices[c[2] as usize];

        let pos0: Vector3<f32> = v0.position.into();
        let pos1: Vector3<f32> = v1.position.into();
        let pos2: Vector3<f32> = v2.position.into();

        let uv0: Vector2<f32> = v0.texcoord.into();
        let uv1: Vector2<f32> = v1.texcoord.into();
        let uv2: Vector2<f32> = v2.texcoord.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;

        for &i in c {
            sums[i as usize] += tangent;
            triangles_included[i as usize] += 1;
        }
    }

    for ((vertex, sum), n) in mesh
        .vertices
        .iter_mut()
        .zip(sums)
        .zip(triangles_included)
    {
        if n > 0 && sum.magnitude2() > 0.0 {
            vertex.tangent = (sum / n as f32).normalize().into();
        }
    }
}
