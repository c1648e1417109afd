use crate::data_structures::mesh::{Mesh, Vertex, compute_all_normals, compute_tangents};

/// Colour every imported vertex gets; model files carry no vertex colours here.
pub const IMPORT_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Converts a triangulated, single-indexed OBJ model.
///
/// Texture coordinates are flipped to a top-left origin.
pub fn mesh_from_obj(model: &tobj::Model) -> Mesh {
    let m = &model.mesh;
    let vertices = (0..m.positions.len() / 3)
        .map(|i| Vertex {
            position: [
                m.positions[i * 3],
                m.positions[i * 3 + 1],
                m.positions[i * 3 + 2],
            ],
            color: IMPORT_COLOR,
            normal: [
                m.normals.get(i * 3).map_or(0.0, |f| *f),
                m.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
            texcoord: [
                m.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - m.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            ..Default::default()
        })
        .collect();

    let mut mesh = Mesh {
        vertices,
        indices: m.indices.clone(),
    };
    finish(&mut mesh, !m.normals.is_empty(), !m.texcoords.is_empty(), false);
    mesh
}

/// Converts one triangle-list glTF primitive. `None` when the primitive has
/// no positions or is not made of triangles.
pub fn mesh_from_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Option<Mesh> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!(
            "skipping primitive {} with mode {:?}",
            primitive.index(),
            primitive.mode()
        );
        return None;
    }
    let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));

    let mut vertices: Vec<Vertex> = reader
        .read_positions()?
        .map(|position| Vertex {
            position,
            color: IMPORT_COLOR,
            ..Default::default()
        })
        .collect();

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices
                .iter_mut()
                .zip(normals)
                .for_each(|(v, normal)| v.normal = normal);
            true
        }
        None => false,
    };
    let has_texcoords = match reader.read_tex_coords(0) {
        Some(texcoords) => {
            vertices
                .iter_mut()
                .zip(texcoords.into_f32())
                .for_each(|(v, texcoord)| v.texcoord = texcoord);
            true
        }
        None => false,
    };
    // glTF tangents are vec4, w is the bitangent sign
    let has_tangents = match reader.read_tangents() {
        Some(tangents) => {
            vertices
                .iter_mut()
                .zip(tangents)
                .for_each(|(v, [x, y, z, _])| v.tangent = [x, y, z]);
            true
        }
        None => false,
    };

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    let mut mesh = Mesh { vertices, indices };
    finish(&mut mesh, has_normals, has_texcoords, has_tangents);
    Some(mesh)
}

fn finish(mesh: &mut Mesh, has_normals: bool, has_texcoords: bool, has_tangents: bool) {
    let vertex_count = mesh.vertices.len();
    let before = mesh.indices.len();
    // drop triangles that point outside the vertex list
    let valid: Vec<u32> = mesh
        .indices
        .chunks_exact(3)
        .filter(|c| c.iter().all(|&i| (i as usize) < vertex_count))
        .flatten()
        .copied()
        .collect();
    if valid.len() != before {
        log::warn!(
            "dropped {} indices that were out of range or incomplete",
            before - valid.len()
        );
    }
    mesh.indices = valid;

    if !has_normals {
        compute_all_normals(mesh);
    }
    if has_texcoords && !has_tangents {
        compute_tangents(mesh);
    }
}
