//! Loading scenes from model files.
//!
//! `.obj` files go through `tobj`, `.gltf`/`.glb` through `gltf`. Both end up
//! as a [`Scene`]: a node tree whose nodes index into one flat mesh list.

use std::path::Path;

use anyhow::{Context, anyhow, bail};
use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::scene_graph::{Scene, SceneNode};

pub mod mesh;

pub fn load_scene(path: impl AsRef<Path>) -> anyhow::Result<Scene> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let scene = match extension.as_deref() {
        Some("obj") => load_scene_obj(path),
        Some("gltf") | Some("glb") => load_scene_gltf(path),
        _ => bail!("unsupported model format: {}", path.display()),
    }
    .with_context(|| format!("cannot import {}", path.display()))?;

    log::info!(
        "loaded {}: {} meshes, {} nodes, {} mesh references",
        path.display(),
        scene.meshes.len(),
        scene.root.node_count(),
        scene.root.mesh_reference_count()
    );
    scene.root.log_tree(&Matrix4::identity(), 0);
    Ok(scene)
}

/// Root `root` with one child per OBJ object, each drawing its own mesh.
pub fn load_scene_obj(path: &Path) -> anyhow::Result<Scene> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )?;
    if let Err(e) = materials {
        log::debug!("ignoring materials of {}: {}", path.display(), e);
    }

    let mut root = SceneNode::new("root", Matrix4::identity());
    let mut meshes = Vec::with_capacity(models.len());
    for model in &models {
        let index = meshes.len();
        meshes.push(mesh::mesh_from_obj(model));
        root.children
            .push(SceneNode::new(model.name.clone(), Matrix4::identity()).with_meshes(vec![index]));
    }
    Ok(Scene { root, meshes })
}

/// One mesh per primitive; a node references every primitive of its mesh.
/// Several root nodes are gathered under a synthetic identity root.
pub fn load_scene_gltf(path: &Path) -> anyhow::Result<Scene> {
    let (document, buffers, _images) = gltf::import(path)?;

    let mut meshes = Vec::new();
    let mut primitives_of: Vec<Vec<usize>> = Vec::with_capacity(document.meshes().len());
    for gltf_mesh in document.meshes() {
        let mut indices = Vec::new();
        for primitive in gltf_mesh.primitives() {
            if let Some(mesh) = mesh::mesh_from_primitive(&primitive, &buffers) {
                indices.push(meshes.len());
                meshes.push(mesh);
            }
        }
        primitives_of.push(indices);
    }

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("the file contains no scene"))?;
    let mut roots: Vec<SceneNode> = scene
        .nodes()
        .map(|node| to_scene_node(&node, &primitives_of))
        .collect();

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut root = SceneNode::new(
            scene.name().unwrap_or("root").to_string(),
            Matrix4::identity(),
        );
        root.children = roots;
        root
    };
    Ok(Scene { root, meshes })
}

fn to_scene_node(node: &gltf::Node, primitives_of: &[Vec<usize>]) -> SceneNode {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let meshes = node
        .mesh()
        .and_then(|m| primitives_of.get(m.index()).cloned())
        .unwrap_or_default();
    let mut scene_node = SceneNode::new(name, Matrix4::from(node.transform().matrix()))
        .with_meshes(meshes);
    scene_node.children = node
        .children()
        .map(|child| to_scene_node(&child, primitives_of))
        .collect();
    scene_node
}
