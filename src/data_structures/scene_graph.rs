//! Scene graph and its traversal.
//!
//! An imported model is a strict tree of [`SceneNode`]s. Each node carries a
//! local transform and indices into the scene's flat mesh list. Rendering walks
//! the tree pre-order, accumulates the transform, spins every node about its
//! own world position and draws the node's meshes.

use cgmath::{Deg, Matrix4, SquareMatrix, Vector3};

use crate::{
    camera::make_local_rotate,
    data_structures::mesh::Mesh,
    gpu::{GraphicsApi, UniformLocation},
};

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    /// Indices into [`Scene::meshes`], drawn in this order.
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_meshes(mut self, meshes: Vec<usize>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// World transforms of this subtree in pre-order, keyed by node name.
    pub fn world_transforms(&self, parent: &Matrix4<f32>) -> Vec<(String, Matrix4<f32>)> {
        let mut out = Vec::new();
        self.collect_world_transforms(parent, &mut out);
        out
    }

    fn collect_world_transforms(
        &self,
        parent: &Matrix4<f32>,
        out: &mut Vec<(String, Matrix4<f32>)>,
    ) {
        let world = parent * self.transform;
        out.push((self.name.clone(), world));
        for child in &self.children {
            child.collect_world_transforms(&world, out);
        }
    }

    /// Number of mesh references in this subtree, i.e. the draw calls one
    /// [`render_scene`] call issues.
    pub fn mesh_reference_count(&self) -> usize {
        self.meshes.len()
            + self
                .children
                .iter()
                .map(SceneNode::mesh_reference_count)
                .sum::<usize>()
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SceneNode::node_count)
            .sum::<usize>()
    }

    /// Dumps the subtree to the debug log, indented by depth.
    pub fn log_tree(&self, parent: &Matrix4<f32>, level: usize) {
        let indent = "  ".repeat(level);
        let current = parent * self.transform;
        log::debug!(
            "{indent}* {} ({} meshes, {} children)",
            self.name,
            self.meshes.len(),
            self.children.len()
        );
        log::debug!("{indent}  parent:  {:?}", Into::<[[f32; 4]; 4]>::into(*parent));
        log::debug!("{indent}  local:   {:?}", Into::<[[f32; 4]; 4]>::into(self.transform));
        log::debug!("{indent}  current: {:?}", Into::<[[f32; 4]; 4]>::into(current));
        for child in &self.children {
            child.log_tree(&current, level + 1);
        }
    }
}

/// An imported model: the node tree plus the meshes it references.
#[derive(Clone, Debug)]
pub struct Scene {
    pub root: SceneNode,
    pub meshes: Vec<Mesh>,
}

impl Scene {
    /// Uploads every mesh; the returned handles keep the scene's indexing.
    pub fn upload<G: GraphicsApi>(&self, api: &mut G) -> Vec<G::Mesh> {
        self.meshes.iter().map(|mesh| api.create_mesh(mesh)).collect()
    }
}

/// Rotation applied to every node about its own world position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spin {
    pub axis: Vector3<f32>,
    pub angle: Deg<f32>,
}

impl Spin {
    pub fn new(axis: Vector3<f32>, angle: Deg<f32>) -> Self {
        use cgmath::InnerSpace;
        Self {
            axis: axis.normalize(),
            angle,
        }
    }

    /// `T(p) * R * T(-p)` where `p` is the translation of `world`.
    pub fn about(&self, world: &Matrix4<f32>) -> Matrix4<f32> {
        make_local_rotate(world.w.truncate(), self.axis, self.angle)
    }
}

impl Default for Spin {
    fn default() -> Self {
        Self {
            axis: Vector3::unit_z(),
            angle: Deg(0.0),
        }
    }
}

fn draw_node<G: GraphicsApi>(
    api: &mut G,
    node: &SceneNode,
    world: &Matrix4<f32>,
    model_location: Option<UniformLocation>,
    meshes: &[G::Mesh],
    spin: &Spin,
) {
    if let Some(location) = model_location {
        let model = spin.about(world) * world;
        api.set_uniform_mat4(location, &model);
    }
    for &index in &node.meshes {
        match meshes.get(index) {
            Some(mesh) => api.draw_mesh(mesh),
            None => log::warn!(
                "node {} references mesh {} but the scene only has {}",
                node.name,
                index,
                meshes.len()
            ),
        }
    }
}

/// Draws `node` and its subtree.
///
/// Children inherit the accumulated transform without the spin, so the spin
/// never compounds down the tree.
pub fn render_scene<G: GraphicsApi>(
    api: &mut G,
    node: &SceneNode,
    parent: &Matrix4<f32>,
    model_location: Option<UniformLocation>,
    meshes: &[G::Mesh],
    spin: &Spin,
) {
    let world = parent * node.transform;
    draw_node(api, node, &world, model_location, meshes, spin);
    for child in &node.children {
        render_scene(api, child, &world, model_location, meshes, spin);
    }
}

/// [`render_scene`] with an explicit stack; issues the exact same calls.
pub fn render_scene_iterative<G: GraphicsApi>(
    api: &mut G,
    node: &SceneNode,
    parent: &Matrix4<f32>,
    model_location: Option<UniformLocation>,
    meshes: &[G::Mesh],
    spin: &Spin,
) {
    let mut stack = vec![(node, *parent)];
    while let Some((node, parent)) = stack.pop() {
        let world = parent * node.transform;
        draw_node(api, node, &world, model_location, meshes, spin);
        stack.extend(node.children.iter().rev().map(|child| (child, world)));
    }
}

/// Draws the whole scene from the root with an identity parent.
pub fn render_root<G: GraphicsApi>(
    api: &mut G,
    scene: &Scene,
    model_location: Option<UniformLocation>,
    meshes: &[G::Mesh],
    spin: &Spin,
) {
    render_scene(
        api,
        &scene.root,
        &Matrix4::identity(),
        model_location,
        meshes,
        spin,
    );
}
