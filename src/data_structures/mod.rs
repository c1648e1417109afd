//! Demo data structures: meshes, textures and scene graphs.
//!
//! - `mesh` holds CPU vertex/index data and the procedural generators
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `scene_graph` is the imported node tree and its traversal

pub mod mesh;
pub mod scene_graph;
pub mod texture;
