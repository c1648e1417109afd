//! flow-demos
//!
//! Small graphics-course demos on top of wgpu. Every demo is a flow that
//! records immediate-mode style calls (use a program, set uniforms, bind
//! textures and targets, draw) against the [`gpu::GraphicsApi`] trait; the
//! wgpu backend replays them once per frame.
//!
//! High-level modules
//! - `camera`: fly camera and model-matrix controls driven by keyboard and mouse
//! - `config`: per-demo window, pacing and asset settings
//! - `context`: window, surface and device
//! - `data_structures`: meshes, textures and the scene graph with its traversal
//! - `flow`: the demo trait and the event loop
//! - `gbuffer`: the deferred-shading G-buffer and its pass state machine
//! - `gpu`: the immediate-mode graphics interface
//! - `pipelines`: shader programs, uniform tables and point lights
//! - `render`: the wgpu implementation of the graphics interface
//! - `resources`: OBJ and glTF scene import
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod gbuffer;
pub mod gpu;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
pub use winit::keyboard::KeyCode;
