//! Procedural SDF voxel generation driven by a user-authored dataflow graph.
//!
//! Authors wire nodes (constants, spatial inputs, arithmetic, noise, curves,
//! images, remap/clamp/mix) into a DAG with a single SDF output. The graph is
//! compiled to a flat bytecode program over a static-addressed scalar memory,
//! which two interpreters share:
//!
//!   - [`graph::Program::eval`] — the per-voxel scalar hot loop
//!   - [`graph::Program::analyze_range`] — interval arithmetic over a spatial
//!     box, used to prune blocks that are entirely inside or outside the
//!     surface without touching a single voxel
//!
//! [`graph::GraphGenerator`] ties it together: authoring model, bounds
//! policy, compilation, and the block driver that fills [`buffer::VoxelBuffer`]
//! channels.

pub mod buffer;
pub mod cache;
pub mod graph;
pub mod interval;
pub mod math;
pub mod provider;

pub use buffer::{BlockBuffer, VoxelBuffer, CHANNEL_SDF, CHANNEL_TYPE};
pub use graph::{
    AuthorNode, BlockRequest, Bounds, CompileError, EditError, GraphGenerator, NodeKind, ParamValue,
    Program,
};
pub use interval::Interval;
pub use math::Vec3i;
