// graph/mod.rs — Authoring graph, compiler, and runtime program
//
// The authoring side (catalog, topology, generator) is editor-facing and
// keyed by stable node ids. The runtime side (program) is a flat bytecode
// the evaluators interpret; only the compiler bridges the two.

pub mod bounds;
pub mod catalog;
pub mod compiler;
pub mod generator;
pub mod program;
pub mod serialize;
pub mod topology;

pub use bounds::{Bounds, PropertyValue};
pub use catalog::{NodeKind, ParamKind, ParamValue};
pub use generator::{AuthorNode, BlockRequest, GraphGenerator};
pub use program::{EvalScratch, Program};
pub use serialize::GraphData;
pub use topology::{Connection, NodeId, PortLocation, ProgramGraph};

use thiserror::Error;

/// Compilation failures. The generator keeps its previously compiled
/// program when any of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("graph has no terminal node")]
    NoTerminal,
    #[error("graph has more than one terminal node")]
    MultipleTerminals,
    #[error("graph has no SDF output node")]
    NoOutput,
    #[error("graph contains a cycle")]
    Cycle,
    #[error("node {0} is missing its curve/noise/image resource")]
    MissingResource(NodeId),
}

/// Graph edit failures. The graph is left unchanged when any of these is
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
    #[error("port or parameter index out of range")]
    PortOutOfRange,
    #[error("connection would create a cycle")]
    WouldCycle,
    #[error("destination port already has a connection")]
    DestinationOccupied,
    #[error("parameter value kind does not match the node schema")]
    ParamKindMismatch,
}
