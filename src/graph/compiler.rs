// graph/compiler.rs — Lowers a validated DAG to bytecode + memory layout
//
// One linear pass over the terminal's dependencies in topological order.
// Structural nodes become memory slots (x/y/z are fixed at 0..2, constants
// append one slot each); runtime nodes emit an opcode byte, u16 slot
// addresses for their inputs and outputs, and a fixed payload. Unconnected
// inputs get a fresh zero slot, so defaulted ports are stable across
// recompiles and the output is fully deterministic.

use crate::graph::catalog::{NodeKind, ParamValue};
use crate::graph::generator::AuthorNode;
use crate::graph::program::{emit_f32, emit_u16, emit_u8, Program};
use crate::graph::topology::{NodeId, PortLocation, ProgramGraph};
use crate::graph::CompileError;
use crate::provider::{CurveSource, ImageSource, NoiseSource};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub(crate) fn compile(
    graph: &ProgramGraph,
    nodes: &FxHashMap<NodeId, AuthorNode>,
    iso_scale: f32,
) -> Result<Program, CompileError> {
    let terminals = graph.find_terminal_nodes();
    if terminals.is_empty() {
        return Err(CompileError::NoTerminal);
    }
    if terminals.len() > 1 {
        return Err(CompileError::MultipleTerminals);
    }

    let order = graph.find_dependencies(terminals[0]);

    let mut bytecode: Vec<u8> = Vec::new();
    // Slots 0..3 are reserved for the x/y/z inputs
    let mut memory: Vec<f32> = vec![0.0; 3];
    let mut output_addr: FxHashMap<PortLocation, u16> = FxHashMap::default();
    let mut curves: Vec<Arc<dyn CurveSource>> = Vec::new();
    let mut noises: Vec<Arc<dyn NoiseSource>> = Vec::new();
    let mut images: Vec<Arc<dyn ImageSource>> = Vec::new();
    let mut has_output = false;

    for &node_id in &order {
        let node = nodes
            .get(&node_id)
            .unwrap_or_else(|| panic!("graph/model node maps out of sync at node {}", node_id));
        let info = node.kind.info();

        match node.kind {
            NodeKind::Constant => {
                let addr = memory.len() as u16;
                memory.push(node.params[0].as_float());
                output_addr.insert(PortLocation::new(node_id, 0), addr);
            }
            NodeKind::InputX => {
                output_addr.insert(PortLocation::new(node_id, 0), 0);
            }
            NodeKind::InputY => {
                output_addr.insert(PortLocation::new(node_id, 0), 1);
            }
            NodeKind::InputZ => {
                output_addr.insert(PortLocation::new(node_id, 0), 2);
            }
            NodeKind::OutputSdf => {
                // The terminal SDF value must land in the last memory slot.
                // When the feeding slot is already the newest one (any
                // runtime node, or a constant appended just above) nothing
                // is emitted; an x/y/z input slot is forwarded through an
                // add-with-zero into a fresh terminal slot.
                let addr = match graph.input_source(PortLocation::new(node_id, 0)) {
                    None => {
                        let addr = memory.len() as u16;
                        memory.push(0.0);
                        addr
                    }
                    Some(src) => *output_addr.get(&src).ok_or(CompileError::Cycle)?,
                };
                if addr as usize != memory.len() - 1 {
                    let zero = memory.len() as u16;
                    memory.push(0.0);
                    let out = memory.len() as u16;
                    memory.push(0.0);
                    emit_u8(&mut bytecode, NodeKind::Add as u8);
                    emit_u16(&mut bytecode, addr);
                    emit_u16(&mut bytecode, zero);
                    emit_u16(&mut bytecode, out);
                }
                has_output = true;
            }
            _ => {
                emit_u8(&mut bytecode, node.kind as u8);

                // Inputs, in declared port order
                for port in 0..info.inputs.len() {
                    let addr = match graph.input_source(PortLocation::new(node_id, port as u32)) {
                        None => {
                            // Unconnected: a fresh zero slot, never reused
                            let addr = memory.len() as u16;
                            memory.push(0.0);
                            addr
                        }
                        Some(src) => *output_addr
                            .get(&src)
                            .ok_or(CompileError::Cycle)?,
                    };
                    emit_u16(&mut bytecode, addr);
                }

                // Outputs
                for port in 0..info.outputs.len() {
                    let addr = memory.len() as u16;
                    memory.push(0.0);
                    output_addr.insert(PortLocation::new(node_id, port as u32), addr);
                    emit_u16(&mut bytecode, addr);
                }

                // Per-opcode payload
                match node.kind {
                    NodeKind::Clamp => {
                        emit_f32(&mut bytecode, node.params[0].as_float());
                        emit_f32(&mut bytecode, node.params[1].as_float());
                    }
                    NodeKind::Remap => {
                        let src_min = node.params[0].as_float();
                        let src_max = node.params[1].as_float();
                        let dst_min = node.params[2].as_float();
                        let dst_max = node.params[3].as_float();
                        emit_f32(&mut bytecode, -src_min);
                        // Divide-by-zero guard: large sentinel, not an error
                        emit_f32(
                            &mut bytecode,
                            if src_max == src_min {
                                99999.0
                            } else {
                                1.0 / (src_max - src_min)
                            },
                        );
                        emit_f32(&mut bytecode, dst_min);
                        emit_f32(&mut bytecode, dst_max - dst_min);
                    }
                    NodeKind::Curve => {
                        let curve = param_curve(node, 0)
                            .ok_or(CompileError::MissingResource(node_id))?;
                        let (range, monotonic) = curve.bake_range();
                        emit_u8(&mut bytecode, monotonic as u8);
                        emit_f32(&mut bytecode, range.lo);
                        emit_f32(&mut bytecode, range.hi);
                        emit_u16(&mut bytecode, curves.len() as u16);
                        curves.push(curve);
                    }
                    NodeKind::Image2D => {
                        let image = param_image(node, 0)
                            .ok_or(CompileError::MissingResource(node_id))?;
                        let range = image.bake_range();
                        emit_f32(&mut bytecode, range.lo);
                        emit_f32(&mut bytecode, range.hi);
                        emit_u16(&mut bytecode, images.len() as u16);
                        images.push(image);
                    }
                    NodeKind::Noise2D | NodeKind::Noise3D => {
                        let noise = param_noise(node, 0)
                            .ok_or(CompileError::MissingResource(node_id))?;
                        emit_u16(&mut bytecode, noises.len() as u16);
                        noises.push(noise);
                    }
                    _ => {}
                }
            }
        }
    }

    if !has_output {
        return Err(CompileError::NoOutput);
    }

    // Degenerate graphs still need a terminal slot
    if memory.len() < 4 {
        memory.resize(4, 0.0);
    }

    // Double the memory and mirror the first half into the second so the
    // interval evaluator sees constants at the same addresses.
    let half = memory.len();
    for i in 0..half {
        let v = memory[i];
        memory.push(v);
    }

    log::debug!(
        "compiled voxel graph: {} bytecode bytes, {} memory slots",
        bytecode.len(),
        memory.len()
    );

    Ok(Program::from_parts(
        bytecode, memory, iso_scale, curves, noises, images,
    ))
}

fn param_curve(node: &AuthorNode, index: usize) -> Option<Arc<dyn CurveSource>> {
    match &node.params[index] {
        ParamValue::Curve(c) => c.clone(),
        _ => None,
    }
}

fn param_noise(node: &AuthorNode, index: usize) -> Option<Arc<dyn NoiseSource>> {
    match &node.params[index] {
        ParamValue::Noise(n) => n.clone(),
        _ => None,
    }
}

fn param_image(node: &AuthorNode, index: usize) -> Option<Arc<dyn ImageSource>> {
    match &node.params[index] {
        ParamValue::Image(i) => i.clone(),
        _ => None,
    }
}
