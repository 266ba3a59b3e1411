// graph/generator.rs — Authoring model and block generation driver
//
// GraphGenerator owns the editable graph (topology + authoring nodes), the
// bounds policy, and the currently compiled program. Editing never touches
// the program; a compiled program stays valid for the snapshot it was
// compiled from until the next successful compile() replaces it.

use crate::buffer::{BlockBuffer, VoxelBuffer, CHANNEL_SDF, CHANNEL_TYPE};
use crate::cache::{self, BlockCache};
use crate::graph::bounds::{Bounds, PropertyValue};
use crate::graph::catalog::{NodeKind, ParamValue};
use crate::graph::compiler;
use crate::graph::program::{EvalScratch, Program};
use crate::graph::serialize::{self, GraphData};
use crate::graph::topology::{Connection, NodeId, PortLocation, ProgramGraph};
use crate::graph::{CompileError, EditError};
use crate::interval::Interval;
use crate::math::{Rect3i, Vec3i};
use crate::provider::{CurveSource, ImageSource, NoiseSource};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Range pruning threshold: blocks whose SDF range is entirely beyond this
/// distance from the surface are cleared to ±1 without per-voxel work.
const CLIP_THRESHOLD: f32 = 1.0;

/// A user-facing node: kind, parameter values, editor position.
#[derive(Debug, Clone)]
pub struct AuthorNode {
    pub kind: NodeKind,
    pub params: Vec<ParamValue>,
    pub gui_position: (f32, f32),
}

impl AuthorNode {
    fn new(kind: NodeKind) -> Self {
        AuthorNode {
            kind,
            params: kind
                .info()
                .params
                .iter()
                .map(ParamValue::default_for)
                .collect(),
            gui_position: (0.0, 0.0),
        }
    }
}

/// One block generation request.
pub struct BlockRequest<'a> {
    pub buffer: &'a mut (dyn BlockBuffer + Send),
    pub origin_in_voxels: Vec3i,
    pub lod: u8,
}

/// The SDF graph generator: authoring model, compiler front end, and block
/// driver in one object, mirroring how a host engine owns one generator
/// resource per terrain.
pub struct GraphGenerator {
    pub(crate) graph: ProgramGraph,
    pub(crate) nodes: FxHashMap<NodeId, AuthorNode>,
    pub(crate) bounds: Bounds,
    pub(crate) iso_scale: f32,
    program: Arc<Program>,
    scratch: EvalScratch,
    revision: u64,
}

impl Default for GraphGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphGenerator {
    pub fn new() -> Self {
        let program = Arc::new(Program::default());
        let scratch = program.new_scratch();
        GraphGenerator {
            graph: ProgramGraph::new(),
            nodes: FxHashMap::default(),
            bounds: Bounds::None,
            iso_scale: 1.0,
            program,
            scratch,
            revision: 0,
        }
    }

    /// Remove every node and connection and drop the compiled program.
    /// Bounds and iso scale are kept.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.nodes.clear();
        self.program = Arc::new(Program::default());
        self.scratch = self.program.new_scratch();
    }

    // ── Node editing ────────────────────────────────────────────────

    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let info = kind.info();
        let id = self.graph.create_node(info.inputs.len(), info.outputs.len());
        self.nodes.insert(id, AuthorNode::new(kind));
        id
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<(), EditError> {
        self.graph.remove_node(id)?;
        self.nodes.remove(&id);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn node(&self, id: NodeId) -> Option<&AuthorNode> {
        self.nodes.get(&id)
    }

    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind, EditError> {
        self.nodes
            .get(&id)
            .map(|n| n.kind)
            .ok_or(EditError::UnknownNode(id))
    }

    /// Set a parameter; the value kind must match the node's schema.
    pub fn set_node_param(
        &mut self,
        id: NodeId,
        index: usize,
        value: ParamValue,
    ) -> Result<(), EditError> {
        let node = self.nodes.get_mut(&id).ok_or(EditError::UnknownNode(id))?;
        let schema = node
            .kind
            .info()
            .params
            .get(index)
            .ok_or(EditError::PortOutOfRange)?;
        if value.kind() != schema.kind {
            return Err(EditError::ParamKindMismatch);
        }
        node.params[index] = value;
        Ok(())
    }

    pub fn set_param_float(&mut self, id: NodeId, index: usize, v: f32) -> Result<(), EditError> {
        self.set_node_param(id, index, ParamValue::Float(v))
    }

    pub fn set_param_curve(
        &mut self,
        id: NodeId,
        index: usize,
        curve: Arc<dyn CurveSource>,
    ) -> Result<(), EditError> {
        self.set_node_param(id, index, ParamValue::Curve(Some(curve)))
    }

    pub fn set_param_noise(
        &mut self,
        id: NodeId,
        index: usize,
        noise: Arc<dyn NoiseSource>,
    ) -> Result<(), EditError> {
        self.set_node_param(id, index, ParamValue::Noise(Some(noise)))
    }

    pub fn set_param_image(
        &mut self,
        id: NodeId,
        index: usize,
        image: Arc<dyn ImageSource>,
    ) -> Result<(), EditError> {
        self.set_node_param(id, index, ParamValue::Image(Some(image)))
    }

    pub fn node_param(&self, id: NodeId, index: usize) -> Result<&ParamValue, EditError> {
        let node = self.nodes.get(&id).ok_or(EditError::UnknownNode(id))?;
        node.params.get(index).ok_or(EditError::PortOutOfRange)
    }

    pub fn set_gui_position(&mut self, id: NodeId, pos: (f32, f32)) -> Result<(), EditError> {
        let node = self.nodes.get_mut(&id).ok_or(EditError::UnknownNode(id))?;
        node.gui_position = pos;
        Ok(())
    }

    pub fn gui_position(&self, id: NodeId) -> Result<(f32, f32), EditError> {
        self.nodes
            .get(&id)
            .map(|n| n.gui_position)
            .ok_or(EditError::UnknownNode(id))
    }

    // ── Connection editing ──────────────────────────────────────────

    pub fn can_connect(
        &self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> bool {
        self.graph.can_connect(
            PortLocation::new(src_node, src_port),
            PortLocation::new(dst_node, dst_port),
        )
    }

    pub fn add_connection(
        &mut self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> Result<(), EditError> {
        self.graph.connect(
            PortLocation::new(src_node, src_port),
            PortLocation::new(dst_node, dst_port),
        )
    }

    pub fn remove_connection(
        &mut self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> Result<(), EditError> {
        self.graph.disconnect(
            PortLocation::new(src_node, src_port),
            PortLocation::new(dst_node, dst_port),
        )
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.graph.connections()
    }

    // ── Bounds ──────────────────────────────────────────────────────

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn clear_bounds(&mut self) {
        self.bounds = Bounds::None;
    }

    pub fn set_vertical_bounds(
        &mut self,
        min_y: i32,
        max_y: i32,
        sdf_below: f32,
        sdf_above: f32,
        type_below: u64,
        type_above: u64,
    ) {
        let (min_y, max_y) = if min_y <= max_y {
            (min_y, max_y)
        } else {
            (max_y, min_y)
        };
        self.bounds = Bounds::Vertical {
            min_y,
            max_y,
            sdf_below,
            sdf_above,
            type_below,
            type_above,
        };
    }

    pub fn set_box_bounds(
        &mut self,
        mut min: Vec3i,
        mut max: Vec3i,
        sdf_outside: f32,
        type_outside: u64,
    ) {
        Vec3i::sort_min_max(&mut min, &mut max);
        self.bounds = Bounds::Box {
            min,
            max,
            sdf_outside,
            type_outside,
        };
    }

    pub fn bounds_property_list(&self) -> Vec<&'static str> {
        self.bounds.property_list()
    }

    pub fn get_bounds_property(&self, path: &str) -> Option<PropertyValue> {
        self.bounds.get_property(path)
    }

    pub fn set_bounds_property(&mut self, path: &str, value: PropertyValue) -> bool {
        self.bounds.set_property(path, value)
    }

    // ── Compilation ─────────────────────────────────────────────────

    pub fn iso_scale(&self) -> f32 {
        self.iso_scale
    }

    /// Multiplier converting graph units to world distance. Takes effect on
    /// the next compile.
    pub fn set_iso_scale(&mut self, iso_scale: f32) {
        self.iso_scale = iso_scale;
    }

    /// Compile the current graph snapshot. On failure the previously
    /// compiled program stays in place.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        let program = compiler::compile(&self.graph, &self.nodes, self.iso_scale)?;
        self.scratch = program.new_scratch();
        self.program = Arc::new(program);
        self.revision = self.revision.wrapping_add(1);
        Ok(())
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Bumped on every successful compile; cache keys include it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Evaluate the SDF at a single voxel position, honoring bounds.
    pub fn generate_single(&mut self, position: Vec3i) -> f32 {
        match self.bounds {
            Bounds::None => {}
            Bounds::Vertical {
                min_y,
                max_y,
                sdf_below,
                sdf_above,
                ..
            } => {
                if position.y >= max_y {
                    return sdf_above;
                }
                if position.y < min_y {
                    return sdf_below;
                }
            }
            Bounds::Box {
                min,
                max,
                sdf_outside,
                ..
            } => {
                if position.x < min.x
                    || position.y < min.y
                    || position.z < min.z
                    || position.x >= max.x
                    || position.y >= max.y
                    || position.z >= max.z
                {
                    return sdf_outside;
                }
            }
        }

        let (x, y, z) = position.as_f32();
        self.program.eval(&mut self.scratch, x, y, z)
    }

    /// Interval analysis of the program over a voxel-space box.
    pub fn analyze_range(&mut self, min_pos: Vec3i, max_pos: Vec3i) -> Interval {
        self.program
            .analyze_range(&mut self.scratch, min_pos.as_f32(), max_pos.as_f32())
    }

    /// Fill one block: bounds short-circuits, then range pruning, then the
    /// per-voxel walk.
    pub fn generate_block(&mut self, req: BlockRequest<'_>) {
        let program = Arc::clone(&self.program);
        drive_block(
            &program,
            &mut self.scratch,
            &self.bounds,
            req.buffer,
            req.origin_in_voxels,
            req.lod,
        );
    }

    /// Generate a batch of blocks on the rayon pool. The program is shared
    /// read-only; every worker gets its own scratch memory.
    pub fn generate_blocks(&self, requests: &mut [BlockRequest<'_>]) {
        let program = Arc::clone(&self.program);
        let bounds = self.bounds;
        requests.par_iter_mut().for_each_init(
            || program.new_scratch(),
            |scratch, req| {
                drive_block(
                    &program,
                    scratch,
                    &bounds,
                    req.buffer,
                    req.origin_in_voxels,
                    req.lod,
                );
            },
        );
    }

    /// Generate through the block cache: hits return the shared buffer
    /// without touching the evaluators.
    pub fn generate_block_cached(
        &mut self,
        cache: &BlockCache,
        origin_in_voxels: Vec3i,
        lod: u8,
        size: Vec3i,
    ) -> Arc<VoxelBuffer> {
        let key = cache::block_key(self.revision, origin_in_voxels, lod, size);
        if let Some(hit) = cache.get(key) {
            return hit;
        }

        let mut buffer = VoxelBuffer::new(size);
        self.generate_block(BlockRequest {
            buffer: &mut buffer,
            origin_in_voxels,
            lod,
        });
        let buffer = Arc::new(buffer);
        cache.put(key, Arc::clone(&buffer));
        buffer
    }

    // ── Duplication & persistence ───────────────────────────────────

    /// Deep-copy the authoring state. With `subresources`, curve/noise/image
    /// providers are duplicated too; otherwise the copy shares them. The
    /// compiled program is not copied, as it holds handles into this
    /// generator's resources; the copy starts uncompiled.
    pub fn duplicate(&self, subresources: bool) -> GraphGenerator {
        let mut graph = ProgramGraph::new();
        graph.copy_from(&self.graph);

        let mut nodes: FxHashMap<NodeId, AuthorNode> = FxHashMap::default();
        for (&id, node) in &self.nodes {
            let mut copy = node.clone();
            if subresources {
                for param in &mut copy.params {
                    *param = match &*param {
                        ParamValue::Curve(Some(c)) => ParamValue::Curve(Some(c.duplicated())),
                        ParamValue::Noise(Some(n)) => ParamValue::Noise(Some(n.duplicated())),
                        ParamValue::Image(Some(i)) => ParamValue::Image(Some(i.duplicated())),
                        other => other.clone(),
                    };
                }
            }
            nodes.insert(id, copy);
        }

        let program = Arc::new(Program::default());
        let scratch = program.new_scratch();
        GraphGenerator {
            graph,
            nodes,
            bounds: self.bounds,
            iso_scale: self.iso_scale,
            program,
            scratch,
            revision: 0,
        }
    }

    /// Snapshot the authoring state into the persisted record format.
    pub fn to_graph_data(&self) -> Result<GraphData, String> {
        serialize::to_graph_data(self)
    }

    /// Rebuild a generator from persisted records. The program is not part
    /// of the format; call [`GraphGenerator::compile`] afterwards.
    pub fn from_graph_data(data: &GraphData) -> Result<GraphGenerator, String> {
        serialize::from_graph_data(data)
    }

    // ── Presets ─────────────────────────────────────────────────────

    /// The rolling-waves demo graph:
    /// `Sub(Y, Mul(Add(Sin(Mul(X, 1/20)), Sin(Mul(Z, 1/20))), 10))`.
    pub fn load_waves_preset(&mut self) {
        self.clear();

        let n_x = self.create_node(NodeKind::InputX);
        let n_y = self.create_node(NodeKind::InputY);
        let n_z = self.create_node(NodeKind::InputZ);
        let n_o = self.create_node(NodeKind::OutputSdf);
        let n_sin0 = self.create_node(NodeKind::Sine);
        let n_sin1 = self.create_node(NodeKind::Sine);
        let n_add = self.create_node(NodeKind::Add);
        let n_mul0 = self.create_node(NodeKind::Multiply);
        let n_mul1 = self.create_node(NodeKind::Multiply);
        let n_mul2 = self.create_node(NodeKind::Multiply);
        let n_c0 = self.create_node(NodeKind::Constant);
        let n_c1 = self.create_node(NodeKind::Constant);
        let n_sub = self.create_node(NodeKind::Subtract);

        self.set_param_float(n_c0, 0, 1.0 / 20.0).unwrap();
        self.set_param_float(n_c1, 0, 10.0).unwrap();

        //    X --- * --- sin           Y
        //         /         \           \
        //       1/20         + --- * --- - --- O
        //         \         /     /
        //    Z --- * --- sin    10.0

        self.add_connection(n_x, 0, n_mul0, 0).unwrap();
        self.add_connection(n_z, 0, n_mul1, 0).unwrap();
        self.add_connection(n_c0, 0, n_mul0, 1).unwrap();
        self.add_connection(n_c0, 0, n_mul1, 1).unwrap();
        self.add_connection(n_mul0, 0, n_sin0, 0).unwrap();
        self.add_connection(n_mul1, 0, n_sin1, 0).unwrap();
        self.add_connection(n_sin0, 0, n_add, 0).unwrap();
        self.add_connection(n_sin1, 0, n_add, 1).unwrap();
        self.add_connection(n_add, 0, n_mul2, 0).unwrap();
        self.add_connection(n_c1, 0, n_mul2, 1).unwrap();
        self.add_connection(n_y, 0, n_sub, 0).unwrap();
        self.add_connection(n_mul2, 0, n_sub, 1).unwrap();
        self.add_connection(n_sub, 0, n_o, 0).unwrap();
    }
}

// ── Block driver ────────────────────────────────────────────────────

fn drive_block(
    program: &Program,
    scratch: &mut EvalScratch,
    bounds: &Bounds,
    buffer: &mut (dyn BlockBuffer + Send),
    origin: Vec3i,
    lod: u8,
) {
    let bs = buffer.size();
    let gmin = origin;
    let gmax = origin + (bs << lod);

    match *bounds {
        Bounds::None => {}
        Bounds::Vertical {
            min_y,
            max_y,
            sdf_below,
            sdf_above,
            type_below,
            type_above,
        } => {
            if origin.y > max_y {
                buffer.clear_channel(CHANNEL_TYPE, type_above as i64);
                buffer.clear_channel_f(CHANNEL_SDF, sdf_above);
                return;
            } else if origin.y + (bs.y << lod) < min_y {
                buffer.clear_channel(CHANNEL_TYPE, type_below as i64);
                buffer.clear_channel_f(CHANNEL_SDF, sdf_below);
                return;
            }
        }
        Bounds::Box {
            min,
            max,
            sdf_outside,
            type_outside,
        } => {
            let block = Rect3i::from_origin_size(origin, bs << lod);
            if !Rect3i::from_min_max(min, max).intersects(&block) {
                buffer.clear_channel(CHANNEL_TYPE, type_outside as i64);
                buffer.clear_channel_f(CHANNEL_SDF, sdf_outside);
                return;
            }
        }
    }

    let range = program.analyze_range(scratch, gmin.as_f32(), gmax.as_f32());
    if range.lo > CLIP_THRESHOLD {
        buffer.clear_channel_f(CHANNEL_SDF, 1.0);
        return;
    } else if range.hi < -CLIP_THRESHOLD {
        buffer.clear_channel_f(CHANNEL_SDF, -1.0);
        return;
    } else if range.is_single_value() {
        buffer.clear_channel_f(CHANNEL_SDF, range.lo);
        return;
    }

    let stride = 1i32 << lod;

    // z → x → y, innermost y contiguous in the buffer. The order is part of
    // the output contract: generated content must be bit-identical across
    // runs.
    let mut gz = gmin.z;
    for rz in 0..bs.z {
        let mut gx = gmin.x;
        for rx in 0..bs.x {
            let mut gy = gmin.y;
            for ry in 0..bs.y {
                let v = program.eval(scratch, gx as f32, gy as f32, gz as f32);
                buffer.set_voxel_f(v, rx, ry, rz, CHANNEL_SDF);
                gy += stride;
            }
            gx += stride;
        }
        gz += stride;
    }

    buffer.compress_uniform_channels();
}
