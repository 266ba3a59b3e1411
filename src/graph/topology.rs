// graph/topology.rs — Port-level DAG the compiler walks
//
// Pure topology: nodes are (input ports, output ports), edges connect one
// output port to one input port. Input ports hold at most one connection;
// output ports fan out. Acyclicity is enforced at connect time, so every
// traversal below may assume a DAG.

use crate::graph::EditError;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

pub type NodeId = u32;

/// Address of a port: which node, which port index.
///
/// Whether it names an input or an output port depends on the position in a
/// [`Connection`] — sources are output ports, destinations input ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortLocation {
    pub node_id: NodeId,
    pub port_index: u32,
}

impl PortLocation {
    pub fn new(node_id: NodeId, port_index: u32) -> Self {
        PortLocation {
            node_id,
            port_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub src: PortLocation,
    pub dst: PortLocation,
}

#[derive(Debug, Clone, Default)]
struct TopoNode {
    /// One optional incoming connection per input port.
    inputs: Vec<Option<PortLocation>>,
    /// Outgoing connections per output port; fan-out is unbounded.
    outputs: Vec<SmallVec<[PortLocation; 2]>>,
}

/// The editing-side DAG. Node ids are stable for the lifetime of the graph
/// and survive [`ProgramGraph::copy_from`].
#[derive(Debug, Clone, Default)]
pub struct ProgramGraph {
    nodes: FxHashMap<NodeId, TopoNode>,
    next_id: NodeId,
}

impl ProgramGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_id = 0;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Create a node with the given port arities and return its id.
    pub fn create_node(&mut self, input_count: usize, output_count: usize) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.insert_node(id, input_count, output_count);
        id
    }

    /// Insert a node under a caller-chosen id (graph loading). The id must
    /// be unused.
    pub(crate) fn insert_node(&mut self, id: NodeId, input_count: usize, output_count: usize) {
        debug_assert!(!self.nodes.contains_key(&id), "duplicate node id {}", id);
        self.nodes.insert(
            id,
            TopoNode {
                inputs: vec![None; input_count],
                outputs: vec![SmallVec::new(); output_count],
            },
        );
        self.next_id = self.next_id.max(id + 1);
    }

    /// Remove a node, severing every incident connection.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), EditError> {
        let node = self.nodes.remove(&id).ok_or(EditError::UnknownNode(id))?;

        // Sever edges arriving at the removed node
        for src in node.inputs.iter().flatten() {
            if let Some(src_node) = self.nodes.get_mut(&src.node_id) {
                for fanout in &mut src_node.outputs {
                    fanout.retain(|dst| dst.node_id != id);
                }
            }
        }
        // Sever edges leaving it
        for fanout in &node.outputs {
            for dst in fanout {
                if let Some(dst_node) = self.nodes.get_mut(&dst.node_id) {
                    if let Some(slot) = dst_node.inputs.get_mut(dst.port_index as usize) {
                        if slot.map(|s| s.node_id) == Some(id) {
                            *slot = None;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// True iff both ports exist, the destination is unoccupied, and adding
    /// the edge keeps the graph acyclic.
    pub fn can_connect(&self, src: PortLocation, dst: PortLocation) -> bool {
        self.check_connect(src, dst).is_ok()
    }

    fn check_connect(&self, src: PortLocation, dst: PortLocation) -> Result<(), EditError> {
        let src_node = self
            .nodes
            .get(&src.node_id)
            .ok_or(EditError::UnknownNode(src.node_id))?;
        let dst_node = self
            .nodes
            .get(&dst.node_id)
            .ok_or(EditError::UnknownNode(dst.node_id))?;

        if src.port_index as usize >= src_node.outputs.len() {
            return Err(EditError::PortOutOfRange);
        }
        let slot = dst_node
            .inputs
            .get(dst.port_index as usize)
            .ok_or(EditError::PortOutOfRange)?;
        if slot.is_some() {
            return Err(EditError::DestinationOccupied);
        }
        if src.node_id == dst.node_id || self.is_reachable(dst.node_id, src.node_id) {
            return Err(EditError::WouldCycle);
        }
        Ok(())
    }

    /// Add the edge `src → dst`. Fails (leaving the graph unchanged) under
    /// the same conditions [`ProgramGraph::can_connect`] rejects.
    pub fn connect(&mut self, src: PortLocation, dst: PortLocation) -> Result<(), EditError> {
        self.check_connect(src, dst)?;
        self.nodes.get_mut(&src.node_id).unwrap().outputs[src.port_index as usize].push(dst);
        self.nodes.get_mut(&dst.node_id).unwrap().inputs[dst.port_index as usize] = Some(src);
        Ok(())
    }

    /// Remove the edge `src → dst` if present.
    pub fn disconnect(&mut self, src: PortLocation, dst: PortLocation) -> Result<(), EditError> {
        let dst_node = self
            .nodes
            .get_mut(&dst.node_id)
            .ok_or(EditError::UnknownNode(dst.node_id))?;
        let slot = dst_node
            .inputs
            .get_mut(dst.port_index as usize)
            .ok_or(EditError::PortOutOfRange)?;
        if *slot != Some(src) {
            return Ok(());
        }
        *slot = None;

        let src_node = self
            .nodes
            .get_mut(&src.node_id)
            .ok_or(EditError::UnknownNode(src.node_id))?;
        if let Some(fanout) = src_node.outputs.get_mut(src.port_index as usize) {
            fanout.retain(|d| *d != dst);
        }
        Ok(())
    }

    /// The connection feeding an input port, if any.
    pub fn input_source(&self, dst: PortLocation) -> Option<PortLocation> {
        self.nodes
            .get(&dst.node_id)
            .and_then(|n| n.inputs.get(dst.port_index as usize))
            .copied()
            .flatten()
    }

    /// Every edge in the graph, sorted for deterministic output.
    pub fn connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for (&id, node) in &self.nodes {
            for (port, src) in node.inputs.iter().enumerate() {
                if let Some(src) = src {
                    out.push(Connection {
                        src: *src,
                        dst: PortLocation::new(id, port as u32),
                    });
                }
            }
        }
        out.sort_by_key(|c| {
            (
                c.dst.node_id,
                c.dst.port_index,
                c.src.node_id,
                c.src.port_index,
            )
        });
        out
    }

    /// Nodes with no outgoing edges, sorted by id.
    pub fn find_terminal_nodes(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.outputs.iter().all(|fanout| fanout.is_empty()))
            .map(|(&id, _)| id)
            .collect();
        out.sort_unstable();
        out
    }

    /// Transitive dependencies of `terminal` in topological order, sources
    /// before consumers, each node exactly once, `terminal` last.
    ///
    /// Inputs are visited in declared port order, so the result (and
    /// therefore compiled programs) is deterministic.
    pub fn find_dependencies(&self, terminal: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(&terminal) {
            return order;
        }

        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(terminal);
        let mut stack: Vec<(NodeId, usize)> = vec![(terminal, 0)];

        while let Some((id, input_index)) = stack.pop() {
            let node = &self.nodes[&id];
            if input_index < node.inputs.len() {
                stack.push((id, input_index + 1));
                if let Some(src) = node.inputs[input_index] {
                    if visited.insert(src.node_id) {
                        stack.push((src.node_id, 0));
                    }
                }
            } else {
                order.push(id);
            }
        }
        order
    }

    /// Is `target` reachable from `start` following output edges?
    fn is_reachable(&self, start: NodeId, target: NodeId) -> bool {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                for fanout in &node.outputs {
                    for dst in fanout {
                        stack.push(dst.node_id);
                    }
                }
            }
        }
        false
    }

    /// Deep-copy another graph's topology, replacing this one. Node ids are
    /// preserved so the authoring model's id map stays valid on the copy.
    pub fn copy_from(&mut self, other: &ProgramGraph) {
        self.nodes = other.nodes.clone();
        self.next_id = other.next_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(node: NodeId, index: u32) -> PortLocation {
        PortLocation::new(node, index)
    }

    #[test]
    fn connect_and_query() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(2, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        assert_eq!(g.input_source(port(b, 0)), Some(port(a, 0)));
        assert_eq!(g.input_source(port(b, 1)), None);
    }

    #[test]
    fn destination_occupied_rejected() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(0, 1);
        let c = g.create_node(1, 1);
        g.connect(port(a, 0), port(c, 0)).unwrap();
        assert_eq!(
            g.connect(port(b, 0), port(c, 0)),
            Err(EditError::DestinationOccupied)
        );
        // Original edge untouched
        assert_eq!(g.input_source(port(c, 0)), Some(port(a, 0)));
    }

    #[test]
    fn cycle_rejected_topology_unchanged() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(1, 1);
        let b = g.create_node(1, 1);
        let c = g.create_node(1, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(b, 0), port(c, 0)).unwrap();

        assert!(!g.can_connect(port(c, 0), port(a, 0)));
        assert_eq!(g.connect(port(c, 0), port(a, 0)), Err(EditError::WouldCycle));
        // Self-edge is a cycle too
        assert_eq!(g.connect(port(a, 0), port(a, 0)), Err(EditError::WouldCycle));

        let cons = g.connections();
        assert_eq!(cons.len(), 2);
    }

    #[test]
    fn port_out_of_range_rejected() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 1);
        assert_eq!(
            g.connect(port(a, 1), port(b, 0)),
            Err(EditError::PortOutOfRange)
        );
        assert_eq!(
            g.connect(port(a, 0), port(b, 5)),
            Err(EditError::PortOutOfRange)
        );
    }

    #[test]
    fn unknown_node_rejected() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        assert_eq!(
            g.connect(port(a, 0), port(99, 0)),
            Err(EditError::UnknownNode(99))
        );
        assert_eq!(g.remove_node(42), Err(EditError::UnknownNode(42)));
    }

    #[test]
    fn remove_node_severs_connections() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 1);
        let c = g.create_node(1, 0);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(b, 0), port(c, 0)).unwrap();

        g.remove_node(b).unwrap();
        assert!(!g.has_node(b));
        assert_eq!(g.input_source(port(c, 0)), None);
        assert!(g.connections().is_empty());
        // a's fan-out no longer mentions b, so reconnecting works
        let d = g.create_node(1, 0);
        g.connect(port(a, 0), port(d, 0)).unwrap();
    }

    #[test]
    fn disconnect_removes_single_edge() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 0);
        let c = g.create_node(1, 0);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(a, 0), port(c, 0)).unwrap();

        g.disconnect(port(a, 0), port(b, 0)).unwrap();
        assert_eq!(g.input_source(port(b, 0)), None);
        assert_eq!(g.input_source(port(c, 0)), Some(port(a, 0)));
    }

    #[test]
    fn fan_out_allowed() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 0);
        let c = g.create_node(1, 0);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(a, 0), port(c, 0)).unwrap();
        assert_eq!(g.connections().len(), 2);
    }

    #[test]
    fn terminals_are_nodes_without_outgoing_edges() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        assert_eq!(g.find_terminal_nodes(), vec![b]);

        let lonely = g.create_node(0, 1);
        let mut terms = g.find_terminal_nodes();
        terms.sort_unstable();
        assert_eq!(terms, vec![b, lonely]);
    }

    #[test]
    fn dependencies_in_topological_order() {
        // a → b → d, c → d
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 1);
        let c = g.create_node(0, 1);
        let d = g.create_node(2, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(b, 0), port(d, 0)).unwrap();
        g.connect(port(c, 0), port(d, 1)).unwrap();

        let order = g.find_dependencies(d);
        assert_eq!(order.len(), 4);
        assert_eq!(*order.last().unwrap(), d);
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn shared_dependency_appears_once() {
        // a feeds both inputs of b
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(2, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        g.connect(port(a, 0), port(b, 1)).unwrap();

        let order = g.find_dependencies(b);
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn dependencies_ignore_unrelated_nodes() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 1);
        let _unrelated = g.create_node(0, 1);
        g.connect(port(a, 0), port(b, 0)).unwrap();
        assert_eq!(g.find_dependencies(b), vec![a, b]);
    }

    #[test]
    fn copy_from_preserves_ids_and_is_deep() {
        let mut g = ProgramGraph::new();
        let a = g.create_node(0, 1);
        let b = g.create_node(1, 0);
        g.connect(port(a, 0), port(b, 0)).unwrap();

        let mut copy = ProgramGraph::new();
        copy.copy_from(&g);
        assert_eq!(copy.connections(), g.connections());

        // Mutating the copy leaves the original alone
        copy.disconnect(port(a, 0), port(b, 0)).unwrap();
        assert_eq!(g.connections().len(), 1);
        assert!(copy.connections().is_empty());

        // Fresh ids on the copy don't collide with copied ones
        let fresh = copy.create_node(0, 0);
        assert!(fresh > b);
    }
}
