// graph/serialize.rs — Persisted graph format
//
// Node records, connection records, and the bounds record; bytecode is
// never persisted and is always recompiled from the graph after loading.
// Provider parameters persist through their `to_spec()` JSON description;
// host-custom providers without one fail serialization rather than silently
// dropping data.

use crate::graph::bounds::Bounds;
use crate::graph::catalog::{NodeKind, ParamKind, ParamValue};
use crate::graph::generator::{AuthorNode, GraphGenerator};
use crate::graph::topology::NodeId;
use crate::provider::{BakedCurve, GrayImage, SimplexNoise};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
    pub bounds: Bounds,
    pub iso_scale: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub params: Vec<ParamRecord>,
    pub gui_position: (f32, f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub src_node: NodeId,
    pub src_port: u32,
    pub dst_node: NodeId,
    pub dst_port: u32,
}

/// One persisted parameter. Resource specs are the provider's own JSON
/// self-description; `Unset` round-trips an empty resource slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRecord {
    Float(f32),
    Curve(Value),
    Noise(Value),
    Image(Value),
    Unset,
}

pub(crate) fn to_graph_data(gen: &GraphGenerator) -> Result<GraphData, String> {
    let mut nodes = Vec::with_capacity(gen.nodes.len());
    for id in gen.node_ids() {
        let node = &gen.nodes[&id];
        let mut params = Vec::with_capacity(node.params.len());
        for (index, param) in node.params.iter().enumerate() {
            params.push(param_record(node, id, index, param)?);
        }
        nodes.push(NodeRecord {
            id,
            kind: node.kind,
            params,
            gui_position: node.gui_position,
        });
    }

    let connections = gen
        .connections()
        .into_iter()
        .map(|c| ConnectionRecord {
            src_node: c.src.node_id,
            src_port: c.src.port_index,
            dst_node: c.dst.node_id,
            dst_port: c.dst.port_index,
        })
        .collect();

    Ok(GraphData {
        nodes,
        connections,
        bounds: gen.bounds,
        iso_scale: gen.iso_scale,
    })
}

fn param_record(
    node: &AuthorNode,
    id: NodeId,
    index: usize,
    param: &ParamValue,
) -> Result<ParamRecord, String> {
    let unserializable = || {
        format!(
            "node {} ({}) parameter {} holds a provider without a spec",
            id,
            node.kind.name(),
            index
        )
    };
    Ok(match param {
        ParamValue::Float(v) => ParamRecord::Float(*v),
        ParamValue::Curve(None) | ParamValue::Noise(None) | ParamValue::Image(None) => {
            ParamRecord::Unset
        }
        ParamValue::Curve(Some(c)) => {
            ParamRecord::Curve(c.to_spec().ok_or_else(unserializable)?)
        }
        ParamValue::Noise(Some(n)) => {
            ParamRecord::Noise(n.to_spec().ok_or_else(unserializable)?)
        }
        ParamValue::Image(Some(i)) => {
            ParamRecord::Image(i.to_spec().ok_or_else(unserializable)?)
        }
    })
}

pub(crate) fn from_graph_data(data: &GraphData) -> Result<GraphGenerator, String> {
    let mut gen = GraphGenerator::new();
    gen.bounds = data.bounds;
    gen.iso_scale = data.iso_scale;

    for record in &data.nodes {
        if gen.graph.has_node(record.id) {
            return Err(format!("duplicate node id {}", record.id));
        }
        let info = record.kind.info();
        if record.params.len() != info.params.len() {
            return Err(format!(
                "node {} ({}) has {} params, schema expects {}",
                record.id,
                record.kind.name(),
                record.params.len(),
                info.params.len()
            ));
        }

        let mut params = Vec::with_capacity(info.params.len());
        for (index, (schema, record_param)) in
            info.params.iter().zip(&record.params).enumerate()
        {
            params.push(load_param(record.id, index, schema.kind, record_param)?);
        }

        gen.graph
            .insert_node(record.id, info.inputs.len(), info.outputs.len());
        gen.nodes.insert(
            record.id,
            AuthorNode {
                kind: record.kind,
                params,
                gui_position: record.gui_position,
            },
        );
    }

    for con in &data.connections {
        gen.add_connection(con.src_node, con.src_port, con.dst_node, con.dst_port)
            .map_err(|e| format!("connection {:?} rejected: {}", con, e))?;
    }

    Ok(gen)
}

fn load_param(
    id: NodeId,
    index: usize,
    expected: ParamKind,
    record: &ParamRecord,
) -> Result<ParamValue, String> {
    let mismatch = |found: &str| {
        format!(
            "node {} parameter {}: expected {:?}, found {}",
            id, index, expected, found
        )
    };
    match (expected, record) {
        (ParamKind::Float, ParamRecord::Float(v)) => Ok(ParamValue::Float(*v)),
        (ParamKind::Curve, ParamRecord::Unset) => Ok(ParamValue::Curve(None)),
        (ParamKind::Noise, ParamRecord::Unset) => Ok(ParamValue::Noise(None)),
        (ParamKind::Image, ParamRecord::Unset) => Ok(ParamValue::Image(None)),
        (ParamKind::Curve, ParamRecord::Curve(spec)) => {
            let curve = BakedCurve::from_spec(spec)
                .ok_or_else(|| mismatch("an invalid curve spec"))?;
            Ok(ParamValue::Curve(Some(Arc::new(curve))))
        }
        (ParamKind::Noise, ParamRecord::Noise(spec)) => {
            let noise = SimplexNoise::from_spec(spec)
                .ok_or_else(|| mismatch("an invalid noise spec"))?;
            Ok(ParamValue::Noise(Some(Arc::new(noise))))
        }
        (ParamKind::Image, ParamRecord::Image(spec)) => {
            let image = GrayImage::from_spec(spec)
                .ok_or_else(|| mismatch("an invalid image spec"))?;
            Ok(ParamValue::Image(Some(Arc::new(image))))
        }
        (_, other) => Err(mismatch(&format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3i;

    #[test]
    fn waves_preset_roundtrips() {
        let mut gen = GraphGenerator::new();
        gen.load_waves_preset();
        gen.set_iso_scale(0.25);
        gen.set_box_bounds(Vec3i::splat(-64), Vec3i::splat(64), 1.0, 0);

        let data = gen.to_graph_data().unwrap();
        assert_eq!(data.nodes.len(), 13);
        assert_eq!(data.connections.len(), 13);

        let mut loaded = GraphGenerator::from_graph_data(&data).unwrap();
        assert_eq!(loaded.iso_scale(), 0.25);
        assert_eq!(loaded.bounds(), gen.bounds());

        gen.compile().unwrap();
        loaded.compile().unwrap();
        assert_eq!(loaded.program().bytecode(), gen.program().bytecode());
    }

    #[test]
    fn json_roundtrip_is_stable() {
        let mut gen = GraphGenerator::new();
        gen.load_waves_preset();
        let data = gen.to_graph_data().unwrap();

        let json = serde_json::to_string(&data).unwrap();
        let parsed: GraphData = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, json2);
    }

    #[test]
    fn provider_params_roundtrip() {
        let mut gen = GraphGenerator::new();
        let n = gen.create_node(NodeKind::Noise2D);
        let o = gen.create_node(NodeKind::OutputSdf);
        gen.set_param_noise(n, 0, Arc::new(SimplexNoise::new(42, 0.01)))
            .unwrap();
        gen.add_connection(n, 0, o, 0).unwrap();

        let data = gen.to_graph_data().unwrap();
        let loaded = GraphGenerator::from_graph_data(&data).unwrap();
        match loaded.node_param(n, 0).unwrap() {
            ParamValue::Noise(Some(_)) => {}
            other => panic!("expected noise param, got {:?}", other),
        }
    }

    #[test]
    fn unset_resource_roundtrips() {
        let mut gen = GraphGenerator::new();
        let c = gen.create_node(NodeKind::Curve);
        let data = gen.to_graph_data().unwrap();
        assert!(matches!(data.nodes[0].params[0], ParamRecord::Unset));

        let loaded = GraphGenerator::from_graph_data(&data).unwrap();
        match loaded.node_param(c, 0).unwrap() {
            ParamValue::Curve(None) => {}
            other => panic!("expected unset curve, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut gen = GraphGenerator::new();
        gen.create_node(NodeKind::OutputSdf);
        let mut data = gen.to_graph_data().unwrap();
        data.nodes.push(data.nodes[0].clone());
        assert!(GraphGenerator::from_graph_data(&data).is_err());
    }

    #[test]
    fn param_count_mismatch_rejected() {
        let mut gen = GraphGenerator::new();
        gen.create_node(NodeKind::Constant);
        let mut data = gen.to_graph_data().unwrap();
        data.nodes[0].params.clear();
        assert!(GraphGenerator::from_graph_data(&data).is_err());
    }

    #[test]
    fn param_kind_mismatch_rejected() {
        let mut gen = GraphGenerator::new();
        gen.create_node(NodeKind::Constant);
        let mut data = gen.to_graph_data().unwrap();
        data.nodes[0].params[0] = ParamRecord::Unset;
        assert!(GraphGenerator::from_graph_data(&data).is_err());
    }
}
