// graph/catalog.rs — Node kinds and their port/parameter schemas
//
// Closed catalog: every node kind has a fixed input/output arity and a fixed
// parameter schema. The first five kinds are structural — the compiler folds
// them into memory slots and they never appear in bytecode. The enum
// discriminant doubles as the opcode byte.

use crate::provider::{CurveSource, ImageSource, NoiseSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    Constant = 0,
    InputX = 1,
    InputY = 2,
    InputZ = 3,
    OutputSdf = 4,
    Add = 5,
    Subtract = 6,
    Multiply = 7,
    Sine = 8,
    Floor = 9,
    Abs = 10,
    Sqrt = 11,
    Distance2D = 12,
    Distance3D = 13,
    Clamp = 14,
    Mix = 15,
    Remap = 16,
    Curve = 17,
    Noise2D = 18,
    Noise3D = 19,
    Image2D = 20,
}

/// All kinds, indexed by discriminant.
pub const ALL_NODE_KINDS: [NodeKind; 21] = [
    NodeKind::Constant,
    NodeKind::InputX,
    NodeKind::InputY,
    NodeKind::InputZ,
    NodeKind::OutputSdf,
    NodeKind::Add,
    NodeKind::Subtract,
    NodeKind::Multiply,
    NodeKind::Sine,
    NodeKind::Floor,
    NodeKind::Abs,
    NodeKind::Sqrt,
    NodeKind::Distance2D,
    NodeKind::Distance3D,
    NodeKind::Clamp,
    NodeKind::Mix,
    NodeKind::Remap,
    NodeKind::Curve,
    NodeKind::Noise2D,
    NodeKind::Noise3D,
    NodeKind::Image2D,
];

impl NodeKind {
    pub fn from_u8(v: u8) -> Option<NodeKind> {
        ALL_NODE_KINDS.get(v as usize).copied()
    }

    /// Structural kinds are compiled away into memory slots.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            NodeKind::Constant
                | NodeKind::InputX
                | NodeKind::InputY
                | NodeKind::InputZ
                | NodeKind::OutputSdf
        )
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Port and parameter schema for this kind.
    pub fn info(self) -> &'static NodeTypeInfo {
        &NODE_TYPE_INFOS[self as usize]
    }
}

const NO_PORTS: &[&str] = &[];
const NO_PARAMS: &[ParamInfo] = &[];
const ONE_VALUE: &[&str] = &["value"];
const ONE_OUT: &[&str] = &["out"];
const UNARY_IN: &[&str] = &["x"];
const BINOP_IN: &[&str] = &["a", "b"];

const fn info(
    name: &'static str,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
    params: &'static [ParamInfo],
) -> NodeTypeInfo {
    NodeTypeInfo {
        name,
        inputs,
        outputs,
        params,
    }
}

/// Schema table, indexed by `NodeKind` discriminant — entries must stay in
/// enum order.
static NODE_TYPE_INFOS: [NodeTypeInfo; 21] = [
    info(
        "Constant",
        NO_PORTS,
        ONE_VALUE,
        &[ParamInfo::float("value", 0.0)],
    ),
    info("InputX", NO_PORTS, ONE_VALUE, NO_PARAMS),
    info("InputY", NO_PORTS, ONE_VALUE, NO_PARAMS),
    info("InputZ", NO_PORTS, ONE_VALUE, NO_PARAMS),
    info("OutputSdf", &["sdf"], NO_PORTS, NO_PARAMS),
    info("Add", BINOP_IN, ONE_OUT, NO_PARAMS),
    info("Subtract", BINOP_IN, ONE_OUT, NO_PARAMS),
    info("Multiply", BINOP_IN, ONE_OUT, NO_PARAMS),
    info("Sine", UNARY_IN, ONE_OUT, NO_PARAMS),
    info("Floor", UNARY_IN, ONE_OUT, NO_PARAMS),
    info("Abs", UNARY_IN, ONE_OUT, NO_PARAMS),
    info("Sqrt", UNARY_IN, ONE_OUT, NO_PARAMS),
    info("Distance2D", &["x0", "y0", "x1", "y1"], ONE_OUT, NO_PARAMS),
    info(
        "Distance3D",
        &["x0", "y0", "z0", "x1", "y1", "z1"],
        ONE_OUT,
        NO_PARAMS,
    ),
    info(
        "Clamp",
        UNARY_IN,
        ONE_OUT,
        &[ParamInfo::float("min", -1.0), ParamInfo::float("max", 1.0)],
    ),
    info("Mix", &["a", "b", "ratio"], ONE_OUT, NO_PARAMS),
    info(
        "Remap",
        UNARY_IN,
        ONE_OUT,
        &[
            ParamInfo::float("src_min", 0.0),
            ParamInfo::float("src_max", 1.0),
            ParamInfo::float("dst_min", 0.0),
            ParamInfo::float("dst_max", 1.0),
        ],
    ),
    info(
        "Curve",
        UNARY_IN,
        ONE_OUT,
        &[ParamInfo::resource("curve", ParamKind::Curve)],
    ),
    info(
        "Noise2D",
        &["x", "y"],
        ONE_OUT,
        &[ParamInfo::resource("noise", ParamKind::Noise)],
    ),
    info(
        "Noise3D",
        &["x", "y", "z"],
        ONE_OUT,
        &[ParamInfo::resource("noise", ParamKind::Noise)],
    ),
    info(
        "Image2D",
        &["x", "y"],
        ONE_OUT,
        &[ParamInfo::resource("image", ParamKind::Image)],
    ),
];

/// Static schema of one node kind.
pub struct NodeTypeInfo {
    pub name: &'static str,
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
    pub params: &'static [ParamInfo],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Curve,
    Noise,
    Image,
}

pub struct ParamInfo {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: f32,
}

impl ParamInfo {
    const fn float(name: &'static str, default: f32) -> Self {
        ParamInfo {
            name,
            kind: ParamKind::Float,
            default,
        }
    }

    const fn resource(name: &'static str, kind: ParamKind) -> Self {
        ParamInfo {
            name,
            kind,
            default: 0.0,
        }
    }
}

// ── Parameter values ────────────────────────────────────────────────

/// A parameter value carried by an authoring node. Resource slots start
/// empty and must be attached before a graph using them can compile.
#[derive(Clone)]
pub enum ParamValue {
    Float(f32),
    Curve(Option<Arc<dyn CurveSource>>),
    Noise(Option<Arc<dyn NoiseSource>>),
    Image(Option<Arc<dyn ImageSource>>),
}

impl ParamValue {
    pub fn default_for(info: &ParamInfo) -> Self {
        match info.kind {
            ParamKind::Float => ParamValue::Float(info.default),
            ParamKind::Curve => ParamValue::Curve(None),
            ParamKind::Noise => ParamValue::Noise(None),
            ParamKind::Image => ParamValue::Image(None),
        }
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Curve(_) => ParamKind::Curve,
            ParamValue::Noise(_) => ParamKind::Noise,
            ParamValue::Image(_) => ParamKind::Image,
        }
    }

    pub fn as_float(&self) -> f32 {
        match self {
            ParamValue::Float(v) => *v,
            _ => 0.0,
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "Float({})", v),
            ParamValue::Curve(c) => write!(f, "Curve(<{}>)", if c.is_some() { "set" } else { "unset" }),
            ParamValue::Noise(n) => write!(f, "Noise(<{}>)", if n.is_some() { "set" } else { "unset" }),
            ParamValue::Image(i) => write!(f, "Image(<{}>)", if i.is_some() { "set" } else { "unset" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminant_roundtrip() {
        for kind in ALL_NODE_KINDS {
            assert_eq!(NodeKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(NodeKind::from_u8(21), None);
        assert_eq!(NodeKind::from_u8(255), None);
    }

    #[test]
    fn schema_table_is_in_enum_order() {
        for kind in ALL_NODE_KINDS {
            assert_eq!(kind.info().name, format!("{:?}", kind));
        }
    }

    #[test]
    fn structural_kinds() {
        assert!(NodeKind::Constant.is_structural());
        assert!(NodeKind::InputY.is_structural());
        assert!(NodeKind::OutputSdf.is_structural());
        assert!(!NodeKind::Add.is_structural());
        assert!(!NodeKind::Image2D.is_structural());
    }

    #[test]
    fn arities_match_semantics() {
        assert_eq!(NodeKind::Add.info().inputs.len(), 2);
        assert_eq!(NodeKind::Mix.info().inputs.len(), 3);
        assert_eq!(NodeKind::Distance2D.info().inputs.len(), 4);
        assert_eq!(NodeKind::Distance3D.info().inputs.len(), 6);
        assert_eq!(NodeKind::OutputSdf.info().inputs.len(), 1);
        assert_eq!(NodeKind::OutputSdf.info().outputs.len(), 0);
        assert_eq!(NodeKind::Constant.info().inputs.len(), 0);
        assert_eq!(NodeKind::Constant.info().outputs.len(), 1);
    }

    #[test]
    fn remap_param_schema() {
        let params = NodeKind::Remap.info().params;
        let names: Vec<&str> = params.iter().map(|p| p.name).collect();
        assert_eq!(names, ["src_min", "src_max", "dst_min", "dst_max"]);
        assert!(params.iter().all(|p| p.kind == ParamKind::Float));
    }

    #[test]
    fn default_params_have_matching_kinds() {
        for kind in ALL_NODE_KINDS {
            for info in kind.info().params {
                let v = ParamValue::default_for(info);
                assert_eq!(v.kind(), info.kind);
            }
        }
    }
}
