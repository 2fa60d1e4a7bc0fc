//! Operator-graph emulation.
//!
//! A [`NodeContext`] pins one node of an [`OperatorGraph`]; [`emulate_node`] routes it by
//! [`OperatorKind`] to the matching kernel and returns the runtime's output next to the
//! emulated one. [`run`] drives a whole validation pass from an [`EmulatorConfig`].

pub mod graph;
mod dispatch;
mod session;

pub use dispatch::emulate_node;
pub use session::{run, EmulatorConfig, NodeReport, RunSummary};

use std::fmt;

use crate::error::EmulationError;
use crate::metrics::compare::{compare_bytes, ByteComparison};
use graph::{NodeInfo, OperatorGraph, TensorInfo};

/// Operator kinds the emulator knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
    Conv2D,
    DepthwiseConv2D,
    /// Anything else, keeping the runtime's name for the error report.
    Unsupported(String),
}

impl OperatorKind {
    /// Maps a runtime builtin operator name (`CONV_2D`, `DEPTHWISE_CONV_2D`).
    pub fn from_op(op: &str) -> Self {
        match op {
            "CONV_2D" | "Conv2D" => OperatorKind::Conv2D,
            "DEPTHWISE_CONV_2D" | "DepthwiseConv2D" => OperatorKind::DepthwiseConv2D,
            other => OperatorKind::Unsupported(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, OperatorKind::Unsupported(_))
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Conv2D => write!(f, "Conv2D"),
            OperatorKind::DepthwiseConv2D => write!(f, "DepthwiseConv2D"),
            OperatorKind::Unsupported(op) => write!(f, "{} (unsupported)", op),
        }
    }
}

/// One node of a graph, resolved.
pub struct NodeContext<'g, G: OperatorGraph + ?Sized> {
    graph: &'g G,
    index: usize,
    node: &'g NodeInfo,
}

impl<'g, G: OperatorGraph + ?Sized> NodeContext<'g, G> {
    pub fn new(graph: &'g G, index: usize) -> Result<Self, EmulationError> {
        let node = graph
            .node(index)
            .ok_or(EmulationError::NodeOutOfRange { index, count: graph.num_nodes() })?;
        Ok(NodeContext { graph, index, node })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn node(&self) -> &'g NodeInfo {
        self.node
    }

    pub fn kind(&self) -> OperatorKind {
        OperatorKind::from_op(&self.node.op)
    }

    fn lookup(&self, indices: &[i32], slot: usize) -> Option<&'g TensorInfo> {
        let t = *indices.get(slot)?;
        if t < 0 {
            return None;
        }
        self.graph.tensor(t as usize)
    }

    /// Input at `slot`, or `None` when the runtime marks it absent.
    pub fn optional_input(&self, slot: usize) -> Option<&'g TensorInfo> {
        self.lookup(&self.node.inputs, slot)
    }

    pub fn input(&self, slot: usize, role: &'static str) -> Result<&'g TensorInfo, EmulationError> {
        self.optional_input(slot)
            .ok_or(EmulationError::MissingTensor { node: self.index, role })
    }

    pub fn output(&self, slot: usize, role: &'static str) -> Result<&'g TensorInfo, EmulationError> {
        self.lookup(&self.node.outputs, slot)
            .ok_or(EmulationError::MissingTensor { node: self.index, role })
    }
}

/// The runtime's output and the emulated output of one node, as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEmulation {
    pub node: usize,
    pub kind: OperatorKind,
    pub reference: Vec<u8>,
    pub emulated: Vec<u8>,
}

impl NodeEmulation {
    pub fn compare(&self) -> ByteComparison {
        compare_bytes(&self.reference, &self.emulated)
    }

    pub fn matches(&self) -> bool {
        self.reference == self.emulated
    }
}
