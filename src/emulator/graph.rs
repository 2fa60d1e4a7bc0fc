//! Boundary to the inference runtime.
//!
//! The emulator only sees the runtime through [`OperatorGraph`]: node operator tags,
//! builtin options, and bound tensors with their quantization and raw buffers. The
//! runtime's own output buffer for a node is the reference the emulation is checked
//! against. [`ModelGraph`] implements the trait over a JSON manifest plus tensor dumps
//! exported from the runtime.

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::conv::Padding;
use crate::error::ModelError;
use crate::loader::dump;
use crate::quantization::{FusedActivation, QuantParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    Int8,
    UInt8,
    Int32,
    Float32,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int32 | ElementType::Float32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int8 => write!(f, "INT8"),
            ElementType::UInt8 => write!(f, "UINT8"),
            ElementType::Int32 => write!(f, "INT32"),
            ElementType::Float32 => write!(f, "FLOAT32"),
        }
    }
}

/// A tensor bound to a node, as the runtime describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    pub name: String,
    pub dims: Vec<usize>,
    pub element_type: ElementType,
    /// `None` when the tensor is not affine-quantized.
    pub quantization: Option<QuantParams>,
    /// Raw little-endian element buffer. Empty when the runtime did not provide one.
    pub data: Vec<u8>,
}

impl TensorInfo {
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

/// Builtin options of a convolution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvOptions {
    #[serde(default = "one")]
    pub stride_h: usize,
    #[serde(default = "one")]
    pub stride_w: usize,
    #[serde(default = "one")]
    pub dilation_h: usize,
    #[serde(default = "one")]
    pub dilation_w: usize,
    /// Padding mode, used only to cross-check the output extent.
    #[serde(default)]
    pub padding: Option<Padding>,
    #[serde(default)]
    pub fused_activation: FusedActivation,
    /// Depthwise only. Derived from the channel counts when absent.
    #[serde(default)]
    pub depth_multiplier: Option<usize>,
}

fn one() -> usize {
    1
}

impl Default for ConvOptions {
    fn default() -> Self {
        ConvOptions {
            stride_h: 1,
            stride_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            padding: None,
            fused_activation: FusedActivation::None,
            depth_multiplier: None,
        }
    }
}

/// One operator node. Tensor indices follow the runtime: a negative index is an absent
/// optional input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub op: String,
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
    #[serde(default)]
    pub options: ConvOptions,
}

/// Read access to the runtime's operator graph.
pub trait OperatorGraph {
    fn num_nodes(&self) -> usize;
    fn node(&self, index: usize) -> Option<&NodeInfo>;
    fn tensor(&self, index: usize) -> Option<&TensorInfo>;
}

#[derive(Debug, Deserialize)]
struct TensorEntry {
    name: String,
    shape: Vec<usize>,
    #[serde(rename = "type")]
    element_type: ElementType,
    #[serde(default)]
    quantization: Option<QuantParams>,
    /// Dump file, relative to the manifest.
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    tensors: Vec<TensorEntry>,
    nodes: Vec<NodeInfo>,
}

/// An operator graph exported from the runtime: a JSON manifest plus raw tensor dumps.
///
/// ```json
/// {
///   "tensors": [
///     { "name": "input", "shape": [1, 224, 224, 3], "type": "INT8",
///       "quantization": { "scale": [0.0078], "zero_point": [-1] },
///       "data": "node1_input0.dat" }
///   ],
///   "nodes": [
///     { "op": "CONV_2D", "inputs": [0, 1, 2], "outputs": [3],
///       "options": { "stride_h": 2, "stride_w": 2, "padding": "SAME",
///                    "fused_activation": "RELU6" } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    tensors: Vec<TensorInfo>,
    nodes: Vec<NodeInfo>,
}

impl ModelGraph {
    /// Builds a graph in memory, checking that every node references an existing tensor.
    pub fn new(tensors: Vec<TensorInfo>, nodes: Vec<NodeInfo>) -> Result<Self, ModelError> {
        for (i, node) in nodes.iter().enumerate() {
            for &t in node.inputs.iter().chain(node.outputs.iter()) {
                if t >= 0 && t as usize >= tensors.len() {
                    return Err(ModelError::DanglingTensor { node: i, tensor: t, count: tensors.len() });
                }
            }
        }
        Ok(ModelGraph { tensors, nodes })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tensors = Vec::with_capacity(manifest.tensors.len());
        for entry in manifest.tensors {
            let data = match &entry.data {
                Some(file) => dump::read_bytes(base.join(file))?,
                None => Vec::new(),
            };
            debug!("tensor {} {:?} {} ({} bytes)", entry.name, entry.shape, entry.element_type, data.len());
            tensors.push(TensorInfo {
                name: entry.name,
                dims: entry.shape,
                element_type: entry.element_type,
                quantization: entry.quantization,
                data,
            });
        }
        ModelGraph::new(tensors, manifest.nodes)
    }

    pub fn tensors(&self) -> &[TensorInfo] {
        &self.tensors
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }
}

impl OperatorGraph for ModelGraph {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, index: usize) -> Option<&NodeInfo> {
        self.nodes.get(index)
    }

    fn tensor(&self, index: usize) -> Option<&TensorInfo> {
        self.tensors.get(index)
    }
}
