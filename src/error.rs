use std::path::PathBuf;

use thiserror::Error;

use crate::emulator::graph::ElementType;

/// Failures reading or writing tensor dumps.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("IO error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {len} bytes is not a multiple of the {size}-byte element size")]
    Misaligned { path: PathBuf, len: usize, size: usize },
    #[error("{path}: header declares {declared} elements but {found} follow")]
    CountMismatch { path: PathBuf, declared: usize, found: usize },
    #[error("{path}: missing element count header")]
    MissingHeader { path: PathBuf },
}

/// Failures loading a graph manifest.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("manifest decode error")]
    Decode(#[from] serde_json::Error),
    #[error("tensor dump")]
    Dump(#[from] DumpError),
    #[error("node {node} references tensor {tensor}, but the graph has {count} tensors")]
    DanglingTensor { node: usize, tensor: i32, count: usize },
}

/// Conditions under which a node cannot be emulated. Each one ends the validation run.
#[derive(Error, Debug)]
pub enum EmulationError {
    #[error("node {index} out of range (graph has {count} nodes)")]
    NodeOutOfRange { index: usize, count: usize },
    #[error("node {node}: unsupported operator {op}")]
    UnsupportedOperator { node: usize, op: String },
    #[error("node {node}: missing required {role} tensor")]
    MissingTensor { node: usize, role: &'static str },
    #[error("tensor {tensor}: expected element type {expected}, found {found}")]
    ElementType { tensor: String, expected: ElementType, found: ElementType },
    #[error("tensor {tensor}: {detail}")]
    Quantization { tensor: String, detail: String },
    #[error("tensor {tensor}: unsupported shape {dims:?}")]
    Rank { tensor: String, dims: Vec<usize> },
    #[error("node {node}: shape mismatch: {detail}")]
    ShapeMismatch { node: usize, detail: String },
    #[error("tensor {tensor}: buffer holds {found} bytes, expected {expected}")]
    BufferSize { tensor: String, expected: usize, found: usize },
    #[error("node {node}: invalid option: {detail}")]
    InvalidOption { node: usize, detail: String },
}

/// Failures of a whole validation run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Emulation(#[from] EmulationError),
    #[error(transparent)]
    Dump(#[from] DumpError),
}
