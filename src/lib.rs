//! Bit-exact emulation of quantized int8 convolutions.
//!
//! This crate reimplements the integer arithmetic an inference runtime performs for
//! `Conv2D` and `DepthwiseConv2D` with per-channel affine quantization, so that the
//! runtime's output for a node can be checked byte for byte against an independent
//! computation.
//!
//! # Example
//!
//! ```no_run
//! use qconv::emulator::{graph::ModelGraph, run, EmulatorConfig};
//!
//! let graph = ModelGraph::load("model/graph.json").unwrap();
//! let summary = run(&graph, &EmulatorConfig::default()).unwrap();
//! assert!(summary.all_match());
//! ```

/// 4D shapes and layouts.
pub mod tensor;
/// Affine quantization parameters and fixed-point rescaling.
pub mod quantization;
/// Float reference and quantized int8 convolution kernels.
pub mod conv;
/// Operator-graph boundary and per-node dispatch.
pub mod emulator;
/// Tensor dump files.
pub mod loader;
/// Byte comparison of reference and emulated outputs.
pub mod metrics;
/// Error types.
pub mod error;
