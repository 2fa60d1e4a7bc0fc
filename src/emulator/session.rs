use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{DumpError, RunError};
use crate::loader::dump::{write_bytes, write_counted};
use crate::metrics::compare::ByteComparison;
use super::graph::OperatorGraph;
use super::{emulate_node, NodeContext, NodeEmulation, OperatorKind};

/// How a validation run is driven.
#[derive(Debug, Clone, Default)]
pub struct EmulatorConfig {
    /// Nodes to emulate, in order. `None` means every node in the graph.
    pub nodes: Option<Vec<usize>>,
    /// Directory for `node{N}_reference.dat` / `node{N}_emulated.dat`.
    pub dump_dir: Option<PathBuf>,
    /// Also dump each node's input tensors and their quantization arrays.
    pub dump_inputs: bool,
    /// Keep emulating after a node whose output differs.
    pub keep_going: bool,
}

#[derive(Debug, Clone)]
pub struct NodeReport {
    pub node: usize,
    pub kind: OperatorKind,
    pub comparison: ByteComparison,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<NodeReport>,
}

impl RunSummary {
    pub fn all_match(&self) -> bool {
        self.reports.iter().all(|r| r.comparison.is_exact())
    }

    pub fn mismatched(&self) -> impl Iterator<Item = &NodeReport> {
        self.reports.iter().filter(|r| !r.comparison.is_exact())
    }
}

/// Emulates the configured nodes and compares each one with the runtime's output.
///
/// Stops at the first error. Stops at the first mismatch too unless `keep_going` is set.
pub fn run<G: OperatorGraph + ?Sized>(graph: &G, config: &EmulatorConfig) -> Result<RunSummary, RunError> {
    let nodes: Vec<usize> = match &config.nodes {
        Some(list) => list.clone(),
        None => (0..graph.num_nodes()).collect(),
    };

    let mut summary = RunSummary::default();
    for index in nodes {
        let ctx = NodeContext::new(graph, index)?;
        let result = emulate_node(&ctx)?;

        if let Some(dir) = &config.dump_dir {
            dump_node(dir, &ctx, &result, config.dump_inputs)?;
        }

        let comparison = result.compare();
        if comparison.is_exact() {
            info!("node {} {}: {} bytes match", index, result.kind, comparison.len);
        } else {
            warn!("node {} {}: {}", index, result.kind, comparison);
        }
        let exact = comparison.is_exact();
        summary.reports.push(NodeReport { node: index, kind: result.kind, comparison });
        if !exact && !config.keep_going {
            break;
        }
    }
    Ok(summary)
}

fn dump_node<G: OperatorGraph + ?Sized>(
    dir: &Path,
    ctx: &NodeContext<'_, G>,
    result: &NodeEmulation,
    dump_inputs: bool,
) -> Result<(), DumpError> {
    let n = result.node;
    write_bytes(dir.join(format!("node{}_reference.dat", n)), &result.reference)?;
    write_bytes(dir.join(format!("node{}_emulated.dat", n)), &result.emulated)?;
    if !dump_inputs {
        return Ok(());
    }
    for slot in 0..ctx.node().inputs.len() {
        let Some(tensor) = ctx.optional_input(slot) else { continue };
        write_bytes(dir.join(format!("node{}_input{}.dat", n, slot)), &tensor.data)?;
        if let Some(q) = &tensor.quantization {
            write_counted(dir.join(format!("node{}_input{}_scale.dat", n, slot)), &q.scale)?;
            write_counted(dir.join(format!("node{}_input{}_zero_point.dat", n, slot)), &q.zero_point)?;
        }
    }
    Ok(())
}
