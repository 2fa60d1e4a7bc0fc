use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use qconv::emulator::graph::{ModelGraph, OperatorGraph};
use qconv::emulator::{run, EmulatorConfig, OperatorKind};
use qconv::loader::dump::read_bytes;
use qconv::metrics::compare::compare_bytes;

#[derive(Parser, Debug)]
#[command(author, version, about = "Emulate quantized convolutions and compare them with runtime output", long_about = None)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the nodes and tensors of an exported graph
    Inspect {
        /// Graph manifest (JSON)
        #[arg(long)]
        graph: PathBuf,
    },
    /// Emulate nodes and compare with the runtime's outputs
    Emulate {
        /// Graph manifest (JSON)
        #[arg(long)]
        graph: PathBuf,

        /// Node index to emulate; repeat for several. Defaults to every node
        #[arg(long = "node")]
        nodes: Vec<usize>,

        /// Write reference and emulated outputs here
        #[arg(long)]
        dump_dir: Option<PathBuf>,

        /// Also dump node inputs and their scale/zero-point arrays
        #[arg(long, requires = "dump_dir")]
        dump_inputs: bool,

        /// Continue after a mismatching node
        #[arg(long)]
        keep_going: bool,
    },
    /// Compare two dump files byte for byte
    Compare {
        reference: PathBuf,
        emulated: PathBuf,
    },
}

fn inspect(graph: &ModelGraph) {
    for (i, node) in graph.nodes().iter().enumerate() {
        println!("node {}: {}", i, OperatorKind::from_op(&node.op));
        let slots = node.inputs.iter().map(|&t| ("in", t)).chain(node.outputs.iter().map(|&t| ("out", t)));
        for (dir, t) in slots {
            match (t >= 0).then(|| graph.tensor(t as usize)).flatten() {
                Some(tensor) => {
                    print!("  {:<3} #{} {} {:?} {}", dir, t, tensor.name, tensor.dims, tensor.element_type);
                    if let Some(q) = &tensor.quantization {
                        print!(" scale={:?} zero_point={:?}", q.scale, q.zero_point);
                    }
                    println!();
                }
                None => println!("  {:<3} (absent)", dir),
            }
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match args.command {
        Command::Inspect { graph } => {
            let graph = ModelGraph::load(&graph).with_context(|| format!("load graph {}", graph.display()))?;
            inspect(&graph);
            Ok(ExitCode::SUCCESS)
        }
        Command::Emulate { graph, nodes, dump_dir, dump_inputs, keep_going } => {
            let model = ModelGraph::load(&graph).with_context(|| format!("load graph {}", graph.display()))?;
            if let Some(dir) = &dump_dir {
                std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
            }
            let config = EmulatorConfig {
                nodes: if nodes.is_empty() { None } else { Some(nodes) },
                dump_dir,
                dump_inputs,
                keep_going,
            };
            let summary = run(&model, &config).context("emulation aborted")?;
            let failed = summary.mismatched().count();
            info!("{} nodes emulated, {} mismatched", summary.reports.len(), failed);
            for report in summary.mismatched() {
                println!("node {} {}: {}", report.node, report.kind, report.comparison);
            }
            Ok(if summary.all_match() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Compare { reference, emulated } => {
            let a = read_bytes(&reference).with_context(|| format!("read {}", reference.display()))?;
            let b = read_bytes(&emulated).with_context(|| format!("read {}", emulated.display()))?;
            let comparison = compare_bytes(&a, &b);
            println!("{}", comparison);
            Ok(if comparison.is_exact() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}
