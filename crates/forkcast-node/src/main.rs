//! Forkcast Node - proof-of-stake consensus simulator.
//!
//! This binary ties the other crates together: it builds a genesis, spawns a
//! fleet of validator nodes on the simulated network, runs them for a number
//! of slots, and reports whether the fleet converged on a single chain.

pub mod config;
pub mod node;
pub mod sim;
pub mod telemetry;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "forkcast-node")]
#[command(about = "FORKCAST - watch a validator fleet find its chain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of validator nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Number of slots to simulate
    #[arg(short, long)]
    slots: Option<u64>,

    /// Seconds per slot
    #[arg(long)]
    seconds_per_slot: Option<u64>,

    /// Slots per epoch
    #[arg(long)]
    slots_per_epoch: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init_telemetry(&args.log_level, args.json)?;

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {:?}", config_path);
        config::SimConfig::from_file(config_path)?
    } else {
        info!("Using default configuration");
        config::SimConfig::default()
    };

    // CLI overrides.
    if let Some(nodes) = args.nodes {
        config.chain.node_count = nodes;
        let floor = nodes + 2;
        if config.chain.max_block_transactions < floor {
            config.chain.max_block_transactions = floor;
        }
    }
    if let Some(slots) = args.slots {
        config.slots = slots;
    }
    if let Some(seconds_per_slot) = args.seconds_per_slot {
        config.chain.seconds_per_slot = seconds_per_slot;
    }
    if let Some(slots_per_epoch) = args.slots_per_epoch {
        config.chain.slots_per_epoch = slots_per_epoch;
    }
    config.validate()?;

    info!(
        name = %config.name,
        nodes = config.chain.node_count,
        slots = config.slots,
        "starting simulation"
    );

    let report = sim::run(&config).await?;

    println!();
    println!("=== simulation report ===");
    for (address, summary) in &report.summaries {
        println!(
            "node {}  head {}  height {}  justified epoch {}  finalized epoch {}  blocks {}  forks {}  invalid {}",
            address.short(),
            summary.head.short(),
            summary.height,
            summary.justified.epoch,
            summary.finalized.epoch,
            summary.total_blocks,
            summary.forks,
            summary.invalid_blocks,
        );
    }
    println!(
        "converged: {}  max finalized epoch: {}",
        if report.converged() { "yes" } else { "NO" },
        report.max_finalized_epoch(),
    );

    Ok(())
}
