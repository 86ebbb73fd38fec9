//! Distance-vector routing simulator.
//!
//! Starts one actor per node of the configured topology and hands control to
//! a line console on stdin. Logs go to stderr so console output stays clean.

use clap::Parser;
use dv_node::Simulation;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod logging;

use config::SimConfig;
use console::Console;
use logging::SimLogFormatter;

/// Distance-vector routing simulator
#[derive(Parser, Debug)]
#[command(name = "dvsim", version, about = "Distance-vector routing simulator")]
struct Args {
    /// Topology file (YAML). The built-in 4-node network is used when omitted.
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Unconditional broadcast period, e.g. 1s or 250ms
    #[arg(long)]
    broadcast_interval: Option<humantime::Duration>,

    /// Capacity of each node's inbox
    #[arg(long)]
    inbox_capacity: Option<usize>,

    /// How long to wait for each node on shutdown before aborting it
    #[arg(long, default_value = "2s")]
    shutdown_grace: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("dvsim={}", args.log_level).parse()?)
        .add_directive(format!("dv_node={}", args.log_level).parse()?)
        .add_directive(format!("dv_routing={}", args.log_level).parse()?)
        .add_directive(format!("dv_topology={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(SimLogFormatter::new("dvsim".to_string()))
        .init();

    info!("Starting dvsim v{}", env!("CARGO_PKG_VERSION"));

    let mut sim_config = SimConfig::load(args.topology.as_deref())?;
    if let Some(interval) = args.broadcast_interval {
        sim_config.broadcast_interval = interval.into();
    }
    if let Some(capacity) = args.inbox_capacity {
        sim_config.inbox_capacity = capacity;
    }

    let shutdown_grace: Duration = args.shutdown_grace.into();
    let node_config = sim_config.node_config(shutdown_grace);
    let mut sim = Simulation::start(sim_config.topology, node_config)?;

    println!("{}", console::HELP);

    let mut console = Console::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    tokio::select! {
        result = console.run(&mut sim) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }

    // No-op when the console already stopped the simulation
    sim.shutdown().await;
    info!("dvsim stopped");

    Ok(())
}
