//! peernet Simulator CLI
//!
//! Runs a closed network of actors trading credits until interrupted, or
//! for a fixed number of steps per actor.

use clap::Parser;
use peernet_env::TransportKind;
use peernet_sim::{RunSummary, SimConfig, SimWorld};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// peernet credit-exchange simulator
#[derive(Parser, Debug)]
#[command(name = "peernet-sim")]
#[command(about = "Simulate a closed network of actors exchanging credits", long_about = None)]
struct Args {
    /// Number of actors in the network
    #[arg(short = 'p', long = "num_processes", default_value = "4")]
    num_processes: usize,

    /// Number of snapshots (reserved, currently unused)
    #[arg(short = 's', long = "num_snapshots", default_value = "5")]
    num_snapshots: usize,

    /// Master seed for every actor's generator
    #[arg(short = 'r', long, default_value = "100")]
    seed: u64,

    /// Pause before and after each balance report, in milliseconds
    #[arg(long, default_value = "1000")]
    pace_ms: u64,

    /// Stop each actor after this many steps (default: run until interrupted)
    #[arg(long)]
    steps: Option<u64>,

    /// Channel transport (duplex, unix)
    #[arg(long, default_value = "duplex")]
    transport: TransportKind,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write the final summary to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn log_summary(summary: &RunSummary) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for report in &summary.actors {
        info!(
            "actor {}: balance={} sent={} ({}) received={} ({}) errors={} failed_sends={}",
            report.id,
            report.balance,
            report.stats.sent_count,
            report.stats.sent_amount,
            report.stats.received_count,
            report.stats.received_amount,
            report.stats.protocol_errors + report.stats.read_errors,
            report.stats.send_failures,
        );
    }
    info!(
        "total={} in_flight={} (counted {}) expected={}",
        summary.total_balance(),
        summary.in_flight(),
        summary.counted_in_flight(),
        summary.expected_total()
    );

    if summary.is_conserved() {
        info!("✓ Money conserved");
    } else {
        error!("✗ Money NOT conserved");
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the verbosity flag
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let builder = FmtSubscriber::builder().with_env_filter(filter);
    // Keep stdout clean for the JSON summary
    let installed = if args.json {
        tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("Error: failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let config = SimConfig::default()
        .with_num_processes(args.num_processes)
        .with_num_snapshots(args.num_snapshots)
        .with_seed(args.seed)
        .with_pace(Duration::from_millis(args.pace_ms))
        .with_max_steps(args.steps)
        .with_transport(args.transport);

    let world = match SimWorld::new(config) {
        Ok(world) => world,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("peernet simulator v0.1.0");
    if args.steps.is_none() {
        info!("Running until interrupted (Ctrl-C)");
    }

    let outcome = tokio::select! {
        result = world.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let summary = match outcome {
        None => {
            warn!("Interrupted, stopping all actors");
            return;
        }
        Some(Err(e)) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
        Some(Ok(summary)) => summary,
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        log_summary(&summary);
    }

    if let Some(path) = &args.export {
        if let Err(e) = summary.write_to_file(path) {
            error!("Failed to write export: {:?}", e);
        } else {
            info!("Exported summary to {}", path);
        }
    }
}
