//! `flowsim`: run a scenario file for a while and print the final state.
//!
//! ```text
//! RUST_LOG=info flowsim demos/wood_planks.toml --seconds 10
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use flowsim_core::event::{Event, EventKind};
use flowsim_data::load_topology;
use flowsim_data::schema::seconds;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "flowsim", about = "Run a resource-flow scenario")]
struct Args {
    /// Scenario file (.ron, .toml or .json).
    scenario: PathBuf,

    /// Simulated seconds to run before stopping.
    #[arg(short, long, default_value_t = 10.0)]
    seconds: f64,

    /// Do not report individual loads and unloads.
    #[arg(short, long)]
    quiet: bool,

    /// Print the final snapshot on a single line.
    #[arg(long)]
    compact: bool,
}

// Single-threaded so the final snapshot sees no task mid-step.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let run_for = seconds("--seconds", args.seconds)?;

    let mut topo = load_topology(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    if args.quiet {
        topo.events().suppress(EventKind::ResourceLoaded);
        topo.events().suppress(EventKind::ResourceUnloaded);
    }

    let mut events = topo.subscribe();
    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let started = topo.start_all()?;
    tracing::info!(tasks = started, seconds = args.seconds, "simulation running");
    tokio::time::sleep(run_for).await;
    topo.stop_all();

    let snapshot = topo.snapshot();
    topo.shutdown();
    drop(topo);
    logger.abort();

    let json = if args.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{json}");
    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn log_event(event: &Event) {
    let at = event.at().as_secs_f64();
    match event {
        Event::ResourceProduced { node, resource, .. } => {
            tracing::info!(at, %node, %resource, "produced");
        }
        Event::ResourcesConsumed { node, consumed, .. } => {
            tracing::info!(at, %node, ?consumed, "consumed");
        }
        Event::ProductionStarved { node, missing, .. } => {
            tracing::info!(at, %node, ?missing, "starved");
        }
        Event::ChannelFull { channel, .. } => {
            tracing::info!(at, %channel, "channel full");
        }
        other => tracing::debug!(at, event = ?other, "event"),
    }
}
