//! LightSwarm Node
//!
//! Coordinator for a swarm of photocell devices: the most recent reporter
//! is master, its indicator blinks at a rate set by its reading, every
//! reading is logged, and the button toggles reset/activate.

use clap::Parser;
use lightswarm_core::{
    ControlInput, Coordinator, CoordinatorConfig, ElectionPolicy, IndicatorDriver, SwarmError,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// LightSwarm coordinator node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on and broadcast to
    #[arg(short, long, default_value = "2910")]
    port: u16,

    /// Broadcast address for RESET / ACTIVATE
    #[arg(short, long, default_value = "192.168.1.255")]
    broadcast: IpAddr,

    /// Directory for session log files
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Keep a new master for at least this many milliseconds
    #[arg(long)]
    min_hold_ms: Option<u64>,

    /// Buffer session log writes instead of flushing every line
    #[arg(long)]
    buffered_log: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

type Board = (Arc<dyn IndicatorDriver>, Arc<dyn ControlInput>);

#[cfg(feature = "hardware")]
fn hardware(config: &CoordinatorConfig) -> Result<Board, SwarmError> {
    let hal = Arc::new(lightswarm_core::GpioHal::new(&config.pins)?);
    let indicators: Arc<dyn IndicatorDriver> = hal.clone();
    let input: Arc<dyn ControlInput> = hal;
    Ok((indicators, input))
}

#[cfg(not(feature = "hardware"))]
fn hardware(config: &CoordinatorConfig) -> Result<Board, SwarmError> {
    warn!("Built without the hardware feature, indicators are simulated");
    let hal = Arc::new(lightswarm_core::MockHal::new(config.slot_count));
    let indicators: Arc<dyn IndicatorDriver> = hal.clone();
    let input: Arc<dyn ControlInput> = hal;
    Ok((indicators, input))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = CoordinatorConfig::default()
        .with_port(args.port)
        .with_log_dir(args.log_dir);
    config.broadcast_ip = args.broadcast;
    config.flush_each_line = !args.buffered_log;
    if let Some(ms) = args.min_hold_ms {
        config.election = ElectionPolicy::MinimumHold(Duration::from_millis(ms));
    }

    info!("LightSwarm node starting on port {}", config.port);
    info!("Broadcasting control to {}", config.broadcast_addr());

    let (indicators, input) = hardware(&config)?;
    let coordinator = Coordinator::start(config, indicators, input).await?;
    if let Some(path) = coordinator.logger().current_path() {
        info!("Logging to {:?}", path);
    }

    tokio::select! {
        _ = coordinator.run() => {
            warn!("All tasks exited");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Interrupted, shutting down"),
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    }

    coordinator.stop().await;
    Ok(())
}
