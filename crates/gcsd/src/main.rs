use anyhow::{Context, Result};
use clap::Parser;
use groundstation_core::{GcsConfig, GroundControl};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Standalone runner: brings up the Heartbeat Monitor and an initial
/// Discovery pass, then idles. The HTTP/JSON facade that drives
/// mission upload/start/stop is a separate caller, not part of this binary.
#[derive(Debug, Parser)]
#[command(name = "gcsd", version, about = "MAVLink ground control session manager")]
struct Cli {
    /// Path to a TOML file overriding GcsConfig defaults.
    #[arg(long)]
    config: Option<String>,

    /// Re-run Discovery on this interval, in addition to the initial pass.
    #[arg(long)]
    rediscover_secs: Option<u64>,
}

fn load_config(path: Option<&str>) -> Result<GcsConfig> {
    let Some(path) = path else {
        return Ok(GcsConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {path}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let gcs = GroundControl::new(config);
    gcs.start_background_tasks();

    let discovered = gcs.discover(None);
    info!(count = discovered.len(), "initial discovery pass complete");

    if let Some(interval) = cli.rediscover_secs {
        loop {
            thread::sleep(Duration::from_secs(interval));
            let discovered = gcs.discover(None);
            if !discovered.is_empty() {
                info!(count = discovered.len(), "rediscovery pass found new uavs");
            }
        }
    }

    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}
