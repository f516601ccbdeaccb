//! # relay-runner
//!
//! Main entry point for the market-data relay.
//!
//! Loads a JSON configuration file, creates a reader or writer for each
//! configured actor, and relays source data to every sink on a fixed
//! interval until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! relay-runner config.json --log-level info
//! relay-runner config.json --once
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use relay_actors::pipeline::Relay;
use relay_actors::registry::{Backends, create_actors};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Crypto market-data relay.
#[derive(Parser)]
#[command(name = "relay-runner", about = "Crypto market-data relay")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `relay.log_path`.
    #[arg(long)]
    log_dir: Option<String>,

    /// Run a single relay tick and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (the log directory may come from it)
    let config = relay_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.clone().or_else(|| config.relay.log_path.clone());
    relay_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.relay.module_name);

    info!(
        "relay-runner starting, config={}, log_level={}, {} actor(s)",
        cli.config.display(),
        cli.log_level,
        config.actors.len()
    );

    // 3. Create and initialize actors over in-process backends
    let actors = create_actors(&config, &Backends::in_memory());
    if actors.is_empty() {
        warn!("no actors configured, nothing to relay");
        return Ok(());
    }
    let ready = actors.initialize_all().await;
    if ready < actors.len() {
        error!("{} of {} actor(s) failed to initialize", actors.len() - ready, actors.len());
    }

    let relay = Relay::new(config.relay.clone(), actors);

    // 4. Relay until Ctrl+C
    if cli.once {
        relay.tick().await;
    } else {
        let mut interval = tokio::time::interval(Duration::from_secs(config.relay.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("relaying every {}s, press Ctrl+C to stop", config.relay.interval_secs);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    relay.tick().await;
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        error!("failed to listen for Ctrl+C: {e}");
                    }
                    info!("shutdown signal received");
                    break;
                }
            }
        }
    }

    // 5. Report status, then clean up (cleanup resets the counters)
    for status in relay.actors().statuses() {
        match serde_json::to_string(&status) {
            Ok(json) => info!("status {json}"),
            Err(e) => warn!("[{}] status not serializable: {e}", status.name),
        }
    }
    relay.actors().cleanup_all().await;

    info!("all actors cleaned up, goodbye");
    Ok(())
}
