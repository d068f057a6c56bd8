//! Knob GW - Rust implementation
//!
//! Gateway carrying web knob CC values to a local MIDI output over WebSocket.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use knob_gw::{bridge, cli, midi, server, AppConfig};

/// Knob Gateway - web knobs to local MIDI over WebSocket
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI output ports
    #[arg(long)]
    list_ports: bool,

    /// Run the MIDI bridge instead of the hub
    #[arg(long)]
    bridge: bool,

    /// Run the interactive knob surface instead of the hub
    #[arg(long)]
    repl: bool,

    /// Emit a single test frame to the hub and exit (format: cc=value)
    #[arg(long, value_name = "CC=VALUE")]
    emit: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    // Handle list ports
    if args.list_ports {
        midi::list_ports_formatted();
        return Ok(());
    }

    info!("Starting Knob GW...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;

    // Handle one-shot test emission
    if let Some(spec) = &args.emit {
        let (cc, value) = cli::parse_change(spec)?;
        return cli::emit_once(&config, cc, value).await;
    }

    if args.repl {
        cli::run_repl(config).await?;
    } else if args.bridge {
        bridge::run(config, shutdown_signal()).await?;
    } else {
        server::run(config, shutdown_signal()).await?;
    }

    info!("Knob GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
