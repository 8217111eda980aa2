//! aton-listen: entry point.
//!
//! ```text
//! aton-listen                    Listen on the configured port (default 9201)
//! aton-listen --port <port>      Override the port from the config file
//! aton-listen --json             Print status snapshots as JSON lines
//! aton-listen --config <path>    Load a custom config TOML
//! aton-listen --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use aton_core::EngineHandle;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aton_listen::config::ListenConfig;
use aton_listen::status::{StatusObserver, render_line};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "aton-listen", about = "Headless receiver for Aton render buckets")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "aton-listen.toml")]
    config: PathBuf,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print status snapshots as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ListenConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ListenConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("aton-listen v{}", env!("CARGO_PKG_VERSION"));

    let observer = Arc::new(StatusObserver::new());
    let engine = Arc::new(EngineHandle::with_bind_ip(
        observer.clone(),
        config.network.bind_address,
    ));
    engine.start(config.network.port).await?;

    // Status printer: at most one line per interval.
    let interval = config.status_interval();
    let printer = {
        let engine = Arc::clone(&engine);
        let json = cli.json;
        tokio::spawn(async move {
            loop {
                observer.changed().await;
                match render_line(&engine.stats(), json) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("cannot format status: {e}"),
                }
                tokio::time::sleep(interval).await;
            }
        })
    };

    // Ends on Ctrl-C, or when a renderer sends Shutdown.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down"),
        _ = async {
            while engine.is_running().await {
                tokio::time::sleep(interval).await;
            }
        } => info!("listener stopped by renderer"),
    }

    engine.stop().await;
    printer.abort();
    Ok(())
}
