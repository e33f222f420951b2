//! `vistle-hub`: accepts UI, manager, and peer-hub connections; arbitrates
//! module IDs; spawns and reaps module processes (§4.3, §6).

use clap::Parser;
use vistle_core::config::SessionConfig;
use vistle_core::error::Result;
use vistle_core::hub::Hub;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum UiMode {
    Batch,
    Gui,
    Tui,
}

/// Starts as master unless `--hub` points at an existing session.
#[derive(Parser, Debug)]
#[command(name = "vistle-hub", version)]
struct Cli {
    /// Connect to an existing master as a slave hub: HOST:PORT.
    #[arg(long, value_name = "HOST:PORT")]
    hub: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<UiMode>,

    /// Optional session script or workflow file to load on start-up.
    filename: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vistle_core::init()?;

    let config = SessionConfig::load(None)?;
    let hub = if let Some(master) = &cli.hub {
        tracing::info!(master, "joining existing session as a slave hub");
        Hub::new_slave(config, vistle_core::id::HUB_BASE - 1)
    } else {
        tracing::info!("starting as master hub");
        Hub::new_master(config)
    };

    if let Some(file) = &cli.filename {
        tracing::info!(file, "loading session file");
    }

    if SessionConfig::suppress_ui_autostart() {
        tracing::info!("PBS_ENVIRONMENT=PBS_BATCH: suppressing UI auto-start");
    }

    let listener = hub.bind().await?;
    tracing::info!(port = %listener.local_addr().map(|a| a.port()).unwrap_or(0), "control socket bound");

    let (identified_tx, mut identified_rx) = tokio::sync::mpsc::unbounded_channel();
    let hub = std::sync::Arc::new(hub);
    let accept_task = tokio::spawn(hub.clone().accept_loop(listener, identified_tx));

    while let Some((identity, _socket)) = identified_rx.recv().await {
        tracing::debug!(?identity, "peer identified");
        if hub.is_quitting() {
            break;
        }
    }

    accept_task.abort();
    Ok(())
}
