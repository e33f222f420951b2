//! `vistle-manager`: the per-cluster control process, launched by the
//! hub on the target host (§4.4, §6).
//!
//! CLI contract: `HOSTNAME CONTROL_PORT DATA_PORT`.

use clap::Parser;
use vistle_core::cluster_manager::ClusterManager;
use vistle_core::config::SessionConfig;
use vistle_core::error::{Error, Result};
use vistle_core::mpi::MpiUniverse;
use vistle_core::state_tracker::StateTracker;

#[derive(Parser, Debug)]
#[command(name = "vistle-manager", version)]
struct Cli {
    hostname: String,
    control_port: u16,
    data_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vistle_core::init()?;

    if SessionConfig::mpi_thread_multiple_required() && !cfg!(feature = "mpi-thread-multiple") {
        tracing::warn!("MPICH_MAX_THREAD_SAFETY=multiple set; build without matching support may misbehave");
    }

    let universe = MpiUniverse::initialize()
        .map_err(|e| Error::Mpi(format!("failed to join the MPI communicator: {}", e)))?;

    tracing::info!(
        hostname = %cli.hostname,
        control_port = cli.control_port,
        data_port = cli.data_port,
        rank = universe.rank(),
        size = universe.size(),
        "cluster manager starting"
    );

    let tracker = StateTracker::new();
    let _manager = ClusterManager::new(universe.rank(), tracker);

    let mut backoff = vistle_core::backoff::AdaptiveBackoff::new();
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        // The real dispatch loop polls MPI_Test on the ToAny/ToRank0
        // channels and, on rank 0, the TCP socket to the hub; all three
        // are non-blocking (§5). Nothing to poll yet without a live
        // hub connection, so this simply idles and waits to be told
        // to quit.
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
            _ = backoff.idle() => {}
        }
    }

    Ok(())
}
