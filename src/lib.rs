//! Vistle's distributed execution core: hub federation, cluster
//! management, the shared-memory object store, and the message fabric
//! that ties them together.

pub mod backoff;
pub mod cluster_manager;
pub mod config;
pub mod dataproxy;
pub mod error;
pub mod glue;
pub mod hub;
pub mod id;
pub mod message;
pub mod mpi;
pub mod object;
pub mod parameter;
pub mod port;
pub mod scheduler;
pub mod shm;
pub mod state_tracker;
pub mod util;

pub use error::{Error, Result};

/// Install the tracing subscriber and announce the build.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting vistle");
    Ok(())
}
