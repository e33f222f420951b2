//! `vistle-module`: launched by the cluster manager for one spawned
//! module instance (§4.3, §6).
//!
//! CLI contract: `SHMSEGMENT MODULE_ID`, with an optional leading
//! `-from-vistle` sentinel passed by the launcher.

use clap::Parser;
use vistle_core::error::{Error, Result};
use vistle_core::id::Id;
use vistle_core::message::MessageType;
use vistle_core::shm::{ModuleQueues, SharedStore};

#[derive(Parser, Debug)]
#[command(name = "vistle-module", version)]
struct Cli {
    /// Present when launched by the cluster manager rather than by hand.
    #[arg(long = "from-vistle")]
    from_vistle: bool,

    shm_segment: String,
    module_id: Id,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vistle_core::init()?;

    if !cli.from_vistle {
        tracing::warn!("module launched outside of a running session; shared-memory attach may fail");
    }

    let store = SharedStore::attach(&cli.shm_segment)
        .map_err(|e| Error::SharedMemory(format!("module {} attach failed: {}", cli.module_id, e)))?;

    tracing::info!(
        module_id = cli.module_id,
        segment = store.segment_name(),
        "module attached to shared memory"
    );

    let recv = ModuleQueues::create(cli.module_id, 0).recv;
    let mut backoff = vistle_core::backoff::AdaptiveBackoff::new();
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());

    loop {
        if let Some(msg) = recv.try_receive() {
            tracing::debug!(?msg.envelope.message_type, "received control message");
            backoff.reset();
            if msg.envelope.message_type == MessageType::Quit {
                break;
            }
            continue;
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = backoff.idle() => {}
        }
    }

    Ok(())
}
