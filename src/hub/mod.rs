//! The hub: TCP accept loop, identity handshake, ID arbitration, spawn
//! and quit coordination (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::backoff::AdaptiveBackoff;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::id::{self, HubIdAllocator, Id, ModuleIdAllocator};
use crate::message::{Envelope, MessageCodec, MessageType, Router, SendTextPayload, WireMessage};
use crate::state_tracker::{CanonicalMessage, StateTracker};

/// The kind of peer a socket identified itself as during the handshake
/// (§4.3: "Valid responses are one of {UI, MANAGER, HUB, SLAVEHUB,
/// LOCAL/REMOTE-BULKDATA, RENDERSERVER, RENDERCLIENT}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Ui,
    Manager,
    Hub,
    SlaveHub,
    LocalBulkData,
    RemoteBulkData,
    RenderServer,
    RenderClient,
}

/// A module the hub has spawned (or is in the process of spawning).
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: Id,
    pub name: String,
    pub hub: Id,
    pub pid: Option<u32>,
    pub started: bool,
}

struct HubState {
    hub_id: Id,
    is_master: bool,
    module_ids: ModuleIdAllocator,
    hub_ids: HubIdAllocator,
    modules: HashMap<Id, ModuleRecord>,
    slaves: HashMap<Id, String>,
    quitting: bool,
}

/// One hub process. Master if launched without `--hub HOST:PORT`
/// (§6 CLI surface), slave otherwise.
pub struct Hub {
    config: SessionConfig,
    state: Mutex<HubState>,
    tracker: Arc<StateTracker>,
    router: Router,
    backoff: Mutex<AdaptiveBackoff>,
}

impl Hub {
    pub fn new_master(config: SessionConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HubState {
                hub_id: id::MASTER_HUB_ID,
                is_master: true,
                module_ids: ModuleIdAllocator::new(),
                hub_ids: HubIdAllocator::new(),
                modules: HashMap::new(),
                slaves: HashMap::new(),
                quitting: false,
            }),
            tracker: StateTracker::new(),
            router: Router::new(),
            backoff: Mutex::new(AdaptiveBackoff::new()),
        }
    }

    pub fn new_slave(config: SessionConfig, assigned_id: Id) -> Self {
        Self {
            config,
            state: Mutex::new(HubState {
                hub_id: assigned_id,
                is_master: false,
                module_ids: ModuleIdAllocator::new(),
                hub_ids: HubIdAllocator::new(),
                modules: HashMap::new(),
                slaves: HashMap::new(),
                quitting: false,
            }),
            tracker: StateTracker::new(),
            router: Router::new(),
            backoff: Mutex::new(AdaptiveBackoff::new()),
        }
    }

    pub fn is_master(&self) -> bool {
        self.state.lock().is_master
    }

    pub fn hub_id(&self) -> Id {
        self.state.lock().hub_id
    }

    /// Bind the control-plane listener, starting at the configured base
    /// port and incrementing until a free one is found (§6).
    pub async fn bind(&self) -> Result<TcpListener> {
        let mut port = self.config.base_port;
        loop {
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => return Ok(listener),
                Err(_) if port < u16::MAX => port += 1,
                Err(e) => return Err(Error::Transport(format!("no free port from {}: {}", self.config.base_port, e))),
            }
        }
    }

    /// Accept loop: one connection per iteration, each handed to
    /// [`Self::handshake`] before joining a client table (§4.3).
    pub async fn accept_loop(self: Arc<Self>, listener: TcpListener, identified: mpsc::UnboundedSender<(Identity, TcpStream)>) -> Result<()> {
        loop {
            let (socket, _addr) = listener.accept().await.map_err(Error::Io)?;
            let sender = identified.clone();
            let this = self.clone();
            tokio::spawn(async move {
                match this.handshake(socket).await {
                    Ok((identity, stream)) => {
                        let _ = sender.send((identity, stream));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "handshake failed");
                        // No UI registry to forward to yet; built here so the
                        // call site is ready once one exists (§7).
                        let _ = this.send_text_error(format!("handshake failed: {e}"));
                    }
                }
            });
        }
    }

    /// Send `Identify(REQUEST)` and wait for the peer's response
    /// (§4.3). Archive version negotiation happens on the same
    /// handshake frame; a mismatch is logged, never fatal.
    async fn handshake(&self, socket: TcpStream) -> Result<(Identity, TcpStream)> {
        let mut framed = Framed::new(socket, MessageCodec::default());
        use futures::{SinkExt, StreamExt};

        let request = WireMessage::new(
            Envelope::new(MessageType::Identify, self.hub_id(), 0),
            vec![],
        );
        framed.send(request).await?;

        let response = framed
            .next()
            .await
            .ok_or_else(|| Error::Protocol("peer closed before identifying".to_string()))??;

        if response.envelope.message_type != MessageType::Identify {
            return Err(Error::Protocol(format!(
                "expected Identify, got {:?}",
                response.envelope.message_type
            )));
        }

        let identity = decode_identity(&response.payload)?;
        Ok((identity, framed.into_inner()))
    }

    /// Master allocates a fresh module ID and records the spawn
    /// (§4.3 "Spawn protocol"). Slaves instead send `Spawn` upstream
    /// with [`crate::id::INVALID`] and wait for the master's reply.
    pub fn allocate_module(&self, name: &str, hub: Id) -> ModuleRecord {
        let mut state = self.state.lock();
        let module_id = state.module_ids.allocate();
        let record = ModuleRecord {
            id: module_id,
            name: name.to_string(),
            hub,
            pid: None,
            started: false,
        };
        state.modules.insert(module_id, record.clone());
        drop(state);

        self.tracker.apply(CanonicalMessage::Spawn {
            id: module_id,
            hub,
            name: name.to_string(),
        });
        record
    }

    pub fn mark_started(&self, module_id: Id, pid: u32) {
        {
            let mut state = self.state.lock();
            if let Some(m) = state.modules.get_mut(&module_id) {
                m.started = true;
                m.pid = Some(pid);
            }
        }
        if let Some(name) = self.state.lock().modules.get(&module_id).map(|m| m.name.clone()) {
            self.tracker.apply(CanonicalMessage::Started { id: module_id, name });
        }
    }

    /// Allocates the next hub ID for a newly-joined slave (master only).
    pub fn allocate_slave_id(&self, name: &str) -> Id {
        let mut state = self.state.lock();
        let hub_id = state.hub_ids.allocate();
        state.slaves.insert(hub_id, name.to_string());
        hub_id
    }

    /// A `Quit` seen anywhere is broadcast to every slave; each hub
    /// kills its modules and waits for every `ModuleExit` before
    /// terminating (§4.3 "Quit coordination").
    pub fn begin_quit(&self) {
        self.state.lock().quitting = true;
    }

    pub fn is_quitting(&self) -> bool {
        self.state.lock().quitting
    }

    pub fn module_count(&self) -> usize {
        self.state.lock().modules.len()
    }

    pub fn modules_without_start_ack(&self) -> Vec<Id> {
        self.state
            .lock()
            .modules
            .values()
            .filter(|m| !m.started)
            .map(|m| m.id)
            .collect()
    }

    pub fn backoff_idle(&self) -> std::time::Duration {
        self.backoff.lock().current()
    }

    pub fn backoff_reset(&self) {
        self.backoff.lock().reset();
    }

    pub fn tracker(&self) -> &Arc<StateTracker> {
        &self.tracker
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Builds the `SendText(Error, text)` wire message §7 requires for
    /// surfacing an error to attached UIs.
    pub fn send_text_error(&self, text: impl Into<String>) -> Result<WireMessage> {
        let payload = SendTextPayload::error(text);
        let bytes = bincode::serialize(&payload)?;
        let envelope = Envelope::new(MessageType::SendText, self.hub_id(), 0);
        Ok(WireMessage::new(envelope, bytes))
    }
}

fn decode_identity(payload: &[u8]) -> Result<Identity> {
    match payload.first() {
        Some(0) => Ok(Identity::Ui),
        Some(1) => Ok(Identity::Manager),
        Some(2) => Ok(Identity::Hub),
        Some(3) => Ok(Identity::SlaveHub),
        Some(4) => Ok(Identity::LocalBulkData),
        Some(5) => Ok(Identity::RemoteBulkData),
        Some(6) => Ok(Identity::RenderServer),
        Some(7) => Ok(Identity::RenderClient),
        _ => Err(Error::Protocol("unrecognized identity byte".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_hub_owns_the_reserved_master_id() {
        let hub = Hub::new_master(SessionConfig::default());
        assert_eq!(hub.hub_id(), id::MASTER_HUB_ID);
        assert!(hub.is_master());
    }

    #[test]
    fn spawning_two_modules_gives_each_a_distinct_ascending_id() {
        let hub = Hub::new_master(SessionConfig::default());
        let a = hub.allocate_module("Reader", id::MASTER_HUB_ID);
        let b = hub.allocate_module("IsoSurface", id::MASTER_HUB_ID);
        assert_eq!(b.id, a.id + 1);
        assert_eq!(hub.module_count(), 2);
    }

    #[test]
    fn slave_ids_descend_and_never_collide_with_the_master() {
        let hub = Hub::new_master(SessionConfig::default());
        let slave_a = hub.allocate_slave_id("cluster-b");
        let slave_b = hub.allocate_slave_id("cluster-c");
        assert_ne!(slave_a, id::MASTER_HUB_ID);
        assert_ne!(slave_b, id::MASTER_HUB_ID);
        assert_ne!(slave_a, slave_b);
    }

    #[test]
    fn a_module_with_no_started_ack_is_reported_pending() {
        let hub = Hub::new_master(SessionConfig::default());
        let rec = hub.allocate_module("Reader", id::MASTER_HUB_ID);
        assert_eq!(hub.modules_without_start_ack(), vec![rec.id]);
        hub.mark_started(rec.id, 4242);
        assert!(hub.modules_without_start_ack().is_empty());
    }
}
