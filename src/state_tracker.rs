//! The state tracker: a pure function of the `Track`-flagged message
//! stream, replayed to new participants (§4.9).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::id::Id;
use crate::message::MessageType;
use crate::parameter::ParameterValue;

/// A hub known to the session.
#[derive(Debug, Clone)]
pub struct HubRecord {
    pub id: Id,
    pub address: String,
}

/// Mirrors a live module's tracked state; the authoritative copy of
/// parameter values lives on the module itself (§4.6), this is the
/// tracker's replica.
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub id: Id,
    pub hub: Id,
    pub name: String,
    pub started: bool,
    pub ports: Vec<String>,
    pub parameters: HashMap<String, ParameterValue>,
}

/// One canonical message in a replay sequence (§4.9). Carries only the
/// fields a new participant needs to reconstruct state, not the full
/// wire envelope.
#[derive(Debug, Clone)]
pub enum CanonicalMessage {
    AddHub { id: Id, address: String },
    ModuleAvailable { name: String },
    Spawn { id: Id, hub: Id, name: String },
    Started { id: Id, name: String },
    AddPort { module: Id, port: String },
    AddParameter { module: Id, name: String },
    SetParameter { module: Id, name: String, value: ParameterValue },
    SetParameterChoices { module: Id, name: String, choices: Vec<String> },
    Connect { from: (Id, String), to: (Id, String) },
    Barrier { id: u64 },
    ReplayFinished,
}

/// Observer callback invoked as the tracker mutates state; mirrors the
/// original `StateObserver` interface used to drive UI updates.
pub trait StateObserver: Send + Sync {
    fn on_event(&self, message: &CanonicalMessage);
}

struct Model {
    hubs: Vec<HubRecord>,
    available_modules: Vec<String>,
    modules: HashMap<Id, ModuleState>,
    connections: Vec<((Id, String), (Id, String))>,
    barrier_active: Option<u64>,
    pending_requests: HashMap<Uuid, oneshot::Sender<CanonicalMessage>>,
}

impl Model {
    fn new() -> Self {
        Self {
            hubs: Vec::new(),
            available_modules: Vec::new(),
            modules: HashMap::new(),
            connections: Vec::new(),
            barrier_active: None,
            pending_requests: HashMap::new(),
        }
    }
}

/// A single shared instance runs per hub and per cluster-manager rank
/// (§4.9); all mutation and all read-only observation is serialised by
/// one recursive mutex (§5).
pub struct StateTracker {
    model: ReentrantMutex<RefCell<Model>>,
}

impl StateTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { model: ReentrantMutex::new(RefCell::new(Model::new())) })
    }

    /// Feed one `Track`-flagged message into the model.
    pub fn apply(&self, msg: CanonicalMessage) {
        let guard = self.model.lock();
        let mut model = guard.borrow_mut();
        match &msg {
            CanonicalMessage::AddHub { id, address } => {
                model.hubs.push(HubRecord { id: *id, address: address.clone() });
            }
            CanonicalMessage::ModuleAvailable { name } => {
                model.available_modules.push(name.clone());
            }
            CanonicalMessage::Spawn { id, hub, name } => {
                model.modules.insert(
                    *id,
                    ModuleState {
                        id: *id,
                        hub: *hub,
                        name: name.clone(),
                        started: false,
                        ports: Vec::new(),
                        parameters: HashMap::new(),
                    },
                );
            }
            CanonicalMessage::Started { id, .. } => {
                if let Some(m) = model.modules.get_mut(id) {
                    m.started = true;
                }
            }
            CanonicalMessage::AddPort { module, port } => {
                if let Some(m) = model.modules.get_mut(module) {
                    m.ports.push(port.clone());
                }
            }
            CanonicalMessage::AddParameter { module, name } => {
                if let Some(m) = model.modules.get_mut(module) {
                    m.parameters.entry(name.clone()).or_insert(ParameterValue::Int(0));
                }
            }
            CanonicalMessage::SetParameter { module, name, value } => {
                if let Some(m) = model.modules.get_mut(module) {
                    m.parameters.insert(name.clone(), value.clone());
                }
            }
            CanonicalMessage::SetParameterChoices { .. } => {}
            CanonicalMessage::Connect { from, to } => {
                model.connections.push((from.clone(), to.clone()));
            }
            CanonicalMessage::Barrier { id } => {
                model.barrier_active = Some(*id);
            }
            CanonicalMessage::ReplayFinished => {}
        }
        drop(model);
    }

    /// The canonical sequence that reproduces current state for a new
    /// participant, terminated by `ReplayFinished` (§4.9).
    pub fn replay_sequence(&self) -> Vec<CanonicalMessage> {
        let guard = self.model.lock();
        let model = guard.borrow();
        let mut out = Vec::new();

        for hub in &model.hubs {
            out.push(CanonicalMessage::AddHub { id: hub.id, address: hub.address.clone() });
        }
        for name in &model.available_modules {
            out.push(CanonicalMessage::ModuleAvailable { name: name.clone() });
        }
        for m in model.modules.values() {
            out.push(CanonicalMessage::Spawn { id: m.id, hub: m.hub, name: m.name.clone() });
            if m.started {
                out.push(CanonicalMessage::Started { id: m.id, name: m.name.clone() });
            }
            for p in &m.ports {
                out.push(CanonicalMessage::AddPort { module: m.id, port: p.clone() });
            }
            for (name, value) in &m.parameters {
                out.push(CanonicalMessage::AddParameter { module: m.id, name: name.clone() });
                out.push(CanonicalMessage::SetParameter {
                    module: m.id,
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        for (from, to) in &model.connections {
            out.push(CanonicalMessage::Connect { from: from.clone(), to: to.clone() });
        }
        if let Some(id) = model.barrier_active {
            out.push(CanonicalMessage::Barrier { id });
        }
        out.push(CanonicalMessage::ReplayFinished);
        out
    }

    /// Register a pending synchronous UI round-trip keyed by `uuid`;
    /// the returned receiver resolves once [`Self::resolve_request`] is
    /// called with the matching id (§4.9).
    pub fn register_request(&self, uuid: Uuid) -> oneshot::Receiver<CanonicalMessage> {
        let (tx, rx) = oneshot::channel();
        let guard = self.model.lock();
        guard.borrow_mut().pending_requests.insert(uuid, tx);
        rx
    }

    pub fn resolve_request(&self, uuid: Uuid, reply: CanonicalMessage) {
        let guard = self.model.lock();
        if let Some(tx) = guard.borrow_mut().pending_requests.remove(&uuid) {
            let _ = tx.send(reply);
        }
    }

    pub fn module(&self, id: Id) -> Option<ModuleState> {
        let guard = self.model.lock();
        guard.borrow().modules.get(&id).cloned()
    }

    pub fn module_count(&self) -> usize {
        let guard = self.model.lock();
        guard.borrow().modules.len()
    }
}

/// True if a message type participates in the replay sequence, i.e. is
/// flagged `Track` by the router.
pub fn is_replayable(ty: MessageType) -> bool {
    ty.route_flags().contains(crate::message::RouteFlags::TRACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reproduces_hubs_and_modules_in_order() {
        let tracker = StateTracker::new();
        tracker.apply(CanonicalMessage::AddHub { id: -100, address: "localhost:31093".into() });
        tracker.apply(CanonicalMessage::Spawn { id: 1, hub: -100, name: "Reader".into() });
        tracker.apply(CanonicalMessage::Started { id: 1, name: "Reader".into() });
        tracker.apply(CanonicalMessage::AddPort { module: 1, port: "data_out".into() });

        let seq = tracker.replay_sequence();
        assert!(matches!(seq[0], CanonicalMessage::AddHub { .. }));
        assert!(matches!(seq.last().unwrap(), CanonicalMessage::ReplayFinished));
        assert!(seq.iter().any(|m| matches!(m, CanonicalMessage::Started { id: 1, .. })));
    }

    #[tokio::test]
    async fn a_registered_request_resolves_on_matching_reply() {
        let tracker = StateTracker::new();
        let uuid = Uuid::new_v4();
        let rx = tracker.register_request(uuid);
        tracker.resolve_request(uuid, CanonicalMessage::ReplayFinished);
        let reply = rx.await.unwrap();
        assert!(matches!(reply, CanonicalMessage::ReplayFinished));
    }

    #[test]
    fn add_hub_is_trackable() {
        assert!(is_replayable(MessageType::AddHub));
        assert!(!is_replayable(MessageType::Ping));
    }
}
