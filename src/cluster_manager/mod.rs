//! The cluster manager: runs on every rank, dispatches the router's
//! decisions, and owns `AddObject` delivery across the port graph
//! (§4.4).

pub mod module_record;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::id::Id;
use crate::message::{Envelope, MessageType, Router, WireMessage};
use crate::object::ObjectName;
use crate::scheduler::RankTracker;
use crate::state_tracker::StateTracker;
use module_record::ModuleRecord;

/// A remote `AddObject` forward awaiting its `AddObjectCompleted` ACK
/// (§4.4: "dropping it leaks references").
struct InTransit {
    dest_hub: Id,
    #[allow(dead_code)]
    object: ObjectName,
}

/// What the cluster manager decided to do with one `AddObject`
/// (§4.4 steps 1-4), surfaced for the caller to actually perform I/O.
#[derive(Debug, Clone)]
pub enum AddObjectAction {
    /// Deliver locally; the port manager has already recorded arrival.
    DeliverLocal { module: Id, port: String },
    /// Forward once to a remote hub not yet notified for this object.
    ForwardToHub { hub: Id },
    /// Already forwarded to this hub for this object; nothing to do.
    AlreadyInTransit,
    /// Object isn't resident; block the destination and request it.
    RequestObject { module: Id, port: String },
}

pub struct ClusterManager {
    rank: i32,
    is_rank0: bool,
    router: Router,
    tracker: Arc<StateTracker>,
    modules: Mutex<HashMap<Id, ModuleRecord>>,
    /// keyed by (object, dest_hub) — dedup per §4.4 step 2.
    in_transit: Mutex<HashMap<(ObjectName, Id), InTransit>>,
    rank_tracker: Mutex<RankTracker>,
    barrier_reached: Mutex<HashSet<i32>>,
}

impl ClusterManager {
    pub fn new(rank: i32, tracker: Arc<StateTracker>) -> Self {
        Self {
            rank,
            is_rank0: rank == 0,
            router: Router::new(),
            tracker,
            modules: Mutex::new(HashMap::new()),
            in_transit: Mutex::new(HashMap::new()),
            rank_tracker: Mutex::new(RankTracker::new()),
            barrier_reached: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_rank0(&self) -> bool {
        self.is_rank0
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Creates a module's shared-memory queues at spawn time (§4.3:
    /// "the manager creates the module's shared-memory queues").
    pub fn prepare_module(&self, module: Id) {
        self.modules.lock().insert(module, ModuleRecord::new(module, self.rank));
    }

    pub fn remove_module(&self, module: Id) {
        self.modules.lock().remove(&module);
    }

    /// §4.4 `AddObject` delivery: expand `(sender, sender_port)`'s
    /// connections and decide an action per destination.
    pub fn plan_add_object(
        &self,
        sender: Id,
        sender_port: &str,
        object: &ObjectName,
        resident: bool,
        destinations: &[(Id, String, /* on remote hub */ Option<Id>)],
    ) -> Vec<AddObjectAction> {
        let mut actions = Vec::new();
        let mut in_transit = self.in_transit.lock();

        for (module, port, remote_hub) in destinations {
            if let Some(hub) = remote_hub {
                let key = (object.clone(), *hub);
                if in_transit.contains_key(&key) {
                    actions.push(AddObjectAction::AlreadyInTransit);
                } else {
                    in_transit.insert(key, InTransit { dest_hub: *hub, object: object.clone() });
                    actions.push(AddObjectAction::ForwardToHub { hub: *hub });
                }
                continue;
            }

            if resident {
                actions.push(AddObjectAction::DeliverLocal {
                    module: *module,
                    port: port.clone(),
                });
            } else {
                if let Some(rec) = self.modules.lock().get_mut(module) {
                    rec.blocked = true;
                }
                actions.push(AddObjectAction::RequestObject {
                    module: *module,
                    port: port.clone(),
                });
            }
        }

        let _ = sender;
        let _ = sender_port;
        actions
    }

    /// The producing hub received `AddObjectCompleted`: release the
    /// held "in transit" reference (§4.4).
    pub fn complete_add_object(&self, object: &ObjectName, dest_hub: Id) {
        self.in_transit.lock().remove(&(object.clone(), dest_hub));
    }

    pub fn in_transit_count(&self) -> usize {
        self.in_transit.lock().len()
    }

    /// Whether a message must be re-broadcast after arriving on rank 0
    /// from a slave rank (§4.4 step 2).
    pub fn should_rebroadcast(&self, ty: MessageType, broadcast_flag: bool) -> bool {
        broadcast_flag || self.router.to_module(ty)
    }

    pub fn begin_execution(&self, module: Id, total_ranks: u32) {
        self.rank_tracker.lock().begin(module, total_ranks);
    }

    pub fn rank_finished(&self, module: Id) -> bool {
        self.rank_tracker.lock().rank_finished(module)
    }

    /// Rank 0 tallies `BarrierReached` until every rank has checked in.
    pub fn barrier_reached(&self, rank: i32, total_ranks: i32) -> bool {
        let mut reached = self.barrier_reached.lock();
        reached.insert(rank);
        reached.len() as i32 >= total_ranks
    }

    pub fn clear_barrier(&self) {
        self.barrier_reached.lock().clear();
    }

    pub fn envelope_for(&self, ty: MessageType, source: Id) -> Envelope {
        Envelope::new(ty, source, self.rank)
    }

    pub fn tracker(&self) -> &Arc<StateTracker> {
        &self.tracker
    }

    pub fn drain_block_list(&self, module: Id) -> Vec<WireMessage> {
        self.modules
            .lock()
            .get_mut(&module)
            .map(|m| m.drain_block_list())
            .unwrap_or_default()
    }

    pub fn is_blocked(&self, module: Id) -> bool {
        self.modules.lock().get(&module).map(|m| m.blocked).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_tracker::StateTracker;

    fn cm() -> ClusterManager {
        ClusterManager::new(0, StateTracker::new())
    }

    #[test]
    fn local_resident_objects_deliver_directly() {
        let cm = cm();
        let object = ObjectName::from_wire("1m0o0r");
        let actions = cm.plan_add_object(
            1,
            "data_out",
            &object,
            true,
            &[(2, "data_in".to_string(), None)],
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], AddObjectAction::DeliverLocal { module: 2, .. }));
    }

    #[test]
    fn remote_destinations_forward_once_per_hub() {
        let cm = cm();
        let object = ObjectName::from_wire("1m1o0r");
        let dests = vec![
            (2, "a".to_string(), Some(-101)),
            (3, "b".to_string(), Some(-101)),
        ];
        let actions = cm.plan_add_object(1, "out", &object, true, &dests);
        assert!(matches!(actions[0], AddObjectAction::ForwardToHub { hub: -101 }));
        assert!(matches!(actions[1], AddObjectAction::AlreadyInTransit));
        assert_eq!(cm.in_transit_count(), 1);
    }

    #[test]
    fn completion_ack_releases_the_in_transit_record() {
        let cm = cm();
        let object = ObjectName::from_wire("1m2o0r");
        cm.plan_add_object(1, "out", &object, true, &[(2, "in".to_string(), Some(-101))]);
        assert_eq!(cm.in_transit_count(), 1);
        cm.complete_add_object(&object, -101);
        assert_eq!(cm.in_transit_count(), 0);
    }

    #[test]
    fn non_resident_destination_blocks_and_requests() {
        let cm = cm();
        cm.prepare_module(2);
        let object = ObjectName::from_wire("1m3o0r");
        let actions = cm.plan_add_object(
            1,
            "out",
            &object,
            false,
            &[(2, "in".to_string(), None)],
        );
        assert!(matches!(actions[0], AddObjectAction::RequestObject { module: 2, .. }));
        assert!(cm.is_blocked(2));
    }

    #[test]
    fn barrier_completes_once_every_rank_has_checked_in() {
        let cm = cm();
        assert!(!cm.barrier_reached(0, 3));
        assert!(!cm.barrier_reached(1, 3));
        assert!(cm.barrier_reached(2, 3));
    }
}
