//! Per-module bookkeeping the cluster manager keeps for every locally
//! running module (§4.4).

use std::collections::VecDeque;

use crate::id::Id;
use crate::message::WireMessage;
use crate::port::{ObjectReceivePolicy, PortManager, ReducePolicy, SchedulingPolicy};
use crate::scheduler::ModuleScheduler;
use crate::shm::ModuleQueues;

/// A module as tracked by the cluster manager running on its hub.
pub struct ModuleRecord {
    pub id: Id,
    pub queues: ModuleQueues,
    pub ports: PortManager,
    pub scheduler: ModuleScheduler,
    pub scheduling_policy: SchedulingPolicy,
    pub reduce_policy: ReducePolicy,
    pub receive_policy: ObjectReceivePolicy,
    /// Messages held back because an `AddObject` is still waiting on a
    /// remote fetch (§4.4: "each module carries a block list").
    pub block_list: VecDeque<WireMessage>,
    pub blocked: bool,
}

impl ModuleRecord {
    pub fn new(id: Id, rank: i32) -> Self {
        Self {
            id,
            queues: ModuleQueues::create(id, rank),
            ports: PortManager::new(),
            scheduler: ModuleScheduler::new(),
            scheduling_policy: SchedulingPolicy::Single,
            reduce_policy: ReducePolicy::Never,
            receive_policy: ObjectReceivePolicy::Local,
            block_list: VecDeque::new(),
            blocked: false,
        }
    }

    /// Append to the block list instead of delivering, preserving FIFO
    /// order for when the block lifts (§4.4).
    pub fn block(&mut self, msg: WireMessage) {
        self.blocked = true;
        self.block_list.push_back(msg);
    }

    /// Drain every message queued while blocked, in arrival order.
    pub fn drain_block_list(&mut self) -> Vec<WireMessage> {
        self.blocked = false;
        self.block_list.drain(..).collect()
    }
}
