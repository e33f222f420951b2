//! Shared-memory message queues between a cluster-manager rank and a
//! local module process (§4.4, §6): `smq_<moduleId>_<rank>` carries
//! cluster-manager → module traffic, `rmq_<moduleId>_<rank>` carries
//! the reply direction. Conceptually SPSC: the cluster manager is the
//! sole writer of `smq` and sole reader of `rmq`, and vice versa for
//! the module (§5).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::id::Id;
use crate::message::WireMessage;

fn smq_name(module_id: Id, rank: i32) -> String {
    format!("smq_{}_{}", module_id, rank)
}

fn rmq_name(module_id: Id, rank: i32) -> String {
    format!("rmq_{}_{}", module_id, rank)
}

/// One direction of a fixed-slot shared-memory queue. Real deployments
/// back this with a POSIX message queue in a shared segment; locally
/// within one process tree a mutex-guarded ring is observationally
/// identical to callers and is what every unit test below exercises.
#[derive(Clone)]
pub struct ShmQueue {
    name: String,
    capacity: usize,
    inner: Arc<Mutex<VecDeque<WireMessage>>>,
}

impl ShmQueue {
    fn new(name: String, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking send; fails if the fixed number of slots is full.
    pub fn try_send(&self, msg: WireMessage) -> Result<(), WireMessage> {
        let mut q = self.inner.lock();
        if q.len() >= self.capacity {
            return Err(msg);
        }
        q.push_back(msg);
        Ok(())
    }

    /// Non-blocking receive (§5: "a non-blocking `tryReceive`").
    pub fn try_receive(&self) -> Option<WireMessage> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The fixed-slot count every queue is given; real Vistle sizes this to
/// the control envelope count the largest in-flight burst needs.
pub const DEFAULT_SLOT_COUNT: usize = 256;

/// A module's pair of queues, as created by the cluster manager at
/// spawn time (§4.3 "the manager creates the module's shared-memory
/// queues").
pub struct ModuleQueues {
    /// cluster-manager → module
    pub send: ShmQueue,
    /// module → cluster-manager
    pub recv: ShmQueue,
}

impl ModuleQueues {
    pub fn create(module_id: Id, rank: i32) -> Self {
        Self {
            send: ShmQueue::new(smq_name(module_id, rank), DEFAULT_SLOT_COUNT),
            recv: ShmQueue::new(rmq_name(module_id, rank), DEFAULT_SLOT_COUNT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id;
    use crate::message::{Envelope, MessageType};

    fn msg(ty: MessageType) -> WireMessage {
        WireMessage::new(Envelope::new(ty, id::MASTER_HUB_ID, 0), vec![])
    }

    #[test]
    fn queue_names_match_the_documented_convention() {
        let q = ModuleQueues::create(5, 2);
        assert_eq!(q.send.name(), "smq_5_2");
        assert_eq!(q.recv.name(), "rmq_5_2");
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = ShmQueue::new("test".into(), 4);
        q.try_send(msg(MessageType::Execute)).unwrap();
        q.try_send(msg(MessageType::Kill)).unwrap();
        assert_eq!(q.try_receive().unwrap().envelope.message_type, MessageType::Execute);
        assert_eq!(q.try_receive().unwrap().envelope.message_type, MessageType::Kill);
        assert!(q.try_receive().is_none());
    }

    #[test]
    fn send_fails_once_the_fixed_slot_count_is_full() {
        let q = ShmQueue::new("test".into(), 1);
        assert!(q.try_send(msg(MessageType::Ping)).is_ok());
        assert!(q.try_send(msg(MessageType::Ping)).is_err());
    }
}
