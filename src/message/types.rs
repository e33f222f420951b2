//! The full message-type enum (§6 EXTERNAL INTERFACES) and the routing
//! flags each type carries (§4.2).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::Id;

bitflags::bitflags! {
    /// Capability flags attached to a message type in the router table.
    #[derive(Serialize, Deserialize)]
    pub struct RouteFlags: u32 {
        /// Fed into the state tracker for replay.
        const TRACK                 = 1 << 0;
        /// Sent to every hub and module.
        const BROADCAST              = 1 << 1;
        /// Sent to every module, but not to hubs.
        const BROADCAST_MODULE       = 1 << 2;
        /// Queued on the destination's block list if unhandled right now.
        const QUEUE_IF_UNHANDLED     = 1 << 3;
        /// Completing this message may drain a previously blocked queue.
        const TRIGGER_QUEUE          = 1 << 4;
        /// Consumed locally by a type-specific handler.
        const HANDLE                 = 1 << 5;
        const DEST_MANAGER           = 1 << 6;
        const DEST_MODULE            = 1 << 7;
        const DEST_HUB               = 1 << 8;
        const DEST_MASTER_HUB        = 1 << 9;
        const DEST_SLAVE_HUB         = 1 << 10;
        const DEST_MASTER_MANAGER    = 1 << 11;
        const DEST_SLAVE_MANAGER     = 1 << 12;
        const DEST_UI                = 1 << 13;
        const REQUIRES_SUBSCRIPTION  = 1 << 14;
        /// Slave-to-slave traffic must be relayed through the master hub.
        const THROUGH_MASTER         = 1 << 15;
    }
}

/// Every message type the core wire format carries (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum MessageType {
    Identify = 0,
    AddHub,
    RemoveSlave,
    Ping,
    Pong,
    Spawn,
    SpawnPrepared,
    Started,
    Kill,
    Debug,
    Quit,
    ModuleExit,
    Execute,
    CancelExecute,
    Busy,
    Idle,
    AddPort,
    RemovePort,
    AddObject,
    AddObjectCompleted,
    Connect,
    Disconnect,
    AddParameter,
    RemoveParameter,
    SetParameter,
    SetParameterChoices,
    Barrier,
    BarrierReached,
    SetId,
    ReplayFinished,
    SendText,
    UpdateStatus,
    ObjectReceivePolicy,
    SchedulingPolicy,
    ReducePolicy,
    ExecutionProgress,
    Trace,
    ModuleAvailable,
    LockUi,
    RequestTunnel,
    RequestObject,
    SendObject,
    FileQuery,
    FileQueryResult,
    DataTransferState,
    CloseConnection,
}

impl MessageType {
    /// The fixed flag set assigned at router-table initialization (§4.2:
    /// "fixed at initialization and must not change during a session").
    pub fn route_flags(self) -> RouteFlags {
        use MessageType::*;
        use RouteFlags as F;
        match self {
            Identify => F::HANDLE,
            AddHub => F::TRACK | F::BROADCAST | F::HANDLE,
            RemoveSlave => F::TRACK | F::BROADCAST | F::HANDLE,
            Ping | Pong => F::HANDLE,
            Spawn => F::DEST_HUB | F::HANDLE,
            SpawnPrepared => F::DEST_MANAGER | F::HANDLE,
            Started => F::TRACK | F::BROADCAST | F::HANDLE,
            Kill => F::DEST_MODULE | F::BROADCAST_MODULE | F::HANDLE,
            Debug => F::DEST_MODULE | F::HANDLE,
            Quit => F::TRACK | F::BROADCAST | F::HANDLE,
            ModuleExit => F::TRACK | F::BROADCAST | F::HANDLE | F::TRIGGER_QUEUE,
            Execute => F::DEST_MODULE | F::HANDLE,
            CancelExecute => F::DEST_MODULE | F::HANDLE,
            Busy | Idle => F::DEST_UI | F::TRACK | F::HANDLE,
            AddPort => F::TRACK | F::BROADCAST | F::HANDLE,
            RemovePort => F::TRACK | F::BROADCAST | F::HANDLE,
            AddObject => {
                F::DEST_MODULE | F::HANDLE | F::QUEUE_IF_UNHANDLED | F::TRIGGER_QUEUE
            }
            AddObjectCompleted => F::DEST_HUB | F::HANDLE | F::TRIGGER_QUEUE,
            Connect => F::TRACK | F::BROADCAST | F::HANDLE,
            Disconnect => F::TRACK | F::BROADCAST | F::HANDLE,
            AddParameter => F::TRACK | F::BROADCAST | F::HANDLE,
            RemoveParameter => F::TRACK | F::BROADCAST | F::HANDLE,
            SetParameter => F::DEST_MODULE | F::TRACK | F::HANDLE,
            SetParameterChoices => F::TRACK | F::BROADCAST | F::HANDLE,
            Barrier => F::TRACK | F::BROADCAST | F::HANDLE,
            BarrierReached => F::DEST_MASTER_MANAGER | F::HANDLE,
            SetId => F::DEST_MODULE | F::HANDLE,
            ReplayFinished => F::DEST_UI | F::HANDLE,
            SendText => F::DEST_UI | F::HANDLE,
            UpdateStatus => F::TRACK | F::DEST_UI | F::HANDLE,
            ObjectReceivePolicy => F::TRACK | F::DEST_MANAGER | F::HANDLE,
            SchedulingPolicy => F::TRACK | F::DEST_MANAGER | F::HANDLE,
            ReducePolicy => F::TRACK | F::DEST_MANAGER | F::HANDLE,
            ExecutionProgress => F::DEST_MANAGER | F::HANDLE,
            Trace => F::DEST_MODULE | F::HANDLE,
            ModuleAvailable => {
                F::TRACK | F::BROADCAST | F::HANDLE | F::REQUIRES_SUBSCRIPTION
            }
            LockUi => F::DEST_UI | F::HANDLE,
            RequestTunnel => F::DEST_HUB | F::HANDLE,
            RequestObject => F::HANDLE,
            SendObject => F::HANDLE | F::TRIGGER_QUEUE,
            FileQuery => F::DEST_UI | F::THROUGH_MASTER | F::HANDLE,
            FileQueryResult => F::DEST_MODULE | F::THROUGH_MASTER | F::HANDLE,
            DataTransferState => F::DEST_UI | F::HANDLE,
            CloseConnection => F::HANDLE,
        }
    }
}

/// Fixed-size header every control message carries (§4.2, §6). The
/// actual wire size is rounded up by the codec to a constant envelope
/// size; this struct holds only the logical fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub payload_size: u32,
    pub source_id: Id,
    pub source_rank: i32,
    pub dest_id: Id,
    pub dest_rank: i32,
    pub broadcast: bool,
    pub uuid: Uuid,
}

impl Envelope {
    pub fn new(message_type: MessageType, source_id: Id, source_rank: i32) -> Self {
        Self {
            message_type,
            payload_size: 0,
            source_id,
            source_rank,
            dest_id: crate::id::BROADCAST,
            dest_rank: -1,
            broadcast: false,
            uuid: Uuid::new_v4(),
        }
    }

    pub fn with_dest(mut self, dest_id: Id, dest_rank: i32) -> Self {
        self.dest_id = dest_id;
        self.dest_rank = dest_rank;
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn with_payload_size(mut self, size: u32) -> Self {
        self.payload_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_object_is_queueable_and_triggers_drains() {
        let flags = MessageType::AddObject.route_flags();
        assert!(flags.contains(RouteFlags::QUEUE_IF_UNHANDLED));
        assert!(flags.contains(RouteFlags::TRIGGER_QUEUE));
    }

    #[test]
    fn quit_is_tracked_and_broadcast() {
        let flags = MessageType::Quit.route_flags();
        assert!(flags.contains(RouteFlags::TRACK));
        assert!(flags.contains(RouteFlags::BROADCAST));
    }

    #[test]
    fn file_query_must_cross_through_the_master() {
        assert!(MessageType::FileQuery
            .route_flags()
            .contains(RouteFlags::THROUGH_MASTER));
    }
}
